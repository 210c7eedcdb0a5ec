//! Shared fixtures for integration and property tests
#![allow(dead_code)]

pub mod clients;

use std::sync::Arc;
use std::time::Duration;

use provisioner_core::config::{ProvisionerConfig, ProvisioningDefaults};
use provisioner_core::host::{ProvisionerHost, ProvisioningEngine};
use provisioner_core::provisioning::{
    Image, ProvisioningClient, ProvisioningTask, ProvisioningTaskState, ProvisioningTaskUpdate,
    Stack,
};

pub const TEST_ENDPOINT: &str = "https://cloud.example:5000/v3";

pub fn test_images() -> Vec<Image> {
    vec![
        Image::new("img-1", "ubuntu-22.04", "ACTIVE"),
        Image::new("img-2", "centos-9", "ACTIVE"),
    ]
}

pub fn test_stacks() -> Vec<Stack> {
    vec![Stack::new("stk-1", "db-tier", "CREATE_COMPLETE")]
}

pub fn test_config() -> ProvisionerConfig {
    ProvisionerConfig {
        provisioning: ProvisioningDefaults {
            user: Some("admin".to_string()),
            password: Some("s3cret".to_string()),
            os_domain: Some("default".to_string()),
        },
        ..ProvisionerConfig::default()
    }
}

pub fn start_host(client: Arc<dyn ProvisioningClient>) -> ProvisionerHost {
    ProvisionerHost::start(test_config(), client).unwrap()
}

pub fn task_body(endpoint: &str) -> ProvisioningTaskUpdate {
    ProvisioningTaskUpdate::new(ProvisioningTaskState {
        endpoint: Some(endpoint.to_string()),
        user: Some("admin".to_string()),
        password: Some("s3cret".to_string()),
        os_domain: Some("default".to_string()),
        ..Default::default()
    })
}

/// Poll until the task satisfies `predicate`, panicking after two seconds
pub async fn wait_for_task<F>(engine: &ProvisioningEngine, link: &str, predicate: F) -> ProvisioningTask
where
    F: Fn(&ProvisioningTask) -> bool,
{
    for _ in 0..400 {
        if let Some(task) = engine.get(link).await.unwrap() {
            if predicate(&task) {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {link} never reached the expected state");
}
