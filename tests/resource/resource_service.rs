use std::sync::Arc;
use std::time::Duration;

use provisioner_core::config::{ProvisionerConfig, ResourceConfig};
use provisioner_core::document::ServiceDocument;
use provisioner_core::host::ProvisionerHost;
use provisioner_core::provisioning::StaticProvisioningClient;
use provisioner_core::state_machine::TaskStage;
use provisioner_core::{CreateOutcome, ProvisionerError, ResourceState};

use crate::common::{start_host, test_images, test_stacks, wait_for_task, TEST_ENDPOINT};

fn host() -> ProvisionerHost {
    start_host(Arc::new(StaticProvisioningClient::new(test_images(), test_stacks())))
}

async fn stored(host: &ProvisionerHost, body: ResourceState) -> ResourceState {
    host.resources().create(body).await.unwrap().state().clone()
}

#[tokio::test]
async fn test_create_without_status_launches_task() {
    let host = host();

    let outcome = host
        .resources()
        .create(ResourceState::named("db1").with_endpoint(TEST_ENDPOINT))
        .await
        .unwrap();

    assert_eq!(outcome.status_code(), 202);
    assert_eq!(outcome.state().status.as_deref(), Some("init"));
    assert!(outcome.state().self_link().starts_with("/oms/deployments/"));

    let location = outcome.location().unwrap().to_string();
    assert_eq!(location, "/vio/deployment-tasks/https---cloud-example-5000-v3");

    let task = wait_for_task(host.tasks(), &location, |t| t.stage.is_terminal()).await;
    assert_eq!(task.stage, TaskStage::Finished);
    assert_eq!(task.payload.endpoint.as_deref(), Some(TEST_ENDPOINT));
    assert_eq!(task.payload.user.as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_create_with_status_does_not_provision() {
    let host = host();

    let mut body = ResourceState::named("db1").with_endpoint(TEST_ENDPOINT);
    body.status = Some("ready".to_string());
    let outcome = host.resources().create(body).await.unwrap();

    assert_eq!(outcome.status_code(), 200);
    assert_eq!(outcome.location(), None);
    assert!(matches!(outcome, CreateOutcome::Stored(_)));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(host
        .tasks()
        .get("/vio/deployment-tasks/https---cloud-example-5000-v3")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_create_accepted_even_when_task_cannot_start() {
    // No default credentials, so the companion task fails validation
    let host = ProvisionerHost::start(
        ProvisionerConfig::default(),
        Arc::new(StaticProvisioningClient::default()),
    )
    .unwrap();

    let outcome = host
        .resources()
        .create(ResourceState::named("db1").with_endpoint(TEST_ENDPOINT))
        .await
        .unwrap();
    assert_eq!(outcome.status_code(), 202);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let location = outcome.location().unwrap();
    assert!(host.tasks().get(location).await.unwrap().is_none());

    let record = host.resources().get(outcome.state().self_link()).await.unwrap().unwrap();
    assert_eq!(record.status.as_deref(), Some("init"));
}

#[tokio::test]
async fn test_create_requires_name() {
    let host = host();

    let err = host
        .resources()
        .create(ResourceState::default().with_endpoint(TEST_ENDPOINT))
        .await
        .unwrap_err();
    assert_eq!(err, ProvisionerError::InvalidArgument("name is required".into()));
}

#[tokio::test]
async fn test_counter_merges_never_decrease() {
    let host = host();
    let record = stored(&host, ResourceState::named("db1").with_counter(5)).await;
    let link = record.self_link();

    let patch = |counter| ResourceState {
        counter: Some(counter),
        ..Default::default()
    };

    let after_lower = host.resources().merge(link, patch(3)).await.unwrap();
    assert_eq!(after_lower.counter, Some(5));

    let after_higher = host.resources().merge(link, patch(9)).await.unwrap();
    assert_eq!(after_higher.counter, Some(9));
    assert_eq!(after_higher.name.as_deref(), Some("db1"));
}

#[tokio::test]
async fn test_key_values_accumulate() {
    let host = host();
    let record = stored(&host, ResourceState::named("db1").with_key_value("a", "1")).await;
    let link = record.self_link();

    let merged = host
        .resources()
        .merge(link, ResourceState::default().with_key_value("b", "2"))
        .await
        .unwrap();
    assert_eq!(merged.key_values.len(), 2);
    assert_eq!(merged.key_values["a"], "1");
    assert_eq!(merged.key_values["b"], "2");

    let overwritten = host
        .resources()
        .merge(link, ResourceState::default().with_key_value("a", "3"))
        .await
        .unwrap();
    assert_eq!(overwritten.key_values["a"], "3");
    assert_eq!(overwritten.key_values["b"], "2");
}

#[tokio::test]
async fn test_replace_without_name_rejected() {
    let host = host();
    let record = stored(&host, ResourceState::named("db1").with_counter(2)).await;
    let link = record.self_link();

    let err = host
        .resources()
        .replace(link, ResourceState::default().with_counter(7))
        .await
        .unwrap_err();
    assert_eq!(err, ProvisionerError::InvalidArgument("name must be set".into()));

    let current = host.resources().get(link).await.unwrap().unwrap();
    assert_eq!(current, record);
}

#[tokio::test]
async fn test_replace_keeps_counter_maximum() {
    let host = host();
    let record = stored(
        &host,
        ResourceState::named("db1").with_counter(10).with_key_value("a", "1"),
    )
    .await;
    let link = record.self_link();

    let replaced = host
        .resources()
        .replace(link, ResourceState::named("db2").with_counter(4))
        .await
        .unwrap();
    assert_eq!(replaced.name.as_deref(), Some("db2"));
    assert_eq!(replaced.counter, Some(10));
    assert!(replaced.key_values.is_empty());
    assert_eq!(replaced.self_link(), link);
    assert_eq!(replaced.version(), 1);
}

#[tokio::test]
async fn test_create_on_existing_link_replaces() {
    let host = host();
    let mut first = ResourceState::named("db1").with_counter(8);
    first.status = Some("ready".to_string());
    first.document.self_link = "db1".to_string();
    let record = stored(&host, first).await;
    assert_eq!(record.self_link(), "/oms/deployments/db1");

    let mut second = ResourceState::named("db1-renamed").with_counter(1);
    second.document.self_link = "/oms/deployments/db1".to_string();
    let outcome = host.resources().create(second).await.unwrap();

    assert_eq!(outcome.status_code(), 200);
    let state = outcome.state();
    assert_eq!(state.name.as_deref(), Some("db1-renamed"));
    assert_eq!(state.counter, Some(8));
    assert_eq!(state.version(), 1);
}

#[tokio::test]
async fn test_concurrent_merges_all_apply() {
    let host = host();
    let record = stored(&host, ResourceState::named("db1").with_counter(0)).await;
    let link = record.self_link().to_string();

    let merges = (1..=20).map(|i| {
        let patch = ResourceState {
            counter: Some(i),
            ..ResourceState::default().with_key_value(format!("k{i}"), i.to_string())
        };
        host.resources().merge(&link, patch)
    });
    let results = futures::future::join_all(merges).await;
    assert!(results.iter().all(Result::is_ok));

    let current = host.resources().get(&link).await.unwrap().unwrap();
    assert_eq!(current.counter, Some(20));
    assert_eq!(current.key_values.len(), 20);
    assert_eq!(current.version(), 20);
}

#[tokio::test]
async fn test_history_bounded_by_retention() {
    let config = ProvisionerConfig {
        resource: ResourceConfig {
            version_retention_limit: 3,
        },
        ..crate::common::test_config()
    };
    let host = ProvisionerHost::start(config, Arc::new(StaticProvisioningClient::default())).unwrap();

    let mut body = ResourceState::named("db1");
    body.status = Some("ready".to_string());
    let record = stored(&host, body).await;
    let link = record.self_link();

    for counter in 1..=5 {
        host.resources()
            .merge(link, ResourceState::default().with_counter(counter))
            .await
            .unwrap();
    }

    let versions: Vec<u64> = host
        .resources()
        .history(link)
        .await
        .unwrap()
        .iter()
        .map(|r| r.version())
        .collect();
    assert_eq!(versions, vec![3, 4, 5]);
}

#[tokio::test]
async fn test_expired_record_is_gone() {
    let host = host();
    let mut body = ResourceState::named("db1");
    body.status = Some("ready".to_string());
    body.document.expiration_time_micros = Some(provisioner_core::utils::now_micros() + 10_000);
    let record = stored(&host, body).await;

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(host.resources().get(record.self_link()).await.unwrap().is_none());
}
