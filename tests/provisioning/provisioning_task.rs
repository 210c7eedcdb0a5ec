use std::sync::Arc;
use std::time::Duration;

use provisioner_core::document::ServiceDocument;
use provisioner_core::provisioning::{RemoteError, RemoteOperation, StaticProvisioningClient};
use provisioner_core::state_machine::{TaskStage, TaskStageKind};

use crate::common::{start_host, task_body, test_images, test_stacks, wait_for_task, TEST_ENDPOINT};

#[tokio::test]
async fn test_image_listing_failure_fails_task() {
    let client = Arc::new(
        StaticProvisioningClient::new(test_images(), test_stacks())
            .failing_images(RemoteError::Authentication("bad credentials".to_string())),
    );
    let host = start_host(client.clone());

    let created = host.tasks().create(task_body(TEST_ENDPOINT)).await.unwrap();
    let failed = wait_for_task(host.tasks(), created.self_link(), |t| t.stage.is_terminal()).await;

    assert_eq!(failed.stage, TaskStage::Failed);
    assert_eq!(
        failed.failure_message.as_deref(),
        Some("Remote operation failed: authentication failed: bad credentials")
    );
    assert_eq!(failed.payload.status, None);
    assert_eq!(failed.payload.deployment_query_task, None);
    assert_eq!(client.call_count(RemoteOperation::ListStacks), 0);
}

#[tokio::test]
async fn test_stack_listing_failure_keeps_image_listing() {
    let client = Arc::new(
        StaticProvisioningClient::new(test_images(), test_stacks())
            .failing_stacks(RemoteError::Connectivity("connection refused".to_string())),
    );
    let host = start_host(client.clone());

    let created = host.tasks().create(task_body(TEST_ENDPOINT)).await.unwrap();
    let failed = wait_for_task(host.tasks(), created.self_link(), |t| t.stage.is_terminal()).await;

    assert_eq!(failed.stage, TaskStage::Failed);
    assert_eq!(
        failed.failure_message.as_deref(),
        Some("Remote operation failed: target unreachable: connection refused")
    );
    let status = failed.payload.status.unwrap();
    assert!(status.contains("Image{id=img-2, name=centos-9, status=ACTIVE}"));
    assert!(!status.contains("Stack{"));
    assert_eq!(client.call_count(RemoteOperation::ListImages), 1);
    assert_eq!(client.call_count(RemoteOperation::ListStacks), 1);
}

#[tokio::test]
async fn test_deployment_query_recorded_once() {
    let host = start_host(Arc::new(StaticProvisioningClient::new(test_images(), test_stacks())));

    let created = host.tasks().create(task_body(TEST_ENDPOINT)).await.unwrap();
    assert_eq!(created.payload.deployment_query_task, None);

    let link = created.self_link().to_string();
    let finished = wait_for_task(host.tasks(), &link, |t| t.stage == TaskStage::Finished).await;
    let recorded = finished.payload.deployment_query_task.clone().unwrap();

    let history = host.tasks().history(&link).await.unwrap();
    let with_query: Vec<_> = history
        .iter()
        .filter_map(|t| t.payload.deployment_query_task.clone())
        .collect();
    assert!(!with_query.is_empty());
    assert!(with_query.iter().all(|q| *q == recorded));
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let host = start_host(Arc::new(StaticProvisioningClient::new(test_images(), test_stacks())));
    let mut events = host.subscribe();

    let created = host.tasks().create(task_body(TEST_ENDPOINT)).await.unwrap();

    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), async {
        while let Ok(event) = events.recv().await {
            let done = event.stage.is_terminal();
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .unwrap();

    let names: Vec<&str> = seen.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["task.started", "task.sub_stage_advanced", "task.finished"]
    );
    assert!(seen.iter().all(|e| e.task_link == created.self_link()));
    assert_eq!(seen[1].sub_stage.as_deref(), Some("HEAT_CREATE"));
    assert_eq!(seen[2].from_stage, TaskStageKind::Started);
    assert!(seen.windows(2).all(|w| w[0].version < w[1].version));
}

#[tokio::test]
async fn test_slow_remote_does_not_block_other_tasks() {
    let client = Arc::new(
        StaticProvisioningClient::new(test_images(), test_stacks())
            .with_latency(Duration::from_millis(20)),
    );
    let host = start_host(client.clone());

    let endpoints = ["https://a.example/v3", "https://b.example/v3", "https://c.example/v3"];
    let mut links = Vec::new();
    for endpoint in endpoints {
        let task = host.tasks().create(task_body(endpoint)).await.unwrap();
        links.push(task.self_link().to_string());
    }
    for link in &links {
        let task = wait_for_task(host.tasks(), link, |t| t.stage.is_terminal()).await;
        assert_eq!(task.stage, TaskStage::Finished);
    }
    assert_eq!(client.calls().len(), 6);
}
