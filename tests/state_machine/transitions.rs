use std::sync::Arc;
use std::time::Duration;

use provisioner_core::document::ServiceDocument;
use provisioner_core::host::ProvisionerHost;
use provisioner_core::provisioning::{
    ProvisioningSubStage, ProvisioningTask, ProvisioningTaskState, ProvisioningTaskUpdate,
    StaticProvisioningClient,
};
use provisioner_core::state_machine::{TaskStage, TaskStageKind};
use provisioner_core::ProvisionerError;

use crate::common::clients::GatedStacksClient;
use crate::common::{start_host, task_body, test_images, test_stacks, wait_for_task, TEST_ENDPOINT};

const HEAT_CREATE: TaskStage<ProvisioningSubStage> =
    TaskStage::Started(ProvisioningSubStage::HeatCreate);

/// A host whose tasks stop in HEAT_CREATE until the client is released
async fn parked_task() -> (ProvisionerHost, Arc<GatedStacksClient>, ProvisioningTask) {
    let client = Arc::new(GatedStacksClient::new(test_images(), test_stacks()));
    let host = start_host(client.clone());

    let created = host.tasks().create(task_body(TEST_ENDPOINT)).await.unwrap();
    let parked = wait_for_task(host.tasks(), created.self_link(), |t| t.stage == HEAT_CREATE).await;
    (host, client, parked)
}

fn stage_update(kind: TaskStageKind, sub_stage: Option<ProvisioningSubStage>) -> ProvisioningTaskUpdate {
    ProvisioningTaskUpdate {
        stage: Some(kind),
        sub_stage,
        ..ProvisioningTaskUpdate::new(ProvisioningTaskState::default())
    }
}

#[tokio::test]
async fn test_sub_stage_regression_rejected() {
    let (host, _client, parked) = parked_task().await;
    let link = parked.self_link();

    let update = stage_update(TaskStageKind::Started, Some(ProvisioningSubStage::ImageList));
    let err = host.tasks().update(link, update).await.unwrap_err();
    assert_eq!(
        err,
        ProvisionerError::InvalidArgument(
            "Task substage cannot move backwards: HEAT_CREATE -> IMAGE_LIST".into()
        )
    );

    let current = host.tasks().get(link).await.unwrap().unwrap();
    assert_eq!(current.stage, HEAT_CREATE);
    assert_eq!(current.document.version, parked.document.version);
}

#[tokio::test]
async fn test_started_without_sub_stage_rejected() {
    let (host, _client, parked) = parked_task().await;

    let err = host
        .tasks()
        .update(parked.self_link(), stage_update(TaskStageKind::Started, None))
        .await
        .unwrap_err();
    assert_eq!(err, ProvisionerError::InvalidArgument("Missing substage".into()));
}

#[tokio::test]
async fn test_created_proposal_rejected() {
    let (host, _client, parked) = parked_task().await;

    let err = host
        .tasks()
        .update(parked.self_link(), stage_update(TaskStageKind::Created, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionerError::InvalidArgument(_)));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_repeated_sub_stage_appends_status_without_rerun() {
    let (host, client, parked) = parked_task().await;
    let link = parked.self_link();
    let images_status = parked.payload.status.clone().unwrap();
    assert!(images_status.starts_with("[Image{id=img-1"));

    let mut note = stage_update(TaskStageKind::Started, Some(ProvisioningSubStage::HeatCreate));
    note.payload.status = Some("[operator note]".to_string());
    note.payload.os_domain = Some("other".to_string());
    let noted = host.tasks().update(link, note).await.unwrap();
    assert_eq!(noted.stage, HEAT_CREATE);
    assert_eq!(
        noted.payload.status.as_deref(),
        Some(format!("{images_status}[operator note]").as_str())
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.stack_calls(), 1);

    client.release();
    let finished = wait_for_task(host.tasks(), link, |t| t.stage == TaskStage::Finished).await;
    let status = finished.payload.status.unwrap();
    assert!(status.starts_with(&format!("{images_status}[operator note]")));
    assert!(status.ends_with("[Stack{id=stk-1, name=db-tier, status=CREATE_COMPLETE}]"));
    assert_eq!(status.matches("Stack{").count(), 1);
    assert_eq!(finished.payload.os_domain.as_deref(), Some("other"));
    assert_eq!(client.stack_calls(), 1);
}

#[tokio::test]
async fn test_stale_duplicate_is_conflict() {
    let (host, _client, parked) = parked_task().await;
    let link = parked.self_link();

    let mut stale = stage_update(TaskStageKind::Started, Some(ProvisioningSubStage::HeatCreate));
    stale.source_version = Some(parked.document.version - 1);
    let err = host.tasks().update(link, stale).await.unwrap_err();
    assert!(matches!(err, ProvisionerError::TransitionConflict(_)));

    let current = host.tasks().get(link).await.unwrap().unwrap();
    assert_eq!(current.document.version, parked.document.version);
}

#[tokio::test]
async fn test_update_of_missing_task_not_found() {
    let host = start_host(Arc::new(StaticProvisioningClient::default()));

    let err = host
        .tasks()
        .update("/vio/deployment-tasks/nope", stage_update(TaskStageKind::Finished, None))
        .await
        .unwrap_err();
    assert_eq!(err, ProvisionerError::NotFound("/vio/deployment-tasks/nope".into()));
}

#[tokio::test]
async fn test_terminal_task_rejects_updates() {
    let (host, client, parked) = parked_task().await;
    let link = parked.self_link();

    client.release();
    let finished = wait_for_task(host.tasks(), link, |t| t.stage == TaskStage::Finished).await;

    for kind in [TaskStageKind::Failed, TaskStageKind::Cancelled, TaskStageKind::Finished] {
        let err = host.tasks().update(link, stage_update(kind, None)).await.unwrap_err();
        assert!(matches!(err, ProvisionerError::TransitionConflict(_)), "{kind}");
    }

    let current = host.tasks().get(link).await.unwrap().unwrap();
    assert_eq!(current.document.version, finished.document.version);
}

#[tokio::test]
async fn test_cancel_is_accepted_and_sticks() {
    let (host, client, parked) = parked_task().await;
    let link = parked.self_link();
    let mut events = host.subscribe();

    let cancelled = host
        .tasks()
        .update(link, stage_update(TaskStageKind::Cancelled, None))
        .await
        .unwrap();
    assert_eq!(cancelled.stage, TaskStage::Cancelled);

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.name, "task.cancelled");
    assert_eq!(event.stage, TaskStageKind::Cancelled);

    // The parked handler finishing late loses to the cancellation
    client.release();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let current = host.tasks().get(link).await.unwrap().unwrap();
    assert_eq!(current.stage, TaskStage::Cancelled);
}

#[tokio::test]
async fn test_external_failure_records_message() {
    let (host, _client, parked) = parked_task().await;

    let mut update = stage_update(TaskStageKind::Failed, None);
    update.failure_message = Some("operator abort".to_string());
    let failed = host.tasks().update(parked.self_link(), update).await.unwrap();

    assert_eq!(failed.stage, TaskStage::Failed);
    assert_eq!(failed.failure_message.as_deref(), Some("operator abort"));
}
