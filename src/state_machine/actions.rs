use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::states::{SubStage, TaskStage};
use crate::constants::events;
use crate::events::publisher::{EventPublisher, TaskLifecycleEvent};

/// An accepted and stored transition
#[derive(Debug, Clone)]
pub struct Transition<S> {
    pub task_link: String,
    pub from: TaskStage<S>,
    pub to: TaskStage<S>,
    pub version: u64,
    pub failure_message: Option<String>,
}

/// Trait for implementing state transition actions.
///
/// Actions run after the transition is stored and cannot undo it, so they
/// report nothing back to the pipeline.
#[async_trait]
pub trait StateAction<S: SubStage>: Send + Sync {
    async fn execute(&self, transition: &Transition<S>);

    /// Get a description of this action for logging
    fn description(&self) -> &'static str;
}

/// Action to publish lifecycle events when state transitions occur
pub struct PublishTransitionEventAction {
    event_publisher: EventPublisher,
}

impl PublishTransitionEventAction {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }
}

#[async_trait]
impl<S: SubStage> StateAction<S> for PublishTransitionEventAction {
    async fn execute(&self, transition: &Transition<S>) {
        let Some(event_name) = determine_task_event_name(&transition.from, &transition.to) else {
            return;
        };

        let event = TaskLifecycleEvent {
            name: event_name.to_string(),
            task_link: transition.task_link.clone(),
            from_stage: transition.from.kind(),
            stage: transition.to.kind(),
            sub_stage: transition.to.sub_stage().map(|s| s.to_string()),
            version: transition.version,
            failure_message: transition.failure_message.clone(),
            published_at: chrono::Utc::now(),
        };

        let delivered = self.event_publisher.publish(event);
        debug!(
            task_link = %transition.task_link,
            event = event_name,
            subscribers = delivered,
            "Published task event"
        );
    }

    fn description(&self) -> &'static str {
        "Publish lifecycle event for task transition"
    }
}

/// Logs the outcome of terminal transitions the task does not act on itself
pub struct LogStageOutcomeAction;

#[async_trait]
impl<S: SubStage> StateAction<S> for LogStageOutcomeAction {
    async fn execute(&self, transition: &Transition<S>) {
        match transition.to {
            TaskStage::Failed => {
                warn!(
                    task_link = %transition.task_link,
                    "Task failed: {}",
                    transition.failure_message.as_deref().unwrap_or("No reason given")
                );
            }
            TaskStage::Cancelled => {
                info!(
                    task_link = %transition.task_link,
                    "Task canceled: not implemented, ignoring"
                );
            }
            TaskStage::Finished => {
                info!(task_link = %transition.task_link, "Task finished successfully");
            }
            TaskStage::Created | TaskStage::Started(_) => {}
        }
    }

    fn description(&self) -> &'static str {
        "Log terminal task outcome"
    }
}

fn determine_task_event_name<S: SubStage>(
    from: &TaskStage<S>,
    to: &TaskStage<S>,
) -> Option<&'static str> {
    match (from, to) {
        (TaskStage::Started(a), TaskStage::Started(b)) if a != b => {
            Some(events::TASK_SUB_STAGE_ADVANCED)
        }
        (_, TaskStage::Started(_)) => Some(events::TASK_STARTED),
        (_, TaskStage::Finished) => Some(events::TASK_FINISHED),
        (_, TaskStage::Failed) => Some(events::TASK_FAILED),
        (_, TaskStage::Cancelled) => Some(events::TASK_CANCELLED),
        (_, TaskStage::Created) => None,
    }
}
