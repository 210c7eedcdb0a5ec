use serde::Serialize;
use tokio::sync::broadcast;

use crate::state_machine::states::TaskStageKind;

/// Broadcast publisher for task lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<TaskLifecycleEvent>,
}

/// A transition that has been accepted and stored
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLifecycleEvent {
    pub name: String,
    pub task_link: String,
    pub from_stage: TaskStageKind,
    pub stage: TaskStageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast `event`, returning how many subscribers it reached.
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: TaskLifecycleEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
