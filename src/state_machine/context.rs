use std::sync::Arc;
use tokio::sync::mpsc;

use super::states::TaskStageKind;
use super::task_state_machine::{TaskHandler, TaskRecordOf, TaskUpdate, TaskUpdateOf};
use crate::error::{ProvisionerError, Result};
use crate::logging::log_error;

/// A self-update waiting for the update pipeline
pub struct SelfUpdate<H: TaskHandler> {
    pub link: String,
    pub update: TaskUpdateOf<H>,
    /// Set only for the update that starts a new task's first substage
    pub kick_off: bool,
}

/// Handle a substage handler uses to move its own task forward
pub struct TaskContext<H: TaskHandler> {
    link: String,
    handler: Arc<H>,
    updates: mpsc::Sender<SelfUpdate<H>>,
}

impl<H: TaskHandler> Clone for TaskContext<H> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            handler: Arc::clone(&self.handler),
            updates: self.updates.clone(),
        }
    }
}

impl<H: TaskHandler> TaskContext<H> {
    pub(crate) fn new(
        link: impl Into<String>,
        handler: Arc<H>,
        updates: mpsc::Sender<SelfUpdate<H>>,
    ) -> Self {
        Self {
            link: link.into(),
            handler,
            updates,
        }
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Propose `next_stage` for the task read as `task`, changing no other
    /// field
    pub async fn advance(&self, task: &TaskRecordOf<H>, next_stage: TaskStageKind) -> Result<()> {
        self.advance_with(task, next_stage, |_| {}).await
    }

    /// Like [`advance`](Self::advance), letting `mutator` set the substage
    /// and the fields this step produced
    pub async fn advance_with<F>(
        &self,
        task: &TaskRecordOf<H>,
        next_stage: TaskStageKind,
        mutator: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut TaskUpdateOf<H>) + Send,
    {
        let mut update = TaskUpdate::from_record(task, next_stage);
        mutator(&mut update);
        self.dispatch(update, false).await
    }

    /// Re-enter the initial substage of a freshly stored task so its handler
    /// runs
    pub(crate) async fn kick_off(&self, task: &TaskRecordOf<H>) -> Result<()> {
        let update = TaskUpdate::from_record(task, TaskStageKind::Started);
        self.dispatch(update, true).await
    }

    pub async fn fail(&self, task: &TaskRecordOf<H>, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.advance_with(task, TaskStageKind::Failed, move |update| {
            update.failure_message = Some(message)
        })
        .await
    }

    /// Hand the update to the pipeline. Not retried on failure.
    async fn dispatch(&self, update: TaskUpdateOf<H>, kick_off: bool) -> Result<()> {
        let self_update = SelfUpdate {
            link: self.link.clone(),
            update,
            kick_off,
        };
        self.updates.send(self_update).await.map_err(|_| {
            let error = ProvisionerError::Dispatch(format!(
                "Self-update queue closed for {}",
                self.link
            ));
            log_error("task_context", "dispatch", &error.to_string(), Some(&self.link));
            error
        })
    }
}
