use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::actions::{LogStageOutcomeAction, PublishTransitionEventAction, StateAction, Transition};
use super::context::{SelfUpdate, TaskContext};
use super::errors::{GuardError, StateMachineError, StateMachineResult};
use super::guards::{TransitionGuard, TransitionRequest};
use super::states::{SubStage, TaskStage, TaskStageKind};
use crate::config::TaskConfig;
use crate::constants::fields;
use crate::document::{DocumentDescription, DocumentMeta, DocumentStore, ServiceDocument};
use crate::error::{ProvisionerError, Result};
use crate::events::publisher::{EventPublisher, TaskLifecycleEvent};
use crate::logging::{log_error, log_task_operation};
use crate::utils::{build_link, expiration_from_now};
use crate::validation::{validate_fields, FieldConstraint, FieldRule, FieldValue};

/// Specialization fields of a task, stored flat next to the lifecycle fields
pub trait TaskPayload:
    Clone + fmt::Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> TaskPayload for T where
    T: Clone + fmt::Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Stored task document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(serialize = "S: SubStage, P: TaskPayload", deserialize = "S: SubStage, P: TaskPayload")
)]
pub struct TaskRecord<S, P> {
    #[serde(flatten)]
    pub stage: TaskStage<S>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(flatten)]
    pub payload: P,
    #[serde(flatten)]
    pub document: DocumentMeta,
}

impl<S: SubStage, P: TaskPayload> ServiceDocument for TaskRecord<S, P> {
    fn meta(&self) -> &DocumentMeta {
        &self.document
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.document
    }
}

/// Request body for task creation and task updates.
///
/// All lifecycle fields are optional on the wire; which ones must be present
/// depends on the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(serialize = "S: SubStage, P: TaskPayload", deserialize = "S: SubStage, P: TaskPayload")
)]
pub struct TaskUpdate<S, P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<TaskStageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<S>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default, rename = "documentSelfLink", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(
        default,
        rename = "documentExpirationTimeMicros",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_time_micros: Option<i64>,
    /// Version of the task the sender read before deriving this update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<u64>,
    #[serde(flatten)]
    pub payload: P,
}

impl<S, P: Default> Default for TaskUpdate<S, P> {
    fn default() -> Self {
        Self {
            stage: None,
            sub_stage: None,
            failure_message: None,
            self_link: None,
            expiration_time_micros: None,
            source_version: None,
            payload: P::default(),
        }
    }
}

impl<S: SubStage, P: TaskPayload> TaskUpdate<S, P> {
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    pub fn with_stage(mut self, stage: TaskStageKind) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_sub_stage(mut self, sub_stage: S) -> Self {
        self.sub_stage = Some(sub_stage);
        self
    }

    /// Self-update body proposing `next_stage`, pinned to the version
    /// `task` was read at.
    ///
    /// No payload fields are carried over; the proposer sets only the ones
    /// it produced, so fields written by others in the meantime survive.
    pub fn from_record(task: &TaskRecord<S, P>, next_stage: TaskStageKind) -> Self {
        Self {
            stage: Some(next_stage),
            sub_stage: task.stage.sub_stage(),
            source_version: Some(task.document.version),
            ..Self::default()
        }
    }
}

pub type TaskRecordOf<H> = TaskRecord<<H as TaskHandler>::SubStage, <H as TaskHandler>::Payload>;
pub type TaskUpdateOf<H> = TaskUpdate<<H as TaskHandler>::SubStage, <H as TaskHandler>::Payload>;

/// Specialization hooks of a self-driving task
#[async_trait]
pub trait TaskHandler: Send + Sync + Sized + 'static {
    type SubStage: SubStage;
    type Payload: TaskPayload;

    fn factory_link(&self) -> &'static str;

    /// Substage a freshly created task starts in
    fn initial_sub_stage(&self) -> Self::SubStage;

    /// Creation-time rules for the specialization's fields
    fn create_rules(&self) -> &'static [FieldRule<TaskUpdateOf<Self>>];

    /// Id for a task created without an explicit self link
    fn document_id(&self, _payload: &Self::Payload) -> String {
        Uuid::new_v4().to_string()
    }

    /// Relative lifetime requested at creation, if any
    fn requested_lifetime(&self, _payload: &Self::Payload) -> Option<Duration> {
        None
    }

    /// Fold an accepted update's specialization fields into the stored ones
    fn merge_payload(&self, current: &mut Self::Payload, update: &Self::Payload);

    fn document_description(&self) -> DocumentDescription {
        DocumentDescription::new()
    }

    /// Work for one substage; progress is reported through `ctx`
    async fn handle_sub_stage(
        &self,
        task: TaskRecordOf<Self>,
        sub_stage: Self::SubStage,
        ctx: TaskContext<Self>,
    ) -> Result<()>;
}

/// Task lifecycle engine.
///
/// Every change to a task, whether sent by a caller or by the task's own
/// handler, goes through [`TaskStateMachine::update`]: guards, merge, store,
/// actions, then the handler for the new substage.
pub struct TaskStateMachine<H: TaskHandler> {
    handler: Arc<H>,
    store: Arc<dyn DocumentStore<TaskRecordOf<H>>>,
    event_publisher: EventPublisher,
    actions: Vec<Box<dyn StateAction<H::SubStage>>>,
    updates: mpsc::Sender<SelfUpdate<H>>,
    default_lifetime: Duration,
}

impl<H: TaskHandler> TaskStateMachine<H> {
    /// Build the engine and spawn its self-update dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        handler: H,
        store: Arc<dyn DocumentStore<TaskRecordOf<H>>>,
        event_publisher: EventPublisher,
        config: &TaskConfig,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(config.update_queue_capacity.max(1));
        let actions: Vec<Box<dyn StateAction<H::SubStage>>> = vec![
            Box::new(PublishTransitionEventAction::new(event_publisher.clone())),
            Box::new(LogStageOutcomeAction),
        ];

        let machine = Arc::new(Self {
            handler: Arc::new(handler),
            store,
            event_publisher,
            actions,
            updates: sender,
            default_lifetime: Duration::from_secs(config.default_lifetime_secs),
        });

        tokio::spawn(Self::run_dispatcher(Arc::downgrade(&machine), receiver));
        machine
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn factory_link(&self) -> &'static str {
        self.handler.factory_link()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.event_publisher.subscribe()
    }

    pub async fn get(&self, link: &str) -> Result<Option<TaskRecordOf<H>>> {
        self.store.get(link).await
    }

    pub async fn history(&self, link: &str) -> Result<Vec<TaskRecordOf<H>>> {
        self.store.history(link).await
    }

    /// Validate, initialize and store a new task, then kick it off.
    ///
    /// Creating at a link that already holds a live task returns that task
    /// unchanged.
    #[instrument(skip(self, body), fields(factory = self.handler.factory_link()))]
    pub async fn create(&self, body: TaskUpdateOf<H>) -> Result<TaskRecordOf<H>> {
        let mut task = self.validate_create(body)?;
        self.initialize(&mut task);
        let link = task.self_link().to_string();

        let created = match self.store.create(task).await {
            Ok(created) => created,
            Err(ProvisionerError::AlreadyExists(_)) => {
                debug!(task_link = %link, "Task already exists, returning current state");
                return self
                    .store
                    .get(&link)
                    .await?
                    .ok_or(ProvisionerError::NotFound(link));
            }
            Err(error) => return Err(error),
        };

        log_task_operation("create", &link, &created.stage.to_string(), None);

        // The first substage runs off a self-update like every later one
        if let Err(error) = self.context(&link).kick_off(&created).await
        {
            warn!(task_link = %link, error = %error, "Task created but could not be started");
        }

        Ok(created)
    }

    /// Check a creation body and build the not-yet-initialized task from it
    pub fn validate_create(&self, body: TaskUpdateOf<H>) -> Result<TaskRecordOf<H>> {
        let lifecycle_rules = [FieldRule::new(
            fields::STAGE,
            FieldConstraint::ServiceOwned,
            stage_value::<H::SubStage, H::Payload>,
        )];
        validate_fields(&body, &lifecycle_rules)?;
        validate_fields(&body, self.handler.create_rules())?;

        let factory_link = self.handler.factory_link();
        let id = body
            .self_link
            .filter(|link| !link.trim().is_empty())
            .unwrap_or_else(|| self.handler.document_id(&body.payload));
        let self_link = if id.starts_with(factory_link) {
            id
        } else {
            build_link(factory_link, &id)
        };

        Ok(TaskRecord {
            stage: TaskStage::Created,
            failure_message: None,
            payload: body.payload,
            document: DocumentMeta {
                expiration_time_micros: body.expiration_time_micros.filter(|t| *t > 0),
                ..DocumentMeta::with_link(self_link)
            },
        })
    }

    /// Enter the initial substage and fix the absolute expiry.
    ///
    /// A requested lifetime wins over an explicit expiry, which wins over the
    /// configured default lifetime.
    pub fn initialize(&self, task: &mut TaskRecordOf<H>) {
        task.stage = TaskStage::Started(self.handler.initial_sub_stage());

        if let Some(lifetime) = self.handler.requested_lifetime(&task.payload) {
            task.document.expiration_time_micros = Some(expiration_from_now(lifetime));
        } else if task.document.expiration_time_micros.is_none() {
            task.document.expiration_time_micros =
                Some(expiration_from_now(self.default_lifetime));
        }
    }

    /// Decide whether `update` may be applied to `current`, yielding the
    /// proposed stage
    pub fn validate_transition(
        current: &TaskRecordOf<H>,
        update: &TaskUpdateOf<H>,
    ) -> StateMachineResult<TaskStage<H::SubStage>> {
        if current.stage.is_terminal() {
            return Err(GuardError::TerminalStage {
                stage: current.stage.kind(),
            }
            .into());
        }

        let kind = update.stage.ok_or(StateMachineError::MissingStage)?;
        let proposed = TaskStage::from_parts(kind, update.sub_stage)?;

        TransitionGuard::check(&TransitionRequest {
            current: current.stage,
            current_version: current.document.version,
            proposed,
            source_version: update.source_version,
        })?;

        Ok(proposed)
    }

    /// Merge an accepted update into the stored task
    pub fn apply_update(
        handler: &H,
        current: &mut TaskRecordOf<H>,
        proposed: TaskStage<H::SubStage>,
        update: &TaskUpdateOf<H>,
    ) {
        current.stage = proposed;
        if let Some(message) = &update.failure_message {
            current.failure_message = Some(message.clone());
        }
        if let Some(expiration) = update.expiration_time_micros {
            current.document.expiration_time_micros = Some(expiration);
        }
        handler.merge_payload(&mut current.payload, &update.payload);
    }

    /// The single update pipeline.
    ///
    /// The substage handler runs again only when the update moves the task
    /// into a different substage.
    pub async fn update(&self, link: &str, update: TaskUpdateOf<H>) -> Result<TaskRecordOf<H>> {
        self.process_update(link, update, false).await
    }

    #[instrument(skip(self, update), fields(stage = ?update.stage))]
    async fn process_update(
        &self,
        link: &str,
        update: TaskUpdateOf<H>,
        kick_off: bool,
    ) -> Result<TaskRecordOf<H>> {
        let handler = Arc::clone(&self.handler);
        let from_slot: Arc<Mutex<Option<TaskStage<H::SubStage>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&from_slot);

        let result = self
            .store
            .update(
                link,
                Box::new(move |current: &mut TaskRecordOf<H>| {
                    let proposed = Self::validate_transition(current, &update)?;
                    *slot.lock() = Some(current.stage);
                    Self::apply_update(&handler, current, proposed, &update);
                    Ok(())
                }),
            )
            .await;

        let updated = match result {
            Ok(updated) => updated,
            Err(error) => {
                debug!(task_link = %link, error = %error, "Task update rejected");
                return Err(error);
            }
        };

        let from = from_slot.lock().take().unwrap_or(updated.stage);
        log_task_operation(
            "update",
            link,
            &updated.stage.to_string(),
            Some(&format!("from {from} at version {}", updated.document.version)),
        );

        self.after_transition(from, &updated, kick_off).await;
        Ok(updated)
    }

    pub fn context(&self, link: &str) -> TaskContext<H> {
        TaskContext::new(link, Arc::clone(&self.handler), self.updates.clone())
    }

    async fn after_transition(
        &self,
        from: TaskStage<H::SubStage>,
        task: &TaskRecordOf<H>,
        kick_off: bool,
    ) {
        let transition = Transition {
            task_link: task.self_link().to_string(),
            from,
            to: task.stage,
            version: task.document.version,
            failure_message: task.failure_message.clone(),
        };

        for action in &self.actions {
            debug!(task_link = %transition.task_link, action = action.description(), "Running action");
            action.execute(&transition).await;
        }

        if !kick_off && from == task.stage {
            return;
        }
        if let TaskStage::Started(sub_stage) = task.stage {
            let handler = Arc::clone(&self.handler);
            let ctx = self.context(task.self_link());
            let task = task.clone();
            tokio::spawn(async move {
                let link = task.self_link().to_string();
                if let Err(error) = handler.handle_sub_stage(task, sub_stage, ctx).await {
                    log_error(
                        "task_state_machine",
                        "handle_sub_stage",
                        &error.to_string(),
                        Some(&link),
                    );
                }
            });
        }
    }

    async fn run_dispatcher(machine: Weak<Self>, mut receiver: mpsc::Receiver<SelfUpdate<H>>) {
        while let Some(SelfUpdate {
            link,
            update,
            kick_off,
        }) = receiver.recv().await
        {
            let Some(machine) = machine.upgrade() else {
                break;
            };
            tokio::spawn(async move {
                match machine.process_update(&link, update, kick_off).await {
                    Ok(_) => {}
                    Err(ProvisionerError::TransitionConflict(reason)) => {
                        debug!(task_link = %link, reason = %reason, "Stale self-update discarded");
                    }
                    Err(error) => {
                        warn!(task_link = %link, error = %error, "Self-update rejected");
                    }
                }
            });
        }
        debug!("Self-update dispatcher stopped");
    }
}

fn stage_value<S: SubStage, P>(update: &TaskUpdate<S, P>) -> FieldValue {
    match update.stage {
        Some(stage) if stage != TaskStageKind::Created => FieldValue::Present,
        _ => FieldValue::Absent,
    }
}
