// Self-driving task lifecycle
//
// A task is a document whose stage advances through updates it sends to
// itself. Callers and handlers share one update pipeline: guards decide
// whether a proposed stage is acceptable, the accepted update is merged and
// stored atomically, then actions and the next substage handler run.

pub mod actions;
pub mod context;
pub mod errors;
pub mod guards;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use context::{SelfUpdate, TaskContext};
pub use errors::{GuardError, StateMachineError};
pub use states::{SubStage, TaskStage, TaskStageKind};
pub use task_state_machine::{
    TaskHandler, TaskPayload, TaskRecord, TaskRecordOf, TaskStateMachine, TaskUpdate, TaskUpdateOf,
};

// Common traits and utilities
pub use actions::StateAction;
pub use guards::{StateGuard, TransitionGuard, TransitionRequest};
