use crate::error::ProvisionerError;
use thiserror::Error;

use super::states::TaskStageKind;

/// Errors raised while validating or applying a task transition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Missing stage")]
    MissingStage,

    #[error("Missing substage")]
    MissingSubStage,

    #[error("Guard condition failed: {0}")]
    GuardFailed(#[from] GuardError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specific error type for guard condition failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Task is in terminal stage {stage}")]
    TerminalStage { stage: TaskStageKind },

    #[error("Task stage cannot move backwards: {current} -> {proposed}")]
    StageRegression {
        current: TaskStageKind,
        proposed: TaskStageKind,
    },

    #[error("Task substage cannot move backwards: {current} -> {proposed}")]
    SubStageRegression { current: String, proposed: String },

    #[error(
        "Stale update: derived from version {source_version}, task is at version {current_version} in substage {sub_stage}"
    )]
    StaleUpdate {
        source_version: u64,
        current_version: u64,
        sub_stage: String,
    },
}

impl GuardError {
    /// Conflicts are losers of a race against a state that already moved
    /// on; everything else is a malformed request
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::TerminalStage { .. } | Self::StaleUpdate { .. })
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;

impl From<StateMachineError> for ProvisionerError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::GuardFailed(guard) if guard.is_conflict() => {
                ProvisionerError::TransitionConflict(guard.to_string())
            }
            StateMachineError::GuardFailed(guard) => {
                ProvisionerError::InvalidArgument(guard.to_string())
            }
            StateMachineError::Internal(msg) => ProvisionerError::Dispatch(msg),
            other => ProvisionerError::InvalidArgument(other.to_string()),
        }
    }
}

impl From<GuardError> for ProvisionerError {
    fn from(err: GuardError) -> Self {
        StateMachineError::from(err).into()
    }
}
