use super::errors::{GuardError, GuardResult};
use super::states::{SubStage, TaskStage, TaskStageKind};

/// A proposed move from the stored stage to a new one
#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest<S> {
    pub current: TaskStage<S>,
    pub current_version: u64,
    pub proposed: TaskStage<S>,
    /// Version the proposer read before deriving the update, if it says so
    pub source_version: Option<u64>,
}

/// Trait for implementing state transition guards
pub trait StateGuard<S: SubStage>: Send + Sync {
    /// Check if a transition is allowed
    fn check(&self, request: &TransitionRequest<S>) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Terminal tasks accept no further transitions
pub struct NotTerminalGuard;

impl<S: SubStage> StateGuard<S> for NotTerminalGuard {
    fn check(&self, request: &TransitionRequest<S>) -> GuardResult<()> {
        if request.current.is_terminal() {
            return Err(GuardError::TerminalStage {
                stage: request.current.kind(),
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Task must not be in a terminal stage"
    }
}

/// No update may move a task back to CREATED
pub struct StageProgressGuard;

impl<S: SubStage> StateGuard<S> for StageProgressGuard {
    fn check(&self, request: &TransitionRequest<S>) -> GuardResult<()> {
        if request.proposed.kind() == TaskStageKind::Created {
            return Err(GuardError::StageRegression {
                current: request.current.kind(),
                proposed: TaskStageKind::Created,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Task stage must not move backwards"
    }
}

/// While STARTED, the substage never decreases
pub struct SubStageMonotonicGuard;

impl<S: SubStage> StateGuard<S> for SubStageMonotonicGuard {
    fn check(&self, request: &TransitionRequest<S>) -> GuardResult<()> {
        if let (TaskStage::Started(current), TaskStage::Started(proposed)) =
            (request.current, request.proposed)
        {
            if proposed < current {
                return Err(GuardError::SubStageRegression {
                    current: current.to_string(),
                    proposed: proposed.to_string(),
                });
            }
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Task substage must not move backwards"
    }
}

/// Rejects a repeat of the current substage derived from an older version.
///
/// A handler that read version N and proposes the substage the task is
/// already in lost a race against another writer; applying it would run the
/// same substage work twice.
pub struct StaleUpdateGuard;

impl<S: SubStage> StateGuard<S> for StaleUpdateGuard {
    fn check(&self, request: &TransitionRequest<S>) -> GuardResult<()> {
        let (TaskStage::Started(current), TaskStage::Started(proposed)) =
            (request.current, request.proposed)
        else {
            return Ok(());
        };

        match request.source_version {
            Some(source_version)
                if proposed == current && source_version < request.current_version =>
            {
                Err(GuardError::StaleUpdate {
                    source_version,
                    current_version: request.current_version,
                    sub_stage: current.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn description(&self) -> &'static str {
        "Repeated substage must come from the current version"
    }
}

/// The fixed guard chain every task update passes through, in order
pub struct TransitionGuard;

impl TransitionGuard {
    pub fn check<S: SubStage>(request: &TransitionRequest<S>) -> GuardResult<()> {
        NotTerminalGuard.check(request)?;
        StageProgressGuard.check(request)?;
        SubStageMonotonicGuard.check(request)?;
        StaleUpdateGuard.check(request)
    }
}
