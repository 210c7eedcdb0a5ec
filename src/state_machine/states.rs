use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;

use super::errors::StateMachineError;

/// Coarse task lifecycle position, as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStageKind {
    /// Accepted but not yet running
    Created,
    /// Running; progress is tracked by the substage
    Started,
    /// Completed successfully
    Finished,
    /// Failed; see the task's failure message
    Failed,
    /// Cancelled by a caller
    Cancelled,
}

impl TaskStageKind {
    /// Check if this is a terminal stage (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Started => write!(f, "STARTED"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for TaskStageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "STARTED" => Ok(Self::Started),
            "FINISHED" => Ok(Self::Finished),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task stage: {s}")),
        }
    }
}

/// Fine-grained progress marker of a specialized task.
///
/// The derived `Ord` is the progress order: a task may only move to a
/// substage that compares greater than or equal to its current one.
pub trait SubStage:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Task lifecycle with the substage carried only by `Started`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStage<S> {
    Created,
    Started(S),
    Finished,
    Failed,
    Cancelled,
}

impl<S: SubStage> TaskStage<S> {
    /// Combine a wire stage and an optional wire substage.
    ///
    /// `Started` requires a substage; other stages carry none, so a supplied
    /// substage is dropped.
    pub fn from_parts(kind: TaskStageKind, sub_stage: Option<S>) -> Result<Self, StateMachineError> {
        match kind {
            TaskStageKind::Created => Ok(Self::Created),
            TaskStageKind::Started => sub_stage
                .map(Self::Started)
                .ok_or(StateMachineError::MissingSubStage),
            TaskStageKind::Finished => Ok(Self::Finished),
            TaskStageKind::Failed => Ok(Self::Failed),
            TaskStageKind::Cancelled => Ok(Self::Cancelled),
        }
    }

    pub fn kind(&self) -> TaskStageKind {
        match self {
            Self::Created => TaskStageKind::Created,
            Self::Started(_) => TaskStageKind::Started,
            Self::Finished => TaskStageKind::Finished,
            Self::Failed => TaskStageKind::Failed,
            Self::Cancelled => TaskStageKind::Cancelled,
        }
    }

    pub fn sub_stage(&self) -> Option<S> {
        match self {
            Self::Started(sub_stage) => Some(*sub_stage),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

impl<S: SubStage> fmt::Display for TaskStage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started(sub_stage) => write!(f, "STARTED({sub_stage})"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageParts<S> {
    stage: TaskStageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_stage: Option<S>,
}

// Serialized flat, as `stage` plus `subStage`, so documents keep the wire shape
impl<S: SubStage> Serialize for TaskStage<S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        StageParts {
            stage: self.kind(),
            sub_stage: self.sub_stage(),
        }
        .serialize(serializer)
    }
}

impl<'de, S: SubStage> Deserialize<'de> for TaskStage<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts = StageParts::<S>::deserialize(deserializer)?;
        TaskStage::from_parts(parts.stage, parts.sub_stage).map_err(serde::de::Error::custom)
    }
}
