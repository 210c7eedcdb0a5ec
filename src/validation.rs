//! Input validation for request bodies
//!
//! Request bodies carry every attribute as an explicit optional field. Which
//! attributes a caller must, may, or must not supply is declared as a table
//! of [`FieldRule`]s and checked in one pass before anything is stored.

use crate::error::{ProvisionerError, Result};

/// What a single rule demands of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldConstraint {
    /// Must be present
    Required,
    /// Must be absent: the service owns this field
    ServiceOwned,
    /// If present, must be strictly greater than zero
    Positive,
}

/// What a body holds for a field, as seen by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Absent,
    Present,
    Number(i64),
}

impl FieldValue {
    pub fn of<T>(value: &Option<T>) -> Self {
        match value {
            Some(_) => Self::Present,
            None => Self::Absent,
        }
    }

    pub fn number(value: Option<i64>) -> Self {
        value.map_or(Self::Absent, Self::Number)
    }

    /// Strings count as absent when blank
    pub fn text(value: &Option<String>) -> Self {
        match value {
            Some(s) if !s.trim().is_empty() => Self::Present,
            _ => Self::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// One row of a validation table
pub struct FieldRule<T> {
    pub field: &'static str,
    pub constraint: FieldConstraint,
    pub extract: fn(&T) -> FieldValue,
}

impl<T> FieldRule<T> {
    pub const fn new(
        field: &'static str,
        constraint: FieldConstraint,
        extract: fn(&T) -> FieldValue,
    ) -> Self {
        Self {
            field,
            constraint,
            extract,
        }
    }

    fn check(&self, body: &T) -> Result<()> {
        let value = (self.extract)(body);
        match (self.constraint, value) {
            (FieldConstraint::Required, FieldValue::Absent) => Err(
                ProvisionerError::InvalidArgument(format!("{} is required", self.field)),
            ),
            (FieldConstraint::ServiceOwned, v) if v.is_present() => {
                Err(ProvisionerError::InvalidArgument(format!(
                    "Do not specify {}: internal use only",
                    self.field
                )))
            }
            (FieldConstraint::Positive, FieldValue::Number(n)) if n <= 0 => Err(
                ProvisionerError::InvalidArgument(format!("{} must be positive", self.field)),
            ),
            _ => Ok(()),
        }
    }
}

/// Check every rule in order, failing on the first violation
pub fn validate_fields<T>(body: &T, rules: &[FieldRule<T>]) -> Result<()> {
    rules.iter().try_for_each(|rule| rule.check(body))
}
