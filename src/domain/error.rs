//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::validation::ValidationErrors;

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// One or more fields failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Unique constraint collision (email, business name, trade license)
    #[error("{field} is already registered")]
    Conflict { field: String },

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unknown vendor status value
    #[error("Invalid vendor status: {0}")]
    InvalidStatus(String),

    /// Duration could not be applied to a date
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Bundle holds more subscribers than its ceiling allows
    #[error("Bundle {bundle_id} is over capacity: {subscribers} subscribers, max {max_vendors}")]
    BundleCapacityExceeded {
        bundle_id: Uuid,
        subscribers: i64,
        max_vendors: i64,
    },

    /// Credentials did not match
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Business rule violation
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),
}

impl DomainError {
    /// Create a conflict error for a unique field
    pub fn conflict(field: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
        }
    }

    /// Create a not-found error for an entity kind
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::InvalidStatus(_)
                | Self::InvalidDuration(_)
                | Self::Unauthorized(_)
                | Self::BusinessRuleViolation(_)
                | Self::BundleCapacityExceeded { .. }
        )
    }

    /// Check if this is a uniqueness conflict
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
