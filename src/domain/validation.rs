//! Field validation
//!
//! Collects field-level problems so callers get every message at once
//! instead of the first failing rule.

use serde::Serialize;
use std::fmt;

use super::DomainError;

/// A single field/message pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Ordered list of field errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Record a failure when `value` is empty or whitespace
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, format!("{} is required", field));
        }
    }

    /// Record a failure when an optional value is absent or blank
    pub fn require_present(&mut self, field: &str, value: Option<&str>) {
        match value {
            Some(v) if !v.trim().is_empty() => {}
            _ => self.add(field, format!("{} is required", field)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether any error was recorded against `field`
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// Ok when nothing was recorded, otherwise a `DomainError::Validation`
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}
