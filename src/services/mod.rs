//! Business rules between the HTTP handlers and the repository.
//!
//! Services take `&dyn Repository` plus the current time, so every rule is testable
//! against `InMemoryRepository` with a fixed clock. Ownership and enrollment checks
//! live in `access` and run before any read or write of course content.

pub mod access;
pub mod accounts;
pub mod courses;
pub mod essays;
pub mod flashcards;
pub mod notifications;
pub mod payments;
pub mod progress;
pub mod quiz_attempt;
pub mod quiz_authoring;
pub mod reminder;

use crate::error::ServiceError;

/// Maps an empty or whitespace-only field to a 400.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}
