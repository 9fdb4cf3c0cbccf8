//! HTTP handlers.
//!
//! Each handler extracts its inputs, delegates to `services`, and wraps the outcome in
//! a `ServiceResponse`. Authorization beyond "is logged in" lives in the services.

pub mod admin;
pub mod attempts;
pub mod auth;
pub mod courses;
pub mod essays;
pub mod flashcards;
pub mod notifications;
pub mod payments;
pub mod progress;
pub mod quizzes;
pub mod upload;
