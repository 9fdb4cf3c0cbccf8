//! Quiz engine: pure attempt and scoring logic, free of I/O.
//!
//! The attempt service in `services::quiz_attempt` loads data through the repository
//! and delegates every decision to these modules.

pub mod attempt;
pub mod layout;
pub mod mapper;
pub mod scoring;
pub mod validation;

pub use attempt::{AttemptEvent, AttemptScore, TransitionError};
pub use scoring::{Score, ScoringError, ScoringStrategy, score_answer, strategy_for};
