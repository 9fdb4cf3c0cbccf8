//! Authoring rules for quiz questions.

use crate::models::{CreateQuestionRequest, CreateQuizRequest, QuestionType};

pub fn validate_quiz_settings(req: &CreateQuizRequest) -> Result<(), String> {
    if req.title.trim().is_empty() {
        return Err("Quiz title is required".to_string());
    }
    check_settings(req.passing_score, req.time_limit_minutes, req.max_attempts)
}

pub fn check_settings(
    passing_score: f64,
    time_limit_minutes: Option<i32>,
    max_attempts: Option<i32>,
) -> Result<(), String> {
    if !(0.0..=100.0).contains(&passing_score) {
        return Err("Passing score must be between 0 and 100".to_string());
    }
    if time_limit_minutes.is_some_and(|m| m <= 0) {
        return Err("Time limit must be positive".to_string());
    }
    if max_attempts.is_some_and(|m| m <= 0) {
        return Err("Max attempts must be positive".to_string());
    }
    Ok(())
}

/// Checks that a question's options can be scored by the strategy of its type.
pub fn validate_question(req: &CreateQuestionRequest) -> Result<(), String> {
    if req.prompt.trim().is_empty() {
        return Err("Question prompt is required".to_string());
    }
    if req.points.is_some_and(|p| p <= 0.0) {
        return Err("Question points must be positive".to_string());
    }
    if req.options.iter().any(|o| o.content.trim().is_empty()) {
        return Err("Options must not be empty".to_string());
    }

    let correct = req.options.iter().filter(|o| o.is_correct).count();
    match req.question_type {
        QuestionType::MultipleChoice if correct != 1 || req.options.len() < 2 => {
            Err("Multiple choice needs at least two options and exactly one correct".to_string())
        }
        QuestionType::TrueFalse if req.options.len() != 2 || correct != 1 => {
            Err("True/false needs exactly two options and one correct".to_string())
        }
        QuestionType::MultipleAnswers if correct == 0 || req.options.len() < 2 => {
            Err("Multiple answers needs at least two options and one correct".to_string())
        }
        QuestionType::FillInBlank if correct == 0 => {
            Err("Fill in the blank needs at least one accepted answer".to_string())
        }
        QuestionType::Matching
            if req.options.is_empty()
                || req
                    .options
                    .iter()
                    .any(|o| o.match_value.as_deref().is_none_or(|v| v.trim().is_empty())) =>
        {
            Err("Every matching option needs a match value".to_string())
        }
        QuestionType::Ordering if req.options.len() < 2 => {
            Err("Ordering needs at least two options".to_string())
        }
        _ => Ok(()),
    }
}
