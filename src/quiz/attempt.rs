//! Attempt state machine, deadlines and score aggregation.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AttemptSlot, AttemptStatus, Quiz, QuizAttempt, QuizContent, QuizUserAnswer};

/// Submissions arriving this long after the deadline still count as manual.
pub const SUBMIT_GRACE_SECONDS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    Start,
    Submit,
    Expire,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {event:?} to an attempt that is {from:?}")]
pub struct TransitionError {
    pub from: AttemptStatus,
    pub event: AttemptEvent,
}

/// Returns the status reached by applying `event` to `from`.
pub fn transition(from: AttemptStatus, event: AttemptEvent) -> Result<AttemptStatus, TransitionError> {
    match (from, event) {
        (AttemptStatus::Created, AttemptEvent::Start) => Ok(AttemptStatus::InProgress),
        (AttemptStatus::InProgress, AttemptEvent::Submit) => Ok(AttemptStatus::Submitted),
        (AttemptStatus::InProgress, AttemptEvent::Expire) => Ok(AttemptStatus::AutoSubmitted),
        _ => Err(TransitionError { from, event }),
    }
}

/// Builds a fresh attempt in `Created` state and starts it.
pub fn begin_attempt(
    quiz: &Quiz,
    user_id: Uuid,
    attempt_number: i32,
    layout: Vec<AttemptSlot>,
    now: DateTime<Utc>,
) -> Result<QuizAttempt, TransitionError> {
    let created = QuizAttempt {
        id: Uuid::new_v4(),
        quiz_id: quiz.id,
        user_id,
        status: AttemptStatus::Created,
        attempt_number,
        started_at: now,
        expires_at: None,
        submitted_at: None,
        score: 0.0,
        max_score: 0.0,
        percentage: 0.0,
        passed: None,
        layout,
    };

    Ok(QuizAttempt {
        status: transition(created.status, AttemptEvent::Start)?,
        expires_at: quiz
            .time_limit_minutes
            .filter(|m| *m > 0)
            .map(|m| now + Duration::minutes(i64::from(m))),
        ..created
    })
}

pub fn is_expired(attempt: &QuizAttempt, now: DateTime<Utc>) -> bool {
    attempt.expires_at.is_some_and(|deadline| now >= deadline)
}

pub fn remaining_seconds(attempt: &QuizAttempt, now: DateTime<Utc>) -> Option<i64> {
    attempt
        .expires_at
        .map(|deadline| (deadline - now).num_seconds().max(0))
}

/// Picks the finalizing event for a submit request at `now`.
pub fn submit_event(attempt: &QuizAttempt, now: DateTime<Utc>) -> AttemptEvent {
    match attempt.expires_at {
        Some(deadline) if now > deadline + Duration::seconds(SUBMIT_GRACE_SECONDS) => {
            AttemptEvent::Expire
        }
        _ => AttemptEvent::Submit,
    }
}

/// Aggregated score of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptScore {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub passed: bool,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sums the points of the questions in the layout and the points earned by the answers
/// that belong to it. Unanswered questions contribute zero.
pub fn aggregate_score(
    content: &QuizContent,
    layout: &[AttemptSlot],
    answers: &[QuizUserAnswer],
) -> AttemptScore {
    let max_score: f64 = layout
        .iter()
        .filter_map(|slot| content.question(slot.question_id))
        .map(|q| q.points)
        .sum();

    let score: f64 = answers
        .iter()
        .filter(|a| layout.iter().any(|slot| slot.question_id == a.question_id))
        .map(|a| a.points_earned)
        .sum();

    let percentage = if max_score > 0.0 {
        round2(score / max_score * 100.0)
    } else {
        0.0
    };

    AttemptScore {
        score: round2(score),
        max_score: round2(max_score),
        percentage,
        passed: percentage >= content.quiz.passing_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, UserAnswer};

    fn quiz(limit: Option<i32>) -> Quiz {
        Quiz {
            id: Uuid::new_v4(),
            time_limit_minutes: limit,
            passing_score: 60.0,
            ..Quiz::default()
        }
    }

    #[test]
    fn transitions_follow_the_lifecycle() {
        assert_eq!(
            transition(AttemptStatus::Created, AttemptEvent::Start),
            Ok(AttemptStatus::InProgress)
        );
        assert_eq!(
            transition(AttemptStatus::InProgress, AttemptEvent::Submit),
            Ok(AttemptStatus::Submitted)
        );
        assert_eq!(
            transition(AttemptStatus::InProgress, AttemptEvent::Expire),
            Ok(AttemptStatus::AutoSubmitted)
        );
        assert!(transition(AttemptStatus::Submitted, AttemptEvent::Submit).is_err());
        assert!(transition(AttemptStatus::AutoSubmitted, AttemptEvent::Expire).is_err());
        assert!(transition(AttemptStatus::Created, AttemptEvent::Submit).is_err());
    }

    #[test]
    fn begin_sets_deadline_from_time_limit() {
        let now = Utc::now();
        let timed = begin_attempt(&quiz(Some(15)), Uuid::new_v4(), 1, vec![], now).unwrap();
        assert_eq!(timed.status, AttemptStatus::InProgress);
        assert_eq!(timed.expires_at, Some(now + Duration::minutes(15)));
        assert_eq!(remaining_seconds(&timed, now), Some(900));
        assert!(!is_expired(&timed, now));
        assert!(is_expired(&timed, now + Duration::minutes(15)));

        let untimed = begin_attempt(&quiz(None), Uuid::new_v4(), 1, vec![], now).unwrap();
        assert_eq!(untimed.expires_at, None);
        assert!(!is_expired(&untimed, now + Duration::days(30)));
    }

    #[test]
    fn late_submission_beyond_grace_becomes_auto_submit() {
        let now = Utc::now();
        let attempt = begin_attempt(&quiz(Some(1)), Uuid::new_v4(), 1, vec![], now).unwrap();
        let deadline = now + Duration::minutes(1);

        assert_eq!(submit_event(&attempt, deadline), AttemptEvent::Submit);
        assert_eq!(
            submit_event(&attempt, deadline + Duration::seconds(SUBMIT_GRACE_SECONDS)),
            AttemptEvent::Submit
        );
        assert_eq!(
            submit_event(&attempt, deadline + Duration::seconds(SUBMIT_GRACE_SECONDS + 1)),
            AttemptEvent::Expire
        );
    }

    #[test]
    fn aggregate_counts_only_layout_questions() {
        let q1 = Question { id: Uuid::new_v4(), points: 2.0, ..Question::default() };
        let q2 = Question { id: Uuid::new_v4(), points: 1.0, ..Question::default() };
        let content = QuizContent {
            quiz: quiz(None),
            questions: vec![q1.clone(), q2.clone()],
            ..QuizContent::default()
        };
        let layout = vec![
            AttemptSlot { question_id: q1.id, option_order: vec![] },
            AttemptSlot { question_id: q2.id, option_order: vec![] },
        ];
        let answer = QuizUserAnswer {
            id: Uuid::new_v4(),
            attempt_id: Uuid::nil(),
            question_id: q1.id,
            answer: UserAnswer::Text { text: String::new() },
            is_correct: true,
            points_earned: 2.0,
            answered_at: Utc::now(),
        };
        let stray = QuizUserAnswer { question_id: Uuid::new_v4(), ..answer.clone() };

        let result = aggregate_score(&content, &layout, &[answer, stray]);
        assert_eq!(result.score, 2.0);
        assert_eq!(result.max_score, 3.0);
        assert_eq!(result.percentage, 66.67);
        assert!(result.passed);
    }

    #[test]
    fn empty_quiz_scores_zero_percent() {
        let content = QuizContent { quiz: quiz(None), ..QuizContent::default() };
        let result = aggregate_score(&content, &[], &[]);
        assert_eq!(result.percentage, 0.0);
        assert!(!result.passed);
    }
}
