//! Per-question-type scoring.
//!
//! Every [`QuestionType`] has one [`ScoringStrategy`]; [`strategy_for`] performs the
//! dispatch and [`score_answer`] is the entry point used by the attempt service.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Question, QuestionType, UserAnswer};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("answer kind does not match a {0:?} question")]
    KindMismatch(QuestionType),
    #[error("option {0} does not belong to this question")]
    UnknownOption(Uuid),
}

/// Outcome of scoring a single answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub is_correct: bool,
    pub points_earned: f64,
}

impl Score {
    fn all_or_nothing(question: &Question, is_correct: bool) -> Self {
        Self {
            is_correct,
            points_earned: if is_correct { question.points } else { 0.0 },
        }
    }
}

pub trait ScoringStrategy: Send + Sync {
    fn score(&self, question: &Question, answer: &UserAnswer) -> Result<Score, ScoringError>;
}

fn ensure_known_options(question: &Question, ids: &[Uuid]) -> Result<(), ScoringError> {
    match ids
        .iter()
        .find(|id| !question.options.iter().any(|o| o.id == **id))
    {
        Some(unknown) => Err(ScoringError::UnknownOption(*unknown)),
        None => Ok(()),
    }
}

/// Multiple choice and true/false: exactly one option, and it is the correct one.
pub struct SingleChoiceStrategy;

impl ScoringStrategy for SingleChoiceStrategy {
    fn score(&self, question: &Question, answer: &UserAnswer) -> Result<Score, ScoringError> {
        let UserAnswer::Choice { option_ids } = answer else {
            return Err(ScoringError::KindMismatch(question.question_type));
        };
        ensure_known_options(question, option_ids)?;

        let correct = question.correct_option_ids();
        let is_correct = option_ids.len() == 1 && correct.len() == 1 && option_ids[0] == correct[0];
        Ok(Score::all_or_nothing(question, is_correct))
    }
}

/// Multiple answers: the selected set must equal the correct set.
pub struct MultipleAnswersStrategy;

impl ScoringStrategy for MultipleAnswersStrategy {
    fn score(&self, question: &Question, answer: &UserAnswer) -> Result<Score, ScoringError> {
        let UserAnswer::Choice { option_ids } = answer else {
            return Err(ScoringError::KindMismatch(question.question_type));
        };
        ensure_known_options(question, option_ids)?;

        let selected: HashSet<Uuid> = option_ids.iter().copied().collect();
        let correct: HashSet<Uuid> = question.correct_option_ids().into_iter().collect();
        let is_correct = !correct.is_empty() && selected == correct;
        Ok(Score::all_or_nothing(question, is_correct))
    }
}

/// Lowercases and collapses internal whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Fill in the blank: the text matches any accepted answer after normalization.
pub struct FillInBlankStrategy;

impl ScoringStrategy for FillInBlankStrategy {
    fn score(&self, question: &Question, answer: &UserAnswer) -> Result<Score, ScoringError> {
        let UserAnswer::Text { text } = answer else {
            return Err(ScoringError::KindMismatch(question.question_type));
        };

        let given = normalize_text(text);
        let is_correct = !given.is_empty()
            && question
                .options
                .iter()
                .filter(|o| o.is_correct)
                .any(|o| normalize_text(&o.content) == given);
        Ok(Score::all_or_nothing(question, is_correct))
    }
}

/// Matching: partial credit per correctly paired option.
pub struct MatchingStrategy;

impl ScoringStrategy for MatchingStrategy {
    fn score(&self, question: &Question, answer: &UserAnswer) -> Result<Score, ScoringError> {
        let UserAnswer::Matching { pairs } = answer else {
            return Err(ScoringError::KindMismatch(question.question_type));
        };
        let ids: Vec<Uuid> = pairs.iter().map(|p| p.option_id).collect();
        ensure_known_options(question, &ids)?;

        // Later pairs for the same option overwrite earlier ones.
        let given: HashMap<Uuid, String> = pairs
            .iter()
            .map(|p| (p.option_id, normalize_text(&p.value)))
            .collect();

        let total = question.options.len();
        if total == 0 {
            return Ok(Score::all_or_nothing(question, false));
        }

        let matched = question
            .options
            .iter()
            .filter(|o| {
                match (o.match_value.as_deref(), given.get(&o.id)) {
                    (Some(expected), Some(value)) => normalize_text(expected) == *value,
                    _ => false,
                }
            })
            .count();

        Ok(Score {
            is_correct: matched == total,
            points_earned: question.points * matched as f64 / total as f64,
        })
    }
}

/// Ordering: the submitted sequence equals the options sorted by position.
pub struct OrderingStrategy;

impl ScoringStrategy for OrderingStrategy {
    fn score(&self, question: &Question, answer: &UserAnswer) -> Result<Score, ScoringError> {
        let UserAnswer::Ordering { option_ids } = answer else {
            return Err(ScoringError::KindMismatch(question.question_type));
        };
        ensure_known_options(question, option_ids)?;

        let mut expected: Vec<_> = question.options.iter().collect();
        expected.sort_by_key(|o| o.position);
        let expected: Vec<Uuid> = expected.into_iter().map(|o| o.id).collect();

        Ok(Score::all_or_nothing(question, *option_ids == expected))
    }
}

static SINGLE_CHOICE: SingleChoiceStrategy = SingleChoiceStrategy;
static MULTIPLE_ANSWERS: MultipleAnswersStrategy = MultipleAnswersStrategy;
static FILL_IN_BLANK: FillInBlankStrategy = FillInBlankStrategy;
static MATCHING: MatchingStrategy = MatchingStrategy;
static ORDERING: OrderingStrategy = OrderingStrategy;

/// Selects the scoring strategy for a question type.
pub fn strategy_for(question_type: QuestionType) -> &'static dyn ScoringStrategy {
    match question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => &SINGLE_CHOICE,
        QuestionType::MultipleAnswers => &MULTIPLE_ANSWERS,
        QuestionType::FillInBlank => &FILL_IN_BLANK,
        QuestionType::Matching => &MATCHING,
        QuestionType::Ordering => &ORDERING,
    }
}

pub fn score_answer(question: &Question, answer: &UserAnswer) -> Result<Score, ScoringError> {
    strategy_for(question.question_type).score(question, answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerOption, MatchPair};

    fn option(content: &str, is_correct: bool, position: i32) -> AnswerOption {
        AnswerOption {
            id: Uuid::new_v4(),
            question_id: Uuid::nil(),
            content: content.to_string(),
            is_correct,
            match_value: None,
            position,
        }
    }

    fn question(question_type: QuestionType, options: Vec<AnswerOption>) -> Question {
        Question {
            id: Uuid::new_v4(),
            question_type,
            prompt: "prompt".to_string(),
            points: 2.0,
            options,
            ..Question::default()
        }
    }

    #[test]
    fn single_choice_requires_exactly_the_correct_option() {
        let q = question(
            QuestionType::MultipleChoice,
            vec![option("cat", true, 0), option("dog", false, 1)],
        );
        let right = q.options[0].id;
        let wrong = q.options[1].id;

        let hit = score_answer(&q, &UserAnswer::Choice { option_ids: vec![right] }).unwrap();
        assert!(hit.is_correct);
        assert_eq!(hit.points_earned, 2.0);

        let miss = score_answer(&q, &UserAnswer::Choice { option_ids: vec![wrong] }).unwrap();
        assert!(!miss.is_correct);
        assert_eq!(miss.points_earned, 0.0);

        let both =
            score_answer(&q, &UserAnswer::Choice { option_ids: vec![right, wrong] }).unwrap();
        assert!(!both.is_correct);
    }

    #[test]
    fn multiple_answers_is_all_or_nothing() {
        let q = question(
            QuestionType::MultipleAnswers,
            vec![option("a", true, 0), option("b", true, 1), option("c", false, 2)],
        );
        let (a, b, c) = (q.options[0].id, q.options[1].id, q.options[2].id);

        assert!(score_answer(&q, &UserAnswer::Choice { option_ids: vec![b, a] }).unwrap().is_correct);
        assert!(!score_answer(&q, &UserAnswer::Choice { option_ids: vec![a] }).unwrap().is_correct);
        assert!(
            !score_answer(&q, &UserAnswer::Choice { option_ids: vec![a, b, c] })
                .unwrap()
                .is_correct
        );
    }

    #[test]
    fn fill_in_blank_normalizes_case_and_whitespace() {
        let q = question(
            QuestionType::FillInBlank,
            vec![option("New  York", true, 0), option("NYC", true, 1)],
        );

        let spaced = UserAnswer::Text { text: "  new york ".to_string() };
        assert!(score_answer(&q, &spaced).unwrap().is_correct);
        let alias = UserAnswer::Text { text: "nyc".to_string() };
        assert!(score_answer(&q, &alias).unwrap().is_correct);
        let empty = UserAnswer::Text { text: "   ".to_string() };
        assert!(!score_answer(&q, &empty).unwrap().is_correct);
    }

    #[test]
    fn matching_awards_partial_credit() {
        let mut left = option("dog", false, 0);
        left.match_value = Some("chó".to_string());
        let mut right = option("cat", false, 1);
        right.match_value = Some("mèo".to_string());
        let q = question(QuestionType::Matching, vec![left, right]);

        let half = UserAnswer::Matching {
            pairs: vec![
                MatchPair { option_id: q.options[0].id, value: "Chó".to_string() },
                MatchPair { option_id: q.options[1].id, value: "chó".to_string() },
            ],
        };
        let score = score_answer(&q, &half).unwrap();
        assert!(!score.is_correct);
        assert_eq!(score.points_earned, 1.0);

        let full = UserAnswer::Matching {
            pairs: vec![
                MatchPair { option_id: q.options[0].id, value: "chó".to_string() },
                MatchPair { option_id: q.options[1].id, value: "mèo".to_string() },
            ],
        };
        let score = score_answer(&q, &full).unwrap();
        assert!(score.is_correct);
        assert_eq!(score.points_earned, 2.0);
    }

    #[test]
    fn ordering_compares_against_positions() {
        let q = question(
            QuestionType::Ordering,
            vec![option("second", false, 1), option("first", false, 0)],
        );
        let (second, first) = (q.options[0].id, q.options[1].id);

        let right = UserAnswer::Ordering { option_ids: vec![first, second] };
        assert!(score_answer(&q, &right).unwrap().is_correct);
        let wrong = UserAnswer::Ordering { option_ids: vec![second, first] };
        assert!(!score_answer(&q, &wrong).unwrap().is_correct);
    }

    #[test]
    fn mismatched_kind_and_foreign_options_are_rejected() {
        let q = question(QuestionType::TrueFalse, vec![option("True", true, 0), option("False", false, 1)]);

        let text = UserAnswer::Text { text: "true".to_string() };
        assert_eq!(
            score_answer(&q, &text),
            Err(ScoringError::KindMismatch(QuestionType::TrueFalse))
        );

        let stranger = Uuid::new_v4();
        assert_eq!(
            score_answer(&q, &UserAnswer::Choice { option_ids: vec![stranger] }),
            Err(ScoringError::UnknownOption(stranger))
        );
    }
}
