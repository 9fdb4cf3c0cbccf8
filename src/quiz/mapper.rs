//! Shapes attempts into learner-facing views.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AnswerReview, AttemptResult, AttemptView, OptionView, QuestionType, QuestionView,
    QuizAttempt, QuizContent, QuizUserAnswer, SectionView,
};

use super::attempt::remaining_seconds;

/// to_attempt_view
///
/// Renders the attempt's frozen layout. Correctness flags never leave the server here;
/// matching questions expose their right-hand values sorted alphabetically.
pub fn to_attempt_view(
    content: &QuizContent,
    attempt: &QuizAttempt,
    answers: &[QuizUserAnswer],
    now: DateTime<Utc>,
) -> AttemptView {
    let saved: HashMap<Uuid, &QuizUserAnswer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let mut sections: Vec<SectionView> = Vec::new();
    for slot in &attempt.layout {
        let Some(question) = content.question(slot.question_id) else {
            continue;
        };
        let Some(section) = content.sections.iter().find(|s| s.id == question.section_id) else {
            continue;
        };
        let group = question
            .group_id
            .and_then(|gid| content.groups.iter().find(|g| g.id == gid));

        let options = slot
            .option_order
            .iter()
            .filter_map(|oid| question.options.iter().find(|o| o.id == *oid))
            .map(|o| OptionView { id: o.id, content: o.content.clone() })
            .collect();

        let mut match_choices: Vec<String> = if question.question_type == QuestionType::Matching {
            question
                .options
                .iter()
                .filter_map(|o| o.match_value.clone())
                .collect()
        } else {
            Vec::new()
        };
        match_choices.sort();
        match_choices.dedup();

        let view = QuestionView {
            id: question.id,
            question_type: question.question_type,
            prompt: question.prompt.clone(),
            points: question.points,
            group_id: question.group_id,
            group_passage: group.and_then(|g| g.passage.clone()),
            group_media_key: group.and_then(|g| g.media_key.clone()),
            options,
            match_choices,
            saved_answer: saved.get(&question.id).map(|a| a.answer.clone()),
        };

        // Consecutive slots of one section share a SectionView.
        match sections.last_mut() {
            Some(current) if current.id == section.id => current.questions.push(view),
            _ => sections.push(SectionView {
                id: section.id,
                title: section.title.clone(),
                instructions: section.instructions.clone(),
                questions: vec![view],
            }),
        }
    }

    AttemptView {
        attempt_id: attempt.id,
        quiz_id: attempt.quiz_id,
        quiz_title: content.quiz.title.clone(),
        status: attempt.status,
        attempt_number: attempt.attempt_number,
        started_at: attempt.started_at,
        expires_at: attempt.expires_at,
        remaining_seconds: remaining_seconds(attempt, now),
        sections,
    }
}

/// to_attempt_result
///
/// Per-question breakdown of a finalized attempt. Correct options and explanations are
/// only included when the quiz reveals answers after submission.
pub fn to_attempt_result(
    content: &QuizContent,
    attempt: QuizAttempt,
    answers: &[QuizUserAnswer],
) -> AttemptResult {
    let reveal = content.quiz.show_answers_after_submit;
    let by_question: HashMap<Uuid, &QuizUserAnswer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let reviews = attempt
        .layout
        .iter()
        .filter_map(|slot| content.question(slot.question_id))
        .map(|question| {
            let answer = by_question.get(&question.id);
            AnswerReview {
                question_id: question.id,
                answered: answer.is_some(),
                is_correct: answer.is_some_and(|a| a.is_correct),
                points_earned: answer.map_or(0.0, |a| a.points_earned),
                points_possible: question.points,
                correct_option_ids: reveal.then(|| question.correct_option_ids()),
                explanation: if reveal { question.explanation.clone() } else { None },
            }
        })
        .collect();

    AttemptResult { attempt, answers: reviews }
}
