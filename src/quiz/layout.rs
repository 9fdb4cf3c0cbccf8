//! Freezes the order in which an attempt presents questions and options.

use rand::{Rng, seq::SliceRandom};
use uuid::Uuid;

use crate::models::{AttemptSlot, Question, QuestionType, QuizContent};

/// A question group moves as one unit; standalone questions are units of one.
struct Unit<'a> {
    position: i32,
    questions: Vec<&'a Question>,
}

fn option_order<R: Rng + ?Sized>(question: &Question, shuffle: bool, rng: &mut R) -> Vec<Uuid> {
    if question.question_type == QuestionType::FillInBlank {
        // Options are the accepted answers.
        return Vec::new();
    }

    let mut options: Vec<_> = question.options.iter().collect();
    options.sort_by_key(|o| o.position);
    let canonical: Vec<Uuid> = options.iter().map(|o| o.id).collect();

    let mut order = canonical.clone();
    if question.question_type == QuestionType::Ordering {
        order.shuffle(rng);
        if order == canonical && order.len() > 1 {
            order.rotate_left(1);
        }
    } else if shuffle {
        order.shuffle(rng);
    }
    order
}

/// Builds the attempt layout: sections in position order, units inside a section in
/// position order (shuffled when the quiz asks for it), options per question.
pub fn build_layout<R: Rng + ?Sized>(content: &QuizContent, rng: &mut R) -> Vec<AttemptSlot> {
    let quiz = &content.quiz;
    let mut sections: Vec<_> = content.sections.iter().collect();
    sections.sort_by_key(|s| s.position);

    let mut layout = Vec::with_capacity(content.questions.len());
    for section in sections {
        let mut units: Vec<Unit<'_>> = Vec::new();

        for question in content
            .questions
            .iter()
            .filter(|q| q.section_id == section.id && q.group_id.is_none())
        {
            units.push(Unit { position: question.position, questions: vec![question] });
        }

        for group in content.groups.iter().filter(|g| g.section_id == section.id) {
            let mut questions: Vec<&Question> = content
                .questions
                .iter()
                .filter(|q| q.group_id == Some(group.id))
                .collect();
            if questions.is_empty() {
                continue;
            }
            questions.sort_by_key(|q| q.position);
            units.push(Unit { position: group.position, questions });
        }

        units.sort_by_key(|u| u.position);
        if quiz.shuffle_questions {
            units.shuffle(rng);
        }

        for question in units.into_iter().flat_map(|u| u.questions) {
            layout.push(AttemptSlot {
                question_id: question.id,
                option_order: option_order(question, quiz.shuffle_answers, rng),
            });
        }
    }
    layout
}
