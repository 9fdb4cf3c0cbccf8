mod common;

use axum::http::StatusCode;
use common::{TestApp, assert_envelope, id_of};
use coursehub::models::{AssessmentKind, ContentType, Role, User};
use serde_json::{Value, json};
use uuid::Uuid;

struct QuizSetup {
    teacher: User,
    course_id: Uuid,
    quiz_id: Uuid,
    choice_question: Uuid,
    correct_option: Uuid,
    wrong_option: Uuid,
    blank_question: Uuid,
}

fn uuid_at(value: &Value) -> Uuid {
    value.as_str().and_then(|s| Uuid::parse_str(s).ok()).expect("uuid")
}

/// A published free course with one quiz: a multiple choice question and a
/// fill-in-the-blank question, one point each.
async fn setup_quiz(app: &TestApp, max_attempts: Option<i32>) -> QuizSetup {
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let course = app.seed_course(&teacher, 0, true).await;
    let lesson = app.seed_lesson(&course).await;
    let module = app
        .seed_module(&lesson, ContentType::Assessment, Some(AssessmentKind::Quiz))
        .await;

    let (status, body) = app
        .post(
            &format!("/modules/{}/quiz", module.id),
            Some(teacher.id),
            json!({ "title": "Greetings check", "max_attempts": max_attempts, "show_answers_after_submit": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let quiz_id = id_of(&body["data"]);

    let (status, body) = app
        .post(&format!("/quizzes/{}/sections", quiz_id), Some(teacher.id), json!({ "title": "Vocabulary" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let section_id = id_of(&body["data"]);
    let questions_uri = format!("/sections/{}/questions", section_id);

    let (status, body) = app
        .post(
            &questions_uri,
            Some(teacher.id),
            json!({
                "question_type": "multiple_choice",
                "prompt": "How do you say hello?",
                "options": [
                    { "content": "Xin chào", "is_correct": true },
                    { "content": "Tạm biệt" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let choice = &body["data"];
    let options = choice["options"].as_array().unwrap();
    let correct_option = options.iter().find(|o| o["is_correct"] == true).map(id_of).unwrap();
    let wrong_option = options.iter().find(|o| o["is_correct"] == false).map(id_of).unwrap();
    assert_eq!(choice["points"].as_f64(), Some(1.0));

    let (status, body) = app
        .post(
            &questions_uri,
            Some(teacher.id),
            json!({
                "question_type": "fill_in_blank",
                "prompt": "Cảm ơn means ___",
                "options": [{ "content": "thank you", "is_correct": true }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let blank_question = id_of(&body["data"]);

    QuizSetup {
        teacher,
        course_id: course.id,
        quiz_id,
        choice_question: id_of(choice),
        correct_option,
        wrong_option,
        blank_question,
    }
}

#[tokio::test]
async fn test_quiz_authoring_validation() {
    let app = TestApp::new();
    let quiz = setup_quiz(&app, None).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;

    let (status, body) = app.get(&format!("/quizzes/{}/content", quiz.quiz_id), Some(quiz.teacher.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 2);
    let section_id = uuid_at(&body["data"]["sections"][0]["id"]);

    // Two correct answers on a single choice question.
    let (status, body) = app
        .post(
            &format!("/sections/{}/questions", section_id),
            Some(quiz.teacher.id),
            json!({
                "question_type": "multiple_choice",
                "prompt": "Pick one",
                "options": [{ "content": "a", "is_correct": true }, { "content": "b", "is_correct": true }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(status, &body);

    let (status, _) = app
        .put(&format!("/quizzes/{}", quiz.quiz_id), Some(quiz.teacher.id), json!({ "passing_score": 120.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Learners never see the answer key.
    let (status, _) = app.get(&format!("/quizzes/{}/content", quiz.quiz_id), Some(student.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_attempt_lifecycle() {
    let app = TestApp::new();
    let quiz = setup_quiz(&app, Some(1)).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    let stranger = app.seed_user("stranger@example.com", vec![Role::Student]).await;
    let attempts_uri = format!("/quizzes/{}/attempts", quiz.quiz_id);

    let (status, _) = app.post(&attempts_uri, Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post(&format!("/courses/{}/enroll", quiz.course_id), Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post(&attempts_uri, Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_progress");
    assert_eq!(body["data"]["attempt_number"], 1);
    let attempt_id = uuid_at(&body["data"]["attempt_id"]);

    // The learner view has no correctness flags.
    let view = body["data"]["sections"][0]["questions"].to_string();
    assert!(!view.contains("is_correct"));

    // Starting again resumes the running attempt.
    let (_, body) = app.post(&attempts_uri, Some(student.id), json!({})).await;
    assert_eq!(uuid_at(&body["data"]["attempt_id"]), attempt_id);

    let answers_uri = format!("/attempts/{}/answers", attempt_id);
    let (status, body) = app
        .put(
            &answers_uri,
            Some(student.id),
            json!({ "question_id": quiz.choice_question, "answer": { "kind": "choice", "option_ids": [quiz.wrong_option] } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_correct"], false);

    // A later answer replaces the earlier one.
    let (status, body) = app
        .put(
            &answers_uri,
            Some(student.id),
            json!({ "question_id": quiz.choice_question, "answer": { "kind": "choice", "option_ids": [quiz.correct_option] } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_correct"], true);

    let (status, _) = app
        .put(
            &answers_uri,
            Some(student.id),
            json!({ "question_id": quiz.blank_question, "answer": { "kind": "text", "text": "  Thank   You " } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .put(
            &answers_uri,
            Some(student.id),
            json!({ "question_id": Uuid::new_v4(), "answer": { "kind": "text", "text": "?" } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Wrong answer kind for the question type.
    let (status, _) = app
        .put(
            &answers_uri,
            Some(student.id),
            json!({ "question_id": quiz.choice_question, "answer": { "kind": "text", "text": "Xin chào" } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &answers_uri,
            Some(stranger.id),
            json!({ "question_id": quiz.blank_question, "answer": { "kind": "text", "text": "thanks" } }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let result_uri = format!("/attempts/{}/result", attempt_id);
    let (status, _) = app.get(&result_uri, Some(student.id)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let submit_uri = format!("/attempts/{}/submit", attempt_id);
    let (status, body) = app.post(&submit_uri, Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(status, &body);
    let attempt = &body["data"]["attempt"];
    assert_eq!(attempt["status"], "submitted");
    assert_eq!(attempt["score"].as_f64(), Some(2.0));
    assert_eq!(attempt["max_score"].as_f64(), Some(2.0));
    assert_eq!(attempt["percentage"].as_f64(), Some(100.0));
    assert_eq!(attempt["passed"], true);
    assert!(body["data"]["answers"][0]["correct_option_ids"].is_array());

    let (status, _) = app.post(&submit_uri, Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .put(
            &answers_uri,
            Some(student.id),
            json!({ "question_id": quiz.blank_question, "answer": { "kind": "text", "text": "thanks" } }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // One attempt allowed.
    let (status, _) = app.post(&attempts_uri, Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.get(&attempts_uri, Some(student.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // The course author can read the result, other learners cannot.
    let (status, body) = app.get(&result_uri, Some(quiz.teacher.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attempt"]["score"].as_f64(), Some(2.0));
    let (status, _) = app.get(&result_uri, Some(stranger.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Submitting counts as activity for the streak.
    let (_, body) = app.get("/me/streak", Some(student.id)).await;
    assert_eq!(body["data"]["current_streak"], 1);
}

#[tokio::test]
async fn test_unanswered_questions_score_zero() {
    let app = TestApp::new();
    let quiz = setup_quiz(&app, None).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    app.post(&format!("/courses/{}/enroll", quiz.course_id), Some(student.id), json!({})).await;

    let (_, body) = app.post(&format!("/quizzes/{}/attempts", quiz.quiz_id), Some(student.id), json!({})).await;
    let attempt_id = uuid_at(&body["data"]["attempt_id"]);

    let (status, body) = app.post(&format!("/attempts/{}/submit", attempt_id), Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attempt"]["score"].as_f64(), Some(0.0));
    assert_eq!(body["data"]["attempt"]["passed"], false);
    assert_eq!(body["data"]["answers"][0]["answered"], false);

    // Without a limit a new attempt can start.
    let (status, body) = app.post(&format!("/quizzes/{}/attempts", quiz.quiz_id), Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attempt_number"], 2);
}
