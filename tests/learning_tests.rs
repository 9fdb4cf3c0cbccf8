mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{TestApp, assert_envelope, id_of};
use coursehub::{
    models::{AssessmentKind, ContentType, Role},
    repository::FlashCardRepository,
    services::flashcards::sm2,
};
use serde_json::json;

#[tokio::test]
async fn test_flashcard_review_schedule() {
    let app = TestApp::new();
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    let course = app.seed_course(&teacher, 0, true).await;
    let lesson = app.seed_lesson(&course).await;
    let deck = app.seed_module(&lesson, ContentType::FlashCard, None).await;
    let lecture = app.seed_module(&lesson, ContentType::Lecture, None).await;

    let (status, _) = app
        .post(&format!("/modules/{}/flashcards", lecture.id), Some(teacher.id), json!({ "front": "a", "back": "b" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let cards_uri = format!("/modules/{}/flashcards", deck.id);
    let (status, _) = app
        .post(&cards_uri, Some(student.id), json!({ "front": "apple", "back": "quả táo" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut card_ids = Vec::new();
    for (front, back) in [("apple", "quả táo"), ("water", "nước")] {
        let (status, body) = app
            .post(&cards_uri, Some(teacher.id), json!({ "front": front, "back": back }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        card_ids.push(id_of(&body["data"]));
    }

    // Not enrolled yet: nothing is due and reviews are refused.
    let (_, body) = app.get("/me/flashcards/due", Some(student.id)).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    let review_uri = format!("/flashcards/{}/review", card_ids[0]);
    let (status, _) = app.post(&review_uri, Some(student.id), json!({ "quality": 4 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.post(&format!("/courses/{}/enroll", course.id), Some(student.id), json!({})).await;

    let (status, body) = app.get("/me/flashcards/due", Some(student.id)).await;
    assert_eq!(status, StatusCode::OK);
    let due = body["data"].as_array().unwrap();
    assert_eq!(due.len(), 2);
    assert!(due[0]["next_review_at"].is_null());

    let (status, body) = app.post(&review_uri, Some(student.id), json!({ "quality": 7 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(status, &body);

    let (status, body) = app.post(&review_uri, Some(student.id), json!({ "quality": 5 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["interval_days"], 1);
    assert_eq!(body["data"]["repetitions"], 1);
    assert_eq!(body["data"]["ease_factor"].as_f64(), Some(2.6));

    // The reviewed card is scheduled for tomorrow; only the other one is still due.
    let (_, body) = app.get("/me/flashcards/due?limit=10", Some(student.id)).await;
    let due = body["data"].as_array().unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(id_of(&due[0]["card"]), card_ids[1]);

    let (_, body) = app.get("/me/streak", Some(student.id)).await;
    assert_eq!(body["data"]["current_streak"], 1);
    assert_eq!(body["data"]["longest_streak"], 1);

    let (status, _) = app.send("DELETE", &format!("/flashcards/{}", card_ids[1]), Some(student.id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send("DELETE", &format!("/flashcards/{}", card_ids[1]), Some(teacher.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&cards_uri, Some(student.id)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_course_progress_counts_complete_lessons() {
    let app = TestApp::new();
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    let course = app.seed_course(&teacher, 0, true).await;
    let first = app.seed_lesson(&course).await;
    let second = app.seed_lesson(&course).await;
    let intro = app.seed_module(&first, ContentType::Lecture, None).await;
    let practice = app.seed_module(&second, ContentType::Lecture, None).await;
    let review = app.seed_module(&second, ContentType::Lecture, None).await;

    let (status, _) = app.post(&format!("/modules/{}/complete", intro.id), Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.post(&format!("/courses/{}/enroll", course.id), Some(student.id), json!({})).await;

    let (status, body) = app.get(&format!("/courses/{}/progress", course.id), Some(student.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["percentage"].as_f64(), Some(0.0));
    assert_eq!(body["data"]["total_lessons"], 2);

    let (_, body) = app.post(&format!("/modules/{}/complete", intro.id), Some(student.id), json!({})).await;
    assert_eq!(body["data"]["completed_lessons"], 1);
    assert_eq!(body["data"]["percentage"].as_f64(), Some(50.0));

    // Completing twice is harmless.
    let (status, body) = app.post(&format!("/modules/{}/complete", intro.id), Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed_lessons"], 1);

    let (_, body) = app.post(&format!("/modules/{}/complete", practice.id), Some(student.id), json!({})).await;
    let second_lesson = body["data"]["lessons"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["lesson_id"] == second.id.to_string())
        .cloned()
        .unwrap();
    assert_eq!(second_lesson["percentage"].as_f64(), Some(50.0));
    assert_eq!(body["data"]["percentage"].as_f64(), Some(50.0));

    let (_, body) = app.post(&format!("/modules/{}/complete", review.id), Some(student.id), json!({})).await;
    assert_eq!(body["data"]["percentage"].as_f64(), Some(100.0));
}

#[tokio::test]
async fn test_essay_submission_and_grading() {
    let app = TestApp::new();
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    let course = app.seed_course(&teacher, 0, true).await;
    let lesson = app.seed_lesson(&course).await;
    let module = app
        .seed_module(&lesson, ContentType::Assessment, Some(AssessmentKind::Essay))
        .await;

    let essay_uri = format!("/modules/{}/essay", module.id);
    let (status, body) = app
        .post(&essay_uri, Some(teacher.id), json!({ "title": "My family", "prompt": "Write about your family.", "max_score": 20.0 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let essay_id = id_of(&body["data"]);

    let (status, _) = app
        .post(&essay_uri, Some(teacher.id), json!({ "title": "Again", "prompt": "Twice" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.post(&format!("/courses/{}/enroll", course.id), Some(student.id), json!({})).await;

    let (status, body) = app.get(&essay_uri, Some(student.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["max_score"].as_f64(), Some(20.0));

    let submissions_uri = format!("/essays/{}/submissions", essay_id);
    let (status, _) = app.get(&format!("{}/me", submissions_uri), Some(student.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post(&submissions_uri, Some(student.id), json!({ "content": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(&submissions_uri, Some(student.id), json!({ "content": "Tôi có hai anh trai." }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let submission_id = id_of(&body["data"]);

    let (status, _) = app.get(&submissions_uri, Some(student.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = app.get(&submissions_uri, Some(teacher.id)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let grade_uri = format!("/submissions/{}/grade", submission_id);
    let (status, _) = app.put(&grade_uri, Some(teacher.id), json!({ "score": 25.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(&grade_uri, Some(teacher.id), json!({ "score": 17.5, "feedback": "Watch your tones." }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["score"].as_f64(), Some(17.5));

    // Graded essays are final.
    let (status, _) = app
        .post(&submissions_uri, Some(student.id), json!({ "content": "Rewritten" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.get(&format!("{}/me", submissions_uri), Some(student.id)).await;
    assert_eq!(body["data"]["feedback"], "Watch your tones.");

    let (_, body) = app.get("/me/notifications", Some(student.id)).await;
    let notification = &body["data"][0];
    assert_eq!(notification["type"], "essay_graded");
    assert_eq!(notification["is_read"], false);
    let notification_id = id_of(notification);

    let read_uri = format!("/notifications/{}/read", notification_id);
    let (status, _) = app.put(&read_uri, Some(teacher.id), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.put(&read_uri, Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/me/notifications", Some(student.id)).await;
    assert_eq!(body["data"][0]["is_read"], true);
}

#[tokio::test]
async fn test_admin_runs_vocabulary_reminder() {
    let app = TestApp::new();
    let admin = app.seed_user("admin@example.com", vec![Role::Admin]).await;
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    let course = app.seed_course(&teacher, 0, true).await;
    let lesson = app.seed_lesson(&course).await;
    let deck = app.seed_module(&lesson, ContentType::FlashCard, None).await;

    let (_, body) = app
        .post(&format!("/modules/{}/flashcards", deck.id), Some(teacher.id), json!({ "front": "rice", "back": "cơm" }))
        .await;
    let card_id = id_of(&body["data"]);
    let (status, _) = app
        .post(&format!("/courses/{}/enroll", course.id), Some(student.id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Reviewed two days ago with a one-day interval.
    let review = sm2(None, student.id, card_id, 4, Utc::now() - Duration::days(2));
    app.repo.save_review(&review).await.unwrap();

    let (status, _) = app.post("/admin/jobs/vocabulary-reminder", Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/admin/jobs/vocabulary-reminder", Some(admin.id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 1);

    let (_, body) = app.get("/me/notifications", Some(student.id)).await;
    assert_eq!(body["data"][0]["type"], "vocabulary_reminder");
    assert_eq!(body["data"][0]["message"], "You have 1 flashcard due for review today.");
    assert!(app.mailer.last_to("student@example.com").is_some());
}
