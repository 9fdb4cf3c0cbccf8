mod common;

use axum::http::StatusCode;
use common::{TestApp, assert_envelope, id_of};
use coursehub::{
    AppConfig,
    models::{ContentType, Role},
};
use serde_json::json;

#[tokio::test]
async fn test_public_catalogue_hides_drafts() {
    let app = TestApp::new();
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let published = app.seed_course(&teacher, 0, true).await;
    let draft = app.seed_course(&teacher, 0, false).await;
    app.seed_lesson(&published).await;

    let (status, body) = app.get("/courses", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(status, &body);
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(id_of(&listed[0]), published.id);

    let (_, body) = app.get("/courses?search=VIETNAMESE&course_type=teacher", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (_, body) = app.get("/courses?course_type=system", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app.get(&format!("/courses/{}", published.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lessons"].as_array().unwrap().len(), 1);

    let (status, body) = app.get(&format!("/courses/{}", draft.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(status, &body);
}

#[tokio::test]
async fn test_course_creation_by_role() {
    let app = TestApp::new();
    let admin = app.seed_user("admin@example.com", vec![Role::Admin]).await;
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    let payload = json!({ "title": "Tones", "description": "All six tones", "price": 0 });

    let (status, body) = app.post("/courses", Some(admin.id), payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["course_type"], "system");
    assert_eq!(body["data"]["is_published"], false);

    // Teachers need a subscription by default.
    let (status, body) = app.post("/courses", Some(teacher.id), payload.clone()).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_envelope(status, &body);

    let (status, _) = app.post("/courses", Some(student.id), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/courses", Some(admin.id), json!({ "title": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.post("/courses", Some(admin.id), json!({ "title": "Bad", "price": -1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_teacher_without_subscription_requirement() {
    let app = TestApp::with_config(AppConfig { require_teacher_subscription: false, ..AppConfig::default() });
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;

    let (status, body) = app.post("/courses", Some(teacher.id), json!({ "title": "Numbers" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["course_type"], "teacher");

    let (_, body) = app.get("/me/authored-courses", Some(teacher.id)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_owner_manages_course_content() {
    let app = TestApp::new();
    let owner = app.seed_user("owner@example.com", vec![Role::Teacher]).await;
    let other = app.seed_user("other@example.com", vec![Role::Teacher]).await;
    let admin = app.seed_user("admin@example.com", vec![Role::Admin]).await;
    let course = app.seed_course(&owner, 0, false).await;
    let course_uri = format!("/courses/{}", course.id);

    let (status, _) = app.put(&course_uri, Some(other.id), json!({ "title": "Hijacked" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.put(&course_uri, Some(owner.id), json!({ "title": "Food & drink" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Food & drink");

    let (status, body) = app
        .put(&format!("{}/publish", course_uri), Some(admin.id), json!({ "is_published": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_published"], true);

    // Lessons append after the existing ones.
    app.seed_lesson(&course).await;
    let (status, body) = app
        .post(&format!("{}/lessons", course_uri), Some(owner.id), json!({ "title": "Ordering food" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["position"], 2);
    let lesson_id = id_of(&body["data"]);

    let modules_uri = format!("/lessons/{}/modules", lesson_id);
    let (status, _) = app
        .post(&modules_uri, Some(owner.id), json!({ "title": "Quiz", "content_type": "assessment" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &modules_uri,
            Some(owner.id),
            json!({ "title": "Menu words", "content_type": "lecture", "assessment_kind": "quiz" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &modules_uri,
            Some(owner.id),
            json!({ "title": "Menu quiz", "content_type": "assessment", "assessment_kind": "quiz" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["position"], 1);
    let module_id = id_of(&body["data"]);

    let (status, _) = app.send("DELETE", &format!("/modules/{}", module_id), Some(other.id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send("DELETE", &format!("/modules/{}", module_id), Some(owner.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/modules/{}", module_id), Some(owner.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("DELETE", &course_uri, Some(owner.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("{}/manage", course_uri), Some(owner.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_enrollment_gates_content() {
    let app = TestApp::new();
    let teacher = app.seed_user("teacher@example.com", vec![Role::Teacher]).await;
    let student = app.seed_user("student@example.com", vec![Role::Student]).await;
    let free = app.seed_course(&teacher, 0, true).await;
    let paid = app.seed_course(&teacher, 150_000, true).await;
    let draft = app.seed_course(&teacher, 0, false).await;
    let lesson = app.seed_lesson(&free).await;
    app.seed_module(&lesson, ContentType::Lecture, None).await;

    let lessons_uri = format!("/courses/{}/lessons", free.id);
    let (status, body) = app.get(&lessons_uri, Some(student.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_envelope(status, &body);

    let (status, _) = app.post(&format!("/courses/{}/enroll", paid.id), Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    let (status, _) = app.post(&format!("/courses/{}/enroll", draft.id), Some(student.id), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for _ in 0..2 {
        let (status, _) = app.post(&format!("/courses/{}/enroll", free.id), Some(student.id), json!({})).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.get("/me/courses", Some(student.id)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.get(&lessons_uri, Some(student.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.get(&format!("/lessons/{}/modules", lesson.id), Some(student.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["content_type"], "lecture");

    // Enrolled learners still can't author.
    let (status, _) = app.post(&lessons_uri, Some(student.id), json!({ "title": "Mine" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
