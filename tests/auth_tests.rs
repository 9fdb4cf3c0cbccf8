mod common;

use axum::http::StatusCode;
use common::{TestApp, assert_envelope, id_of};
use coursehub::{
    auth::issue_token,
    models::{NewUser, Role},
    repository::UserRepository,
};
use chrono::{Duration, Utc};
use serde_json::json;

fn otp_for(app: &TestApp, email: &str) -> String {
    let mail = app.mailer.last_to(email).expect("an OTP mail");
    mail.body.chars().filter(char::is_ascii_digit).take(6).collect()
}

#[tokio::test]
async fn test_register_verify_and_login() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/auth/register",
            None,
            json!({
                "email": "  Lan.Nguyen@Example.com ",
                "password": "correct-horse",
                "full_name": "Lan Nguyen",
                "role": "student"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_envelope(status, &body);
    assert_eq!(body["data"]["email"], "lan.nguyen@example.com");
    assert_eq!(body["data"]["is_active"], false);

    // Not activated yet.
    let credentials = json!({ "email": "lan.nguyen@example.com", "password": "correct-horse" });
    let (status, body) = app.post("/auth/login", None, credentials.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_envelope(status, &body);

    let code = otp_for(&app, "lan.nguyen@example.com");
    assert_eq!(code.len(), 6);

    let wrong = if code == "000000" { "111111" } else { "000000" };
    let (status, _) = app
        .post("/auth/verify-otp", None, json!({ "email": "lan.nguyen@example.com", "code": wrong }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/auth/verify-otp", None, json!({ "email": "lan.nguyen@example.com", "code": code }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["is_active"], true);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app.send_with_token("GET", "/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "lan.nguyen@example.com");
    assert_eq!(body["data"]["roles"], json!(["student"]));

    let (status, body) = app.post("/auth/login", None, credentials).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].is_string());

    let (status, body) = app
        .post("/auth/login", None, json!({ "email": "lan.nguyen@example.com", "password": "wrong-horse" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(status, &body);
}

#[tokio::test]
async fn test_register_rejections() {
    let app = TestApp::new();
    let register = |email: &str, password: &str, role: &str| {
        json!({ "email": email, "password": password, "full_name": "X", "role": role })
    };

    let (status, _) = app.post("/auth/register", None, register("a@example.com", "long-enough", "admin")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/auth/register", None, register("a@example.com", "short", "student")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/auth/register", None, register("not-an-email", "long-enough", "student")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/auth/register", None, register("t@example.com", "long-enough", "teacher")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.post("/auth/register", None, register("T@example.com", "long-enough", "student")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_envelope(status, &body);
}

#[tokio::test]
async fn test_resend_otp_replaces_code() {
    let app = TestApp::new();
    app.post(
        "/auth/register",
        None,
        json!({ "email": "b@example.com", "password": "long-enough", "full_name": "B", "role": "student" }),
    )
    .await;

    let (status, _) = app.post("/auth/resend-otp", None, json!({ "email": "b@example.com" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.mailer.sent().len(), 2);

    let code = otp_for(&app, "b@example.com");
    let (status, _) = app
        .post("/auth/verify-otp", None, json!({ "email": "b@example.com", "code": code }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Active accounts have nothing to resend.
    let (status, _) = app.post("/auth/resend-otp", None, json!({ "email": "b@example.com" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_protected_routes_require_credentials() {
    let app = TestApp::new();

    let (status, body) = app.get("/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(status, &body);

    let (status, _) = app.send_with_token("GET", "/me", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = app.seed_user("c@example.com", vec![Role::Student]).await;
    let expired = issue_token(user.id, &app.config, Utc::now() - Duration::hours(48)).unwrap();
    let (status, body) = app.send_with_token("GET", "/me", &expired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired");

    let inactive = app
        .repo
        .create_user(NewUser {
            email: "d@example.com".into(),
            full_name: "D".into(),
            password_hash: String::new(),
            roles: vec![Role::Student],
            is_active: false,
        })
        .await
        .unwrap();
    let (status, _) = app.get("/me", Some(inactive.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new();
    let student = app.seed_user("s@example.com", vec![Role::Student]).await;
    let admin = app.seed_user("admin@example.com", vec![Role::Admin]).await;

    let (status, _) = app.get("/admin/stats", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/admin/stats", Some(student.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_envelope(status, &body);

    let (status, body) = app.get("/admin/stats", Some(admin.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_users"], 2);

    let (status, body) = app.get("/admin/users", Some(admin.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let uri = format!("/admin/users/{}/roles", student.id);
    let (status, body) = app.put(&uri, Some(admin.id), json!({ "roles": ["teacher", "student", "teacher"] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id_of(&body["data"]), student.id);
    assert_eq!(body["data"]["roles"].as_array().unwrap().len(), 2);

    let (status, _) = app.put(&uri, Some(admin.id), json!({ "roles": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The new role is visible on the next request.
    let (_, body) = app.get("/me", Some(student.id)).await;
    assert!(body["data"]["roles"].as_array().unwrap().contains(&json!("teacher")));
}
