//! Router-level test harness: the real router over `InMemoryRepository` and the mock
//! storage, payment and mail services. Requests authenticate with the local
//! `x-user-id` bypass unless a test sends a bearer token itself.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use coursehub::{
    AppConfig, AppState, InMemoryRepository, MockMailer, MockPaymentGateway, MockStorageService,
    create_router,
    models::{
        AssessmentKind, ContentType, Course, CourseType, CreateCourseRequest, CreateLessonRequest,
        CreateModuleRequest, Lesson, Module, NewUser, Role, User,
    },
    repository::{CourseRepository, UserRepository},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub payments: Arc<MockPaymentGateway>,
    pub mailer: Arc<MockMailer>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gateway(MockPaymentGateway::new())
    }

    pub fn with_gateway(gateway: MockPaymentGateway) -> Self {
        Self::build(gateway, AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(MockPaymentGateway::new(), config)
    }

    fn build(gateway: MockPaymentGateway, config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let payments = Arc::new(gateway);
        let mailer = Arc::new(MockMailer::new());

        let state = AppState {
            repo: repo.clone(),
            storage: Arc::new(MockStorageService::new()),
            payments: payments.clone(),
            mailer: mailer.clone(),
            config: config.clone(),
        };

        TestApp { router: create_router(state), repo, payments, mailer, config }
    }

    /// Sends one request through the router and returns the status and the JSON body
    /// (`Value::Null` when the body isn't JSON).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user {
            builder = builder.header("x-user-id", id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn send_with_token(&self, method: &str, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: Option<Uuid>) -> (StatusCode, Value) {
        self.send("GET", uri, user, None).await
    }

    pub async fn post(&self, uri: &str, user: Option<Uuid>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, user, Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: Option<Uuid>, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, user, Some(body)).await
    }

    // --- Seeding ---

    pub async fn seed_user(&self, email: &str, roles: Vec<Role>) -> User {
        self.repo
            .create_user(NewUser {
                email: email.to_string(),
                full_name: email.split('@').next().unwrap_or_default().to_string(),
                password_hash: String::new(),
                roles,
                is_active: true,
            })
            .await
            .unwrap()
    }

    pub async fn seed_course(&self, owner: &User, price: i64, published: bool) -> Course {
        let course = self
            .repo
            .create_course(
                owner.id,
                CourseType::Teacher,
                CreateCourseRequest { title: "Vietnamese for beginners".into(), price, ..Default::default() },
            )
            .await
            .unwrap();
        if published {
            self.repo.set_course_published(course.id, true).await.unwrap().unwrap()
        } else {
            course
        }
    }

    pub async fn seed_lesson(&self, course: &Course) -> Lesson {
        self.repo
            .create_lesson(course.id, CreateLessonRequest { title: "Greetings".into(), ..Default::default() }, 1)
            .await
            .unwrap()
    }

    pub async fn seed_module(
        &self,
        lesson: &Lesson,
        content_type: ContentType,
        assessment_kind: Option<AssessmentKind>,
    ) -> Module {
        let position = self.repo.list_modules(lesson.id).await.unwrap().len() as i32 + 1;
        self.repo
            .create_module(
                lesson.id,
                CreateModuleRequest {
                    title: "Module".into(),
                    content_type,
                    assessment_kind,
                    ..Default::default()
                },
                position,
            )
            .await
            .unwrap()
    }
}

/// Asserts the `ServiceResponse` envelope agrees with the HTTP status.
pub fn assert_envelope(status: StatusCode, body: &Value) {
    assert_eq!(body["status_code"].as_u64(), Some(u64::from(status.as_u16())));
    assert_eq!(body["success"].as_bool(), Some(status.is_success()));
    assert!(body["message"].is_string());
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().and_then(|s| Uuid::parse_str(s).ok()).expect("id field")
}
