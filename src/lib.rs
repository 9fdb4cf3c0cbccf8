use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod payos;
pub mod quiz;
pub mod repository;
pub mod services;
pub mod storage;

// Routing segregated by access level (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use error::ServiceError;
use models::Role;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use mailer::{LogMailer, MailerState, MockMailer};
pub use payos::{MockPaymentGateway, PayOsClient, PaymentGatewayState};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every `#[utoipa::path]` handler, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::verify_otp, handlers::auth::resend_otp,
        handlers::auth::login, handlers::auth::get_me,
        handlers::courses::get_courses, handlers::courses::get_course_outline,
        handlers::courses::create_course, handlers::courses::get_authored_courses,
        handlers::courses::get_managed_course, handlers::courses::update_course,
        handlers::courses::publish_course, handlers::courses::delete_course,
        handlers::courses::enroll_course, handlers::courses::get_my_courses,
        handlers::courses::get_lessons, handlers::courses::create_lesson,
        handlers::courses::update_lesson, handlers::courses::delete_lesson,
        handlers::courses::get_modules, handlers::courses::create_module,
        handlers::courses::get_module, handlers::courses::update_module,
        handlers::courses::delete_module,
        handlers::progress::complete_module, handlers::progress::get_course_progress,
        handlers::progress::get_my_streak,
        handlers::quizzes::create_quiz, handlers::quizzes::get_module_quiz,
        handlers::quizzes::update_quiz, handlers::quizzes::get_quiz_content,
        handlers::quizzes::add_section, handlers::quizzes::add_group,
        handlers::quizzes::add_question, handlers::quizzes::delete_question,
        handlers::attempts::start_attempt, handlers::attempts::get_my_attempts,
        handlers::attempts::get_attempt, handlers::attempts::save_answer,
        handlers::attempts::submit_attempt, handlers::attempts::get_attempt_result,
        handlers::essays::create_essay, handlers::essays::get_module_essay,
        handlers::essays::submit_essay, handlers::essays::get_my_submission,
        handlers::essays::get_submissions, handlers::essays::grade_submission,
        handlers::flashcards::create_flashcard, handlers::flashcards::get_flashcards,
        handlers::flashcards::delete_flashcard, handlers::flashcards::review_flashcard,
        handlers::flashcards::get_due_flashcards,
        handlers::payments::checkout_course, handlers::payments::checkout_subscription,
        handlers::payments::payos_webhook, handlers::payments::get_payment,
        handlers::payments::cancel_payment, handlers::payments::get_my_payments,
        handlers::payments::get_my_subscription, handlers::payments::get_packages,
        handlers::notifications::get_notifications,
        handlers::notifications::mark_notification_read,
        handlers::upload::get_presigned_url,
        handlers::admin::get_admin_stats, handlers::admin::get_users,
        handlers::admin::update_user_roles, handlers::admin::get_all_courses,
        handlers::admin::get_all_payments, handlers::admin::get_all_packages,
        handlers::admin::create_package, handlers::admin::run_vocabulary_reminder,
    ),
    components(
        schemas(
            models::User, models::Role, models::RegisterRequest, models::VerifyOtpRequest,
            models::ResendOtpRequest, models::LoginRequest, models::AuthResponse,
            models::UpdateRolesRequest,
            models::Course, models::CourseType, models::CourseOutline, models::CreateCourseRequest,
            models::UpdateCourseRequest, models::PublishRequest, models::Lesson,
            models::CreateLessonRequest, models::UpdateLessonRequest, models::Module,
            models::ContentType, models::AssessmentKind, models::CreateModuleRequest,
            models::UpdateModuleRequest, models::CourseProgress, models::LessonProgress,
            models::UserStreak,
            models::Quiz, models::QuizSection, models::QuizGroup, models::Question,
            models::QuestionType, models::AnswerOption, models::QuizContent,
            models::CreateQuizRequest, models::UpdateQuizRequest, models::CreateSectionRequest,
            models::CreateGroupRequest, models::CreateQuestionRequest, models::CreateOptionRequest,
            models::QuizAttempt, models::AttemptStatus, models::AttemptSlot, models::AttemptView,
            models::SectionView, models::QuestionView, models::OptionView, models::UserAnswer,
            models::MatchPair, models::SaveAnswerRequest, models::QuizUserAnswer,
            models::AttemptResult, models::AnswerReview,
            models::Essay, models::CreateEssayRequest, models::EssaySubmission,
            models::SubmitEssayRequest, models::GradeEssayRequest,
            models::FlashCard, models::CreateFlashCardRequest, models::FlashCardReview,
            models::ReviewRequest, models::DueFlashCard,
            models::Payment, models::PaymentStatus, models::PaymentPurpose,
            models::CheckoutResponse, models::TeacherPackage, models::CreatePackageRequest,
            models::TeacherSubscription, payos::PayOsWebhook,
            models::Notification, models::PresignedUrlRequest, models::PresignedUrlResponse,
            models::UploadPurpose, models::AdminDashboardStats,
        )
    ),
    tags(
        (name = "coursehub", description = "CourseHub e-learning API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, cloned cheaply into each handler. External systems
/// sit behind trait objects so tests can swap in the in-memory and mock versions.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub payments: PaymentGatewayState,
    pub mailer: MailerState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the `AuthUser` extractor before any authenticated route. A missing, invalid or
/// expired token, or an inactive account, is rejected here with the extractor's error.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// require_admin
///
/// Authenticates like `auth_middleware`, then requires the Admin role (403 otherwise).
async fn require_admin(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    auth_user.require_role(Role::Admin)?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the route modules with their access layers, the Swagger UI, and the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Routes with the same path in both routers keep their own layers per method,
        // so e.g. GET /courses/{id} stays public while PUT /courses/{id} needs a token.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), require_admin)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span with method, uri and the request id, so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
