use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    AdminDashboardStats, AttemptStatus, Course, CourseFilter, CourseType, CreateCourseRequest,
    CreateEssayRequest, CreateFlashCardRequest, CreateGroupRequest, CreateLessonRequest,
    CreateModuleRequest, CreatePackageRequest, CreateQuestionRequest, CreateQuizRequest,
    CreateSectionRequest, DueFlashCard, Essay, EssaySubmission, FlashCard, FlashCardReview,
    Lesson, Module, NewUser, Notification, OtpRecord, Payment, PaymentStatus, Question, Quiz,
    QuizAttempt, QuizContent, QuizGroup, QuizSection, QuizUserAnswer, Role, TeacherPackage,
    TeacherSubscription, UpdateCourseRequest, UpdateLessonRequest, UpdateModuleRequest,
    UpdateQuizRequest, User, UserAccount, UserStreak,
};
use crate::quiz::AttemptScore;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Every persistence call surfaces database failures to the service layer.
pub type RepoResult<T> = Result<T, sqlx::Error>;

// The persistence contract is split by aggregate. Handlers and services only ever see
// `RepositoryState`, so Postgres and the in-memory store are interchangeable.

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_account_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn activate_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn set_user_roles(&self, id: Uuid, roles: &[Role]) -> RepoResult<Option<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;

    // --- Registration OTPs ---
    // Replaces any previous code for the user.
    async fn upsert_otp(&self, otp: OtpRecord) -> RepoResult<()>;
    async fn get_otp(&self, user_id: Uuid) -> RepoResult<Option<OtpRecord>>;
    async fn record_otp_failure(&self, user_id: Uuid) -> RepoResult<()>;
    async fn delete_otp(&self, user_id: Uuid) -> RepoResult<()>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    // Public catalogue. Must enforce is_published = true.
    async fn list_published_courses(&self, filter: &CourseFilter) -> RepoResult<Vec<Course>>;
    async fn list_all_courses(&self) -> RepoResult<Vec<Course>>;
    async fn list_courses_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Course>>;
    async fn count_courses_by_owner(&self, owner_id: Uuid) -> RepoResult<i64>;
    async fn get_course(&self, id: Uuid) -> RepoResult<Option<Course>>;
    async fn create_course(
        &self,
        owner_id: Uuid,
        course_type: CourseType,
        req: CreateCourseRequest,
    ) -> RepoResult<Course>;
    // Partial update: `None` fields are kept.
    async fn update_course(&self, id: Uuid, req: UpdateCourseRequest) -> RepoResult<Option<Course>>;
    async fn set_course_published(&self, id: Uuid, is_published: bool) -> RepoResult<Option<Course>>;
    async fn delete_course(&self, id: Uuid) -> RepoResult<bool>;

    // --- Lessons ---
    async fn list_lessons(&self, course_id: Uuid) -> RepoResult<Vec<Lesson>>;
    async fn get_lesson(&self, id: Uuid) -> RepoResult<Option<Lesson>>;
    async fn create_lesson(
        &self,
        course_id: Uuid,
        req: CreateLessonRequest,
        position: i32,
    ) -> RepoResult<Lesson>;
    async fn update_lesson(&self, id: Uuid, req: UpdateLessonRequest) -> RepoResult<Option<Lesson>>;
    async fn delete_lesson(&self, id: Uuid) -> RepoResult<bool>;

    // --- Modules ---
    async fn list_modules(&self, lesson_id: Uuid) -> RepoResult<Vec<Module>>;
    // All modules of all lessons of a course.
    async fn list_course_modules(&self, course_id: Uuid) -> RepoResult<Vec<Module>>;
    async fn get_module(&self, id: Uuid) -> RepoResult<Option<Module>>;
    async fn create_module(
        &self,
        lesson_id: Uuid,
        req: CreateModuleRequest,
        position: i32,
    ) -> RepoResult<Module>;
    async fn update_module(&self, id: Uuid, req: UpdateModuleRequest) -> RepoResult<Option<Module>>;
    async fn delete_module(&self, id: Uuid) -> RepoResult<bool>;

    // --- Enrollment ---
    // Idempotent: returns true only when a new row was inserted.
    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool>;
    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool>;
    async fn list_enrolled_courses(&self, user_id: Uuid) -> RepoResult<Vec<Course>>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    // Idempotent: returns true only when the module was not yet completed.
    async fn mark_module_complete(&self, user_id: Uuid, module_id: Uuid) -> RepoResult<bool>;
    async fn completed_module_ids(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<Vec<Uuid>>;
    async fn get_streak(&self, user_id: Uuid) -> RepoResult<Option<UserStreak>>;
    async fn save_streak(&self, streak: &UserStreak) -> RepoResult<()>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    // --- Authoring ---
    async fn create_quiz(&self, module_id: Uuid, req: CreateQuizRequest) -> RepoResult<Quiz>;
    async fn get_quiz(&self, id: Uuid) -> RepoResult<Option<Quiz>>;
    async fn get_quiz_by_module(&self, module_id: Uuid) -> RepoResult<Option<Quiz>>;
    async fn update_quiz(&self, id: Uuid, req: UpdateQuizRequest) -> RepoResult<Option<Quiz>>;
    async fn create_section(
        &self,
        quiz_id: Uuid,
        req: CreateSectionRequest,
        position: i32,
    ) -> RepoResult<QuizSection>;
    async fn get_section(&self, id: Uuid) -> RepoResult<Option<QuizSection>>;
    async fn create_group(
        &self,
        section_id: Uuid,
        req: CreateGroupRequest,
        position: i32,
    ) -> RepoResult<QuizGroup>;
    async fn get_group(&self, id: Uuid) -> RepoResult<Option<QuizGroup>>;
    // Inserts the question and its options in one transaction; options take their list order.
    async fn create_question(
        &self,
        section_id: Uuid,
        req: CreateQuestionRequest,
        position: i32,
    ) -> RepoResult<Question>;
    async fn get_question(&self, id: Uuid) -> RepoResult<Option<Question>>;
    async fn delete_question(&self, id: Uuid) -> RepoResult<bool>;
    // The whole tree: sections, groups, questions with options.
    async fn load_quiz_content(&self, quiz_id: Uuid) -> RepoResult<Option<QuizContent>>;

    // --- Attempts ---
    async fn create_attempt(&self, attempt: &QuizAttempt) -> RepoResult<()>;
    async fn get_attempt(&self, id: Uuid) -> RepoResult<Option<QuizAttempt>>;
    async fn find_in_progress_attempt(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
    ) -> RepoResult<Option<QuizAttempt>>;
    async fn count_attempts(&self, user_id: Uuid, quiz_id: Uuid) -> RepoResult<i64>;
    async fn list_attempts(&self, user_id: Uuid, quiz_id: Uuid) -> RepoResult<Vec<QuizAttempt>>;
    // One answer per (attempt, question); a later save replaces the earlier one.
    async fn upsert_answer(&self, answer: &QuizUserAnswer) -> RepoResult<QuizUserAnswer>;
    async fn list_answers(&self, attempt_id: Uuid) -> RepoResult<Vec<QuizUserAnswer>>;
    // Only applies while the attempt is still in progress, so concurrent finalizations
    // settle exactly once. Returns None when the attempt was already finalized.
    async fn finalize_attempt(
        &self,
        id: Uuid,
        status: AttemptStatus,
        score: &AttemptScore,
        submitted_at: DateTime<Utc>,
    ) -> RepoResult<Option<QuizAttempt>>;
    async fn list_expired_attempts(&self, now: DateTime<Utc>) -> RepoResult<Vec<QuizAttempt>>;
}

#[async_trait]
pub trait EssayRepository: Send + Sync {
    async fn create_essay(&self, module_id: Uuid, req: CreateEssayRequest) -> RepoResult<Essay>;
    async fn get_essay(&self, id: Uuid) -> RepoResult<Option<Essay>>;
    async fn get_essay_by_module(&self, module_id: Uuid) -> RepoResult<Option<Essay>>;
    // Creates or replaces the learner's submission for the essay.
    // Returns None when the existing submission is already graded.
    async fn upsert_submission(
        &self,
        essay_id: Uuid,
        user_id: Uuid,
        content: String,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<EssaySubmission>>;
    async fn get_submission(&self, id: Uuid) -> RepoResult<Option<EssaySubmission>>;
    async fn get_user_submission(
        &self,
        essay_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<EssaySubmission>>;
    async fn list_submissions(&self, essay_id: Uuid) -> RepoResult<Vec<EssaySubmission>>;
    async fn grade_submission(
        &self,
        id: Uuid,
        score: f64,
        feedback: Option<String>,
        grader_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<EssaySubmission>>;
}

#[async_trait]
pub trait FlashCardRepository: Send + Sync {
    async fn create_flashcard(
        &self,
        module_id: Uuid,
        req: CreateFlashCardRequest,
    ) -> RepoResult<FlashCard>;
    async fn get_flashcard(&self, id: Uuid) -> RepoResult<Option<FlashCard>>;
    async fn list_flashcards(&self, module_id: Uuid) -> RepoResult<Vec<FlashCard>>;
    async fn delete_flashcard(&self, id: Uuid) -> RepoResult<bool>;
    async fn get_review(&self, user_id: Uuid, flashcard_id: Uuid) -> RepoResult<Option<FlashCardReview>>;
    async fn save_review(&self, review: &FlashCardReview) -> RepoResult<()>;
    // Reviews due at `now` plus never-reviewed cards of enrolled courses, oldest first.
    async fn list_due_cards(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> RepoResult<Vec<DueFlashCard>>;
    // (user, number of due cards) for every user with at least one card `list_due_cards` would return.
    async fn due_review_counts(&self, now: DateTime<Utc>) -> RepoResult<Vec<(Uuid, i64)>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create_payment(&self, payment: &Payment) -> RepoResult<()>;
    async fn get_payment_by_order_code(&self, order_code: i64) -> RepoResult<Option<Payment>>;
    // Settles a pending payment. Returns None when it was not pending anymore.
    async fn settle_payment(
        &self,
        order_code: i64,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepoResult<Option<Payment>>;
    async fn list_user_payments(&self, user_id: Uuid) -> RepoResult<Vec<Payment>>;
    async fn list_all_payments(&self) -> RepoResult<Vec<Payment>>;

    // --- Teacher packages & subscriptions ---
    async fn list_packages(&self, active_only: bool) -> RepoResult<Vec<TeacherPackage>>;
    async fn get_package(&self, id: Uuid) -> RepoResult<Option<TeacherPackage>>;
    async fn create_package(&self, req: CreatePackageRequest) -> RepoResult<TeacherPackage>;
    // Returns false when the paying payment already produced a subscription.
    async fn create_subscription(&self, subscription: &TeacherSubscription) -> RepoResult<bool>;
    // The subscription with the latest end date, active or not.
    async fn latest_subscription(&self, teacher_id: Uuid) -> RepoResult<Option<TeacherSubscription>>;
    // The subscription covering `now`, ignoring periods stacked after it.
    async fn active_subscription(
        &self,
        teacher_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<TeacherSubscription>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create_notification(
        &self,
        user_id: Uuid,
        kind: &str,
        message: &str,
    ) -> RepoResult<Notification>;
    async fn list_notifications(&self, user_id: Uuid) -> RepoResult<Vec<Notification>>;
    // Ownership enforced: only the recipient can mark it.
    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats>;
}

/// Repository
///
/// The full persistence contract, implemented automatically for any type providing
/// every aggregate repository.
pub trait Repository:
    UserRepository
    + CourseRepository
    + ProgressRepository
    + QuizRepository
    + EssayRepository
    + FlashCardRepository
    + PaymentRepository
    + NotificationRepository
    + StatsRepository
{
}

impl<T> Repository for T where
    T: UserRepository
        + CourseRepository
        + ProgressRepository
        + QuizRepository
        + EssayRepository
        + FlashCardRepository
        + PaymentRepository
        + NotificationRepository
        + StatsRepository
{
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
