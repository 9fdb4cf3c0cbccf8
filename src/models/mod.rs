//! API and persistence schemas.
//!
//! Types deriving `FromRow` map directly onto tables in `migrations/`; the rest are
//! request payloads and response views. Everything exported to the SPA carries
//! `#[ts(export)]` so the TypeScript bindings stay in sync with the server.

pub mod admin;
pub mod attempt;
pub mod course;
pub mod essay;
pub mod flashcard;
pub mod notification;
pub mod payment;
pub mod progress;
pub mod quiz;
pub mod upload;
pub mod user;

pub use admin::AdminDashboardStats;
pub use attempt::{
    AnswerReview, AttemptResult, AttemptSlot, AttemptStatus, AttemptView, MatchPair,
    OptionView, QuestionView, QuizAttempt, QuizUserAnswer, SaveAnswerRequest, SectionView,
    UserAnswer,
};
pub use course::{
    AssessmentKind, ContentType, Course, CourseFilter, CourseOutline, CourseType,
    CreateCourseRequest, CreateLessonRequest, CreateModuleRequest, Enrollment, Lesson, Module,
    PublishRequest, UpdateCourseRequest, UpdateLessonRequest, UpdateModuleRequest,
};
pub use essay::{CreateEssayRequest, Essay, EssaySubmission, GradeEssayRequest, SubmitEssayRequest};
pub use flashcard::{CreateFlashCardRequest, DueFlashCard, FlashCard, FlashCardReview, ReviewRequest};
pub use notification::Notification;
pub use payment::{
    CheckoutResponse, CreatePackageRequest, Payment, PaymentPurpose, PaymentStatus,
    TeacherPackage, TeacherSubscription,
};
pub use progress::{CourseProgress, LessonProgress, UserStreak};
pub use quiz::{
    AnswerOption, CreateGroupRequest, CreateOptionRequest, CreateQuestionRequest,
    CreateQuizRequest, CreateSectionRequest, Question, QuestionType, Quiz, QuizContent,
    QuizGroup, QuizSection, UpdateQuizRequest,
};
pub use upload::{PresignedUrlRequest, PresignedUrlResponse, UploadPurpose};
pub use user::{
    AuthResponse, LoginRequest, NewUser, OtpRecord, RegisterRequest, ResendOtpRequest, Role,
    UpdateRolesRequest, User, UserAccount, VerifyOtpRequest,
};
