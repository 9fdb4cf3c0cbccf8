use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, query_builder::QueryBuilder, types::Json};
use uuid::Uuid;

use super::{
    CourseRepository, EssayRepository, FlashCardRepository, NotificationRepository,
    PaymentRepository, ProgressRepository, QuizRepository, RepoResult, StatsRepository,
    UserRepository,
};
use crate::models::{
    AdminDashboardStats, AnswerOption, AttemptSlot, AttemptStatus, Course, CourseFilter,
    CourseType, CreateCourseRequest, CreateEssayRequest, CreateFlashCardRequest,
    CreateGroupRequest, CreateLessonRequest, CreateModuleRequest, CreatePackageRequest,
    CreateQuestionRequest, CreateQuizRequest, CreateSectionRequest, DueFlashCard, Essay,
    EssaySubmission, FlashCard, FlashCardReview, Lesson, Module, NewUser, Notification,
    OtpRecord, Payment, PaymentStatus, Question, Quiz, QuizAttempt, QuizContent, QuizGroup,
    QuizSection, QuizUserAnswer, Role, TeacherPackage, TeacherSubscription, UpdateCourseRequest,
    UpdateLessonRequest, UpdateModuleRequest, UpdateQuizRequest, User, UserAccount, UserAnswer,
    UserStreak,
};
use crate::quiz::AttemptScore;

const USER_COLUMNS: &str = "id, email, full_name, roles, is_active, created_at, password_hash";
const COURSE_COLUMNS: &str = "id, owner_id, title, description, course_type, price, cover_image, is_published, created_at, updated_at";
const LESSON_COLUMNS: &str = "id, course_id, title, description, position, created_at";
const MODULE_COLUMNS: &str = "id, lesson_id, title, content_type, assessment_kind, content, media_key, position, created_at";
const QUIZ_COLUMNS: &str = "id, module_id, title, description, time_limit_minutes, passing_score, max_attempts, shuffle_questions, shuffle_answers, show_answers_after_submit, created_at";
const QUESTION_COLUMNS: &str = "id, section_id, group_id, question_type, prompt, points, explanation, position";
const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, status, attempt_number, started_at, expires_at, submitted_at, score, max_score, percentage, passed, layout";
const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, answer, is_correct, points_earned, answered_at";
const SUBMISSION_COLUMNS: &str = "id, essay_id, user_id, content, score, feedback, graded_by, submitted_at, graded_at";
const PAYMENT_COLUMNS: &str = "id, user_id, order_code, amount, description, purpose, target_id, status, checkout_url, created_at, paid_at";

// --- Row types for columns that don't map 1:1 onto the API models ---

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: String,
    roles: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    password_hash: String,
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        let roles = row
            .roles
            .iter()
            .filter_map(|r| r.parse::<Role>().ok())
            .collect();
        UserAccount {
            user: User {
                id: row.id,
                email: row.email,
                full_name: row.full_name,
                roles,
                is_active: row.is_active,
                created_at: row.created_at,
            },
            password_hash: row.password_hash,
        }
    }
}

fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    quiz_id: Uuid,
    user_id: Uuid,
    status: AttemptStatus,
    attempt_number: i32,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    score: f64,
    max_score: f64,
    percentage: f64,
    passed: Option<bool>,
    layout: Json<Vec<AttemptSlot>>,
}

impl From<AttemptRow> for QuizAttempt {
    fn from(row: AttemptRow) -> Self {
        QuizAttempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            status: row.status,
            attempt_number: row.attempt_number,
            started_at: row.started_at,
            expires_at: row.expires_at,
            submitted_at: row.submitted_at,
            score: row.score,
            max_score: row.max_score,
            percentage: row.percentage,
            passed: row.passed,
            layout: row.layout.0,
        }
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: Uuid,
    attempt_id: Uuid,
    question_id: Uuid,
    answer: Json<UserAnswer>,
    is_correct: bool,
    points_earned: f64,
    answered_at: DateTime<Utc>,
}

impl From<AnswerRow> for QuizUserAnswer {
    fn from(row: AnswerRow) -> Self {
        QuizUserAnswer {
            id: row.id,
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            answer: row.answer.0,
            is_correct: row.is_correct,
            points_earned: row.points_earned,
            answered_at: row.answered_at,
        }
    }
}

/// PostgresRepository
///
/// The production implementation of every repository trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_options(&self, mut questions: Vec<Question>) -> RepoResult<Vec<Question>> {
        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, AnswerOption>(
            "SELECT id, question_id, content, is_correct, match_value, position
             FROM answer_options WHERE question_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for question in &mut questions {
            question.options = options
                .iter()
                .filter(|o| o.question_id == question.id)
                .cloned()
                .collect();
        }
        Ok(questions)
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserAccount::from(r).user))
    }

    async fn get_account_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserAccount::from))
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, email, full_name, password_hash, roles, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW())
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(role_names(&user.roles))
        .bind(user.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserAccount::from(row).user)
    }

    async fn activate_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET is_active = true WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserAccount::from(r).user))
    }

    async fn set_user_roles(&self, id: Uuid, roles: &[Role]) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET roles = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role_names(roles))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserAccount::from(r).user))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| UserAccount::from(r).user).collect())
    }

    async fn upsert_otp(&self, otp: OtpRecord) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO registration_otps (user_id, code, expires_at, failed_attempts)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id) DO UPDATE
             SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at, failed_attempts = EXCLUDED.failed_attempts",
        )
        .bind(otp.user_id)
        .bind(&otp.code)
        .bind(otp.expires_at)
        .bind(otp.failed_attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_otp(&self, user_id: Uuid) -> RepoResult<Option<OtpRecord>> {
        sqlx::query_as::<_, OtpRecord>(
            "SELECT user_id, code, expires_at, failed_attempts FROM registration_otps WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn record_otp_failure(&self, user_id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE registration_otps SET failed_attempts = failed_attempts + 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_otp(&self, user_id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM registration_otps WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for PostgresRepository {
    /// list_published_courses
    ///
    /// Builds the catalogue query with QueryBuilder so every filter is a bound parameter.
    /// The base query always restricts to `is_published = true`.
    async fn list_published_courses(&self, filter: &CourseFilter) -> RepoResult<Vec<Course>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE is_published = true"
        ));

        if let Some(course_type) = filter.course_type {
            builder.push(" AND course_type = ");
            builder.push_bind(course_type);
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            builder.push(" AND (title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");
        builder.build_query_as::<Course>().fetch_all(&self.pool).await
    }

    async fn list_all_courses(&self) -> RepoResult<Vec<Course>> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY is_published ASC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn list_courses_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Course>> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_courses_by_owner(&self, owner_id: Uuid) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_course(&self, id: Uuid) -> RepoResult<Option<Course>> {
        sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// create_course
    ///
    /// New courses start unpublished.
    async fn create_course(
        &self,
        owner_id: Uuid,
        course_type: CourseType,
        req: CreateCourseRequest,
    ) -> RepoResult<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (id, owner_id, title, description, course_type, price, cover_image, is_published, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, false, NOW(), NOW())
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(req.title)
        .bind(req.description)
        .bind(course_type)
        .bind(req.price)
        .bind(req.cover_image_key)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_course(&self, id: Uuid, req: UpdateCourseRequest) -> RepoResult<Option<Course>> {
        sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 price = COALESCE($4, price),
                 cover_image = COALESCE($5, cover_image),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.price)
        .bind(req.cover_image_key)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_course_published(&self, id: Uuid, is_published: bool) -> RepoResult<Option<Course>> {
        sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses SET is_published = $2, updated_at = NOW() WHERE id = $1 RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .bind(is_published)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_course(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_lessons(&self, course_id: Uuid) -> RepoResult<Vec<Lesson>> {
        sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = $1 ORDER BY position, created_at"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_lesson(&self, id: Uuid) -> RepoResult<Option<Lesson>> {
        sqlx::query_as::<_, Lesson>(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_lesson(
        &self,
        course_id: Uuid,
        req: CreateLessonRequest,
        position: i32,
    ) -> RepoResult<Lesson> {
        sqlx::query_as::<_, Lesson>(&format!(
            "INSERT INTO lessons (id, course_id, title, description, position, created_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             RETURNING {LESSON_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(req.title)
        .bind(req.description)
        .bind(position)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_lesson(&self, id: Uuid, req: UpdateLessonRequest) -> RepoResult<Option<Lesson>> {
        sqlx::query_as::<_, Lesson>(&format!(
            "UPDATE lessons
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 position = COALESCE($4, position)
             WHERE id = $1
             RETURNING {LESSON_COLUMNS}"
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.position)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_lesson(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_modules(&self, lesson_id: Uuid) -> RepoResult<Vec<Module>> {
        sqlx::query_as::<_, Module>(&format!(
            "SELECT {MODULE_COLUMNS} FROM modules WHERE lesson_id = $1 ORDER BY position, created_at"
        ))
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_course_modules(&self, course_id: Uuid) -> RepoResult<Vec<Module>> {
        sqlx::query_as::<_, Module>(
            "SELECT m.id, m.lesson_id, m.title, m.content_type, m.assessment_kind, m.content,
                    m.media_key, m.position, m.created_at
             FROM modules m JOIN lessons l ON l.id = m.lesson_id
             WHERE l.course_id = $1
             ORDER BY l.position, m.position",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_module(&self, id: Uuid) -> RepoResult<Option<Module>> {
        sqlx::query_as::<_, Module>(&format!("SELECT {MODULE_COLUMNS} FROM modules WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_module(
        &self,
        lesson_id: Uuid,
        req: CreateModuleRequest,
        position: i32,
    ) -> RepoResult<Module> {
        sqlx::query_as::<_, Module>(&format!(
            "INSERT INTO modules (id, lesson_id, title, content_type, assessment_kind, content, media_key, position, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
             RETURNING {MODULE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(lesson_id)
        .bind(req.title)
        .bind(req.content_type)
        .bind(req.assessment_kind)
        .bind(req.content)
        .bind(req.media_key)
        .bind(position)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_module(&self, id: Uuid, req: UpdateModuleRequest) -> RepoResult<Option<Module>> {
        sqlx::query_as::<_, Module>(&format!(
            "UPDATE modules
             SET title = COALESCE($2, title),
                 content = COALESCE($3, content),
                 media_key = COALESCE($4, media_key),
                 position = COALESCE($5, position)
             WHERE id = $1
             RETURNING {MODULE_COLUMNS}"
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.media_key)
        .bind(req.position)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_module(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// enroll
    ///
    /// `ON CONFLICT DO NOTHING` keeps enrollment idempotent; only a fresh row counts.
    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query(
            "INSERT INTO enrollments (user_id, course_id, enrolled_at) VALUES ($1, $2, NOW())
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_enrolled_courses(&self, user_id: Uuid) -> RepoResult<Vec<Course>> {
        sqlx::query_as::<_, Course>(
            "SELECT c.id, c.owner_id, c.title, c.description, c.course_type, c.price,
                    c.cover_image, c.is_published, c.created_at, c.updated_at
             FROM courses c JOIN enrollments e ON e.course_id = c.id
             WHERE e.user_id = $1
             ORDER BY e.enrolled_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl ProgressRepository for PostgresRepository {
    async fn mark_module_complete(&self, user_id: Uuid, module_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query(
            "INSERT INTO module_completions (user_id, module_id, completed_at) VALUES ($1, $2, NOW())
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(module_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn completed_module_ids(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT mc.module_id
             FROM module_completions mc
             JOIN modules m ON m.id = mc.module_id
             JOIN lessons l ON l.id = m.lesson_id
             WHERE mc.user_id = $1 AND l.course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_streak(&self, user_id: Uuid) -> RepoResult<Option<UserStreak>> {
        sqlx::query_as::<_, UserStreak>(
            "SELECT user_id, current_streak, longest_streak, last_activity_date FROM user_streaks WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn save_streak(&self, streak: &UserStreak) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO user_streaks (user_id, current_streak, longest_streak, last_activity_date)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id) DO UPDATE
             SET current_streak = EXCLUDED.current_streak,
                 longest_streak = EXCLUDED.longest_streak,
                 last_activity_date = EXCLUDED.last_activity_date",
        )
        .bind(streak.user_id)
        .bind(streak.current_streak)
        .bind(streak.longest_streak)
        .bind(streak.last_activity_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for PostgresRepository {
    async fn create_quiz(&self, module_id: Uuid, req: CreateQuizRequest) -> RepoResult<Quiz> {
        sqlx::query_as::<_, Quiz>(&format!(
            "INSERT INTO quizzes (id, module_id, title, description, time_limit_minutes, passing_score,
                                  max_attempts, shuffle_questions, shuffle_answers, show_answers_after_submit, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
             RETURNING {QUIZ_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(module_id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.time_limit_minutes)
        .bind(req.passing_score)
        .bind(req.max_attempts)
        .bind(req.shuffle_questions)
        .bind(req.shuffle_answers)
        .bind(req.show_answers_after_submit)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_quiz(&self, id: Uuid) -> RepoResult<Option<Quiz>> {
        sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_quiz_by_module(&self, module_id: Uuid) -> RepoResult<Option<Quiz>> {
        sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE module_id = $1"))
            .bind(module_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn update_quiz(&self, id: Uuid, req: UpdateQuizRequest) -> RepoResult<Option<Quiz>> {
        sqlx::query_as::<_, Quiz>(&format!(
            "UPDATE quizzes
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 time_limit_minutes = COALESCE($4, time_limit_minutes),
                 passing_score = COALESCE($5, passing_score),
                 max_attempts = COALESCE($6, max_attempts),
                 shuffle_questions = COALESCE($7, shuffle_questions),
                 shuffle_answers = COALESCE($8, shuffle_answers),
                 show_answers_after_submit = COALESCE($9, show_answers_after_submit)
             WHERE id = $1
             RETURNING {QUIZ_COLUMNS}"
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.time_limit_minutes)
        .bind(req.passing_score)
        .bind(req.max_attempts)
        .bind(req.shuffle_questions)
        .bind(req.shuffle_answers)
        .bind(req.show_answers_after_submit)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_section(
        &self,
        quiz_id: Uuid,
        req: CreateSectionRequest,
        position: i32,
    ) -> RepoResult<QuizSection> {
        sqlx::query_as::<_, QuizSection>(
            "INSERT INTO quiz_sections (id, quiz_id, title, instructions, position)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, quiz_id, title, instructions, position",
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(req.title)
        .bind(req.instructions)
        .bind(position)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_section(&self, id: Uuid) -> RepoResult<Option<QuizSection>> {
        sqlx::query_as::<_, QuizSection>(
            "SELECT id, quiz_id, title, instructions, position FROM quiz_sections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_group(
        &self,
        section_id: Uuid,
        req: CreateGroupRequest,
        position: i32,
    ) -> RepoResult<QuizGroup> {
        sqlx::query_as::<_, QuizGroup>(
            "INSERT INTO quiz_groups (id, section_id, title, passage, media_key, position)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, section_id, title, passage, media_key, position",
        )
        .bind(Uuid::new_v4())
        .bind(section_id)
        .bind(req.title)
        .bind(req.passage)
        .bind(req.media_key)
        .bind(position)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_group(&self, id: Uuid) -> RepoResult<Option<QuizGroup>> {
        sqlx::query_as::<_, QuizGroup>(
            "SELECT id, section_id, title, passage, media_key, position FROM quiz_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// create_question
    ///
    /// The question row and its options are written in one transaction.
    async fn create_question(
        &self,
        section_id: Uuid,
        req: CreateQuestionRequest,
        position: i32,
    ) -> RepoResult<Question> {
        let mut tx = self.pool.begin().await?;

        let mut question = sqlx::query_as::<_, Question>(&format!(
            "INSERT INTO questions (id, section_id, group_id, question_type, prompt, points, explanation, position)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(section_id)
        .bind(req.group_id)
        .bind(req.question_type)
        .bind(req.prompt)
        .bind(req.points.unwrap_or(1.0))
        .bind(req.explanation)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;

        for (index, option) in req.options.into_iter().enumerate() {
            let inserted = sqlx::query_as::<_, AnswerOption>(
                "INSERT INTO answer_options (id, question_id, content, is_correct, match_value, position)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id, question_id, content, is_correct, match_value, position",
            )
            .bind(Uuid::new_v4())
            .bind(question.id)
            .bind(option.content)
            .bind(option.is_correct)
            .bind(option.match_value)
            .bind(index as i32)
            .fetch_one(&mut *tx)
            .await?;
            question.options.push(inserted);
        }

        tx.commit().await?;
        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> RepoResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match question {
            Some(q) => Ok(self.attach_options(vec![q]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn delete_question(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn load_quiz_content(&self, quiz_id: Uuid) -> RepoResult<Option<QuizContent>> {
        let Some(quiz) = self.get_quiz(quiz_id).await? else {
            return Ok(None);
        };

        let sections = sqlx::query_as::<_, QuizSection>(
            "SELECT id, quiz_id, title, instructions, position
             FROM quiz_sections WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let groups = sqlx::query_as::<_, QuizGroup>(
            "SELECT g.id, g.section_id, g.title, g.passage, g.media_key, g.position
             FROM quiz_groups g JOIN quiz_sections s ON s.id = g.section_id
             WHERE s.quiz_id = $1 ORDER BY g.position",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let questions = sqlx::query_as::<_, Question>(
            "SELECT q.id, q.section_id, q.group_id, q.question_type, q.prompt, q.points, q.explanation, q.position
             FROM questions q JOIN quiz_sections s ON s.id = q.section_id
             WHERE s.quiz_id = $1 ORDER BY s.position, q.position",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        let questions = self.attach_options(questions).await?;

        Ok(Some(QuizContent { quiz, sections, groups, questions }))
    }

    async fn create_attempt(&self, attempt: &QuizAttempt) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO quiz_attempts (id, quiz_id, user_id, status, attempt_number, started_at, expires_at,
                                        submitted_at, score, max_score, percentage, passed, layout)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(attempt.id)
        .bind(attempt.quiz_id)
        .bind(attempt.user_id)
        .bind(attempt.status)
        .bind(attempt.attempt_number)
        .bind(attempt.started_at)
        .bind(attempt.expires_at)
        .bind(attempt.submitted_at)
        .bind(attempt.score)
        .bind(attempt.max_score)
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(Json(attempt.layout.clone()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_attempt(&self, id: Uuid) -> RepoResult<Option<QuizAttempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(QuizAttempt::from))
    }

    async fn find_in_progress_attempt(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
    ) -> RepoResult<Option<QuizAttempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
             WHERE user_id = $1 AND quiz_id = $2 AND status = 'in_progress'
             ORDER BY started_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(QuizAttempt::from))
    }

    async fn count_attempts(&self, user_id: Uuid, quiz_id: Uuid) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_attempts(&self, user_id: Uuid, quiz_id: Uuid) -> RepoResult<Vec<QuizAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
             WHERE user_id = $1 AND quiz_id = $2 ORDER BY attempt_number DESC"
        ))
        .bind(user_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuizAttempt::from).collect())
    }

    async fn upsert_answer(&self, answer: &QuizUserAnswer) -> RepoResult<QuizUserAnswer> {
        let row = sqlx::query_as::<_, AnswerRow>(&format!(
            "INSERT INTO quiz_user_answers (id, attempt_id, question_id, answer, is_correct, points_earned, answered_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (attempt_id, question_id) DO UPDATE
             SET answer = EXCLUDED.answer,
                 is_correct = EXCLUDED.is_correct,
                 points_earned = EXCLUDED.points_earned,
                 answered_at = EXCLUDED.answered_at
             RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(answer.id)
        .bind(answer.attempt_id)
        .bind(answer.question_id)
        .bind(Json(answer.answer.clone()))
        .bind(answer.is_correct)
        .bind(answer.points_earned)
        .bind(answer.answered_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_answers(&self, attempt_id: Uuid) -> RepoResult<Vec<QuizUserAnswer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM quiz_user_answers WHERE attempt_id = $1"
        ))
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuizUserAnswer::from).collect())
    }

    /// finalize_attempt
    ///
    /// The `status = 'in_progress'` guard makes finalization a compare-and-set:
    /// a second submit or a racing sweep updates zero rows.
    async fn finalize_attempt(
        &self,
        id: Uuid,
        status: AttemptStatus,
        score: &AttemptScore,
        submitted_at: DateTime<Utc>,
    ) -> RepoResult<Option<QuizAttempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "UPDATE quiz_attempts
             SET status = $2, score = $3, max_score = $4, percentage = $5, passed = $6, submitted_at = $7
             WHERE id = $1 AND status = 'in_progress'
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(score.score)
        .bind(score.max_score)
        .bind(score.percentage)
        .bind(score.passed)
        .bind(submitted_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(QuizAttempt::from))
    }

    async fn list_expired_attempts(&self, now: DateTime<Utc>) -> RepoResult<Vec<QuizAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
             WHERE status = 'in_progress' AND expires_at IS NOT NULL AND expires_at <= $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuizAttempt::from).collect())
    }
}

#[async_trait]
impl EssayRepository for PostgresRepository {
    async fn create_essay(&self, module_id: Uuid, req: CreateEssayRequest) -> RepoResult<Essay> {
        sqlx::query_as::<_, Essay>(
            "INSERT INTO essays (id, module_id, title, prompt, max_score, created_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             RETURNING id, module_id, title, prompt, max_score, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(module_id)
        .bind(req.title)
        .bind(req.prompt)
        .bind(req.max_score.unwrap_or(10.0))
        .fetch_one(&self.pool)
        .await
    }

    async fn get_essay(&self, id: Uuid) -> RepoResult<Option<Essay>> {
        sqlx::query_as::<_, Essay>(
            "SELECT id, module_id, title, prompt, max_score, created_at FROM essays WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_essay_by_module(&self, module_id: Uuid) -> RepoResult<Option<Essay>> {
        sqlx::query_as::<_, Essay>(
            "SELECT id, module_id, title, prompt, max_score, created_at FROM essays WHERE module_id = $1",
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn upsert_submission(
        &self,
        essay_id: Uuid,
        user_id: Uuid,
        content: String,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<EssaySubmission>> {
        sqlx::query_as::<_, EssaySubmission>(&format!(
            "INSERT INTO essay_submissions (id, essay_id, user_id, content, submitted_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (essay_id, user_id) DO UPDATE
             SET content = EXCLUDED.content, submitted_at = EXCLUDED.submitted_at
             WHERE essay_submissions.graded_at IS NULL
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(essay_id)
        .bind(user_id)
        .bind(content)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_submission(&self, id: Uuid) -> RepoResult<Option<EssaySubmission>> {
        sqlx::query_as::<_, EssaySubmission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM essay_submissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_submission(
        &self,
        essay_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<EssaySubmission>> {
        sqlx::query_as::<_, EssaySubmission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM essay_submissions WHERE essay_id = $1 AND user_id = $2"
        ))
        .bind(essay_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_submissions(&self, essay_id: Uuid) -> RepoResult<Vec<EssaySubmission>> {
        sqlx::query_as::<_, EssaySubmission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM essay_submissions WHERE essay_id = $1 ORDER BY submitted_at"
        ))
        .bind(essay_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn grade_submission(
        &self,
        id: Uuid,
        score: f64,
        feedback: Option<String>,
        grader_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<EssaySubmission>> {
        sqlx::query_as::<_, EssaySubmission>(&format!(
            "UPDATE essay_submissions
             SET score = $2, feedback = $3, graded_by = $4, graded_at = $5
             WHERE id = $1
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(id)
        .bind(score)
        .bind(feedback)
        .bind(grader_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl FlashCardRepository for PostgresRepository {
    async fn create_flashcard(
        &self,
        module_id: Uuid,
        req: CreateFlashCardRequest,
    ) -> RepoResult<FlashCard> {
        sqlx::query_as::<_, FlashCard>(
            "INSERT INTO flashcards (id, module_id, front, back, example, image_key, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW())
             RETURNING id, module_id, front, back, example, image_key, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(module_id)
        .bind(req.front)
        .bind(req.back)
        .bind(req.example)
        .bind(req.image_key)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_flashcard(&self, id: Uuid) -> RepoResult<Option<FlashCard>> {
        sqlx::query_as::<_, FlashCard>(
            "SELECT id, module_id, front, back, example, image_key, created_at FROM flashcards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_flashcards(&self, module_id: Uuid) -> RepoResult<Vec<FlashCard>> {
        sqlx::query_as::<_, FlashCard>(
            "SELECT id, module_id, front, back, example, image_key, created_at
             FROM flashcards WHERE module_id = $1 ORDER BY created_at",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn delete_flashcard(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM flashcards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_review(&self, user_id: Uuid, flashcard_id: Uuid) -> RepoResult<Option<FlashCardReview>> {
        sqlx::query_as::<_, FlashCardReview>(
            "SELECT user_id, flashcard_id, ease_factor, interval_days, repetitions, next_review_at, last_reviewed_at
             FROM flashcard_reviews WHERE user_id = $1 AND flashcard_id = $2",
        )
        .bind(user_id)
        .bind(flashcard_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn save_review(&self, review: &FlashCardReview) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO flashcard_reviews (user_id, flashcard_id, ease_factor, interval_days, repetitions,
                                            next_review_at, last_reviewed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id, flashcard_id) DO UPDATE
             SET ease_factor = EXCLUDED.ease_factor,
                 interval_days = EXCLUDED.interval_days,
                 repetitions = EXCLUDED.repetitions,
                 next_review_at = EXCLUDED.next_review_at,
                 last_reviewed_at = EXCLUDED.last_reviewed_at",
        )
        .bind(review.user_id)
        .bind(review.flashcard_id)
        .bind(review.ease_factor)
        .bind(review.interval_days)
        .bind(review.repetitions)
        .bind(review.next_review_at)
        .bind(review.last_reviewed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// list_due_cards
    ///
    /// Due reviews first (oldest due date first), then cards the learner never reviewed.
    /// Only cards of courses the learner is enrolled in are considered.
    async fn list_due_cards(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> RepoResult<Vec<DueFlashCard>> {
        sqlx::query_as::<_, DueFlashCard>(
            "SELECT f.id, f.module_id, f.front, f.back, f.example, f.image_key, f.created_at,
                    r.next_review_at, r.repetitions
             FROM flashcards f
             JOIN modules m ON m.id = f.module_id
             JOIN lessons l ON l.id = m.lesson_id
             JOIN enrollments e ON e.course_id = l.course_id AND e.user_id = $1
             LEFT JOIN flashcard_reviews r ON r.flashcard_id = f.id AND r.user_id = $1
             WHERE r.next_review_at IS NULL OR r.next_review_at <= $2
             ORDER BY r.next_review_at ASC NULLS LAST, f.created_at ASC
             LIMIT $3",
        )
        .bind(user_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn due_review_counts(&self, now: DateTime<Utc>) -> RepoResult<Vec<(Uuid, i64)>> {
        sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT e.user_id, COUNT(*)
             FROM enrollments e
             JOIN lessons l ON l.course_id = e.course_id
             JOIN modules m ON m.lesson_id = l.id
             JOIN flashcards f ON f.module_id = m.id
             LEFT JOIN flashcard_reviews r ON r.flashcard_id = f.id AND r.user_id = e.user_id
             WHERE r.next_review_at IS NULL OR r.next_review_at <= $1
             GROUP BY e.user_id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl PaymentRepository for PostgresRepository {
    async fn create_payment(&self, payment: &Payment) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, user_id, order_code, amount, description, purpose, target_id,
                                   status, checkout_url, created_at, paid_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(payment.order_code)
        .bind(payment.amount)
        .bind(&payment.description)
        .bind(payment.purpose)
        .bind(payment.target_id)
        .bind(payment.status)
        .bind(&payment.checkout_url)
        .bind(payment.created_at)
        .bind(payment.paid_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_payment_by_order_code(&self, order_code: i64) -> RepoResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_code = $1"
        ))
        .bind(order_code)
        .fetch_optional(&self.pool)
        .await
    }

    /// settle_payment
    ///
    /// Guarded by `status = 'pending'` so a replayed webhook settles nothing.
    async fn settle_payment(
        &self,
        order_code: i64,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepoResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = $2, paid_at = $3
             WHERE order_code = $1 AND status = 'pending'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(order_code)
        .bind(status)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_user_payments(&self, user_id: Uuid) -> RepoResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_all_payments(&self) -> RepoResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn list_packages(&self, active_only: bool) -> RepoResult<Vec<TeacherPackage>> {
        sqlx::query_as::<_, TeacherPackage>(
            "SELECT id, name, price, duration_days, max_courses, is_active
             FROM teacher_packages WHERE is_active OR NOT $1 ORDER BY price",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<TeacherPackage>> {
        sqlx::query_as::<_, TeacherPackage>(
            "SELECT id, name, price, duration_days, max_courses, is_active FROM teacher_packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_package(&self, req: CreatePackageRequest) -> RepoResult<TeacherPackage> {
        sqlx::query_as::<_, TeacherPackage>(
            "INSERT INTO teacher_packages (id, name, price, duration_days, max_courses, is_active)
             VALUES ($1, $2, $3, $4, $5, true)
             RETURNING id, name, price, duration_days, max_courses, is_active",
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.price)
        .bind(req.duration_days)
        .bind(req.max_courses)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_subscription(&self, subscription: &TeacherSubscription) -> RepoResult<bool> {
        let result = sqlx::query(
            "INSERT INTO teacher_subscriptions (id, teacher_id, package_id, payment_id, starts_at, ends_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (payment_id) DO NOTHING",
        )
        .bind(subscription.id)
        .bind(subscription.teacher_id)
        .bind(subscription.package_id)
        .bind(subscription.payment_id)
        .bind(subscription.starts_at)
        .bind(subscription.ends_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn latest_subscription(&self, teacher_id: Uuid) -> RepoResult<Option<TeacherSubscription>> {
        sqlx::query_as::<_, TeacherSubscription>(
            "SELECT id, teacher_id, package_id, payment_id, starts_at, ends_at
             FROM teacher_subscriptions WHERE teacher_id = $1
             ORDER BY ends_at DESC LIMIT 1",
        )
        .bind(teacher_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn active_subscription(
        &self,
        teacher_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<TeacherSubscription>> {
        sqlx::query_as::<_, TeacherSubscription>(
            "SELECT id, teacher_id, package_id, payment_id, starts_at, ends_at
             FROM teacher_subscriptions
             WHERE teacher_id = $1 AND starts_at <= $2 AND ends_at > $2
             ORDER BY ends_at DESC LIMIT 1",
        )
        .bind(teacher_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl NotificationRepository for PostgresRepository {
    async fn create_notification(
        &self,
        user_id: Uuid,
        kind: &str,
        message: &str,
    ) -> RepoResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (id, user_id, kind, message, is_read, created_at)
             VALUES ($1, $2, $3, $4, false, NOW())
             RETURNING id, user_id, kind, message, is_read, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(message)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_notifications(&self, user_id: Uuid) -> RepoResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, kind, message, is_read, created_at
             FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// mark_notification_read
    ///
    /// Sets `is_read = true`, enforced by an ownership check on `user_id`.
    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl StatsRepository for PostgresRepository {
    /// get_stats
    ///
    /// Compiles all counters for the administrative dashboard in a single round trip.
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
            "SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM courses),
                (SELECT COUNT(*) FROM enrollments),
                (SELECT COUNT(*) FROM quiz_attempts),
                (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE status = 'paid'),
                (SELECT COUNT(*) FROM payments WHERE status = 'pending')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminDashboardStats {
            total_users: row.0,
            total_courses: row.1,
            total_enrollments: row.2,
            total_attempts: row.3,
            total_revenue: row.4,
            pending_payments: row.5,
        })
    }
}
