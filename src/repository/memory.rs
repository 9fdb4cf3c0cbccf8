use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    CourseRepository, EssayRepository, FlashCardRepository, NotificationRepository,
    PaymentRepository, ProgressRepository, QuizRepository, RepoResult, StatsRepository,
    UserRepository,
};
use crate::models::{
    AdminDashboardStats, AnswerOption, AttemptStatus, Course, CourseFilter, CourseType,
    CreateCourseRequest, CreateEssayRequest, CreateFlashCardRequest, CreateGroupRequest,
    CreateLessonRequest, CreateModuleRequest, CreatePackageRequest, CreateQuestionRequest,
    CreateQuizRequest, CreateSectionRequest, DueFlashCard, Essay, EssaySubmission, FlashCard,
    FlashCardReview, Lesson, Module, NewUser, Notification, OtpRecord, Payment, PaymentStatus,
    Question, Quiz, QuizAttempt, QuizContent, QuizGroup, QuizSection, QuizUserAnswer, Role,
    TeacherPackage, TeacherSubscription, UpdateCourseRequest, UpdateLessonRequest,
    UpdateModuleRequest, UpdateQuizRequest, User, UserAccount, UserStreak,
};
use crate::quiz::AttemptScore;

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, UserAccount>,
    otps: HashMap<Uuid, OtpRecord>,
    courses: HashMap<Uuid, Course>,
    lessons: HashMap<Uuid, Lesson>,
    modules: HashMap<Uuid, Module>,
    enrollments: Vec<(Uuid, Uuid, DateTime<Utc>)>,
    completions: HashSet<(Uuid, Uuid)>,
    streaks: HashMap<Uuid, UserStreak>,
    quizzes: HashMap<Uuid, Quiz>,
    sections: HashMap<Uuid, QuizSection>,
    groups: HashMap<Uuid, QuizGroup>,
    questions: HashMap<Uuid, Question>,
    attempts: HashMap<Uuid, QuizAttempt>,
    answers: HashMap<(Uuid, Uuid), QuizUserAnswer>,
    essays: HashMap<Uuid, Essay>,
    submissions: HashMap<Uuid, EssaySubmission>,
    flashcards: HashMap<Uuid, FlashCard>,
    reviews: HashMap<(Uuid, Uuid), FlashCardReview>,
    payments: HashMap<i64, Payment>,
    packages: HashMap<Uuid, TeacherPackage>,
    subscriptions: Vec<TeacherSubscription>,
    notifications: Vec<Notification>,
}

impl Store {
    fn lesson_course(&self, lesson_id: Uuid) -> Option<Uuid> {
        self.lessons.get(&lesson_id).map(|l| l.course_id)
    }

    fn module_course(&self, module_id: Uuid) -> Option<Uuid> {
        self.modules
            .get(&module_id)
            .and_then(|m| self.lesson_course(m.lesson_id))
    }

    fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> bool {
        self.enrollments
            .iter()
            .any(|(u, c, _)| *u == user_id && *c == course_id)
    }

    fn quiz_of_section(&self, section_id: Uuid) -> Option<Uuid> {
        self.sections.get(&section_id).map(|s| s.quiz_id)
    }

    // Cascades follow the foreign keys of the Postgres schema.
    fn remove_module(&mut self, module_id: Uuid) {
        self.modules.remove(&module_id);
        self.completions.retain(|(_, m)| *m != module_id);
        self.flashcards.retain(|_, f| f.module_id != module_id);
        let card_ids: HashSet<Uuid> = self.flashcards.keys().copied().collect();
        self.reviews.retain(|(_, card), _| card_ids.contains(card));
        self.essays.retain(|_, e| e.module_id != module_id);
        let essay_ids: HashSet<Uuid> = self.essays.keys().copied().collect();
        self.submissions.retain(|_, s| essay_ids.contains(&s.essay_id));
        let quiz_ids: Vec<Uuid> = self
            .quizzes
            .values()
            .filter(|q| q.module_id == module_id)
            .map(|q| q.id)
            .collect();
        for quiz_id in quiz_ids {
            self.remove_quiz(quiz_id);
        }
    }

    fn remove_quiz(&mut self, quiz_id: Uuid) {
        self.quizzes.remove(&quiz_id);
        let section_ids: HashSet<Uuid> = self
            .sections
            .values()
            .filter(|s| s.quiz_id == quiz_id)
            .map(|s| s.id)
            .collect();
        self.sections.retain(|id, _| !section_ids.contains(id));
        self.groups.retain(|_, g| !section_ids.contains(&g.section_id));
        self.questions.retain(|_, q| !section_ids.contains(&q.section_id));
        let attempt_ids: HashSet<Uuid> = self
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id)
            .map(|a| a.id)
            .collect();
        self.attempts.retain(|id, _| !attempt_ids.contains(id));
        self.answers.retain(|(attempt, _), _| !attempt_ids.contains(attempt));
    }

    fn remove_lesson(&mut self, lesson_id: Uuid) {
        self.lessons.remove(&lesson_id);
        let module_ids: Vec<Uuid> = self
            .modules
            .values()
            .filter(|m| m.lesson_id == lesson_id)
            .map(|m| m.id)
            .collect();
        for module_id in module_ids {
            self.remove_module(module_id);
        }
    }
}

/// InMemoryRepository
///
/// A process-local implementation of every repository trait. It backs the router
/// integration tests and local experiments without a database; it honours the same
/// visibility, idempotency and compare-and-set rules as `PostgresRepository`.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    failures: Mutex<HashSet<&'static str>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of the named operation fail with a database error.
    pub fn fail_next(&self, operation: &'static str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(operation);
    }

    fn check_failure(&self, operation: &'static str) -> RepoResult<()> {
        let armed = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(operation);
        if armed {
            return Err(sqlx::Error::Protocol(format!("{} failed", operation)));
        }
        Ok(())
    }

    // A poisoned lock only means a test panicked mid-write; the data is still usable.
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.lock().users.get(&id).map(|a| a.user.clone()))
    }

    async fn get_account_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|a| a.user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.lock();
        if store
            .users
            .values()
            .any(|a| a.user.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(sqlx::Error::Protocol("duplicate key value violates unique constraint \"users_email_key\"".into()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            full_name: user.full_name,
            roles: user.roles,
            is_active: user.is_active,
            created_at: Utc::now(),
        };
        store.users.insert(
            created.id,
            UserAccount { user: created.clone(), password_hash: user.password_hash },
        );
        Ok(created)
    }

    async fn activate_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let mut store = self.lock();
        Ok(store.users.get_mut(&id).map(|a| {
            a.user.is_active = true;
            a.user.clone()
        }))
    }

    async fn set_user_roles(&self, id: Uuid, roles: &[Role]) -> RepoResult<Option<User>> {
        let mut store = self.lock();
        Ok(store.users.get_mut(&id).map(|a| {
            a.user.roles = roles.to_vec();
            a.user.clone()
        }))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users = self.lock().users.values().map(|a| a.user.clone()).collect();
        Ok(sorted(users, |u: &User| std::cmp::Reverse(u.created_at)))
    }

    async fn upsert_otp(&self, otp: OtpRecord) -> RepoResult<()> {
        self.lock().otps.insert(otp.user_id, otp);
        Ok(())
    }

    async fn get_otp(&self, user_id: Uuid) -> RepoResult<Option<OtpRecord>> {
        Ok(self.lock().otps.get(&user_id).cloned())
    }

    async fn record_otp_failure(&self, user_id: Uuid) -> RepoResult<()> {
        if let Some(otp) = self.lock().otps.get_mut(&user_id) {
            otp.failed_attempts += 1;
        }
        Ok(())
    }

    async fn delete_otp(&self, user_id: Uuid) -> RepoResult<()> {
        self.lock().otps.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn list_published_courses(&self, filter: &CourseFilter) -> RepoResult<Vec<Course>> {
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let courses = self
            .lock()
            .courses
            .values()
            .filter(|c| c.is_published)
            .filter(|c| filter.course_type.is_none_or(|t| c.course_type == t))
            .filter(|c| {
                needle.as_deref().is_none_or(|n| {
                    c.title.to_lowercase().contains(n) || c.description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        Ok(sorted(courses, |c: &Course| std::cmp::Reverse(c.created_at)))
    }

    async fn list_all_courses(&self) -> RepoResult<Vec<Course>> {
        let courses = self.lock().courses.values().cloned().collect();
        Ok(sorted(courses, |c: &Course| (c.is_published, std::cmp::Reverse(c.created_at))))
    }

    async fn list_courses_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Course>> {
        let courses = self
            .lock()
            .courses
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(sorted(courses, |c: &Course| std::cmp::Reverse(c.created_at)))
    }

    async fn count_courses_by_owner(&self, owner_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .lock()
            .courses
            .values()
            .filter(|c| c.owner_id == owner_id)
            .count() as i64)
    }

    async fn get_course(&self, id: Uuid) -> RepoResult<Option<Course>> {
        Ok(self.lock().courses.get(&id).cloned())
    }

    async fn create_course(
        &self,
        owner_id: Uuid,
        course_type: CourseType,
        req: CreateCourseRequest,
    ) -> RepoResult<Course> {
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            owner_id,
            title: req.title,
            description: req.description,
            course_type,
            price: req.price,
            cover_image: req.cover_image_key,
            is_published: false,
            created_at: now,
            updated_at: now,
        };
        self.lock().courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: Uuid, req: UpdateCourseRequest) -> RepoResult<Option<Course>> {
        let mut store = self.lock();
        Ok(store.courses.get_mut(&id).map(|c| {
            if let Some(title) = req.title {
                c.title = title;
            }
            if let Some(description) = req.description {
                c.description = description;
            }
            if let Some(price) = req.price {
                c.price = price;
            }
            if let Some(cover) = req.cover_image_key {
                c.cover_image = Some(cover);
            }
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn set_course_published(&self, id: Uuid, is_published: bool) -> RepoResult<Option<Course>> {
        let mut store = self.lock();
        Ok(store.courses.get_mut(&id).map(|c| {
            c.is_published = is_published;
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn delete_course(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.lock();
        if store.courses.remove(&id).is_none() {
            return Ok(false);
        }
        let lesson_ids: Vec<Uuid> = store
            .lessons
            .values()
            .filter(|l| l.course_id == id)
            .map(|l| l.id)
            .collect();
        for lesson_id in lesson_ids {
            store.remove_lesson(lesson_id);
        }
        store.enrollments.retain(|(_, c, _)| *c != id);
        Ok(true)
    }

    async fn list_lessons(&self, course_id: Uuid) -> RepoResult<Vec<Lesson>> {
        let lessons = self
            .lock()
            .lessons
            .values()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        Ok(sorted(lessons, |l: &Lesson| (l.position, l.created_at)))
    }

    async fn get_lesson(&self, id: Uuid) -> RepoResult<Option<Lesson>> {
        Ok(self.lock().lessons.get(&id).cloned())
    }

    async fn create_lesson(
        &self,
        course_id: Uuid,
        req: CreateLessonRequest,
        position: i32,
    ) -> RepoResult<Lesson> {
        let lesson = Lesson {
            id: Uuid::new_v4(),
            course_id,
            title: req.title,
            description: req.description,
            position,
            created_at: Utc::now(),
        };
        self.lock().lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    async fn update_lesson(&self, id: Uuid, req: UpdateLessonRequest) -> RepoResult<Option<Lesson>> {
        let mut store = self.lock();
        Ok(store.lessons.get_mut(&id).map(|l| {
            if let Some(title) = req.title {
                l.title = title;
            }
            if let Some(description) = req.description {
                l.description = description;
            }
            if let Some(position) = req.position {
                l.position = position;
            }
            l.clone()
        }))
    }

    async fn delete_lesson(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.lock();
        if !store.lessons.contains_key(&id) {
            return Ok(false);
        }
        store.remove_lesson(id);
        Ok(true)
    }

    async fn list_modules(&self, lesson_id: Uuid) -> RepoResult<Vec<Module>> {
        let modules = self
            .lock()
            .modules
            .values()
            .filter(|m| m.lesson_id == lesson_id)
            .cloned()
            .collect();
        Ok(sorted(modules, |m: &Module| (m.position, m.created_at)))
    }

    async fn list_course_modules(&self, course_id: Uuid) -> RepoResult<Vec<Module>> {
        let store = self.lock();
        let modules = store
            .modules
            .values()
            .filter(|m| store.lesson_course(m.lesson_id) == Some(course_id))
            .cloned()
            .collect();
        let lesson_position =
            |m: &Module| store.lessons.get(&m.lesson_id).map_or(0, |l| l.position);
        Ok(sorted(modules, |m: &Module| (lesson_position(m), m.position)))
    }

    async fn get_module(&self, id: Uuid) -> RepoResult<Option<Module>> {
        Ok(self.lock().modules.get(&id).cloned())
    }

    async fn create_module(
        &self,
        lesson_id: Uuid,
        req: CreateModuleRequest,
        position: i32,
    ) -> RepoResult<Module> {
        let module = Module {
            id: Uuid::new_v4(),
            lesson_id,
            title: req.title,
            content_type: req.content_type,
            assessment_kind: req.assessment_kind,
            content: req.content,
            media_key: req.media_key,
            position,
            created_at: Utc::now(),
        };
        self.lock().modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn update_module(&self, id: Uuid, req: UpdateModuleRequest) -> RepoResult<Option<Module>> {
        let mut store = self.lock();
        Ok(store.modules.get_mut(&id).map(|m| {
            if let Some(title) = req.title {
                m.title = title;
            }
            if let Some(content) = req.content {
                m.content = Some(content);
            }
            if let Some(media_key) = req.media_key {
                m.media_key = Some(media_key);
            }
            if let Some(position) = req.position {
                m.position = position;
            }
            m.clone()
        }))
    }

    async fn delete_module(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.lock();
        if !store.modules.contains_key(&id) {
            return Ok(false);
        }
        store.remove_module(id);
        Ok(true)
    }

    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool> {
        self.check_failure("enroll")?;
        let mut store = self.lock();
        if store.is_enrolled(user_id, course_id) {
            return Ok(false);
        }
        store.enrollments.push((user_id, course_id, Utc::now()));
        Ok(true)
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<bool> {
        Ok(self.lock().is_enrolled(user_id, course_id))
    }

    async fn list_enrolled_courses(&self, user_id: Uuid) -> RepoResult<Vec<Course>> {
        let store = self.lock();
        Ok(store
            .enrollments
            .iter()
            .rev()
            .filter(|(u, _, _)| *u == user_id)
            .filter_map(|(_, c, _)| store.courses.get(c).cloned())
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn mark_module_complete(&self, user_id: Uuid, module_id: Uuid) -> RepoResult<bool> {
        Ok(self.lock().completions.insert((user_id, module_id)))
    }

    async fn completed_module_ids(&self, user_id: Uuid, course_id: Uuid) -> RepoResult<Vec<Uuid>> {
        let store = self.lock();
        Ok(store
            .completions
            .iter()
            .filter(|(u, m)| *u == user_id && store.module_course(*m) == Some(course_id))
            .map(|(_, m)| *m)
            .collect())
    }

    async fn get_streak(&self, user_id: Uuid) -> RepoResult<Option<UserStreak>> {
        Ok(self.lock().streaks.get(&user_id).cloned())
    }

    async fn save_streak(&self, streak: &UserStreak) -> RepoResult<()> {
        self.lock().streaks.insert(streak.user_id, streak.clone());
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn create_quiz(&self, module_id: Uuid, req: CreateQuizRequest) -> RepoResult<Quiz> {
        let mut store = self.lock();
        if store.quizzes.values().any(|q| q.module_id == module_id) {
            return Err(sqlx::Error::Protocol("duplicate key value violates unique constraint \"quizzes_module_id_key\"".into()));
        }
        let quiz = Quiz {
            id: Uuid::new_v4(),
            module_id,
            title: req.title,
            description: req.description,
            time_limit_minutes: req.time_limit_minutes,
            passing_score: req.passing_score,
            max_attempts: req.max_attempts,
            shuffle_questions: req.shuffle_questions,
            shuffle_answers: req.shuffle_answers,
            show_answers_after_submit: req.show_answers_after_submit,
            created_at: Utc::now(),
        };
        store.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn get_quiz(&self, id: Uuid) -> RepoResult<Option<Quiz>> {
        Ok(self.lock().quizzes.get(&id).cloned())
    }

    async fn get_quiz_by_module(&self, module_id: Uuid) -> RepoResult<Option<Quiz>> {
        Ok(self
            .lock()
            .quizzes
            .values()
            .find(|q| q.module_id == module_id)
            .cloned())
    }

    async fn update_quiz(&self, id: Uuid, req: UpdateQuizRequest) -> RepoResult<Option<Quiz>> {
        let mut store = self.lock();
        Ok(store.quizzes.get_mut(&id).map(|q| {
            if let Some(title) = req.title {
                q.title = title;
            }
            if let Some(description) = req.description {
                q.description = description;
            }
            if let Some(limit) = req.time_limit_minutes {
                q.time_limit_minutes = Some(limit);
            }
            if let Some(passing) = req.passing_score {
                q.passing_score = passing;
            }
            if let Some(max) = req.max_attempts {
                q.max_attempts = Some(max);
            }
            if let Some(flag) = req.shuffle_questions {
                q.shuffle_questions = flag;
            }
            if let Some(flag) = req.shuffle_answers {
                q.shuffle_answers = flag;
            }
            if let Some(flag) = req.show_answers_after_submit {
                q.show_answers_after_submit = flag;
            }
            q.clone()
        }))
    }

    async fn create_section(
        &self,
        quiz_id: Uuid,
        req: CreateSectionRequest,
        position: i32,
    ) -> RepoResult<QuizSection> {
        let section = QuizSection {
            id: Uuid::new_v4(),
            quiz_id,
            title: req.title,
            instructions: req.instructions,
            position,
        };
        self.lock().sections.insert(section.id, section.clone());
        Ok(section)
    }

    async fn get_section(&self, id: Uuid) -> RepoResult<Option<QuizSection>> {
        Ok(self.lock().sections.get(&id).cloned())
    }

    async fn create_group(
        &self,
        section_id: Uuid,
        req: CreateGroupRequest,
        position: i32,
    ) -> RepoResult<QuizGroup> {
        let group = QuizGroup {
            id: Uuid::new_v4(),
            section_id,
            title: req.title,
            passage: req.passage,
            media_key: req.media_key,
            position,
        };
        self.lock().groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_group(&self, id: Uuid) -> RepoResult<Option<QuizGroup>> {
        Ok(self.lock().groups.get(&id).cloned())
    }

    async fn create_question(
        &self,
        section_id: Uuid,
        req: CreateQuestionRequest,
        position: i32,
    ) -> RepoResult<Question> {
        let id = Uuid::new_v4();
        let options = req
            .options
            .into_iter()
            .enumerate()
            .map(|(index, o)| AnswerOption {
                id: Uuid::new_v4(),
                question_id: id,
                content: o.content,
                is_correct: o.is_correct,
                match_value: o.match_value,
                position: index as i32,
            })
            .collect();
        let question = Question {
            id,
            section_id,
            group_id: req.group_id,
            question_type: req.question_type,
            prompt: req.prompt,
            points: req.points.unwrap_or(1.0),
            explanation: req.explanation,
            position,
            options,
        };
        self.lock().questions.insert(id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> RepoResult<Option<Question>> {
        Ok(self.lock().questions.get(&id).cloned())
    }

    async fn delete_question(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.lock();
        let removed = store.questions.remove(&id).is_some();
        store.answers.retain(|(_, q), _| *q != id);
        Ok(removed)
    }

    async fn load_quiz_content(&self, quiz_id: Uuid) -> RepoResult<Option<QuizContent>> {
        let store = self.lock();
        let Some(quiz) = store.quizzes.get(&quiz_id).cloned() else {
            return Ok(None);
        };
        let sections = sorted(
            store
                .sections
                .values()
                .filter(|s| s.quiz_id == quiz_id)
                .cloned()
                .collect(),
            |s: &QuizSection| s.position,
        );
        let groups = sorted(
            store
                .groups
                .values()
                .filter(|g| store.quiz_of_section(g.section_id) == Some(quiz_id))
                .cloned()
                .collect(),
            |g: &QuizGroup| g.position,
        );
        let section_position =
            |q: &Question| store.sections.get(&q.section_id).map_or(0, |s| s.position);
        let questions = sorted(
            store
                .questions
                .values()
                .filter(|q| store.quiz_of_section(q.section_id) == Some(quiz_id))
                .cloned()
                .collect(),
            |q: &Question| (section_position(q), q.position),
        );
        Ok(Some(QuizContent { quiz, sections, groups, questions }))
    }

    async fn create_attempt(&self, attempt: &QuizAttempt) -> RepoResult<()> {
        self.lock().attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn get_attempt(&self, id: Uuid) -> RepoResult<Option<QuizAttempt>> {
        Ok(self.lock().attempts.get(&id).cloned())
    }

    async fn find_in_progress_attempt(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
    ) -> RepoResult<Option<QuizAttempt>> {
        Ok(self
            .lock()
            .attempts
            .values()
            .filter(|a| {
                a.user_id == user_id && a.quiz_id == quiz_id && a.status == AttemptStatus::InProgress
            })
            .max_by_key(|a| a.started_at)
            .cloned())
    }

    async fn count_attempts(&self, user_id: Uuid, quiz_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .lock()
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .count() as i64)
    }

    async fn list_attempts(&self, user_id: Uuid, quiz_id: Uuid) -> RepoResult<Vec<QuizAttempt>> {
        let attempts = self
            .lock()
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .cloned()
            .collect();
        Ok(sorted(attempts, |a: &QuizAttempt| std::cmp::Reverse(a.attempt_number)))
    }

    async fn upsert_answer(&self, answer: &QuizUserAnswer) -> RepoResult<QuizUserAnswer> {
        let mut store = self.lock();
        let key = (answer.attempt_id, answer.question_id);
        let stored = match store.answers.get(&key) {
            // The first row keeps its id, like ON CONFLICT DO UPDATE.
            Some(existing) => QuizUserAnswer { id: existing.id, ..answer.clone() },
            None => answer.clone(),
        };
        store.answers.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list_answers(&self, attempt_id: Uuid) -> RepoResult<Vec<QuizUserAnswer>> {
        Ok(self
            .lock()
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn finalize_attempt(
        &self,
        id: Uuid,
        status: AttemptStatus,
        score: &AttemptScore,
        submitted_at: DateTime<Utc>,
    ) -> RepoResult<Option<QuizAttempt>> {
        let mut store = self.lock();
        let Some(attempt) = store
            .attempts
            .get_mut(&id)
            .filter(|a| a.status == AttemptStatus::InProgress)
        else {
            return Ok(None);
        };
        attempt.status = status;
        attempt.score = score.score;
        attempt.max_score = score.max_score;
        attempt.percentage = score.percentage;
        attempt.passed = Some(score.passed);
        attempt.submitted_at = Some(submitted_at);
        Ok(Some(attempt.clone()))
    }

    async fn list_expired_attempts(&self, now: DateTime<Utc>) -> RepoResult<Vec<QuizAttempt>> {
        Ok(self
            .lock()
            .attempts
            .values()
            .filter(|a| a.status == AttemptStatus::InProgress)
            .filter(|a| a.expires_at.is_some_and(|e| e <= now))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EssayRepository for InMemoryRepository {
    async fn create_essay(&self, module_id: Uuid, req: CreateEssayRequest) -> RepoResult<Essay> {
        let mut store = self.lock();
        if store.essays.values().any(|e| e.module_id == module_id) {
            return Err(sqlx::Error::Protocol("duplicate key value violates unique constraint \"essays_module_id_key\"".into()));
        }
        let essay = Essay {
            id: Uuid::new_v4(),
            module_id,
            title: req.title,
            prompt: req.prompt,
            max_score: req.max_score.unwrap_or(10.0),
            created_at: Utc::now(),
        };
        store.essays.insert(essay.id, essay.clone());
        Ok(essay)
    }

    async fn get_essay(&self, id: Uuid) -> RepoResult<Option<Essay>> {
        Ok(self.lock().essays.get(&id).cloned())
    }

    async fn get_essay_by_module(&self, module_id: Uuid) -> RepoResult<Option<Essay>> {
        Ok(self
            .lock()
            .essays
            .values()
            .find(|e| e.module_id == module_id)
            .cloned())
    }

    async fn upsert_submission(
        &self,
        essay_id: Uuid,
        user_id: Uuid,
        content: String,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<EssaySubmission>> {
        let mut store = self.lock();
        if let Some(existing) = store
            .submissions
            .values_mut()
            .find(|s| s.essay_id == essay_id && s.user_id == user_id)
        {
            if existing.is_graded() {
                return Ok(None);
            }
            existing.content = content;
            existing.submitted_at = now;
            return Ok(Some(existing.clone()));
        }
        let submission = EssaySubmission {
            id: Uuid::new_v4(),
            essay_id,
            user_id,
            content,
            submitted_at: now,
            ..EssaySubmission::default()
        };
        store.submissions.insert(submission.id, submission.clone());
        Ok(Some(submission))
    }

    async fn get_submission(&self, id: Uuid) -> RepoResult<Option<EssaySubmission>> {
        Ok(self.lock().submissions.get(&id).cloned())
    }

    async fn get_user_submission(
        &self,
        essay_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<EssaySubmission>> {
        Ok(self
            .lock()
            .submissions
            .values()
            .find(|s| s.essay_id == essay_id && s.user_id == user_id)
            .cloned())
    }

    async fn list_submissions(&self, essay_id: Uuid) -> RepoResult<Vec<EssaySubmission>> {
        let submissions = self
            .lock()
            .submissions
            .values()
            .filter(|s| s.essay_id == essay_id)
            .cloned()
            .collect();
        Ok(sorted(submissions, |s: &EssaySubmission| s.submitted_at))
    }

    async fn grade_submission(
        &self,
        id: Uuid,
        score: f64,
        feedback: Option<String>,
        grader_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<EssaySubmission>> {
        let mut store = self.lock();
        Ok(store.submissions.get_mut(&id).map(|s| {
            s.score = Some(score);
            s.feedback = feedback;
            s.graded_by = Some(grader_id);
            s.graded_at = Some(now);
            s.clone()
        }))
    }
}

#[async_trait]
impl FlashCardRepository for InMemoryRepository {
    async fn create_flashcard(
        &self,
        module_id: Uuid,
        req: CreateFlashCardRequest,
    ) -> RepoResult<FlashCard> {
        let card = FlashCard {
            id: Uuid::new_v4(),
            module_id,
            front: req.front,
            back: req.back,
            example: req.example,
            image_key: req.image_key,
            created_at: Utc::now(),
        };
        self.lock().flashcards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn get_flashcard(&self, id: Uuid) -> RepoResult<Option<FlashCard>> {
        Ok(self.lock().flashcards.get(&id).cloned())
    }

    async fn list_flashcards(&self, module_id: Uuid) -> RepoResult<Vec<FlashCard>> {
        let cards = self
            .lock()
            .flashcards
            .values()
            .filter(|f| f.module_id == module_id)
            .cloned()
            .collect();
        Ok(sorted(cards, |f: &FlashCard| f.created_at))
    }

    async fn delete_flashcard(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.lock();
        let removed = store.flashcards.remove(&id).is_some();
        store.reviews.retain(|(_, card), _| *card != id);
        Ok(removed)
    }

    async fn get_review(&self, user_id: Uuid, flashcard_id: Uuid) -> RepoResult<Option<FlashCardReview>> {
        Ok(self.lock().reviews.get(&(user_id, flashcard_id)).cloned())
    }

    async fn save_review(&self, review: &FlashCardReview) -> RepoResult<()> {
        self.lock()
            .reviews
            .insert((review.user_id, review.flashcard_id), review.clone());
        Ok(())
    }

    async fn list_due_cards(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> RepoResult<Vec<DueFlashCard>> {
        let store = self.lock();
        let mut due: Vec<DueFlashCard> = store
            .flashcards
            .values()
            .filter(|f| {
                store
                    .module_course(f.module_id)
                    .is_some_and(|c| store.is_enrolled(user_id, c))
            })
            .filter_map(|f| {
                let review = store.reviews.get(&(user_id, f.id));
                match review {
                    Some(r) if r.next_review_at > now => None,
                    _ => Some(DueFlashCard {
                        card: f.clone(),
                        next_review_at: review.map(|r| r.next_review_at),
                        repetitions: review.map(|r| r.repetitions),
                    }),
                }
            })
            .collect();
        // Reviewed cards by due date, then never-reviewed cards by creation.
        due.sort_by_key(|d| (d.next_review_at.is_none(), d.next_review_at, d.card.created_at));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn due_review_counts(&self, now: DateTime<Utc>) -> RepoResult<Vec<(Uuid, i64)>> {
        let store = self.lock();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for (user_id, course_id, _) in &store.enrollments {
            let due = store
                .flashcards
                .values()
                .filter(|f| store.module_course(f.module_id) == Some(*course_id))
                .filter(|f| {
                    store
                        .reviews
                        .get(&(*user_id, f.id))
                        .is_none_or(|r| r.next_review_at <= now)
                })
                .count();
            if due > 0 {
                *counts.entry(*user_id).or_default() += due as i64;
            }
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryRepository {
    async fn create_payment(&self, payment: &Payment) -> RepoResult<()> {
        let mut store = self.lock();
        if store.payments.contains_key(&payment.order_code) {
            return Err(sqlx::Error::Protocol("duplicate key value violates unique constraint \"payments_order_code_key\"".into()));
        }
        store.payments.insert(payment.order_code, payment.clone());
        Ok(())
    }

    async fn get_payment_by_order_code(&self, order_code: i64) -> RepoResult<Option<Payment>> {
        Ok(self.lock().payments.get(&order_code).cloned())
    }

    async fn settle_payment(
        &self,
        order_code: i64,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepoResult<Option<Payment>> {
        let mut store = self.lock();
        let Some(payment) = store
            .payments
            .get_mut(&order_code)
            .filter(|p| p.status == PaymentStatus::Pending)
        else {
            return Ok(None);
        };
        payment.status = status;
        payment.paid_at = paid_at;
        Ok(Some(payment.clone()))
    }

    async fn list_user_payments(&self, user_id: Uuid) -> RepoResult<Vec<Payment>> {
        let payments = self
            .lock()
            .payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted(payments, |p: &Payment| std::cmp::Reverse(p.created_at)))
    }

    async fn list_all_payments(&self) -> RepoResult<Vec<Payment>> {
        let payments = self.lock().payments.values().cloned().collect();
        Ok(sorted(payments, |p: &Payment| std::cmp::Reverse(p.created_at)))
    }

    async fn list_packages(&self, active_only: bool) -> RepoResult<Vec<TeacherPackage>> {
        let packages = self
            .lock()
            .packages
            .values()
            .filter(|p| p.is_active || !active_only)
            .cloned()
            .collect();
        Ok(sorted(packages, |p: &TeacherPackage| p.price))
    }

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<TeacherPackage>> {
        Ok(self.lock().packages.get(&id).cloned())
    }

    async fn create_package(&self, req: CreatePackageRequest) -> RepoResult<TeacherPackage> {
        let package = TeacherPackage {
            id: Uuid::new_v4(),
            name: req.name,
            price: req.price,
            duration_days: req.duration_days,
            max_courses: req.max_courses,
            is_active: true,
        };
        self.lock().packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn create_subscription(&self, subscription: &TeacherSubscription) -> RepoResult<bool> {
        self.check_failure("create_subscription")?;
        let mut store = self.lock();
        let duplicate = subscription.payment_id.is_some()
            && store
                .subscriptions
                .iter()
                .any(|s| s.payment_id == subscription.payment_id);
        if duplicate {
            return Ok(false);
        }
        store.subscriptions.push(subscription.clone());
        Ok(true)
    }

    async fn latest_subscription(&self, teacher_id: Uuid) -> RepoResult<Option<TeacherSubscription>> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.teacher_id == teacher_id)
            .max_by_key(|s| s.ends_at)
            .cloned())
    }

    async fn active_subscription(
        &self,
        teacher_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<TeacherSubscription>> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.teacher_id == teacher_id && s.is_active_at(now))
            .max_by_key(|s| s.ends_at)
            .cloned())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn create_notification(
        &self,
        user_id: Uuid,
        kind: &str,
        message: &str,
    ) -> RepoResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.to_string(),
            message: message.to_string(),
            is_read: false,
            created_at: Utc::now(),
        };
        self.lock().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user_id: Uuid) -> RepoResult<Vec<Notification>> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let mut store = self.lock();
        match store
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl StatsRepository for InMemoryRepository {
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        let store = self.lock();
        Ok(AdminDashboardStats {
            total_users: store.users.len() as i64,
            total_courses: store.courses.len() as i64,
            total_enrollments: store.enrollments.len() as i64,
            total_attempts: store.attempts.len() as i64,
            total_revenue: store
                .payments
                .values()
                .filter(|p| p.status == PaymentStatus::Paid)
                .map(|p| p.amount)
                .sum(),
            pending_payments: store
                .payments
                .values()
                .filter(|p| p.status == PaymentStatus::Pending)
                .count() as i64,
        })
    }
}
