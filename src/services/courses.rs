//! Course catalogue, authoring and enrollment.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    access::{lesson_with_course, load_course, module_with_course, require_author, require_view},
    require_text,
};
use crate::{
    auth::AuthUser,
    error::{ServiceError, ServiceResult},
    models::{
        AssessmentKind, ContentType, Course, CourseFilter, CourseOutline, CourseType,
        CreateCourseRequest, CreateLessonRequest, CreateModuleRequest, Lesson, Module, Role,
        UpdateCourseRequest, UpdateLessonRequest, UpdateModuleRequest,
    },
    repository::{CourseRepository, PaymentRepository, Repository},
};

pub async fn list_catalogue(repo: &dyn Repository, filter: &CourseFilter) -> ServiceResult<Vec<Course>> {
    Ok(repo.list_published_courses(filter).await?)
}

/// Published course with its ordered lessons. Unpublished courses are reported missing.
pub async fn get_outline(repo: &dyn Repository, course_id: Uuid) -> ServiceResult<CourseOutline> {
    let course = load_course(repo, course_id).await?;
    if !course.is_published {
        return Err(ServiceError::not_found("Course"));
    }
    let lessons = repo.list_lessons(course.id).await?;
    Ok(CourseOutline { course, lessons })
}

fn validate_price(price: i64) -> ServiceResult<()> {
    if price < 0 {
        return Err(ServiceError::BadRequest("Price cannot be negative".to_string()));
    }
    Ok(())
}

/// Checks that a teacher's active package still has room for another course.
async fn ensure_course_quota(repo: &dyn Repository, teacher_id: Uuid, now: DateTime<Utc>) -> ServiceResult<()> {
    let subscription = repo
        .active_subscription(teacher_id, now)
        .await?
        .ok_or_else(|| {
            ServiceError::PaymentRequired("An active teacher subscription is required".to_string())
        })?;

    let package = repo
        .get_package(subscription.package_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Package"))?;

    let owned = repo.count_courses_by_owner(teacher_id).await?;
    if owned >= i64::from(package.max_courses) {
        return Err(ServiceError::Forbidden(format!(
            "Your {} package allows at most {} courses",
            package.name, package.max_courses
        )));
    }
    Ok(())
}

/// create_course
///
/// Admins create `System` courses. Teachers create `Teacher` courses and, when
/// `require_subscription` is set, need an active package with a free course slot.
pub async fn create_course(
    repo: &dyn Repository,
    user: &AuthUser,
    req: CreateCourseRequest,
    require_subscription: bool,
    now: DateTime<Utc>,
) -> ServiceResult<Course> {
    require_text(&req.title, "Title")?;
    validate_price(req.price)?;

    let course_type = if user.is_admin() {
        CourseType::System
    } else {
        user.require_role(Role::Teacher)?;
        if require_subscription {
            ensure_course_quota(repo, user.id, now).await?;
        }
        CourseType::Teacher
    };

    let course = repo.create_course(user.id, course_type, req).await?;
    tracing::info!(course_id = %course.id, owner_id = %user.id, "course created");
    Ok(course)
}

pub async fn list_owned(repo: &dyn Repository, user: &AuthUser) -> ServiceResult<Vec<Course>> {
    Ok(repo.list_courses_by_owner(user.id).await?)
}

/// Full course record for its author, published or not.
pub async fn get_managed_course(repo: &dyn Repository, user: &AuthUser, course_id: Uuid) -> ServiceResult<Course> {
    let course = load_course(repo, course_id).await?;
    require_author(user, &course)?;
    Ok(course)
}

pub async fn update_course(
    repo: &dyn Repository,
    user: &AuthUser,
    course_id: Uuid,
    req: UpdateCourseRequest,
) -> ServiceResult<Course> {
    let course = load_course(repo, course_id).await?;
    require_author(user, &course)?;
    if let Some(title) = &req.title {
        require_text(title, "Title")?;
    }
    if let Some(price) = req.price {
        validate_price(price)?;
    }

    repo.update_course(course_id, req)
        .await?
        .ok_or_else(|| ServiceError::not_found("Course"))
}

pub async fn set_published(
    repo: &dyn Repository,
    user: &AuthUser,
    course_id: Uuid,
    is_published: bool,
) -> ServiceResult<Course> {
    let course = load_course(repo, course_id).await?;
    require_author(user, &course)?;
    repo.set_course_published(course_id, is_published)
        .await?
        .ok_or_else(|| ServiceError::not_found("Course"))
}

pub async fn delete_course(repo: &dyn Repository, user: &AuthUser, course_id: Uuid) -> ServiceResult<()> {
    let course = load_course(repo, course_id).await?;
    require_author(user, &course)?;
    if !repo.delete_course(course_id).await? {
        return Err(ServiceError::not_found("Course"));
    }
    tracing::info!(course_id = %course_id, "course deleted");
    Ok(())
}

// --- Lessons ---

pub async fn list_lessons(repo: &dyn Repository, user: &AuthUser, course_id: Uuid) -> ServiceResult<Vec<Lesson>> {
    let course = load_course(repo, course_id).await?;
    require_view(repo, user, &course).await?;
    Ok(repo.list_lessons(course_id).await?)
}

pub async fn create_lesson(
    repo: &dyn Repository,
    user: &AuthUser,
    course_id: Uuid,
    req: CreateLessonRequest,
) -> ServiceResult<Lesson> {
    let course = load_course(repo, course_id).await?;
    require_author(user, &course)?;
    require_text(&req.title, "Title")?;

    let position = match req.position {
        Some(position) => position,
        None => next_position(repo.list_lessons(course_id).await?.iter().map(|l| l.position)),
    };
    Ok(repo.create_lesson(course_id, req, position).await?)
}

pub async fn update_lesson(
    repo: &dyn Repository,
    user: &AuthUser,
    lesson_id: Uuid,
    req: UpdateLessonRequest,
) -> ServiceResult<Lesson> {
    let (_, course) = lesson_with_course(repo, lesson_id).await?;
    require_author(user, &course)?;
    if let Some(title) = &req.title {
        require_text(title, "Title")?;
    }
    repo.update_lesson(lesson_id, req)
        .await?
        .ok_or_else(|| ServiceError::not_found("Lesson"))
}

pub async fn delete_lesson(repo: &dyn Repository, user: &AuthUser, lesson_id: Uuid) -> ServiceResult<()> {
    let (_, course) = lesson_with_course(repo, lesson_id).await?;
    require_author(user, &course)?;
    if !repo.delete_lesson(lesson_id).await? {
        return Err(ServiceError::not_found("Lesson"));
    }
    Ok(())
}

// --- Modules ---

/// Assessment modules must name their kind; other content types must not.
fn validate_module_kind(content_type: ContentType, kind: Option<AssessmentKind>) -> ServiceResult<()> {
    match (content_type, kind) {
        (ContentType::Assessment, None) => Err(ServiceError::BadRequest(
            "Assessment modules need an assessment kind".to_string(),
        )),
        (ContentType::Lecture | ContentType::FlashCard, Some(_)) => Err(ServiceError::BadRequest(
            "Only assessment modules have an assessment kind".to_string(),
        )),
        _ => Ok(()),
    }
}

pub async fn list_modules(repo: &dyn Repository, user: &AuthUser, lesson_id: Uuid) -> ServiceResult<Vec<Module>> {
    let (_, course) = lesson_with_course(repo, lesson_id).await?;
    require_view(repo, user, &course).await?;
    Ok(repo.list_modules(lesson_id).await?)
}

pub async fn get_module(repo: &dyn Repository, user: &AuthUser, module_id: Uuid) -> ServiceResult<Module> {
    let (module, course) = module_with_course(repo, module_id).await?;
    require_view(repo, user, &course).await?;
    Ok(module)
}

pub async fn create_module(
    repo: &dyn Repository,
    user: &AuthUser,
    lesson_id: Uuid,
    req: CreateModuleRequest,
) -> ServiceResult<Module> {
    let (_, course) = lesson_with_course(repo, lesson_id).await?;
    require_author(user, &course)?;
    require_text(&req.title, "Title")?;
    validate_module_kind(req.content_type, req.assessment_kind)?;

    let position = match req.position {
        Some(position) => position,
        None => next_position(repo.list_modules(lesson_id).await?.iter().map(|m| m.position)),
    };
    Ok(repo.create_module(lesson_id, req, position).await?)
}

pub async fn update_module(
    repo: &dyn Repository,
    user: &AuthUser,
    module_id: Uuid,
    req: UpdateModuleRequest,
) -> ServiceResult<Module> {
    let (_, course) = module_with_course(repo, module_id).await?;
    require_author(user, &course)?;
    if let Some(title) = &req.title {
        require_text(title, "Title")?;
    }
    repo.update_module(module_id, req)
        .await?
        .ok_or_else(|| ServiceError::not_found("Module"))
}

pub async fn delete_module(repo: &dyn Repository, user: &AuthUser, module_id: Uuid) -> ServiceResult<()> {
    let (_, course) = module_with_course(repo, module_id).await?;
    require_author(user, &course)?;
    if !repo.delete_module(module_id).await? {
        return Err(ServiceError::not_found("Module"));
    }
    Ok(())
}

/// One past the highest existing position, starting at 1.
pub fn next_position(positions: impl Iterator<Item = i32>) -> i32 {
    positions.max().map_or(1, |max| max + 1)
}

// --- Enrollment ---

/// enroll
///
/// Free published courses enroll directly and idempotently. Paid courses answer 402;
/// their enrollment is created when the PayOS webhook confirms payment.
pub async fn enroll(repo: &dyn Repository, user: &AuthUser, course_id: Uuid) -> ServiceResult<Course> {
    let course = load_course(repo, course_id).await?;
    if !course.is_published {
        return Err(ServiceError::not_found("Course"));
    }
    if !course.is_free() {
        return Err(ServiceError::PaymentRequired(
            "This course must be purchased before enrolling".to_string(),
        ));
    }
    if repo.enroll(user.id, course_id).await? {
        tracing::info!(user_id = %user.id, course_id = %course_id, "enrolled in free course");
    }
    Ok(course)
}

pub async fn list_enrolled(repo: &dyn Repository, user: &AuthUser) -> ServiceResult<Vec<Course>> {
    Ok(repo.list_enrolled_courses(user.id).await?)
}
