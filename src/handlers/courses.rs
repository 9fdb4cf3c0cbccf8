use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::{
        Course, CourseFilter, CourseOutline, CreateCourseRequest, CreateLessonRequest,
        CreateModuleRequest, Lesson, Module, PublishRequest, UpdateCourseRequest,
        UpdateLessonRequest, UpdateModuleRequest,
    },
    services::courses,
};

// --- Catalogue ---

/// get_courses
///
/// [Public Route] Published courses, optionally filtered by `search` and `course_type`.
#[utoipa::path(
    get,
    path = "/courses",
    params(CourseFilter),
    responses((status = 200, description = "Published courses", body = [Course]))
)]
pub async fn get_courses(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
) -> ApiResult<Vec<Course>> {
    Ok(ServiceResponse::ok(courses::list_catalogue(&*state.repo, &filter).await?))
}

/// get_course_outline
///
/// [Public Route] A published course with its ordered lessons. Unpublished courses
/// answer 404.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course outline", body = CourseOutline),
        (status = 404, description = "Not found or not published")
    )
)]
pub async fn get_course_outline(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CourseOutline> {
    Ok(ServiceResponse::ok(courses::get_outline(&*state.repo, course_id).await?))
}

// --- Course management ---

/// create_course
///
/// [Authenticated Route] Admins create System courses. Teachers create Teacher courses
/// within the limits of their subscription package.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 402, description = "Teacher has no active subscription"),
        (status = 403, description = "Not a teacher, or course limit reached")
    )
)]
pub async fn create_course(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> ApiResult<Course> {
    let course = courses::create_course(
        &*state.repo,
        &user,
        payload,
        state.config.require_teacher_subscription,
        Utc::now(),
    )
    .await?;
    Ok(ServiceResponse::created(course))
}

/// [Authenticated Route] Courses the caller authored, drafts included.
#[utoipa::path(
    get,
    path = "/me/authored-courses",
    responses((status = 200, description = "Authored courses", body = [Course]))
)]
pub async fn get_authored_courses(user: AuthUser, State(state): State<AppState>) -> ApiResult<Vec<Course>> {
    Ok(ServiceResponse::ok(courses::list_owned(&*state.repo, &user).await?))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/manage",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course record", body = Course),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn get_managed_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Course> {
    Ok(ServiceResponse::ok(courses::get_managed_course(&*state.repo, &user, course_id).await?))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    request_body = UpdateCourseRequest,
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn update_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> ApiResult<Course> {
    Ok(ServiceResponse::ok(courses::update_course(&*state.repo, &user, course_id, payload).await?))
}

/// publish_course
///
/// [Authenticated Route] Shows or hides a course in the public catalogue.
#[utoipa::path(
    put,
    path = "/courses/{id}/publish",
    request_body = PublishRequest,
    params(("id" = Uuid, Path, description = "Course id")),
    responses((status = 200, description = "Visibility changed", body = Course))
)]
pub async fn publish_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<PublishRequest>,
) -> ApiResult<Course> {
    let course = courses::set_published(&*state.repo, &user, course_id, payload.is_published).await?;
    Ok(ServiceResponse::ok(course))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<()> {
    courses::delete_course(&*state.repo, &user, course_id).await?;
    Ok(ServiceResponse::ok(()).message("Course deleted"))
}

// --- Enrollment ---

/// enroll_course
///
/// [Authenticated Route] Enrolls the caller in a free course. Paid courses answer 402
/// and go through `/courses/{id}/checkout` instead.
#[utoipa::path(
    post,
    path = "/courses/{id}/enroll",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Enrolled", body = Course),
        (status = 402, description = "Course must be purchased")
    )
)]
pub async fn enroll_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Course> {
    let course = courses::enroll(&*state.repo, &user, course_id).await?;
    Ok(ServiceResponse::ok(course).message("Enrolled"))
}

#[utoipa::path(
    get,
    path = "/me/courses",
    responses((status = 200, description = "Enrolled courses", body = [Course]))
)]
pub async fn get_my_courses(user: AuthUser, State(state): State<AppState>) -> ApiResult<Vec<Course>> {
    Ok(ServiceResponse::ok(courses::list_enrolled(&*state.repo, &user).await?))
}

// --- Lessons ---

#[utoipa::path(
    get,
    path = "/courses/{id}/lessons",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Lessons", body = [Lesson]),
        (status = 403, description = "Not enrolled")
    )
)]
pub async fn get_lessons(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<Lesson>> {
    Ok(ServiceResponse::ok(courses::list_lessons(&*state.repo, &user, course_id).await?))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/lessons",
    request_body = CreateLessonRequest,
    params(("id" = Uuid, Path, description = "Course id")),
    responses((status = 201, description = "Lesson created", body = Lesson))
)]
pub async fn create_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateLessonRequest>,
) -> ApiResult<Lesson> {
    let lesson = courses::create_lesson(&*state.repo, &user, course_id, payload).await?;
    Ok(ServiceResponse::created(lesson))
}

#[utoipa::path(
    put,
    path = "/lessons/{id}",
    request_body = UpdateLessonRequest,
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses((status = 200, description = "Lesson updated", body = Lesson))
)]
pub async fn update_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    Json(payload): Json<UpdateLessonRequest>,
) -> ApiResult<Lesson> {
    Ok(ServiceResponse::ok(courses::update_lesson(&*state.repo, &user, lesson_id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> ApiResult<()> {
    courses::delete_lesson(&*state.repo, &user, lesson_id).await?;
    Ok(ServiceResponse::ok(()).message("Lesson deleted"))
}

// --- Modules ---

#[utoipa::path(
    get,
    path = "/lessons/{id}/modules",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses((status = 200, description = "Modules", body = [Module]))
)]
pub async fn get_modules(
    user: AuthUser,
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> ApiResult<Vec<Module>> {
    Ok(ServiceResponse::ok(courses::list_modules(&*state.repo, &user, lesson_id).await?))
}

#[utoipa::path(
    post,
    path = "/lessons/{id}/modules",
    request_body = CreateModuleRequest,
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 201, description = "Module created", body = Module),
        (status = 400, description = "Assessment kind missing or misplaced")
    )
)]
pub async fn create_module(
    user: AuthUser,
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    Json(payload): Json<CreateModuleRequest>,
) -> ApiResult<Module> {
    let module = courses::create_module(&*state.repo, &user, lesson_id, payload).await?;
    Ok(ServiceResponse::created(module))
}

#[utoipa::path(
    get,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    responses((status = 200, description = "Module", body = Module))
)]
pub async fn get_module(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<Module> {
    Ok(ServiceResponse::ok(courses::get_module(&*state.repo, &user, module_id).await?))
}

#[utoipa::path(
    put,
    path = "/modules/{id}",
    request_body = UpdateModuleRequest,
    params(("id" = Uuid, Path, description = "Module id")),
    responses((status = 200, description = "Module updated", body = Module))
)]
pub async fn update_module(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    Json(payload): Json<UpdateModuleRequest>,
) -> ApiResult<Module> {
    Ok(ServiceResponse::ok(courses::update_module(&*state.repo, &user, module_id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_module(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<()> {
    courses::delete_module(&*state.repo, &user, module_id).await?;
    Ok(ServiceResponse::ok(()).message("Module deleted"))
}
