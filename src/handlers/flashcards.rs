use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::{CreateFlashCardRequest, DueFlashCard, FlashCard, FlashCardReview, ReviewRequest},
    services::flashcards,
};

/// Query parameters for the due-card queue.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DueQuery {
    /// Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/modules/{id}/flashcards",
    request_body = CreateFlashCardRequest,
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 201, description = "Card created", body = FlashCard),
        (status = 400, description = "Module is not a flashcard deck")
    )
)]
pub async fn create_flashcard(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    Json(payload): Json<CreateFlashCardRequest>,
) -> ApiResult<FlashCard> {
    let card = flashcards::create_card(&*state.repo, &user, module_id, payload).await?;
    Ok(ServiceResponse::created(card))
}

#[utoipa::path(
    get,
    path = "/modules/{id}/flashcards",
    params(("id" = Uuid, Path, description = "Module id")),
    responses((status = 200, description = "Deck", body = [FlashCard]))
)]
pub async fn get_flashcards(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<Vec<FlashCard>> {
    Ok(ServiceResponse::ok(flashcards::list_cards(&*state.repo, &user, module_id).await?))
}

#[utoipa::path(
    delete,
    path = "/flashcards/{id}",
    params(("id" = Uuid, Path, description = "Flashcard id")),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_flashcard(
    user: AuthUser,
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<()> {
    flashcards::delete_card(&*state.repo, &user, card_id).await?;
    Ok(ServiceResponse::ok(()).message("Flashcard deleted"))
}

/// review_flashcard
///
/// [Authenticated Route] Grades one recall (quality 0 to 5) and schedules the next
/// review with SM-2.
#[utoipa::path(
    post,
    path = "/flashcards/{id}/review",
    request_body = ReviewRequest,
    params(("id" = Uuid, Path, description = "Flashcard id")),
    responses(
        (status = 200, description = "Next schedule", body = FlashCardReview),
        (status = 400, description = "Quality out of range")
    )
)]
pub async fn review_flashcard(
    user: AuthUser,
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<FlashCardReview> {
    let review = flashcards::review(&*state.repo, &user, card_id, payload.quality, Utc::now()).await?;
    Ok(ServiceResponse::ok(review))
}

/// get_due_flashcards
///
/// [Authenticated Route] Cards due now across the caller's enrolled courses, overdue
/// reviews first, then cards never seen.
#[utoipa::path(
    get,
    path = "/me/flashcards/due",
    params(DueQuery),
    responses((status = 200, description = "Due cards", body = [DueFlashCard]))
)]
pub async fn get_due_flashcards(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<DueQuery>,
) -> ApiResult<Vec<DueFlashCard>> {
    Ok(ServiceResponse::ok(flashcards::due_cards(&*state.repo, &user, Utc::now(), query.limit).await?))
}
