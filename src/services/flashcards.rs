//! Flashcard decks and SM-2 spaced repetition.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{
    access::{module_with_course, require_author, require_view},
    progress::record_activity,
    require_text,
};
use crate::{
    auth::AuthUser,
    error::{ServiceError, ServiceResult},
    models::{ContentType, Course, CreateFlashCardRequest, DueFlashCard, FlashCard, FlashCardReview},
    repository::{FlashCardRepository, Repository},
};

pub const INITIAL_EASE: f64 = 2.5;
pub const MIN_EASE: f64 = 1.3;
/// Upper bound on a review interval, about a century.
pub const MAX_INTERVAL_DAYS: i32 = 36_500;
pub const DEFAULT_DUE_LIMIT: i64 = 20;
pub const MAX_DUE_LIMIT: i64 = 100;

/// sm2
///
/// One SM-2 step. Quality below 3 restarts the card at a one-day interval; otherwise
/// the interval grows 1, 6, then by the ease factor. The ease factor is adjusted on
/// every review and never drops below 1.3. Intervals are capped at `MAX_INTERVAL_DAYS`.
pub fn sm2(
    previous: Option<&FlashCardReview>,
    user_id: Uuid,
    flashcard_id: Uuid,
    quality: i32,
    now: DateTime<Utc>,
) -> FlashCardReview {
    let (ease, interval, repetitions) = previous
        .map(|r| (r.ease_factor, r.interval_days, r.repetitions))
        .unwrap_or((INITIAL_EASE, 0, 0));

    let q = f64::from(5 - quality);
    let ease_factor = (ease + 0.1 - q * (0.08 + q * 0.02)).max(MIN_EASE);

    let (interval_days, repetitions) = if quality < 3 {
        (1, 0)
    } else {
        let next = match repetitions {
            0 => 1,
            1 => 6,
            _ => (f64::from(interval) * ease).round().min(f64::from(MAX_INTERVAL_DAYS)) as i32,
        };
        (next.clamp(1, MAX_INTERVAL_DAYS), repetitions.saturating_add(1))
    };

    FlashCardReview {
        user_id,
        flashcard_id,
        ease_factor: (ease_factor * 100.0).round() / 100.0,
        interval_days,
        repetitions,
        next_review_at: now
            .checked_add_signed(Duration::days(i64::from(interval_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        last_reviewed_at: now,
    }
}

async fn card_with_course(repo: &dyn Repository, card_id: Uuid) -> ServiceResult<(FlashCard, Course)> {
    let card = repo
        .get_flashcard(card_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Flashcard"))?;
    let (_, course) = module_with_course(repo, card.module_id).await?;
    Ok((card, course))
}

pub async fn create_card(
    repo: &dyn Repository,
    user: &AuthUser,
    module_id: Uuid,
    req: CreateFlashCardRequest,
) -> ServiceResult<FlashCard> {
    let (module, course) = module_with_course(repo, module_id).await?;
    require_author(user, &course)?;
    if module.content_type != ContentType::FlashCard {
        return Err(ServiceError::BadRequest("Module is not a flashcard deck".to_string()));
    }
    require_text(&req.front, "Front")?;
    require_text(&req.back, "Back")?;
    Ok(repo.create_flashcard(module_id, req).await?)
}

pub async fn list_cards(repo: &dyn Repository, user: &AuthUser, module_id: Uuid) -> ServiceResult<Vec<FlashCard>> {
    let (_, course) = module_with_course(repo, module_id).await?;
    require_view(repo, user, &course).await?;
    Ok(repo.list_flashcards(module_id).await?)
}

pub async fn delete_card(repo: &dyn Repository, user: &AuthUser, card_id: Uuid) -> ServiceResult<()> {
    let (_, course) = card_with_course(repo, card_id).await?;
    require_author(user, &course)?;
    if !repo.delete_flashcard(card_id).await? {
        return Err(ServiceError::not_found("Flashcard"));
    }
    Ok(())
}

pub async fn review(
    repo: &dyn Repository,
    user: &AuthUser,
    card_id: Uuid,
    quality: i32,
    now: DateTime<Utc>,
) -> ServiceResult<FlashCardReview> {
    if !(0..=5).contains(&quality) {
        return Err(ServiceError::BadRequest("Quality must be between 0 and 5".to_string()));
    }
    let (card, course) = card_with_course(repo, card_id).await?;
    require_view(repo, user, &course).await?;

    let previous = repo.get_review(user.id, card.id).await?;
    let next = sm2(previous.as_ref(), user.id, card.id, quality, now);
    repo.save_review(&next).await?;
    record_activity(repo, user.id, now).await?;
    Ok(next)
}

pub async fn due_cards(
    repo: &dyn Repository,
    user: &AuthUser,
    now: DateTime<Utc>,
    limit: Option<i64>,
) -> ServiceResult<Vec<DueFlashCard>> {
    let limit = limit.unwrap_or(DEFAULT_DUE_LIMIT).clamp(1, MAX_DUE_LIMIT);
    Ok(repo.list_due_cards(user.id, now, limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_grow_one_six_then_by_ease() {
        let (user, card) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let first = sm2(None, user, card, 5, now);
        assert_eq!((first.interval_days, first.repetitions), (1, 1));
        assert_eq!(first.ease_factor, 2.6);

        let second = sm2(Some(&first), user, card, 5, now);
        assert_eq!((second.interval_days, second.repetitions), (6, 2));

        let third = sm2(Some(&second), user, card, 4, now);
        // 6 * 2.7 = 16.2
        assert_eq!(third.interval_days, 16);
        assert_eq!(third.repetitions, 3);
        assert_eq!(third.next_review_at, now + Duration::days(16));
    }

    #[test]
    fn failed_recall_resets_but_keeps_ease_floor() {
        let (user, card) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let mut review = sm2(None, user, card, 5, now);
        review = sm2(Some(&review), user, card, 5, now);
        let failed = sm2(Some(&review), user, card, 1, now);
        assert_eq!((failed.interval_days, failed.repetitions), (1, 0));

        let mut worst = sm2(None, user, card, 0, now);
        for _ in 0..10 {
            worst = sm2(Some(&worst), user, card, 0, now);
        }
        assert_eq!(worst.ease_factor, MIN_EASE);
    }

    #[test]
    fn long_streaks_of_perfect_reviews_stay_bounded() {
        let (user, card) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let mut review = sm2(None, user, card, 5, now);
        for _ in 0..50 {
            review = sm2(Some(&review), user, card, 5, now);
            assert!(review.interval_days <= MAX_INTERVAL_DAYS);
            assert!(review.next_review_at > now);
        }
        assert_eq!(review.interval_days, MAX_INTERVAL_DAYS);
        assert_eq!(review.next_review_at, now + Duration::days(i64::from(MAX_INTERVAL_DAYS)));
    }
}
