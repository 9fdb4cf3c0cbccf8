//! Background jobs: the daily vocabulary reminder and the quiz attempt expiry sweep.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;

use super::{notifications::notify, quiz_attempt::auto_submit_expired};
use crate::{
    error::ServiceResult,
    mailer::{MailMessage, Mailer, MailerState},
    repository::{FlashCardRepository, Repository, RepositoryState, UserRepository},
};

pub const REMINDER_KIND: &str = "vocabulary_reminder";

/// Time left until the next `hour:00` UTC strictly after `now`.
pub fn duration_until_next_run(now: DateTime<Utc>, hour: u32) -> std::time::Duration {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}

/// run_vocabulary_reminder
///
/// Notifies and mails every user with flashcards due at `now`. Per-user failures are
/// logged and skipped. Returns the number of users reminded.
pub async fn run_vocabulary_reminder(
    repo: &dyn Repository,
    mailer: &dyn Mailer,
    now: DateTime<Utc>,
) -> ServiceResult<usize> {
    let counts = repo.due_review_counts(now).await?;
    let mut reminded = 0;

    for (user_id, due) in counts {
        let message = if due == 1 {
            "You have 1 flashcard due for review today.".to_string()
        } else {
            format!("You have {} flashcards due for review today.", due)
        };
        notify(repo, user_id, REMINDER_KIND, &message).await;

        match repo.get_user(user_id).await {
            Ok(Some(user)) if user.is_active => {
                let mail = MailMessage {
                    to: user.email,
                    subject: "Time to review your vocabulary".to_string(),
                    body: message,
                };
                if let Err(e) = mailer.send(mail).await {
                    tracing::error!(user_id = %user_id, "failed to send reminder mail: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(user_id = %user_id, "failed to load user for reminder: {:?}", e),
        }
        reminded += 1;
    }

    tracing::info!(reminded, "vocabulary reminder pass finished");
    Ok(reminded)
}

/// spawn_vocabulary_reminder
///
/// Sleeps until the next `hour:00` UTC, runs one reminder pass, and repeats.
pub fn spawn_vocabulary_reminder(repo: RepositoryState, mailer: MailerState, hour: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = duration_until_next_run(Utc::now(), hour);
            tracing::debug!("next vocabulary reminder in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;

            if let Err(e) = run_vocabulary_reminder(repo.as_ref(), mailer.as_ref(), Utc::now()).await {
                tracing::error!("vocabulary reminder failed: {}", e);
            }
        }
    })
}

/// spawn_attempt_expiry_sweep
///
/// Auto-submits expired quiz attempts every `period`.
pub fn spawn_attempt_expiry_sweep(repo: RepositoryState, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match auto_submit_expired(repo.as_ref(), Utc::now()).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "auto-submitted expired quiz attempts"),
                Err(e) => tracing::error!("attempt expiry sweep failed: {}", e),
            }
        }
    })
}
