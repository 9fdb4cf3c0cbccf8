//! Registration with e-mail OTP, login and role administration.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::{
    auth::{hash_password, issue_token, verify_password},
    config::AppConfig,
    error::{ServiceError, ServiceResult},
    mailer::{MailMessage, Mailer},
    models::{
        AuthResponse, LoginRequest, NewUser, OtpRecord, RegisterRequest, ResendOtpRequest, Role,
        User, VerifyOtpRequest,
    },
    repository::{Repository, UserRepository},
};

pub const OTP_TTL_MINUTES: i64 = 10;
pub const MAX_OTP_FAILURES: i32 = 5;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Six decimal digits, zero padded.
pub fn generate_otp<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:06}", rng.random_range(0..1_000_000u32))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> ServiceResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ServiceError::BadRequest("Invalid email address".to_string())),
    }
}

async fn issue_otp(
    repo: &dyn Repository,
    mailer: &dyn Mailer,
    user: &User,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let code = generate_otp(&mut rand::rng());
    repo.upsert_otp(OtpRecord {
        user_id: user.id,
        code: code.clone(),
        expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
        failed_attempts: 0,
    })
    .await?;

    let message = MailMessage {
        to: user.email.clone(),
        subject: "Your verification code".to_string(),
        body: format!(
            "Your verification code is {}. It expires in {} minutes.",
            code, OTP_TTL_MINUTES
        ),
    };
    // The code can be re-sent, so a delivery failure doesn't undo the registration.
    if let Err(e) = mailer.send(message).await {
        tracing::error!(user_id = %user.id, "failed to send OTP mail: {}", e);
    }
    Ok(())
}

/// register
///
/// Creates an inactive account and mails a one-time code. Only students and teachers
/// may self-register.
pub async fn register(
    repo: &dyn Repository,
    mailer: &dyn Mailer,
    req: RegisterRequest,
    now: DateTime<Utc>,
) -> ServiceResult<User> {
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    if req.full_name.trim().is_empty() {
        return Err(ServiceError::BadRequest("Full name is required".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if req.role == Role::Admin {
        return Err(ServiceError::BadRequest(
            "Only student or teacher accounts can be registered".to_string(),
        ));
    }
    if repo.get_account_by_email(&email).await?.is_some() {
        return Err(ServiceError::Conflict("Email is already registered".to_string()));
    }

    let user = repo
        .create_user(NewUser {
            email,
            full_name: req.full_name.trim().to_string(),
            password_hash: hash_password(&req.password)?,
            roles: vec![req.role],
            is_active: false,
        })
        .await?;

    issue_otp(repo, mailer, &user, now).await?;
    tracing::info!(user_id = %user.id, "registered new {} account", req.role);
    Ok(user)
}

/// verify_otp
///
/// Activates the account when the code matches. Each wrong code counts as a failure;
/// the code is discarded after `MAX_OTP_FAILURES` of them.
pub async fn verify_otp(
    repo: &dyn Repository,
    config: &AppConfig,
    req: VerifyOtpRequest,
    now: DateTime<Utc>,
) -> ServiceResult<AuthResponse> {
    let account = repo
        .get_account_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))?;
    let user = account.user;
    if user.is_active {
        return Err(ServiceError::Conflict("Account is already activated".to_string()));
    }

    let otp = repo
        .get_otp(user.id)
        .await?
        .ok_or_else(|| ServiceError::BadRequest("No pending verification code".to_string()))?;

    if otp.failed_attempts >= MAX_OTP_FAILURES {
        repo.delete_otp(user.id).await?;
        return Err(ServiceError::BadRequest(
            "Too many failed attempts, request a new code".to_string(),
        ));
    }
    if now >= otp.expires_at {
        return Err(ServiceError::BadRequest("Verification code has expired".to_string()));
    }
    if otp.code != req.code.trim() {
        if otp.failed_attempts + 1 >= MAX_OTP_FAILURES {
            repo.delete_otp(user.id).await?;
        } else {
            repo.record_otp_failure(user.id).await?;
        }
        return Err(ServiceError::BadRequest("Invalid verification code".to_string()));
    }

    let user = repo
        .activate_user(user.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))?;
    repo.delete_otp(user.id).await?;

    let token = issue_token(user.id, config, now)?;
    Ok(AuthResponse { token, user })
}

pub async fn resend_otp(
    repo: &dyn Repository,
    mailer: &dyn Mailer,
    req: ResendOtpRequest,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let account = repo
        .get_account_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))?;
    if account.user.is_active {
        return Err(ServiceError::Conflict("Account is already activated".to_string()));
    }
    issue_otp(repo, mailer, &account.user, now).await
}

pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    req: LoginRequest,
    now: DateTime<Utc>,
) -> ServiceResult<AuthResponse> {
    let invalid = || ServiceError::Unauthorized("Invalid email or password".to_string());

    let account = repo
        .get_account_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&req.password, &account.password_hash) {
        return Err(invalid());
    }
    if !account.user.is_active {
        return Err(ServiceError::Forbidden("Account has not been activated".to_string()));
    }

    let token = issue_token(account.user.id, config, now)?;
    Ok(AuthResponse { token, user: account.user })
}

pub async fn get_profile(repo: &dyn Repository, user_id: Uuid) -> ServiceResult<User> {
    repo.get_user(user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))
}

/// Replaces the role set of a user. Duplicates are dropped; an empty set is rejected.
pub async fn set_roles(repo: &dyn Repository, user_id: Uuid, roles: Vec<Role>) -> ServiceResult<User> {
    let mut unique: Vec<Role> = Vec::with_capacity(roles.len());
    for role in roles {
        if !unique.contains(&role) {
            unique.push(role);
        }
    }
    if unique.is_empty() {
        return Err(ServiceError::BadRequest("At least one role is required".to_string()));
    }

    repo.set_user_roles(user_id, &unique)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))
}
