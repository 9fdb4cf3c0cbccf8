use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::{AuthResponse, LoginRequest, RegisterRequest, ResendOtpRequest, User, VerifyOtpRequest},
    services::accounts,
};

/// register
///
/// [Public Route] Creates an inactive Student or Teacher account and mails a six digit
/// activation code.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, activation code sent", body = User),
        (status = 400, description = "Invalid email, password or role"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<User> {
    let user = accounts::register(&*state.repo, &*state.mailer, payload, Utc::now()).await?;
    Ok(ServiceResponse::created(user).message("Check your email for the activation code"))
}

/// verify_otp
///
/// [Public Route] Activates the account and signs the user in.
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account activated", body = AuthResponse),
        (status = 400, description = "Wrong or expired code")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> ApiResult<AuthResponse> {
    let auth = accounts::verify_otp(&*state.repo, &state.config, payload, Utc::now()).await?;
    Ok(ServiceResponse::ok(auth).message("Account activated"))
}

#[utoipa::path(
    post,
    path = "/auth/resend-otp",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "New code sent"),
        (status = 409, description = "Account already active")
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpRequest>,
) -> ApiResult<()> {
    accounts::resend_otp(&*state.repo, &*state.mailer, payload, Utc::now()).await?;
    Ok(ServiceResponse::ok(()).message("A new activation code has been sent"))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account not activated")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let auth = accounts::login(&*state.repo, &state.config, payload, Utc::now()).await?;
    Ok(ServiceResponse::ok(auth))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Current user", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<User> {
    Ok(ServiceResponse::ok(accounts::get_profile(&*state.repo, id).await?))
}
