use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::{CheckoutResponse, Payment, TeacherPackage, TeacherSubscription},
    payos::PayOsWebhook,
    services::payments::{self, WebhookOutcome},
};

/// checkout_course
///
/// [Authenticated Route] Creates a PayOS payment link for a paid course. The learner
/// is enrolled once the webhook reports the payment.
#[utoipa::path(
    post,
    path = "/courses/{id}/checkout",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 201, description = "Payment link created", body = CheckoutResponse),
        (status = 400, description = "Course is free"),
        (status = 409, description = "Already enrolled"),
        (status = 502, description = "PayOS unavailable")
    )
)]
pub async fn checkout_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CheckoutResponse> {
    let checkout = payments::checkout_course(
        &*state.repo,
        &*state.payments,
        &state.config.payos,
        &user,
        course_id,
        Utc::now(),
    )
    .await?;
    Ok(ServiceResponse::created(checkout))
}

/// checkout_subscription
///
/// [Authenticated Route] Creates a PayOS payment link for a teacher package.
#[utoipa::path(
    post,
    path = "/packages/{id}/checkout",
    params(("id" = Uuid, Path, description = "Package id")),
    responses(
        (status = 201, description = "Payment link created", body = CheckoutResponse),
        (status = 403, description = "Not a teacher"),
        (status = 404, description = "Package missing or inactive")
    )
)]
pub async fn checkout_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
) -> ApiResult<CheckoutResponse> {
    let checkout = payments::checkout_subscription(
        &*state.repo,
        &*state.payments,
        &state.config.payos,
        &user,
        package_id,
        Utc::now(),
    )
    .await?;
    Ok(ServiceResponse::created(checkout))
}

/// payos_webhook
///
/// [Public Route] Payment status callback from PayOS. The signature over `data` is the
/// only authentication. Unknown and already settled orders are acknowledged with 200 so
/// PayOS stops retrying.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = PayOsWebhook,
    responses(
        (status = 200, description = "Acknowledged"),
        (status = 400, description = "Invalid signature")
    )
)]
pub async fn payos_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PayOsWebhook>,
) -> ApiResult<()> {
    let outcome = payments::handle_webhook(
        &*state.repo,
        &state.config.payos.checksum_key,
        payload,
        Utc::now(),
    )
    .await?;

    let message = match outcome {
        WebhookOutcome::Paid(_) => "Payment confirmed",
        WebhookOutcome::Failed(_) => "Payment marked as failed",
        WebhookOutcome::AlreadySettled => "Payment already settled",
        WebhookOutcome::UnknownOrder => "Webhook acknowledged",
    };
    Ok(ServiceResponse::ok(()).message(message))
}

#[utoipa::path(
    get,
    path = "/payments/{order_code}",
    params(("order_code" = i64, Path, description = "PayOS order code")),
    responses(
        (status = 200, description = "Payment", body = Payment),
        (status = 404, description = "Not found or not the payer")
    )
)]
pub async fn get_payment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(order_code): Path<i64>,
) -> ApiResult<Payment> {
    Ok(ServiceResponse::ok(payments::get_payment(&*state.repo, &user, order_code).await?))
}

/// [Authenticated Route] Abandons a pending payment, e.g. after the PayOS cancel redirect.
#[utoipa::path(
    post,
    path = "/payments/{order_code}/cancel",
    params(("order_code" = i64, Path, description = "PayOS order code")),
    responses(
        (status = 200, description = "Cancelled", body = Payment),
        (status = 409, description = "Already settled")
    )
)]
pub async fn cancel_payment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(order_code): Path<i64>,
) -> ApiResult<Payment> {
    let payment = payments::cancel_payment(&*state.repo, &user, order_code).await?;
    Ok(ServiceResponse::ok(payment).message("Payment cancelled"))
}

#[utoipa::path(
    get,
    path = "/me/payments",
    responses((status = 200, description = "The caller's payments", body = [Payment]))
)]
pub async fn get_my_payments(user: AuthUser, State(state): State<AppState>) -> ApiResult<Vec<Payment>> {
    Ok(ServiceResponse::ok(payments::my_payments(&*state.repo, &user).await?))
}

#[utoipa::path(
    get,
    path = "/me/subscription",
    responses(
        (status = 200, description = "Current or upcoming subscription", body = TeacherSubscription),
        (status = 404, description = "No active subscription")
    )
)]
pub async fn get_my_subscription(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<TeacherSubscription> {
    Ok(ServiceResponse::ok(payments::active_subscription(&*state.repo, &user, Utc::now()).await?))
}

/// [Public Route] Teacher packages currently on sale.
#[utoipa::path(
    get,
    path = "/packages",
    responses((status = 200, description = "Active packages", body = [TeacherPackage]))
)]
pub async fn get_packages(State(state): State<AppState>) -> ApiResult<Vec<TeacherPackage>> {
    Ok(ServiceResponse::ok(payments::list_packages(&*state.repo, true).await?))
}
