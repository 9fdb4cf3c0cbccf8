//! Course purchases and teacher subscriptions through PayOS payment links.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{access::load_course, notifications::notify};
use crate::{
    auth::AuthUser,
    config::PayOsConfig,
    error::{ServiceError, ServiceResult},
    models::{
        CheckoutResponse, CreatePackageRequest, Payment, PaymentPurpose, PaymentStatus, Role,
        TeacherPackage, TeacherSubscription,
    },
    payos::{
        CODE_SUCCESS, PayOsError, PayOsWebhook, PayOsWebhookData, PaymentGateway,
        PaymentLinkRequest, generate_order_code, truncate_description, verify_webhook_signature,
    },
    repository::{CourseRepository, PaymentRepository, Repository},
};

/// What a webhook delivery did. Every outcome is acknowledged to PayOS with 200.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Paid(Payment),
    Failed(Payment),
    AlreadySettled,
    UnknownOrder,
}

/// create_payment_link
///
/// Registers a link with PayOS and stores the pending payment. A "231 order code
/// exists" answer is retried once with a fresh order code.
#[allow(clippy::too_many_arguments)]
async fn create_payment_link(
    repo: &dyn Repository,
    gateway: &dyn PaymentGateway,
    payos: &PayOsConfig,
    user_id: Uuid,
    purpose: PaymentPurpose,
    target_id: Uuid,
    amount: i64,
    description: &str,
    now: DateTime<Utc>,
) -> ServiceResult<CheckoutResponse> {
    let description = truncate_description(description);
    let mut retried = false;

    loop {
        let order_code = generate_order_code(now, &mut rand::rng());
        let request = PaymentLinkRequest {
            order_code,
            amount,
            description: description.clone(),
            return_url: payos.return_url.clone(),
            cancel_url: payos.cancel_url.clone(),
        };

        match gateway.create_payment_link(&request).await {
            Ok(link) => {
                let payment = Payment {
                    id: Uuid::new_v4(),
                    user_id,
                    order_code,
                    amount,
                    description: description.clone(),
                    purpose,
                    target_id,
                    status: PaymentStatus::Pending,
                    checkout_url: Some(link.checkout_url.clone()),
                    created_at: now,
                    paid_at: None,
                };
                repo.create_payment(&payment).await?;
                tracing::info!(order_code, user_id = %user_id, ?purpose, amount, "payment link created");
                return Ok(CheckoutResponse { order_code, amount, checkout_url: link.checkout_url });
            }
            Err(PayOsError::OrderCodeExists) if !retried => {
                tracing::warn!(order_code, "PayOS order code already exists, retrying");
                retried = true;
            }
            Err(e) => return Err(ServiceError::Gateway(e.to_string())),
        }
    }
}

/// Starts the purchase of a published paid course the user is not enrolled in.
pub async fn checkout_course(
    repo: &dyn Repository,
    gateway: &dyn PaymentGateway,
    payos: &PayOsConfig,
    user: &AuthUser,
    course_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<CheckoutResponse> {
    let course = load_course(repo, course_id).await?;
    if !course.is_published {
        return Err(ServiceError::not_found("Course"));
    }
    if course.is_free() {
        return Err(ServiceError::BadRequest(
            "This course is free; enroll directly".to_string(),
        ));
    }
    if repo.is_enrolled(user.id, course.id).await? {
        return Err(ServiceError::Conflict("You are already enrolled in this course".to_string()));
    }

    create_payment_link(
        repo,
        gateway,
        payos,
        user.id,
        PaymentPurpose::Course,
        course.id,
        course.price,
        &format!("Course {}", course.title),
        now,
    )
    .await
}

/// Starts the purchase of a teacher package. Teachers only.
pub async fn checkout_subscription(
    repo: &dyn Repository,
    gateway: &dyn PaymentGateway,
    payos: &PayOsConfig,
    user: &AuthUser,
    package_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<CheckoutResponse> {
    user.require_role(Role::Teacher)?;
    let package = repo
        .get_package(package_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ServiceError::not_found("Package"))?;

    create_payment_link(
        repo,
        gateway,
        payos,
        user.id,
        PaymentPurpose::Subscription,
        package.id,
        package.price,
        &format!("Package {}", package.name),
        now,
    )
    .await
}

/// The new period starts when the current one ends, or now if none is running.
pub fn next_subscription_period(
    latest: Option<&TeacherSubscription>,
    duration_days: i32,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let starts_at = latest
        .map(|s| s.ends_at)
        .filter(|ends_at| *ends_at > now)
        .unwrap_or(now);
    (starts_at, starts_at + Duration::days(i64::from(duration_days)))
}

// Grants what the payment bought. Safe to repeat for the same payment.
async fn fulfil(repo: &dyn Repository, payment: &Payment, now: DateTime<Utc>) -> ServiceResult<()> {
    match payment.purpose {
        PaymentPurpose::Course => {
            if !repo.enroll(payment.user_id, payment.target_id).await? {
                return Ok(());
            }
            let title = repo
                .get_course(payment.target_id)
                .await?
                .map(|c| c.title)
                .unwrap_or_default();
            notify(
                repo,
                payment.user_id,
                "payment_paid",
                &format!("Payment received. You are now enrolled in \"{}\".", title),
            )
            .await;
        }
        PaymentPurpose::Subscription => {
            let package = repo
                .get_package(payment.target_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Package"))?;
            let latest = repo.latest_subscription(payment.user_id).await?;
            let (starts_at, ends_at) = next_subscription_period(latest.as_ref(), package.duration_days, now);

            let created = repo
                .create_subscription(&TeacherSubscription {
                    id: Uuid::new_v4(),
                    teacher_id: payment.user_id,
                    package_id: package.id,
                    payment_id: Some(payment.id),
                    starts_at,
                    ends_at,
                })
                .await?;
            if !created {
                return Ok(());
            }
            notify(
                repo,
                payment.user_id,
                "payment_paid",
                &format!("Your {} package is active until {}.", package.name, ends_at.format("%Y-%m-%d")),
            )
            .await;
        }
    }
    Ok(())
}

/// handle_webhook
///
/// Verifies the checksum over `data`, then settles the matching pending payment once.
/// Unknown order codes (the PayOS test ping) and repeated deliveries are acknowledged.
/// A redelivery for a paid order re-runs fulfilment, so a grant that failed after
/// settlement is completed by the next PayOS retry.
pub async fn handle_webhook(
    repo: &dyn Repository,
    checksum_key: &str,
    webhook: PayOsWebhook,
    now: DateTime<Utc>,
) -> ServiceResult<WebhookOutcome> {
    if !verify_webhook_signature(checksum_key, &webhook.data, &webhook.signature) {
        tracing::warn!("rejected PayOS webhook with invalid signature");
        return Err(ServiceError::BadRequest("Invalid webhook signature".to_string()));
    }
    let data: PayOsWebhookData = serde_json::from_value(webhook.data.clone())
        .map_err(|e| ServiceError::BadRequest(format!("Malformed webhook data: {}", e)))?;

    let Some(payment) = repo.get_payment_by_order_code(data.order_code).await? else {
        tracing::info!(order_code = data.order_code, "webhook for unknown order acknowledged");
        return Ok(WebhookOutcome::UnknownOrder);
    };
    match payment.status {
        PaymentStatus::Pending => {}
        PaymentStatus::Paid => {
            fulfil(repo, &payment, now).await?;
            return Ok(WebhookOutcome::AlreadySettled);
        }
        _ => return Ok(WebhookOutcome::AlreadySettled),
    }

    let paid = data.code == CODE_SUCCESS && data.amount == payment.amount;
    if data.code == CODE_SUCCESS && !paid {
        tracing::warn!(
            order_code = data.order_code,
            expected = payment.amount,
            received = data.amount,
            "webhook amount does not match payment"
        );
    }

    let (status, paid_at) = if paid {
        (PaymentStatus::Paid, Some(now))
    } else {
        (PaymentStatus::Failed, None)
    };
    let Some(settled) = repo.settle_payment(payment.order_code, status, paid_at).await? else {
        return Ok(WebhookOutcome::AlreadySettled);
    };

    if paid {
        fulfil(repo, &settled, now).await?;
        tracing::info!(order_code = settled.order_code, user_id = %settled.user_id, "payment paid");
        Ok(WebhookOutcome::Paid(settled))
    } else {
        tracing::info!(order_code = settled.order_code, code = %data.code, "payment failed");
        Ok(WebhookOutcome::Failed(settled))
    }
}

/// The buyer cancels a pending payment, e.g. after returning from the PayOS cancel page.
pub async fn cancel_payment(repo: &dyn Repository, user: &AuthUser, order_code: i64) -> ServiceResult<Payment> {
    let payment = get_payment(repo, user, order_code).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(ServiceError::Conflict("Payment is already settled".to_string()));
    }
    repo.settle_payment(order_code, PaymentStatus::Cancelled, None)
        .await?
        .ok_or_else(|| ServiceError::Conflict("Payment is already settled".to_string()))
}

/// A payment as seen by its owner or an admin.
pub async fn get_payment(repo: &dyn Repository, user: &AuthUser, order_code: i64) -> ServiceResult<Payment> {
    let payment = repo
        .get_payment_by_order_code(order_code)
        .await?
        .ok_or_else(|| ServiceError::not_found("Payment"))?;
    if payment.user_id != user.id && !user.is_admin() {
        return Err(ServiceError::not_found("Payment"));
    }
    Ok(payment)
}

pub async fn my_payments(repo: &dyn Repository, user: &AuthUser) -> ServiceResult<Vec<Payment>> {
    Ok(repo.list_user_payments(user.id).await?)
}

/// The teacher's subscription covering `now`, else the next one already paid for.
pub async fn active_subscription(
    repo: &dyn Repository,
    user: &AuthUser,
    now: DateTime<Utc>,
) -> ServiceResult<TeacherSubscription> {
    if let Some(current) = repo.active_subscription(user.id, now).await? {
        return Ok(current);
    }
    repo.latest_subscription(user.id)
        .await?
        .filter(|s| s.starts_at > now)
        .ok_or_else(|| ServiceError::not_found("Subscription"))
}

pub async fn list_packages(repo: &dyn Repository, active_only: bool) -> ServiceResult<Vec<TeacherPackage>> {
    Ok(repo.list_packages(active_only).await?)
}

pub async fn create_package(repo: &dyn Repository, req: CreatePackageRequest) -> ServiceResult<TeacherPackage> {
    super::require_text(&req.name, "Name")?;
    if req.price <= 0 {
        return Err(ServiceError::BadRequest("Price must be positive".to_string()));
    }
    if req.duration_days <= 0 || req.max_courses <= 0 {
        return Err(ServiceError::BadRequest(
            "Duration and course limit must be positive".to_string(),
        ));
    }
    Ok(repo.create_package(req).await?)
}
