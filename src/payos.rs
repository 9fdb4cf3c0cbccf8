//! PayOS payment-link client and checksum helpers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::PayOsConfig;

type HmacSha256 = Hmac<Sha256>;

/// PayOS answers this code when the order code was used before.
pub const ORDER_CODE_EXISTS: &str = "231";
/// Success code, both for API answers and for webhook payloads.
pub const CODE_SUCCESS: &str = "00";
/// PayOS rejects descriptions longer than this.
pub const MAX_DESCRIPTION_CHARS: usize = 25;

#[derive(Debug, Error)]
pub enum PayOsError {
    #[error("order code already exists")]
    OrderCodeExists,
    #[error("PayOS error {code}: {desc}")]
    Api { code: String, desc: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// PaymentLinkRequest
///
/// The fields PayOS signs when creating a payment link.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentLinkRequest {
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct PaymentLink {
    pub checkout_url: String,
    pub payment_link_id: String,
}

/// PaymentGateway
///
/// Seam between the payment service and PayOS. `MockPaymentGateway` replaces it in tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, req: &PaymentLinkRequest) -> Result<PaymentLink, PayOsError>;
}

pub type PaymentGatewayState = Arc<dyn PaymentGateway>;

fn hmac_hex(key: &str, payload: &str) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// sign_payment_request
///
/// `HMAC_SHA256(checksum_key, "amount=..&cancelUrl=..&description=..&orderCode=..&returnUrl=..")`,
/// hex encoded. Field order is alphabetical and fixed by PayOS.
pub fn sign_payment_request(checksum_key: &str, req: &PaymentLinkRequest) -> String {
    let payload = format!(
        "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
        req.amount, req.cancel_url, req.description, req.order_code, req.return_url
    );
    hmac_hex(checksum_key, &payload)
}

fn field_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) if s == "null" || s == "undefined" => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// webhook_signature
///
/// Signs a webhook `data` object: keys sorted, `key=value` pairs joined by `&`,
/// null values rendered as empty strings.
pub fn webhook_signature(checksum_key: &str, data: &Value) -> String {
    let Some(object) = data.as_object() else {
        return String::new();
    };
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    let payload = keys
        .into_iter()
        .map(|k| format!("{}={}", k, field_value(&object[k.as_str()])))
        .collect::<Vec<_>>()
        .join("&");
    hmac_hex(checksum_key, &payload)
}

pub fn verify_webhook_signature(checksum_key: &str, data: &Value, signature: &str) -> bool {
    let expected = webhook_signature(checksum_key, data);
    !expected.is_empty() && expected.eq_ignore_ascii_case(signature)
}

/// generate_order_code
///
/// Millisecond timestamp (mod 10^12) shifted left three decimal places plus three random
/// digits. Stays below JavaScript's safe integer limit, which PayOS enforces.
pub fn generate_order_code<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> i64 {
    (now.timestamp_millis() % 1_000_000_000_000) * 1000 + rng.random_range(0..1000)
}

pub fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// PayOsWebhook
///
/// Body PayOS posts to `/payments/webhook`. `data` is kept as raw JSON because the
/// signature covers every field PayOS sends, known or not.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayOsWebhook {
    pub code: String,
    pub desc: String,
    #[serde(default)]
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: Value,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayOsWebhookData {
    pub order_code: i64,
    pub amount: i64,
    pub code: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkBody<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    cancel_url: &'a str,
    return_url: &'a str,
    signature: String,
}

#[derive(Deserialize)]
struct ApiEnvelope {
    code: String,
    desc: String,
    data: Option<LinkData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkData {
    checkout_url: String,
    payment_link_id: String,
}

/// PayOsClient
///
/// Talks to `POST {base_url}/v2/payment-requests` with the merchant headers.
pub struct PayOsClient {
    client: reqwest::Client,
    config: PayOsConfig,
}

impl PayOsClient {
    pub fn new(config: PayOsConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }
}

#[async_trait]
impl PaymentGateway for PayOsClient {
    async fn create_payment_link(&self, req: &PaymentLinkRequest) -> Result<PaymentLink, PayOsError> {
        let body = CreateLinkBody {
            order_code: req.order_code,
            amount: req.amount,
            description: &req.description,
            cancel_url: &req.cancel_url,
            return_url: &req.return_url,
            signature: sign_payment_request(&self.config.checksum_key, req),
        };

        let response = self
            .client
            .post(format!("{}/v2/payment-requests", self.config.base_url))
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PayOsError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PayOsError::Network(e.to_string()))?;

        let envelope: ApiEnvelope = serde_json::from_str(&text)
            .map_err(|e| PayOsError::Parse(format!("HTTP {}: {} ({})", status, text, e)))?;

        match (envelope.code.as_str(), envelope.data) {
            (CODE_SUCCESS, Some(data)) => Ok(PaymentLink {
                checkout_url: data.checkout_url,
                payment_link_id: data.payment_link_id,
            }),
            (ORDER_CODE_EXISTS, _) => Err(PayOsError::OrderCodeExists),
            (code, _) => Err(PayOsError::Api { code: code.to_string(), desc: envelope.desc }),
        }
    }
}

/// MockPaymentGateway
///
/// Records every request. `conflicts` makes the next N calls fail with code 231.
#[derive(Default)]
pub struct MockPaymentGateway {
    pub requests: Mutex<Vec<PaymentLinkRequest>>,
    pub conflicts: AtomicUsize,
    pub should_fail: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conflicts(count: usize) -> Self {
        Self { conflicts: AtomicUsize::new(count), ..Self::default() }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true, ..Self::default() }
    }

    pub fn recorded(&self) -> Vec<PaymentLinkRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_link(&self, req: &PaymentLinkRequest) -> Result<PaymentLink, PayOsError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }
        if self.should_fail {
            return Err(PayOsError::Api { code: "20".into(), desc: "Mock failure".into() });
        }
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(PayOsError::OrderCodeExists);
        }
        Ok(PaymentLink {
            checkout_url: format!("https://pay.payos.vn/web/mock-{}", req.order_code),
            payment_link_id: format!("mock-{}", req.order_code),
        })
    }
}
