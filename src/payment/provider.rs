//! PIX payment provider client
//!
//! The provider is a Mercado-Pago-style REST API: create a PIX charge, fetch
//! a payment. Everything the rest of the crate needs goes through the
//! `PixProvider` trait so the bridge can be exercised against
//! `MockPixProvider` without the network.

use super::error::PaymentError;
use crate::config::PaymentConfig;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default QR validity when the provider response omits it (seconds).
const DEFAULT_EXPIRES_IN: i64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_cents: i64,
    pub description: String,
    pub reservation_id: Uuid,
    pub payer_email: String,
    pub payer_name: String,
}

/// Normalized provider payment view used by the bridge and the handlers.
#[derive(Debug, Clone)]
pub struct PixCharge {
    pub payment_id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub expires_in: i64,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PixProvider: Send + Sync {
    async fn create_charge(&self, req: &ChargeRequest) -> Result<PixCharge, PaymentError>;
    async fn get_payment(&self, payment_id: &str) -> Result<PixCharge, PaymentError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CreatePaymentBody {
    transaction_amount: f64,
    description: String,
    payment_method_id: &'static str,
    payer: PayerBody,
}

#[derive(Debug, Serialize)]
struct PayerBody {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: String,
    #[serde(default)]
    status_detail: Option<String>,
    #[serde(default)]
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    #[serde(default)]
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    qr_code_base64: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

// ---------------------------------------------------------------------------
// Production client
// ---------------------------------------------------------------------------

pub struct MercadoPagoClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MercadoPagoClient {
    pub fn new(cfg: &PaymentConfig, access_token: String) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn normalize(raw: serde_json::Value) -> Result<PixCharge, PaymentError> {
        let parsed: PaymentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| PaymentError::Provider(format!("Unexpected provider payload: {}", e)))?;

        // Provider payment ids arrive as numbers; we key everything by string.
        let payment_id = match &parsed.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => {
                return Err(PaymentError::Provider(format!(
                    "Unexpected payment id: {}",
                    other
                )));
            }
        };

        let td = parsed
            .point_of_interaction
            .and_then(|poi| poi.transaction_data);
        let (qr_code, qr_code_base64, expires_in) = match td {
            Some(td) => (
                td.qr_code,
                // The base64 image sometimes ships with stray whitespace.
                td.qr_code_base64.map(|s| s.split_whitespace().collect()),
                td.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
            ),
            None => (None, None, DEFAULT_EXPIRES_IN),
        };

        Ok(PixCharge {
            payment_id,
            status: parsed.status,
            status_detail: parsed.status_detail,
            qr_code,
            qr_code_base64,
            expires_in,
            raw,
        })
    }
}

#[async_trait]
impl PixProvider for MercadoPagoClient {
    async fn create_charge(&self, req: &ChargeRequest) -> Result<PixCharge, PaymentError> {
        let name = req.payer_name.trim();
        let mut parts = name.split_whitespace();
        let first_name = parts.next().map(str::to_string);
        let last_name = {
            let rest = parts.collect::<Vec<_>>().join(" ");
            (!rest.is_empty()).then_some(rest)
        };

        let amount = Decimal::new(req.amount_cents, 2);
        let body = CreatePaymentBody {
            transaction_amount: amount.to_f64().unwrap_or(0.0),
            description: req.description.clone(),
            payment_method_id: "pix",
            payer: PayerBody {
                email: req.payer_email.clone(),
                first_name,
                last_name,
            },
        };

        // One key per reservation: retrying the same reservation must not
        // create a second charge on the provider side.
        let idempotency_key = format!("pix-{}", req.reservation_id);

        let resp = self
            .http
            .post(format!("{}/v1/payments", self.base_url))
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Provider(format!("create charge failed: {}", e)))?;

        let status = resp.status();
        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PaymentError::Provider(format!("invalid provider response: {}", e)))?;

        if !status.is_success() {
            return Err(PaymentError::Provider(format!(
                "provider returned {}: {}",
                status, raw
            )));
        }

        Self::normalize(raw)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PixCharge, PaymentError> {
        let resp = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| PaymentError::Provider(format!("get payment failed: {}", e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::PaymentNotFound(payment_id.to_string()));
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PaymentError::Provider(format!("invalid provider response: {}", e)))?;

        if !status.is_success() {
            return Err(PaymentError::Provider(format!(
                "provider returned {}: {}",
                status, raw
            )));
        }

        Self::normalize(raw)
    }
}

// ---------------------------------------------------------------------------
// Mock provider (tests)
// ---------------------------------------------------------------------------

/// In-memory provider double. Charges start `pending`; tests script the
/// follow-up status with `set_status`.
pub struct MockPixProvider {
    payments: std::sync::Mutex<std::collections::HashMap<String, PixCharge>>,
    create_count: std::sync::atomic::AtomicUsize,
    fail_create: std::sync::atomic::AtomicBool,
}

impl MockPixProvider {
    pub fn new() -> Self {
        Self {
            payments: std::sync::Mutex::new(std::collections::HashMap::new()),
            create_count: std::sync::atomic::AtomicUsize::new(0),
            fail_create: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_status(&self, payment_id: &str, status: &str) {
        let mut payments = self.payments.lock().unwrap();
        if let Some(p) = payments.get_mut(payment_id) {
            p.status = status.to_string();
        }
    }

    pub fn create_count(&self) -> usize {
        self.create_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockPixProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PixProvider for MockPixProvider {
    async fn create_charge(&self, req: &ChargeRequest) -> Result<PixCharge, PaymentError> {
        if self.fail_create.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PaymentError::Provider("mock create failure".to_string()));
        }

        self.create_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let payment_id = format!("mock-{}", req.reservation_id.simple());
        let charge = PixCharge {
            payment_id: payment_id.clone(),
            status: "pending".to_string(),
            status_detail: Some("pending_waiting_transfer".to_string()),
            qr_code: Some(format!("00020126pix{}", payment_id)),
            qr_code_base64: Some("aGVsbG8=".to_string()),
            expires_in: DEFAULT_EXPIRES_IN,
            raw: serde_json::json!({ "id": payment_id, "status": "pending" }),
        };

        self.payments
            .lock()
            .unwrap()
            .insert(payment_id, charge.clone());
        Ok(charge)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PixCharge, PaymentError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::PaymentNotFound(payment_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_provider_payload() {
        let raw = serde_json::json!({
            "id": 12345678901u64,
            "status": "pending",
            "status_detail": "pending_waiting_transfer",
            "point_of_interaction": {
                "transaction_data": {
                    "qr_code": "00020126580014br.gov.bcb.pix",
                    "qr_code_base64": "aGVs bG8=\n",
                    "expires_in": 900
                }
            }
        });

        let charge = MercadoPagoClient::normalize(raw).unwrap();
        assert_eq!(charge.payment_id, "12345678901");
        assert_eq!(charge.status, "pending");
        assert_eq!(charge.qr_code.as_deref(), Some("00020126580014br.gov.bcb.pix"));
        // whitespace stripped from the base64 image
        assert_eq!(charge.qr_code_base64.as_deref(), Some("aGVsbG8="));
        assert_eq!(charge.expires_in, 900);
    }

    #[test]
    fn test_normalize_defaults_expiry() {
        let raw = serde_json::json!({ "id": "77", "status": "approved" });
        let charge = MercadoPagoClient::normalize(raw).unwrap();
        assert_eq!(charge.payment_id, "77");
        assert_eq!(charge.expires_in, DEFAULT_EXPIRES_IN);
        assert!(charge.qr_code.is_none());
    }

    #[test]
    fn test_normalize_rejects_garbage_id() {
        let raw = serde_json::json!({ "id": {"nested": true}, "status": "pending" });
        assert!(MercadoPagoClient::normalize(raw).is_err());
    }

    #[tokio::test]
    async fn test_mock_provider_scripted_status() {
        let provider = MockPixProvider::new();
        let req = ChargeRequest {
            amount_cents: 5500,
            description: "Reserva".to_string(),
            reservation_id: Uuid::new_v4(),
            payer_email: "user@example.com".to_string(),
            payer_name: "Ana Souza".to_string(),
        };

        let charge = provider.create_charge(&req).await.unwrap();
        assert_eq!(charge.status, "pending");
        assert_eq!(provider.create_count(), 1);

        provider.set_status(&charge.payment_id, "approved");
        let refreshed = provider.get_payment(&charge.payment_id).await.unwrap();
        assert_eq!(refreshed.status, "approved");
    }

    #[tokio::test]
    async fn test_mock_provider_unknown_payment() {
        let provider = MockPixProvider::new();
        let res = provider.get_payment("nope").await;
        assert!(matches!(res, Err(PaymentError::PaymentNotFound(_))));
    }
}
