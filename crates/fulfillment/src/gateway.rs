//! Payment gateway adapter (PhonePe-style hosted checkout).
//!
//! The callback signature scheme: `sha256(raw_payload + salt_key)` as lowercase
//! hex, suffixed with `###` and the salt index. A payload that fails the check
//! is discarded before any order state is read.

use std::env;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::{Money, OrderId};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{FulfillmentError, Result};

/// Gateway credentials and environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: u32,
    /// Hosted checkout API base.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Loads configuration from environment variables with sandbox defaults.
    pub fn from_env() -> Self {
        let production = env::var("PHONEPE_ENV")
            .map(|v| {
                let v = v.to_ascii_uppercase();
                v == "PRODUCTION" || v == "PROD"
            })
            .unwrap_or(false);
        let default_base = if production {
            "https://api.phonepe.com/apis/hermes"
        } else {
            "https://api-preprod.phonepe.com/apis/pg-sandbox"
        };
        Self {
            merchant_id: env::var("PHONEPE_MERCHANT_ID").unwrap_or_else(|_| "MERCHANTUAT".into()),
            salt_key: env::var("PHONEPE_SALT_KEY").unwrap_or_else(|_| "salt".into()),
            salt_index: env::var("PHONEPE_SALT_INDEX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            base_url: env::var("PHONEPE_BASE_URL").unwrap_or_else(|_| default_base.into()),
            timeout_secs: 30,
        }
    }
}

/// An opened payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    /// Our transaction id, persisted on the order and echoed in the callback.
    pub transaction_id: String,
    /// Where to send the customer to pay.
    pub redirect_url: String,
}

/// A callback whose signature verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCallback {
    pub transaction_id: String,
    /// The gateway's own payment id, present on success.
    pub provider_payment_id: Option<String>,
    pub success: bool,
}

/// Payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session for an order total (sent in paise).
    async fn initiate_payment(
        &self,
        order_id: OrderId,
        amount: Money,
        redirect_url: &str,
    ) -> Result<PaymentSession>;

    /// Verifies a callback's signature and extracts its verdict. Fails with
    /// `InvalidSignature` before parsing anything when the checksum is wrong.
    fn verify_callback(&self, raw_body: &str, x_verify: &str) -> Result<VerifiedCallback>;
}

/// `sha256(payload + salt_key)` hex, `###`-suffixed with the salt index.
pub fn callback_checksum(payload: &str, salt_key: &str, salt_index: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(salt_key.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2 + 8);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("{hex}###{salt_index}")
}

/// Constant-time string equality; signature checks must not leak a prefix
/// length through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    response: String,
}

#[derive(Debug, Deserialize)]
struct CallbackPayload {
    code: String,
    #[serde(default)]
    data: CallbackData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackData {
    #[serde(default)]
    merchant_transaction_id: String,
    #[serde(default)]
    transaction_id: Option<String>,
}

fn parse_callback(raw_body: &str) -> Result<VerifiedCallback> {
    let body: CallbackBody = serde_json::from_str(raw_body)?;
    let decoded = BASE64
        .decode(&body.response)
        .map_err(|e| FulfillmentError::Gateway(format!("callback payload not base64: {e}")))?;
    let payload: CallbackPayload = serde_json::from_slice(&decoded)?;
    Ok(VerifiedCallback {
        transaction_id: payload.data.merchant_transaction_id,
        provider_payment_id: payload.data.transaction_id,
        success: payload.code == "PAYMENT_SUCCESS",
    })
}

#[derive(Debug, Deserialize)]
struct PayApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<PayApiData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayApiData {
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
struct RedirectInfo {
    url: String,
}

/// HTTP gateway client.
#[derive(Clone)]
pub struct PhonePeGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl PhonePeGateway {
    /// Creates a gateway client with the configured timeout.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FulfillmentError::Gateway(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl PaymentGateway for PhonePeGateway {
    #[tracing::instrument(skip(self, redirect_url), fields(order_id = %order_id))]
    async fn initiate_payment(
        &self,
        order_id: OrderId,
        amount: Money,
        redirect_url: &str,
    ) -> Result<PaymentSession> {
        let transaction_id = Uuid::new_v4().to_string();

        let request = serde_json::json!({
            "merchantId": self.config.merchant_id,
            "merchantTransactionId": transaction_id,
            "amount": amount.paise(),
            "redirectUrl": redirect_url,
            "redirectMode": "REDIRECT",
            "paymentInstrument": { "type": "PAY_PAGE" },
        });
        let encoded = BASE64.encode(serde_json::to_vec(&request)?);
        let checksum = callback_checksum(
            &format!("{encoded}/pg/v1/pay"),
            &self.config.salt_key,
            self.config.salt_index,
        );

        let response = self
            .http
            .post(format!("{}/pg/v1/pay", self.config.base_url))
            .header("X-VERIFY", checksum)
            .json(&serde_json::json!({ "request": encoded }))
            .send()
            .await
            .map_err(|e| FulfillmentError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FulfillmentError::Gateway(format!("HTTP {status}")));
        }

        let body: PayApiResponse = response
            .json()
            .await
            .map_err(|e| FulfillmentError::Gateway(e.to_string()))?;
        if !body.success {
            return Err(FulfillmentError::Gateway(
                body.message.unwrap_or_else(|| "payment initiation refused".into()),
            ));
        }
        let redirect = body
            .data
            .and_then(|d| d.instrument_response)
            .and_then(|i| i.redirect_info)
            .map(|r| r.url)
            .ok_or_else(|| FulfillmentError::Gateway("missing redirect url".into()))?;

        Ok(PaymentSession {
            transaction_id,
            redirect_url: redirect,
        })
    }

    fn verify_callback(&self, raw_body: &str, x_verify: &str) -> Result<VerifiedCallback> {
        let expected = callback_checksum(raw_body, &self.config.salt_key, self.config.salt_index);
        if !constant_time_eq(&expected, x_verify) {
            return Err(FulfillmentError::InvalidSignature);
        }
        parse_callback(raw_body)
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: Vec<(OrderId, String)>,
    fail_initiation: bool,
}

/// In-memory gateway for tests. Shares the production checksum rule so tests
/// can mint valid and forged callbacks.
#[derive(Debug, Clone)]
pub struct InMemoryGateway {
    salt_key: String,
    salt_index: u32,
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new("test-salt", 1)
    }
}

impl InMemoryGateway {
    /// Creates an in-memory gateway with the given salt.
    pub fn new(salt_key: &str, salt_index: u32) -> Self {
        Self {
            salt_key: salt_key.to_string(),
            salt_index,
            state: Arc::new(RwLock::new(InMemoryGatewayState::default())),
        }
    }

    /// Makes payment initiation fail with a gateway error.
    pub fn fail_initiation(&self, fail: bool) {
        self.state.write().unwrap().fail_initiation = fail;
    }

    /// Sessions opened so far.
    pub fn sessions(&self) -> Vec<(OrderId, String)> {
        self.state.read().unwrap().sessions.clone()
    }

    /// Builds a callback body and matching signature for a transaction, the
    /// way the gateway would.
    pub fn signed_callback(
        &self,
        transaction_id: &str,
        provider_payment_id: &str,
        success: bool,
    ) -> (String, String) {
        let code = if success { "PAYMENT_SUCCESS" } else { "PAYMENT_ERROR" };
        let payload = serde_json::json!({
            "code": code,
            "data": {
                "merchantTransactionId": transaction_id,
                "transactionId": provider_payment_id,
            },
        });
        let encoded = BASE64.encode(payload.to_string());
        let body = serde_json::json!({ "response": encoded }).to_string();
        let signature = callback_checksum(&body, &self.salt_key, self.salt_index);
        (body, signature)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn initiate_payment(
        &self,
        order_id: OrderId,
        _amount: Money,
        redirect_url: &str,
    ) -> Result<PaymentSession> {
        let mut state = self.state.write().unwrap();
        if state.fail_initiation {
            return Err(FulfillmentError::Gateway("connection refused".into()));
        }
        let transaction_id = Uuid::new_v4().to_string();
        state.sessions.push((order_id, transaction_id.clone()));
        Ok(PaymentSession {
            transaction_id: transaction_id.clone(),
            redirect_url: format!("{redirect_url}?txn={transaction_id}"),
        })
    }

    fn verify_callback(&self, raw_body: &str, x_verify: &str) -> Result<VerifiedCallback> {
        let expected = callback_checksum(raw_body, &self.salt_key, self.salt_index);
        if !constant_time_eq(&expected, x_verify) {
            return Err(FulfillmentError::InvalidSignature);
        }
        parse_callback(raw_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_hex_with_salt_index_suffix() {
        let checksum = callback_checksum("payload", "salt", 2);
        let (hex, suffix) = checksum.split_once("###").unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(suffix, "2");
    }

    #[test]
    fn checksum_changes_with_salt() {
        assert_ne!(
            callback_checksum("payload", "salt-a", 1),
            callback_checksum("payload", "salt-b", 1)
        );
    }

    #[test]
    fn valid_callback_verifies_and_parses() {
        let gateway = InMemoryGateway::new("salt", 1);
        let (body, signature) = gateway.signed_callback("TXN-1", "PAY-1", true);

        let verified = gateway.verify_callback(&body, &signature).unwrap();
        assert_eq!(verified.transaction_id, "TXN-1");
        assert_eq!(verified.provider_payment_id.as_deref(), Some("PAY-1"));
        assert!(verified.success);
    }

    #[test]
    fn payment_error_code_reads_as_failure() {
        let gateway = InMemoryGateway::new("salt", 1);
        let (body, signature) = gateway.signed_callback("TXN-1", "PAY-1", false);
        let verified = gateway.verify_callback(&body, &signature).unwrap();
        assert!(!verified.success);
    }

    #[test]
    fn forged_signature_rejected_without_parsing() {
        let gateway = InMemoryGateway::new("salt", 1);
        let (body, _) = gateway.signed_callback("TXN-1", "PAY-1", true);

        let err = gateway.verify_callback(&body, "deadbeef###1").unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidSignature));
    }

    #[test]
    fn signature_from_other_salt_rejected() {
        let signer = InMemoryGateway::new("other-salt", 1);
        let verifier = InMemoryGateway::new("salt", 1);
        let (body, signature) = signer.signed_callback("TXN-1", "PAY-1", true);

        assert!(matches!(
            verifier.verify_callback(&body, &signature),
            Err(FulfillmentError::InvalidSignature)
        ));
    }
}
