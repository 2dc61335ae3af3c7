use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::PaymentConfig;

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// One charge, forwarded as-is. `amount` is in the currency's minor unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount: i64,
    pub source_token: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeReceipt {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected charge ({status}): {message}")]
    Declined { status: u16, message: String },
}

/// A remote payment processor. One call per charge; retries and
/// idempotency are the processor's business.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

/// Stripe `/v1/charges` client.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    currency: String,
}

impl StripeGateway {
    pub fn new(cfg: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            secret_key: cfg.secret_key.clone(),
            currency: cfg.currency.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(amount = request.amount))]
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
        let amount = request.amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", self.currency.as_str()),
            ("source", request.source_token.as_str()),
            ("description", request.description.as_str()),
        ];

        let res = self
            .client
            .post(format!("{}/v1/charges", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<StripeErrorBody>(&body) {
                Ok(parsed) => {
                    let detail = parsed.error;
                    match (detail.code, detail.message) {
                        (Some(code), Some(msg)) => format!("{code}: {msg}"),
                        (None, Some(msg)) => msg,
                        (Some(code), None) => code,
                        (None, None) => body,
                    }
                }
                Err(_) => body,
            };
            return Err(PaymentError::Declined {
                status: status.as_u16(),
                message,
            });
        }

        let receipt = res.json::<ChargeReceipt>().await?;
        debug!(charge_id = %receipt.id, status = %receipt.status, "charge accepted");
        Ok(receipt)
    }
}
