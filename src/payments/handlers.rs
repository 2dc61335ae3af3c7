use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument};

use super::{
    dto::{PaymentRequest, PaymentResponse},
    gateway::ChargeRequest,
};
use crate::{error::AppError, extractors::JsonBody, state::AppState};

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/payment", post(create_payment))
}

fn validate(payload: PaymentRequest) -> Result<ChargeRequest, AppError> {
    if payload.amount <= 0 {
        return Err(AppError::Validation("amount must be a positive integer".into()));
    }
    if payload.stripe_token.trim().is_empty() {
        return Err(AppError::Validation("stripeToken is required".into()));
    }
    Ok(ChargeRequest {
        amount: payload.amount,
        source_token: payload.stripe_token,
        description: payload.description,
    })
}

#[instrument(skip(state, payload))]
pub async fn create_payment(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let charge = validate(payload)?;
    let receipt = state.payments.charge(&charge).await?;
    info!(charge_id = %receipt.id, amount = charge.amount, "charge created");
    Ok(Json(PaymentResponse {
        success: true,
        charge_id: receipt.id,
        status: receipt.status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: i64, token: &str) -> PaymentRequest {
        PaymentRequest {
            amount,
            stripe_token: token.into(),
            description: "order".into(),
        }
    }

    #[test]
    fn validate_rejects_non_positive_amounts_and_blank_tokens() {
        assert!(matches!(validate(request(0, "tok_1")), Err(AppError::Validation(_))));
        assert!(matches!(validate(request(-5, "tok_1")), Err(AppError::Validation(_))));
        assert!(matches!(validate(request(500, "  ")), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_passes_inputs_through() {
        let charge = validate(request(500, "tok_1")).unwrap();
        assert_eq!(
            charge,
            ChargeRequest {
                amount: 500,
                source_token: "tok_1".into(),
                description: "order".into(),
            }
        );
    }
}
