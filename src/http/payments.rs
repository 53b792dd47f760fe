use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::order::Order;
use crate::error::ApiError;
use crate::payments::WebhookOutcome;
use crate::state::AppState;

use super::OrderView;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("/create-payment-intent", web::post().to(create_payment_intent))
            .route("/confirm", web::post().to(confirm_payment))
            .route("/webhook", web::post().to(webhook)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub payment_intent_id: String,
}

/// Registered users' orders are theirs (or an admin's); guest orders are
/// reachable by anyone holding the order id
fn ensure_can_pay(identity: &Identity, order: &Order) -> Result<(), ApiError> {
    match order.owner.user_id() {
        None => Ok(()),
        Some(owner) if identity.user_id() == Some(owner) || identity.is_admin() => Ok(()),
        Some(_) if identity.user().is_none() => {
            Err(ApiError::Unauthorized("Authentication required".into()))
        }
        Some(_) => Err(ApiError::forbidden("Not allowed to pay for this order")),
    }
}

async fn create_payment_intent(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreateIntentRequest>,
) -> Result<HttpResponse, ApiError> {
    let order = state.orders.orders().require(body.order_id).await?;
    ensure_can_pay(&identity, &order)?;

    let created = state.payments.create_intent(&order, identity.user_id()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "clientSecret": created.client_secret,
        "paymentIntentId": created.payment_intent_id,
    })))
}

async fn confirm_payment(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<ConfirmRequest>,
) -> Result<HttpResponse, ApiError> {
    let order = state.payments.order_for_intent(&body.payment_intent_id).await?;
    ensure_can_pay(&identity, &order)?;

    let order = state
        .payments
        .confirm(&order, &body.payment_intent_id, identity.user_id())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "order": OrderView::from(&order) })))
}

/// Raw body is required: the signature covers the exact bytes sent
async fn webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let Some(signature) = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        state.metrics.record_webhook_rejection("missing_signature");
        return Err(ApiError::bad_request("Webhook error: missing signature header"));
    };

    let outcome = state.payments.handle_webhook(&body, signature).await?;
    if let WebhookOutcome::Skipped { order_id, reason } = &outcome {
        tracing::warn!(order_id = %order_id, reason = %reason, "webhook acknowledged without change");
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}
