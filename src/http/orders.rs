use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AuthUser, Identity};
use crate::domain::order::{
    GuestInfo, Order, OrderCommand, OrderError, OrderItem, OrderOwner, PaymentMethod,
    PaymentSlip, ShippingAddress,
};
use crate::domain::product::ProductError;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Filter;

use super::upload::read_image;
use super::OrderView;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::post().to(create_order))
            .route("/lookup", web::get().to(lookup_order))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/payment-slip", web::post().to(upload_payment_slip)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
    pub guest_info: Option<GuestInfo>,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupQuery {
    pub order_number: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct GuestEmail {
    pub email: Option<String>,
}

fn order_response(order: &Order) -> serde_json::Value {
    serde_json::json!({ "order": OrderView::from(order) })
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Capture name and price from the catalog at the moment of ordering
async fn capture_items(state: &AppState, lines: &[OrderLine]) -> Result<Vec<OrderItem>, ApiError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyItems.into());
    }

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = state
            .products
            .get(line.product_id)
            .await?
            .ok_or_else(|| ApiError::bad_request(format!("Product {} not found", line.product_id)))?;

        product.ensure_purchasable().map_err(|e: ProductError| {
            ApiError::bad_request(format!("{}: {}", product.name, e))
        })?;

        items.push(OrderItem {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            quantity: line.quantity,
        });
    }
    Ok(items)
}

async fn create_order(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();

    let owner = match identity.user() {
        Some(user) => OrderOwner::User {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.as_str().to_string(),
        },
        None => {
            let guest = request.guest_info.ok_or(OrderError::IncompleteGuestInfo)?;
            OrderOwner::Guest(GuestInfo {
                name: guest.name.trim().to_string(),
                email: guest.email.trim().to_lowercase(),
                phone: guest.phone,
            })
        }
    };

    let items = capture_items(&state, &request.items).await?;
    let order_number = state.orders.next_order_number().await?;

    let order = state
        .orders
        .place(
            OrderCommand::PlaceOrder {
                order_number,
                owner,
                items,
                shipping_address: request.shipping_address,
                payment_method: request.payment_method,
            },
            identity.user_id(),
        )
        .await?;

    state.metrics.record_order_created(order.payment_method.as_str());
    state.notifier.order_placed(&order);

    Ok(HttpResponse::Created().json(order_response(&order)))
}

async fn get_order(
    state: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = state.orders.orders().require(path.into_inner()).await?;
    if !user.is_admin() && !order.is_owned_by(user.id) {
        return Err(ApiError::forbidden("Not allowed to view this order"));
    }
    Ok(HttpResponse::Ok().json(order_response(&order)))
}

/// Guest access: order number plus the email it was placed with
async fn lookup_order(
    state: web::Data<AppState>,
    params: web::Query<LookupQuery>,
) -> Result<HttpResponse, ApiError> {
    let order = state
        .orders
        .orders()
        .find_one(vec![Filter::eq("orderNumber", params.order_number.trim())])
        .await?
        .filter(|order| same_email(order.owner.email(), &params.email))
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    Ok(HttpResponse::Ok().json(order_response(&order)))
}

async fn upload_payment_slip(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    guest: web::Query<GuestEmail>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let order = state.orders.orders().require(path.into_inner()).await?;

    let allowed = match (&order.owner, identity.user()) {
        (_, Some(user)) if user.is_admin() => true,
        (OrderOwner::User { user_id, .. }, Some(user)) => *user_id == user.id,
        (OrderOwner::Guest(info), _) => guest
            .email
            .as_deref()
            .is_some_and(|email| same_email(email, &info.email)),
        (OrderOwner::User { .. }, None) => false,
    };
    if !allowed {
        return Err(ApiError::forbidden("Not allowed to upload a slip for this order"));
    }

    // Reject before reading the upload
    if order.payment_method != PaymentMethod::BankTransfer {
        return Err(OrderError::WrongPaymentMethod(order.payment_method).into());
    }
    order.ensure_slip_open()?;

    let image = read_image(payload, "paymentSlip").await?;
    let now = Utc::now();
    let key = format!(
        "payment-slips/{}-{}.{}",
        order.order_number,
        now.timestamp_millis(),
        image.extension
    );
    let stored = state.storage.put(&key, image.bytes, image.content_type).await?;

    let outcome = state
        .orders
        .handle(
            order.id,
            OrderCommand::SubmitPaymentSlip {
                slip: PaymentSlip {
                    url: stored.url,
                    uploaded_at: now,
                },
            },
            identity.user_id(),
        )
        .await?;

    tracing::info!(order_id = %order.id, key = %stored.key, "payment slip uploaded");
    Ok(HttpResponse::Ok().json(order_response(&outcome.order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_comparison_ignores_case_and_whitespace() {
        assert!(same_email(" Guest@Example.com", "guest@example.com "));
        assert!(!same_email("guest@example.com", "other@example.com"));
    }
}
