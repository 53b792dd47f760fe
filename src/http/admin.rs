use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::domain::order::{Order, OrderCommand, OrderEvent, OrderStatus, PaymentStatus};
use crate::domain::user::{PublicUser, Role};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Collection, Filter, Query};

use super::{OrderView, Paging};

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/dashboard", web::get().to(dashboard))
            .route("/orders", web::get().to(list_orders))
            .route("/orders/{id}", web::get().to(get_order))
            .route("/orders/{id}/status", web::put().to(update_status))
            .route("/orders/{id}/verify-payment", web::put().to(verify_payment))
            .route("/users", web::get().to(list_users))
            .route("/users/{id}", web::put().to(update_user)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct PaymentReview {
    pub approved: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub active: Option<bool>,
}

async fn count_where(orders: &Collection<Order>, filters: &[Filter]) -> Result<u64, ApiError> {
    Ok(orders.count(filters).await?)
}

async fn dashboard(
    state: web::Data<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<HttpResponse, ApiError> {
    let orders = state.orders.orders();

    let mut by_status = serde_json::Map::new();
    for status in [OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Completed] {
        let count = count_where(orders, &[Filter::eq("orderStatus", status.as_str())]).await?;
        by_status.insert(status.as_str().to_string(), count.into());
    }

    let mut by_payment = serde_json::Map::new();
    for status in [PaymentStatus::Pending, PaymentStatus::Paid, PaymentStatus::Failed] {
        let count = count_where(orders, &[Filter::eq("paymentStatus", status.as_str())]).await?;
        by_payment.insert(status.as_str().to_string(), count.into());
    }

    let pending_transfers = [
        Filter::eq("paymentMethod", "bank_transfer"),
        Filter::eq("paymentStatus", "pending"),
    ];
    let awaiting_slip = [
        Filter::eq("paymentMethod", "bank_transfer"),
        Filter::eq("paymentStatus", "pending"),
        Filter::eq("paymentSlip", Value::Null),
    ];
    let pending_reviews = count_where(orders, &pending_transfers)
        .await?
        .saturating_sub(count_where(orders, &awaiting_slip).await?);

    let revenue = orders
        .sum(&[Filter::eq("paymentStatus", "paid")], "totalAmount")
        .await?;

    let recent = orders
        .find(&Query::new().newest_first("createdAt").page(0, 5))
        .await?;
    let recent: Vec<OrderView> = recent.iter().map(OrderView::from).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "users": state.users.count(&[]).await?,
        "products": state.products.count(&[]).await?,
        "orders": count_where(orders, &[]).await?,
        "ordersByStatus": by_status,
        "ordersByPaymentStatus": by_payment,
        "pendingSlipReviews": pending_reviews,
        "revenue": revenue,
        "recentOrders": recent,
    })))
}

async fn list_orders(
    state: web::Data<AppState>,
    AdminUser(_admin): AdminUser,
    params: web::Query<OrderFilter>,
) -> Result<HttpResponse, ApiError> {
    let (page, limit, skip) = Paging {
        page: params.page,
        limit: params.limit,
    }
    .resolve();

    let mut filters = Vec::new();
    if let Some(status) = params.status {
        filters.push(Filter::eq("orderStatus", status.as_str()));
    }
    if let Some(status) = params.payment_status {
        filters.push(Filter::eq("paymentStatus", status.as_str()));
    }

    let orders = state.orders.orders();
    let total = orders.count(&filters).await?;
    let found = orders
        .find(&Query { filters, ..Query::default() }.newest_first("createdAt").page(skip, limit))
        .await?;
    let views: Vec<OrderView> = found.iter().map(OrderView::from).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "orders": views,
        "page": page,
        "limit": limit,
        "total": total,
    })))
}

async fn get_order(
    state: web::Data<AppState>,
    AdminUser(_admin): AdminUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = state.orders.orders().require(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "order": OrderView::from(&order) })))
}

async fn update_status(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<StatusUpdate>,
) -> Result<HttpResponse, ApiError> {
    let outcome = state
        .orders
        .handle(
            path.into_inner(),
            OrderCommand::UpdateFulfillment { status: body.status },
            Some(admin.id),
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "order": OrderView::from(&outcome.order) })))
}

async fn verify_payment(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<PaymentReview>,
) -> Result<HttpResponse, ApiError> {
    let review = body.into_inner();
    let notes = review
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let outcome = state
        .orders
        .handle(
            path.into_inner(),
            OrderCommand::ReviewPaymentSlip {
                approved: review.approved,
                notes,
                reviewer: admin.id,
            },
            Some(admin.id),
        )
        .await?;

    state.metrics.record_slip_review(review.approved);
    if outcome.became_paid() {
        state.metrics.record_payment_confirmed("slip_review");
        state.notifier.payment_received(&outcome.order);
    } else if outcome
        .events
        .iter()
        .any(|e| matches!(e, OrderEvent::PaymentSlipRejected(_)))
    {
        state.notifier.slip_rejected(&outcome.order);
    }

    tracing::info!(
        order_id = %outcome.order.id,
        admin_id = %admin.id,
        approved = review.approved,
        "payment slip reviewed"
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({ "order": OrderView::from(&outcome.order) })))
}

async fn list_users(
    state: web::Data<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<HttpResponse, ApiError> {
    let users = state
        .users
        .find(&Query::new().newest_first("createdAt"))
        .await?;
    let users: Vec<PublicUser> = users.iter().map(|u| u.public()).collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "users": users })))
}

async fn update_user(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<UserUpdate>,
) -> Result<HttpResponse, ApiError> {
    let mut user = state.users.require(path.into_inner()).await?;
    user.administer(admin.id, body.role, body.active)?;
    state.users.save(&mut user).await?;

    tracing::info!(
        user_id = %user.id,
        admin_id = %admin.id,
        role = user.role.as_str(),
        active = user.active,
        "user updated by admin"
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": user.public() })))
}
