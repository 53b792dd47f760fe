use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use storefront::config::AppConfig;
use storefront::domain::product::Product;
use storefront::domain::user::{Email, Role, User};
use storefront::http::rate_limit::{RateLimitConfig, RateLimiter};
use storefront::http::MAX_UPLOAD_BYTES;
use storefront::mail::RecordingTransport;
use storefront::metrics::Metrics;
use storefront::payments::{FakeGateway, IntentStatus, PaymentGateway};
use storefront::state::{AppState, Backends};
use storefront::storage::MemoryStorage;
use storefront::store::InMemoryDocumentStore;
use storefront::utils::RetryConfig;

// ============================================================================
// Test Harness
// ============================================================================

const WEBHOOK_SECRET: &str = "whsec_test";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

struct Harness {
    state: web::Data<AppState>,
    gateway: Arc<FakeGateway>,
    storage: Arc<MemoryStorage>,
    mail: Arc<RecordingTransport>,
}

fn harness_with_limit(capacity: f64) -> Harness {
    let gateway = Arc::new(FakeGateway::new(WEBHOOK_SECRET));
    let storage = Arc::new(MemoryStorage::new("/uploads"));
    let mail = Arc::new(RecordingTransport::new());

    let state = AppState::build(
        &AppConfig::default(),
        Backends {
            store: Arc::new(InMemoryDocumentStore::new()),
            gateway: gateway.clone(),
            storage: storage.clone(),
            mail: mail.clone(),
            rate_limiter: RateLimiter::new(RateLimitConfig {
                capacity,
                refill_per_sec: 0.0,
                trust_forwarded: false,
            }),
        },
        Arc::new(Metrics::new().unwrap()),
        RetryConfig::none(),
    );

    Harness {
        state: web::Data::new(state),
        gateway,
        storage,
        mail,
    }
}

fn harness() -> Harness {
    harness_with_limit(1000.0)
}

macro_rules! app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data($h.state.clone())
                .configure(storefront::http::configure),
        )
        .await
    };
}

/// Middleware errors surface as `Err` from the service; turn them into the
/// response the server would have written
fn respond(result: Result<ServiceResponse, actix_web::Error>) -> ServiceResponse {
    match result {
        Ok(response) => response,
        Err(err) => {
            let response = err.error_response();
            ServiceResponse::new(test::TestRequest::default().to_http_request(), response)
        }
    }
}

macro_rules! send {
    ($app:expr, $req:expr) => {
        respond(test::try_call_service(&$app, $req).await)
    };
}

async fn json_of(response: ServiceResponse) -> (StatusCode, Value) {
    let status = response.status();
    let body = test::read_body(response).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn product(h: &Harness, name: &str, price: Decimal) -> Product {
    let mut product = Product::new(
        Uuid::new_v4(),
        name.into(),
        format!("{name} description"),
        price,
        "home".into(),
        None,
    )
    .unwrap();
    h.state.products.insert(&mut product).await.unwrap();
    product
}

async fn user_with_token(h: &Harness, email: &str, role: Role) -> (User, String) {
    let mut user = User::new("Test User", Email::parse(email).unwrap(), "unused".into(), role).unwrap();
    h.state.users.insert(&mut user).await.unwrap();
    let token = h.state.tokens.issue(&user).unwrap();
    (user, token)
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

fn address() -> Value {
    json!({
        "fullName": "Grace Hopper",
        "street": "1 Compiler Lane",
        "city": "Arlington",
        "postalCode": "22201",
        "country": "US"
    })
}

fn guest_order(items: Value, method: &str) -> Value {
    json!({
        "items": items,
        "guestInfo": { "name": "Grace", "email": "Grace@Example.com" },
        "paymentMethod": method,
        "shippingAddress": address(),
    })
}

fn multipart(field: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "storefront-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal as string")).unwrap()
}

fn webhook_body(event_type: &str, intent: &storefront::payments::PaymentIntent) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": { "object": intent },
    }))
    .unwrap()
}

// ============================================================================
// Orders
// ============================================================================

#[actix_web::test]
async fn guest_order_total_is_sum_of_captured_lines() {
    let h = harness();
    let app = app!(h);
    let lamp = product(&h, "Lamp", dec!(12.50)).await;
    let bulb = product(&h, "Bulb", dec!(3.25)).await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(guest_order(
            json!([
                { "productId": lamp.id, "quantity": 2 },
                { "productId": bulb.id, "quantity": 4 }
            ]),
            "card",
        ))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::CREATED);
    let order = &body["order"];
    assert_eq!(decimal(&order["totalAmount"]), dec!(38.00));
    assert_eq!(order["paymentStatus"], "pending");
    assert_eq!(order["orderStatus"], "pending");
    assert_eq!(order["lifecycleStage"], "created");
    assert_eq!(order["owner"]["kind"], "guest");
    assert_eq!(order["owner"]["email"], "grace@example.com");
    assert_eq!(order["items"][0]["name"], "Lamp");
    assert!(order["orderNumber"].as_str().unwrap().starts_with("ORD-"));

    let sent = h.mail.wait_for(1, Duration::from_secs(1)).await;
    assert_eq!(sent[0].template, "order_placed");
}

#[actix_web::test]
async fn anonymous_order_needs_guest_info() {
    let h = harness();
    let app = app!(h);
    let lamp = product(&h, "Lamp", dec!(10)).await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(json!({
            "items": [{ "productId": lamp.id, "quantity": 1 }],
            "paymentMethod": "card",
            "shippingAddress": address(),
        }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[actix_web::test]
async fn signed_in_order_belongs_to_user_and_guest_lookup_checks_email() {
    let h = harness();
    let app = app!(h);
    let lamp = product(&h, "Lamp", dec!(10)).await;
    let (user, token) = user_with_token(&h, "ada@example.com", Role::User).await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header(bearer(&token))
        .set_json(json!({
            "items": [{ "productId": lamp.id, "quantity": 1 }],
            "paymentMethod": "bank_transfer",
            "shippingAddress": address(),
        }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["owner"]["userId"], user.id.to_string());

    let req = test::TestRequest::get()
        .uri("/users/orders")
        .insert_header(bearer(&token))
        .to_request();
    let (_, body) = json_of(send!(app, req)).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);

    // Guest lookup with the wrong email is indistinguishable from a missing order
    let guest = test::TestRequest::post()
        .uri("/orders")
        .set_json(guest_order(json!([{ "productId": lamp.id, "quantity": 1 }]), "card"))
        .to_request();
    let (_, body) = json_of(send!(app, guest)).await;
    let number = body["order"]["orderNumber"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/orders/lookup?orderNumber={number}&email=someone@else.com"))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/orders/lookup?orderNumber={number}&email=GRACE@example.com"))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::OK);
}

// ============================================================================
// Card Payments
// ============================================================================

macro_rules! place_card_order {
    ($app:expr, $h:expr) => {{
        let lamp = product(&$h, "Lamp", dec!(19.99)).await;
        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(guest_order(json!([{ "productId": lamp.id, "quantity": 1 }]), "card"))
            .to_request();
        let (_, body) = json_of(send!($app, req)).await;
        let order_id = Uuid::parse_str(body["order"]["id"].as_str().unwrap()).unwrap();

        let req = test::TestRequest::post()
            .uri("/payments/create-payment-intent")
            .set_json(json!({ "orderId": order_id }))
            .to_request();
        let (status, body) = json_of(send!($app, req)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["clientSecret"].is_string());

        (order_id, body["paymentIntentId"].as_str().unwrap().to_string())
    }};
}

#[actix_web::test]
async fn duplicate_success_webhook_is_idempotent() {
    let h = harness();
    let app = app!(h);
    let (order_id, intent_id) = place_card_order!(app, h);

    let intent = h.gateway.set_status(&intent_id, IntentStatus::Succeeded).await.unwrap();
    let body = webhook_body("payment_intent.succeeded", &intent);
    let signature = h.gateway.sign_webhook(&body);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/payments/webhook")
            .insert_header(("Stripe-Signature", signature.clone()))
            .set_payload(body.clone())
            .to_request();
        let (status, json) = json_of(send!(app, req)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["received"], true);
    }

    let order = h.state.orders.orders().require(order_id).await.unwrap();
    assert_eq!(order.payment_status.as_str(), "paid");
    assert_eq!(order.order_status.as_str(), "processing");
    assert_eq!(
        h.state.metrics.payments_confirmed.with_label_values(&["webhook"]).get(),
        1
    );

    let sent = h.mail.wait_for(2, Duration::from_secs(1)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let receipts = h
        .mail
        .sent()
        .await
        .into_iter()
        .filter(|m| m.template == "payment_received")
        .count();
    assert_eq!(sent.len(), 2);
    assert_eq!(receipts, 1);
}

#[actix_web::test]
async fn invalid_webhook_signature_changes_nothing() {
    let h = harness();
    let app = app!(h);
    let (order_id, intent_id) = place_card_order!(app, h);
    let before = h.state.orders.orders().require(order_id).await.unwrap();

    let intent = h.gateway.set_status(&intent_id, IntentStatus::Succeeded).await.unwrap();
    let body = webhook_body("payment_intent.succeeded", &intent);
    let forged = FakeGateway::new("not-the-secret").sign_webhook(&body);

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("Stripe-Signature", forged))
        .set_payload(body.clone())
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_payload(body)
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);

    let after = h.state.orders.orders().require(order_id).await.unwrap();
    assert_eq!(after, before);
}

#[actix_web::test]
async fn webhook_without_signature_header_is_rejected() {
    let h = harness();
    let app = app!(h);
    let (order_id, intent_id) = place_card_order!(app, h);
    let before = h.state.orders.orders().require(order_id).await.unwrap();

    let intent = h.gateway.set_status(&intent_id, IntentStatus::Succeeded).await.unwrap();
    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_payload(webhook_body("payment_intent.succeeded", &intent))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
    assert_eq!(
        h.state.metrics.webhook_rejections.with_label_values(&["missing_signature"]).get(),
        1
    );
    assert_eq!(h.state.orders.orders().require(order_id).await.unwrap(), before);
}

#[actix_web::test]
async fn paid_order_never_regresses() {
    let h = harness();
    let app = app!(h);
    let (order_id, intent_id) = place_card_order!(app, h);

    // Client confirmation first
    h.gateway.set_status(&intent_id, IntentStatus::Succeeded).await.unwrap();
    let req = test::TestRequest::post()
        .uri("/payments/confirm")
        .set_json(json!({ "paymentIntentId": intent_id }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["paymentStatus"], "paid");

    // Then a late failure webhook
    let intent = h
        .gateway
        .set_status(&intent_id, IntentStatus::RequiresPaymentMethod)
        .await
        .unwrap();
    let failure = webhook_body("payment_intent.payment_failed", &intent);
    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("Stripe-Signature", h.gateway.sign_webhook(&failure)))
        .set_payload(failure)
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::OK);

    let order = h.state.orders.orders().require(order_id).await.unwrap();
    assert_eq!(order.payment_status.as_str(), "paid");
    assert_eq!(order.order_status.as_str(), "processing");
}

#[actix_web::test]
async fn gateway_outage_leaves_order_untouched() {
    let h = harness();
    let app = app!(h);
    let lamp = product(&h, "Lamp", dec!(5)).await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(guest_order(json!([{ "productId": lamp.id, "quantity": 1 }]), "card"))
        .to_request();
    let (_, body) = json_of(send!(app, req)).await;
    let order_id = Uuid::parse_str(body["order"]["id"].as_str().unwrap()).unwrap();
    let before = h.state.orders.orders().require(order_id).await.unwrap();

    h.gateway.set_unavailable(true);
    let req = test::TestRequest::post()
        .uri("/payments/create-payment-intent")
        .set_json(json!({ "orderId": order_id }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
    assert_eq!(h.state.orders.orders().require(order_id).await.unwrap(), before);
}

#[actix_web::test]
async fn confirm_before_success_is_rejected() {
    let h = harness();
    let app = app!(h);
    let (order_id, intent_id) = place_card_order!(app, h);

    let req = test::TestRequest::post()
        .uri("/payments/confirm")
        .set_json(json!({ "paymentIntentId": intent_id }))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);

    let intent = h.gateway.retrieve_intent(&intent_id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
    let order = h.state.orders.orders().require(order_id).await.unwrap();
    assert_eq!(order.payment_status.as_str(), "pending");
}

// ============================================================================
// Payment Slips
// ============================================================================

macro_rules! place_transfer_order {
    ($app:expr, $h:expr) => {{
        let lamp = product(&$h, "Lamp", dec!(40)).await;
        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(guest_order(json!([{ "productId": lamp.id, "quantity": 1 }]), "bank_transfer"))
            .to_request();
        let (_, body) = json_of(send!($app, req)).await;
        (
            Uuid::parse_str(body["order"]["id"].as_str().unwrap()).unwrap(),
            body["order"]["orderNumber"].as_str().unwrap().to_string(),
        )
    }};
}

#[actix_web::test]
async fn non_image_slip_never_reaches_storage() {
    let h = harness();
    let app = app!(h);
    let (order_id, _) = place_transfer_order!(app, h);

    for (content_type, data) in [
        ("application/pdf", b"%PDF-1.7 fake".as_slice()),
        ("image/png", b"MZ this is an executable".as_slice()),
    ] {
        let (ct, body) = multipart("paymentSlip", content_type, data);
        let req = test::TestRequest::post()
            .uri(&format!("/orders/{order_id}/payment-slip?email=grace@example.com"))
            .insert_header((header::CONTENT_TYPE, ct))
            .set_payload(body)
            .to_request();
        assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);
    }

    assert!(h.storage.is_empty().await);
    let order = h.state.orders.orders().require(order_id).await.unwrap();
    assert!(order.payment_slip.is_none());
}

#[actix_web::test]
async fn oversized_slip_never_reaches_storage() {
    let h = harness();
    let app = app!(h);
    let (order_id, _) = place_transfer_order!(app, h);

    let mut data = PNG.to_vec();
    data.resize(MAX_UPLOAD_BYTES + 1, 0);
    let (ct, body) = multipart("paymentSlip", "image/png", &data);
    let req = test::TestRequest::post()
        .uri(&format!("/orders/{order_id}/payment-slip?email=grace@example.com"))
        .insert_header((header::CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File too large (max 5 MB)");
    assert!(h.storage.is_empty().await);
    let order = h.state.orders.orders().require(order_id).await.unwrap();
    assert!(order.payment_slip.is_none());
}

#[actix_web::test]
async fn rejected_slip_cannot_be_resubmitted() {
    let h = harness();
    let app = app!(h);
    let (order_id, _) = place_transfer_order!(app, h);
    let upload = |target: String| {
        let (ct, body) = multipart("paymentSlip", "image/png", PNG);
        test::TestRequest::post()
            .uri(&target)
            .insert_header((header::CONTENT_TYPE, ct))
            .set_payload(body)
            .to_request()
    };
    let uri = format!("/orders/{order_id}/payment-slip?email=grace@example.com");

    assert_eq!(send!(app, upload(uri.clone())).status(), StatusCode::OK);

    let (_, admin_token) = user_with_token(&h, "admin@example.com", Role::Admin).await;
    let req = test::TestRequest::put()
        .uri(&format!("/admin/orders/{order_id}/verify-payment"))
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "approved": false, "notes": "amount does not match" }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["paymentStatus"], "failed");

    assert_eq!(send!(app, upload(uri)).status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.storage.keys().await.len(), 1);
    let order = h.state.orders.orders().require(order_id).await.unwrap();
    assert_eq!(order.payment_status.as_str(), "failed");
    assert_eq!(order.payment_notes.as_deref(), Some("amount does not match"));
}

#[actix_web::test]
async fn slip_upload_then_admin_approval() {
    let h = harness();
    let app = app!(h);
    let (order_id, order_number) = place_transfer_order!(app, h);

    // Wrong guest email is refused
    let (ct, body) = multipart("paymentSlip", "image/png", PNG);
    let req = test::TestRequest::post()
        .uri(&format!("/orders/{order_id}/payment-slip?email=intruder@example.com"))
        .insert_header((header::CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::FORBIDDEN);

    let (ct, body) = multipart("paymentSlip", "image/png", PNG);
    let req = test::TestRequest::post()
        .uri(&format!("/orders/{order_id}/payment-slip?email=grace@example.com"))
        .insert_header((header::CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["paymentStatus"], "pending");
    assert_eq!(body["order"]["lifecycleStage"], "awaiting_payment");

    let keys = h.storage.keys().await;
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with(&format!("payment-slips/{order_number}-")));
    assert!(keys[0].ends_with(".png"));

    let (_, admin_token) = user_with_token(&h, "admin@example.com", Role::Admin).await;
    let req = test::TestRequest::put()
        .uri(&format!("/admin/orders/{order_id}/verify-payment"))
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "approved": true, "notes": "matched bank statement" }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["paymentStatus"], "paid");
    assert_eq!(body["order"]["orderStatus"], "processing");
    assert_eq!(body["order"]["paymentNotes"], "matched bank statement");

    // A second review of a decided slip is refused
    let req = test::TestRequest::put()
        .uri(&format!("/admin/orders/{order_id}/verify-payment"))
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "approved": false }))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Admin
// ============================================================================

#[actix_web::test]
async fn admin_routes_require_admin_role() {
    let h = harness();
    let app = app!(h);
    let (_, user_token) = user_with_token(&h, "user@example.com", Role::User).await;
    let (_, admin_token) = user_with_token(&h, "boss@example.com", Role::Admin).await;

    let req = test::TestRequest::get().uri("/admin/dashboard").to_request();
    assert_eq!(send!(app, req).status(), StatusCode::UNAUTHORIZED);

    for uri in ["/admin/dashboard", "/admin/orders", "/admin/users"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&user_token))
            .to_request();
        assert_eq!(send!(app, req).status(), StatusCode::FORBIDDEN, "{uri}");
    }

    let req = test::TestRequest::get()
        .uri("/admin/dashboard")
        .insert_header(bearer(&admin_token))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);
    assert_eq!(decimal(&body["revenue"]), Decimal::ZERO);
}

#[actix_web::test]
async fn admin_cannot_demote_themselves() {
    let h = harness();
    let app = app!(h);
    let (admin, token) = user_with_token(&h, "boss@example.com", Role::Admin).await;
    let (other, _) = user_with_token(&h, "staff@example.com", Role::User).await;

    let req = test::TestRequest::put()
        .uri(&format!("/admin/users/{}", admin.id))
        .insert_header(bearer(&token))
        .set_json(json!({ "role": "user" }))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri(&format!("/admin/users/{}", other.id))
        .insert_header(bearer(&token))
        .set_json(json!({ "role": "admin" }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");
}

// ============================================================================
// Catalog
// ============================================================================

#[actix_web::test]
async fn rating_uses_running_average() {
    let h = harness();
    let app = app!(h);
    let lamp = product(&h, "Lamp", dec!(10)).await;
    let (_, token) = user_with_token(&h, "rater@example.com", Role::User).await;

    let mut last = Value::Null;
    for rating in [5, 2] {
        let req = test::TestRequest::post()
            .uri(&format!("/products/{}/rate", lamp.id))
            .insert_header(bearer(&token))
            .set_json(json!({ "rating": rating }))
            .to_request();
        let (status, body) = json_of(send!(app, req)).await;
        assert_eq!(status, StatusCode::OK);
        last = body;
    }
    assert_eq!(last["rating"]["average"], 3.5);
    assert_eq!(last["rating"]["count"], 2);

    let req = test::TestRequest::post()
        .uri(&format!("/products/{}/rate", lamp.id))
        .insert_header(bearer(&token))
        .set_json(json!({ "rating": 6 }))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn product_search_hides_inactive_items() {
    let h = harness();
    let app = app!(h);
    product(&h, "Desk Lamp", dec!(30)).await;
    product(&h, "Chair", dec!(80)).await;
    let mut retired = product(&h, "Floor Lamp", dec!(50)).await;
    retired.active = false;
    h.state.products.save(&mut retired).await.unwrap();

    let req = test::TestRequest::get().uri("/products?q=lamp").to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["products"][0]["name"], "Desk Lamp");
}

// ============================================================================
// Accounts
// ============================================================================

#[actix_web::test]
async fn register_login_and_me() {
    let h = harness();
    let app = app!(h);

    let register = json!({ "name": "Ada", "email": "Ada@Example.com", "password": "analytical" });
    let req = test::TestRequest::post().uri("/auth/register").set_json(&register).to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("passwordHash").is_none());

    let req = test::TestRequest::post().uri("/auth/register").set_json(&register).to_request();
    assert_eq!(send!(app, req).status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "wrong-password" }))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "analytical" }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada");

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer("not-a-token"))
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn auth_routes_are_rate_limited() {
    let h = harness_with_limit(2.0);
    let app = app!(h);
    let login = json!({ "email": "nobody@example.com", "password": "whatever1" });

    for _ in 0..2 {
        let req = test::TestRequest::post().uri("/auth/login").set_json(&login).to_request();
        assert_eq!(send!(app, req).status(), StatusCode::UNAUTHORIZED);
    }

    let req = test::TestRequest::post().uri("/auth/login").set_json(&login).to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["message"].is_string());

    // Other scopes are not limited
    let req = test::TestRequest::get().uri("/products").to_request();
    assert_eq!(send!(app, req).status(), StatusCode::OK);
}

#[actix_web::test]
async fn forwarded_headers_do_not_reset_the_rate_limit() {
    let h = harness_with_limit(1.0);
    let app = app!(h);
    let login = json!({ "email": "nobody@example.com", "password": "whatever1" });
    let peer = "10.0.0.1:4000".parse().unwrap();

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer)
        .insert_header(("X-Forwarded-For", "1.1.1.1"))
        .set_json(&login)
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer)
        .insert_header(("X-Forwarded-For", "2.2.2.2"))
        .set_json(&login)
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::TOO_MANY_REQUESTS);

    // A different peer has its own bucket
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .peer_addr("10.0.0.2:4000".parse().unwrap())
        .set_json(&login)
        .to_request();
    assert_eq!(send!(app, req).status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn health_and_metrics_are_exposed() {
    let h = harness();
    let app = app!(h);

    let req = test::TestRequest::get().uri("/health").to_request();
    let (status, body) = json_of(send!(app, req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gateway"], "fake");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["rateLimiter"], "local");
    assert!(body["gatewayCircuit"].is_null());

    h.state.metrics.record_order_created("card");
    let req = test::TestRequest::get().uri("/metrics").to_request();
    let response = send!(app, req);
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(test::read_body(response).await.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}

// ============================================================================
// Contact
// ============================================================================

#[actix_web::test]
async fn contact_message_is_stored_and_forwarded_to_the_shop() {
    let h = harness();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/contact")
        .set_json(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "message": "Do you ship to Lisbon?"
        }))
        .to_request();
    let (status, body) = json_of(send!(app, req)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Message received");
    assert!(body["id"].is_string());
    assert_eq!(h.state.contacts.count(&[]).await.unwrap(), 1);

    let sent = h.mail.wait_for(1, Duration::from_secs(1)).await;
    assert_eq!(sent[0].template, "contact");
    assert_eq!(sent[0].to, "shop@localhost");
    assert!(sent[0].text.contains("Do you ship to Lisbon?"));
}

#[actix_web::test]
async fn incomplete_contact_message_is_rejected() {
    let h = harness();
    let app = app!(h);

    for payload in [
        json!({ "name": "Ada", "email": "ada@example.com", "message": "   " }),
        json!({ "name": "Ada", "email": "not-an-email", "message": "Hello" }),
    ] {
        let req = test::TestRequest::post().uri("/contact").set_json(payload).to_request();
        let (status, body) = json_of(send!(app, req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    assert_eq!(h.state.contacts.count(&[]).await.unwrap(), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.mail.sent().await.is_empty());
}
