use actix_web::{web, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};

use crate::state::AppState;

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

/// GET /health - liveness plus which backends are wired in
pub async fn health_handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "store": state.store.backend(),
        "gateway": state.payments.gateway_name(),
        "gatewayCircuit": state.payments.circuit_state().await.map(|s| s.as_str()),
        "rateLimiter": state.rate_limiter.backend(),
    }))
}
