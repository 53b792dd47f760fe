// Private module declaration
mod server;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::{health_handler, metrics_handler};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Tracks the shop's business and infrastructure signals:
// - Orders placed (by payment method)
// - Payments confirmed (by source) and failed
// - Webhook rejections (by reason)
// - Payment slip reviews (by outcome)
// - Gateway errors and circuit breaker state
// - Emails sent / failed, rate-limited requests
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounterVec,

    // Payment Metrics
    pub payments_confirmed: IntCounterVec,
    pub payments_failed: IntCounter,
    pub webhook_rejections: IntCounterVec,
    pub slip_reviews: IntCounterVec,

    // Gateway Metrics
    pub gateway_errors: IntCounterVec,
    pub circuit_breaker_state: IntGauge,

    // Mail Metrics
    pub emails_sent: IntCounterVec,
    pub emails_failed: IntCounterVec,

    // HTTP Metrics
    pub rate_limited: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let orders_created = IntCounterVec::new(
            Opts::new("orders_created_total", "Total orders placed"),
            &["payment_method"],
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        // Payment Metrics
        let payments_confirmed = IntCounterVec::new(
            Opts::new("payments_confirmed_total", "Orders that transitioned to paid"),
            &["source"],
        )?;
        registry.register(Box::new(payments_confirmed.clone()))?;

        let payments_failed = IntCounter::new(
            "payments_failed_total",
            "Card payments reported as failed",
        )?;
        registry.register(Box::new(payments_failed.clone()))?;

        let webhook_rejections = IntCounterVec::new(
            Opts::new("webhook_rejections_total", "Webhooks rejected before processing"),
            &["reason"],
        )?;
        registry.register(Box::new(webhook_rejections.clone()))?;

        let slip_reviews = IntCounterVec::new(
            Opts::new("payment_slip_reviews_total", "Bank transfer slips reviewed by admins"),
            &["outcome"],
        )?;
        registry.register(Box::new(slip_reviews.clone()))?;

        // Gateway Metrics
        let gateway_errors = IntCounterVec::new(
            Opts::new("gateway_errors_total", "Payment gateway calls that failed"),
            &["operation"],
        )?;
        registry.register(Box::new(gateway_errors.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "gateway_circuit_breaker_state",
            "Gateway circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        // Mail Metrics
        let emails_sent = IntCounterVec::new(
            Opts::new("emails_sent_total", "Transactional emails delivered"),
            &["template"],
        )?;
        registry.register(Box::new(emails_sent.clone()))?;

        let emails_failed = IntCounterVec::new(
            Opts::new("emails_failed_total", "Transactional emails dropped after all retries"),
            &["template"],
        )?;
        registry.register(Box::new(emails_failed.clone()))?;

        // HTTP Metrics
        let rate_limited = IntCounterVec::new(
            Opts::new("rate_limited_requests_total", "Requests rejected with 429"),
            &["scope"],
        )?;
        registry.register(Box::new(rate_limited.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            payments_confirmed,
            payments_failed,
            webhook_rejections,
            slip_reviews,
            gateway_errors,
            circuit_breaker_state,
            emails_sent,
            emails_failed,
            rate_limited,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self, payment_method: &str) {
        self.orders_created.with_label_values(&[payment_method]).inc();
    }

    pub fn record_payment_confirmed(&self, source: &str) {
        self.payments_confirmed.with_label_values(&[source]).inc();
    }

    pub fn record_webhook_rejection(&self, reason: &str) {
        self.webhook_rejections.with_label_values(&[reason]).inc();
    }

    pub fn record_slip_review(&self, approved: bool) {
        let outcome = if approved { "approved" } else { "rejected" };
        self.slip_reviews.with_label_values(&[outcome]).inc();
    }

    pub fn record_gateway_error(&self, operation: &str) {
        self.gateway_errors.with_label_values(&[operation]).inc();
    }

    /// 0=Closed, 1=Open, 2=HalfOpen
    pub fn update_circuit_breaker_state(&self, state: u8) {
        self.circuit_breaker_state.set(state as i64);
    }

    pub fn record_email(&self, template: &str, delivered: bool) {
        if delivered {
            self.emails_sent.with_label_values(&[template]).inc();
        } else {
            self.emails_failed.with_label_values(&[template]).inc();
        }
    }

    pub fn record_rate_limited(&self, scope: &str) {
        self.rate_limited.with_label_values(&[scope]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> Option<f64> {
        metrics
            .registry
            .gather()
            .iter()
            .find(|m| m.name() == name)
            .and_then(|m| m.metric.first().and_then(|m| m.counter.value))
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created("card");
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_payment_confirmed() {
        let metrics = Metrics::new().unwrap();
        metrics.record_payment_confirmed("webhook");
        metrics.record_payment_confirmed("webhook");

        assert_eq!(counter_value(&metrics, "payments_confirmed_total"), Some(2.0));
    }

    #[test]
    fn test_record_email_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_email("order_placed", true);
        metrics.record_email("order_placed", false);

        assert_eq!(counter_value(&metrics, "emails_sent_total"), Some(1.0));
        assert_eq!(counter_value(&metrics, "emails_failed_total"), Some(1.0));
    }

    #[test]
    fn test_circuit_breaker_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state(1);

        let gathered = metrics.registry.gather();
        let state = gathered
            .iter()
            .find(|m| m.name() == "gateway_circuit_breaker_state")
            .unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }
}
