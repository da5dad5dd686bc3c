use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::utils::CircuitState;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Payment event outcomes and order creation
// - Order status transitions
// - Notification deliveries and the dead-letter queue
// - Exchange rate resolution by source
// - Circuit breaker state per external dependency
//
// Everything is registered on one registry scraped via GET /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Payment Metrics
    pub orders_created: IntCounter,
    pub payment_events: IntCounterVec,
    pub payment_failures: IntCounterVec,
    pub amount_mismatches: IntCounter,

    // Order Lifecycle Metrics
    pub order_transitions: IntCounterVec,

    // Notification Metrics
    pub notifications: IntCounterVec,
    pub notification_duration: HistogramVec,
    pub retry_attempts_total: IntCounterVec,

    // DLQ Metrics
    pub dlq_messages_total: IntCounter,
    pub dlq_size: IntGauge,

    // Currency Metrics
    pub rate_resolutions: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Payment Metrics
        let orders_created = IntCounter::new("orders_created_total", "Orders materialized from payments")?;
        registry.register(Box::new(orders_created.clone()))?;

        let payment_events = IntCounterVec::new(
            Opts::new("payment_events_total", "Payment events by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(payment_events.clone()))?;

        let payment_failures = IntCounterVec::new(
            Opts::new("payment_event_failures_total", "Payment events that failed, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(payment_failures.clone()))?;

        let amount_mismatches = IntCounter::new(
            "payment_amount_mismatches_total",
            "Charged totals that differ from the expected checkout total",
        )?;
        registry.register(Box::new(amount_mismatches.clone()))?;

        // Order Lifecycle Metrics
        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Committed order transitions by new status"),
            &["status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        // Notification Metrics
        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Notification dispatches"),
            &["type", "outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let notification_duration = HistogramVec::new(
            HistogramOpts::new("notification_duration_seconds", "Notification dispatch duration")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["type"],
        )?;
        registry.register(Box::new(notification_duration.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Retries of outbound calls"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        // DLQ Metrics
        let dlq_messages_total = IntCounter::new(
            "dlq_messages_total",
            "Total notifications sent to the dead letter queue",
        )?;
        registry.register(Box::new(dlq_messages_total.clone()))?;

        let dlq_size = IntGauge::new("dlq_size", "Notifications currently waiting in the dead letter queue")?;
        registry.register(Box::new(dlq_size.clone()))?;

        // Currency Metrics
        let rate_resolutions = IntCounterVec::new(
            Opts::new("rate_resolutions_total", "Exchange rate lookups by answering layer"),
            &["source"],
        )?;
        registry.register(Box::new(rate_resolutions.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
            ),
            &["breaker"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            payment_events,
            payment_failures,
            amount_mismatches,
            order_transitions,
            notifications,
            notification_duration,
            retry_attempts_total,
            dlq_messages_total,
            dlq_size,
            rate_resolutions,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition format for the scrape endpoint
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_payment_event(&self, outcome: &str) {
        self.payment_events.with_label_values(&[outcome]).inc();
    }

    pub fn record_payment_failure(&self, kind: &str) {
        self.payment_events.with_label_values(&["failed"]).inc();
        self.payment_failures.with_label_values(&[kind]).inc();
    }

    pub fn record_transition(&self, status: &str) {
        self.order_transitions.with_label_values(&[status]).inc();
    }

    pub fn record_notification(&self, notification_type: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "delivered" } else { "failed" };
        self.notifications
            .with_label_values(&[notification_type, outcome])
            .inc();
        self.notification_duration
            .with_label_values(&[notification_type])
            .observe(duration_secs);
    }

    pub fn record_retry_attempt(&self, operation: &str) {
        self.retry_attempts_total.with_label_values(&[operation]).inc();
    }

    pub fn record_dlq_message(&self, queue_size: usize) {
        self.dlq_messages_total.inc();
        self.dlq_size.set(queue_size as i64);
    }

    pub fn record_rate_source(&self, source: &str) {
        self.rate_resolutions.with_label_values(&[source]).inc();
    }

    pub fn update_circuit_breaker_state(&self, breaker: &str, state: CircuitState) {
        self.circuit_breaker_state
            .with_label_values(&[breaker])
            .set(state.as_gauge());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_payment_event("created");
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_payment_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_payment_failure("malformed_metadata");
        metrics.record_payment_failure("malformed_metadata");

        assert_eq!(metrics.payment_failures.with_label_values(&["malformed_metadata"]).get(), 2);
        assert_eq!(metrics.payment_events.with_label_values(&["failed"]).get(), 2);
    }

    #[test]
    fn test_record_dlq_message() {
        let metrics = Metrics::new().unwrap();
        metrics.record_dlq_message(1);
        metrics.record_dlq_message(2);

        assert_eq!(metrics.dlq_messages_total.get(), 2);
        assert_eq!(metrics.dlq_size.get(), 2);
    }

    #[test]
    fn test_circuit_breaker_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state("rate_provider", CircuitState::Open);

        assert_eq!(
            metrics.circuit_breaker_state.with_label_values(&["rate_provider"]).get(),
            1
        );
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_created.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("orders_created_total 1"));
    }
}
