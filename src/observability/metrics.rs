use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub shipments_created_total: IntCounter,
    pub webhook_events_total: IntCounterVec,
    pub gateway_requests_total: IntCounterVec,
    pub option_queries_total: IntCounterVec,
    pub tracking_events_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let shipments_created_total = IntCounter::new(
            "shipments_created_total",
            "Total shipment records created",
        )
        .expect("valid shipments_created_total metric");

        let webhook_events_total = IntCounterVec::new(
            Opts::new("webhook_events_total", "Carrier webhook deliveries by outcome"),
            &["outcome"],
        )
        .expect("valid webhook_events_total metric");

        let gateway_requests_total = IntCounterVec::new(
            Opts::new(
                "gateway_requests_total",
                "Carrier aggregator requests by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid gateway_requests_total metric");

        let option_queries_total = IntCounterVec::new(
            Opts::new(
                "option_queries_total",
                "Delivery option queries by active strategy",
            ),
            &["strategy"],
        )
        .expect("valid option_queries_total metric");

        let tracking_events_total = IntCounter::new(
            "tracking_events_total",
            "Tracking events appended to the ledger",
        )
        .expect("valid tracking_events_total metric");

        registry
            .register(Box::new(shipments_created_total.clone()))
            .expect("register shipments_created_total");
        registry
            .register(Box::new(webhook_events_total.clone()))
            .expect("register webhook_events_total");
        registry
            .register(Box::new(gateway_requests_total.clone()))
            .expect("register gateway_requests_total");
        registry
            .register(Box::new(option_queries_total.clone()))
            .expect("register option_queries_total");
        registry
            .register(Box::new(tracking_events_total.clone()))
            .expect("register tracking_events_total");

        Self {
            registry,
            shipments_created_total,
            webhook_events_total,
            gateway_requests_total,
            option_queries_total,
            tracking_events_total,
        }
    }

    pub fn observe_gateway(&self, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.gateway_requests_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
