use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// Request instruments on the global meter. Recording is a no-op until a
/// meter provider is installed by [`common::TelemetryGuard`].
#[derive(Clone)]
pub struct DetectMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    failures: Counter<u64>,
    detections: Counter<u64>,
}

impl DetectMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        Self {
            duration: meter
                .f64_histogram("detect_duration_seconds")
                .with_description("Time to serve a /detect request (decode + infer + postprocess)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            requests: meter
                .u64_counter("detect_requests_total")
                .with_description("Total /detect requests received")
                .build(),
            failures: meter
                .u64_counter("detect_failures_total")
                .with_description("Total /detect requests that returned an error")
                .build(),
            detections: meter
                .u64_counter("detections_total")
                .with_description("Total detections returned to clients")
                .build(),
        }
    }

    pub fn record_request(&self) {
        self.requests.add(1, &[]);
    }

    pub fn record_success(&self, elapsed_secs: f64, detections: usize) {
        self.duration.record(elapsed_secs, &[]);
        self.detections.add(detections as u64, &[]);
    }

    pub fn record_failure(&self, status: u16) {
        self.failures
            .add(1, &[KeyValue::new("status", i64::from(status))]);
    }
}
