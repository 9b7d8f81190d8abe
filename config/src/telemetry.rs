use metrics::{counter, histogram};
use std::time::Instant;

pub struct Telemetry;

impl Telemetry {
    pub fn record_resolution(namespace: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!("envconf_resolutions_total", "namespace" => namespace.to_string(), "outcome" => outcome)
            .increment(1);
    }

    pub fn record_missing_values(namespace: &str, count: usize) {
        if count > 0 {
            counter!("envconf_missing_values_total", "namespace" => namespace.to_string())
                .increment(count as u64);
        }
    }

    pub fn record_transport_error(source: &str) {
        counter!("envconf_transport_errors_total", "source" => source.to_string()).increment(1);
    }

    pub fn record_duration(namespace: &str, duration_ms: f64) {
        histogram!("envconf_resolution_duration_ms", "namespace" => namespace.to_string())
            .record(duration_ms);
    }
}

pub struct ResolutionTimer {
    start: Instant,
    namespace: String,
}

impl ResolutionTimer {
    pub fn new(namespace: &str) -> Self {
        Self {
            start: Instant::now(),
            namespace: namespace.to_string(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed().as_millis() as f64;
        Telemetry::record_duration(&self.namespace, duration);
    }
}
