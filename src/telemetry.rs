//! Prometheus metrics for request traffic and simulation state.
//!
//! Request counters and latencies are recorded as requests complete. Simulation gauges are
//! sampled from the controller each time `/metrics` is scraped.

use crate::error::AppError;
use crate::traffic::TrafficController;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

pub const METRICS_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

const LATENCY_BUCKETS: [f64; 11] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

pub struct MetricsSink {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    simulation_active: IntGauge,
    simulation_emergency: IntGauge,
    simulation_level: IntGauge,
    auto_mode_enabled: IntGauge,
    baseline_active: IntGauge,
    generator_workers: IntGaugeVec,
}

impl MetricsSink {
    pub fn new() -> Result<Self, AppError> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests handled"),
            &["method", "endpoint", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["endpoint"],
        )?;
        let simulation_active = IntGauge::new(
            "traffic_simulation_active",
            "Whether a foreground traffic simulation is running (0/1)",
        )?;
        let simulation_emergency = IntGauge::new(
            "traffic_simulation_emergency",
            "Whether the running simulation was triggered by an emergency (0/1)",
        )?;
        let simulation_level = IntGauge::new(
            "traffic_simulation_level",
            "Current traffic level (0=off, 1=low, 2=medium, 3=high)",
        )?;
        let auto_mode_enabled = IntGauge::new(
            "traffic_auto_mode_enabled",
            "Whether price moves may adjust the traffic level (0/1)",
        )?;
        let baseline_active = IntGauge::new(
            "traffic_baseline_active",
            "Whether the baseline load worker is running (0/1)",
        )?;
        let generator_workers = IntGaugeVec::new(
            Opts::new("traffic_generator_workers", "Live load generator workers"),
            &["kind"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(simulation_active.clone()))?;
        registry.register(Box::new(simulation_emergency.clone()))?;
        registry.register(Box::new(simulation_level.clone()))?;
        registry.register(Box::new(auto_mode_enabled.clone()))?;
        registry.register(Box::new(baseline_active.clone()))?;
        registry.register(Box::new(generator_workers.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            simulation_active,
            simulation_emergency,
            simulation_level,
            auto_mode_enabled,
            baseline_active,
            generator_workers,
        })
    }

    pub fn record_request(&self, method: &str, endpoint: &str, status: u16, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }

    pub fn sample_traffic(&self, controller: &TrafficController) {
        let state = controller.get_state();
        let workers = controller.worker_counts();

        self.simulation_active.set(i64::from(state.active));
        self.simulation_emergency.set(i64::from(state.emergency));
        self.simulation_level.set(state.level.ordinal());
        self.auto_mode_enabled.set(i64::from(state.auto_mode));
        self.baseline_active
            .set(i64::from(controller.baseline_active()));
        self.generator_workers
            .with_label_values(&["foreground"])
            .set(workers.foreground as i64);
        self.generator_workers
            .with_label_values(&["baseline"])
            .set(workers.baseline as i64);
    }

    /// Samples the controller and renders every registered family in text exposition format.
    pub fn render(&self, controller: &TrafficController) -> Result<String, AppError> {
        self.sample_traffic(controller);
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
