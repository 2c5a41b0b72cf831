//! Prometheus metrics for sync observability.
//!
//! - `adsync_remote_requests_total{kind,op,status}` - Counter of remote API calls
//! - `adsync_gate_wait_seconds` - Histogram of Request Gate waits
//! - `adsync_sync_results_total{kind,outcome}` - Counter of per-entity outcomes
//! - `adsync_sync_runs_total{result}` - Counter of pipeline runs
//! - `adsync_uptime_seconds` - Gauge of process uptime

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static PROMETHEUS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

static METRICS_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Gate waits cluster around multiples of the minimum interval.
const GATE_WAIT_BUCKETS: &[f64] = &[0.01, 0.1, 1.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0];

/// Install the Prometheus recorder once; later calls return the same handle.
///
/// Returns `None` when another recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let _ = METRICS_START_TIME.get_or_init(Instant::now);

    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = match PrometheusBuilder::new().set_buckets(GATE_WAIT_BUCKETS) {
                Ok(builder) => builder,
                Err(e) => {
                    tracing::warn!("Invalid histogram buckets: {}", e);
                    PrometheusBuilder::new()
                },
            };
            let handle = match builder.install_recorder() {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!("Prometheus recorder not installed: {}", e);
                    return None;
                },
            };

            describe_counter!("adsync_remote_requests_total", "Remote ad server API calls");
            describe_histogram!(
                "adsync_gate_wait_seconds",
                "Time spent waiting for the request gate"
            );
            describe_counter!("adsync_sync_results_total", "Per-entity sync outcomes");
            describe_counter!("adsync_sync_runs_total", "Completed pipeline runs");
            describe_gauge!("adsync_uptime_seconds", "Process uptime in seconds");

            Some(handle)
        })
        .clone()
}

pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get().and_then(Option::as_ref)
}

pub fn record_remote_request(kind: &'static str, op: &'static str, status: &'static str) {
    counter!("adsync_remote_requests_total", "kind" => kind, "op" => op, "status" => status)
        .increment(1);
}

pub fn record_gate_wait(waited: Duration) {
    histogram!("adsync_gate_wait_seconds").record(waited.as_secs_f64());
}

pub fn record_sync_result(kind: &'static str, outcome: &'static str) {
    counter!("adsync_sync_results_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_sync_run(result: &'static str) {
    counter!("adsync_sync_runs_total", "result" => result).increment(1);
}

pub fn update_uptime_gauge() {
    if let Some(start) = METRICS_START_TIME.get() {
        gauge!("adsync_uptime_seconds").set(start.elapsed().as_secs_f64());
    }
}

/// Render the exposition text, or an empty string before initialization.
pub fn render() -> String {
    update_uptime_gauge();
    get_prometheus_handle().map(PrometheusHandle::render).unwrap_or_default()
}
