//! Metrics collection and exposition.
//!
//! # Metrics
//! - `control_plane_cycles_total` (counter): generation cycles by outcome
//! - `control_plane_cycle_duration_seconds` (histogram): cycle latency
//! - `control_plane_snapshot_resources` (gauge): resources in the served snapshot, by type
//! - `control_plane_discovery_requests_total` (counter): discovery requests by type and result
//! - `control_plane_stream_sessions` (gauge): open streaming sessions
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests call these helpers unconditionally.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cycle(outcome: &'static str, start: Instant) {
    metrics::counter!("control_plane_cycles_total", "outcome" => outcome).increment(1);
    metrics::histogram!("control_plane_cycle_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_snapshot(listeners: usize, clusters: usize) {
    metrics::gauge!("control_plane_snapshot_resources", "type" => "listener").set(listeners as f64);
    metrics::gauge!("control_plane_snapshot_resources", "type" => "cluster").set(clusters as f64);
}

pub fn record_discovery_request(type_label: &'static str, result: &'static str) {
    metrics::counter!(
        "control_plane_discovery_requests_total",
        "type" => type_label,
        "result" => result
    )
    .increment(1);
}

pub fn stream_opened() {
    metrics::gauge!("control_plane_stream_sessions").increment(1.0);
}

pub fn stream_closed() {
    metrics::gauge!("control_plane_stream_sessions").decrement(1.0);
}
