use crate::error::SecwatchError;
use anyhow::Result;
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static FRAMES_RECEIVED: LazyLock<Counter> =
    LazyLock::new(|| counter!("secwatch_frames_received_total"));
pub static PARSE_ERRORS: LazyLock<Counter> =
    LazyLock::new(|| counter!("secwatch_parse_errors_total"));
pub static HANDLER_PANICS: LazyLock<Counter> =
    LazyLock::new(|| counter!("secwatch_handler_panics_total"));
pub static RECONNECTS: LazyLock<Counter> =
    LazyLock::new(|| counter!("secwatch_reconnects_total"));
pub static SENDS_REJECTED: LazyLock<Counter> =
    LazyLock::new(|| counter!("secwatch_sends_rejected_total"));
pub static NOTIFICATIONS_EVICTED: LazyLock<Counter> =
    LazyLock::new(|| counter!("secwatch_notifications_evicted_total"));
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("secwatch_connected"));

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "secwatch")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_handle) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            FRAMES_RECEIVED.absolute(0);
            PARSE_ERRORS.absolute(0);
            HANDLER_PANICS.absolute(0);
            RECONNECTS.absolute(0);
            SENDS_REJECTED.absolute(0);
            NOTIFICATIONS_EVICTED.absolute(0);
            CONNECTED_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(SecwatchError::Metrics(e.to_string()).into())
        }
    }
}
