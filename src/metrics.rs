//! Prometheus metrics for the Teams sender.
//!
//! Exposes:
//! - `teams_sender_deliveries_total` (counter by outcome)
//! - `teams_sender_run_duration_seconds` (histogram)
//! - `teams_sender_runs_total` (counter by status)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram, register_int_counter_vec, Encoder, Histogram,
    IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "teams_sender_deliveries_total",
        "Recipients processed by delivery outcome",
        &["outcome"]
    )
    .expect("failed to register deliveries counter")
});

static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    // Exponential buckets from 100ms up to ~27 minutes.
    let buckets =
        prometheus::exponential_buckets(0.1, 2.0, 15).expect("failed to create histogram buckets");
    register_histogram!(
        "teams_sender_run_duration_seconds",
        "Duration of a send run in seconds",
        buckets
    )
    .expect("failed to register run duration histogram")
});

static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "teams_sender_runs_total",
        "Send runs by status",
        &["status"]
    )
    .expect("failed to register runs counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&DELIVERIES_TOTAL);
    Lazy::force(&RUN_DURATION);
    Lazy::force(&RUNS_TOTAL);
}

/// Count one processed recipient.
pub fn record_delivery(outcome: &'static str) {
    init_collectors();
    DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record run completion with duration and status.
pub fn record_run_result(duration: Duration, success: bool) {
    init_collectors();
    RUN_DURATION.observe(duration.as_secs_f64());
    RUNS_TOTAL
        .with_label_values(&[if success { "ok" } else { "error" }])
        .inc();
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
