//! Metrics and tracing setup for auction replicas and bidders.
//!
//! Provides a global [`AuctionMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

static METRICS: OnceLock<AuctionMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static AuctionMetrics {
    METRICS.get_or_init(AuctionMetrics::new)
}

/// All Prometheus metrics for an auction process.
///
/// Replicas fill the `bids_*` and `rpcs_received*` families; bidders fill
/// the `rpcs_sent*`, `rounds*`, `evictions` and `connects` families.
pub struct AuctionMetrics {
    pub registry: Registry,

    // ── RPC counters ──
    pub rpcs_sent: IntCounter,
    pub rpcs_received: IntCounter,
    pub rpcs_sent_by_type: IntCounterVec,
    pub rpcs_received_by_type: IntCounterVec,
    pub rpc_failures_by_type: IntCounterVec,

    // ── RPC latency ──
    pub rpc_latency_secs: HistogramVec,

    // ── Replica state machine ──
    pub bids_accepted: IntCounter,
    pub bids_rejected: IntCounterVec,

    // ── Bidder ──
    pub rounds: IntCounter,
    pub failed_rounds: IntCounter,
    pub bids_placed: IntCounter,
    pub evictions: IntCounter,
    pub connects: IntCounter,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for AuctionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionMetrics").finish_non_exhaustive()
    }
}

/// Default histogram buckets (seconds) for RPC latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help)).expect("valid counter opts")
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help), labels).expect("valid counter vec opts")
}

impl AuctionMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let rpcs_sent = counter("auction_rpcs_sent_total", "Total outbound RPCs sent");
        let rpcs_received = counter("auction_rpcs_received_total", "Total inbound RPCs received");
        let rpcs_sent_by_type = counter_vec(
            "auction_rpcs_sent_by_type_total",
            "Outbound RPCs sent, by type",
            &["rpc_type"],
        );
        let rpcs_received_by_type = counter_vec(
            "auction_rpcs_received_by_type_total",
            "Inbound RPCs received, by type",
            &["rpc_type"],
        );
        let rpc_failures_by_type = counter_vec(
            "auction_rpc_failures_total",
            "Outbound RPCs that failed or timed out, by type",
            &["rpc_type"],
        );

        let rpc_latency_secs = HistogramVec::new(
            HistogramOpts::new("auction_rpc_latency_seconds", "RPC latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["rpc_type", "direction"],
        )
        .expect("rpc_latency_secs histogram");

        let bids_accepted = counter("auction_bids_accepted_total", "Bids accepted by this replica");
        let bids_rejected = counter_vec(
            "auction_bids_rejected_total",
            "Bids rejected by this replica, by reason",
            &["reason"],
        );

        let rounds = counter("auction_bidding_rounds_total", "Bidding rounds started");
        let failed_rounds = counter(
            "auction_bidding_rounds_failed_total",
            "Bidding rounds where no replica answered",
        );
        let bids_placed = counter(
            "auction_bids_placed_total",
            "Candidate bids broadcast by this bidder",
        );
        let evictions = counter(
            "auction_replica_evictions_total",
            "Replica connections dropped after a failed RPC",
        );
        let connects = counter(
            "auction_replica_connects_total",
            "Replica connections established",
        );

        // Register all metrics
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(rpcs_sent.clone()),
            Box::new(rpcs_received.clone()),
            Box::new(rpcs_sent_by_type.clone()),
            Box::new(rpcs_received_by_type.clone()),
            Box::new(rpc_failures_by_type.clone()),
            Box::new(rpc_latency_secs.clone()),
            Box::new(bids_accepted.clone()),
            Box::new(bids_rejected.clone()),
            Box::new(rounds.clone()),
            Box::new(failed_rounds.clone()),
            Box::new(bids_placed.clone()),
            Box::new(evictions.clone()),
            Box::new(connects.clone()),
        ];
        for collector in collectors {
            registry.register(collector).expect("register metric");
        }

        Self {
            registry,
            rpcs_sent,
            rpcs_received,
            rpcs_sent_by_type,
            rpcs_received_by_type,
            rpc_failures_by_type,
            rpc_latency_secs,
            bids_accepted,
            bids_rejected,
            rounds,
            failed_rounds,
            bids_placed,
            evictions,
            connects,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Count an RPC and start its latency timer. Returns a guard that records
/// elapsed time on drop.
pub fn start_rpc_timer(rpc_type: &str, direction: &str) -> prometheus::HistogramTimer {
    let m = metrics();
    if direction == "inbound" {
        m.rpcs_received.inc();
        m.rpcs_received_by_type.with_label_values(&[rpc_type]).inc();
    } else {
        m.rpcs_sent.inc();
        m.rpcs_sent_by_type.with_label_values(&[rpc_type]).inc();
    }
    m.rpc_latency_secs
        .with_label_values(&[rpc_type, direction])
        .start_timer()
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let body = encode_metrics();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("valid HTTP response"))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

/// Spawn [`serve_metrics`] on `0.0.0.0:<port>` if a port is configured.
pub fn spawn_metrics_server(port: Option<u16>) {
    let Some(port) = port else {
        return;
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tokio::spawn(async move {
        if let Err(e) = serve_metrics(addr).await {
            tracing::warn!("metrics server failed: {}", e);
        }
    });
}

// ────────────────────────── Tests ──────────────────────────
