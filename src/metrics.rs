//! Prometheus metrics plus the health/readiness HTTP surface (spec §10.4),
//! grounded directly on the teacher's `metrics.rs`: the same
//! `lazy_static!` + `register_*_vec!` registration style and the same
//! axum-served `/metrics` endpoint, extended with `/healthz` and `/readyz`
//! since this bridge (unlike the teacher) needs a readiness probe that
//! reflects live OPC UA session and AAS connectivity state.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Encoder, Gauge,
    GaugeVec, TextEncoder,
};
use tokio::sync::RwLock;

lazy_static! {
    pub static ref READINGS_FORWARDED: CounterVec = register_counter_vec!(
        "bridge_readings_forwarded_total",
        "Total number of OPC UA data changes successfully forwarded to AAS",
        &["endpoint"]
    )
    .unwrap();

    pub static ref READINGS_DROPPED: CounterVec = register_counter_vec!(
        "bridge_readings_dropped_total",
        "Total number of OPC UA data changes dropped without being forwarded",
        &["endpoint", "reason"]
    )
    .unwrap();

    pub static ref AAS_WRITES: CounterVec = register_counter_vec!(
        "bridge_aas_writes_total",
        "Total number of AAS $value PATCH attempts",
        &["outcome"]
    )
    .unwrap();

    pub static ref AAS_READS: CounterVec = register_counter_vec!(
        "bridge_aas_reads_total",
        "Total number of AAS $value GET attempts",
        &["outcome"]
    )
    .unwrap();

    pub static ref OPC_WRITES: CounterVec = register_counter_vec!(
        "bridge_opc_writes_total",
        "Total number of OPC UA write attempts",
        &["endpoint", "outcome"]
    )
    .unwrap();

    pub static ref OPC_RECONNECTS: CounterVec = register_counter_vec!(
        "bridge_opc_reconnects_total",
        "Total number of OPC UA reconnect attempts",
        &["endpoint"]
    )
    .unwrap();

    pub static ref SUPPRESSED_ECHOES: CounterVec = register_counter_vec!(
        "bridge_suppressed_echoes_total",
        "Total number of changes suppressed as feedback-loop echoes",
        &["direction"]
    )
    .unwrap();

    pub static ref AUDIT_OUTCOMES: CounterVec = register_counter_vec!(
        "bridge_audit_outcomes_total",
        "Total number of audit records produced, by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref ACTIVE_SESSIONS: GaugeVec = register_gauge_vec!(
        "bridge_active_opc_sessions",
        "Number of OPC UA sessions currently in the Connected state",
        &["endpoint"]
    )
    .unwrap();

    pub static ref CACHE_SIZE: Gauge = register_gauge!(
        "bridge_loop_suppression_cache_size",
        "Current number of entries in the loop-suppression cache"
    )
    .unwrap();
}

/// Shared readiness flag, flipped by the Sync Manager once every configured
/// OPC UA endpoint is connected and the AAS Client's last probe is fresh.
#[derive(Clone)]
pub struct ReadinessProbe {
    ready: Arc<RwLock<bool>>,
}

impl ReadinessProbe {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MetricsServer {
    port: u16,
    readiness: ReadinessProbe,
}

impl MetricsServer {
    pub fn new(port: u16, readiness: ReadinessProbe) -> Self {
        Self { port, readiness }
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/healthz", get(healthz_handler))
            .route("/readyz", get(readyz_handler))
            .with_state(self.readiness);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

async fn healthz_handler() -> StatusCode {
    StatusCode::OK
}

async fn readyz_handler(State(readiness): State<ReadinessProbe>) -> StatusCode {
    if readiness.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
