//! Sync Manager: lifecycle orchestrator for the bridge (spec §4.7). Starts
//! the Connection Pool, flips the readiness probe once every configured
//! endpoint is connected and the AAS Client is reachable, periodically
//! republishes session/cache gauges, and bounds shutdown to a configurable
//! grace period so a stuck OPC UA disconnect can never hang the process
//! past it — the same start-then-background-health-loop-then-bounded-stop
//! shape as the teacher's `main.rs` + `health::HealthMonitor`, generalized
//! from a per-tenant database pool to this bridge's single OPC UA pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::aas_client::AasClient;
use crate::connection_pool::ConnectionPool;
use crate::loop_suppression::LoopSuppressionCache;
use crate::mapping_registry::MappingRegistry;
use crate::metrics::{ReadinessProbe, ACTIVE_SESSIONS, CACHE_SIZE};

const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct SyncManager {
    pool: Arc<ConnectionPool>,
    cache: Arc<LoopSuppressionCache>,
    aas_client: Arc<AasClient>,
    readiness: ReadinessProbe,
    shutdown_grace: Duration,
    aas_probe_window: Duration,
}

impl SyncManager {
    pub fn new(
        pool: Arc<ConnectionPool>,
        cache: Arc<LoopSuppressionCache>,
        aas_client: Arc<AasClient>,
        readiness: ReadinessProbe,
        shutdown_grace: Duration,
        poll_interval_seconds: u64,
    ) -> Self {
        Self {
            pool,
            cache,
            aas_client,
            readiness,
            shutdown_grace,
            aas_probe_window: Duration::from_secs(poll_interval_seconds.saturating_mul(2)),
        }
    }

    /// Starts the Connection Pool and subscriptions, per spec §4.7's
    /// ordering: connections before the readiness probe flips true.
    pub async fn start(&self, registry: &MappingRegistry) -> Result<(), crate::errors::BridgeError> {
        self.pool.start(registry).await?;
        info!("sync manager started");
        Ok(())
    }

    /// Runs until `shutdown` fires, periodically republishing the
    /// `bridge_active_opc_sessions` and `bridge_loop_suppression_cache_size`
    /// gauges and updating the `/readyz` probe. Readiness requires every
    /// configured endpoint to be `Connected` and the AAS Client's last
    /// probe to have succeeded within `2 * poll_interval_seconds` (spec
    /// §4.7). The AAS probe is issued on every tick here rather than
    /// relying on incidental read/write traffic, so freshness reflects
    /// actual reachability rather than how busy the bridge happens to be.
    pub async fn run_health_loop(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(READINESS_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let connected = self.pool.connected_count().await;
            let total = self.pool.endpoint_count();
            ACTIVE_SESSIONS.with_label_values(&["all"]).set(connected as f64);
            CACHE_SIZE.set(self.cache.len().await as f64);

            self.aas_client.probe().await;
            let aas_fresh = self
                .aas_client
                .last_probe_age()
                .await
                .is_some_and(|age| age <= self.aas_probe_window);

            let all_connected = total == 0 || connected == total;
            let ready = all_connected && aas_fresh;
            self.readiness.set_ready(ready).await;
        }
    }

    /// Stops the Connection Pool, bounded by `shutdown_grace`. A timeout
    /// here means some endpoint's blocking disconnect call is stuck; the
    /// process proceeds to exit anyway rather than hang indefinitely.
    pub async fn stop(&self) {
        self.readiness.set_ready(false).await;
        match timeout(self.shutdown_grace, self.pool.stop()).await {
            Ok(()) => info!("sync manager stopped cleanly"),
            Err(_) => warn!(
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "shutdown grace period elapsed before all OPC UA sessions stopped"
            ),
        }
    }
}
