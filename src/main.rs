//! # OPC UA ⇄ AAS Synchronization Bridge
//!
//! Bidirectionally synchronizes tag values between an industrial OPC UA
//! server and an Asset Administration Shell (AAS) repository.
//!
//! ## Architecture
//!
//! ```text
//! OPC UA Server --(subscribe)--> Connection Pool --> Monitor --> AAS Client --> AAS Repository
//! OPC UA Server <--(write)------ Connection Pool <-- Controller <-- AAS Client <-- MQTT/poll
//! ```
//!
//! ## Responsibilities
//!
//! 1. Maintain OPC UA sessions and subscriptions per configured endpoint.
//! 2. Forward OPC UA data changes to AAS submodel elements (Monitor).
//! 3. Forward AAS submodel element changes to OPC UA writes (Controller).
//! 4. Suppress feedback loops created by the two directions above.
//! 5. Expose Prometheus metrics and a health/readiness endpoint.
//!
//! ## NOT Responsible For
//!
//! - CLI argument parsing beyond a single config file path.
//! - Generating the OPC 30270 address space or AAS submodel templates.
//! - Persisting readings or audit records to a database.

mod aas_client;
mod audit;
mod backoff;
mod codec;
mod config;
mod connection_pool;
mod controller;
mod errors;
mod loop_suppression;
mod mapping_registry;
mod metrics;
mod model;
mod monitor;
mod sync_manager;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aas_client::mqtt::MqttIngress;
use aas_client::poll::Poller;
use aas_client::AasClient;
use audit::{AuditSink, TracingAuditSink};
use config::BridgeConfig;
use connection_pool::{ConnectionPool, DataChangeEvent};
use controller::Controller;
use loop_suppression::LoopSuppressionCache;
use mapping_registry::MappingRegistry;
use metrics::{MetricsServer, ReadinessProbe};
use monitor::Monitor;
use sync_manager::SyncManager;

const EXIT_OK: i32 = 0;
const EXIT_CONFIG_INVALID: i32 = 1;
const EXIT_OPC_AUTH_FAILURE: i32 = 2;
const EXIT_AAS_AUTH_FAILURE: i32 = 3;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opcua_aas_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    info!(
        "Starting OPC UA <-> AAS synchronization bridge v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let config = match BridgeConfig::load_from_path(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, path = %config_path, "failed to load configuration");
            return EXIT_CONFIG_INVALID;
        }
    };

    let mappings = match config.mapping_records() {
        Ok(mappings) => mappings,
        Err(err) => {
            error!(error = %err, "invalid mapping configuration");
            return EXIT_CONFIG_INVALID;
        }
    };

    let registry = match MappingRegistry::build(mappings) {
        Ok(registry) => Arc::new(registry),
        Err(err) => {
            error!(error = %err, "invalid mapping registry");
            return EXIT_CONFIG_INVALID;
        }
    };
    info!(mappings = registry.len(), "loaded mapping registry");

    let aas_client = match AasClient::new(
        config.aas.url.clone(),
        config.aas.encode_identifiers,
        config.aas.auto_create_submodels,
        config.aas.auto_create_elements,
        Duration::from_millis(config.http_connect_timeout_ms),
        Duration::from_millis(config.http_timeout_ms),
    ) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            error!(error = %err, "failed to build AAS client");
            return EXIT_CONFIG_INVALID;
        }
    };

    if let Err(err) = probe_aas(&aas_client, &registry).await {
        error!(error = %err, "AAS startup probe failed");
        return EXIT_AAS_AUTH_FAILURE;
    }

    let cache = Arc::new(LoopSuppressionCache::new(
        config.aas.events.dedup_max_entries,
        Duration::from_secs(config.aas.events.dedup_ttl_seconds),
    ));

    let (opc_events_tx, opc_events_rx) = tokio::sync::mpsc::unbounded_channel::<DataChangeEvent>();
    let pool = Arc::new(ConnectionPool::new(&config.opcua.endpoints, opc_events_tx));

    let monitor = Monitor::new(registry.clone(), aas_client.clone(), cache.clone());
    let monitor_task = tokio::spawn(async move { monitor.run(opc_events_rx).await });

    let (aas_events_tx, aas_events_rx) = tokio::sync::mpsc::unbounded_channel();
    let audit_sink: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let controller = Controller::new(registry.clone(), pool.clone(), cache.clone(), audit_sink);
    let controller_task = tokio::spawn(async move { controller.run(aas_events_rx).await });

    let (poll_shutdown_tx, poll_shutdown_rx) = tokio::sync::watch::channel(false);

    let mqtt_ingress = if config.aas.events.enabled {
        match &config.aas.events.mqtt_url {
            Some(mqtt_url) => {
                match MqttIngress::connect(mqtt_url, &config.aas.events.mqtt_topic, aas_events_tx.clone()) {
                    Ok(ingress) => Some(ingress),
                    Err(err) => {
                        error!(error = %err, "failed to connect MQTT ingress, AAS changes will not be observed");
                        None
                    }
                }
            }
            None => {
                error!("aas.events.enabled is true but no mqtt_url configured");
                None
            }
        }
    } else {
        None
    };

    let poller_task = if config.polling_enabled() {
        let poller = Poller::new(
            aas_client.clone(),
            registry.clone(),
            Duration::from_secs(config.aas.poll_interval_seconds),
        );
        let shutdown_rx = poll_shutdown_rx.clone();
        let tx = aas_events_tx.clone();
        Some(tokio::spawn(async move { poller.run(tx, shutdown_rx).await }))
    } else {
        None
    };

    let readiness = ReadinessProbe::new();
    let metrics_server = MetricsServer::new(config.metrics_port, readiness.clone());
    tokio::spawn(async move {
        if let Err(err) = metrics_server.serve().await {
            error!(error = %err, "metrics server error");
        }
    });
    info!(port = config.metrics_port, "metrics/health server listening");

    let sync_manager = Arc::new(SyncManager::new(
        pool.clone(),
        cache.clone(),
        aas_client.clone(),
        readiness.clone(),
        Duration::from_millis(config.shutdown_grace_ms),
        config.aas.poll_interval_seconds,
    ));

    if let Err(err) = sync_manager.start(&registry).await {
        error!(error = %err, "failed to start OPC UA connection pool");
        return EXIT_OPC_AUTH_FAILURE;
    }

    let (health_shutdown_tx, health_shutdown_rx) = tokio::sync::watch::channel(false);
    let health_task = {
        let sync_manager = sync_manager.clone();
        tokio::spawn(async move { sync_manager.run_health_loop(health_shutdown_rx).await })
    };

    info!("bridge ready. listening for shutdown signals (SIGTERM, SIGINT)");
    await_shutdown_signal().await;
    info!("shutdown signal received, stopping gracefully");

    let _ = poll_shutdown_tx.send(true);
    let _ = health_shutdown_tx.send(true);
    if let Some(ingress) = &mqtt_ingress {
        ingress.disconnect().await;
    }

    sync_manager.stop().await;

    monitor_task.abort();
    controller_task.abort();
    if let Some(task) = poller_task {
        task.abort();
    }
    health_task.abort();

    info!("OPC UA <-> AAS synchronization bridge stopped");
    EXIT_OK
}

/// Confirms the AAS repository is reachable before declaring startup
/// successful, per spec §6's fatal-AAS-authentication exit code. Reads the
/// first mapping's current value (if any mapping exists) as the probe.
async fn probe_aas(aas_client: &AasClient, registry: &MappingRegistry) -> Result<(), errors::BridgeError> {
    let Some(mapping) = registry.all().first() else {
        return Ok(());
    };
    match aas_client
        .get_value(
            &mapping.element_ref.submodel_id,
            &mapping.element_ref.id_short_path,
            &mapping.value_type,
            true,
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(errors::BridgeError::Http(errors::HttpError::NotFound)) => Ok(()),
        Err(err) => Err(err),
    }
}

async fn await_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("SIGINT received"); }
        _ = terminate => { info!("SIGTERM received"); }
    }
}
