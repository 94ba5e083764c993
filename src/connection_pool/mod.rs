//! Connection Pool: one `EndpointSession` per configured OPC UA endpoint,
//! with independent reconnect state machines (spec §4.2).

mod session;

pub use session::{DataChangeEvent, EndpointSession};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::EndpointConfig;
use crate::errors::BridgeError;
use crate::mapping_registry::MappingRegistry;
use crate::model::{NodeRef, SessionState};
use opcua::types::Variant;

/// Shared via `Arc<ConnectionPool>` by the Sync Manager (which calls
/// `start`/`stop`) and the Controller (which calls `write_value`), so
/// lifecycle bookkeeping lives behind an internal `Mutex` rather than
/// requiring `&mut self`.
pub struct ConnectionPool {
    endpoints: HashMap<String, Arc<EndpointSession>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionPool {
    pub fn new(
        endpoint_configs: &[EndpointConfig],
        events_tx: mpsc::UnboundedSender<DataChangeEvent>,
    ) -> Self {
        let endpoints = endpoint_configs
            .iter()
            .map(|config| {
                (
                    config.name.clone(),
                    Arc::new(EndpointSession::new(config.clone(), events_tx.clone())),
                )
            })
            .collect();

        Self {
            endpoints,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Records each endpoint's subscription spec, then spawns the
    /// reconnect loop for every endpoint. `EndpointSession::run` submits
    /// the subscription itself on every `Connected` transition — the
    /// initial connect and every later reconnect alike — so the pool never
    /// has to gate on session state here (spec §4.2: "the pool re-creates
    /// the subscription on reconnect transparently").
    pub async fn start(&self, registry: &MappingRegistry) -> Result<(), BridgeError> {
        for (name, endpoint) in &self.endpoints {
            let mut node_ids: Vec<(NodeRef, String)> = Vec::new();
            for mapping in registry.all() {
                if mapping.node_ref.endpoint_name == *name && mapping.direction.allows_opc_to_aas() {
                    node_ids.push((mapping.node_ref.clone(), mapping.node_ref.node_id.clone()));
                }
            }
            endpoint.set_node_ids(node_ids).await;
        }

        let mut tasks = self.tasks.lock().await;
        for (name, endpoint) in &self.endpoints {
            let endpoint = endpoint.clone();
            let name = name.clone();
            tasks.push(tokio::spawn(async move {
                info!(endpoint = %name, "starting OPC UA connection loop");
                endpoint.run().await;
            }));
        }

        Ok(())
    }

    pub fn endpoint(&self, name: &str) -> Option<Arc<EndpointSession>> {
        self.endpoints.get(name).cloned()
    }

    pub async fn write_value(
        &self,
        endpoint_name: &str,
        node_id: &str,
        value: Variant,
    ) -> Result<(), BridgeError> {
        let endpoint = self
            .endpoints
            .get(endpoint_name)
            .ok_or_else(|| BridgeError::Config(format!("unknown endpoint: {}", endpoint_name)))?;
        endpoint.write_value(node_id, value).await
    }

    pub async fn connected_count(&self) -> usize {
        let mut count = 0;
        for endpoint in self.endpoints.values() {
            if endpoint.state().await == SessionState::Connected {
                count += 1;
            }
        }
        count
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub async fn stop(&self) {
        for endpoint in self.endpoints.values() {
            endpoint.stop().await;
        }
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
    }
}
