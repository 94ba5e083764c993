//! Monitor: the OPC UA → AAS data-flow engine (spec §4.5). Consumes
//! `DataChangeEvent`s from the Connection Pool's subscriptions, decodes and
//! range-checks them, consults the Loop-Suppression Cache, and writes the
//! result to the AAS Client. Failures are logged and dropped, never
//! retried or queued (spec §4.5 Non-goal: no replay queue).
//!
//! Structured as a single `tokio::spawn`ed consumer loop over an unbounded
//! channel, the same buffering shape as the teacher's `Aggregator::start`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::aas_client::AasClient;
use crate::codec;
use crate::connection_pool::DataChangeEvent;
use crate::errors::BridgeError;
use crate::loop_suppression::LoopSuppressionCache;
use crate::mapping_registry::MappingRegistry;
use crate::metrics::{READINGS_DROPPED, READINGS_FORWARDED, SUPPRESSED_ECHOES};

pub struct Monitor {
    registry: Arc<MappingRegistry>,
    aas_client: Arc<AasClient>,
    cache: Arc<LoopSuppressionCache>,
}

impl Monitor {
    pub fn new(
        registry: Arc<MappingRegistry>,
        aas_client: Arc<AasClient>,
        cache: Arc<LoopSuppressionCache>,
    ) -> Self {
        Self {
            registry,
            aas_client,
            cache,
        }
    }

    /// Consumes data-change events until `events_rx` closes (the
    /// Connection Pool drops every sender on shutdown).
    pub async fn run(&self, mut events_rx: mpsc::UnboundedReceiver<DataChangeEvent>) {
        while let Some(event) = events_rx.recv().await {
            if let Err(err) = self.handle_event(event).await {
                debug!(error = %err, "dropped OPC UA data change");
            }
        }
    }

    async fn handle_event(&self, event: DataChangeEvent) -> Result<(), BridgeError> {
        let endpoint = event.node_ref.endpoint_name.clone();

        let mapping = match self.registry.by_node_ref(&event.node_ref) {
            Some(mapping) => mapping,
            None => {
                READINGS_DROPPED.with_label_values(&[&endpoint, "unmapped"]).inc();
                return Err(BridgeError::Config(format!(
                    "no mapping for node {}",
                    event.node_ref
                )));
            }
        };

        if !mapping.direction.allows_opc_to_aas() {
            READINGS_DROPPED.with_label_values(&[&endpoint, "wrong_direction"]).inc();
            return Ok(());
        }

        let decoded = codec::decode(&event.value, &mapping.value_type, mapping.nullable).map_err(|err| {
            READINGS_DROPPED.with_label_values(&[&endpoint, err.category()]).inc();
            err
        })?;

        codec::check_range(&decoded, &mapping.range).map_err(|err| {
            READINGS_DROPPED.with_label_values(&[&endpoint, err.category()]).inc();
            err
        })?;

        let hash = codec::hash(&decoded);
        if self.cache.contains(&mapping.element_ref, &hash).await {
            SUPPRESSED_ECHOES.with_label_values(&["opc_to_aas"]).inc();
            debug!(element = %mapping.element_ref, "suppressed echo, not forwarding to AAS");
            return Ok(());
        }

        self.aas_client
            .patch_value(&mapping.element_ref.submodel_id, &mapping.element_ref.id_short_path, &decoded)
            .await
            .map_err(|err| {
                READINGS_DROPPED.with_label_values(&[&endpoint, err.category()]).inc();
                warn!(element = %mapping.element_ref, error = %err, "AAS write failed");
                err
            })?;

        self.cache.insert(mapping.element_ref.clone(), hash).await;
        READINGS_FORWARDED.with_label_values(&[&endpoint]).inc();
        Ok(())
    }
}
