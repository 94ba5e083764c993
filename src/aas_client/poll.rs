//! HTTP polling fallback for AAS change detection, used whenever MQTT
//! events are disabled (spec §4.3, §9: polling and MQTT are mutually
//! exclusive — enabling `aas.events` turns polling off for every mapping).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{AasClient, mqtt::AasChangeEvent};
use crate::mapping_registry::MappingRegistry;

/// Polls every aas-to-opc mapping's current value on a fixed interval and
/// emits a change event whenever it differs from the last observed value.
/// `AasChangeEvent` is reused so the Controller has a single ingestion path
/// regardless of which fallback produced the event.
pub struct Poller {
    client: Arc<AasClient>,
    registry: Arc<MappingRegistry>,
    interval: Duration,
}

impl Poller {
    pub fn new(client: Arc<AasClient>, registry: Arc<MappingRegistry>, interval: Duration) -> Self {
        Self {
            client,
            registry,
            interval,
        }
    }

    /// Runs until `shutdown` resolves. Intended to be driven by
    /// `tokio::spawn`, per the Sync Manager's lifecycle (spec §4.7).
    pub async fn run(&self, events_tx: mpsc::UnboundedSender<AasChangeEvent>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut last_seen: std::collections::HashMap<(String, String), Vec<u8>> = std::collections::HashMap::new();
        let mut ticker = tokio::time::interval(self.interval);

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

            for mapping in self.registry.all() {
                if !mapping.direction.allows_aas_to_opc() {
                    continue;
                }

                let submodel_id = mapping.element_ref.submodel_id.clone();
                let id_short_path = mapping.element_ref.id_short_path.clone();

                match self
                    .client
                    .get_value(&submodel_id, &id_short_path, &mapping.value_type, mapping.nullable)
                    .await
                {
                    Ok(value) => {
                        let hash = crate::codec::hash(&value);
                        let key = (submodel_id.clone(), id_short_path.clone());
                        let changed = last_seen.get(&key).map(|prev| prev != &hash).unwrap_or(true);
                        if changed {
                            last_seen.insert(key, hash);
                            let raw_value = super::xsd_to_json(&value);
                            if events_tx
                                .send(AasChangeEvent {
                                    element_ref: mapping.element_ref.clone(),
                                    raw_value,
                                })
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        debug!(element = %mapping.element_ref, error = %err, "AAS poll failed");
                    }
                }
            }
        }

        warn!("AAS poller stopped");
    }
}
