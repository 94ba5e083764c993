//! Controller: the AAS → OPC UA data-flow engine (spec §4.6). Consumes
//! `AasChangeEvent`s (from MQTT or polling), decodes and range-checks them,
//! consults the Loop-Suppression Cache, writes to the OPC UA Connection
//! Pool, and always emits an `AuditRecord` regardless of outcome.
//!
//! Identity propagation is best-effort: this `opcua` client version binds
//! a `UserIdentityToken` at session-connect time rather than per call, so
//! there is no per-write caller identity to forward from an AAS change
//! event. `AuditRecord::user_id` is left `None` here (see DESIGN.md).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::aas_client::mqtt::AasChangeEvent;
use crate::audit::AuditSink;
use crate::codec;
use crate::connection_pool::ConnectionPool;
use crate::errors::BridgeError;
use crate::loop_suppression::LoopSuppressionCache;
use crate::mapping_registry::MappingRegistry;
use crate::metrics::{OPC_WRITES, SUPPRESSED_ECHOES};
use crate::model::{AuditOutcome, AuditRecord, Direction};

pub struct Controller {
    registry: Arc<MappingRegistry>,
    pool: Arc<ConnectionPool>,
    cache: Arc<LoopSuppressionCache>,
    audit: Arc<dyn AuditSink>,
}

impl Controller {
    pub fn new(
        registry: Arc<MappingRegistry>,
        pool: Arc<ConnectionPool>,
        cache: Arc<LoopSuppressionCache>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            pool,
            cache,
            audit,
        }
    }

    pub async fn run(&self, mut events_rx: mpsc::UnboundedReceiver<AasChangeEvent>) {
        while let Some(event) = events_rx.recv().await {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&self, event: AasChangeEvent) {
        let mapping = match self.registry.by_element_ref(&event.element_ref) {
            Some(mapping) => mapping.clone(),
            None => {
                debug!(element = %event.element_ref, "no mapping for AAS element, ignoring");
                return;
            }
        };

        if !mapping.direction.allows_aas_to_opc() {
            return;
        }

        if let Err(err) = self.process(&event, &mapping).await {
            warn!(element = %event.element_ref, error = %err, "AAS-to-OPC write not applied");
        }
    }

    async fn process(
        &self,
        event: &AasChangeEvent,
        mapping: &crate::model::Mapping,
    ) -> Result<(), BridgeError> {
        let decoded = match crate::aas_client::json_to_xsd(&event.raw_value, &mapping.value_type, mapping.nullable) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.audit_rejected(mapping, &err).await;
                return Err(err);
            }
        };

        if let Err(err) = codec::check_range(&decoded, &mapping.range) {
            self.audit_rejected(mapping, &err).await;
            return Err(err);
        }

        let hash = codec::hash(&decoded);
        if self.cache.contains(&mapping.element_ref, &hash).await {
            SUPPRESSED_ECHOES.with_label_values(&["aas_to_opc"]).inc();
            debug!(element = %event.element_ref, "suppressed echo, not writing to OPC UA");
            return Ok(());
        }

        let variant = codec::encode(&decoded, &mapping.value_type)?;

        let write_result = self
            .pool
            .write_value(&mapping.node_ref.endpoint_name, &mapping.node_ref.node_id, variant)
            .await;

        let outcome = match &write_result {
            Ok(()) => AuditOutcome::Accepted,
            Err(BridgeError::Opc(opc_err)) if !opc_err.is_retryable() => {
                AuditOutcome::Rejected(opc_err.to_string())
            }
            Err(_) => AuditOutcome::Deferred,
        };

        OPC_WRITES
            .with_label_values(&[
                &mapping.node_ref.endpoint_name,
                match outcome {
                    AuditOutcome::Accepted => "accepted",
                    AuditOutcome::Rejected(_) => "rejected",
                    AuditOutcome::Deferred => "deferred",
                },
            ])
            .inc();

        self.audit
            .record(AuditRecord::new(
                Direction::AasToOpc,
                mapping.node_ref.clone(),
                mapping.element_ref.clone(),
                None,
                Some(format!("{:?}", decoded)),
                None,
                outcome,
            ))
            .await;

        if write_result.is_ok() {
            self.cache.insert(mapping.element_ref.clone(), hash).await;
        }

        write_result
    }

    /// Records a `Rejected` audit for a decode/range failure caught before
    /// any OPC UA write is attempted (spec §4.6 steps 2-3).
    async fn audit_rejected(&self, mapping: &crate::model::Mapping, err: &BridgeError) {
        self.audit
            .record(AuditRecord::new(
                Direction::AasToOpc,
                mapping.node_ref.clone(),
                mapping.element_ref.clone(),
                None,
                None,
                None,
                AuditOutcome::Rejected(err.to_string()),
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex as TokioMutex;

    use crate::connection_pool::ConnectionPool;
    use crate::mapping_registry::MappingRegistry;
    use crate::model::{ElementRef, Mapping, NodeRef, Range, ValueType};

    struct RecordingAuditSink {
        records: TokioMutex<Vec<AuditRecord>>,
    }

    impl RecordingAuditSink {
        fn new() -> Self {
            Self { records: TokioMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl AuditSink for RecordingAuditSink {
        async fn record(&self, record: AuditRecord) {
            self.records.lock().await.push(record);
        }
    }

    fn mapping(value_type: ValueType, range: Option<Range>) -> Mapping {
        Mapping {
            node_ref: NodeRef::new("plc1", "ns=2;s=Temperature"),
            element_ref: ElementRef::new("urn:factory:submodel:sensors", "Temperature"),
            value_type,
            range,
            direction: Direction::Both,
            sampling_interval_ms: crate::model::DEFAULT_SAMPLING_INTERVAL_MS,
            queue_size: crate::model::DEFAULT_QUEUE_SIZE,
            nullable: false,
        }
    }

    fn controller_with(registry: MappingRegistry, audit: Arc<RecordingAuditSink>) -> Controller {
        let (opc_tx, _opc_rx) = mpsc::unbounded_channel();
        let pool = Arc::new(ConnectionPool::new(&[], opc_tx));
        let cache = Arc::new(LoopSuppressionCache::new(
            crate::loop_suppression::DEFAULT_CAPACITY,
            std::time::Duration::from_secs(60),
        ));
        Controller::new(Arc::new(registry), pool, cache, audit)
    }

    /// Scenario S4: a non-numeric value against a `Double` mapping must
    /// produce a `Rejected(TypeError)` audit, not silently drop.
    #[tokio::test]
    async fn type_error_produces_rejected_audit() {
        let mapping = mapping(ValueType::Double, None);
        let registry = MappingRegistry::build(vec![mapping.clone()]).unwrap();
        let audit = Arc::new(RecordingAuditSink::new());
        let controller = controller_with(registry, audit.clone());

        let event = AasChangeEvent {
            element_ref: mapping.element_ref.clone(),
            raw_value: serde_json::json!("not-a-number"),
        };

        let result = controller.process(&event, &mapping).await;
        assert!(result.is_err());

        let records = audit.records.lock().await;
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0].outcome, AuditOutcome::Rejected(ref reason) if reason.contains("type")));
    }

    /// Scenario S3: an in-range-typed but out-of-range value must produce a
    /// `Rejected(RangeError)` audit, not silently drop.
    #[tokio::test]
    async fn range_error_produces_rejected_audit() {
        let mapping = mapping(ValueType::Double, Some(Range { min: 0.0, max: 100.0 }));
        let registry = MappingRegistry::build(vec![mapping.clone()]).unwrap();
        let audit = Arc::new(RecordingAuditSink::new());
        let controller = controller_with(registry, audit.clone());

        let event = AasChangeEvent {
            element_ref: mapping.element_ref.clone(),
            raw_value: serde_json::json!(999.0),
        };

        let result = controller.process(&event, &mapping).await;
        assert!(result.is_err());

        let records = audit.records.lock().await;
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0].outcome, AuditOutcome::Rejected(ref reason) if reason.contains("range")));
    }
}
