//! Configuration surface consumed by the core from its host, per spec §6.
//!
//! Loading this struct tree from a YAML file on disk is a thin
//! `main.rs`-level convenience (see `load_from_path`) and is explicitly not
//! part of the core (spec §1 lists "YAML configuration loading" as an
//! external collaborator) — all semantic validation happens in
//! `mapping_records()` and in `MappingRegistry::build`.

use std::path::Path;

use serde::Deserialize;

use crate::errors::BridgeError;
use crate::model::{Direction, Mapping, NodeRef, Range, ValueType};

fn default_sampling_interval_ms() -> u32 {
    crate::model::DEFAULT_SAMPLING_INTERVAL_MS
}

fn default_queue_size() -> u32 {
    crate::model::DEFAULT_QUEUE_SIZE
}

fn default_direction() -> String {
    "both".to_string()
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_dedup_ttl_seconds() -> u64 {
    300
}

fn default_dedup_max_entries() -> usize {
    crate::loop_suppression::DEFAULT_CAPACITY
}

fn default_mqtt_topic() -> String {
    "submodels/+/submodelElements/#".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_http_connect_timeout_ms() -> u64 {
    2_000
}

fn default_opc_write_timeout_ms() -> u64 {
    5_000
}

fn default_worker_pool_size() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub opcua: OpcUaSection,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
    pub aas: AasSection,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_http_connect_timeout_ms")]
    pub http_connect_timeout_ms: u64,
    #[serde(default = "default_opc_write_timeout_ms")]
    pub opc_write_timeout_ms: u64,
    #[serde(default = "default_worker_pool_size")]
    pub aas_worker_pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpcUaSection {
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_security_policy")]
    pub security_policy: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

fn default_security_policy() -> String {
    "None".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    pub endpoint_name: String,
    pub opcua_node_id: String,
    pub submodel_id: String,
    pub id_short_path: String,
    pub value_type: String,
    #[serde(default = "default_direction")]
    pub direction: String,
    pub range: Option<RangeConfig>,
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u32,
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RangeConfig {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AasSection {
    #[serde(rename = "type", default = "default_aas_type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub encode_identifiers: bool,
    #[serde(default)]
    pub auto_create_submodels: bool,
    #[serde(default)]
    pub auto_create_elements: bool,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default)]
    pub events: EventsConfig,
}

fn default_aas_type() -> String {
    "memory".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub enabled: bool,
    pub mqtt_url: Option<String>,
    #[serde(default = "default_mqtt_topic")]
    pub mqtt_topic: String,
    #[serde(default = "default_dedup_ttl_seconds")]
    pub dedup_ttl_seconds: u64,
    #[serde(default = "default_dedup_max_entries")]
    pub dedup_max_entries: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mqtt_url: None,
            mqtt_topic: default_mqtt_topic(),
            dedup_ttl_seconds: default_dedup_ttl_seconds(),
            dedup_max_entries: default_dedup_max_entries(),
        }
    }
}

impl BridgeConfig {
    /// Thin convenience for the `main.rs` binary entry point. Not part of
    /// the core per spec §1.
    pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Validates and converts the raw mapping configuration into the
    /// immutable `Mapping` records the Mapping Registry consumes. Polling
    /// is disabled whenever `aas.events.enabled` is true, per spec §9's
    /// resolution of the MQTT-vs-polling open question.
    pub fn mapping_records(&self) -> Result<Vec<Mapping>, BridgeError> {
        self.mappings
            .iter()
            .map(|m| {
                let value_type = ValueType::parse(&m.value_type).ok_or_else(|| {
                    BridgeError::Config(format!("unsupported value type: {}", m.value_type))
                })?;
                let direction = match m.direction.as_str() {
                    "opc->aas" => Direction::OpcToAas,
                    "aas->opc" => Direction::AasToOpc,
                    "both" => Direction::Both,
                    other => {
                        return Err(BridgeError::Config(format!(
                            "unsupported mapping direction: {}",
                            other
                        )))
                    }
                };
                Ok(Mapping {
                    node_ref: NodeRef::new(m.endpoint_name.clone(), m.opcua_node_id.clone()),
                    element_ref: crate::model::ElementRef::new(
                        m.submodel_id.clone(),
                        m.id_short_path.clone(),
                    ),
                    value_type,
                    range: m.range.map(|r| Range { min: r.min, max: r.max }),
                    direction,
                    sampling_interval_ms: m.sampling_interval_ms,
                    queue_size: m.queue_size,
                    nullable: m.nullable,
                })
            })
            .collect()
    }

    pub fn polling_enabled(&self) -> bool {
        !self.aas.events.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
opcua:
  endpoints:
    - name: plc1
      url: "opc.tcp://localhost:4840"
mappings:
  - endpoint_name: plc1
    opcua_node_id: "ns=2;s=Temperature"
    submodel_id: "urn:factory:submodel:sensors"
    id_short_path: Temperature
    value_type: "xs:double"
    direction: "both"
    range:
      min: 0
      max: 100
aas:
  type: memory
  url: "http://localhost:8081"
  poll_interval_seconds: 5
  events:
    enabled: false
"#;

    #[test]
    fn parses_sample_config() {
        let config: BridgeConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        assert_eq!(config.opcua.endpoints.len(), 1);
        assert_eq!(config.mappings.len(), 1);
        assert!(config.polling_enabled());
    }

    #[test]
    fn mapping_records_rejects_unsupported_value_type() {
        let mut config: BridgeConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        config.mappings[0].value_type = "xs:notreal".to_string();
        let result = config.mapping_records();
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn polling_disabled_when_events_enabled() {
        let mut config: BridgeConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        config.aas.events.enabled = true;
        assert!(!config.polling_enabled());
    }
}
