//! Core data model: NodeRef, ElementRef, ValueType, Mapping, Session state,
//! and the AuditRecord produced by the Controller on every write attempt.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifies an OPC UA node by endpoint and canonical textual NodeId
/// (`ns=<u16>;<i|s|g|b>=<payload>`). Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub endpoint_name: String,
    pub node_id: String,
}

impl NodeRef {
    pub fn new(endpoint_name: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            node_id: node_id.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.endpoint_name, self.node_id)
    }
}

/// Identifies an AAS submodel element by submodel id and slash-separated
/// idShort path. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub submodel_id: String,
    pub id_short_path: String,
}

impl ElementRef {
    pub fn new(submodel_id: impl Into<String>, id_short_path: impl Into<String>) -> Self {
        Self {
            submodel_id: submodel_id.into(),
            id_short_path: id_short_path.into(),
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.submodel_id, self.id_short_path)
    }
}

/// Closed enumeration of XSD types recognized by the Type Codec, under the
/// OPC 30270 (I4AAS) conventions. Arrays nest one level (the spec does not
/// require nested arrays of arrays).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    Float,
    Double,
    String,
    DateTime,
    Duration,
    Base64Binary,
    Array(Box<ValueType>),
}

impl ValueType {
    pub fn xsd_name(&self) -> String {
        match self {
            ValueType::Boolean => "xs:boolean".into(),
            ValueType::Byte => "xs:byte".into(),
            ValueType::UnsignedByte => "xs:unsignedByte".into(),
            ValueType::Short => "xs:short".into(),
            ValueType::UnsignedShort => "xs:unsignedShort".into(),
            ValueType::Int => "xs:int".into(),
            ValueType::UnsignedInt => "xs:unsignedInt".into(),
            ValueType::Long => "xs:long".into(),
            ValueType::UnsignedLong => "xs:unsignedLong".into(),
            ValueType::Float => "xs:float".into(),
            ValueType::Double => "xs:double".into(),
            ValueType::String => "xs:string".into(),
            ValueType::DateTime => "xs:dateTime".into(),
            ValueType::Duration => "xs:duration".into(),
            ValueType::Base64Binary => "xs:base64Binary".into(),
            ValueType::Array(inner) => format!("{}[]", inner.xsd_name()),
        }
    }

    /// Parse the recognized `xs:*` names plus an optional trailing `[]` for
    /// arrays, per spec §3.
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(stripped) = s.strip_suffix("[]") {
            return Some(ValueType::Array(Box::new(ValueType::parse(stripped)?)));
        }
        Some(match s {
            "xs:boolean" => ValueType::Boolean,
            "xs:byte" => ValueType::Byte,
            "xs:unsignedByte" => ValueType::UnsignedByte,
            "xs:short" => ValueType::Short,
            "xs:unsignedShort" => ValueType::UnsignedShort,
            "xs:int" => ValueType::Int,
            "xs:unsignedInt" => ValueType::UnsignedInt,
            "xs:long" => ValueType::Long,
            "xs:unsignedLong" => ValueType::UnsignedLong,
            "xs:float" => ValueType::Float,
            "xs:double" => ValueType::Double,
            "xs:string" => ValueType::String,
            "xs:dateTime" => ValueType::DateTime,
            "xs:duration" => ValueType::Duration,
            "xs:base64Binary" => ValueType::Base64Binary,
            _ => return None,
        })
    }
}

/// Direction a Mapping is active in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    OpcToAas,
    AasToOpc,
    Both,
}

impl Direction {
    pub fn allows_opc_to_aas(&self) -> bool {
        matches!(self, Direction::OpcToAas | Direction::Both)
    }

    pub fn allows_aas_to_opc(&self) -> bool {
        matches!(self, Direction::AasToOpc | Direction::Both)
    }
}

/// Inclusive numeric range applied after coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// A binding between an OPC UA node and an AAS submodel element. Created at
/// bridge start from configuration; immutable afterwards.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub node_ref: NodeRef,
    pub element_ref: ElementRef,
    pub value_type: ValueType,
    pub range: Option<Range>,
    pub direction: Direction,
    pub sampling_interval_ms: u32,
    pub queue_size: u32,
    pub nullable: bool,
}

pub const DEFAULT_SAMPLING_INTERVAL_MS: u32 = 100;
pub const DEFAULT_QUEUE_SIZE: u32 = 10;

/// Lifecycle state of a single OPC UA Session, owned exclusively by the
/// Connection Pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Faulted,
    Stopping,
}

/// Outcome of a Controller-driven OPC UA write attempt, recorded on every
/// `AuditRecord`.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Accepted,
    Rejected(String),
    Deferred,
}

/// Produced by the Controller on every attempted OPC UA write; consumed by
/// the external audit sink (see `crate::audit`).
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub node_ref: NodeRef,
    pub element_ref: ElementRef,
    pub prior_value: Option<String>,
    pub new_value: Option<String>,
    pub user_id: Option<String>,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direction: Direction,
        node_ref: NodeRef,
        element_ref: ElementRef,
        prior_value: Option<String>,
        new_value: Option<String>,
        user_id: Option<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            direction,
            node_ref,
            element_ref,
            prior_value,
            new_value,
            user_id,
            outcome,
        }
    }
}

/// A monotonic stand-in for wall-clock timestamps used by the
/// Loop-Suppression Cache, so TTL arithmetic doesn't depend on the system
/// clock jumping.
pub type MonotonicInstant = Instant;
