//! Error taxonomy for the bridge core, per spec §7.

use thiserror::Error;

/// Top-level error type returned by core operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("type coercion error: {0}")]
    Type(String),

    #[error("range error: {0}")]
    Range(String),

    #[error("null value not permitted: {0}")]
    Null(String),

    #[error("OPC UA error: {0}")]
    Opc(#[from] OpcError),

    #[error("AAS HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("dependency unavailable: {0}")]
    Unavailable(String),
}

impl BridgeError {
    /// Runtime errors are recovered locally per spec §7; only `Config` is
    /// fatal at startup.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, BridgeError::Config(_))
    }

    /// Coarse category used as a metrics label, mirroring the teacher's
    /// `ProtocolError::category()`.
    pub fn category(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "config",
            BridgeError::Type(_) => "type",
            BridgeError::Range(_) => "range",
            BridgeError::Null(_) => "null",
            BridgeError::Opc(_) => "opc",
            BridgeError::Http(_) => "http",
            BridgeError::Mqtt(_) => "mqtt",
            BridgeError::Unavailable(_) => "unavailable",
        }
    }
}

/// OPC UA service faults, including the two distinguished subtypes the spec
/// calls out by name.
#[derive(Error, Debug, Clone)]
pub enum OpcError {
    #[error("OPC UA operation timed out")]
    Timeout,

    #[error("OPC UA session id invalid")]
    SessionIdInvalid,

    #[error("OPC UA service fault: {0}")]
    ServiceFault(String),
}

impl OpcError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, OpcError::Timeout | OpcError::SessionIdInvalid)
    }
}

/// AAS REST failure subtypes, per spec §7.
#[derive(Error, Debug, Clone)]
pub enum HttpError {
    #[error("AAS element not found")]
    NotFound,

    #[error("AAS client error: {0}")]
    PermanentClientError(String),

    #[error("AAS server error: {0}")]
    ServerError(String),

    #[error("AAS transport error: {0}")]
    Transport(String),
}

impl HttpError {
    /// Transient HTTP errors (connect reset, 5xx, 429) are retried with
    /// backoff; 4xx other than 404 is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::ServerError(_) | HttpError::Transport(_))
    }

    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            404 => HttpError::NotFound,
            429 => HttpError::Transport(format!("429 rate limited: {}", body.into())),
            400..=499 => HttpError::PermanentClientError(format!("{}: {}", status, body.into())),
            500..=599 => HttpError::ServerError(format!("{}: {}", status, body.into())),
            _ => HttpError::Transport(format!("unexpected status {}: {}", status, body.into())),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
