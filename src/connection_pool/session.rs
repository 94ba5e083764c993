//! A single OPC UA endpoint's connection and its reconnect state machine
//! (spec §4.2). The underlying `opcua` client is synchronous, so every call
//! into it runs on a blocking task, mirroring the `session.read()` /
//! `session.write()` / `session.create_subscription()` usage pattern shown
//! in the pack's sync-session OPC UA clients (not the teacher's own
//! `adapters/opcua.rs`, which stubs the connection out entirely).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use opcua::client::prelude::{
    Client, ClientBuilder, DataChangeCallback, IdentityToken, Session,
};
use opcua::sync::RwLock as SyncRwLock;
use opcua::types::{
    AttributeId, DataValue, MessageSecurityMode, MonitoredItemCreateRequest, NodeId,
    ReadValueId, SecurityPolicy, StatusCode, TimestampsToReturn, UAString, UserTokenPolicy,
    Variant, WriteValue,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::config::EndpointConfig;
use crate::errors::{BridgeError, OpcError};
use crate::metrics::OPC_RECONNECTS;
use crate::model::{NodeRef, SessionState};

/// A single monitored-item change pushed out of the blocking callback.
#[derive(Debug, Clone)]
pub struct DataChangeEvent {
    pub node_ref: NodeRef,
    pub value: Variant,
    pub source_timestamp: Option<opcua::types::DateTime>,
}

const SUBSCRIPTION_PUBLISHING_INTERVAL_MS: f64 = 100.0;
const SUBSCRIPTION_LIFETIME_COUNT: u32 = 600;
const SUBSCRIPTION_KEEPALIVE_COUNT: u32 = 30;

struct Inner {
    state: SessionState,
    session: Option<Arc<SyncRwLock<Session>>>,
    subscription_id: Option<u32>,
    backoff: Backoff,
    /// The last subscription spec submitted via `submit_subscription`,
    /// replayed automatically on every reconnect (spec §4.2: "the pool
    /// re-creates the subscription on reconnect transparently").
    pending_node_ids: Vec<(NodeRef, String)>,
}

/// Owns one endpoint's OPC UA session across its full
/// Disconnected → Connecting → Connected → Faulted lifecycle (spec §4.2).
pub struct EndpointSession {
    pub name: String,
    config: EndpointConfig,
    inner: Mutex<Inner>,
    events_tx: mpsc::UnboundedSender<DataChangeEvent>,
}

impl EndpointSession {
    pub fn new(config: EndpointConfig, events_tx: mpsc::UnboundedSender<DataChangeEvent>) -> Self {
        Self {
            name: config.name.clone(),
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Disconnected,
                session: None,
                subscription_id: None,
                backoff: Backoff::standard(),
                pending_node_ids: Vec::new(),
            }),
            events_tx,
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Records the subscription spec to (re)apply on every `Connected`
    /// transition, without submitting it yet. Called before `run()` starts
    /// so the very first connect resubscribes through the same path as
    /// every later reconnect.
    pub async fn set_node_ids(&self, node_ids: Vec<(NodeRef, String)>) {
        self.inner.lock().await.pending_node_ids = node_ids;
    }

    /// Runs the connect/reconnect loop until `stop()` transitions state to
    /// `Stopping`. Intended to be driven by a dedicated `tokio::spawn` task
    /// per endpoint, per spec §4.2's one-session-per-endpoint model.
    pub async fn run(&self) {
        loop {
            let was_faulted = {
                let inner = self.inner.lock().await;
                if inner.state == SessionState::Stopping {
                    break;
                }
                inner.state == SessionState::Faulted
            };
            if was_faulted {
                OPC_RECONNECTS.with_label_values(&[&self.name]).inc();
            }

            match self.connect_once().await {
                Ok(()) => {
                    let node_ids = {
                        let mut inner = self.inner.lock().await;
                        inner.backoff.reset();
                        inner.pending_node_ids.clone()
                    };
                    if !node_ids.is_empty() {
                        if let Err(err) = self.submit_subscription(node_ids).await {
                            warn!(endpoint = %self.name, error = %err, "failed to (re)submit OPC UA subscription");
                        }
                    }
                }
                Err(err) => {
                    warn!(endpoint = %self.name, error = %err, "OPC UA connection attempt failed");
                    let delay = {
                        let mut inner = self.inner.lock().await;
                        inner.state = SessionState::Faulted;
                        inner.backoff.next_delay()
                    };
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            // Poll the session's liveness until it drops or stop() is called.
            loop {
                tokio::time::sleep(Duration::from_secs(5)).await;
                let should_stop = {
                    let inner = self.inner.lock().await;
                    inner.state == SessionState::Stopping
                };
                if should_stop {
                    break;
                }
                if !self.is_session_alive().await {
                    let mut inner = self.inner.lock().await;
                    inner.state = SessionState::Faulted;
                    inner.session = None;
                    break;
                }
            }
        }

        self.teardown().await;
    }

    async fn is_session_alive(&self) -> bool {
        let session = {
            let inner = self.inner.lock().await;
            inner.session.clone()
        };
        match session {
            Some(session) => {
                tokio::task::spawn_blocking(move || session.read().is_connected())
                    .await
                    .unwrap_or(false)
            }
            None => false,
        }
    }

    async fn connect_once(&self) -> Result<(), BridgeError> {
        {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::Connecting;
        }

        let url = self.config.url.clone();
        let security_policy = parse_security_policy(&self.config.security_policy);
        let cert_path = self.config.cert_path.clone();
        let key_path = self.config.key_path.clone();

        let session = tokio::task::spawn_blocking(move || -> Result<Arc<SyncRwLock<Session>>, OpcError> {
            let mut builder = ClientBuilder::new()
                .application_name("opcua-aas-bridge")
                .application_uri("urn:opcua-aas-bridge")
                .pki_dir("./pki")
                .session_retry_limit(1);

            if cert_path.is_some() || key_path.is_some() {
                builder = builder.trust_server_certs(true);
            }

            let mut client = builder
                .client()
                .ok_or_else(|| OpcError::ServiceFault("failed to build OPC UA client".into()))?;

            let endpoints = client
                .get_server_endpoints_from_url(url.as_str())
                .map_err(|_| OpcError::ServiceFault(format!("could not fetch endpoints from {}", url)))?;

            let endpoint = Client::find_matching_endpoint(
                endpoints.as_slice(),
                url.as_str(),
                security_policy,
                MessageSecurityMode::None,
            )
            .ok_or_else(|| {
                OpcError::ServiceFault(format!("no matching endpoint for {}", url))
            })?;

            client
                .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
                .map_err(|_| OpcError::ServiceFault(format!("connect_to_endpoint failed for {}", url)))
        })
        .await
        .map_err(|e| BridgeError::Opc(OpcError::ServiceFault(e.to_string())))??;

        {
            let mut inner = self.inner.lock().await;
            inner.session = Some(session);
            inner.state = SessionState::Connected;
        }

        info!(endpoint = %self.name, "OPC UA session connected");
        Ok(())
    }

    /// Creates one subscription covering every opc-to-aas mapping on this
    /// endpoint, per spec §4.2/§4.5.
    pub async fn submit_subscription(&self, node_ids: Vec<(NodeRef, String)>) -> Result<(), BridgeError> {
        let session = {
            let inner = self.inner.lock().await;
            inner
                .session
                .clone()
                .ok_or_else(|| BridgeError::Opc(OpcError::SessionIdInvalid))?
        };

        let events_tx = self.events_tx.clone();
        let endpoint_name = self.name.clone();

        let subscription_id = tokio::task::spawn_blocking(move || -> Result<u32, StatusCode> {
            let session_guard = session.read();

            let subscription_id = session_guard.create_subscription(
                SUBSCRIPTION_PUBLISHING_INTERVAL_MS,
                SUBSCRIPTION_LIFETIME_COUNT,
                SUBSCRIPTION_KEEPALIVE_COUNT,
                0,
                0,
                true,
                DataChangeCallback::new(move |changed_monitored_items| {
                    for item in changed_monitored_items {
                        for value in item.values() {
                            let node_id = item.item_to_monitor().node_id.clone();
                            let node_ref = NodeRef::new(endpoint_name.clone(), node_id.to_string());
                            if let Some(variant) = value.value.clone() {
                                let _ = events_tx.send(DataChangeEvent {
                                    node_ref,
                                    value: variant,
                                    source_timestamp: value.source_timestamp,
                                });
                            }
                        }
                    }
                }),
            )?;

            let requests: Vec<MonitoredItemCreateRequest> = node_ids
                .iter()
                .filter_map(|(_, node_id_str)| NodeId::from_str(node_id_str).ok())
                .map(MonitoredItemCreateRequest::from)
                .collect();

            session_guard.create_monitored_items(
                subscription_id,
                TimestampsToReturn::Both,
                &requests,
            )?;

            Ok(subscription_id)
        })
        .await
        .map_err(|e| BridgeError::Opc(OpcError::ServiceFault(e.to_string())))?
        .map_err(|status| BridgeError::Opc(OpcError::ServiceFault(status.to_string())))?;

        self.inner.lock().await.subscription_id = Some(subscription_id);
        debug!(endpoint = %self.name, subscription_id, "OPC UA subscription created");
        Ok(())
    }

    /// Writes a single value to a node, per spec §4.2/§4.6.
    pub async fn write_value(&self, node_id_str: &str, value: Variant) -> Result<(), BridgeError> {
        let session = {
            let inner = self.inner.lock().await;
            inner
                .session
                .clone()
                .ok_or_else(|| BridgeError::Opc(OpcError::SessionIdInvalid))?
        };

        let node_id = NodeId::from_str(node_id_str)
            .map_err(|_| BridgeError::Type(format!("invalid OPC UA node id: {}", node_id_str)))?;

        let statuses = tokio::task::spawn_blocking(move || -> Result<Vec<StatusCode>, StatusCode> {
            let session_guard = session.read();
            session_guard.write(&[WriteValue {
                node_id,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue {
                    value: Some(value),
                    status: Some(StatusCode::Good),
                    source_timestamp: Some(opcua::types::DateTime::now()),
                    ..Default::default()
                },
            }])
        })
        .await
        .map_err(|e| BridgeError::Opc(OpcError::ServiceFault(e.to_string())))?
        .map_err(|status| BridgeError::Opc(OpcError::ServiceFault(status.to_string())))?;

        match statuses.first() {
            Some(status) if status.is_good() => Ok(()),
            Some(status) => Err(BridgeError::Opc(OpcError::ServiceFault(status.to_string()))),
            None => Err(BridgeError::Opc(OpcError::ServiceFault("empty write response".into()))),
        }
    }

    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = SessionState::Stopping;
    }

    async fn teardown(&self) {
        let session = {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::Disconnected;
            inner.session.take()
        };
        if let Some(session) = session {
            let _ = tokio::task::spawn_blocking(move || session.read().disconnect()).await;
        }
        info!(endpoint = %self.name, "OPC UA session stopped");
    }
}

fn parse_security_policy(name: &str) -> SecurityPolicy {
    SecurityPolicy::from_str(name).unwrap_or(SecurityPolicy::None)
}

#[allow(dead_code)]
fn anonymous_token_policy() -> UserTokenPolicy {
    UserTokenPolicy::anonymous()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_session_starts_disconnected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = EndpointSession::new(
            EndpointConfig {
                name: "plc1".into(),
                url: "opc.tcp://localhost:4840".into(),
                security_policy: "None".into(),
                cert_path: None,
                key_path: None,
            },
            tx,
        );
        assert_eq!(session.state().await, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn writes_and_subscriptions_fail_fast_without_a_session() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = EndpointSession::new(
            EndpointConfig {
                name: "plc1".into(),
                url: "opc.tcp://localhost:4840".into(),
                security_policy: "None".into(),
                cert_path: None,
                key_path: None,
            },
            tx,
        );
        let result = session.write_value("ns=2;s=Temperature", Variant::Double(1.0)).await;
        assert!(matches!(result, Err(BridgeError::Opc(OpcError::SessionIdInvalid))));
    }
}
