//! AAS change-event ingress over MQTT (spec §4.3). Grounded on the teacher's
//! `adapters/mqtt.rs`, which documents the production `rumqttc::AsyncClient`
//! + event-loop-in-a-spawned-task shape even though the teacher itself only
//! wires a stub.
//!
//! Payload contract: a JSON object carrying `idShort` or `idShortPath`, an
//! optional `submodelId`, and a `value`; the whole object may be wrapped one
//! level deep under a `data`, `payload`, or `event` key (tried in that
//! order). When `submodelId`/`idShortPath` are absent from the payload, both
//! are derived from the topic path instead: `submodels/{submodelId}/
//! submodelElements/{idShortPath}`, with the submodel segment base64url
//! decoded (mirroring the encoding AAS itself requires for submodelId path
//! segments — see `aas_client::mod`'s URL building). If no `value` field is
//! present at all, the (unwrapped) payload itself is treated as the value.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::model::ElementRef;

/// A raw AAS element change observed over MQTT, not yet decoded against a
/// mapping's `ValueType` (the Controller does that once it resolves the
/// `ElementRef` against the Mapping Registry).
#[derive(Debug, Clone)]
pub struct AasChangeEvent {
    pub element_ref: ElementRef,
    pub raw_value: JsonValue,
}

pub struct MqttIngress {
    client: AsyncClient,
}

impl MqttIngress {
    /// Connects to the broker and spawns the event loop, forwarding parsed
    /// changes onto `events_tx`. Mirrors the teacher's
    /// `AsyncClient::new(mqtt_options, capacity)` + `tokio::spawn` pattern.
    pub fn connect(
        broker_url: &str,
        topic: &str,
        events_tx: mpsc::UnboundedSender<AasChangeEvent>,
    ) -> Result<Self, crate::errors::BridgeError> {
        let url = url::Url::parse(broker_url)
            .map_err(|e| crate::errors::BridgeError::Mqtt(format!("invalid MQTT URL: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| crate::errors::BridgeError::Mqtt("missing MQTT host".into()))?;
        let port = url.port().unwrap_or(1883);

        let mut options = MqttOptions::new("opcua-aas-bridge", host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        let subscribe_client = client.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            if let Err(e) = subscribe_client.subscribe(&topic, QoS::AtLeastOnce).await {
                error!(error = %e, "failed to subscribe to AAS event topic");
                return;
            }

            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match parse_event(&publish.topic, &publish.payload) {
                            Some(event) => {
                                if events_tx.send(event).is_err() {
                                    break;
                                }
                            }
                            None => {
                                warn!(topic = %publish.topic, "unrecognized AAS event payload, ignoring");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT event loop error, reconnecting");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self { client })
    }

    pub async fn disconnect(&self) {
        let _ = self.client.disconnect().await;
        debug!("MQTT ingress disconnected");
    }
}

/// Unwraps a payload nested one level under `data`, `payload`, or `event`,
/// tried in that order. Returns the original value if none of those keys
/// are present.
fn unwrap_envelope(payload: &JsonValue) -> &JsonValue {
    for key in ["data", "payload", "event"] {
        if let Some(inner) = payload.get(key) {
            return inner;
        }
    }
    payload
}

/// Derives an `ElementRef` from `submodels/{submodelId}/submodelElements/
/// {idShortPath}`, base64url-decoding the submodel segment.
fn element_ref_from_topic(topic: &str) -> Option<ElementRef> {
    let mut parts = topic.splitn(2, "/submodelElements/");
    let submodel_segment = parts.next()?.strip_prefix("submodels/")?;
    let id_short_path = parts.next()?;

    let decoded = URL_SAFE_NO_PAD.decode(submodel_segment).ok()?;
    let submodel_id = String::from_utf8(decoded).ok()?;

    Some(ElementRef::new(submodel_id, id_short_path))
}

/// Parses an MQTT event per spec §4.3: extracts `idShort`/`idShortPath`,
/// `submodelId`, and `value` from the (possibly enveloped) payload, falling
/// back to the topic path when the identity fields are absent.
fn parse_event(topic: &str, payload: &[u8]) -> Option<AasChangeEvent> {
    let raw: JsonValue = serde_json::from_slice(payload).ok()?;
    let body = unwrap_envelope(&raw);

    let id_short_path = body
        .get("idShortPath")
        .or_else(|| body.get("idShort"))
        .and_then(JsonValue::as_str);
    let submodel_id = body.get("submodelId").and_then(JsonValue::as_str);

    let element_ref = match (submodel_id, id_short_path) {
        (Some(submodel_id), Some(id_short_path)) => ElementRef::new(submodel_id, id_short_path),
        _ => element_ref_from_topic(topic)?,
    };

    let raw_value = body.get("value").cloned().unwrap_or_else(|| body.clone());

    Some(AasChangeEvent { element_ref, raw_value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payload_fields_over_topic() {
        let event = parse_event(
            "sm-repository/x/submodels/ignored/submodelElements/ignored",
            br#"{"idShortPath":"Temperature","submodelId":"urn:factory:submodel:sensors","value":55.0}"#,
        )
        .unwrap();
        assert_eq!(event.element_ref.submodel_id, "urn:factory:submodel:sensors");
        assert_eq!(event.element_ref.id_short_path, "Temperature");
        assert_eq!(event.raw_value, serde_json::json!(55.0));
    }

    #[test]
    fn unwraps_data_envelope() {
        let event = parse_event(
            "anything",
            br#"{"data":{"idShortPath":"Temperature","submodelId":"sm1","value":21.0}}"#,
        )
        .unwrap();
        assert_eq!(event.element_ref.submodel_id, "sm1");
        assert_eq!(event.raw_value, serde_json::json!(21.0));
    }

    #[test]
    fn unwraps_payload_and_event_envelopes() {
        let via_payload = parse_event(
            "anything",
            br#"{"payload":{"idShort":"Status","submodelId":"sm1","value":"ok"}}"#,
        )
        .unwrap();
        assert_eq!(via_payload.raw_value, serde_json::json!("ok"));

        let via_event = parse_event(
            "anything",
            br#"{"event":{"idShort":"Status","submodelId":"sm1","value":"ok"}}"#,
        )
        .unwrap();
        assert_eq!(via_event.raw_value, serde_json::json!("ok"));
    }

    #[test]
    fn derives_identity_from_topic_when_payload_silent() {
        let submodel_b64 = URL_SAFE_NO_PAD.encode(b"urn:factory:sm:sensors");
        let topic = format!("submodels/{}/submodelElements/Temperature", submodel_b64);
        let event = parse_event(&topic, br#"{"value":42.5}"#).unwrap();
        assert_eq!(event.element_ref.submodel_id, "urn:factory:sm:sensors");
        assert_eq!(event.element_ref.id_short_path, "Temperature");
        assert_eq!(event.raw_value, serde_json::json!(42.5));
    }

    #[test]
    fn treats_bare_payload_as_value_when_no_value_field() {
        let submodel_b64 = URL_SAFE_NO_PAD.encode(b"sm1");
        let topic = format!("submodels/{}/submodelElements/Group.Temperature", submodel_b64);
        let event = parse_event(&topic, b"42.5").unwrap();
        assert_eq!(event.element_ref.id_short_path, "Group.Temperature");
        assert_eq!(event.raw_value, serde_json::json!(42.5));
    }

    #[test]
    fn rejects_unrecognized_topic_without_identity_fields() {
        assert!(parse_event("some/other/topic", b"1").is_none());
    }
}
