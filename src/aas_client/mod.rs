//! AAS Client: REST access to submodel element values, with auto-create and
//! MQTT/polling event ingress (spec §4.3).
//!
//! No repo in the retrieval pack speaks AAS specifically, so the REST shape
//! here is authored directly from spec §4.3/§5 rather than grounded on a
//! pack file; the `reqwest::Client` construction and error-mapping idiom
//! (explicit timeouts, `HttpError::from_status` on non-2xx) follows the
//! general pattern of typed client wrappers elsewhere in the pack, e.g.
//! TaceoLabs-oprf-service's `reqwest`-based service clients.

pub mod mqtt;
pub mod poll;

use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::codec::XsdValue;
use crate::errors::{BridgeError, HttpError};
use crate::model::ValueType;

pub struct AasClient {
    http: reqwest::Client,
    base_url: String,
    encode_identifiers: bool,
    auto_create_submodels: bool,
    auto_create_elements: bool,
    last_probe_success: RwLock<Option<Instant>>,
}

impl AasClient {
    pub fn new(
        base_url: impl Into<String>,
        encode_identifiers: bool,
        auto_create_submodels: bool,
        auto_create_elements: bool,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            encode_identifiers,
            auto_create_submodels,
            auto_create_elements,
            last_probe_success: RwLock::new(None),
        })
    }

    /// Lightweight reachability probe against the submodel repository root
    /// (spec §4.7 readiness: "AAS Client's last probe succeeded within
    /// 2× poll_interval_seconds"). A 404 still counts as reachable — it
    /// means the server answered, not that it's down.
    pub async fn probe(&self) -> bool {
        let response = self.http.get(format!("{}/submodels", self.base_url)).send().await;
        let reachable = matches!(&response, Ok(r) if r.status().is_success() || r.status().as_u16() == 404);
        if reachable {
            *self.last_probe_success.write().await = Some(Instant::now());
        }
        reachable
    }

    /// Age of the last successful probe, or `None` if one has never
    /// succeeded.
    pub async fn last_probe_age(&self) -> Option<Duration> {
        self.last_probe_success.read().await.map(|t| t.elapsed())
    }

    fn encode_identifier(&self, id: &str) -> String {
        if self.encode_identifiers {
            URL_SAFE_NO_PAD.encode(id.as_bytes())
        } else {
            id.to_string()
        }
    }

    fn value_url(&self, submodel_id: &str, id_short_path: &str) -> String {
        format!(
            "{}/submodels/{}/submodel-elements/{}/$value",
            self.base_url,
            self.encode_identifier(submodel_id),
            id_short_path,
        )
    }

    /// Reads the current value of a submodel element (spec §4.3, used by
    /// the Controller's pre-write comparison and by the polling fallback).
    pub async fn get_value(
        &self,
        submodel_id: &str,
        id_short_path: &str,
        value_type: &ValueType,
        nullable: bool,
    ) -> Result<XsdValue, BridgeError> {
        let response = self
            .http
            .get(self.value_url(submodel_id, id_short_path))
            .send()
            .await
            .map_err(|e| BridgeError::Http(HttpError::Transport(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Http(HttpError::from_status(status.as_u16(), body)));
        }

        let json: JsonValue = response
            .json()
            .await
            .map_err(|e| BridgeError::Http(HttpError::Transport(e.to_string())))?;

        json_to_xsd(&json, value_type, nullable)
    }

    /// Writes a value to a submodel element, auto-creating the submodel
    /// and/or element on a 404 when configured to do so (spec §4.3 edge
    /// case: "target element does not yet exist").
    pub async fn patch_value(
        &self,
        submodel_id: &str,
        id_short_path: &str,
        value: &XsdValue,
    ) -> Result<(), BridgeError> {
        let json = xsd_to_json(value);

        let response = self
            .http
            .patch(self.value_url(submodel_id, id_short_path))
            .json(&json)
            .send()
            .await
            .map_err(|e| BridgeError::Http(HttpError::Transport(e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status.as_u16() == 404 && (self.auto_create_submodels || self.auto_create_elements) {
            self.auto_create(submodel_id, id_short_path).await?;
            let retry = self
                .http
                .patch(self.value_url(submodel_id, id_short_path))
                .json(&json)
                .send()
                .await
                .map_err(|e| BridgeError::Http(HttpError::Transport(e.to_string())))?;
            let retry_status = retry.status();
            if retry_status.is_success() {
                return Ok(());
            }
            let body = retry.text().await.unwrap_or_default();
            return Err(BridgeError::Http(HttpError::from_status(retry_status.as_u16(), body)));
        }

        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::Http(HttpError::from_status(status.as_u16(), body)))
    }

    async fn auto_create(&self, submodel_id: &str, id_short_path: &str) -> Result<(), BridgeError> {
        if self.auto_create_submodels {
            let submodel_body = serde_json::json!({
                "id": submodel_id,
                "modelType": "Submodel",
                "submodelElements": [],
            });
            let _ = self
                .http
                .post(format!("{}/submodels", self.base_url))
                .json(&submodel_body)
                .send()
                .await;
        }

        if self.auto_create_elements {
            let element_body = serde_json::json!({
                "idShort": id_short_path.rsplit('/').next().unwrap_or(id_short_path),
                "modelType": "Property",
                "valueType": "xs:string",
            });
            let create_url = format!(
                "{}/submodels/{}/submodel-elements",
                self.base_url,
                self.encode_identifier(submodel_id),
            );
            let _ = self.http.post(create_url).json(&element_body).send().await;
        }

        Ok(())
    }
}

/// Encodes an `XsdValue` the way the AAS `$value` REST endpoints expect
/// (spec §5): scalars as their natural JSON representation, arrays as JSON
/// arrays, dates as RFC 3339 strings, and binary as base64.
pub fn xsd_to_json(value: &XsdValue) -> JsonValue {
    match value {
        XsdValue::Boolean(b) => JsonValue::Bool(*b),
        XsdValue::Byte(v) => JsonValue::from(*v),
        XsdValue::UnsignedByte(v) => JsonValue::from(*v),
        XsdValue::Short(v) => JsonValue::from(*v),
        XsdValue::UnsignedShort(v) => JsonValue::from(*v),
        XsdValue::Int(v) => JsonValue::from(*v),
        XsdValue::UnsignedInt(v) => JsonValue::from(*v),
        XsdValue::Long(v) => json_safe_i64(*v),
        XsdValue::UnsignedLong(v) => json_safe_u64(*v),
        XsdValue::Float(v) => serde_json::Number::from_f64(*v as f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        XsdValue::Double(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        XsdValue::String(s) => JsonValue::String(s.clone()),
        XsdValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
        XsdValue::Duration(ms) => JsonValue::String(format!("PT{}S", ms / 1000.0)),
        XsdValue::Base64Binary(bytes) => JsonValue::String(URL_SAFE_NO_PAD.encode(bytes)),
        XsdValue::Array(items) => JsonValue::Array(items.iter().map(xsd_to_json).collect()),
    }
}

/// JSON's safe integer ceiling: `2^53`, above which IEEE-754 doubles (and
/// therefore JS/AAS-web-client consumers) lose precision.
const JSON_SAFE_INT_MAX: u64 = 9_007_199_254_740_992;

fn json_safe_i64(v: i64) -> JsonValue {
    if v.unsigned_abs() > JSON_SAFE_INT_MAX {
        JsonValue::String(v.to_string())
    } else {
        JsonValue::from(v)
    }
}

fn json_safe_u64(v: u64) -> JsonValue {
    if v > JSON_SAFE_INT_MAX {
        JsonValue::String(v.to_string())
    } else {
        JsonValue::from(v)
    }
}

pub(crate) fn json_to_xsd(json: &JsonValue, value_type: &ValueType, nullable: bool) -> Result<XsdValue, BridgeError> {
    if json.is_null() {
        return if nullable {
            Ok(null_placeholder(value_type))
        } else {
            Err(BridgeError::Null(format!(
                "AAS element value is null but mapping is not nullable for {}",
                value_type.xsd_name()
            )))
        };
    }

    match value_type {
        ValueType::Array(inner) => {
            let items = json
                .as_array()
                .ok_or_else(|| type_err(value_type, "expected a JSON array"))?;
            let decoded = items
                .iter()
                .map(|item| json_to_xsd(item, inner, nullable))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(XsdValue::Array(decoded))
        }
        ValueType::Boolean => json
            .as_bool()
            .map(XsdValue::Boolean)
            .ok_or_else(|| type_err(value_type, "expected a JSON boolean")),
        ValueType::Byte => json_as_i64(json, value_type).map(|n| XsdValue::Byte(n as i8)),
        ValueType::UnsignedByte => json_as_i64(json, value_type).map(|n| XsdValue::UnsignedByte(n as u8)),
        ValueType::Short => json_as_i64(json, value_type).map(|n| XsdValue::Short(n as i16)),
        ValueType::UnsignedShort => json_as_i64(json, value_type).map(|n| XsdValue::UnsignedShort(n as u16)),
        ValueType::Int => json_as_i64(json, value_type).map(|n| XsdValue::Int(n as i32)),
        ValueType::UnsignedInt => json_as_i64(json, value_type).map(|n| XsdValue::UnsignedInt(n as u32)),
        ValueType::Long => json_as_i64(json, value_type).map(XsdValue::Long),
        ValueType::UnsignedLong => json
            .as_u64()
            .or_else(|| json.as_str().and_then(|s| s.parse::<u64>().ok()))
            .map(XsdValue::UnsignedLong)
            .ok_or_else(|| type_err(value_type, "expected a non-negative JSON integer or numeric string")),
        ValueType::Float => json
            .as_f64()
            .map(|f| XsdValue::Float(f as f32))
            .ok_or_else(|| type_err(value_type, "expected a JSON number")),
        ValueType::Double => json
            .as_f64()
            .map(XsdValue::Double)
            .ok_or_else(|| type_err(value_type, "expected a JSON number")),
        ValueType::String => json
            .as_str()
            .map(|s| XsdValue::String(s.to_string()))
            .ok_or_else(|| type_err(value_type, "expected a JSON string")),
        ValueType::DateTime => json
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| XsdValue::DateTime(dt.with_timezone(&chrono::Utc)))
            .ok_or_else(|| type_err(value_type, "expected an RFC 3339 date-time string")),
        ValueType::Duration => json
            .as_str()
            .and_then(parse_iso8601_duration_seconds)
            .map(|secs| XsdValue::Duration(secs * 1000.0))
            .ok_or_else(|| type_err(value_type, "expected an ISO 8601 duration string")),
        ValueType::Base64Binary => json
            .as_str()
            .and_then(|s| URL_SAFE_NO_PAD.decode(s).ok())
            .map(XsdValue::Base64Binary)
            .ok_or_else(|| type_err(value_type, "expected a base64url string")),
    }
}

fn json_as_i64(json: &JsonValue, value_type: &ValueType) -> Result<i64, BridgeError> {
    json.as_i64()
        .or_else(|| json.as_str().and_then(|s| s.parse::<i64>().ok()))
        .ok_or_else(|| type_err(value_type, "expected a JSON integer or numeric string"))
}

fn type_err(vt: &ValueType, detail: impl Into<String>) -> BridgeError {
    BridgeError::Type(format!("cannot decode AAS value as {}: {}", vt.xsd_name(), detail.into()))
}

fn null_placeholder(vt: &ValueType) -> XsdValue {
    match vt {
        ValueType::Boolean => XsdValue::Boolean(false),
        ValueType::Byte => XsdValue::Byte(0),
        ValueType::UnsignedByte => XsdValue::UnsignedByte(0),
        ValueType::Short => XsdValue::Short(0),
        ValueType::UnsignedShort => XsdValue::UnsignedShort(0),
        ValueType::Int => XsdValue::Int(0),
        ValueType::UnsignedInt => XsdValue::UnsignedInt(0),
        ValueType::Long => XsdValue::Long(0),
        ValueType::UnsignedLong => XsdValue::UnsignedLong(0),
        ValueType::Float => XsdValue::Float(0.0),
        ValueType::Double => XsdValue::Double(0.0),
        ValueType::String => XsdValue::String(String::new()),
        ValueType::DateTime => XsdValue::DateTime(chrono::DateTime::UNIX_EPOCH),
        ValueType::Duration => XsdValue::Duration(0.0),
        ValueType::Base64Binary => XsdValue::Base64Binary(Vec::new()),
        ValueType::Array(_) => XsdValue::Array(Vec::new()),
    }
}

/// Minimal `PT<seconds>S` parser; the only ISO 8601 duration shape the
/// Type Codec round-trips (spec §4.1 represents `xs:duration` as
/// milliseconds).
fn parse_iso8601_duration_seconds(s: &str) -> Option<f64> {
    let rest = s.strip_prefix("PT")?;
    let digits = rest.strip_suffix('S')?;
    digits.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xsd_to_json_scalars() {
        assert_eq!(xsd_to_json(&XsdValue::Boolean(true)), JsonValue::Bool(true));
        assert_eq!(xsd_to_json(&XsdValue::Double(42.5)), serde_json::json!(42.5));
        assert_eq!(
            xsd_to_json(&XsdValue::String("hello".into())),
            JsonValue::String("hello".into())
        );
    }

    #[test]
    fn json_to_xsd_round_trip_double() {
        let json = serde_json::json!(12.5);
        let decoded = json_to_xsd(&json, &ValueType::Double, false).unwrap();
        assert_eq!(decoded, XsdValue::Double(12.5));
    }

    #[test]
    fn json_to_xsd_array() {
        let json = serde_json::json!([1, 2, 3]);
        let decoded = json_to_xsd(&json, &ValueType::Array(Box::new(ValueType::Int)), false).unwrap();
        assert_eq!(
            decoded,
            XsdValue::Array(vec![XsdValue::Int(1), XsdValue::Int(2), XsdValue::Int(3)])
        );
    }

    #[test]
    fn json_to_xsd_null_without_nullable_errors() {
        let result = json_to_xsd(&JsonValue::Null, &ValueType::Double, false);
        assert!(matches!(result, Err(BridgeError::Null(_))));
    }

    #[test]
    fn large_long_encodes_as_json_string() {
        assert_eq!(xsd_to_json(&XsdValue::Long(i64::MAX)), JsonValue::String(i64::MAX.to_string()));
        assert_eq!(xsd_to_json(&XsdValue::Long(42)), serde_json::json!(42));

        let decoded = json_to_xsd(&JsonValue::String(i64::MAX.to_string()), &ValueType::Long, false).unwrap();
        assert_eq!(decoded, XsdValue::Long(i64::MAX));
    }

    #[test]
    fn large_unsigned_long_encodes_as_json_string() {
        let huge = u64::MAX;
        assert_eq!(xsd_to_json(&XsdValue::UnsignedLong(huge)), JsonValue::String(huge.to_string()));
        assert_eq!(xsd_to_json(&XsdValue::UnsignedLong(7)), serde_json::json!(7));

        let decoded = json_to_xsd(&JsonValue::String(huge.to_string()), &ValueType::UnsignedLong, false).unwrap();
        assert_eq!(decoded, XsdValue::UnsignedLong(huge));
    }

    #[test]
    fn duration_round_trips_through_iso8601() {
        let json = xsd_to_json(&XsdValue::Duration(1500.0));
        assert_eq!(json, JsonValue::String("PT1.5S".into()));
        let decoded = json_to_xsd(&json, &ValueType::Duration, false).unwrap();
        assert_eq!(decoded, XsdValue::Duration(1500.0));
    }
}
