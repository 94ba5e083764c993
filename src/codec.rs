//! Type Codec: bidirectional coercion between OPC UA `Variant` values and
//! AAS XSD-typed values, under the OPC 30270 (I4AAS) conventions (spec §4.1).

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use opcua::types::{ByteString, UAString, Variant};

use crate::errors::BridgeError;
use crate::model::{Range, ValueType};

/// OPC UA `DateTime` ticks are 100ns units since 1601-01-01T00:00:00Z.
const OPC_EPOCH_OFFSET_SECONDS: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// A decoded/encoded value tagged with the XSD type it was coerced to.
/// `Duration` is represented as total milliseconds (fractional preserved) to
/// match the OPC UA companion mapping, which carries `xs:duration` as a
/// `Double` in milliseconds rather than a native OPC UA duration type.
#[derive(Debug, Clone, PartialEq)]
pub enum XsdValue {
    Boolean(bool),
    Byte(i8),
    UnsignedByte(u8),
    Short(i16),
    UnsignedShort(u16),
    Int(i32),
    UnsignedInt(u32),
    Long(i64),
    UnsignedLong(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Duration(f64),
    Base64Binary(Vec<u8>),
    Array(Vec<XsdValue>),
}

impl XsdValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            XsdValue::Boolean(_) => ValueType::Boolean,
            XsdValue::Byte(_) => ValueType::Byte,
            XsdValue::UnsignedByte(_) => ValueType::UnsignedByte,
            XsdValue::Short(_) => ValueType::Short,
            XsdValue::UnsignedShort(_) => ValueType::UnsignedShort,
            XsdValue::Int(_) => ValueType::Int,
            XsdValue::UnsignedInt(_) => ValueType::UnsignedInt,
            XsdValue::Long(_) => ValueType::Long,
            XsdValue::UnsignedLong(_) => ValueType::UnsignedLong,
            XsdValue::Float(_) => ValueType::Float,
            XsdValue::Double(_) => ValueType::Double,
            XsdValue::String(_) => ValueType::String,
            XsdValue::DateTime(_) => ValueType::DateTime,
            XsdValue::Duration(_) => ValueType::Duration,
            XsdValue::Base64Binary(_) => ValueType::Base64Binary,
            XsdValue::Array(items) => ValueType::Array(Box::new(
                items
                    .first()
                    .map(XsdValue::value_type)
                    .unwrap_or(ValueType::String),
            )),
        }
    }
}

/// Intrinsic inclusive [min, max] for integer XSD types, used by range
/// validation when no mapping-level `range` narrows it further.
fn intrinsic_range(vt: &ValueType) -> Option<(f64, f64)> {
    match vt {
        ValueType::Byte => Some((i8::MIN as f64, i8::MAX as f64)),
        ValueType::UnsignedByte => Some((u8::MIN as f64, u8::MAX as f64)),
        ValueType::Short => Some((i16::MIN as f64, i16::MAX as f64)),
        ValueType::UnsignedShort => Some((u16::MIN as f64, u16::MAX as f64)),
        ValueType::Int => Some((i32::MIN as f64, i32::MAX as f64)),
        ValueType::UnsignedInt => Some((u32::MIN as f64, u32::MAX as f64)),
        ValueType::Long => Some((i64::MIN as f64, i64::MAX as f64)),
        ValueType::UnsignedLong => Some((0.0, u64::MAX as f64)),
        _ => None,
    }
}

fn range_err(vt: &ValueType, value: f64) -> BridgeError {
    BridgeError::Range(format!(
        "{} is out of range for {}",
        value,
        vt.xsd_name()
    ))
}

fn type_err(vt: &ValueType, detail: impl Into<String>) -> BridgeError {
    BridgeError::Type(format!("cannot coerce to {}: {}", vt.xsd_name(), detail.into()))
}

/// Encode an XSD value into the OPC UA `Variant` appropriate for
/// `target_type`. Returns `TypeError`/`RangeError` per spec §4.1.
pub fn encode(value: &XsdValue, target_type: &ValueType) -> Result<Variant, BridgeError> {
    if let (ValueType::Array(inner), XsdValue::Array(items)) = (target_type, value) {
        let mut encoded = Vec::with_capacity(items.len());
        for item in items {
            encoded.push(encode(item, inner)?);
        }
        return Ok(Variant::from(encoded));
    }

    match (target_type, value) {
        (ValueType::Boolean, XsdValue::Boolean(b)) => Ok(Variant::Boolean(*b)),
        (ValueType::Boolean, v) => coerce_bool_from_numeric(v).map(Variant::Boolean),

        (ValueType::Byte, v) => encode_int(v, target_type).map(|n| Variant::SByte(n as i8)),
        (ValueType::UnsignedByte, v) => encode_int(v, target_type).map(|n| Variant::Byte(n as u8)),
        (ValueType::Short, v) => encode_int(v, target_type).map(|n| Variant::Int16(n as i16)),
        (ValueType::UnsignedShort, v) => {
            encode_int(v, target_type).map(|n| Variant::UInt16(n as u16))
        }
        (ValueType::Int, v) => encode_int(v, target_type).map(|n| Variant::Int32(n as i32)),
        (ValueType::UnsignedInt, v) => encode_int(v, target_type).map(|n| Variant::UInt32(n as u32)),
        (ValueType::Long, v) => encode_int(v, target_type).map(|n| Variant::Int64(n)),
        (ValueType::UnsignedLong, v) => {
            encode_uint(v, target_type).map(Variant::UInt64)
        }

        (ValueType::Float, XsdValue::Float(f)) => Ok(Variant::Float(*f)),
        (ValueType::Float, XsdValue::Double(d)) => narrow_to_f32(*d).map(Variant::Float),
        (ValueType::Double, XsdValue::Double(d)) => Ok(Variant::Double(*d)),
        (ValueType::Double, XsdValue::Float(f)) => Ok(Variant::Double(*f as f64)),

        (ValueType::String, XsdValue::String(s)) => Ok(Variant::String(UAString::from(s.as_str()))),

        (ValueType::DateTime, XsdValue::DateTime(dt)) => encode_date_time(*dt),

        (ValueType::Duration, XsdValue::Duration(ms)) => Ok(Variant::Double(*ms)),

        (ValueType::Base64Binary, XsdValue::Base64Binary(bytes)) => {
            Ok(Variant::ByteString(ByteString::from(bytes.clone())))
        }

        (vt, _) => Err(type_err(vt, "value variant does not match target type")),
    }
}

fn coerce_bool_from_numeric(value: &XsdValue) -> Result<bool, BridgeError> {
    let n = as_i64(value).ok_or_else(|| type_err(&ValueType::Boolean, "not an integer"))?;
    match n {
        1 => Ok(true),
        0 => Ok(false),
        other => Err(type_err(&ValueType::Boolean, format!("{} is neither 0 nor 1", other))),
    }
}

fn as_i64(value: &XsdValue) -> Option<i64> {
    match value {
        XsdValue::Boolean(b) => Some(if *b { 1 } else { 0 }),
        XsdValue::Byte(v) => Some(*v as i64),
        XsdValue::UnsignedByte(v) => Some(*v as i64),
        XsdValue::Short(v) => Some(*v as i64),
        XsdValue::UnsignedShort(v) => Some(*v as i64),
        XsdValue::Int(v) => Some(*v as i64),
        XsdValue::UnsignedInt(v) => Some(*v as i64),
        XsdValue::Long(v) => Some(*v),
        XsdValue::UnsignedLong(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

fn as_f64_numeric(value: &XsdValue) -> Option<f64> {
    match value {
        XsdValue::UnsignedLong(v) => Some(*v as f64),
        other => as_i64(other).map(|n| n as f64),
    }
}

fn encode_int(value: &XsdValue, target_type: &ValueType) -> Result<i64, BridgeError> {
    let n = match value {
        XsdValue::Boolean(b) => *b as i64,
        _ => as_i64(value)
            .or_else(|| as_f64_numeric(value))
            .ok_or_else(|| type_err(target_type, "not an integer value"))?,
    };
    if let Some((lo, hi)) = intrinsic_range(target_type) {
        if (n as f64) < lo || (n as f64) > hi {
            return Err(range_err(target_type, n as f64));
        }
    }
    Ok(n)
}

fn encode_uint(value: &XsdValue, target_type: &ValueType) -> Result<u64, BridgeError> {
    let n = match value {
        XsdValue::UnsignedLong(v) => *v,
        XsdValue::Boolean(b) => *b as u64,
        other => {
            let signed = as_i64(other).ok_or_else(|| type_err(target_type, "not an integer value"))?;
            if signed < 0 {
                return Err(range_err(target_type, signed as f64));
            }
            signed as u64
        }
    };
    Ok(n)
}

fn narrow_to_f32(d: f64) -> Result<f32, BridgeError> {
    if d.is_finite() && d.abs() > f32::MAX as f64 {
        return Err(range_err(&ValueType::Float, d));
    }
    Ok(d as f32)
}

fn encode_date_time(dt: DateTime<Utc>) -> Result<Variant, BridgeError> {
    let total_seconds = dt.timestamp() + OPC_EPOCH_OFFSET_SECONDS;
    if total_seconds < 0 {
        return Err(range_err(&ValueType::DateTime, dt.timestamp() as f64));
    }
    let ticks = total_seconds
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(dt.timestamp_subsec_nanos() as i64 / 100))
        .ok_or_else(|| range_err(&ValueType::DateTime, dt.timestamp() as f64))?;
    Ok(Variant::DateTime(Box::new(opcua::types::DateTime::from_ticks(ticks))))
}

/// Decode an OPC UA `Variant` into the XSD value declared by `target_type`.
/// Returns `TypeError`/`RangeError`/`NullError` per spec §4.1.
pub fn decode(variant: &Variant, target_type: &ValueType, nullable: bool) -> Result<XsdValue, BridgeError> {
    if matches!(variant, Variant::Empty) {
        if nullable {
            return Ok(null_placeholder(target_type));
        }
        return Err(BridgeError::Null(format!(
            "node value is null but mapping is not nullable for {}",
            target_type.xsd_name()
        )));
    }

    if let (ValueType::Array(inner), Variant::Array(array)) = (target_type, variant) {
        let mut decoded = Vec::with_capacity(array.values.len());
        for v in &array.values {
            decoded.push(decode(v, inner, nullable)?);
        }
        return Ok(XsdValue::Array(decoded));
    }

    match (target_type, variant) {
        (ValueType::Boolean, Variant::Boolean(b)) => Ok(XsdValue::Boolean(*b)),
        (ValueType::Boolean, v) => decode_bool_from_numeric(v),

        (ValueType::Byte, v) => decode_int(v, target_type).map(|n| XsdValue::Byte(n as i8)),
        (ValueType::UnsignedByte, v) => decode_int(v, target_type).map(|n| XsdValue::UnsignedByte(n as u8)),
        (ValueType::Short, v) => decode_int(v, target_type).map(|n| XsdValue::Short(n as i16)),
        (ValueType::UnsignedShort, v) => decode_int(v, target_type).map(|n| XsdValue::UnsignedShort(n as u16)),
        (ValueType::Int, v) => decode_int(v, target_type).map(|n| XsdValue::Int(n as i32)),
        (ValueType::UnsignedInt, v) => decode_int(v, target_type).map(|n| XsdValue::UnsignedInt(n as u32)),
        (ValueType::Long, v) => decode_int(v, target_type).map(XsdValue::Long),
        (ValueType::UnsignedLong, v) => decode_uint(v, target_type).map(XsdValue::UnsignedLong),

        (ValueType::Float, Variant::Float(f)) => Ok(XsdValue::Float(*f)),
        (ValueType::Float, Variant::Double(d)) => narrow_to_f32(*d).map(XsdValue::Float),
        (ValueType::Double, Variant::Double(d)) => Ok(XsdValue::Double(*d)),
        (ValueType::Double, Variant::Float(f)) => Ok(XsdValue::Double(*f as f64)),

        (ValueType::String, Variant::String(s)) => Ok(XsdValue::String(
            s.value().clone().unwrap_or_default(),
        )),

        (ValueType::DateTime, Variant::DateTime(dt)) => decode_date_time(dt),

        (ValueType::Duration, Variant::Double(ms)) => Ok(XsdValue::Duration(*ms)),

        (ValueType::Base64Binary, Variant::ByteString(bs)) => {
            Ok(XsdValue::Base64Binary(bs.value.clone().unwrap_or_default()))
        }

        (vt, _) => Err(type_err(vt, "variant does not match target type")),
    }
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
        ValueType::DateTime => XsdValue::DateTime(Utc.timestamp_opt(0, 0).unwrap()),
        ValueType::Duration => XsdValue::Duration(0.0),
        ValueType::Base64Binary => XsdValue::Base64Binary(Vec::new()),
        ValueType::Array(_) => XsdValue::Array(Vec::new()),
    }
}

fn decode_bool_from_numeric(variant: &Variant) -> Result<XsdValue, BridgeError> {
    let n = variant_as_i64(variant).ok_or_else(|| type_err(&ValueType::Boolean, "not an integer"))?;
    match n {
        1 => Ok(XsdValue::Boolean(true)),
        0 => Ok(XsdValue::Boolean(false)),
        other => Err(type_err(&ValueType::Boolean, format!("{} is neither 0 nor 1", other))),
    }
}

fn variant_as_i64(variant: &Variant) -> Option<i64> {
    match variant {
        Variant::Boolean(b) => Some(*b as i64),
        Variant::SByte(v) => Some(*v as i64),
        Variant::Byte(v) => Some(*v as i64),
        Variant::Int16(v) => Some(*v as i64),
        Variant::UInt16(v) => Some(*v as i64),
        Variant::Int32(v) => Some(*v as i64),
        Variant::UInt32(v) => Some(*v as i64),
        Variant::Int64(v) => Some(*v),
        Variant::UInt64(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

fn decode_int(variant: &Variant, target_type: &ValueType) -> Result<i64, BridgeError> {
    let n = variant_as_i64(variant).ok_or_else(|| type_err(target_type, "not an integer variant"))?;
    if let Some((lo, hi)) = intrinsic_range(target_type) {
        if (n as f64) < lo || (n as f64) > hi {
            return Err(range_err(target_type, n as f64));
        }
    }
    Ok(n)
}

fn decode_uint(variant: &Variant, target_type: &ValueType) -> Result<u64, BridgeError> {
    match variant {
        Variant::UInt64(v) => Ok(*v),
        other => {
            let n = variant_as_i64(other).ok_or_else(|| type_err(target_type, "not an integer variant"))?;
            if n < 0 {
                return Err(range_err(target_type, n as f64));
            }
            Ok(n as u64)
        }
    }
}

fn decode_date_time(dt: &opcua::types::DateTime) -> Result<XsdValue, BridgeError> {
    let ticks = dt.ticks();
    let total_seconds = ticks / TICKS_PER_SECOND - OPC_EPOCH_OFFSET_SECONDS;
    let nanos = ((ticks % TICKS_PER_SECOND) * 100) as u32;
    let parsed = Utc.timestamp_opt(total_seconds, nanos).single();
    parsed
        .map(XsdValue::DateTime)
        .ok_or_else(|| range_err(&ValueType::DateTime, total_seconds as f64))
}

/// Checks a decoded/about-to-be-encoded value against a mapping's
/// configured `Range`, on top of the type's intrinsic range already
/// enforced by `encode`/`decode` (spec §4.1, §3 invariant: mapping ranges
/// narrow, never widen, the intrinsic type range). Non-numeric values are
/// not subject to range checks and always pass.
pub fn check_range(value: &XsdValue, range: &Option<Range>) -> Result<(), BridgeError> {
    let Some(range) = range else {
        return Ok(());
    };
    let Some(n) = numeric_value(value) else {
        return Ok(());
    };
    if n < range.min || n > range.max {
        return Err(BridgeError::Range(format!(
            "{} is outside configured range [{}, {}]",
            n, range.min, range.max
        )));
    }
    Ok(())
}

fn numeric_value(value: &XsdValue) -> Option<f64> {
    match value {
        XsdValue::Float(v) => Some(*v as f64),
        XsdValue::Double(v) => Some(*v),
        XsdValue::Duration(v) => Some(*v),
        other => as_f64_numeric(other),
    }
}

/// Stable canonical byte serialization for loop-suppression hashing:
/// type-tagged, big-endian, recursive for arrays. Equal values produce
/// equal bytes regardless of which direction produced them.
pub fn hash(value: &XsdValue) -> Vec<u8> {
    let mut out = Vec::new();
    hash_into(value, &mut out);
    out
}

fn hash_into(value: &XsdValue, out: &mut Vec<u8>) {
    match value {
        XsdValue::Boolean(b) => {
            out.push(0x01);
            out.push(*b as u8);
        }
        XsdValue::Byte(v) => {
            out.push(0x02);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::UnsignedByte(v) => {
            out.push(0x03);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::Short(v) => {
            out.push(0x04);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::UnsignedShort(v) => {
            out.push(0x05);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::Int(v) => {
            out.push(0x06);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::UnsignedInt(v) => {
            out.push(0x07);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::Long(v) => {
            out.push(0x08);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::UnsignedLong(v) => {
            out.push(0x09);
            out.extend_from_slice(&v.to_be_bytes());
        }
        XsdValue::Float(v) => {
            out.push(0xD4);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        XsdValue::Double(v) => {
            out.push(0xD8);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        XsdValue::String(s) => {
            out.push(0x0C);
            out.extend_from_slice(&(s.len() as u32).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        XsdValue::DateTime(dt) => {
            out.push(0x0D);
            out.extend_from_slice(
                &dt.to_rfc3339_opts(SecondsFormat::Nanos, true).into_bytes(),
            );
        }
        XsdValue::Duration(ms) => {
            out.push(0x0E);
            out.extend_from_slice(&ms.to_bits().to_be_bytes());
        }
        XsdValue::Base64Binary(bytes) => {
            out.push(0x0F);
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(bytes);
        }
        XsdValue::Array(items) => {
            out.push(0xA0);
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                hash_into(item, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(vt: ValueType, value: XsdValue) {
        let variant = encode(&value, &vt).expect("encode");
        let decoded = decode(&variant, &vt, false).expect("decode");
        assert_eq!(decoded, value, "round trip mismatch for {}", vt.xsd_name());
        assert_eq!(hash(&decoded), hash(&value));
    }

    #[test]
    fn round_trip_identity_all_scalar_types() {
        round_trip(ValueType::Boolean, XsdValue::Boolean(true));
        round_trip(ValueType::Byte, XsdValue::Byte(-12));
        round_trip(ValueType::UnsignedByte, XsdValue::UnsignedByte(250));
        round_trip(ValueType::Short, XsdValue::Short(-1000));
        round_trip(ValueType::UnsignedShort, XsdValue::UnsignedShort(60000));
        round_trip(ValueType::Int, XsdValue::Int(-123456));
        round_trip(ValueType::UnsignedInt, XsdValue::UnsignedInt(4_000_000_000));
        round_trip(ValueType::Long, XsdValue::Long(-1234567890123));
        round_trip(
            ValueType::UnsignedLong,
            XsdValue::UnsignedLong(18_000_000_000_000_000_000),
        );
        round_trip(ValueType::Float, XsdValue::Float(42.5));
        round_trip(ValueType::Double, XsdValue::Double(42.0));
        round_trip(ValueType::String, XsdValue::String("Temperature".into()));
        round_trip(ValueType::Duration, XsdValue::Duration(1500.25));
        round_trip(
            ValueType::Base64Binary,
            XsdValue::Base64Binary(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        );
    }

    #[test]
    fn round_trip_identity_array() {
        round_trip(
            ValueType::Array(Box::new(ValueType::Double)),
            XsdValue::Array(vec![XsdValue::Double(1.0), XsdValue::Double(2.5)]),
        );
    }

    #[test]
    fn round_trip_identity_empty_array() {
        round_trip(ValueType::Array(Box::new(ValueType::Int)), XsdValue::Array(vec![]));
    }

    #[test]
    fn range_correctness_byte_bounds() {
        assert!(encode(&XsdValue::Int(127), &ValueType::Byte).is_ok());
        assert!(encode(&XsdValue::Int(-128), &ValueType::Byte).is_ok());
        assert!(matches!(
            encode(&XsdValue::Int(128), &ValueType::Byte),
            Err(BridgeError::Range(_))
        ));
        assert!(matches!(
            encode(&XsdValue::Int(-129), &ValueType::Byte),
            Err(BridgeError::Range(_))
        ));
    }

    #[test]
    fn range_correctness_unsigned_short_bounds() {
        assert!(encode(&XsdValue::Int(0), &ValueType::UnsignedShort).is_ok());
        assert!(encode(&XsdValue::Int(65535), &ValueType::UnsignedShort).is_ok());
        assert!(matches!(
            encode(&XsdValue::Int(-1), &ValueType::UnsignedShort),
            Err(BridgeError::Range(_))
        ));
        assert!(matches!(
            encode(&XsdValue::Int(65536), &ValueType::UnsignedShort),
            Err(BridgeError::Range(_))
        ));
    }

    #[test]
    fn boolean_integer_coercion() {
        assert_eq!(
            encode(&XsdValue::Int(1), &ValueType::Boolean).unwrap(),
            Variant::Boolean(true)
        );
        assert_eq!(
            encode(&XsdValue::Int(0), &ValueType::Boolean).unwrap(),
            Variant::Boolean(false)
        );
        assert!(matches!(
            encode(&XsdValue::Int(2), &ValueType::Boolean),
            Err(BridgeError::Type(_))
        ));
    }

    #[test]
    fn float_narrowing_range_error() {
        assert!(matches!(
            encode(&XsdValue::Double(f64::MAX), &ValueType::Float),
            Err(BridgeError::Range(_))
        ));
    }

    #[test]
    fn null_without_nullable_flag_errors() {
        let result = decode(&Variant::Empty, &ValueType::Double, false);
        assert!(matches!(result, Err(BridgeError::Null(_))));
    }

    #[test]
    fn null_with_nullable_flag_is_placeholder() {
        let result = decode(&Variant::Empty, &ValueType::Double, true);
        assert_eq!(result.unwrap(), XsdValue::Double(0.0));
    }

    #[test]
    fn check_range_rejects_values_outside_configured_bounds() {
        let range = Some(Range { min: 0.0, max: 100.0 });
        assert!(check_range(&XsdValue::Double(50.0), &range).is_ok());
        assert!(matches!(
            check_range(&XsdValue::Double(150.0), &range),
            Err(BridgeError::Range(_))
        ));
        assert!(check_range(&XsdValue::String("x".into()), &range).is_ok());
    }

    #[test]
    fn hash_equal_for_equal_values_regardless_of_direction() {
        let a = XsdValue::Double(55.0);
        let b = XsdValue::Double(55.0);
        assert_eq!(hash(&a), hash(&b));

        let c = XsdValue::Double(55.1);
        assert_ne!(hash(&a), hash(&c));
    }
}
