// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload decoding.
//!
//! Converts an encoding-tagged uplink payload into [`Measurements`]. The
//! payload is the field map produced by the network server's payload
//! formatter (string keys, primitive values).

use crate::reading::{MeasurementKind, Measurements};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Decode failures. The event is dropped on either.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unsupported payload encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Payload encodings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PayloadEncoding {
    /// Field map with `PM10` and `PM2_5` entries.
    #[default]
    Rudzl,

    /// Any other configured id.
    Unsupported(String),
}

impl PayloadEncoding {
    pub fn id(&self) -> &str {
        match self {
            Self::Rudzl => "RUDZL",
            Self::Unsupported(id) => id,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl FromStr for PayloadEncoding {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("rudzl") {
            Ok(Self::Rudzl)
        } else {
            Ok(Self::Unsupported(s.trim().to_string()))
        }
    }
}

impl TryFrom<String> for PayloadEncoding {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PayloadEncoding> for String {
    fn from(e: PayloadEncoding) -> Self {
        e.id().to_string()
    }
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

const RUDZL_FIELDS: [(&str, MeasurementKind); 2] = [
    ("PM10", MeasurementKind::Pm10),
    ("PM2_5", MeasurementKind::Pm2_5),
];

/// Decode raw payload bytes (a JSON object) into measurements.
pub fn decode(encoding: &PayloadEncoding, raw: &[u8]) -> Result<Measurements, DecodeError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;
    match value {
        Value::Object(fields) => decode_fields(encoding, &fields),
        other => Err(DecodeError::MalformedPayload(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

/// Decode an already extracted field map.
pub fn decode_fields(
    encoding: &PayloadEncoding,
    fields: &Map<String, Value>,
) -> Result<Measurements, DecodeError> {
    match encoding {
        PayloadEncoding::Rudzl => Ok(decode_rudzl(fields)),
        PayloadEncoding::Unsupported(id) => Err(DecodeError::UnsupportedEncoding(id.clone())),
    }
}

fn decode_rudzl(fields: &Map<String, Value>) -> Measurements {
    let mut out = Measurements::new();
    for (name, kind) in RUDZL_FIELDS {
        if let Some(v) = fields.get(name).and_then(numeric) {
            out.insert(kind, v);
        }
    }
    out
}

/// Numbers and numeric strings; anything non-finite counts as absent.
fn numeric(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rudzl_both_fields() {
        let m = decode(&PayloadEncoding::Rudzl, br#"{"PM10": 12.3, "PM2_5": 7.8}"#)
            .expect("decode");
        assert_eq!(m.get(&MeasurementKind::Pm10), Some(&12.3));
        assert_eq!(m.get(&MeasurementKind::Pm2_5), Some(&7.8));
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let m = decode(&PayloadEncoding::Rudzl, br#"{"battery": 3.3}"#).expect("decode");
        assert!(m.is_empty());
    }

    #[test]
    fn test_string_values_and_garbage() {
        let m = decode(&PayloadEncoding::Rudzl, br#"{"PM10": "4.5", "PM2_5": true}"#)
            .expect("decode");
        assert_eq!(m.get(&MeasurementKind::Pm10), Some(&4.5));
        assert!(!m.contains_key(&MeasurementKind::Pm2_5));
    }

    #[test]
    fn test_unparsable_payload() {
        let err = decode(&PayloadEncoding::Rudzl, b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload(_)));

        let err = decode(&PayloadEncoding::Rudzl, b"[1, 2]").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload(_)));
    }

    #[test]
    fn test_unsupported_encoding() {
        let enc: PayloadEncoding = "cayenne".parse().expect("infallible");
        let err = decode(&enc, br#"{"PM10": 1}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedEncoding("cayenne".into()));
    }

    #[test]
    fn test_encoding_parse_case_insensitive() {
        assert_eq!("rudzl".parse::<PayloadEncoding>().ok(), Some(PayloadEncoding::Rudzl));
        assert_eq!(PayloadEncoding::Rudzl.to_string(), "RUDZL");
    }
}
