// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TTN v2 uplink envelope.

use crate::decoder::DecodeError;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Subset of the TTN v2 uplink message used by the forwarder.
#[derive(Debug, Clone, Deserialize)]
pub struct TtnUplink {
    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub dev_id: String,

    #[serde(default)]
    pub hardware_serial: String,

    /// Decoded fields from the application payload formatter.
    #[serde(default)]
    pub payload_fields: Option<Map<String, Value>>,
}

impl TtnUplink {
    /// Parse an uplink message.
    pub fn parse(message: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(message).map_err(|e| DecodeError::MalformedPayload(e.to_string()))
    }

    /// Device identifier, preferring the hardware serial (DevEUI).
    pub fn device_id(&self) -> Option<&str> {
        [self.hardware_serial.as_str(), self.dev_id.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// Payload field map.
    pub fn fields(&self) -> Result<&Map<String, Value>, DecodeError> {
        self.payload_fields
            .as_ref()
            .ok_or_else(|| DecodeError::MalformedPayload("missing payload_fields".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "app_id": "particulatematter",
        "dev_id": "pm-sensor-7",
        "hardware_serial": "0004A30B001F1234",
        "port": 1,
        "counter": 42,
        "payload_raw": "AAEC",
        "payload_fields": {"PM10": 12.3, "PM2_5": 7.8},
        "metadata": {"time": "2019-03-01T12:00:00Z"}
    }"#;

    #[test]
    fn test_parse_sample() {
        let uplink = TtnUplink::parse(SAMPLE).expect("parse");
        assert_eq!(uplink.device_id(), Some("0004A30B001F1234"));
        let fields = uplink.fields().expect("fields");
        assert!(fields.contains_key("PM10"));
    }

    #[test]
    fn test_envelope_extras_do_not_reject() {
        // Values outside any fixed-width range must not drop the uplink.
        let uplink = TtnUplink::parse(
            r#"{"hardware_serial": "00AA", "port": 300, "counter": -1,
                "payload_fields": {"PM10": 1}}"#,
        )
        .expect("parse");
        assert_eq!(uplink.device_id(), Some("00AA"));
        assert!(uplink.fields().is_ok());
    }

    #[test]
    fn test_device_id_falls_back_to_dev_id() {
        let uplink = TtnUplink::parse(r#"{"dev_id": "node-1", "payload_fields": {}}"#)
            .expect("parse");
        assert_eq!(uplink.device_id(), Some("node-1"));

        let uplink = TtnUplink::parse(r#"{"payload_fields": {}}"#).expect("parse");
        assert_eq!(uplink.device_id(), None);
    }

    #[test]
    fn test_missing_fields() {
        let uplink = TtnUplink::parse(r#"{"dev_id": "node-1"}"#).expect("parse");
        assert!(matches!(uplink.fields(), Err(DecodeError::MalformedPayload(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(TtnUplink::parse("not json").is_err());
    }
}
