// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Destination adapters.
//!
//! An adapter turns a [`Reading`] into a destination-specific body
//! ([`DestinationAdapter::build_body`], pure) and posts it
//! ([`DestinationAdapter::deliver`], blocking network call). Adapters are
//! driven by an [`UploadDispatcher`](crate::dispatcher::UploadDispatcher)
//! worker and never by the ingestion path.
//!
//! # Adapters
//!
//! - [`LuftdatenAdapter`]: generic push API, prefix naming
//! - [`FeinStaubAdapter`]: fixed names, fixed software tag
//! - [`OpenSenseAdapter`]: prefix naming, routed by box id

pub mod feinstaub;
pub mod http;
pub mod luftdaten;
pub mod naming;
pub mod opensense;

pub use feinstaub::FeinStaubAdapter;
pub use http::RestClient;
pub use luftdaten::LuftdatenAdapter;
pub use opensense::OpenSenseAdapter;

use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Software version reported by prefix-naming destinations.
pub const SOFTWARE_VERSION: &str = concat!("sensor-forwarder-", env!("CARGO_PKG_VERSION"));

/// Adapter construction errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid destination URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Value of a single data item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One `(value_type, value)` item in the destination vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDataValue {
    pub value_type: String,
    pub value: ItemValue,
}

impl SensorDataValue {
    pub fn number(value_type: impl Into<String>, value: f64) -> Self {
        Self {
            value_type: value_type.into(),
            value: ItemValue::Number(value),
        }
    }

    pub fn text(value_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value_type: value_type.into(),
            value: ItemValue::Text(value.into()),
        }
    }
}

/// Item-list body shared by all destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDataBody {
    pub software_version: String,
    pub sensordatavalues: Vec<SensorDataValue>,
}

impl SensorDataBody {
    pub fn new(software_version: impl Into<String>) -> Self {
        Self {
            software_version: software_version.into(),
            sensordatavalues: Vec::new(),
        }
    }

    pub fn push(&mut self, item: SensorDataValue) {
        self.sensordatavalues.push(item);
    }

    /// Item names, in wire order.
    pub fn value_types(&self) -> Vec<&str> {
        self.sensordatavalues
            .iter()
            .map(|v| v.value_type.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sensordatavalues.is_empty()
    }
}

impl fmt::Display for SensorDataBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{software_version={},items=[", self.software_version)?;
        for (i, item) in self.sensordatavalues.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", item.value_type, item.value)?;
        }
        f.write_str("]}")
    }
}

/// Result of [`DestinationAdapter::build_body`].
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Deliver `body`, addressed by `key` (sensor id or box id).
    Upload { key: String, body: SensorDataBody },

    /// Device not addressable at this destination. Not an error.
    Skip,
}

/// Result of [`DestinationAdapter::deliver`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// 2xx response.
    Success { status: u16, detail: String },

    /// Non-success status from the server.
    RejectedByServer { status: u16, detail: String },

    /// Connection, timeout or I/O failure.
    TransportError(String),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A destination for sensor readings.
pub trait DestinationAdapter: Send + Sync {
    /// Destination name, used for logging and thread naming.
    fn name(&self) -> &str;

    /// Attribute key this destination routes on, if any.
    fn routing_attribute(&self) -> Option<&str> {
        None
    }

    /// Map a reading into a wire body. `routing` is the device's routing
    /// attribute looked up by the dispatcher.
    fn build_body(&self, reading: &Reading, routing: Option<&str>) -> Prepared;

    /// POST a prepared body.
    fn deliver(&self, key: &str, body: &SensorDataBody) -> DeliveryOutcome;
}

/// Sensor id used in the `X-Sensor` header.
pub fn sensor_id(device_id: &str) -> String {
    format!("TTN-{}", device_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_json_shape() {
        let mut body = SensorDataBody::new("test");
        body.push(SensorDataValue::number("SDS_P1", 12.3));
        body.push(SensorDataValue::text("signal", "-80"));

        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "software_version": "test",
                "sensordatavalues": [
                    {"value_type": "SDS_P1", "value": 12.3},
                    {"value_type": "signal", "value": "-80"}
                ]
            })
        );
    }

    #[test]
    fn test_body_display() {
        let mut body = SensorDataBody::new("v1");
        body.push(SensorDataValue::number("SDS_P1", 4.0));
        body.push(SensorDataValue::number("SDS_P2", 2.5));
        assert_eq!(body.to_string(), "{software_version=v1,items=[SDS_P1=4,SDS_P2=2.5]}");
    }

    #[test]
    fn test_sensor_id() {
        assert_eq!(sensor_id("0004A30B001F1234"), "TTN-0004A30B001F1234");
    }
}
