// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor uplink forwarder
//!
//! Receives LoRaWAN air-quality uplinks, normalizes them into sensor
//! readings and uploads them to public data collectors.
//!
//! # Pipeline
//!
//! ```text
//! MQTT ──► uplink ──► decoder ──► Reading ──► Forwarder
//!                                              ├─► dispatcher ──► Luftdaten
//!                                              ├─► dispatcher ──► FeinStaub
//!                                              └─► dispatcher ──► openSenseMap
//!                                                                 (routed)
//! ```
//!
//! - **Decoding**: closed set of payload encodings (RUDZL)
//! - **Naming**: per-destination item names, prefixed by sensor generation
//! - **Routing**: hot-swappable device -> box id table
//! - **Dispatch**: one sequential worker per destination, never blocks ingestion
//!
//! # Configuration File
//!
//! ```toml
//! encoding = "RUDZL"
//!
//! [mqtt]
//! host = "eu.thethings.network"
//! app_id = "particulatematter"
//! app_key = "ttn-account-v2.secret"
//!
//! [luftdaten]
//! url = "https://api.luftdaten.info"
//!
//! [opensense]
//! url = "https://api.opensensemap.org"
//!
//! [attributes]
//! file = "devices.toml"
//! ```

pub mod adapter;
pub mod attributes;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod forwarder;
pub mod mqtt;
pub mod reading;
pub mod routing;
pub mod uplink;

pub use adapter::{
    DeliveryOutcome, DestinationAdapter, FeinStaubAdapter, LuftdatenAdapter, OpenSenseAdapter,
    Prepared, RestClient, SensorDataBody, SensorDataValue,
};
pub use attributes::{load_device_attributes, AttributeRefresher};
pub use config::{ConfigError, ForwarderConfig};
pub use decoder::{decode, DecodeError, PayloadEncoding};
pub use dispatcher::{
    DispatchError, DispatchStats, DispatchStatsSnapshot, ScheduleOutcome, UploadDispatcher,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use forwarder::Forwarder;
pub use mqtt::MqttListener;
pub use reading::{MeasurementKind, Reading};
pub use routing::{AttributeMap, DeviceRoutingTable};
