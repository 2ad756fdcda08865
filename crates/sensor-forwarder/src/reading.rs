// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Normalized sensor reading.
//!
//! A [`Reading`] is a sparse set of measurements for one device at one
//! instant. A kind that is absent from the map was not measured; a measured
//! zero is stored as `0.0`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Measurement kinds a reading can carry.
///
/// Declaration order is the emission order used by destination adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementKind {
    Pm10,
    Pm2_5,
    Pm1_0,
    Pm4_0,
    Humidity,
    Temperature,
    Pressure,
}

impl MeasurementKind {
    /// All kinds, in emission order.
    pub const ALL: [MeasurementKind; 7] = [
        MeasurementKind::Pm10,
        MeasurementKind::Pm2_5,
        MeasurementKind::Pm1_0,
        MeasurementKind::Pm4_0,
        MeasurementKind::Humidity,
        MeasurementKind::Temperature,
        MeasurementKind::Pressure,
    ];

    /// Particulate matter kinds.
    pub const PARTICULATE: [MeasurementKind; 4] = [
        MeasurementKind::Pm10,
        MeasurementKind::Pm2_5,
        MeasurementKind::Pm1_0,
        MeasurementKind::Pm4_0,
    ];

    /// Meteorological kinds.
    pub const METEO: [MeasurementKind; 3] = [
        MeasurementKind::Humidity,
        MeasurementKind::Temperature,
        MeasurementKind::Pressure,
    ];

    /// Wire suffix appended after a destination prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Pm10 => "P1",
            Self::Pm2_5 => "P2",
            Self::Pm1_0 => "P0",
            Self::Pm4_0 => "P4",
            Self::Humidity => "humidity",
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
        }
    }

    /// True for the particulate matter group.
    pub fn is_particulate(self) -> bool {
        matches!(self, Self::Pm10 | Self::Pm2_5 | Self::Pm1_0 | Self::Pm4_0)
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pm10 => "PM10",
            Self::Pm2_5 => "PM2_5",
            Self::Pm1_0 => "PM1_0",
            Self::Pm4_0 => "PM4_0",
            Self::Humidity => "HUMIDITY",
            Self::Temperature => "TEMPERATURE",
            Self::Pressure => "PRESSURE",
        };
        f.write_str(name)
    }
}

/// Sparse measurement map.
pub type Measurements = BTreeMap<MeasurementKind, f64>;

/// One sensor sample for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Opaque device identifier.
    pub device_id: String,

    /// Instant the sample was received.
    pub timestamp: DateTime<Utc>,

    values: Measurements,
}

impl Reading {
    /// Create an empty reading.
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            values: Measurements::new(),
        }
    }

    /// Build a reading from decoded measurements, discarding non-finite values.
    pub fn from_measurements(
        device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        measurements: Measurements,
    ) -> Self {
        let mut reading = Self::new(device_id, timestamp);
        for (kind, value) in measurements {
            reading.set(kind, value);
        }
        reading
    }

    /// Builder-style [`Reading::set`].
    pub fn with(mut self, kind: MeasurementKind, value: f64) -> Self {
        self.set(kind, value);
        self
    }

    /// Store a value. Returns false (and stores nothing) for NaN or infinity.
    pub fn set(&mut self, kind: MeasurementKind, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.values.insert(kind, value);
        true
    }

    /// Value of a kind, if measured.
    pub fn get(&self, kind: MeasurementKind) -> Option<f64> {
        self.values.get(&kind).copied()
    }

    pub fn has(&self, kind: MeasurementKind) -> bool {
        self.values.contains_key(&kind)
    }

    /// True when every listed kind is present.
    pub fn has_all(&self, kinds: &[MeasurementKind]) -> bool {
        kinds.iter().all(|k| self.has(*k))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Present measurements in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (MeasurementKind, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}
