// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! FeinStaub (madavi-style) API.
//!
//! Uses one fixed name per kind regardless of which sensor produced it.
//! PM1.0 and PM4.0 have no name here and are left out.

use super::{
    sensor_id, DeliveryOutcome, DestinationAdapter, Prepared, RestClient, SensorDataBody,
    SensorDataValue,
};
use crate::reading::{MeasurementKind, Reading};

const DATA_PATH: &str = "/data.php";

/// Software version tag sent in every body.
pub const FEINSTAUB_SOFTWARE_VERSION: &str = "SensorForwarder";

const FIXED_NAMES: [(MeasurementKind, &str); 5] = [
    (MeasurementKind::Pm10, "SDS_P1"),
    (MeasurementKind::Pm2_5, "SDS_P2"),
    (MeasurementKind::Humidity, "humidity"),
    (MeasurementKind::Temperature, "temperature"),
    (MeasurementKind::Pressure, "pressure"),
];

#[derive(Debug, Clone)]
pub struct FeinStaubAdapter {
    client: RestClient,
}

impl FeinStaubAdapter {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

impl DestinationAdapter for FeinStaubAdapter {
    fn name(&self) -> &str {
        "feinstaub"
    }

    fn build_body(&self, reading: &Reading, _routing: Option<&str>) -> Prepared {
        let mut body = SensorDataBody::new(FEINSTAUB_SOFTWARE_VERSION);
        for (kind, name) in FIXED_NAMES {
            if let Some(value) = reading.get(kind) {
                body.push(SensorDataValue::number(name, value));
            }
        }
        Prepared::Upload {
            key: sensor_id(&reading.device_id),
            body,
        }
    }

    fn deliver(&self, key: &str, body: &SensorDataBody) -> DeliveryOutcome {
        self.client
            .post_json(DATA_PATH, &[], &[("X-Sensor", key)], body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn adapter() -> FeinStaubAdapter {
        FeinStaubAdapter::new(
            RestClient::new("http://127.0.0.1:9", Duration::from_secs(1)).expect("client"),
        )
    }

    #[test]
    fn test_fixed_names_ignore_sensor_generation() {
        let reading = Reading::new("Y", Utc::now())
            .with(MeasurementKind::Pm1_0, 1.0)
            .with(MeasurementKind::Pm2_5, 2.0)
            .with(MeasurementKind::Pm4_0, 3.0)
            .with(MeasurementKind::Pm10, 4.0)
            .with(MeasurementKind::Temperature, 20.0);

        let Prepared::Upload { key, body } = adapter().build_body(&reading, None) else {
            panic!("feinstaub never skips");
        };
        assert_eq!(key, "TTN-Y");
        assert_eq!(body.software_version, FEINSTAUB_SOFTWARE_VERSION);
        assert_eq!(body.value_types(), vec!["SDS_P1", "SDS_P2", "temperature"]);
    }

    #[test]
    fn test_routing_is_ignored() {
        let a = adapter();
        assert!(a.routing_attribute().is_none());
        let reading = Reading::new("Z", Utc::now());
        assert!(matches!(
            a.build_body(&reading, None),
            Prepared::Upload { ref body, .. } if body.is_empty()
        ));
    }
}
