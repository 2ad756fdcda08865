// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Luftdaten push API (`/v1/push-sensor-data/`).

use super::naming::prefixed_body;
use super::{
    sensor_id, DeliveryOutcome, DestinationAdapter, Prepared, RestClient, SensorDataBody,
    SOFTWARE_VERSION,
};
use crate::reading::Reading;

const PUSH_PATH: &str = "/v1/push-sensor-data/";

/// Default `X-Pin` header value.
pub const DEFAULT_PIN: u16 = 1;

/// Generic destination using prefix naming. Not routed.
#[derive(Debug, Clone)]
pub struct LuftdatenAdapter {
    client: RestClient,
    pin: String,
}

impl LuftdatenAdapter {
    pub fn new(client: RestClient, pin: u16) -> Self {
        Self {
            client,
            pin: pin.to_string(),
        }
    }
}

impl DestinationAdapter for LuftdatenAdapter {
    fn name(&self) -> &str {
        "luftdaten"
    }

    fn build_body(&self, reading: &Reading, _routing: Option<&str>) -> Prepared {
        Prepared::Upload {
            key: sensor_id(&reading.device_id),
            body: prefixed_body(reading, SOFTWARE_VERSION),
        }
    }

    fn deliver(&self, key: &str, body: &SensorDataBody) -> DeliveryOutcome {
        self.client.post_json(
            PUSH_PATH,
            &[],
            &[("X-Sensor", key), ("X-Pin", self.pin.as_str())],
            body,
        )
    }
}
