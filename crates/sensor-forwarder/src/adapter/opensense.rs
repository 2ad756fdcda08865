// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! openSenseMap upload (`/boxes/{boxId}/data?luftdaten=true`).
//!
//! Devices are addressed by their box id, taken from the routing table.
//! The `luftdaten=true` flag tells the server to map the Luftdaten item
//! names onto the box's sensors.

use super::naming::prefixed_body;
use super::{
    DeliveryOutcome, DestinationAdapter, Prepared, RestClient, SensorDataBody, SOFTWARE_VERSION,
};
use crate::reading::Reading;
use reqwest::Url;

/// Default device attribute holding the box id.
pub const DEFAULT_ROUTING_ATTRIBUTE: &str = "opensense-id";

#[derive(Debug, Clone)]
pub struct OpenSenseAdapter {
    client: RestClient,
    attribute: String,
}

impl OpenSenseAdapter {
    pub fn new(client: RestClient, attribute: impl Into<String>) -> Self {
        Self {
            client,
            attribute: attribute.into(),
        }
    }

    /// Data URL for a box. The id is one encoded path segment.
    fn data_url(&self, box_id: &str) -> Url {
        self.client.segments_url(&["boxes", box_id, "data"])
    }
}

impl DestinationAdapter for OpenSenseAdapter {
    fn name(&self) -> &str {
        "opensense"
    }

    fn routing_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn build_body(&self, reading: &Reading, routing: Option<&str>) -> Prepared {
        match routing.map(str::trim) {
            Some(box_id) if !box_id.is_empty() => Prepared::Upload {
                key: box_id.to_string(),
                body: prefixed_body(reading, SOFTWARE_VERSION),
            },
            _ => Prepared::Skip,
        }
    }

    fn deliver(&self, key: &str, body: &SensorDataBody) -> DeliveryOutcome {
        self.client
            .post_json_to(self.data_url(key), &[("luftdaten", "true")], &[], body)
    }
}
