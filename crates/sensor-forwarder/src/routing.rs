// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device routing table.
//!
//! Maps a device id to a destination-specific routing attribute (for
//! example an openSenseMap box id). The table is only ever replaced as a
//! whole:
//!
//! - **Reads**: `ArcSwap::load`, lock-free, one consistent snapshot per lookup
//! - **Writes**: build a new map, then `ArcSwap::store`
//!
//! A worker in the middle of a lookup keeps the old snapshot alive until it
//! is done with it.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// Named string attributes of one device.
pub type AttributeMap = HashMap<String, String>;

/// Device id -> routing attribute.
#[derive(Debug, Default)]
pub struct DeviceRoutingTable {
    entries: ArcSwap<HashMap<String, String>>,
}

impl DeviceRoutingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the whole table.
    pub fn replace(&self, entries: HashMap<String, String>) {
        self.entries.store(Arc::new(entries));
    }

    /// Routing attribute of a device.
    #[must_use]
    pub fn lookup(&self, device_id: &str) -> Option<String> {
        self.entries.load().get(device_id).cloned()
    }

    /// Rebuild from an attribute update, keeping only `key`.
    ///
    /// Devices whose attribute is missing or blank are left out of the new
    /// table. Returns the number of routed devices.
    pub fn refresh(&self, attributes: &HashMap<String, AttributeMap>, key: &str) -> usize {
        let entries: HashMap<String, String> = attributes
            .iter()
            .filter_map(|(device, attrs)| {
                let value = attrs.get(key)?.trim();
                (!value.is_empty()).then(|| (device.clone(), value.to_string()))
            })
            .collect();

        let count = entries.len();
        for (device, value) in &entries {
            tracing::info!("Routing {}: {} -> {}", key, device, value);
        }
        self.replace(entries);
        count
    }

    /// Current table snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HashMap<String, String>> {
        self.entries.load_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}
