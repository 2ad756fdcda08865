// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Uplink orchestration.
//!
//! The [`Forwarder`] decodes uplinks and hands the resulting reading to
//! every configured [`UploadDispatcher`]. It never performs network I/O on
//! the caller's thread and never returns an error to the ingestion path.

use crate::adapter::{
    AdapterError, DestinationAdapter, FeinStaubAdapter, LuftdatenAdapter, OpenSenseAdapter,
    RestClient,
};
use crate::config::ForwarderConfig;
use crate::decoder::{self, PayloadEncoding};
use crate::dispatcher::{DispatchError, DispatchStatsSnapshot, UploadDispatcher};
use crate::reading::{Measurements, Reading};
use crate::routing::{AttributeMap, DeviceRoutingTable};
use crate::uplink::TtnUplink;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Decodes uplinks and fans readings out to all destinations.
pub struct Forwarder {
    encoding: PayloadEncoding,
    dispatchers: Vec<UploadDispatcher>,
}

impl Forwarder {
    /// Create a forwarder over a fixed set of dispatchers.
    pub fn new(encoding: PayloadEncoding, dispatchers: Vec<UploadDispatcher>) -> Self {
        Self {
            encoding,
            dispatchers,
        }
    }

    /// Build adapters and dispatchers for every enabled destination.
    pub fn from_config(config: &ForwarderConfig) -> Result<Self, AdapterError> {
        let dispatcher =
            |adapter: Arc<dyn DestinationAdapter>, routing: Option<Arc<DeviceRoutingTable>>| {
                UploadDispatcher::new(adapter, routing, config.queue_capacity)
                    .with_shutdown_timeout(config.shutdown_timeout())
            };
        let mut dispatchers = Vec::new();

        if config.luftdaten.enabled {
            let client = RestClient::new(&config.luftdaten.url, config.luftdaten.timeout())?;
            let adapter: Arc<dyn DestinationAdapter> =
                Arc::new(LuftdatenAdapter::new(client, config.luftdaten.pin));
            dispatchers.push(dispatcher(adapter, None));
        }

        if config.feinstaub.enabled {
            let client = RestClient::new(&config.feinstaub.url, config.feinstaub.timeout())?;
            let adapter: Arc<dyn DestinationAdapter> = Arc::new(FeinStaubAdapter::new(client));
            dispatchers.push(dispatcher(adapter, None));
        }

        if config.opensense.enabled {
            let client = RestClient::new(&config.opensense.url, config.opensense.timeout())?;
            let adapter: Arc<dyn DestinationAdapter> = Arc::new(OpenSenseAdapter::new(
                client,
                config.opensense.attribute.clone(),
            ));
            let table = Arc::new(DeviceRoutingTable::new());
            dispatchers.push(dispatcher(adapter, Some(table)));
        }

        Ok(Self::new(config.encoding.clone(), dispatchers))
    }

    pub fn encoding(&self) -> &PayloadEncoding {
        &self.encoding
    }

    pub fn dispatchers(&self) -> &[UploadDispatcher] {
        &self.dispatchers
    }

    /// Start every dispatcher. Already started ones are stopped again on error.
    pub fn start(&self) -> Result<(), DispatchError> {
        tracing::info!("Starting forwarder with {} destination(s)", self.dispatchers.len());
        for (i, dispatcher) in self.dispatchers.iter().enumerate() {
            if let Err(e) = dispatcher.start() {
                for started in &self.dispatchers[..i] {
                    started.stop();
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop every dispatcher, draining queued uploads until each deadline.
    pub fn stop(&self) {
        tracing::info!("Stopping forwarder");
        for dispatcher in &self.dispatchers {
            dispatcher.stop();
        }
        tracing::info!("Stopped forwarder");
    }

    /// Handle one uplink payload received now.
    pub fn on_uplink(&self, device_id: &str, raw_payload: &[u8], encoding: &PayloadEncoding) {
        self.on_uplink_at(device_id, Utc::now(), raw_payload, encoding);
    }

    /// Handle one uplink payload with an explicit receive time.
    pub fn on_uplink_at(
        &self,
        device_id: &str,
        received_at: DateTime<Utc>,
        raw_payload: &[u8],
        encoding: &PayloadEncoding,
    ) {
        match decoder::decode(encoding, raw_payload) {
            Ok(measurements) => self.dispatch(device_id, received_at, measurements),
            Err(e) => tracing::warn!("Dropping uplink from {}: {}", device_id, e),
        }
    }

    /// Handle a TTN uplink message as received from MQTT.
    pub fn on_message(&self, received_at: DateTime<Utc>, topic: &str, message: &str) {
        tracing::debug!("Received on '{}': '{}'", topic, message);

        let uplink = match TtnUplink::parse(message) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("Could not parse uplink on '{}': {}", topic, e);
                return;
            }
        };
        let Some(device_id) = uplink.device_id() else {
            tracing::warn!("Dropping uplink on '{}': no device id", topic);
            return;
        };

        let decoded = uplink
            .fields()
            .and_then(|fields| decoder::decode_fields(&self.encoding, fields));
        match decoded {
            Ok(measurements) => self.dispatch(device_id, received_at, measurements),
            Err(e) => tracing::warn!("Dropping uplink from {}: {}", device_id, e),
        }
    }

    fn dispatch(&self, device_id: &str, received_at: DateTime<Utc>, measurements: Measurements) {
        let reading = Reading::from_measurements(device_id, received_at, measurements);
        tracing::debug!("Dispatching {} value(s) from {}", reading.len(), device_id);
        for dispatcher in &self.dispatchers {
            dispatcher.schedule_upload(device_id, &reading);
        }
    }

    /// Refresh the routing table of every routed destination.
    pub fn process_attributes(&self, attributes: &HashMap<String, AttributeMap>) {
        for dispatcher in &self.dispatchers {
            let (Some(key), Some(table)) = (
                dispatcher.adapter().routing_attribute(),
                dispatcher.routing_table(),
            ) else {
                continue;
            };
            let count = table.refresh(attributes, key);
            tracing::info!(
                "Routing table for {} refreshed: {} of {} device(s)",
                dispatcher.name(),
                count,
                attributes.len()
            );
        }
    }

    /// Per-destination statistics.
    pub fn stats(&self) -> Vec<DispatchStatsSnapshot> {
        self.dispatchers.iter().map(|d| d.stats()).collect()
    }
}
