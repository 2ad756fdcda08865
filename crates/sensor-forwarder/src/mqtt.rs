// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT ingestion from a TTN v2 application broker.

use crate::config::MqttConfig;
use chrono::{DateTime, Utc};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Subscribes to uplink topics and forwards every publish to a handler.
pub struct MqttListener {
    client: Client,
    topic: String,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MqttListener {
    /// Connect and start the event loop thread.
    ///
    /// The handler runs on the MQTT thread and must not block.
    pub fn start<F>(config: &MqttConfig, handler: F) -> std::io::Result<Self>
    where
        F: Fn(DateTime<Utc>, &str, &str) + Send + 'static,
    {
        let client_id = format!("sensor-forwarder-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if !config.app_id.is_empty() {
            options.set_credentials(config.app_id.clone(), config.app_key.clone());
        }

        let (client, mut connection) = Client::new(options, 10);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);
        let subscriber = client.clone();
        let topic = config.topic.clone();
        let thread_topic = topic.clone();

        tracing::info!(
            "Connecting to MQTT broker {}:{} (topic '{}')",
            config.host,
            config.port,
            topic
        );

        let thread_handle = thread::Builder::new()
            .name("forwarder-mqtt".to_string())
            .spawn(move || {
                for notification in connection.iter() {
                    if !running_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            tracing::info!("MQTT connected, subscribing to '{}'", thread_topic);
                            let subscribed = subscriber
                                .try_subscribe(thread_topic.as_str(), QoS::AtLeastOnce);
                            if let Err(e) = subscribed {
                                tracing::error!("MQTT subscribe failed: {}", e);
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            match std::str::from_utf8(&publish.payload) {
                                Ok(text) => handler(Utc::now(), &publish.topic, text),
                                Err(e) => tracing::warn!(
                                    "Dropping non-UTF-8 message on '{}': {}",
                                    publish.topic,
                                    e
                                ),
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            if !running_clone.load(Ordering::Relaxed) {
                                break;
                            }
                            tracing::warn!(
                                "MQTT connection error: {}, retrying in {:?}",
                                e,
                                RECONNECT_DELAY
                            );
                            thread::sleep(RECONNECT_DELAY);
                        }
                    }
                }
                tracing::debug!("MQTT event loop exited");
            })?;

        Ok(Self {
            client,
            topic,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Disconnect and join the event loop thread.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        tracing::info!("Stopping MQTT listener");
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!("MQTT disconnect: {}", e);
        }
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("MQTT thread terminated abnormally");
            }
        }
    }
}

impl Drop for MqttListener {
    fn drop(&mut self) {
        self.stop();
    }
}
