// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device attribute source.
//!
//! Attributes live in a TOML file, one table per device:
//!
//! ```toml
//! [devices."0004A30B001F1234"]
//! opensense-id = "5a0c2cc89fd3c200111118f0"
//! location = "roof"
//! ```
//!
//! [`AttributeRefresher`] re-reads the file periodically and hands the full
//! map to a callback (normally [`Forwarder::process_attributes`]).
//!
//! [`Forwarder::process_attributes`]: crate::forwarder::Forwarder::process_attributes

use crate::config::ConfigError;
use crate::routing::AttributeMap;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
struct DeviceFile {
    #[serde(default)]
    devices: HashMap<String, AttributeMap>,
}

/// Load device attributes from a TOML file.
pub fn load_device_attributes<P: AsRef<Path>>(
    path: P,
) -> Result<HashMap<String, AttributeMap>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_device_attributes(&content)
}

/// Parse device attributes from TOML text.
pub fn parse_device_attributes(
    content: &str,
) -> Result<HashMap<String, AttributeMap>, ConfigError> {
    let file: DeviceFile = toml::from_str(content)?;
    Ok(file.devices)
}

/// Background thread that reloads the attribute file.
pub struct AttributeRefresher {
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AttributeRefresher {
    /// Load once immediately, then every `interval` until stopped.
    pub fn spawn<F>(path: PathBuf, interval: Duration, on_update: F) -> std::io::Result<Self>
    where
        F: Fn(&HashMap<String, AttributeMap>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let thread_handle = thread::Builder::new()
            .name("forwarder-attributes".to_string())
            .spawn(move || loop {
                match load_device_attributes(&path) {
                    Ok(attributes) => {
                        tracing::debug!(
                            "Loaded attributes for {} device(s) from {}",
                            attributes.len(),
                            path.display()
                        );
                        on_update(&attributes);
                    }
                    Err(e) => tracing::warn!(
                        "Failed to load attributes from {}, keeping previous: {}",
                        path.display(),
                        e
                    ),
                }

                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
        })
    }

    /// Stop the refresher and wait for its thread.
    pub fn stop(&mut self) {
        // Dropping the sender wakes the thread.
        self.stop_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("Attribute refresher terminated abnormally");
            }
        }
    }
}

impl Drop for AttributeRefresher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SAMPLE: &str = r#"
        [devices."0004A30B001F1234"]
        opensense-id = "5a0c2cc89fd3c200111118f0"
        location = "roof"

        [devices.node-2]
        location = "garden"
    "#;

    #[test]
    fn test_parse() {
        let attrs = parse_device_attributes(SAMPLE).expect("parse");
        assert_eq!(attrs.len(), 2);
        assert_eq!(
            attrs["0004A30B001F1234"].get("opensense-id").map(String::as_str),
            Some("5a0c2cc89fd3c200111118f0")
        );
        assert!(!attrs["node-2"].contains_key("opensense-id"));
    }

    #[test]
    fn test_empty_file() {
        assert!(parse_device_attributes("").expect("parse").is_empty());
    }

    #[test]
    fn test_invalid_file() {
        assert!(matches!(
            parse_device_attributes("[devices.x]\nopensense-id = 5"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_refresher_loads_and_stops() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devices.toml");
        std::fs::write(&path, SAMPLE).expect("write");

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut refresher = AttributeRefresher::spawn(path, Duration::from_secs(3600), move |a| {
            assert_eq!(a.len(), 2);
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        refresher.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refresher_missing_file_keeps_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let refresher = AttributeRefresher::spawn(
            PathBuf::from("/nonexistent/devices.toml"),
            Duration::from_millis(10),
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        )
        .expect("spawn");
        thread::sleep(Duration::from_millis(50));
        drop(refresher);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
