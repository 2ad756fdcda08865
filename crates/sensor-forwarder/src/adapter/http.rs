// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking JSON POST client shared by the adapters.

use super::{AdapterError, DeliveryOutcome, SensorDataBody};
use reqwest::blocking::Client;
use reqwest::{IntoUrl, Url};
use std::time::Duration;

/// HTTP client bound to one destination base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    base: String,
    root: Url,
    timeout: Duration,
    client: Client,
}

impl RestClient {
    /// Create a client for `base_url` with a whole-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AdapterError> {
        let root = Url::parse(base_url).map_err(|e| AdapterError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if root.cannot_be_a_base() {
            return Err(AdapterError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".into(),
            });
        }

        tracing::info!(
            "Creating REST client for '{}' with timeout {:?}",
            base_url,
            timeout
        );
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sensor-forwarder/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            root,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL for a path relative to the base.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// URL below the base built from path segments. Each segment is
    /// percent-encoded, so `/`, `?` and `#` stay inside it.
    pub fn segments_url(&self, segments: &[&str]) -> Url {
        let mut url = self.root.clone();
        // Only fails for cannot-be-a-base URLs, rejected in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// POST `body` as JSON to a path relative to the base.
    pub fn post_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: &SensorDataBody,
    ) -> DeliveryOutcome {
        self.post_json_to(self.url(path), query, headers, body)
    }

    /// POST `body` as JSON to `url` and classify the response.
    pub fn post_json_to<U: IntoUrl>(
        &self,
        url: U,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: &SensorDataBody,
    ) -> DeliveryOutcome {
        let mut request = self.client.post(url).json(body);
        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = match request.send() {
            Ok(r) => r,
            Err(e) => return DeliveryOutcome::TransportError(e.to_string()),
        };

        let status = response.status();
        let detail = match response.text() {
            Ok(text) => text,
            Err(e) => return DeliveryOutcome::TransportError(e.to_string()),
        };

        if status.is_success() {
            DeliveryOutcome::Success {
                status: status.as_u16(),
                detail,
            }
        } else {
            DeliveryOutcome::RejectedByServer {
                status: status.as_u16(),
                detail,
            }
        }
    }
}
