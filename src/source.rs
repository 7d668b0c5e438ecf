// Source Module - Reading and writing add-on options on the device
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::options::AddonsSnapshot;

const GET_ADDONS_PATH: &str = "/api/getAddonsOptions";
const SET_ADDONS_PATH: &str = "/api/setAddonsOptions";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[cfg(test)]
    #[error("{0}")]
    Unavailable(String),
}

/// Where the form's options come from and go back to.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<AddonsSnapshot, SourceError>;

    /// Write the complete option set. Ok(false) means the device refused it.
    async fn save(&self, options: &Map<String, Value>) -> Result<bool, SourceError>;
}

/// The device's built-in web configurator API.
pub struct HttpConfigSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpConfigSource {
    pub fn new(base_url: &str) -> Self {
        HttpConfigSource {
            base_url: normalize_base_url(base_url),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn load(&self) -> Result<AddonsSnapshot, SourceError> {
        let url = self.url(GET_ADDONS_PATH);
        debug!(%url, "loading add-on options");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| SourceError::Transport { url: url.clone(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { url, status });
        }

        response
            .json::<AddonsSnapshot>()
            .await
            .map_err(|source| SourceError::Decode { url, source })
    }

    async fn save(&self, options: &Map<String, Value>) -> Result<bool, SourceError> {
        let url = self.url(SET_ADDONS_PATH);
        debug!(%url, fields = options.len(), "saving add-on options");

        let response = self
            .client
            .post(&url)
            .json(options)
            .send()
            .await
            .map_err(|source| SourceError::Transport { url: url.clone(), source })?;

        Ok(response.status().is_success())
    }
}

// "192.168.7.1" -> "http://192.168.7.1", trailing slashes dropped
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::sync::Mutex;

    /// Stand-in device for tests: serves a fixed snapshot and records writes.
    #[derive(Default)]
    pub struct MemorySource {
        pub snapshot: Option<AddonsSnapshot>,
        pub accept_saves: bool,
        pub saved: Mutex<Vec<Map<String, Value>>>,
    }

    impl MemorySource {
        pub fn with_json(data: Value) -> Self {
            MemorySource {
                snapshot: serde_json::from_value(data).ok(),
                accept_saves: true,
                saved: Mutex::new(Vec::new()),
            }
        }

        pub fn unreachable() -> Self {
            MemorySource::default()
        }

        pub fn saves(&self) -> Vec<Map<String, Value>> {
            self.saved.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ConfigSource for MemorySource {
        async fn load(&self) -> Result<AddonsSnapshot, SourceError> {
            self.snapshot
                .clone()
                .ok_or_else(|| SourceError::Unavailable("device offline".to_string()))
        }

        async fn save(&self, options: &Map<String, Value>) -> Result<bool, SourceError> {
            if let Ok(mut saved) = self.saved.lock() {
                saved.push(options.clone());
            }
            Ok(self.accept_saves)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(normalize_base_url("192.168.7.1"), "http://192.168.7.1");
        assert_eq!(normalize_base_url(" http://gp2040.local/ "), "http://gp2040.local");
        assert_eq!(normalize_base_url("https://pad:8080//"), "https://pad:8080");
    }

    #[test]
    fn endpoint_urls() {
        let source = HttpConfigSource::new("192.168.7.1");
        assert_eq!(source.url(GET_ADDONS_PATH), "http://192.168.7.1/api/getAddonsOptions");
        assert_eq!(source.url(SET_ADDONS_PATH), "http://192.168.7.1/api/setAddonsOptions");
    }

    #[tokio::test]
    async fn unreachable_device_is_a_transport_error() {
        // Port 9 (discard) on localhost is closed on any sane test machine
        let source = HttpConfigSource::new("http://127.0.0.1:9");
        match source.load().await {
            Err(SourceError::Transport { url, .. }) => {
                assert_eq!(url, "http://127.0.0.1:9/api/getAddonsOptions")
            }
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
    }
}
