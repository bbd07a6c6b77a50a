// src/repository/client.rs

//! HTTP access to the pkgsrc mirror
//!
//! The only remote content the engine reads is the yearly `CHANGES-YYYY`
//! file. Fetching goes through [`ChangelogSource`] so tests and offline
//! callers can substitute their own source.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches the text of a changelog URL
pub trait ChangelogSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP client bounded by a request timeout
pub struct MirrorClient {
    client: Client,
}

impl MirrorClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nbpkgquery/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl ChangelogSource for MirrorClient {
    fn fetch(&self, url: &str) -> Result<String> {
        info!("Fetching changelog from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Network(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body = response
            .text()
            .map_err(|e| Error::Network(format!("Failed to read response from {}: {}", url, e)))?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
