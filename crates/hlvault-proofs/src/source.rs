//! Proof dataset sources.
//!
//! Remote proof sets must come over https (plain http only for loopback
//! hosts) and redirects are refused: a redirected proof source is treated
//! as tampering.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{redirect, Client, Url};
use serde_json::Value;
use tracing::{debug, info};

use crate::dataset::{ProofDataset, INLINE_LABEL};
use crate::error::{ProofError, ProofResult};

/// Where a proof set comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofSource {
    /// Dataset object or array of dataset objects.
    Inline(Value),
    Url(String),
}

/// Fetches proof sets and caches URL results for the lifetime of the
/// fetcher.
pub struct ProofFetcher {
    client: Client,
    cache: Mutex<HashMap<String, Vec<ProofDataset>>>,
}

impl ProofFetcher {
    pub fn new(timeout: Duration) -> ProofResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ProofError::Fetch {
                url: String::new(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Load every dataset in `source`.
    pub async fn load(&self, source: &ProofSource) -> ProofResult<Vec<ProofDataset>> {
        match source {
            ProofSource::Inline(value) => {
                debug!("Loading proof set from inline blob");
                ProofDataset::parse_many(value, INLINE_LABEL)
            }
            ProofSource::Url(url) => self.fetch_url(url).await,
        }
    }

    async fn fetch_url(&self, url: &str) -> ProofResult<Vec<ProofDataset>> {
        let cached = self.cache.lock().get(url).cloned();
        if let Some(cached) = cached {
            debug!(url, "Proof set served from cache");
            return Ok(cached);
        }

        let parsed = validate_source_url(url)?;
        info!(url, "Fetching proof set");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| ProofError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>")
                .to_string();
            return Err(ProofError::Redirect {
                url: url.to_string(),
                status: status.as_u16(),
                location,
            });
        }
        if !status.is_success() {
            return Err(ProofError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| ProofError::Fetch {
            url: url.to_string(),
            message: format!("invalid JSON: {e}"),
        })?;
        let datasets = ProofDataset::parse_many(&body, url)?;

        self.cache.lock().insert(url.to_string(), datasets.clone());
        Ok(datasets)
    }
}

/// Accept https, or http to a loopback host.
pub fn validate_source_url(raw: &str) -> ProofResult<Url> {
    let insecure = || ProofError::InsecureSource {
        url: raw.to_string(),
    };
    let url = Url::parse(raw).map_err(|_| insecure())?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        _ => Err(insecure()),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}
