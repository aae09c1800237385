//! Plain HTTP retrieval shared by the link sources and the enrichment step.

use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Thin wrapper around a shared [`reqwest::Client`].
///
/// Every call carries its own timeout and every failure (network error,
/// non-success status, unreadable body) collapses into `None`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// Fetch `url` and return its body when the server answered with a
    /// success status.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_content(&self, url: &str, timeout: Duration) -> Option<String> {
        let t0 = Instant::now();
        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, timed_out = e.is_timeout(), "Fetch failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Fetch returned non-success status");
            return None;
        }

        match response.text().await {
            Ok(body) => {
                debug!(%url, bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched");
                Some(body)
            }
            Err(e) => {
                warn!(%url, error = %e, "Failed reading response body");
                None
            }
        }
    }
}
