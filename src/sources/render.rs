//! Rendered-page retrieval for sections that build their article list with
//! JavaScript.
//!
//! The headless browser itself lives outside this crate. [`ProxyRenderer`]
//! talks to any rendering service that takes the target URL as a query
//! parameter and answers with the DOM serialized after scripts ran.

use crate::fetch::HttpFetcher;
use std::time::Duration;
use tracing::{debug, instrument};

/// Turns a URL into markup after dynamic content has loaded.
///
/// Implementations must fail soft: timeouts, navigation errors and
/// unavailable services all produce an empty string.
#[allow(async_fn_in_trait)]
pub trait Renderer {
    async fn render(&self, url: &str, timeout: Duration) -> String;
}

/// Renderer used when no rendering service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl Renderer for NoRenderer {
    async fn render(&self, url: &str, _timeout: Duration) -> String {
        debug!(%url, "No rendering service configured");
        String::new()
    }
}

/// Rendering through an HTTP rendering service.
#[derive(Debug, Clone)]
pub struct ProxyRenderer {
    fetcher: HttpFetcher,
    /// Endpoint template containing a `{url}` placeholder.
    endpoint: String,
}

impl ProxyRenderer {
    pub fn new(fetcher: HttpFetcher, endpoint: impl Into<String>) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
        }
    }

    fn target(&self, url: &str) -> String {
        self.endpoint.replace("{url}", &urlencoding::encode(url))
    }
}

impl Renderer for ProxyRenderer {
    #[instrument(level = "info", skip(self, timeout))]
    async fn render(&self, url: &str, timeout: Duration) -> String {
        self.fetcher
            .fetch_content(&self.target(url), timeout)
            .await
            .unwrap_or_default()
    }
}

/// Either of the two renderers, picked from configuration at start-up.
#[derive(Debug, Clone)]
pub enum AnyRenderer {
    None(NoRenderer),
    Proxy(ProxyRenderer),
}

impl AnyRenderer {
    pub fn from_endpoint(fetcher: &HttpFetcher, endpoint: Option<&str>) -> Self {
        match endpoint {
            Some(endpoint) => AnyRenderer::Proxy(ProxyRenderer::new(fetcher.clone(), endpoint)),
            None => AnyRenderer::None(NoRenderer),
        }
    }
}

impl Renderer for AnyRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> String {
        match self {
            AnyRenderer::None(r) => r.render(url, timeout).await,
            AnyRenderer::Proxy(r) => r.render(url, timeout).await,
        }
    }
}
