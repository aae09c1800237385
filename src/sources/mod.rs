//! Link discovery for one section, with fallbacks.
//!
//! Each section is scanned by an ordered list of strategies. The first
//! strategy that returns at least one candidate wins; the rest are never
//! called.
//!
//! | Strategy | Module | Used when |
//! |----------|--------|-----------|
//! | Direct   | [`html`] | HTML sections, always tried first |
//! | Rendered | [`render`] + [`html`] | the direct fetch found nothing |
//! | Feed     | [`feed`] | feed sections, or HTML sections with a fallback feed |
//!
//! Every strategy fails soft: network errors, timeouts, bad status codes and
//! unparseable documents all turn into an empty list.

pub mod feed;
pub mod html;
pub mod render;

use crate::config::{SectionConfig, SourceKind};
use crate::fetch::HttpFetcher;
use crate::models::ArticleCandidate;
use render::Renderer;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A way of obtaining candidates for a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Rendered,
    Feed,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Direct => "direct",
            Strategy::Rendered => "rendered",
            Strategy::Feed => "feed",
        })
    }
}

/// Fallback order for a section.
pub fn strategies_for(section: &SectionConfig) -> Vec<Strategy> {
    match section.kind {
        SourceKind::Feed => vec![Strategy::Feed],
        SourceKind::Html => {
            let mut chain = vec![Strategy::Direct, Strategy::Rendered];
            if section.feed.is_some() {
                chain.push(Strategy::Feed);
            }
            chain
        }
    }
}

/// Candidates returned by the chain, tagged with the strategy that found them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Harvest {
    pub strategy: Option<Strategy>,
    pub candidates: Vec<ArticleCandidate>,
}

impl Harvest {
    pub fn came_from_feed(&self) -> bool {
        self.strategy == Some(Strategy::Feed)
    }
}

/// Runs the fallback chain for a section.
#[derive(Debug, Clone)]
pub struct LinkSource<R> {
    fetcher: HttpFetcher,
    renderer: R,
    timeout: Duration,
}

impl<R: Renderer> LinkSource<R> {
    pub fn new(fetcher: HttpFetcher, renderer: R, timeout: Duration) -> Self {
        Self {
            fetcher,
            renderer,
            timeout,
        }
    }

    pub fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Walk the section's strategies until one yields candidates.
    #[instrument(level = "info", skip_all, fields(section = %section.name))]
    pub async fn fetch(&self, section: &SectionConfig) -> Harvest {
        for strategy in strategies_for(section) {
            let candidates = self.run(strategy, section).await;
            if !candidates.is_empty() {
                info!(%strategy, count = candidates.len(), "Collected link candidates");
                return Harvest {
                    strategy: Some(strategy),
                    candidates,
                };
            }
            debug!(%strategy, "Strategy produced no candidates; falling back");
        }
        warn!("Every strategy came back empty");
        Harvest::default()
    }

    /// Run a single strategy, capped at the section's scan budget.
    pub async fn run(&self, strategy: Strategy, section: &SectionConfig) -> Vec<ArticleCandidate> {
        let location = section.location.as_str();
        let selector = section.selector.as_deref();
        match strategy {
            Strategy::Direct => match self.fetcher.fetch_content(location, self.timeout).await {
                Some(markup) => html::extract_links(&markup, location, selector, section.scan_budget),
                None => Vec::new(),
            },
            Strategy::Rendered => {
                let markup = self.renderer.render(location, self.timeout).await;
                if markup.is_empty() {
                    return Vec::new();
                }
                html::extract_links(&markup, location, selector, section.scan_budget)
            }
            Strategy::Feed => match section.feed_endpoint() {
                Some(url) => {
                    feed::fetch_feed(&self.fetcher, url, self.timeout, section.scan_budget).await
                }
                None => Vec::new(),
            },
        }
    }
}
