//! Per-section collection: scan wide, accept narrow, stop early.
//!
//! A section page usually links to far more stories than the section's quota,
//! and many of them were already accepted from an earlier section or another
//! newspaper. The collector walks the raw candidates in page order, drops
//! links outside the section, asks the run's [`Deduper`] about each of the
//! rest and stops as soon as the quota is filled. Only then are the chosen
//! articles fetched and summarized.

use crate::canonical::canonicalize;
use crate::classify::classify;
use crate::config::{SectionConfig, SourceKind};
use crate::dedup::Deduper;
use crate::enrich::{extract_text, summarize};
use crate::models::{AcceptedItem, ArticleCandidate};
use crate::sources::render::Renderer;
use crate::sources::{Harvest, LinkSource, Strategy};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Default number of article pages fetched at once for one section.
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct SectionCollector<R> {
    links: LinkSource<R>,
    enrich_concurrency: usize,
}

impl<R: Renderer> SectionCollector<R> {
    pub fn new(links: LinkSource<R>, enrich_concurrency: usize) -> Self {
        Self {
            links,
            enrich_concurrency: enrich_concurrency.max(1),
        }
    }

    pub fn links(&self) -> &LinkSource<R> {
        &self.links
    }

    /// Collect up to `section.quota` new articles for one section.
    ///
    /// Never fails: a section where every strategy comes back empty, or where
    /// every candidate is a duplicate, yields an empty list.
    #[instrument(level = "info", skip_all, fields(section = %section.name))]
    pub async fn collect(&self, section: &SectionConfig, deduper: &mut Deduper) -> Vec<AcceptedItem> {
        let harvest = self.links.fetch(section).await;
        self.admit(section, harvest, deduper).await
    }

    /// Run already harvested candidates through the filters, replenishing
    /// from the section feed when nothing survives, then enrich the winners.
    #[instrument(level = "info", skip_all, fields(section = %section.name))]
    pub async fn admit(
        &self,
        section: &SectionConfig,
        harvest: Harvest,
        deduper: &mut Deduper,
    ) -> Vec<AcceptedItem> {
        let mut chosen = select(section, &harvest.candidates, deduper);

        if chosen.is_empty() && !harvest.came_from_feed() && section.feed_endpoint().is_some() {
            info!("No usable candidates; replenishing from feed");
            let feed = self.links.run(Strategy::Feed, section).await;
            chosen = select(section, &feed, deduper);
        }

        if chosen.is_empty() {
            warn!(raw = harvest.candidates.len(), "Section exhausted; recording it empty");
            return Vec::new();
        }

        self.enrich(section, chosen).await
    }

    async fn enrich(&self, section: &SectionConfig, chosen: Vec<ArticleCandidate>) -> Vec<AcceptedItem> {
        let items: Vec<AcceptedItem> = stream::iter(chosen)
            .map(|candidate| self.enrich_one(section, candidate))
            .buffered(self.enrich_concurrency)
            .collect()
            .await;

        let without_summary = items.iter().filter(|i| i.summary.is_empty()).count();
        info!(accepted = items.len(), without_summary, "Section collected");
        items
    }

    async fn enrich_one(&self, section: &SectionConfig, candidate: ArticleCandidate) -> AcceptedItem {
        let markup = self
            .links
            .fetcher()
            .fetch_content(&candidate.url, self.links.timeout())
            .await
            .unwrap_or_default();

        let mut text = extract_text(&markup);
        if text.is_empty() {
            text = candidate.description.clone().unwrap_or_default();
        }
        let summary = summarize(&text);
        if summary.is_empty() {
            debug!(url = %candidate.url, "No article text; keeping item without summary");
        }

        let classification = classify(&candidate.title, &summary);
        AcceptedItem {
            canonical_key: canonicalize(&candidate.url),
            title: candidate.title,
            url: candidate.url,
            summary,
            section: section.name.clone(),
            topics: classification.topics,
            hints: classification.hints,
        }
    }
}

/// Pick candidates in order until the quota is met.
///
/// Every candidate that reaches the dedup gate and is novel gets recorded in
/// `deduper`, so the stop-early check happens before the gate.
pub fn select(
    section: &SectionConfig,
    candidates: &[ArticleCandidate],
    deduper: &mut Deduper,
) -> Vec<ArticleCandidate> {
    let mut chosen = Vec::with_capacity(section.quota);
    let mut outside = 0usize;
    let mut duplicates = 0usize;

    for candidate in candidates {
        if chosen.len() >= section.quota {
            break;
        }
        if !is_member(section, &candidate.url) {
            outside += 1;
            continue;
        }
        if deduper.is_duplicate(&candidate.title, &candidate.url) {
            duplicates += 1;
            continue;
        }
        chosen.push(candidate.clone());
    }

    debug!(
        raw = candidates.len(),
        outside,
        duplicates,
        chosen = chosen.len(),
        quota = section.quota,
        "Filtered candidates"
    );
    chosen
}

/// Whether `url` belongs to the section according to its membership rule.
///
/// Sections without a rule, and feed sections, accept everything.
pub fn is_member(section: &SectionConfig, url: &str) -> bool {
    if section.kind != SourceKind::Html {
        return true;
    }
    let rules = match &section.membership {
        Some(rules) if !rules.is_empty() => rules,
        _ => return true,
    };
    let path = match Url::parse(url) {
        Ok(u) => urlencoding::decode(u.path())
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| u.path().to_string()),
        Err(_) => url.to_string(),
    };
    rules.iter().any(|rule| path.contains(rule.as_str()))
}
