//! Article link extraction from a section page.
//!
//! Works the same on markup from a plain fetch and on markup returned by the
//! rendering service.

use crate::models::ArticleCandidate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Headlines shorter than this are navigation, not stories.
pub const MIN_TITLE_CHARS: usize = 20;

/// URL fragments that mark paywall, account and in-page links.
pub const URL_DENYLIST: &[&str] = &["/subscribe", "/signin", "/login", "#"];

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static anchor selector"));

static BASE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("base[href]").expect("static base selector"));

/// Extract up to `scan_limit` article candidates from `markup`.
///
/// # Arguments
///
/// * `markup` - Raw HTML of the section page
/// * `page_url` - URL the markup was loaded from, used to resolve relative links
/// * `selector` - Optional CSS selector scoping the anchors (e.g. `article a`)
/// * `scan_limit` - Maximum number of candidates to return
///
/// # Returns
///
/// Candidates in document order, unique by URL. Links with short titles,
/// denylisted URLs or non-HTTP schemes are skipped.
pub fn extract_links(
    markup: &str,
    page_url: &str,
    selector: Option<&str>,
    scan_limit: usize,
) -> Vec<ArticleCandidate> {
    let Ok(page) = Url::parse(page_url) else {
        warn!(%page_url, "Cannot resolve links against an invalid page URL");
        return Vec::new();
    };

    let document = Html::parse_document(markup);
    let base = document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page.join(href).ok())
        .unwrap_or(page);

    let custom = selector.and_then(|s| match Selector::parse(s) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(selector = s, error = %e, "Invalid link selector; scanning every anchor");
            None
        }
    });
    let anchor_selector = custom.as_ref().unwrap_or(&*ANCHOR_SELECTOR);

    let candidates: Vec<ArticleCandidate> = document
        .select(anchor_selector)
        .filter_map(|el| candidate_from_anchor(el, &base))
        .unique_by(|c| c.url.clone())
        .take(scan_limit)
        .collect();

    debug!(count = candidates.len(), %page_url, "Extracted link candidates");
    candidates
}

fn candidate_from_anchor(el: ElementRef<'_>, base: &Url) -> Option<ArticleCandidate> {
    let href = el.value().attr("href")?;
    let resolved = base.join(href.trim()).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    let url = resolved.to_string();
    if URL_DENYLIST.iter().any(|d| url.contains(d)) {
        return None;
    }

    let title = anchor_title(el);
    if title.chars().count() < MIN_TITLE_CHARS {
        return None;
    }
    Some(ArticleCandidate::new(title, url))
}

/// Visible text of the anchor, falling back to its `title` or `aria-label`.
fn anchor_title(el: ElementRef<'_>) -> String {
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().join(" ");
    if !text.is_empty() {
        return text;
    }
    ["title", "aria-label"]
        .iter()
        .find_map(|attr| el.value().attr(attr))
        .map(|v| v.split_whitespace().join(" "))
        .unwrap_or_default()
}
