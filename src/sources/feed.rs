//! RSS 2.0 and Atom feed parsing.
//!
//! Used for feed-only sections and as the last resort for HTML sections
//! whose page yielded nothing usable.

use crate::fetch::HttpFetcher;
use crate::models::ArticleCandidate;
use crate::utils::truncate_for_log;
use itertools::Itertools;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One `<item>` / `<entry>` of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Plain text, HTML stripped.
    pub description: String,
}

impl From<FeedEntry> for ArticleCandidate {
    fn from(entry: FeedEntry) -> Self {
        ArticleCandidate {
            title: entry.title,
            url: entry.link,
            description: (!entry.description.is_empty()).then_some(entry.description),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
}

/// Fetch and parse a feed. Any failure yields an empty list.
#[instrument(level = "info", skip(fetcher, timeout))]
pub async fn fetch_feed(
    fetcher: &HttpFetcher,
    url: &str,
    timeout: Duration,
    max_entries: usize,
) -> Vec<ArticleCandidate> {
    let Some(xml) = fetcher.fetch_content(url, timeout).await else {
        return Vec::new();
    };
    match parse_feed(&xml, max_entries) {
        Ok(entries) => {
            let candidates: Vec<ArticleCandidate> = entries
                .into_iter()
                .unique_by(|e| e.link.clone())
                .map(ArticleCandidate::from)
                .collect();
            debug!(count = candidates.len(), "Parsed feed entries");
            candidates
        }
        Err(e) => {
            warn!(%url, error = %e, preview = %truncate_for_log(&xml, 200), "Malformed feed");
            Vec::new()
        }
    }
}

/// Parse RSS `<item>` or Atom `<entry>` elements, stopping after
/// `max_entries` complete entries. Entries without a title or a link are
/// skipped.
///
/// # Errors
///
/// Returns the XML error if the document is malformed before `max_entries`
/// entries were read.
pub fn parse_feed(xml: &str, max_entries: usize) -> Result<Vec<FeedEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_entry = false;
    let mut field: Option<Field> = None;
    let mut entry = FeedEntry::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                match name.as_str() {
                    "item" | "entry" => {
                        in_entry = true;
                        field = None;
                        entry = FeedEntry::default();
                    }
                    "title" if in_entry => field = Some(Field::Title),
                    "link" if in_entry => {
                        take_atom_link(&e, &mut entry);
                        field = Some(Field::Link);
                    }
                    "description" | "summary" | "content" | "encoded"
                        if in_entry && entry.description.is_empty() =>
                    {
                        field = Some(Field::Description);
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if in_entry && local_name(&e) == "link" {
                    take_atom_link(&e, &mut entry);
                }
            }
            Ok(Event::End(e)) => {
                let raw = e.local_name();
                let name = std::str::from_utf8(raw.as_ref()).unwrap_or("");
                match name {
                    "item" | "entry" if in_entry => {
                        in_entry = false;
                        field = None;
                        if let Some(done) = finish(std::mem::take(&mut entry)) {
                            entries.push(done);
                            if entries.len() >= max_entries {
                                break;
                            }
                        }
                    }
                    "title" | "link" | "description" | "summary" | "content" | "encoded" => {
                        field = None;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_entry {
                    let text = e.unescape().unwrap_or_default();
                    append(&mut entry, field, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if in_entry {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    append(&mut entry, field, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
    }

    Ok(entries)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Atom links carry the URL in `href`; only `alternate` (or unqualified)
/// links point at the article.
fn take_atom_link(e: &BytesStart<'_>, entry: &mut FeedEntry) {
    if !entry.link.is_empty() {
        return;
    }
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().map(|v| v.into_owned()).ok();
        match attr.key.local_name().as_ref() {
            b"href" => href = value,
            b"rel" => rel = value,
            _ => {}
        }
    }
    if matches!(rel.as_deref(), None | Some("alternate")) {
        if let Some(href) = href {
            entry.link = href;
        }
    }
}

fn append(entry: &mut FeedEntry, field: Option<Field>, text: &str) {
    let target = match field {
        Some(Field::Title) => &mut entry.title,
        Some(Field::Link) => &mut entry.link,
        Some(Field::Description) => &mut entry.description,
        None => return,
    };
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

fn finish(mut entry: FeedEntry) -> Option<FeedEntry> {
    entry.title = entry.title.split_whitespace().join(" ");
    entry.link = entry.link.trim().to_string();
    entry.description = strip_html(&entry.description);
    (!entry.title.is_empty() && !entry.link.is_empty()).then_some(entry)
}

/// Text content of an HTML fragment: tags dropped, entities decoded,
/// whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    Html::parse_fragment(html)
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .join(" ")
}
