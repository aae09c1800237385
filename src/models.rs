//! Data models for candidates, accepted articles and the assembled digest.
//!
//! - [`ArticleCandidate`]: a raw `(title, url)` pair found on a section page or feed
//! - [`AcceptedItem`]: a candidate that passed every filter, with its summary
//! - [`Digest`]: everything collected in one run, grouped by source and section
//! - [`Topic`]: topical buckets assigned by the classifier

use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw link discovered by one fetch strategy.
///
/// Candidates are short-lived: they exist between a fetch and the
/// accept/reject decision of the section collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleCandidate {
    /// Visible headline text, whitespace collapsed.
    pub title: String,
    /// Absolute article URL.
    pub url: String,
    /// Plain-text description, only present for feed entries.
    pub description: Option<String>,
}

impl ArticleCandidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            description: None,
        }
    }
}

/// Topical buckets recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    HealthInsurance,
    MonetaryPolicy,
    PublicFinances,
    Markets,
    Energy,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Topic::HealthInsurance => "Saúde suplementar",
            Topic::MonetaryPolicy => "Política monetária",
            Topic::PublicFinances => "Contas públicas",
            Topic::Markets => "Mercados",
            Topic::Energy => "Energia",
        };
        f.write_str(label)
    }
}

/// An article that made it into the digest.
///
/// `summary` may be empty: a failed enrichment never removes an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedItem {
    pub title: String,
    /// The article URL as linked from the section page.
    pub url: String,
    /// Canonical form of `url` used for duplicate detection.
    pub canonical_key: String,
    pub summary: String,
    pub section: String,
    pub topics: Vec<Topic>,
    /// Short explanatory notes for jargon found in the text.
    pub hints: Option<String>,
}

/// Accepted items of one section, in acceptance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDigest {
    pub name: String,
    pub items: Vec<AcceptedItem>,
}

/// All sections of one newspaper, in configured order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDigest {
    pub name: String,
    pub sections: Vec<SectionDigest>,
}

/// The result of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub sources: Vec<SourceDigest>,
    /// Items carrying the configured bucket topic, across all sections.
    pub bucket: Vec<AcceptedItem>,
}

impl Digest {
    /// Number of accepted items across every section (bucket excluded).
    pub fn item_count(&self) -> usize {
        self.sources
            .iter()
            .flat_map(|s| &s.sections)
            .map(|s| s.items.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Names of sections that ended the run with no items.
    pub fn empty_sections(&self) -> Vec<String> {
        self.sources
            .iter()
            .flat_map(|source| {
                source
                    .sections
                    .iter()
                    .filter(|s| s.items.is_empty())
                    .map(move |s| format!("{} - {}", source.name, s.name))
            })
            .collect()
    }
}
