//! Run-wide duplicate gate.
//!
//! A single [`Deduper`] lives for one aggregation run and is handed by `&mut`
//! to every section in turn, so a story accepted from one newspaper blocks
//! the same story (or a near-identical headline) from every later section.
//! State only ever grows: once a key or title is recorded it stays recorded
//! until the run ends.

use crate::canonical::{canonicalize, jaccard, tokenize};
use std::collections::HashSet;
use tracing::debug;

/// Similarity at or above which two headlines count as the same story.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Novel,
    SameUrl,
    SimilarTitle { accepted: String, score: f64 },
}

#[derive(Debug)]
pub struct Deduper {
    threshold: f64,
    seen_keys: HashSet<String>,
    /// Accepted headlines in acceptance order, with their token sets cached.
    accepted_titles: Vec<(String, HashSet<String>)>,
}

impl Default for Deduper {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl Deduper {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            seen_keys: HashSet::new(),
            accepted_titles: Vec::new(),
        }
    }

    /// Check a candidate and, if it is novel, record it in the same step.
    ///
    /// Returns `true` for duplicates. There is no separate insert: a `false`
    /// answer means the pair now belongs to this run.
    pub fn is_duplicate(&mut self, title: &str, url: &str) -> bool {
        self.check(title, url) != Verdict::Novel
    }

    /// Same as [`Deduper::is_duplicate`] but reports which rule matched.
    pub fn check(&mut self, title: &str, url: &str) -> Verdict {
        let key = canonicalize(url);
        if self.seen_keys.contains(&key) {
            debug!(%key, "Duplicate canonical URL");
            return Verdict::SameUrl;
        }

        let tokens = tokenize(title);
        for (accepted, accepted_tokens) in &self.accepted_titles {
            let score = jaccard(&tokens, accepted_tokens);
            if score >= self.threshold {
                debug!(title, accepted = %accepted, score, "Near-duplicate headline");
                return Verdict::SimilarTitle {
                    accepted: accepted.clone(),
                    score,
                };
            }
        }

        self.seen_keys.insert(key);
        self.accepted_titles.push((title.to_string(), tokens));
        Verdict::Novel
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn seen_len(&self) -> usize {
        self.seen_keys.len()
    }

    pub fn accepted_titles(&self) -> impl Iterator<Item = &str> {
        self.accepted_titles.iter().map(|(t, _)| t.as_str())
    }
}
