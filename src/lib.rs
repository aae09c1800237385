//! # News Digest
//!
//! Collects headlines from configured newspaper sections, drops duplicates
//! across sources (same canonical URL or near-identical title), enriches
//! each item with a short summary, topic tags and explanatory hints, and
//! delivers the result as an HTML e-mail.
//!
//! ## Pipeline
//!
//! 1. **Harvest** ([`sources`]): per section, direct fetch, then rendered
//!    fetch, then feed, until one yields candidates.
//! 2. **Admit** ([`collector`]): membership filter, shared [`dedup::Deduper`],
//!    per-section quota, feed replenishment.
//! 3. **Enrich** ([`enrich`], [`classify`]): article text, lead summary,
//!    topics and hints.
//! 4. **Aggregate** ([`aggregator`]): all sources under one deadline plus a
//!    cross-source topical bucket.
//! 5. **Output** ([`outputs`], [`deliver`]): HTML document, optional JSON
//!    copy, SMTP delivery with fallback and backoff.

pub mod aggregator;
pub mod canonical;
pub mod classify;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod deliver;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod models;
pub mod outputs;
pub mod sources;
pub mod utils;
