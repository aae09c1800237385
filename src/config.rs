//! YAML configuration: newspapers, their sections and run-wide tuning.
//!
//! ```yaml
//! digest:
//!   title_similarity_threshold: 0.85
//!   fetch_timeout_secs: 20
//! sources:
//!   - name: Estadão
//!     sections:
//!       - name: Política
//!         location: https://www.estadao.com.br/politica/
//!         membership: ["/politica/"]
//!         quota: 5
//!         scan_budget: 40
//! ```
//!
//! Credentials are not part of this file; the SMTP login comes from the CLI
//! (or its environment variables).

use crate::dedup::DEFAULT_SIMILARITY_THRESHOLD;
use crate::error::ConfigError;
use crate::models::Topic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// How a section publishes its article list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Html,
    Feed,
}

/// One section of a newspaper (e.g. "Política").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub name: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Section page (HTML) or feed URL (Feed).
    pub location: String,
    /// Path substrings an article URL must contain (at least one) to belong
    /// to this section. HTML sections only.
    #[serde(default)]
    pub membership: Option<Vec<String>>,
    #[serde(default = "default_quota")]
    pub quota: usize,
    /// Raw candidates to scan before filtering; keep it well above `quota`.
    #[serde(default = "default_scan_budget")]
    pub scan_budget: usize,
    /// Fallback feed for HTML sections.
    #[serde(default)]
    pub feed: Option<String>,
    /// CSS selector for article anchors. Defaults to every `a[href]`.
    #[serde(default)]
    pub selector: Option<String>,
}

impl SectionConfig {
    /// Feed endpoint usable as a fallback, if any.
    pub fn feed_endpoint(&self) -> Option<&str> {
        match self.kind {
            SourceKind::Feed => Some(&self.location),
            SourceKind::Html => self.feed.as_deref(),
        }
    }
}

/// A newspaper and its sections, in the order they should appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub sections: Vec<SectionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestSettings {
    pub title_similarity_threshold: f64,
    pub fetch_timeout_secs: u64,
    /// Upper bound for one section's whole fallback chain.
    pub section_timeout_secs: u64,
    /// Upper bound for the whole run; unset means no deadline.
    pub run_timeout_secs: Option<u64>,
    /// Sections harvested at the same time.
    pub concurrency: usize,
    /// Topic collected into the separate bucket of the digest.
    pub bucket_topic: Topic,
    pub user_agent: String,
    pub subject_prefix: String,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            title_similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            fetch_timeout_secs: 20,
            section_timeout_secs: 90,
            run_timeout_secs: None,
            concurrency: 4,
            bucket_topic: Topic::HealthInsurance,
            user_agent: format!("news_digest/{}", env!("CARGO_PKG_VERSION")),
            subject_prefix: "Resumo diário de notícias".to_string(),
        }
    }
}

impl DigestSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn section_timeout(&self) -> Duration {
        Duration::from_secs(self.section_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// Headless rendering service used when a plain fetch finds nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// URL template with a `{url}` placeholder, e.g.
    /// `http://localhost:3000/render?url={url}`.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySettings {
    pub smtp_host: String,
    #[serde(default = "default_implicit_tls_port")]
    pub implicit_tls_port: u16,
    #[serde(default = "default_starttls_port")]
    pub starttls_port: u16,
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub digest: DigestSettings,
    #[serde(default)]
    pub render: RenderSettings,
    /// Required unless the run is a dry run.
    #[serde(default)]
    pub delivery: Option<DeliverySettings>,
    pub sources: Vec<SourceConfig>,
}

fn default_quota() -> usize {
    5
}

fn default_scan_budget() -> usize {
    40
}

fn default_implicit_tls_port() -> u16 {
    465
}

fn default_starttls_port() -> u16 {
    587
}

fn default_max_cycles() -> u32 {
    3
}

fn default_base_backoff_secs() -> u64 {
    5
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.digest.title_similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "title_similarity_threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.digest.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.sources.iter().all(|s| s.sections.is_empty()) {
            return Err(ConfigError::Invalid("no sections configured".into()));
        }

        for source in &self.sources {
            for section in &source.sections {
                let label = format!("{} - {}", source.name, section.name);
                if section.quota == 0 {
                    return Err(ConfigError::Invalid(format!("{label}: quota must be at least 1")));
                }
                if section.scan_budget < section.quota {
                    return Err(ConfigError::Invalid(format!(
                        "{label}: scan_budget ({}) is smaller than quota ({})",
                        section.scan_budget, section.quota
                    )));
                }
                for url in std::iter::once(section.location.as_str()).chain(section.feed.as_deref()) {
                    Url::parse(url)
                        .map_err(|e| ConfigError::Invalid(format!("{label}: bad URL {url}: {e}")))?;
                }
                if let Some(selector) = &section.selector {
                    scraper::Selector::parse(selector).map_err(|e| {
                        ConfigError::Invalid(format!("{label}: bad selector {selector:?}: {e}"))
                    })?;
                }
            }
        }

        if let Some(delivery) = &self.delivery {
            if delivery.to.is_empty() {
                return Err(ConfigError::Invalid("delivery.to has no recipients".into()));
            }
            if delivery.max_cycles == 0 {
                return Err(ConfigError::Invalid("delivery.max_cycles must be at least 1".into()));
            }
        }
        Ok(())
    }

    /// Every section paired with its newspaper name, in configured order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &SectionConfig)> {
        self.sources
            .iter()
            .flat_map(|source| source.sections.iter().map(move |s| (source.name.as_str(), s)))
    }
}

/// Read, parse and validate the configuration file at `path`.
#[instrument(level = "info")]
pub async fn load_config(path: &str) -> Result<Config, ConfigError> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
    let config = Config::from_yaml_str(&yaml)?;
    info!(
        sources = config.sources.len(),
        sections = config.sections().count(),
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
digest:
  title_similarity_threshold: 0.8
  run_timeout_secs: 1200
render:
  endpoint: "http://localhost:3000/render?url={url}"
delivery:
  smtp_host: smtp.gmail.com
  from: digest@example.com
  to: ["reader@example.com"]
sources:
  - name: Estadão
    sections:
      - name: Política
        location: https://www.estadao.com.br/politica/
        membership: ["/politica/"]
        selector: "article a"
      - name: Economia
        kind: feed
        location: https://www.estadao.com.br/arc/outboundfeeds/economia/
        quota: 3
        scan_budget: 30
"#;

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = Config::from_yaml_str(SAMPLE).expect("sample should parse");
        assert_eq!(config.digest.title_similarity_threshold, 0.8);
        assert_eq!(config.digest.fetch_timeout_secs, 20);
        assert_eq!(config.digest.run_timeout(), Some(Duration::from_secs(1200)));
        assert_eq!(config.digest.bucket_topic, Topic::HealthInsurance);

        let sections: Vec<_> = config.sections().collect();
        assert_eq!(sections.len(), 2);
        let (source, politica) = sections[0];
        assert_eq!(source, "Estadão");
        assert_eq!(politica.kind, SourceKind::Html);
        assert_eq!(politica.quota, 5);
        assert_eq!(politica.scan_budget, 40);
        assert_eq!(politica.feed_endpoint(), None);

        let (_, economia) = sections[1];
        assert_eq!(economia.kind, SourceKind::Feed);
        assert_eq!(economia.feed_endpoint(), Some(economia.location.as_str()));

        let delivery = config.delivery.expect("delivery present");
        assert_eq!(delivery.implicit_tls_port, 465);
        assert_eq!(delivery.starttls_port, 587);
        assert_eq!(delivery.max_cycles, 3);
    }

    #[test]
    fn test_rejects_scan_budget_below_quota() {
        let yaml = r#"
sources:
  - name: O Globo
    sections:
      - name: Brasil
        location: https://oglobo.globo.com/brasil/
        quota: 10
        scan_budget: 5
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("scan_budget")));
    }

    #[test]
    fn test_rejects_bad_threshold_and_url() {
        let yaml = r#"
digest:
  title_similarity_threshold: 1.5
sources:
  - name: X
    sections:
      - name: Y
        location: https://example.com/
"#;
        assert!(Config::from_yaml_str(yaml).is_err());

        let yaml = r#"
sources:
  - name: X
    sections:
      - name: Y
        location: "not a url"
"#;
        assert!(Config::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_rejects_empty_configuration() {
        assert!(Config::from_yaml_str("sources: []").is_err());
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        let err = load_config("/definitely/not/here.yaml").await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = Config::from_yaml_str(include_str!("../config.example.yaml"))
            .expect("config.example.yaml must stay valid");
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.digest.run_timeout(), Some(Duration::from_secs(600)));
        let valor = &config.sources[2].sections[0];
        assert_eq!(valor.kind, SourceKind::Feed);
        assert_eq!(valor.feed_endpoint(), Some(valor.location.as_str()));
    }
}
