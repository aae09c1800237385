//! Run-level orchestration across every configured section.
//!
//! Link harvesting for different sections overlaps (bounded by
//! `concurrency`) and keeps running while earlier sections are admitted.
//! Candidates still enter the dedup gate strictly in configured order: the
//! harvest stream is `buffered`, not `buffer_unordered`, and its results are
//! handed to the admission loop through a channel one section at a time.
//! Earlier sections therefore always win ties against later ones.

use crate::collector::SectionCollector;
use crate::config::{DigestSettings, SectionConfig, SourceConfig};
use crate::dedup::Deduper;
use crate::models::{AcceptedItem, Digest, SectionDigest, SourceDigest, Topic};
use crate::sources::render::Renderer;
use crate::sources::Harvest;
use futures::stream::{self, StreamExt};
use std::pin::pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct Aggregator<R> {
    collector: SectionCollector<R>,
    threshold: f64,
    concurrency: usize,
    section_timeout: Duration,
    bucket_topic: Topic,
}

impl<R: Renderer> Aggregator<R> {
    pub fn new(collector: SectionCollector<R>, settings: &DigestSettings) -> Self {
        Self {
            collector,
            threshold: settings.title_similarity_threshold,
            concurrency: settings.concurrency.max(1),
            section_timeout: settings.section_timeout(),
            bucket_topic: settings.bucket_topic,
        }
    }

    /// Collect every section of every source into one [`Digest`].
    ///
    /// A fresh [`Deduper`] is created for the run and shared by all sections.
    /// Sections that fail, time out or are skipped because `deadline` passed
    /// appear in the digest with no items; the run itself never fails.
    ///
    /// Harvests are driven by their own loop while earlier sections are
    /// being admitted, so a section's timeout only ever counts its own
    /// fetch chain.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn run(&self, sources: &[SourceConfig], deadline: Option<Instant>) -> Digest {
        let all_sections: Vec<&SectionConfig> = sources.iter().flat_map(|s| &s.sections).collect();
        let (tx, rx) = mpsc::unbounded_channel();

        let producer = async move {
            let mut harvests = pin!(
                stream::iter(all_sections)
                    .map(|section| self.harvest(section, deadline))
                    .buffered(self.concurrency)
            );
            while let Some(harvest) = harvests.next().await {
                if tx.send(harvest).is_err() {
                    break;
                }
            }
        };

        let ((), digest) = tokio::join!(producer, self.assemble(sources, rx, deadline));
        digest
    }

    /// Admit harvests in configured order as they arrive.
    async fn assemble(
        &self,
        sources: &[SourceConfig],
        mut harvests: mpsc::UnboundedReceiver<Option<Harvest>>,
        deadline: Option<Instant>,
    ) -> Digest {
        let started = Instant::now();
        let mut deduper = Deduper::new(self.threshold);
        let mut cancelled = false;
        let mut digest = Digest::default();

        for source in sources {
            let mut sections = Vec::with_capacity(source.sections.len());
            for section in &source.sections {
                let harvest = if cancelled { None } else { harvests.recv().await.flatten() };
                let items = match harvest {
                    Some(harvest) => match self.admit(section, harvest, &mut deduper, deadline).await {
                        Some(items) => items,
                        None => {
                            cancelled = true;
                            Vec::new()
                        }
                    },
                    None => {
                        if !cancelled && deadline.is_some_and(|d| Instant::now() >= d) {
                            warn!(section = %section.name, "Run deadline reached; skipping remaining sections");
                            cancelled = true;
                        }
                        Vec::new()
                    }
                };
                info!(source = %source.name, section = %section.name, items = items.len(), "Section done");
                sections.push(SectionDigest {
                    name: section.name.clone(),
                    items,
                });
            }
            digest.sources.push(SourceDigest {
                name: source.name.clone(),
                sections,
            });
        }
        harvests.close();

        digest.bucket = bucket(&digest, self.bucket_topic);
        info!(
            items = digest.item_count(),
            bucket = digest.bucket.len(),
            empty_sections = digest.empty_sections().len(),
            seen_urls = deduper.seen_len(),
            threshold = deduper.threshold(),
            cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation finished"
        );
        digest
    }

    /// Run a section's fallback chain under the section timeout.
    ///
    /// Returns `None` only when the run deadline cut it short; a section
    /// timeout yields an empty harvest so the feed replenishment still runs.
    async fn harvest(&self, section: &SectionConfig, deadline: Option<Instant>) -> Option<Harvest> {
        let section_deadline = Instant::now() + self.section_timeout;
        let until = deadline.map_or(section_deadline, |d| d.min(section_deadline));

        match timeout_at(until, self.collector.links().fetch(section)).await {
            Ok(harvest) => Some(harvest),
            Err(_) if deadline.is_some_and(|d| Instant::now() >= d) => None,
            Err(_) => {
                warn!(section = %section.name, timeout = ?self.section_timeout, "Section fetch chain timed out");
                Some(Harvest::default())
            }
        }
    }

    /// Admit a section, giving up when the run deadline passes.
    async fn admit(
        &self,
        section: &SectionConfig,
        harvest: Harvest,
        deduper: &mut Deduper,
        deadline: Option<Instant>,
    ) -> Option<Vec<AcceptedItem>> {
        let admission = self.collector.admit(section, harvest, deduper);
        match deadline {
            None => Some(admission.await),
            Some(d) => match timeout_at(d, admission).await {
                Ok(items) => Some(items),
                Err(_) => {
                    warn!(section = %section.name, "Run deadline reached during section; skipping remaining sections");
                    None
                }
            },
        }
    }
}

/// Items carrying `topic`, across all sections, in digest order.
pub fn bucket(digest: &Digest, topic: Topic) -> Vec<AcceptedItem> {
    digest
        .sources
        .iter()
        .flat_map(|s| &s.sections)
        .flat_map(|s| &s.items)
        .filter(|item| item.topics.contains(&topic))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::DEFAULT_ENRICH_CONCURRENCY;
    use crate::config::SourceKind;
    use crate::fetch::HttpFetcher;
    use crate::sources::render::{NoRenderer, ProxyRenderer};
    use crate::sources::LinkSource;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn aggregator(settings: &DigestSettings) -> Aggregator<NoRenderer> {
        aggregator_with(NoRenderer, settings)
    }

    fn aggregator_with<R: Renderer>(renderer: R, settings: &DigestSettings) -> Aggregator<R> {
        let links = LinkSource::new(
            HttpFetcher::new("news_digest-test").unwrap(),
            renderer,
            Duration::from_secs(5),
        );
        Aggregator::new(SectionCollector::new(links, DEFAULT_ENRICH_CONCURRENCY), settings)
    }

    fn section(name: &str, location: String) -> SectionConfig {
        SectionConfig {
            name: name.into(),
            kind: SourceKind::Html,
            location,
            membership: None,
            quota: 3,
            scan_budget: 30,
            feed: None,
            selector: None,
        }
    }

    async fn mount_page(server: &MockServer, page_path: &str, links: &[(&str, &str)], delay: Duration) {
        let body: String = links
            .iter()
            .map(|(href, title)| format!(r#"<a href="{href}">{title}</a>"#))
            .collect();
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body>{body}</body></html>"))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    async fn mount_articles(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path_regex("^/artigos/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<article><p>Operadoras de planos de saúde terão reajuste limitado.</p></article>",
            ))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_cross_source_dedup_and_bucket() {
        let server = MockServer::start().await;
        mount_articles(&server).await;
        mount_page(
            &server,
            "/estadao/economia",
            &[
                ("/artigos/selic-x", "Selic sobe para 10% ao ano"),
                ("/artigos/ans-reajuste", "ANS define teto do reajuste anual"),
            ],
            Duration::ZERO,
        )
        .await;
        mount_page(
            &server,
            "/valor/financas",
            &[
                ("/artigos/selic-y", "Selic sobe para 10% ao ano"),
                ("/artigos/ans-reajuste/", "Teto do reajuste anual é definido"),
                ("/artigos/bolsa", "Bolsa renova recorde histórico"),
            ],
            Duration::ZERO,
        )
        .await;

        let sources = vec![
            SourceConfig {
                name: "Estadão".into(),
                sections: vec![section("Economia", format!("{}/estadao/economia", server.uri()))],
            },
            SourceConfig {
                name: "Valor".into(),
                sections: vec![section("Finanças", format!("{}/valor/financas", server.uri()))],
            },
        ];

        let digest = aggregator(&DigestSettings::default()).run(&sources, None).await;

        assert_eq!(digest.sources.len(), 2);
        let estadao = &digest.sources[0].sections[0].items;
        let valor = &digest.sources[1].sections[0].items;
        assert_eq!(estadao.len(), 2);
        assert_eq!(valor.len(), 1);
        assert_eq!(valor[0].title, "Bolsa renova recorde histórico");

        // every article body mentions health plans
        assert_eq!(digest.bucket.len(), 3);
        assert_eq!(digest.bucket[0].title, "Selic sobe para 10% ao ano");
    }

    #[tokio::test]
    async fn test_failing_section_recorded_empty() {
        let server = MockServer::start().await;
        mount_articles(&server).await;
        mount_page(
            &server,
            "/ok",
            &[("/artigos/1", "Câmara aprova projeto de lei do clima")],
            Duration::ZERO,
        )
        .await;

        let sources = vec![SourceConfig {
            name: "O Globo".into(),
            sections: vec![
                section("Brasil", format!("{}/missing", server.uri())),
                section("Mundo", format!("{}/ok", server.uri())),
            ],
        }];
        let digest = aggregator(&DigestSettings::default()).run(&sources, None).await;

        let sections = &digest.sources[0].sections;
        assert_eq!(sections[0].name, "Brasil");
        assert!(sections[0].items.is_empty());
        assert_eq!(sections[1].items.len(), 1);
        assert_eq!(digest.empty_sections(), vec!["O Globo - Brasil".to_string()]);
    }

    #[tokio::test]
    async fn test_section_timeout_does_not_stall_run() {
        let server = MockServer::start().await;
        mount_articles(&server).await;
        mount_page(
            &server,
            "/slow",
            &[("/artigos/lento", "Matéria que nunca chega a tempo")],
            Duration::from_secs(3),
        )
        .await;
        mount_page(
            &server,
            "/fast",
            &[("/artigos/rapido", "Matéria que chega rapidamente")],
            Duration::ZERO,
        )
        .await;

        let settings = DigestSettings {
            section_timeout_secs: 1,
            ..DigestSettings::default()
        };
        let sources = vec![SourceConfig {
            name: "NYT".into(),
            sections: vec![
                section("World", format!("{}/slow", server.uri())),
                section("Business", format!("{}/fast", server.uri())),
            ],
        }];
        let digest = aggregator(&settings).run(&sources, None).await;

        assert!(digest.sources[0].sections[0].items.is_empty());
        assert_eq!(digest.sources[0].sections[1].items.len(), 1);
    }

    #[tokio::test]
    async fn test_run_deadline_keeps_collected_sections() {
        let server = MockServer::start().await;
        mount_articles(&server).await;
        mount_page(
            &server,
            "/first",
            &[("/artigos/a", "Primeira seção entrega a tempo")],
            Duration::ZERO,
        )
        .await;
        mount_page(
            &server,
            "/stuck",
            &[("/artigos/b", "Segunda seção fica presa na rede")],
            Duration::from_secs(5),
        )
        .await;
        mount_page(
            &server,
            "/third",
            &[("/artigos/c", "Terceira seção já não é consultada")],
            Duration::ZERO,
        )
        .await;

        let sources = vec![SourceConfig {
            name: "Valor".into(),
            sections: vec![
                section("Primeiro Caderno", format!("{}/first", server.uri())),
                section("Empresas", format!("{}/stuck", server.uri())),
                section("Finanças", format!("{}/third", server.uri())),
            ],
        }];
        let deadline = Instant::now() + Duration::from_millis(800);
        let digest = aggregator(&DigestSettings::default()).run(&sources, Some(deadline)).await;

        let sections = &digest.sources[0].sections;
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].items.len(), 1);
        assert!(sections[1].items.is_empty());
        assert!(sections[2].items.is_empty());
    }

    #[tokio::test]
    async fn test_slow_admission_does_not_time_out_queued_harvest() {
        let server = MockServer::start().await;
        mount_articles(&server).await;
        // first section: instant page, but its article takes longer than the section timeout
        mount_page(
            &server,
            "/um",
            &[("/lento/materia", "Reportagem especial sobre a safra de grãos")],
            Duration::ZERO,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/lento/materia"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<article><p>Safra recorde.</p></article>")
                    .set_delay(Duration::from_millis(2500)),
            )
            .mount(&server)
            .await;
        // second section: blocked page, rendered copy available shortly after
        Mock::given(method("GET"))
            .and(path("/dois"))
            .respond_with(ResponseTemplate::new(403).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/render"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="/artigos/renderizada">Governo anuncia pacote para a indústria</a>"#)
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;

        let settings = DigestSettings {
            section_timeout_secs: 2,
            ..DigestSettings::default()
        };
        let renderer = ProxyRenderer::new(
            HttpFetcher::new("news_digest-test").unwrap(),
            format!("{}/render?url={{url}}", server.uri()),
        );
        let sources = vec![SourceConfig {
            name: "Folha".into(),
            sections: vec![
                section("Um", format!("{}/um", server.uri())),
                section("Dois", format!("{}/dois", server.uri())),
            ],
        }];
        let digest = aggregator_with(renderer, &settings).run(&sources, None).await;

        let sections = &digest.sources[0].sections;
        assert_eq!(sections[0].items.len(), 1);
        assert_eq!(sections[1].items.len(), 1);
        assert_eq!(sections[1].items[0].title, "Governo anuncia pacote para a indústria");
    }

    #[tokio::test]
    async fn test_earlier_section_wins_tie_even_when_harvested_later() {
        let server = MockServer::start().await;
        mount_articles(&server).await;
        mount_page(
            &server,
            "/primeira",
            &[("/artigos/copom-a", "Copom mantém juros e sinaliza cautela")],
            Duration::from_millis(600),
        )
        .await;
        mount_page(
            &server,
            "/segunda",
            &[("/artigos/copom-b", "Copom mantém juros e sinaliza cautela")],
            Duration::ZERO,
        )
        .await;

        let sources = vec![
            SourceConfig {
                name: "Estadão".into(),
                sections: vec![section("Economia", format!("{}/primeira", server.uri()))],
            },
            SourceConfig {
                name: "Valor".into(),
                sections: vec![section("Finanças", format!("{}/segunda", server.uri()))],
            },
        ];
        let digest = aggregator(&DigestSettings::default()).run(&sources, None).await;

        let first = &digest.sources[0].sections[0].items;
        assert_eq!(first.len(), 1);
        assert!(first[0].url.ends_with("/artigos/copom-a"));
        assert!(digest.sources[1].sections[0].items.is_empty());
    }

    #[test]
    fn test_bucket_filters_by_topic() {
        let item = |title: &str, topics: Vec<Topic>| AcceptedItem {
            title: title.into(),
            url: format!("https://example.com/{}", title.len()),
            canonical_key: format!("example.com/{}", title.len()),
            summary: String::new(),
            section: "S".into(),
            topics,
            hints: None,
        };
        let digest = Digest {
            sources: vec![SourceDigest {
                name: "X".into(),
                sections: vec![SectionDigest {
                    name: "S".into(),
                    items: vec![
                        item("a", vec![Topic::Markets]),
                        item("bb", vec![Topic::HealthInsurance, Topic::Markets]),
                    ],
                }],
            }],
            bucket: vec![],
        };
        let b = bucket(&digest, Topic::HealthInsurance);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].title, "bb");
    }
}
