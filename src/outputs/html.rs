//! HTML rendering of a [`Digest`] for e-mail delivery.
//!
//! The document is self-contained (inline CSS, no external assets) since most
//! mail clients strip `<link>` and `<script>`.
//!
//! # Layout
//!
//! ```text
//! <h1>{title}</h1>
//! [bucket block, when it has items]
//! for each source:
//!   <h2>{source}</h2>
//!   for each section:
//!     <h3>{section}</h3>
//!     items, or a "nothing found" line
//! ```

use crate::models::{AcceptedItem, Digest, Topic};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;
use tokio::fs;
use tracing::{error, info, instrument};

const STYLE: &str = "body{font-family:Arial,Helvetica,sans-serif;color:#222;} \
h2{color:#2a2f45;border-bottom:1px solid #ddd;} h3{color:#444;} \
.article{margin-bottom:20px;} .summary{margin-top:5px;} \
.hints{margin-top:4px;font-size:12px;color:#555;font-style:italic;} \
.bucket{background:#f4f6fb;padding:8px 16px;margin-bottom:24px;} \
.empty{color:#999;font-size:13px;}";

const EMPTY_SECTION: &str = "Nenhuma notícia encontrada nesta seção.";

/// Render `digest` as a complete HTML document.
///
/// `bucket_topic` names the cross-source block; it is omitted when the
/// bucket is empty.
pub fn render_digest(digest: &Digest, title: &str, bucket_topic: Topic) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<html><head><meta charset=\"utf-8\"><title>{t}</title><style>{STYLE}</style></head><body>\n<h1>{t}</h1>\n",
        t = encode_text(title)
    );

    if !digest.bucket.is_empty() {
        let _ = writeln!(
            out,
            "<div class=\"bucket\"><h2>Destaques: {}</h2>",
            encode_text(&bucket_topic.to_string())
        );
        for item in &digest.bucket {
            push_item(&mut out, item);
        }
        out.push_str("</div>\n");
    }

    for source in &digest.sources {
        let _ = writeln!(out, "<h2>{}</h2>", encode_text(&source.name));
        for section in &source.sections {
            let _ = writeln!(out, "<h3>{}</h3>", encode_text(&section.name));
            if section.items.is_empty() {
                let _ = writeln!(out, "<p class=\"empty\">{EMPTY_SECTION}</p>");
            }
            for item in &section.items {
                push_item(&mut out, item);
            }
        }
    }

    out.push_str("</body></html>\n");
    out
}

/// Save a rendered document to `path`.
///
/// A local copy is a convenience: failures are logged and reported as
/// `false`, never propagated, so delivery still goes ahead.
#[instrument(level = "info", skip(document), fields(bytes = document.len()))]
pub async fn write_document(path: &str, document: &str) -> bool {
    match fs::write(path, document).await {
        Ok(()) => {
            info!("Wrote HTML digest");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to write HTML digest");
            false
        }
    }
}

fn push_item(out: &mut String, item: &AcceptedItem) {
    let _ = write!(
        out,
        "<div class=\"article\"><a href=\"{}\" target=\"_blank\"><strong>{}</strong></a>",
        encode_double_quoted_attribute(&item.url),
        encode_text(&item.title)
    );
    if !item.summary.is_empty() {
        let _ = write!(out, "<div class=\"summary\">{}</div>", encode_text(&item.summary));
    }
    if let Some(hints) = &item.hints {
        let _ = write!(out, "<div class=\"hints\">{}</div>", encode_text(hints));
    }
    out.push_str("</div>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SectionDigest, SourceDigest};

    fn item(title: &str, url: &str, summary: &str) -> AcceptedItem {
        AcceptedItem {
            title: title.into(),
            url: url.into(),
            canonical_key: url.into(),
            summary: summary.into(),
            section: "Economia".into(),
            topics: vec![],
            hints: None,
        }
    }

    fn digest() -> Digest {
        Digest {
            sources: vec![SourceDigest {
                name: "Folha".into(),
                sections: vec![
                    SectionDigest {
                        name: "Mercado".into(),
                        items: vec![item(
                            "Dólar <cai> & bolsa sobe",
                            "https://folha.example/mercado/a?x=1&y=\"2\"",
                            "Resumo curto.",
                        )],
                    },
                    SectionDigest {
                        name: "Saúde".into(),
                        items: vec![],
                    },
                ],
            }],
            bucket: vec![],
        }
    }

    #[test]
    fn test_titles_and_urls_are_escaped() {
        let html = render_digest(&digest(), "Resumo", Topic::HealthInsurance);
        assert!(html.contains("Dólar &lt;cai&gt; &amp; bolsa sobe"));
        assert!(html.contains("href=\"https://folha.example/mercado/a?x=1&amp;y=&quot;2&quot;\""));
        assert!(!html.contains("<cai>"));
    }

    #[test]
    fn test_headings_and_empty_section() {
        let html = render_digest(&digest(), "Resumo diário", Topic::HealthInsurance);
        assert!(html.contains("<h1>Resumo diário</h1>"));
        assert!(html.contains("<h2>Folha</h2>"));
        assert!(html.contains("<h3>Mercado</h3>"));
        assert!(html.contains("<h3>Saúde</h3>"));
        assert!(html.contains(EMPTY_SECTION));
        assert!(!html.contains("class=\"bucket\""));
    }

    #[test]
    fn test_bucket_block_and_hints() {
        let mut d = digest();
        let mut hinted = item("Reajuste de planos de saúde sai hoje", "https://b.example/x", "");
        hinted.hints = Some("ANS: agência que regula os planos de saúde no Brasil.".into());
        d.bucket.push(hinted);

        let html = render_digest(&d, "Resumo", Topic::HealthInsurance);
        let bucket_at = html.find("class=\"bucket\"").expect("bucket block");
        let source_at = html.find("<h2>Folha</h2>").unwrap();
        assert!(bucket_at < source_at);
        assert!(html.contains(&format!("Destaques: {}", Topic::HealthInsurance)));
        assert!(html.contains("class=\"hints\""));
    }

    #[tokio::test]
    async fn test_write_document_reports_failure_without_error() {
        let dir = std::env::temp_dir().join(format!("news_digest_html_{}", std::process::id()));
        fs::create_dir_all(&dir).await.unwrap();
        let ok_path = dir.join("digest.html");
        assert!(write_document(ok_path.to_str().unwrap(), "<html></html>").await);
        assert_eq!(fs::read_to_string(&ok_path).await.unwrap(), "<html></html>");

        let missing = dir.join("no/such/dir/digest.html");
        assert!(!write_document(missing.to_str().unwrap(), "<html></html>").await);

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn test_empty_summary_has_no_summary_div() {
        let mut d = digest();
        d.sources[0].sections[0].items[0].summary.clear();
        let html = render_digest(&d, "Resumo", Topic::Markets);
        assert!(!html.contains("class=\"summary\""));
    }
}
