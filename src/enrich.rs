//! Article text extraction and summarization.
//!
//! Both functions are pure and tolerate empty input: no text in, empty
//! string out.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// Texts shorter than this many words are used as their own summary.
pub const SHORT_TEXT_WORDS: usize = 50;

/// Sentences kept by [`summarize`] for longer texts.
pub const LEAD_SENTENCES: usize = 2;

/// Paragraph selectors tried in order; the first one that matches wins.
static PARAGRAPH_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article p", "div.content p"]
        .iter()
        .map(|s| Selector::parse(s).expect("static paragraph selector"))
        .collect()
});

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?…]\s+").expect("static sentence regex"));

/// Plain text of the article body, one paragraph per line.
pub fn extract_text(markup: &str) -> String {
    if markup.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(markup);
    for selector in PARAGRAPH_SELECTORS.iter() {
        let paragraphs: Vec<String> = document
            .select(selector)
            .map(|p| p.text().collect::<String>().split_whitespace().join(" "))
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n");
        }
    }
    String::new()
}

/// Short summary of an article body.
///
/// Short texts are returned whole. Longer texts are cut after
/// [`LEAD_SENTENCES`] sentences with `...` appended when something was left
/// out.
pub fn summarize(text: &str) -> String {
    let text = text.split_whitespace().join(" ");
    if text.split(' ').count() < SHORT_TEXT_WORDS {
        return text;
    }

    let mut cut = None;
    for (seen, m) in SENTENCE_END.find_iter(&text).enumerate() {
        if seen + 1 == LEAD_SENTENCES {
            cut = Some(m.start() + m.as_str().trim_end().len());
            break;
        }
    }
    match cut {
        Some(end) if end < text.len() => format!("{}...", &text[..end]),
        _ => text,
    }
}
