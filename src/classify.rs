//! Topic tagging and explanatory hints for accepted articles.
//!
//! Matching runs on the same normalized text as the title tokenizer
//! (lower case, accents folded, punctuation collapsed) but looks for whole
//! phrases, so "plano de saúde" only matches the three words together.
//! Phrases are matched on word boundaries.

use crate::canonical::normalize_text;
use crate::models::Topic;
use itertools::Itertools;
use once_cell::sync::Lazy;

/// Hints attached to a single item at most.
pub const MAX_HINTS: usize = 2;

const TOPIC_KEYWORDS: &[(&str, Topic)] = &[
    ("plano de saúde", Topic::HealthInsurance),
    ("planos de saúde", Topic::HealthInsurance),
    ("saúde suplementar", Topic::HealthInsurance),
    ("operadora de saúde", Topic::HealthInsurance),
    ("operadoras de saúde", Topic::HealthInsurance),
    ("Agência Nacional de Saúde Suplementar", Topic::HealthInsurance),
    ("health insurance", Topic::HealthInsurance),
    ("Unimed", Topic::HealthInsurance),
    ("Hapvida", Topic::HealthInsurance),
    ("Selic", Topic::MonetaryPolicy),
    ("Copom", Topic::MonetaryPolicy),
    ("taxa de juros", Topic::MonetaryPolicy),
    ("taxa básica de juros", Topic::MonetaryPolicy),
    ("inflação", Topic::MonetaryPolicy),
    ("IPCA", Topic::MonetaryPolicy),
    ("Federal Reserve", Topic::MonetaryPolicy),
    ("interest rates", Topic::MonetaryPolicy),
    ("arcabouço fiscal", Topic::PublicFinances),
    ("meta fiscal", Topic::PublicFinances),
    ("déficit primário", Topic::PublicFinances),
    ("dívida pública", Topic::PublicFinances),
    ("orçamento", Topic::PublicFinances),
    ("reforma tributária", Topic::PublicFinances),
    ("Ibovespa", Topic::Markets),
    ("bolsa de valores", Topic::Markets),
    ("dólar", Topic::Markets),
    ("câmbio", Topic::Markets),
    ("Wall Street", Topic::Markets),
    ("Petrobras", Topic::Energy),
    ("petróleo", Topic::Energy),
    ("gasolina", Topic::Energy),
    ("diesel", Topic::Energy),
    ("energia elétrica", Topic::Energy),
    ("Aneel", Topic::Energy),
];

const HINT_KEYWORDS: &[(&str, &str)] = &[
    (
        "Selic",
        "Selic: taxa básica de juros da economia, definida pelo Copom a cada 45 dias.",
    ),
    (
        "Copom",
        "Copom: comitê do Banco Central que decide a taxa Selic.",
    ),
    (
        "IPCA",
        "IPCA: índice oficial de inflação do país, medido pelo IBGE.",
    ),
    (
        "PIB",
        "PIB: soma de todos os bens e serviços produzidos no país em um período.",
    ),
    (
        "arcabouço fiscal",
        "Arcabouço fiscal: regra que limita o crescimento das despesas do governo.",
    ),
    (
        "déficit primário",
        "Déficit primário: quando o governo gasta mais do que arrecada, sem contar juros da dívida.",
    ),
    (
        "Ibovespa",
        "Ibovespa: principal índice de ações da bolsa brasileira.",
    ),
    (
        "ANS",
        "ANS: agência que regula os planos de saúde no Brasil.",
    ),
];

static TOPIC_TABLE: Lazy<Vec<(String, Topic)>> = Lazy::new(|| {
    TOPIC_KEYWORDS
        .iter()
        .map(|(kw, topic)| (padded(kw), *topic))
        .collect()
});

static HINT_TABLE: Lazy<Vec<(String, &'static str)>> = Lazy::new(|| {
    HINT_KEYWORDS
        .iter()
        .map(|(kw, hint)| (padded(kw), *hint))
        .collect()
});

fn padded(text: &str) -> String {
    format!(" {} ", normalize_text(text))
}

/// Facts attached to an accepted article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub topics: Vec<Topic>,
    pub hints: Option<String>,
}

/// Tag an article from its title and summary.
pub fn classify(title: &str, summary: &str) -> Classification {
    let haystack = padded(&format!("{title} {summary}"));
    Classification {
        topics: topics_in(&haystack),
        hints: hints_in(&haystack),
    }
}

fn topics_in(haystack: &str) -> Vec<Topic> {
    TOPIC_TABLE
        .iter()
        .filter(|(kw, _)| haystack.contains(kw.as_str()))
        .map(|(_, topic)| *topic)
        .unique()
        .collect()
}

fn hints_in(haystack: &str) -> Option<String> {
    let hints: Vec<&str> = HINT_TABLE
        .iter()
        .filter(|(kw, _)| haystack.contains(kw.as_str()))
        .map(|(_, hint)| *hint)
        .unique()
        .take(MAX_HINTS)
        .collect();
    (!hints.is_empty()).then(|| hints.join(" "))
}
