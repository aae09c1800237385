//! URL and title normalization used for duplicate detection.
//!
//! Two different questions get answered here:
//!
//! - *Is this the same resource?* [`canonicalize`] reduces a URL to a key that
//!   ignores scheme, `www.`, letter case of the host, trailing slashes, query
//!   strings and fragments.
//! - *Is this the same story?* [`tokenize`] turns a headline into a set of
//!   accent-folded, stopword-free tokens and [`similarity`] compares two of
//!   them with the Jaccard index.
//!
//! Everything in this module is pure and never fails.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use url::Url;

/// Accented letters folded to their unaccented base letter (lower case only,
/// callers lower-case first).
const ACCENT_FOLDS: &[(char, char)] = &[
    ('á', 'a'),
    ('à', 'a'),
    ('â', 'a'),
    ('ã', 'a'),
    ('ä', 'a'),
    ('é', 'e'),
    ('è', 'e'),
    ('ê', 'e'),
    ('ë', 'e'),
    ('í', 'i'),
    ('ì', 'i'),
    ('î', 'i'),
    ('ï', 'i'),
    ('ó', 'o'),
    ('ò', 'o'),
    ('ô', 'o'),
    ('õ', 'o'),
    ('ö', 'o'),
    ('ú', 'u'),
    ('ù', 'u'),
    ('û', 'u'),
    ('ü', 'u'),
    ('ç', 'c'),
    ('ñ', 'n'),
];

/// Words that carry no meaning for headline comparison (Portuguese and
/// English), already accent-folded.
const STOPWORDS: &[&str] = &[
    "a", "o", "e", "as", "os", "um", "uma", "uns", "umas", "de", "da", "do", "das", "dos", "em",
    "no", "na", "nos", "nas", "ao", "aos", "para", "pra", "por", "pelo", "pela", "com", "sem",
    "que", "se", "sobre", "mais", "the", "of", "and", "to", "in", "on", "for", "is", "at", "by",
    "an", "with", "from", "as",
];

static FOLD_TABLE: Lazy<HashMap<char, char>> = Lazy::new(|| ACCENT_FOLDS.iter().copied().collect());

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Comparable form of a URL.
///
/// The key is `host[:port]/path` where the host is lower-cased with a leading
/// `www.` removed and the path loses its trailing slash. Scheme, query string
/// and fragment are dropped.
///
/// Input that does not parse as an absolute URL with a host is returned
/// trimmed, so it still behaves sensibly inside a set.
///
/// # Examples
///
/// ```
/// use news_digest::canonical::canonicalize;
///
/// assert_eq!(
///     canonicalize("https://www.Example.com/a/b/?utm=x#top"),
///     canonicalize("http://example.com/a/b"),
/// );
/// ```
pub fn canonicalize(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.to_string();
    };

    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = parsed.path().trim_end_matches('/');

    match parsed.port() {
        Some(port) => format!("{host}:{port}{path}"),
        None => format!("{host}{path}"),
    }
}

/// Lower-case, fold accents and turn every non-alphanumeric run into a single
/// space.
///
/// This is the normalization shared by the tokenizer and the classifier.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| FOLD_TABLE.get(&c).copied().unwrap_or(c))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token set of a headline with stopwords removed. An empty title yields an
/// empty set.
pub fn tokenize(title: &str) -> HashSet<String> {
    normalize_text(title)
        .split(' ')
        .filter(|t| !t.is_empty() && !STOPWORD_SET.contains(t))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two headlines, in `[0, 1]`.
///
/// Returns `0.0` when either side has no tokens.
pub fn similarity(title_a: &str, title_b: &str) -> f64 {
    jaccard(&tokenize(title_a), &tokenize(title_b))
}

pub(crate) fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    #[allow(clippy::cast_precision_loss)]
    let score = intersection as f64 / union as f64;
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_equivalence() {
        assert_eq!(
            canonicalize("https://www.Example.com/a/b/"),
            canonicalize("http://example.com/a/b")
        );
        assert_eq!(canonicalize("http://example.com/a/b"), "example.com/a/b");
    }

    #[test]
    fn test_canonicalize_drops_query_and_fragment() {
        assert_eq!(
            canonicalize("https://valor.globo.com/financas/noticia.ghtml?utm_source=x#comentarios"),
            "valor.globo.com/financas/noticia.ghtml"
        );
    }

    #[test]
    fn test_canonicalize_keeps_explicit_port_and_inner_www() {
        assert_eq!(canonicalize("http://example.com:8080/x/"), "example.com:8080/x");
        assert_eq!(canonicalize("https://news.www.example.com/"), "news.www.example.com");
    }

    #[test]
    fn test_canonicalize_malformed_input_degrades() {
        assert_eq!(canonicalize("  not a url  "), "not a url");
        assert_eq!(canonicalize("/relative/path"), "/relative/path");
        assert_eq!(canonicalize("mailto:editor@example.com"), "mailto:editor@example.com");
    }

    #[test]
    fn test_tokenize_folds_accents_and_drops_stopwords() {
        let tokens = tokenize("Inflação de Março sobe para 5%, diz o Banco Central");
        let expected: HashSet<String> = ["inflacao", "marco", "sobe", "5", "diz", "banco", "central"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_tokenize_empty_title() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  —  ").is_empty());
    }

    #[test]
    fn test_similarity_bounds_and_symmetry() {
        let titles = [
            "Selic sobe para 10%",
            "Copom eleva a Selic para 10% ao ano",
            "Governo anuncia novo arcabouço fiscal",
            "The Fed holds rates steady",
            "",
        ];
        for a in &titles {
            for b in &titles {
                let ab = similarity(a, b);
                let ba = similarity(b, a);
                assert_eq!(ab, ba, "similarity not symmetric for {a:?} / {b:?}");
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_similarity_identity() {
        assert_eq!(similarity("Selic sobe para 10%", "Selic sobe para 10%"), 1.0);
        assert_eq!(similarity("SELIC sobe para 10%!", "selic sobe para 10%"), 1.0);
    }

    #[test]
    fn test_similarity_empty_is_zero() {
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("de para com", "de para com"), 0.0);
    }

    #[test]
    fn test_similarity_partial_overlap() {
        // {selic, sobe, 10} vs {selic, cai, 10} -> 2 / 4
        assert_eq!(similarity("Selic sobe para 10%", "Selic cai para 10%"), 0.5);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Plano  de Saúde: reajuste!"), "plano de saude reajuste");
    }
}
