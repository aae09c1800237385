//! Small helpers shared by the binary and the pipeline.

use chrono::NaiveDate;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with
/// `"…(+N bytes)"` appended.
///
/// ```
/// use news_digest::utils::truncate_for_log;
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Mail subject for the digest sent on `date`: `"<prefix> – dd/mm/YYYY"`.
pub fn subject_line(prefix: &str, date: NaiveDate) -> String {
    format!("{} – {}", prefix.trim(), date.format("%d/%m/%Y"))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // 'ç' is two bytes; byte 3 falls inside it
        let result = truncate_for_log("maçã verde", 3);
        assert!(result.starts_with("ma…"));
    }

    #[test]
    fn test_subject_line() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(
            subject_line("Resumo diário de notícias ", date),
            "Resumo diário de notícias – 07/03/2026"
        );
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let dir = std::env::temp_dir().join(format!("news_digest_probe_{}", std::process::id()));
        let path = dir.to_str().unwrap().to_string();
        ensure_writable_dir(&path).await.expect("temp dir is writable");
        assert!(dir.is_dir());
        let _ = fs::remove_dir_all(&dir).await;
    }
}
