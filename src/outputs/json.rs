//! JSON output of the assembled digest.
//!
//! Files are organized by run date:
//! ```text
//! json_output_dir/
//! └── 2026-10-19/
//!     └── digest.json
//! ```
//! A second run on the same day overwrites the file.

use crate::models::Digest;
use chrono::NaiveDate;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the digest file for `date` under `json_output_dir`.
pub fn digest_path(json_output_dir: &str, date: NaiveDate) -> PathBuf {
    Path::new(json_output_dir)
        .join(date.to_string())
        .join("digest.json")
}

/// Write `digest` to `{json_output_dir}/{date}/digest.json`.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, %date))]
pub async fn write_digest(
    digest: &Digest,
    json_output_dir: &str,
    date: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;
    let path = digest_path(json_output_dir, date);

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), items = digest.item_count(), "Wrote JSON digest");
    Ok(path)
}
