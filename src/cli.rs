//! Command-line interface definitions for News Digest.
//!
//! Every option can also be provided through an environment variable, which
//! is how SMTP credentials are meant to be passed.

use clap::Parser;

/// Command-line arguments for the News Digest application.
///
/// # Examples
///
/// ```sh
/// # Build and send today's digest
/// news_digest -c config.yaml
///
/// # Write the HTML locally without sending
/// news_digest -c config.yaml --dry-run --html-output ./digest.html
///
/// # Scheduled every hour by cron, but only act at 07:00 local time
/// news_digest -c config.yaml --only-at-hour 7 -j ./json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "NEWS_DIGEST_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Output directory for the dated JSON copy of the digest
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Write the rendered HTML document to this file
    #[arg(long)]
    pub html_output: Option<String>,

    /// Assemble the digest but do not send it
    #[arg(long)]
    pub dry_run: bool,

    /// Do not send anything when no section produced items
    #[arg(long)]
    pub skip_empty: bool,

    /// Exit without doing anything unless the local hour equals this value
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub only_at_hour: Option<u32>,

    /// SMTP user name
    #[arg(long, env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP password or app password
    #[arg(long, env = "SMTP_PASS", hide_env_values = true)]
    pub smtp_pass: Option<String>,
}

impl Cli {
    /// Whether a run scheduled at `hour` (local time) should proceed.
    pub fn should_run_at(&self, hour: u32) -> bool {
        self.only_at_hour.is_none_or(|wanted| wanted == hour)
    }
}
