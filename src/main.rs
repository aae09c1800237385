//! `news_digest` binary: one run of the digest pipeline.
//!
//! ```sh
//! SMTP_USER=me@example.com SMTP_PASS=secret news_digest -c config.yaml -j ./json
//! ```

use chrono::{Local, Timelike};
use clap::Parser;
use lettre::transport::smtp::authentication::Credentials;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::Cli;
use news_digest::aggregator::Aggregator;
use news_digest::collector::{SectionCollector, DEFAULT_ENRICH_CONCURRENCY};
use news_digest::config::load_config;
use news_digest::deliver::smtp_deliverer;
use news_digest::fetch::HttpFetcher;
use news_digest::outputs::{html, json};
use news_digest::sources::render::AnyRenderer;
use news_digest::sources::LinkSource;
use news_digest::utils::{ensure_writable_dir, subject_line};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(config = %args.config, dry_run = args.dry_run, "Parsed CLI arguments");

    let now = Local::now();
    if !args.should_run_at(now.hour()) {
        info!(hour = now.hour(), wanted = ?args.only_at_hour, "Not the scheduled hour; nothing to do");
        return Ok(());
    }
    info!("news_digest starting up");

    let config = load_config(&args.config).await?;
    if !args.dry_run && config.delivery.is_none() {
        error!("No delivery settings configured; use --dry-run or add a `delivery` block");
        return Err("missing delivery settings".into());
    }

    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return Err(e);
        }
    }

    // ---- Collect ----
    let settings = &config.digest;
    let fetcher = HttpFetcher::new(&settings.user_agent)?;
    let renderer = AnyRenderer::from_endpoint(&fetcher, config.render.endpoint.as_deref());
    let links = LinkSource::new(fetcher, renderer, settings.fetch_timeout());
    let collector = SectionCollector::new(links, DEFAULT_ENRICH_CONCURRENCY);
    let aggregator = Aggregator::new(collector, settings);

    let deadline = settings.run_timeout().map(|t| tokio::time::Instant::now() + t);
    let digest = aggregator.run(&config.sources, deadline).await;

    let empty = digest.empty_sections();
    if !empty.is_empty() {
        warn!(count = empty.len(), sections = ?empty, "Sections without news");
    }
    info!(items = digest.item_count(), bucket = digest.bucket.len(), "Digest assembled");

    // ---- Outputs ----
    let today = now.date_naive();
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = json::write_digest(&digest, dir, today).await {
            error!(error = %e, "Failed to write JSON digest");
        }
    }

    let subject = subject_line(&settings.subject_prefix, today);
    let document = html::render_digest(&digest, &subject, settings.bucket_topic);

    if let Some(path) = &args.html_output {
        html::write_document(path, &document).await;
    }

    if digest.is_empty() && args.skip_empty {
        warn!("Digest is empty; skipping delivery");
    } else if args.dry_run {
        info!(%subject, "Dry run; not delivering");
    } else if let Some(delivery) = &config.delivery {
        let credentials = match (args.smtp_user, args.smtp_pass) {
            (Some(user), Some(pass)) => Some(Credentials::new(user, pass)),
            (None, None) => None,
            _ => {
                warn!("Only one of SMTP_USER / SMTP_PASS is set; connecting without credentials");
                None
            }
        };
        let deliverer = smtp_deliverer(delivery, credentials)?;
        deliverer.deliver(&document, &subject).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
