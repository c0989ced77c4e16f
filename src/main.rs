//! News radar binary.
//! Runs one ingestion + ranking pass over the configured sources and prints
//! the report as JSON on stdout.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_radar::ingest::config::load_sources_default;
use news_radar::{Radar, RadarSettings};

/// Human-readable logs on stderr; `RADAR_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_radar=info,warn"));
    let json = std::env::var("RADAR_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op if absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = RadarSettings::load().context("loading radar settings")?;
    let sources = load_sources_default().context("loading source list")?;
    let radar = Radar::from_settings(&settings).context("building radar")?;

    let report = radar
        .run(&sources, settings.window_hours, settings.top_k)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
