mod bootstrap;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use report_core::settings::Settings;
use report_core::time_utils::ReportClock;
use report_data::figma::FigmaClient;
use report_runtime::mirror::{MirrorPacing, NotionMirror};
use report_runtime::orchestrator::{BatchOptions, BatchRunner};
use report_runtime::writer::ReportWriter;

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` must be loaded before clap reads the token variables.
    let dotenv = dotenvy::dotenv();

    let settings = Settings::load_with_last_used();
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("Component Report v{} starting", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), ".env loaded"),
        Err(e) if e.not_found() => tracing::debug!("no .env file found"),
        Err(e) => tracing::warn!(error = %e, "failed to read .env"),
    }

    let clock = ReportClock::new(&settings.timezone);
    let inputs = bootstrap::resolve_inputs(&settings, clock.today())?;

    bootstrap::ensure_reports_dir(&settings.reports_dir)
        .with_context(|| format!("cannot use reports directory {}", settings.reports_dir.display()))?;

    tracing::info!(
        "Files: {}, Period: {}, Reports: {}",
        inputs.file_ids.len(),
        inputs.period,
        settings.reports_dir.display()
    );

    let source = FigmaClient::new(&settings.figma_api_url, &inputs.figma_token)?;
    let options = BatchOptions {
        period: inputs.period.clone(),
        timestamp_policy: settings.timestamp_policy(),
        deprecated_marker: settings.deprecated_marker.clone(),
        consolidated: settings.consolidated,
        summary_database_id: settings
            .notion_summary_db
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        pacing: MirrorPacing {
            batch_size: settings.mirror_batch_size,
            pause: Duration::from_millis(settings.mirror_pause_ms),
        },
    };

    let mut runner = BatchRunner::new(
        Box::new(source),
        ReportWriter::new(&settings.reports_dir),
        clock,
        options,
    );
    if let Some(notion) = &inputs.notion {
        tracing::info!("Mirroring reports to Notion page {}", notion.page_id);
        let mirror = NotionMirror::new(&settings.notion_api_url, &notion.token, &notion.page_id)?;
        runner = runner.with_mirror(Box::new(mirror));
    }

    let report = runner.run(&inputs.file_ids).await;

    for (file_id, message) in &report.failed {
        tracing::error!("{}: {}", file_id, message);
    }
    if report.written.is_empty() && report.has_failures() {
        bail!("no report could be generated");
    }

    Ok(())
}
