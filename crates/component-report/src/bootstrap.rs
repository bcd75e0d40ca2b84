use std::path::Path;

use chrono::NaiveDate;
use report_core::period::{parse_period, ReportPeriod};
use report_core::settings::Settings;
use report_core::ReportError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` value to an `EnvFilter` directive.
fn level_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber.
///
/// HTTP client internals stay at `warn` unless `RUST_LOG` says otherwise.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let directive = level_directive(log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,reqwest=warn,rustls=warn", directive))
    });

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Create the reports directory (and any missing parents).
pub fn ensure_reports_dir(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ── Input validation ───────────────────────────────────────────────────────────

/// Notion destination, present only when mirroring is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionTarget {
    pub token: String,
    pub page_id: String,
}

/// Everything a run needs before the first request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub file_ids: Vec<String>,
    pub period: ReportPeriod,
    pub figma_token: String,
    pub notion: Option<NotionTarget>,
}

/// Validate the required inputs.
///
/// Any error here is fatal: the process exits before touching the network.
pub fn resolve_inputs(settings: &Settings, today: NaiveDate) -> Result<RunInputs, ReportError> {
    let file_ids = settings.file_ids();
    if file_ids.is_empty() {
        return Err(ReportError::NoFileIds);
    }

    let period = parse_period(&settings.period, today)?;
    let figma_token = settings.require_figma_token()?.to_string();

    let notion = if settings.mirror_enabled() {
        let token = settings
            .notion_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ReportError::Config(
                    "NOTION_TOKEN is required when a Notion page is configured".to_string(),
                )
            })?;
        Some(NotionTarget {
            token: token.to_string(),
            page_id: settings
                .notion_page_id
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
        })
    } else {
        None
    };

    Ok(RunInputs {
        file_ids,
        period,
        figma_token,
        notion,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
