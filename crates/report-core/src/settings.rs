use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ReportError, Result};
use crate::models::TimestampPolicy;

/// Default Figma REST API origin.
pub const DEFAULT_FIGMA_API_URL: &str = "https://api.figma.com";

/// Default Notion REST API origin.
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";

/// Leading character that flags a deprecated component by convention.
pub const DEFAULT_DEPRECATED_MARKER: &str = "⛔";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Component usage reports for Figma libraries
#[derive(Parser, Debug, Clone)]
#[command(
    name = "component-report",
    about = "Component usage reports for Figma libraries",
    version
)]
pub struct Settings {
    /// Comma-separated Figma file keys
    #[arg(short, long, default_value = "")]
    pub files: String,

    /// Analysis period (30d, 60d, 90d, 1y or a custom "YYYY-MM-DD,YYYY-MM-DD")
    #[arg(short, long, default_value = "30d")]
    pub period: String,

    /// Directory the CSV and Markdown reports are written to
    #[arg(long, default_value = "reports")]
    pub reports_dir: PathBuf,

    /// Also write one CSV combining every file of the batch
    #[arg(long)]
    pub consolidated: bool,

    /// Which variant's dates a component set reports
    #[arg(long, default_value = "last", value_parser = ["last", "first"])]
    pub timestamp_policy: String,

    /// Leading marker of deprecated component names (sorted last)
    #[arg(long, default_value = DEFAULT_DEPRECATED_MARKER)]
    pub deprecated_marker: String,

    /// Timezone for report dates (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Figma personal access token
    #[arg(long, env = "FIGMA_TOKEN", hide_env_values = true)]
    pub figma_token: Option<String>,

    /// Figma API origin
    #[arg(long, env = "FIGMA_API_URL", default_value = DEFAULT_FIGMA_API_URL)]
    pub figma_api_url: String,

    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Notion page that receives the report databases (enables mirroring)
    #[arg(long, env = "NOTION_PAGE_ID")]
    pub notion_page_id: Option<String>,

    /// Existing Notion summary database to append run summaries to
    #[arg(long, env = "NOTION_SUMMARY_DB")]
    pub notion_summary_db: Option<String>,

    /// Notion API origin
    #[arg(long, env = "NOTION_API_URL", default_value = DEFAULT_NOTION_API_URL)]
    pub notion_api_url: String,

    /// Records written to Notion between pauses
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub mirror_batch_size: u32,

    /// Pause between Notion batches, in milliseconds
    #[arg(long, default_value = "1000")]
    pub mirror_pause_ms: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.component-report/last_used.json`.
///
/// Only non-secret, non-target parameters are remembered; file keys and
/// tokens always come from the current invocation.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_policy: Option<String>,
}

impl LastUsedParams {
    /// Default path: `~/.component-report/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// The config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".component-report").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    ///
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and merge last-used params where no explicit CLI
    /// value was provided, then persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with an explicit argument
    /// list and config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // clap keys args by field name, not by the hyphenated flag.
        if !is_arg_explicitly_set(&matches, "period") {
            if let Some(v) = last.period {
                settings.period = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "reports_dir") {
            if let Some(v) = last.reports_dir {
                settings.reports_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timestamp_policy") {
            if let Some(v) = last.timestamp_policy {
                settings.timestamp_policy = v;
            }
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Split `--files` into trimmed, unquoted, non-empty file keys.
    pub fn file_ids(&self) -> Vec<String> {
        parse_file_ids(&self.files)
    }

    /// Typed timestamp policy.
    pub fn timestamp_policy(&self) -> TimestampPolicy {
        self.timestamp_policy.parse().unwrap_or_default()
    }

    /// The Figma token, or a configuration error when absent.
    pub fn require_figma_token(&self) -> Result<&str> {
        match self.figma_token.as_deref() {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(ReportError::Config(
                "FIGMA_TOKEN not found. Set it in the environment or a .env file.".to_string(),
            )),
        }
    }

    /// Whether a Notion destination was configured.
    pub fn mirror_enabled(&self) -> bool {
        self.notion_page_id
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false)
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

/// Split a comma-separated list of file keys.
pub fn parse_file_ids(raw: &str) -> Vec<String> {
    raw.replace(['\'', '"'], "")
        .split(',')
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            period: Some(s.period.clone()),
            reports_dir: Some(s.reports_dir.clone()),
            timezone: Some(s.timezone.clone()),
            timestamp_policy: Some(s.timestamp_policy.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
