//! CSV and Markdown report files.

use std::fs;
use std::path::{Path, PathBuf};

use report_core::data_processors::TimestampProcessor;
use report_core::formatting::{format_count, format_duration_hms, normalize_name};
use report_core::models::{AggregatedComponent, ReportSummary};
use report_core::{ReportError, Result};
use serde::Serialize;
use tracing::debug;

/// Paths of the two files written for one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub markdown: PathBuf,
}

// ── CSV rows ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Component Name")]
    component_name: &'a str,
    #[serde(rename = "Total Variants")]
    total_variants: String,
    #[serde(rename = "Usages")]
    usages: u64,
    #[serde(rename = "Insertions")]
    insertions: u64,
    #[serde(rename = "Detachments")]
    detachments: u64,
    #[serde(rename = "Updated At")]
    updated_at: String,
    #[serde(rename = "Created At")]
    created_at: String,
    #[serde(rename = "Type")]
    component_type: String,
}

impl<'a> From<&'a AggregatedComponent> for CsvRow<'a> {
    fn from(c: &'a AggregatedComponent) -> Self {
        Self {
            component_name: &c.group_name,
            total_variants: c.total_variants.to_string(),
            usages: c.total_usages,
            insertions: c.total_insertions,
            detachments: c.total_detachments,
            updated_at: TimestampProcessor::format_date(&c.updated_at),
            created_at: TimestampProcessor::format_date(&c.created_at),
            component_type: c.component_type.to_string(),
        }
    }
}

/// [`CsvRow`] prefixed with the library name. The csv serializer has no
/// support for flattened structs, so the columns are repeated here.
#[derive(Debug, Serialize)]
struct ConsolidatedRow<'a> {
    #[serde(rename = "Library")]
    library: &'a str,
    #[serde(rename = "Component Name")]
    component_name: &'a str,
    #[serde(rename = "Total Variants")]
    total_variants: String,
    #[serde(rename = "Usages")]
    usages: u64,
    #[serde(rename = "Insertions")]
    insertions: u64,
    #[serde(rename = "Detachments")]
    detachments: u64,
    #[serde(rename = "Updated At")]
    updated_at: String,
    #[serde(rename = "Created At")]
    created_at: String,
    #[serde(rename = "Type")]
    component_type: String,
}

impl<'a> ConsolidatedRow<'a> {
    fn new(library: &'a str, c: &'a AggregatedComponent) -> Self {
        let row = CsvRow::from(c);
        Self {
            library,
            component_name: row.component_name,
            total_variants: row.total_variants,
            usages: row.usages,
            insertions: row.insertions,
            detachments: row.detachments,
            updated_at: row.updated_at,
            created_at: row.created_at,
            component_type: row.component_type,
        }
    }
}

// ── ReportWriter ──────────────────────────────────────────────────────────────

/// Writes report files into one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    reports_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Create the reports directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.reports_dir).map_err(|source| ReportError::FileWrite {
            path: self.reports_dir.clone(),
            source,
        })
    }

    /// `report_{library}_{period}_{timestamp}`.
    pub fn file_stem(library_name: &str, period_label: &str, file_timestamp: &str) -> String {
        format!(
            "report_{}_{}_{}",
            normalize_name(library_name),
            period_label,
            file_timestamp
        )
    }

    /// Write the CSV and the Markdown summary of one library.
    pub fn write_report(
        &self,
        stem: &str,
        rows: &[AggregatedComponent],
        summary: &ReportSummary,
    ) -> Result<ReportPaths> {
        let csv = self.write_csv(stem, rows)?;
        let markdown = self.write_markdown(stem, summary)?;
        Ok(ReportPaths { csv, markdown })
    }

    /// Write `rows` as `{stem}.csv`.
    pub fn write_csv(&self, stem: &str, rows: &[AggregatedComponent]) -> Result<PathBuf> {
        let path = self.reports_dir.join(format!("{}.csv", stem));
        self.write_records(&path, rows.iter().map(CsvRow::from))?;
        debug!(path = %path.display(), rows = rows.len(), "CSV written");
        Ok(path)
    }

    /// Write every library's rows into one CSV with a leading `Library` column.
    pub fn write_consolidated(
        &self,
        stem: &str,
        rows: &[(String, AggregatedComponent)],
    ) -> Result<PathBuf> {
        let path = self.reports_dir.join(format!("{}.csv", stem));
        self.write_records(
            &path,
            rows.iter()
                .map(|(library, c)| ConsolidatedRow::new(library, c)),
        )?;
        debug!(path = %path.display(), rows = rows.len(), "consolidated CSV written");
        Ok(path)
    }

    /// Write `summary` as `{stem}.md`.
    pub fn write_markdown(&self, stem: &str, summary: &ReportSummary) -> Result<PathBuf> {
        let path = self.reports_dir.join(format!("{}.md", stem));
        fs::write(&path, render_markdown(summary)).map_err(|source| ReportError::FileWrite {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Markdown summary written");
        Ok(path)
    }

    fn write_records<R, I>(&self, path: &Path, records: I) -> Result<()>
    where
        R: Serialize,
        I: IntoIterator<Item = R>,
    {
        self.ensure_dir()?;
        let mut writer =
            csv::Writer::from_path(path).map_err(|e| ReportError::Csv(e.to_string()))?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| ReportError::Csv(e.to_string()))?;
        }
        writer.flush().map_err(|source| ReportError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Render the Markdown run summary.
pub fn render_markdown(summary: &ReportSummary) -> String {
    let last_week = summary.last_valid_week.as_deref().unwrap_or("N/A");
    format!(
        "# Component Report\n\
         \n\
         - **Library Name**: {library}\n\
         - **Total Components**: {components}\n\
         - **Total Variants**: {variants}\n\
         - **Total Usages**: {usages}\n\
         - **Total Insertions**: {insertions}\n\
         - **Total Detachments**: {detachments}\n\
         - **Generation Date**: {generated}\n\
         - **Selected Period**: {period} ({label})\n\
         - **Last Closed Valid Week**: {last_week}\n\
         - **Total Execution Time**: {hms} ({seconds:.2} seconds)\n",
        library = summary.library_name,
        components = format_count(summary.total_components as u64),
        variants = format_count(summary.total_variants),
        usages = format_count(summary.total_usages),
        insertions = format_count(summary.total_insertions),
        detachments = format_count(summary.total_detachments),
        generated = summary.generated_at,
        period = summary.selected_period(),
        label = summary.period_label,
        last_week = last_week,
        hms = format_duration_hms(summary.execution_seconds),
        seconds = summary.execution_seconds,
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
