//! Batch orchestration.
//!
//! Files are processed strictly one after another: read, aggregate, order,
//! write, mirror. The next file starts only after the previous one is fully
//! done. A file that fails is logged and the batch moves on.

use std::path::PathBuf;
use std::time::Instant;

use report_core::models::{AggregatedComponent, ComponentType, ReportSummary, TimestampPolicy};
use report_core::period::ReportPeriod;
use report_core::time_utils::{
    format_file_timestamp, format_generation_date, format_title_timestamp, ReportClock,
};
use report_core::Result;
use report_data::aggregator::{aggregate, Aggregation};
use report_data::presenter::order_components;
use report_data::reader::{read_actions, read_metadata, read_usages, ComponentSource};
use tracing::{error, info, warn};

use crate::mirror::{mirror_report, report_database_title, MirrorPacing, WorkspaceMirror};
use crate::writer::{ReportPaths, ReportWriter};

// ── Public types ──────────────────────────────────────────────────────────────

/// Per-batch options that do not change between files.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub period: ReportPeriod,
    pub timestamp_policy: TimestampPolicy,
    pub deprecated_marker: String,
    /// Write one CSV combining every file after the batch.
    pub consolidated: bool,
    /// Existing summary database to append to instead of creating one.
    pub summary_database_id: Option<String>,
    pub pacing: MirrorPacing,
}

/// Rows of every processed library, collected for the consolidated report.
#[derive(Debug, Default, Clone)]
pub struct BatchAccumulator {
    rows: Vec<(String, AggregatedComponent)>,
    libraries: Vec<String>,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one library's ordered rows.
    pub fn add(&mut self, library_name: &str, rows: &[AggregatedComponent]) {
        self.libraries.push(library_name.to_string());
        self.rows.extend(
            rows.iter()
                .map(|row| (library_name.to_string(), row.clone())),
        );
    }

    pub fn rows(&self) -> &[(String, AggregatedComponent)] {
        &self.rows
    }

    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Written {
        library_name: String,
        paths: ReportPaths,
        summary: ReportSummary,
    },
    /// The file has no components.
    Skipped,
}

/// Totals of one batch run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub written: Vec<ReportPaths>,
    pub skipped: Vec<String>,
    /// File id → error message.
    pub failed: Vec<(String, String)>,
    pub consolidated: Option<PathBuf>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

// ── BatchRunner ───────────────────────────────────────────────────────────────

/// Drives the report pipeline over a list of file ids.
pub struct BatchRunner {
    source: Box<dyn ComponentSource>,
    mirror: Option<Box<dyn WorkspaceMirror>>,
    writer: ReportWriter,
    clock: ReportClock,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(
        source: Box<dyn ComponentSource>,
        writer: ReportWriter,
        clock: ReportClock,
        options: BatchOptions,
    ) -> Self {
        Self {
            source,
            mirror: None,
            writer,
            clock,
            options,
        }
    }

    /// Mirror every written report into `mirror`.
    pub fn with_mirror(mut self, mirror: Box<dyn WorkspaceMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Process every file in input order.
    pub async fn run(&self, file_ids: &[String]) -> BatchReport {
        let total = file_ids.len();
        info!(
            files = total,
            period = %self.options.period,
            "starting component report batch"
        );

        let mut report = BatchReport::default();
        let mut accumulator = BatchAccumulator::new();
        let mut summary_db = self.options.summary_database_id.clone();

        for (i, file_id) in file_ids.iter().enumerate() {
            info!("[{}/{}] processing file {}", i + 1, total, file_id);

            match self
                .process_file(file_id, &mut accumulator, &mut summary_db)
                .await
            {
                Ok(FileOutcome::Written {
                    library_name,
                    paths,
                    ..
                }) => {
                    info!(
                        "[{}/{}] {} done: {}",
                        i + 1,
                        total,
                        library_name,
                        paths.csv.display()
                    );
                    report.written.push(paths);
                }
                Ok(FileOutcome::Skipped) => report.skipped.push(file_id.clone()),
                Err(e) => {
                    error!(file_id = %file_id, error = %e, "[{}/{}] file failed", i + 1, total);
                    report.failed.push((file_id.clone(), e.to_string()));
                }
            }
        }

        if self.options.consolidated {
            report.consolidated = self.write_consolidated(&accumulator);
        }

        info!(
            written = report.written.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }

    /// Run the full pipeline for one file.
    ///
    /// Rows are appended to `accumulator`; `summary_db` carries the summary
    /// database across files once the mirror has created it.
    pub async fn process_file(
        &self,
        file_id: &str,
        accumulator: &mut BatchAccumulator,
        summary_db: &mut Option<String>,
    ) -> Result<FileOutcome> {
        let started = Instant::now();
        let source = self.source.as_ref();

        let metadata = read_metadata(source, file_id).await;
        if metadata.components.is_empty() {
            warn!(file_id, "no components found; skipping file");
            return Ok(FileOutcome::Skipped);
        }
        let actions = read_actions(source, file_id, &self.options.period).await;
        let usages = read_usages(source, file_id).await;

        let aggregation = aggregate(
            &metadata.components,
            &actions,
            &usages,
            self.options.timestamp_policy,
        );
        if let Some(note) = describe_unmatched(&aggregation) {
            info!(file_id, "{}", note);
        }
        let last_valid_week = aggregation.last_valid_week.clone();
        let rows = order_components(aggregation.groups, &self.options.deprecated_marker);

        let now = self.clock.now();
        let summary = build_summary(
            &metadata.name,
            &rows,
            &self.options.period,
            format_generation_date(&now),
            last_valid_week,
            started.elapsed().as_secs_f64(),
        );

        let stem = ReportWriter::file_stem(
            &metadata.name,
            &self.options.period.label,
            &format_file_timestamp(&now),
        );
        let paths = self.writer.write_report(&stem, &rows, &summary)?;
        info!(
            library = %metadata.name,
            components = summary.total_components,
            csv = %paths.csv.display(),
            markdown = %paths.markdown.display(),
            "report written"
        );

        if let Some(mirror) = &self.mirror {
            let title = report_database_title(
                &metadata.name,
                &format_title_timestamp(&now),
                &self.options.period.label,
            );
            let outcome = mirror_report(
                mirror.as_ref(),
                self.options.pacing,
                &title,
                &rows,
                &summary,
                summary_db.take(),
            )
            .await;
            *summary_db = outcome.summary_database_id;
        }

        accumulator.add(&metadata.name, &rows);

        Ok(FileOutcome::Written {
            library_name: metadata.name,
            paths,
            summary,
        })
    }

    fn write_consolidated(&self, accumulator: &BatchAccumulator) -> Option<PathBuf> {
        if accumulator.is_empty() {
            warn!("no rows collected; consolidated report not written");
            return None;
        }
        let stem = format!(
            "report_consolidated_{}_{}",
            self.options.period.label,
            format_file_timestamp(&self.clock.now())
        );
        match self.writer.write_consolidated(&stem, accumulator.rows()) {
            Ok(path) => {
                info!(
                    libraries = accumulator.libraries().len(),
                    path = %path.display(),
                    "consolidated report written"
                );
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "failed to write consolidated report");
                None
            }
        }
    }
}

fn saturating_total(rows: &[AggregatedComponent], field: impl Fn(&AggregatedComponent) -> u64) -> u64 {
    rows.iter().fold(0, |acc, r| acc.saturating_add(field(r)))
}

/// Totals of one library's ordered rows.
pub fn build_summary(
    library_name: &str,
    rows: &[AggregatedComponent],
    period: &ReportPeriod,
    generated_at: String,
    last_valid_week: Option<String>,
    execution_seconds: f64,
) -> ReportSummary {
    let total_variants = rows
        .iter()
        .filter(|r| r.component_type == ComponentType::Set)
        .fold(0u64, |acc, r| acc.saturating_add(u64::from(r.total_variants.as_count())));

    ReportSummary {
        library_name: library_name.to_string(),
        total_components: rows.len(),
        total_variants,
        total_usages: saturating_total(rows, |r| r.total_usages),
        total_insertions: saturating_total(rows, |r| r.total_insertions),
        total_detachments: saturating_total(rows, |r| r.total_detachments),
        generated_at,
        period_label: period.label.clone(),
        period_start: period.start_str(),
        period_end: period.end_str(),
        last_valid_week,
        execution_seconds,
    }
}

/// One-line note about analytics rows that matched no component.
fn describe_unmatched(aggregation: &Aggregation) -> Option<String> {
    if aggregation.unmatched_actions == 0 && aggregation.unmatched_usages == 0 {
        return None;
    }
    Some(format!(
        "{} action row(s) and {} usage row(s) matched no component",
        aggregation.unmatched_actions, aggregation.unmatched_usages
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
