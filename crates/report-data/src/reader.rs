//! Source readers.
//!
//! [`ComponentSource`] is the seam between the pipeline and the design-file
//! API. The `read_*` functions wrap it with the degrade-to-empty failure
//! policy: a failing source is logged and contributes no rows, it never
//! aborts the report.

use async_trait::async_trait;
use report_core::models::{FileMetadata, Page, RawActionRow, RawUsageRow};
use report_core::period::ReportPeriod;
use report_core::Result;
use tracing::{debug, warn};

use crate::pagination::collect_pages;

// ── ComponentSource ───────────────────────────────────────────────────────────

/// Access to one library file's components and analytics.
#[async_trait]
pub trait ComponentSource: Send + Sync {
    /// Display name and published components of `file_id`.
    async fn file_metadata(&self, file_id: &str) -> Result<FileMetadata>;

    /// One page of insertion/detachment rows within `period`.
    async fn actions_page(
        &self,
        file_id: &str,
        period: &ReportPeriod,
        cursor: Option<String>,
    ) -> Result<Page<RawActionRow>>;

    /// One page of cumulative usage rows.
    async fn usages_page(&self, file_id: &str, cursor: Option<String>)
        -> Result<Page<RawUsageRow>>;
}

// ── Readers ───────────────────────────────────────────────────────────────────

/// Read file metadata, falling back to an empty component list named after
/// the file key when the source fails.
pub async fn read_metadata<S>(source: &S, file_id: &str) -> FileMetadata
where
    S: ComponentSource + ?Sized,
{
    match source.file_metadata(file_id).await {
        Ok(meta) => {
            debug!(
                file_id,
                library = %meta.name,
                components = meta.components.len(),
                "metadata loaded"
            );
            meta
        }
        Err(e) => {
            warn!(file_id, error = %e, "metadata source failed; no components available");
            FileMetadata {
                name: file_id.to_string(),
                components: Vec::new(),
            }
        }
    }
}

/// Read every action row of `file_id` within `period`.
pub async fn read_actions<S>(source: &S, file_id: &str, period: &ReportPeriod) -> Vec<RawActionRow>
where
    S: ComponentSource + ?Sized,
{
    collect_pages("actions", file_id, |cursor| {
        source.actions_page(file_id, period, cursor)
    })
    .await
}

/// Read every usage row of `file_id`.
pub async fn read_usages<S>(source: &S, file_id: &str) -> Vec<RawUsageRow>
where
    S: ComponentSource + ?Sized,
{
    collect_pages("usages", file_id, |cursor| source.usages_page(file_id, cursor)).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
