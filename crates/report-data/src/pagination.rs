//! Cursor pagination shared by the analytics readers.

use std::future::Future;

use report_core::models::Page;
use report_core::Result;
use tracing::{debug, warn};

/// Fetch every page of a cursor-paginated endpoint and concatenate the rows.
///
/// `fetch_page` receives `None` for the first request and the previous
/// page's `next_cursor` afterwards. The loop ends when a page reports no
/// successor, when a page claims a successor but carries no cursor, or when
/// a request fails. A failure is not propagated: the rows gathered so far
/// are returned and a warning is logged.
///
/// Rows are not de-duplicated; overlapping pages are counted twice.
pub async fn collect_pages<T, F, Fut>(source_name: &str, file_id: &str, mut fetch_page: F) -> Vec<T>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut rows: Vec<T> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = match fetch_page(cursor.take()).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    source = source_name,
                    file_id,
                    pages,
                    rows = rows.len(),
                    error = %e,
                    "page request failed; keeping rows fetched so far"
                );
                break;
            }
        };

        pages += 1;
        rows.extend(page.rows);

        if !page.has_next_page {
            break;
        }

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => {
                warn!(
                    source = source_name,
                    file_id, pages, "next page announced without a cursor; stopping"
                );
                break;
            }
        }
    }

    debug!(
        source = source_name,
        file_id,
        pages,
        rows = rows.len(),
        "pagination finished"
    );

    rows
}

// ── Tests ─────────────────────────────────────────────────────────────────────
