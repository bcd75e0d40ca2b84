//! Mirroring finished reports into a Notion workspace.
//!
//! Each run gets its own database under the configured parent page with one
//! page per report row. A summary database collects one entry per library
//! and is reused for the whole batch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use report_core::data_processors::TimestampProcessor;
use report_core::formatting::format_duration_hms;
use report_core::models::{AggregatedComponent, ReportSummary, VariantCount};
use report_core::{ReportError, Result};

const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── WorkspaceMirror ───────────────────────────────────────────────────────────

/// Remote destination for report rows and run summaries.
#[async_trait]
pub trait WorkspaceMirror: Send + Sync {
    /// Create the per-run database and return its id.
    async fn create_report_database(&self, title: &str) -> Result<String>;

    /// Add one report row to `database_id`.
    async fn add_component(&self, database_id: &str, component: &AggregatedComponent)
        -> Result<()>;

    /// Create the summary database and return its id.
    async fn create_summary_database(&self, title: &str) -> Result<String>;

    /// Add one run summary to `database_id`.
    async fn add_summary(&self, database_id: &str, summary: &ReportSummary) -> Result<()>;
}

/// Write rate limiting: a fixed pause after every `batch_size` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorPacing {
    pub batch_size: u32,
    pub pause: Duration,
}

impl Default for MirrorPacing {
    fn default() -> Self {
        Self {
            batch_size: 3,
            pause: Duration::from_millis(1000),
        }
    }
}

impl MirrorPacing {
    /// Whether to pause after writing record number `written` (1-based) of
    /// `total`. No pause follows the final record.
    pub fn pause_after(&self, written: usize, total: usize) -> bool {
        let batch = self.batch_size.max(1) as usize;
        !self.pause.is_zero() && written < total && written % batch == 0
    }
}

/// Outcome of mirroring one library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub written: usize,
    pub failed: usize,
    /// Summary database to reuse for the next library, if one exists.
    pub summary_database_id: Option<String>,
}

/// `Figma Component Report - {library} - {timestamp} - {period}`.
pub fn report_database_title(library_name: &str, title_timestamp: &str, period_label: &str) -> String {
    format!(
        "Figma Component Report - {} - {} - {}",
        library_name, title_timestamp, period_label
    )
}

/// Mirror one library's rows and summary.
///
/// Nothing here is fatal: every failure is logged and the remaining
/// records are still attempted. `summary_database_id` is the database
/// reused from earlier libraries; when absent one is created.
pub async fn mirror_report(
    mirror: &dyn WorkspaceMirror,
    pacing: MirrorPacing,
    title: &str,
    rows: &[AggregatedComponent],
    summary: &ReportSummary,
    summary_database_id: Option<String>,
) -> MirrorOutcome {
    let mut outcome = MirrorOutcome {
        summary_database_id,
        ..MirrorOutcome::default()
    };

    match mirror.create_report_database(title).await {
        Ok(database_id) => {
            info!(title, database_id = %database_id, "Notion database created");
            for (i, component) in rows.iter().enumerate() {
                match mirror.add_component(&database_id, component).await {
                    Ok(()) => {
                        outcome.written += 1;
                        debug!(
                            component = %component.group_name,
                            "[{}/{}] row mirrored",
                            i + 1,
                            rows.len()
                        );
                    }
                    Err(e) => {
                        outcome.failed += 1;
                        error!(component = %component.group_name, error = %e, "failed to mirror row");
                    }
                }
                if pacing.pause_after(i + 1, rows.len()) {
                    tokio::time::sleep(pacing.pause).await;
                }
            }
        }
        Err(e) => {
            outcome.failed = rows.len();
            error!(title, error = %e, "failed to create Notion database; rows not mirrored");
        }
    }

    let summary_db = match outcome.summary_database_id.clone() {
        Some(id) => Some(id),
        None => {
            let summary_title = format!("{} - Summary", title);
            match mirror.create_summary_database(&summary_title).await {
                Ok(id) => {
                    info!(title = %summary_title, database_id = %id, "Notion summary database created");
                    Some(id)
                }
                Err(e) => {
                    error!(error = %e, "failed to create Notion summary database");
                    None
                }
            }
        }
    };

    if let Some(id) = &summary_db {
        if let Err(e) = mirror.add_summary(id, summary).await {
            error!(library = %summary.library_name, error = %e, "failed to add Notion summary entry");
        }
    }
    outcome.summary_database_id = summary_db;

    if outcome.failed > 0 {
        warn!(
            written = outcome.written,
            failed = outcome.failed,
            "Notion mirror finished with failures"
        );
    } else {
        info!(written = outcome.written, "Notion mirror finished");
    }
    outcome
}

// ── NotionMirror ──────────────────────────────────────────────────────────────

/// [`WorkspaceMirror`] backed by the Notion REST API.
#[derive(Debug, Clone)]
pub struct NotionMirror {
    http: Client,
    base_url: String,
    token: String,
    parent_page_id: String,
}

impl NotionMirror {
    pub fn new(base_url: &str, token: &str, parent_page_id: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReportError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            parent_page_id: parent_page_id.to_string(),
        })
    }

    async fn post(&self, path: &str, target: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| ReportError::api("notion", target, e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ReportError::api("notion", target, Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(ReportError::api("notion", target, Some(status.as_u16()), message));
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn create_database(&self, title: &str, properties: Value) -> Result<String> {
        let body = json!({
            "parent": { "type": "page_id", "page_id": self.parent_page_id },
            "title": [{ "type": "text", "text": { "content": title } }],
            "properties": properties,
        });
        let created = self.post("/v1/databases", &self.parent_page_id, &body).await?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ReportError::api("notion", &self.parent_page_id, None, "database response without id")
            })
    }

    async fn create_page(&self, database_id: &str, properties: Value) -> Result<()> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        self.post("/v1/pages", database_id, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkspaceMirror for NotionMirror {
    async fn create_report_database(&self, title: &str) -> Result<String> {
        self.create_database(title, report_schema()).await
    }

    async fn add_component(&self, database_id: &str, component: &AggregatedComponent) -> Result<()> {
        self.create_page(database_id, component_properties(component))
            .await
    }

    async fn create_summary_database(&self, title: &str) -> Result<String> {
        self.create_database(title, summary_schema()).await
    }

    async fn add_summary(&self, database_id: &str, summary: &ReportSummary) -> Result<()> {
        self.create_page(database_id, summary_properties(summary))
            .await
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

fn number_schema() -> Value {
    json!({ "number": { "format": "number" } })
}

fn report_schema() -> Value {
    json!({
        "1. Component Name": { "title": {} },
        "2. Total Variants": number_schema(),
        "3. Usages": number_schema(),
        "4. Insertions": number_schema(),
        "5. Detachments": number_schema(),
        "6. Created At": { "date": {} },
        "7. Updated At": { "date": {} },
        "8. Type": {
            "select": {
                "options": [
                    { "name": "Single", "color": "blue" },
                    { "name": "Set", "color": "green" }
                ]
            }
        }
    })
}

fn summary_schema() -> Value {
    json!({
        "01. Library Name": { "title": {} },
        "02. Lib Tag Name": { "select": { "options": [] } },
        "03. Total Components": number_schema(),
        "04. Total Variants": number_schema(),
        "05. Total Usages": number_schema(),
        "06. Total Insertions": number_schema(),
        "07. Total Detachments": number_schema(),
        "08. Generation Date": { "date": {} },
        "09. Period Start": { "date": {} },
        "10. Period End": { "date": {} },
        "11. Last Valid Week": { "date": {} },
        "12. Execution Time": { "rich_text": {} }
    })
}

fn title_value(content: &str) -> Value {
    json!({ "title": [{ "text": { "content": content } }] })
}

/// A date property; unparseable or empty timestamps clear the field.
fn date_value(raw: &str) -> Value {
    match TimestampProcessor::parse_str(raw) {
        Some(dt) => json!({ "date": { "start": dt.format("%Y-%m-%d").to_string() } }),
        None => json!({ "date": null }),
    }
}

fn component_properties(c: &AggregatedComponent) -> Value {
    let variants = match c.total_variants {
        VariantCount::Count(n) => json!(n),
        VariantCount::NotApplicable => Value::Null,
    };
    json!({
        "1. Component Name": title_value(&c.group_name),
        "2. Total Variants": { "number": variants },
        "3. Usages": { "number": c.total_usages },
        "4. Insertions": { "number": c.total_insertions },
        "5. Detachments": { "number": c.total_detachments },
        "6. Created At": date_value(&c.created_at),
        "7. Updated At": date_value(&c.updated_at),
        "8. Type": { "select": { "name": c.component_type.to_string() } }
    })
}

fn summary_properties(s: &ReportSummary) -> Value {
    // Select options may not contain commas.
    let tag = s.library_name.replace(',', " ");
    json!({
        "01. Library Name": title_value(&s.library_name),
        "02. Lib Tag Name": { "select": { "name": tag } },
        "03. Total Components": { "number": s.total_components },
        "04. Total Variants": { "number": s.total_variants },
        "05. Total Usages": { "number": s.total_usages },
        "06. Total Insertions": { "number": s.total_insertions },
        "07. Total Detachments": { "number": s.total_detachments },
        "08. Generation Date": date_value(&s.generated_at),
        "09. Period Start": date_value(&s.period_start),
        "10. Period End": date_value(&s.period_end),
        "11. Last Valid Week": date_value(s.last_valid_week.as_deref().unwrap_or("")),
        "12. Execution Time": {
            "rich_text": [{ "text": { "content": format_duration_hms(s.execution_seconds) } }]
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::models::ComponentType;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn button() -> AggregatedComponent {
        AggregatedComponent {
            group_name: "Button".to_string(),
            total_variants: VariantCount::Count(2),
            total_usages: 6,
            total_insertions: 5,
            total_detachments: 2,
            created_at: "2023-01-05T10:00:00Z".to_string(),
            updated_at: "2023-03-01T08:30:00Z".to_string(),
            component_type: ComponentType::Set,
        }
    }

    fn summary() -> ReportSummary {
        ReportSummary {
            library_name: "Core UI".to_string(),
            total_components: 1,
            total_variants: 2,
            total_usages: 6,
            total_insertions: 5,
            total_detachments: 2,
            generated_at: "2024-02-01 10:00:00".to_string(),
            period_label: "30d".to_string(),
            period_start: "2024-01-02".to_string(),
            period_end: "2024-02-01".to_string(),
            last_valid_week: None,
            execution_seconds: 3.0,
        }
    }

    fn no_pause() -> MirrorPacing {
        MirrorPacing {
            batch_size: 3,
            pause: Duration::ZERO,
        }
    }

    /// Records every call; fails `add_component` for names in `fail_on`.
    #[derive(Default)]
    struct RecordingMirror {
        calls: Mutex<Vec<String>>,
        fail_on: Vec<String>,
        fail_database: bool,
    }

    #[async_trait]
    impl WorkspaceMirror for RecordingMirror {
        async fn create_report_database(&self, title: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("db:{}", title));
            if self.fail_database {
                return Err(ReportError::api("notion", "page", Some(400), "bad parent"));
            }
            Ok("db-1".to_string())
        }

        async fn add_component(&self, database_id: &str, c: &AggregatedComponent) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("page:{}:{}", database_id, c.group_name));
            if self.fail_on.contains(&c.group_name) {
                return Err(ReportError::api("notion", database_id, Some(429), "rate limited"));
            }
            Ok(())
        }

        async fn create_summary_database(&self, title: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("summary-db:{}", title));
            Ok("summary-1".to_string())
        }

        async fn add_summary(&self, database_id: &str, s: &ReportSummary) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("summary:{}:{}", database_id, s.library_name));
            Ok(())
        }
    }

    fn named(name: &str) -> AggregatedComponent {
        AggregatedComponent::new(name, ComponentType::Single)
    }

    // ── pacing ────────────────────────────────────────────────────────────

    #[test]
    fn test_pause_after_every_batch_but_not_the_last_record() {
        let pacing = MirrorPacing::default();
        let pauses: Vec<usize> = (1..=7).filter(|&n| pacing.pause_after(n, 7)).collect();
        assert_eq!(pauses, vec![3, 6]);
        assert!(!pacing.pause_after(6, 6));
    }

    #[test]
    fn test_zero_pause_never_sleeps() {
        assert!(!no_pause().pause_after(3, 10));
    }

    // ── mirror_report ─────────────────────────────────────────────────────

    #[test]
    fn test_report_database_title() {
        assert_eq!(
            report_database_title("Core UI", "2024-02-01 - 10-00", "30d"),
            "Figma Component Report - Core UI - 2024-02-01 - 10-00 - 30d"
        );
    }

    #[tokio::test]
    async fn test_failed_rows_do_not_stop_the_rest() {
        let mirror = RecordingMirror {
            fail_on: vec!["B".to_string()],
            ..RecordingMirror::default()
        };
        let rows = vec![named("A"), named("B"), named("C")];
        let outcome = mirror_report(&mirror, no_pause(), "T", &rows, &summary(), None).await;

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.summary_database_id.as_deref(), Some("summary-1"));
        let calls = mirror.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                "db:T",
                "page:db-1:A",
                "page:db-1:B",
                "page:db-1:C",
                "summary-db:T - Summary",
                "summary:summary-1:Core UI",
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_summary_database_is_reused() {
        let mirror = RecordingMirror::default();
        let outcome = mirror_report(
            &mirror,
            no_pause(),
            "T",
            &[named("A")],
            &summary(),
            Some("existing".to_string()),
        )
        .await;

        assert_eq!(outcome.summary_database_id.as_deref(), Some("existing"));
        let calls = mirror.calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("summary-db:")));
        assert!(calls.contains(&"summary:existing:Core UI".to_string()));
    }

    #[tokio::test]
    async fn test_database_failure_still_writes_summary() {
        let mirror = RecordingMirror {
            fail_database: true,
            ..RecordingMirror::default()
        };
        let outcome =
            mirror_report(&mirror, no_pause(), "T", &[named("A"), named("B")], &summary(), None).await;

        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.failed, 2);
        let calls = mirror.calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("page:")));
        assert!(calls.contains(&"summary:summary-1:Core UI".to_string()));
    }

    // ── payloads ──────────────────────────────────────────────────────────

    #[test]
    fn test_component_properties() {
        let props = component_properties(&button());
        assert_eq!(props["1. Component Name"]["title"][0]["text"]["content"], "Button");
        assert_eq!(props["2. Total Variants"]["number"], 2);
        assert_eq!(props["6. Created At"]["date"]["start"], "2023-01-05");
        assert_eq!(props["8. Type"]["select"]["name"], "Set");
    }

    #[test]
    fn test_single_has_null_variant_count_and_dates() {
        let props = component_properties(&named("Icon/Close"));
        assert!(props["2. Total Variants"]["number"].is_null());
        assert!(props["7. Updated At"]["date"].is_null());
        assert_eq!(props["8. Type"]["select"]["name"], "Single");
    }

    #[test]
    fn test_summary_properties() {
        let props = summary_properties(&summary());
        assert_eq!(props["02. Lib Tag Name"]["select"]["name"], "Core UI");
        assert_eq!(props["08. Generation Date"]["date"]["start"], "2024-02-01");
        assert_eq!(props["09. Period Start"]["date"]["start"], "2024-01-02");
        assert!(props["11. Last Valid Week"]["date"].is_null());
        assert_eq!(
            props["12. Execution Time"]["rich_text"][0]["text"]["content"],
            "00:00:03"
        );
    }

    // ── NotionMirror (wiremock) ───────────────────────────────────────────

    #[tokio::test]
    async fn test_notion_mirror_end_to_end() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/databases"))
            .and(header("authorization", "Bearer secret"))
            .and(header("notion-version", NOTION_VERSION))
            .and(body_partial_json(json!({ "parent": { "page_id": "parent-1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "db-42" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pages"))
            .and(body_partial_json(json!({ "parent": { "database_id": "db-42" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "page" })))
            .mount(&server)
            .await;

        let mirror = NotionMirror::new(&server.uri(), "secret", "parent-1").unwrap();
        let rows = vec![button(), named("Icon/Close")];
        let outcome = mirror_report(&mirror, no_pause(), "T", &rows, &summary(), None).await;

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.summary_database_id.as_deref(), Some("db-42"));

        let requests = server.received_requests().await.unwrap();
        // report db, two rows, summary db, summary entry
        assert_eq!(requests.len(), 5);
    }

    #[tokio::test]
    async fn test_notion_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/databases"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "object": "error",
                "status": 400,
                "message": "Could not find page with ID: parent-1"
            })))
            .mount(&server)
            .await;

        let mirror = NotionMirror::new(&server.uri(), "secret", "parent-1").unwrap();
        let err = mirror.create_report_database("T").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("Could not find page"));
    }
}
