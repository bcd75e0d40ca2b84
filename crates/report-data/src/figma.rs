//! Figma REST API client.
//!
//! Implements [`ComponentSource`] over the file endpoints (`/v1/files/...`)
//! and the library analytics endpoints (`/v1/analytics/libraries/...`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use report_core::data_processors::CountExtractor;
use report_core::models::{
    ActionTarget, FileMetadata, Page, RawActionRow, RawComponent, RawUsageRow,
};
use report_core::period::ReportPeriod;
use report_core::{ReportError, Result};

use crate::reader::ComponentSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FileResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ComponentsResponse {
    #[serde(default)]
    meta: ComponentsMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ComponentsMeta {
    #[serde(default)]
    components: Vec<ComponentWire>,
}

#[derive(Debug, Deserialize)]
struct ComponentWire {
    key: String,
    name: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
    #[serde(default)]
    containing_frame: Option<ContainingFrame>,
}

#[derive(Debug, Deserialize)]
struct ContainingFrame {
    #[serde(rename = "containingStateGroup", default)]
    containing_state_group: Option<StateGroup>,
}

#[derive(Debug, Deserialize)]
struct StateGroup {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "nodeId", default)]
    node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComponentSetsResponse {
    #[serde(default)]
    meta: ComponentSetsMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ComponentSetsMeta {
    #[serde(default)]
    component_sets: Vec<ComponentSetWire>,
}

#[derive(Debug, Deserialize)]
struct ComponentSetWire {
    key: String,
    node_id: String,
}

// ── FigmaClient ───────────────────────────────────────────────────────────────

/// HTTP client for one Figma account.
#[derive(Debug, Clone)]
pub struct FigmaClient {
    http: Client,
    base_url: String,
    token: String,
}

impl FigmaClient {
    /// Create a client against `base_url` (e.g. `https://api.figma.com`).
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReportError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// GET `path` and decode the body as JSON, mapping every failure to a
    /// [`ReportError::Api`] tagged with `source_name` and `file_id`.
    async fn get_json(
        &self,
        source_name: &str,
        file_id: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(source = source_name, file_id, %url, ?query, "GET");

        let response = self
            .http
            .get(&url)
            .header("X-Figma-Token", &self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                ReportError::api(
                    source_name,
                    file_id,
                    e.status().map(|s| s.as_u16()),
                    e.to_string(),
                )
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReportError::api(source_name, file_id, Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(ReportError::api(
                source_name,
                file_id,
                Some(status.as_u16()),
                error_message(&body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            ReportError::api(
                source_name,
                file_id,
                Some(status.as_u16()),
                format!("malformed payload: {}", e),
            )
        })
    }

    async fn fetch_file_name(&self, file_id: &str) -> Result<String> {
        let value = self
            .get_json(
                "metadata",
                file_id,
                &format!("/v1/files/{}", file_id),
                &[("depth", "1".to_string())],
            )
            .await?;
        let file: FileResponse = serde_json::from_value(value)?;
        Ok(file.name)
    }

    async fn fetch_components(&self, file_id: &str) -> Result<Vec<ComponentWire>> {
        let value = self
            .get_json(
                "components",
                file_id,
                &format!("/v1/files/{}/components", file_id),
                &[],
            )
            .await?;
        let response: ComponentsResponse = serde_json::from_value(value)?;
        Ok(response.meta.components)
    }

    /// Map of set node id → set key.
    async fn fetch_component_set_keys(&self, file_id: &str) -> Result<HashMap<String, String>> {
        let value = self
            .get_json(
                "component_sets",
                file_id,
                &format!("/v1/files/{}/component_sets", file_id),
                &[],
            )
            .await?;
        let response: ComponentSetsResponse = serde_json::from_value(value)?;
        Ok(response
            .meta
            .component_sets
            .into_iter()
            .map(|set| (set.node_id, set.key))
            .collect())
    }
}

#[async_trait]
impl ComponentSource for FigmaClient {
    async fn file_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        let name = match self.fetch_file_name(file_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(file_id, error = %e, "file name unavailable; using file key");
                file_id.to_string()
            }
        };

        let components = self.fetch_components(file_id).await?;

        let set_keys = match self.fetch_component_set_keys(file_id).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(file_id, error = %e, "component set keys unavailable; matching sets by name");
                HashMap::new()
            }
        };

        Ok(FileMetadata {
            name,
            components: components
                .into_iter()
                .map(|c| to_raw_component(c, &set_keys))
                .collect(),
        })
    }

    async fn actions_page(
        &self,
        file_id: &str,
        period: &ReportPeriod,
        cursor: Option<String>,
    ) -> Result<Page<RawActionRow>> {
        let mut query = vec![
            ("group_by", "component".to_string()),
            ("start_date", period.start_str()),
            ("end_date", period.end_str()),
        ];
        if let Some(c) = cursor {
            query.push(("cursor", c));
        }
        let value = self
            .get_json(
                "actions",
                file_id,
                &format!("/v1/analytics/libraries/{}/component/actions", file_id),
                &query,
            )
            .await?;
        parse_page("actions", file_id, &value, parse_action_row)
    }

    async fn usages_page(
        &self,
        file_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<RawUsageRow>> {
        let mut query = vec![("group_by", "component".to_string())];
        if let Some(c) = cursor {
            query.push(("cursor", c));
        }
        let value = self
            .get_json(
                "usages",
                file_id,
                &format!("/v1/analytics/libraries/{}/component/usages", file_id),
                &query,
            )
            .await?;
        parse_page("usages", file_id, &value, parse_usage_row)
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

fn to_raw_component(wire: ComponentWire, set_keys: &HashMap<String, String>) -> RawComponent {
    let group = wire
        .containing_frame
        .and_then(|frame| frame.containing_state_group);

    let (containing_set_name, containing_set_key) = match group {
        Some(g) => {
            let key = g.node_id.as_ref().and_then(|id| set_keys.get(id)).cloned();
            (g.name.filter(|n| !n.is_empty()), key)
        }
        None => (None, None),
    };

    RawComponent {
        key: wire.key,
        name: wire.name,
        // A set key without a set name cannot form a group.
        containing_set_key: containing_set_name.as_ref().and(containing_set_key),
        containing_set_name,
        created_at: wire.created_at,
        updated_at: wire.updated_at,
    }
}

/// Split an analytics envelope `{ rows, next_page, cursor }` into a [`Page`].
///
/// A missing `rows` array is a malformed payload. Rows that cannot be mapped
/// are skipped.
fn parse_page<T>(
    source_name: &str,
    file_id: &str,
    value: &Value,
    parse_row: fn(&Value) -> Option<T>,
) -> Result<Page<T>> {
    let raw_rows = value.get("rows").and_then(Value::as_array).ok_or_else(|| {
        ReportError::api(source_name, file_id, None, "malformed payload: missing rows")
    })?;

    let rows: Vec<T> = raw_rows.iter().filter_map(parse_row).collect();
    if rows.len() != raw_rows.len() {
        debug!(
            source = source_name,
            file_id,
            skipped = raw_rows.len() - rows.len(),
            "rows without a usable key skipped"
        );
    }

    let has_next_page = value
        .get("next_page")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let next_cursor = value
        .get("cursor")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Page {
        rows,
        has_next_page,
        next_cursor,
    })
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Map one action row. The set key takes precedence over the component key.
fn parse_action_row(value: &Value) -> Option<RawActionRow> {
    let target = if let Some(set_key) = non_empty_str(value, "component_set_key") {
        ActionTarget::Set(set_key.to_string())
    } else if let Some(key) = non_empty_str(value, "component_key") {
        ActionTarget::Component(key.to_string())
    } else {
        return None;
    };

    Some(RawActionRow {
        target,
        insertions: CountExtractor::find(value, &["insertions"]),
        detachments: CountExtractor::find(value, &["detachments"]),
        week: non_empty_str(value, "week").map(str::to_string),
    })
}

fn parse_usage_row(value: &Value) -> Option<RawUsageRow> {
    let key = non_empty_str(value, "component_key")?;
    Some(RawUsageRow {
        component_key: key.to_string(),
        usages: CountExtractor::find(value, &["usages", "num_instances"]),
    })
}

/// Pull a readable message out of an error body (`{"err": ...}` or
/// `{"message": ...}`), falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("err")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
