use serde::{Deserialize, Serialize};
use std::fmt;

/// One variant of a design component as returned by the metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComponent {
    /// Unique component key.
    pub key: String,
    /// Component (or variant) name.
    pub name: String,
    /// Name of the component set this variant belongs to, absent for
    /// standalone components.
    #[serde(default)]
    pub containing_set_name: Option<String>,
    /// Key of the component set, when the metadata reader could resolve it.
    #[serde(default)]
    pub containing_set_key: Option<String>,
    /// Creation timestamp exactly as provided by the source.
    #[serde(default)]
    pub created_at: String,
    /// Last-modified timestamp exactly as provided by the source.
    #[serde(default)]
    pub updated_at: String,
}

/// The key an action row was bucketed under.
///
/// The analytics source returns either a component key or a set key per
/// row, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    Component(String),
    Set(String),
}

/// One insertion/detachment bucket from the analytics source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawActionRow {
    pub target: ActionTarget,
    pub insertions: u64,
    pub detachments: u64,
    /// Reporting week marker (`YYYY-MM-DD`), when the source provides one.
    #[serde(default)]
    pub week: Option<String>,
}

/// One cumulative usage bucket from the analytics source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUsageRow {
    pub component_key: String,
    pub usages: u64,
}

/// File-level metadata returned by the metadata reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// Display name of the library file.
    pub name: String,
    /// Every published component variant in the file.
    pub components: Vec<RawComponent>,
}

/// One page of a cursor-paginated analytics response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page with no successor.
    pub fn last(rows: Vec<T>) -> Self {
        Self {
            rows,
            has_next_page: false,
            next_cursor: None,
        }
    }
}

/// Whether a report row stands for a component set or a standalone component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentType {
    Single,
    Set,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::Single => write!(f, "Single"),
            ComponentType::Set => write!(f, "Set"),
        }
    }
}

/// Variant count of a report row.
///
/// A standalone component has no variant count at all rather than a count
/// of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantCount {
    NotApplicable,
    Count(u32),
}

impl VariantCount {
    /// Numeric value for summaries; `N/A` contributes nothing.
    pub fn as_count(&self) -> u32 {
        match self {
            VariantCount::NotApplicable => 0,
            VariantCount::Count(n) => *n,
        }
    }
}

impl fmt::Display for VariantCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantCount::NotApplicable => write!(f, "N/A"),
            VariantCount::Count(n) => write!(f, "{}", n),
        }
    }
}

/// Which variant's timestamps a multi-variant group reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPolicy {
    /// Every processed variant overwrites the group's timestamps.
    #[default]
    #[serde(rename = "last")]
    LastWins,
    /// The first processed variant's timestamps are kept.
    #[serde(rename = "first")]
    FirstWins,
}

impl std::str::FromStr for TimestampPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last" => Ok(TimestampPolicy::LastWins),
            "first" => Ok(TimestampPolicy::FirstWins),
            other => Err(format!("unknown timestamp policy: {}", other)),
        }
    }
}

/// One row of the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedComponent {
    /// Containing-set name or bare component name; unique within a report.
    pub group_name: String,
    pub total_variants: VariantCount,
    pub total_usages: u64,
    pub total_insertions: u64,
    pub total_detachments: u64,
    pub created_at: String,
    pub updated_at: String,
    pub component_type: ComponentType,
}

impl AggregatedComponent {
    /// A fresh, all-zero group.
    pub fn new(group_name: impl Into<String>, component_type: ComponentType) -> Self {
        let total_variants = match component_type {
            ComponentType::Set => VariantCount::Count(0),
            ComponentType::Single => VariantCount::NotApplicable,
        };
        Self {
            group_name: group_name.into(),
            total_variants,
            total_usages: 0,
            total_insertions: 0,
            total_detachments: 0,
            created_at: String::new(),
            updated_at: String::new(),
            component_type,
        }
    }
}

/// Totals and context for one generated report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub library_name: String,
    pub total_components: usize,
    /// Sum of the variant counts of every set.
    pub total_variants: u64,
    pub total_usages: u64,
    pub total_insertions: u64,
    pub total_detachments: u64,
    /// Generation timestamp, already rendered in the configured timezone.
    pub generated_at: String,
    pub period_label: String,
    pub period_start: String,
    pub period_end: String,
    /// Latest week marker seen in the action rows, if any.
    pub last_valid_week: Option<String>,
    pub execution_seconds: f64,
}

impl ReportSummary {
    /// `"{start} to {end}"`.
    pub fn selected_period(&self) -> String {
        format!("{} to {}", self.period_start, self.period_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_count_display() {
        assert_eq!(VariantCount::NotApplicable.to_string(), "N/A");
        assert_eq!(VariantCount::Count(4).to_string(), "4");
    }

    #[test]
    fn test_variant_count_as_count() {
        assert_eq!(VariantCount::NotApplicable.as_count(), 0);
        assert_eq!(VariantCount::Count(7).as_count(), 7);
    }

    #[test]
    fn test_component_type_display() {
        assert_eq!(ComponentType::Single.to_string(), "Single");
        assert_eq!(ComponentType::Set.to_string(), "Set");
    }

    #[test]
    fn test_new_single_has_no_variant_count() {
        let c = AggregatedComponent::new("Icon/Close", ComponentType::Single);
        assert_eq!(c.total_variants, VariantCount::NotApplicable);
        assert_eq!(c.total_usages, 0);
    }

    #[test]
    fn test_new_set_starts_at_zero_variants() {
        let c = AggregatedComponent::new("Button", ComponentType::Set);
        assert_eq!(c.total_variants, VariantCount::Count(0));
    }

    #[test]
    fn test_timestamp_policy_from_str() {
        assert_eq!("last".parse::<TimestampPolicy>(), Ok(TimestampPolicy::LastWins));
        assert_eq!("FIRST".parse::<TimestampPolicy>(), Ok(TimestampPolicy::FirstWins));
        assert!("middle".parse::<TimestampPolicy>().is_err());
        assert_eq!(TimestampPolicy::default(), TimestampPolicy::LastWins);
    }

    #[test]
    fn test_action_target_serde_shape() {
        let json = serde_json::to_string(&ActionTarget::Set("Button".to_string())).unwrap();
        assert_eq!(json, r#"{"set":"Button"}"#);
    }

    #[test]
    fn test_selected_period() {
        let summary = ReportSummary {
            library_name: "Core".to_string(),
            total_components: 0,
            total_variants: 0,
            total_usages: 0,
            total_insertions: 0,
            total_detachments: 0,
            generated_at: "2024-02-01 10:00:00".to_string(),
            period_label: "30d".to_string(),
            period_start: "2024-01-02".to_string(),
            period_end: "2024-02-01".to_string(),
            last_valid_week: None,
            execution_seconds: 1.5,
        };
        assert_eq!(summary.selected_period(), "2024-01-02 to 2024-02-01");
    }
}
