//! Deterministic report ordering.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use report_core::formatting::collation_key;
use report_core::models::AggregatedComponent;

/// Compare two group names for display.
///
/// Names starting with `deprecated_marker` sort after every other name.
/// Otherwise names compare by [`collation_key`], so case and accents do not
/// move a name away from its base letters. Lowercase and then the exact name
/// break ties so the order is total.
pub fn compare_names(a: &str, b: &str, deprecated_marker: &str) -> Ordering {
    let a_deprecated = is_deprecated(a, deprecated_marker);
    let b_deprecated = is_deprecated(b, deprecated_marker);

    a_deprecated
        .cmp(&b_deprecated)
        .then_with(|| collation_key(a).cmp(&collation_key(b)))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Whether `name` carries the deprecation marker.
pub fn is_deprecated(name: &str, deprecated_marker: &str) -> bool {
    !deprecated_marker.is_empty() && name.starts_with(deprecated_marker)
}

/// Turn the aggregated map into display order.
pub fn order_components(
    groups: BTreeMap<String, AggregatedComponent>,
    deprecated_marker: &str,
) -> Vec<AggregatedComponent> {
    let mut rows: Vec<AggregatedComponent> = groups.into_values().collect();
    rows.sort_by(|a, b| compare_names(&a.group_name, &b.group_name, deprecated_marker));
    rows
}
