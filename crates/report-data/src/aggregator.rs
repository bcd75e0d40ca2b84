//! Folding component, usage and action rows into one row per group.

use std::collections::BTreeMap;

use report_core::models::{
    AggregatedComponent, ComponentType, RawActionRow, RawComponent, RawUsageRow, TimestampPolicy,
    VariantCount,
};
use tracing::debug;

use crate::resolver::{GroupKey, KeyIndex};

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Result of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Group name → aggregated row.
    pub groups: BTreeMap<String, AggregatedComponent>,
    /// Action rows whose key matched no known group.
    pub unmatched_actions: usize,
    /// Usage rows whose key matched no known variant.
    pub unmatched_usages: usize,
    /// Latest `week` marker across all action rows.
    pub last_valid_week: Option<String>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ── ComponentAggregator ───────────────────────────────────────────────────────

/// Incremental aggregator.
///
/// Components must be added before the analytics rows that refer to them;
/// rows for keys not yet seen are counted as unmatched.
#[derive(Debug, Default)]
pub struct ComponentAggregator {
    policy: TimestampPolicy,
    index: KeyIndex,
    result: Aggregation,
}

impl ComponentAggregator {
    pub fn new(policy: TimestampPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Add one component variant to its group.
    pub fn add_component(&mut self, component: &RawComponent) {
        let GroupKey { name, is_set } = self.index.register(component);
        let policy = self.policy;

        let mut fresh = false;
        let group = self.result.groups.entry(name).or_insert_with_key(|name| {
            fresh = true;
            let kind = if is_set {
                ComponentType::Set
            } else {
                ComponentType::Single
            };
            AggregatedComponent::new(name.clone(), kind)
        });

        if is_set {
            // A set row promotes a group first seen through a standalone
            // component of the same name.
            group.component_type = ComponentType::Set;
            let current = group.total_variants.as_count();
            group.total_variants = VariantCount::Count(current.saturating_add(1));
        }

        if fresh || policy == TimestampPolicy::LastWins {
            group.created_at = component.created_at.clone();
            group.updated_at = component.updated_at.clone();
        }
    }

    /// Add one usage row to the group owning its component key.
    pub fn add_usage(&mut self, row: &RawUsageRow) {
        match self.index.resolve_usage(&row.component_key) {
            Some(name) => {
                if let Some(group) = self.result.groups.get_mut(name) {
                    group.total_usages = group.total_usages.saturating_add(row.usages);
                }
            }
            None => {
                self.result.unmatched_usages += 1;
                debug!(component_key = %row.component_key, "usage row matched no component");
            }
        }
    }

    /// Add one action row to the group owning its target key.
    pub fn add_action(&mut self, row: &RawActionRow) {
        if let Some(week) = &row.week {
            let newer = self
                .result
                .last_valid_week
                .as_ref()
                .map_or(true, |seen| week > seen);
            if newer {
                self.result.last_valid_week = Some(week.clone());
            }
        }

        match self.index.resolve_action(&row.target) {
            Some(name) => {
                if let Some(group) = self.result.groups.get_mut(name) {
                    group.total_insertions = group.total_insertions.saturating_add(row.insertions);
                    group.total_detachments = group.total_detachments.saturating_add(row.detachments);
                }
            }
            None => {
                self.result.unmatched_actions += 1;
                debug!(action_target = ?row.target, "action row matched no component");
            }
        }
    }

    pub fn finish(self) -> Aggregation {
        if self.result.unmatched_actions > 0 || self.result.unmatched_usages > 0 {
            debug!(
                unmatched_actions = self.result.unmatched_actions,
                unmatched_usages = self.result.unmatched_usages,
                "analytics rows dropped"
            );
        }
        self.result
    }
}

/// Aggregate a complete data set.
pub fn aggregate(
    components: &[RawComponent],
    actions: &[RawActionRow],
    usages: &[RawUsageRow],
    policy: TimestampPolicy,
) -> Aggregation {
    let mut aggregator = ComponentAggregator::new(policy);
    for component in components {
        aggregator.add_component(component);
    }
    for row in usages {
        aggregator.add_usage(row);
    }
    for row in actions {
        aggregator.add_action(row);
    }
    aggregator.finish()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::models::ActionTarget;

    fn variant(key: &str, name: &str, set: Option<&str>, created: &str, updated: &str) -> RawComponent {
        RawComponent {
            key: key.to_string(),
            name: name.to_string(),
            containing_set_name: set.map(str::to_string),
            containing_set_key: None,
            created_at: created.to_string(),
            updated_at: updated.to_string(),
        }
    }

    fn usage(key: &str, usages: u64) -> RawUsageRow {
        RawUsageRow {
            component_key: key.to_string(),
            usages,
        }
    }

    fn action(target: ActionTarget, insertions: u64, detachments: u64) -> RawActionRow {
        RawActionRow {
            target,
            insertions,
            detachments,
            week: None,
        }
    }

    fn button_fixture() -> (Vec<RawComponent>, Vec<RawActionRow>, Vec<RawUsageRow>) {
        (
            vec![
                variant("k1", "Size=Small", Some("Button"), "2023-01-01", "2023-02-01"),
                variant("k2", "Size=Large", Some("Button"), "2023-01-05", "2023-03-01"),
                variant("k3", "Icon/Close", None, "2022-06-01", "2022-07-01"),
            ],
            vec![action(ActionTarget::Set("Button".into()), 5, 2)],
            vec![usage("k1", 3), usage("k2", 3)],
        )
    }

    // ── end-to-end scenarios ──────────────────────────────────────────────

    #[test]
    fn test_button_set_scenario() {
        let (components, actions, usages) = button_fixture();
        let result = aggregate(&components, &actions, &usages, TimestampPolicy::LastWins);

        let button = &result.groups["Button"];
        assert_eq!(button.component_type, ComponentType::Set);
        assert_eq!(button.total_variants, VariantCount::Count(2));
        assert_eq!(button.total_usages, 6);
        assert_eq!(button.total_insertions, 5);
        assert_eq!(button.total_detachments, 2);
    }

    #[test]
    fn test_icon_close_single_scenario() {
        let (components, actions, usages) = button_fixture();
        let result = aggregate(&components, &actions, &usages, TimestampPolicy::LastWins);

        let icon = &result.groups["Icon/Close"];
        assert_eq!(icon.component_type, ComponentType::Single);
        assert_eq!(icon.total_variants, VariantCount::NotApplicable);
        assert_eq!(icon.total_variants.to_string(), "N/A");
        assert_eq!(icon.total_usages, 0);
        assert_eq!(icon.total_insertions, 0);
        assert_eq!(icon.total_detachments, 0);
    }

    // ── invariants ────────────────────────────────────────────────────────

    #[test]
    fn test_group_names_match_distinct_resolved_keys() {
        let (components, actions, usages) = button_fixture();
        let result = aggregate(&components, &actions, &usages, TimestampPolicy::LastWins);
        let names: Vec<&str> = result.groups.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Button", "Icon/Close"]);
    }

    #[test]
    fn test_sum_invariant_counts_every_matching_usage_once() {
        let components = vec![
            variant("k1", "A", Some("Card"), "", ""),
            variant("k2", "B", Some("Card"), "", ""),
            variant("k3", "Chip", None, "", ""),
        ];
        let usages = vec![usage("k1", 4), usage("k2", 1), usage("k1", 2), usage("k3", 9)];
        let result = aggregate(&components, &[], &usages, TimestampPolicy::LastWins);

        assert_eq!(result.groups["Card"].total_usages, 7);
        assert_eq!(result.groups["Chip"].total_usages, 9);
        assert_eq!(result.unmatched_usages, 0);
    }

    #[test]
    fn test_order_does_not_change_keys_or_sums() {
        let (mut components, mut actions, mut usages) = button_fixture();
        actions.push(action(ActionTarget::Component("k3".into()), 1, 1));
        let forward = aggregate(&components, &actions, &usages, TimestampPolicy::LastWins);

        components.reverse();
        actions.reverse();
        usages.reverse();
        let backward = aggregate(&components, &actions, &usages, TimestampPolicy::LastWins);

        assert_eq!(
            forward.groups.keys().collect::<Vec<_>>(),
            backward.groups.keys().collect::<Vec<_>>()
        );
        for (name, a) in &forward.groups {
            let b = &backward.groups[name];
            assert_eq!(a.total_variants, b.total_variants);
            assert_eq!(a.total_usages, b.total_usages);
            assert_eq!(a.total_insertions, b.total_insertions);
            assert_eq!(a.total_detachments, b.total_detachments);
            assert_eq!(a.component_type, b.component_type);
        }
    }

    #[test]
    fn test_aggregating_twice_is_identical() {
        let (components, actions, usages) = button_fixture();
        let first = aggregate(&components, &actions, &usages, TimestampPolicy::FirstWins);
        let second = aggregate(&components, &actions, &usages, TimestampPolicy::FirstWins);
        assert_eq!(first, second);
    }

    // ── timestamps ────────────────────────────────────────────────────────

    #[test]
    fn test_last_wins_takes_final_variant_timestamps() {
        let (components, _, _) = button_fixture();
        let result = aggregate(&components, &[], &[], TimestampPolicy::LastWins);
        assert_eq!(result.groups["Button"].created_at, "2023-01-05");
        assert_eq!(result.groups["Button"].updated_at, "2023-03-01");
    }

    #[test]
    fn test_first_wins_keeps_first_variant_timestamps() {
        let (components, _, _) = button_fixture();
        let result = aggregate(&components, &[], &[], TimestampPolicy::FirstWins);
        assert_eq!(result.groups["Button"].created_at, "2023-01-01");
        assert_eq!(result.groups["Button"].updated_at, "2023-02-01");
    }

    // ── analytics routing ─────────────────────────────────────────────────

    #[test]
    fn test_action_by_set_key_and_variant_key_share_group() {
        let mut components = vec![variant("k1", "A", Some("Button"), "", "")];
        components[0].containing_set_key = Some("set-btn".to_string());
        let actions = vec![
            action(ActionTarget::Set("set-btn".into()), 2, 1),
            action(ActionTarget::Component("k1".into()), 3, 0),
        ];
        let result = aggregate(&components, &actions, &[], TimestampPolicy::LastWins);
        assert_eq!(result.groups["Button"].total_insertions, 5);
        assert_eq!(result.groups["Button"].total_detachments, 1);
    }

    #[test]
    fn test_unmatched_rows_are_dropped_and_counted() {
        let (components, mut actions, mut usages) = button_fixture();
        actions.push(action(ActionTarget::Component("ghost".into()), 100, 100));
        actions.push(action(ActionTarget::Set("Ghost Set".into()), 100, 100));
        usages.push(usage("ghost", 100));

        let result = aggregate(&components, &actions, &usages, TimestampPolicy::LastWins);
        assert_eq!(result.unmatched_actions, 2);
        assert_eq!(result.unmatched_usages, 1);
        let inserted: u64 = result.groups.values().map(|g| g.total_insertions).sum();
        assert_eq!(inserted, 5);
    }

    #[test]
    fn test_missing_analytics_yield_zeros() {
        let (components, _, _) = button_fixture();
        let result = aggregate(&components, &[], &[], TimestampPolicy::LastWins);
        assert_eq!(result.groups.len(), 2);
        for group in result.groups.values() {
            assert_eq!(group.total_usages, 0);
            assert_eq!(group.total_insertions, 0);
            assert_eq!(group.total_detachments, 0);
        }
        assert_eq!(result.groups["Button"].total_variants, VariantCount::Count(2));
        assert!(result.last_valid_week.is_none());
    }

    #[test]
    fn test_last_valid_week_is_latest_marker() {
        let (components, _, _) = button_fixture();
        let mut rows = vec![
            action(ActionTarget::Set("Button".into()), 1, 0),
            action(ActionTarget::Set("Button".into()), 1, 0),
            action(ActionTarget::Component("unknown".into()), 1, 0),
        ];
        rows[0].week = Some("2024-01-08".to_string());
        rows[1].week = Some("2024-01-22".to_string());
        rows[2].week = Some("2024-01-15".to_string());
        let result = aggregate(&components, &rows, &[], TimestampPolicy::LastWins);
        assert_eq!(result.last_valid_week.as_deref(), Some("2024-01-22"));
    }

    #[test]
    fn test_mixed_group_resolves_to_set() {
        let components = vec![
            variant("k9", "Badge", None, "", ""),
            variant("k1", "Dot", Some("Badge"), "", ""),
            variant("k2", "Count", Some("Badge"), "", ""),
        ];
        let usages = vec![usage("k9", 1), usage("k1", 2)];
        let result = aggregate(&components, &[], &usages, TimestampPolicy::LastWins);

        let badge = &result.groups["Badge"];
        assert_eq!(badge.component_type, ComponentType::Set);
        assert_eq!(badge.total_variants, VariantCount::Count(2));
        assert_eq!(badge.total_usages, 3);
        assert_eq!(result.groups.len(), 1);
    }

    #[test]
    fn test_huge_counts_saturate() {
        use report_core::data_processors::CountExtractor;
        use serde_json::json;

        let (components, _, _) = button_fixture();
        let huge = CountExtractor::coerce(&json!("1e30"));
        let usages = vec![usage("k1", huge), usage("k1", huge)];
        let actions = vec![
            action(ActionTarget::Set("Button".into()), huge, huge),
            action(ActionTarget::Component("k2".into()), huge, 1),
        ];
        let result = aggregate(&components, &actions, &usages, TimestampPolicy::LastWins);

        let button = &result.groups["Button"];
        assert_eq!(button.total_usages, u64::MAX);
        assert_eq!(button.total_insertions, u64::MAX);
        assert_eq!(button.total_detachments, u64::MAX);
    }

    #[test]
    fn test_empty_input_is_empty() {
        let result = aggregate(&[], &[], &[], TimestampPolicy::LastWins);
        assert!(result.is_empty());
    }
}
