//! Group-key resolution.
//!
//! A component variant belongs to its containing set when it has one, and
//! forms its own group otherwise. [`KeyIndex`] remembers which group each
//! known key belongs to so analytics rows can be routed to it.

use std::collections::HashMap;

use report_core::models::{ActionTarget, RawComponent};

/// The group a component row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub name: String,
    pub is_set: bool,
}

/// Derive the group of one component row.
pub fn resolve_group(component: &RawComponent) -> GroupKey {
    match &component.containing_set_name {
        Some(set_name) => GroupKey {
            name: set_name.clone(),
            is_set: true,
        },
        None => GroupKey {
            name: component.name.clone(),
            is_set: false,
        },
    }
}

/// Lookup tables from component and set keys to group names.
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    by_component: HashMap<String, String>,
    by_set: HashMap<String, String>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over every row of `components`.
    pub fn from_components(components: &[RawComponent]) -> Self {
        let mut index = Self::new();
        for component in components {
            index.register(component);
        }
        index
    }

    /// Record the keys of one component row and return its group.
    ///
    /// Set rows are reachable through the variant key, the set key (when
    /// known) and the set name.
    pub fn register(&mut self, component: &RawComponent) -> GroupKey {
        let group = resolve_group(component);
        self.by_component
            .insert(component.key.clone(), group.name.clone());

        if group.is_set {
            if let Some(set_key) = &component.containing_set_key {
                self.by_set.insert(set_key.clone(), group.name.clone());
            }
            self.by_set.insert(group.name.clone(), group.name.clone());
        }
        group
    }

    /// Group owning an action row, if its key is known.
    pub fn resolve_action(&self, target: &ActionTarget) -> Option<&str> {
        match target {
            ActionTarget::Set(key) => self.by_set.get(key),
            ActionTarget::Component(key) => self.by_component.get(key),
        }
        .map(String::as_str)
    }

    /// Group owning a usage row's component key.
    pub fn resolve_usage(&self, component_key: &str) -> Option<&str> {
        self.by_component.get(component_key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_component.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_component.is_empty()
    }
}
