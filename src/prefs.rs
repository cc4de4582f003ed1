//! Enabled-rule-set preferences.
//!
//! The selection UI is external; the core only needs an ordered list of
//! enabled rule-set identifiers persisted through a flat key-value store.
//! Duplicates and blank entries are tolerated and order is preserved, since
//! order may affect rule execution priority in the reporting layer.

use std::collections::HashMap;

/// Key under which the enabled rule-set list is stored.
pub const ENABLED_RULE_SETS_KEY: &str = "rulesets.enabled";

const SEPARATOR: char = ',';

/// Minimal persistence capability supplied by the embedder.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory store, for embedders without persistence and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// The enabled rule-set list over a preference store.
pub struct RuleSetPreferences<S: PreferenceStore> {
    store: S,
}

impl<S: PreferenceStore> RuleSetPreferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Enabled rule-set identifiers, in stored order.
    pub fn enabled(&self) -> Vec<String> {
        match self.store.get(ENABLED_RULE_SETS_KEY) {
            None => Vec::new(),
            Some(raw) if raw.is_empty() => Vec::new(),
            Some(raw) => raw.split(SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// Persist the enabled list as given: order kept, duplicates and blanks
    /// included.
    pub fn set_enabled(&mut self, ids: &[String]) {
        let joined = ids.join(&SEPARATOR.to_string());
        self.store.set(ENABLED_RULE_SETS_KEY, &joined);
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
