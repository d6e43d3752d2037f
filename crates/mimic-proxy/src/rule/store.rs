//! In-memory per-client rule lists.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::matcher::CompiledRule;
use super::types::Rule;
use crate::error::RuleError;

/// Maps client ids to their ordered, pre-compiled rule lists.
///
/// Reads take a cheap snapshot (an `Arc` clone); writers swap the whole list
/// under the lock. A reader holding a snapshot across a `put` keeps seeing
/// the list it started with, never a torn intermediate.
#[derive(Default)]
pub struct RuleStore {
    rules: RwLock<HashMap<String, Arc<[CompiledRule]>>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace a client's rule list.
    ///
    /// The whole list is compiled before anything is stored, so one bad rule
    /// rejects the update wholesale and the previous list stays in effect.
    pub fn put(&self, client_id: &str, rules: Vec<Rule>) -> Result<usize, RuleError> {
        let compiled = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| CompiledRule::compile(index, rule))
            .collect::<Result<Vec<_>, _>>()?;

        let count = compiled.len();
        self.rules
            .write()
            .insert(client_id.to_string(), compiled.into());
        debug!(client = client_id, count, "rule list replaced");
        Ok(count)
    }

    /// Snapshot of a client's rules; empty for unknown clients.
    pub fn get(&self, client_id: &str) -> Arc<[CompiledRule]> {
        self.rules
            .read()
            .get(client_id)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// The stored wire-form rules, for the admin read endpoint.
    pub fn rules_for(&self, client_id: &str) -> Vec<Rule> {
        self.get(client_id)
            .iter()
            .map(|compiled| compiled.rule.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(json: serde_json::Value) -> Vec<Rule> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_get_unknown_client_is_empty() {
        let store = RuleStore::new();
        assert!(store.get("nobody").is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let store = RuleStore::new();
        let count = store
            .put("dev", rules(serde_json::json!([{"path": "/a"}, {"path": "/b"}])))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.get("dev").len(), 2);
        assert_eq!(store.rules_for("dev")[0].path, "/a");
    }

    #[test]
    fn test_put_replaces_whole_list() {
        let store = RuleStore::new();
        store
            .put("dev", rules(serde_json::json!([{"path": "/a"}])))
            .unwrap();
        store
            .put("dev", rules(serde_json::json!([{"path": "/b"}, {"path": "/c"}])))
            .unwrap();
        let stored = store.rules_for("dev");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].path, "/b");
    }

    #[test]
    fn test_bad_rule_rejected_wholesale() {
        let store = RuleStore::new();
        store
            .put("dev", rules(serde_json::json!([{"path": "/keep"}])))
            .unwrap();

        let result = store.put(
            "dev",
            rules(serde_json::json!([
                {"path": "/fine"},
                {"path": "(unclosed", "pathtype": "regexp"}
            ])),
        );
        assert!(result.is_err());

        // The previous list must still be in effect.
        let stored = store.rules_for("dev");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].path, "/keep");
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let store = RuleStore::new();
        store
            .put("dev", rules(serde_json::json!([{"path": "/old"}])))
            .unwrap();
        let snapshot = store.get("dev");
        store
            .put("dev", rules(serde_json::json!([{"path": "/new"}])))
            .unwrap();
        assert_eq!(snapshot[0].rule.path, "/old");
        assert_eq!(store.get("dev")[0].rule.path, "/new");
    }
}
