//! Rule compilation and request matching.
//!
//! Rules are compiled once when a list is stored so the per-request scan does
//! no regex construction and the store can reject a bad list wholesale.

use std::collections::HashMap;

use regex::Regex;

use super::types::{PathKind, Rule};
use crate::error::RuleError;

/// A rule with its path pattern compiled and its params pre-split.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    effective_path: String,
    regex: Option<Regex>,
    params: Vec<(String, String)>,
}

/// The parts of an inbound request the matcher inspects.
#[derive(Debug)]
pub struct MatchTarget<'a> {
    pub host: &'a str,
    pub pathname: &'a str,
    pub query: &'a HashMap<String, String>,
    /// Form-decoded POST body, when there is one.
    pub form: Option<&'a HashMap<String, String>>,
}

impl CompiledRule {
    pub fn compile(index: usize, rule: Rule) -> Result<Self, RuleError> {
        if rule.path.is_empty() {
            return Err(RuleError::EmptyPath { index });
        }

        let effective_path = rule.effective_path();
        let regex = match rule.pathtype {
            PathKind::Literal => None,
            // Find-anywhere semantics, deliberately unanchored.
            PathKind::Regexp => Some(
                Regex::new(&effective_path)
                    .map_err(|source| RuleError::BadPattern { index, source })?,
            ),
        };

        let params = rule
            .params
            .as_deref()
            .map(parse_params)
            .unwrap_or_default();

        Ok(Self {
            rule,
            effective_path,
            regex,
            params,
        })
    }

    pub fn matches(&self, target: &MatchTarget<'_>) -> bool {
        if let Some(host) = &self.rule.host {
            if !host.eq_ignore_ascii_case(target.host) {
                return false;
            }
        }

        let path_ok = match &self.regex {
            Some(regex) => regex.is_match(target.pathname),
            None => target.pathname == self.effective_path,
        };
        if !path_ok {
            return false;
        }

        self.params.iter().all(|(key, value)| {
            target.query.get(key).map(|v| v == value).unwrap_or(false)
                || target
                    .form
                    .and_then(|form| form.get(key))
                    .map(|v| v == value)
                    .unwrap_or(false)
        })
    }
}

/// Scan in list order; the first satisfying rule wins. No specificity scoring.
pub fn first_match<'r>(rules: &'r [CompiledRule], target: &MatchTarget<'_>) -> Option<&'r CompiledRule> {
    rules.iter().find(|rule| rule.matches(target))
}

fn parse_params(params: &str) -> Vec<(String, String)> {
    params
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(json: serde_json::Value) -> CompiledRule {
        CompiledRule::compile(0, serde_json::from_value(json).unwrap()).unwrap()
    }

    fn target<'a>(
        host: &'a str,
        pathname: &'a str,
        query: &'a HashMap<String, String>,
        form: Option<&'a HashMap<String, String>>,
    ) -> MatchTarget<'a> {
        MatchTarget {
            host,
            pathname,
            query,
            form,
        }
    }

    #[test]
    fn test_literal_path_exact() {
        let r = rule(serde_json::json!({"path": "/api/test"}));
        let query = HashMap::new();
        assert!(r.matches(&target("h.com", "/api/test", &query, None)));
        assert!(!r.matches(&target("h.com", "/api/test/extra", &query, None)));
        assert!(!r.matches(&target("h.com", "/api", &query, None)));
    }

    #[test]
    fn test_regexp_path_matches_anywhere() {
        let r = rule(serde_json::json!({"path": "(bad)?nonexist", "pathtype": "regexp"}));
        let query = HashMap::new();
        assert!(r.matches(&target("h.com", "/api/nonexist", &query, None)));
        assert!(r.matches(&target("h.com", "/api/badnonexist", &query, None)));
        assert!(!r.matches(&target("h.com", "/api/exists", &query, None)));
    }

    #[test]
    fn test_prepath_prepended_before_compare() {
        let r = rule(serde_json::json!({"path": "/test", "prepath": "/api"}));
        let query = HashMap::new();
        assert!(r.matches(&target("h.com", "/api/test", &query, None)));
        assert!(!r.matches(&target("h.com", "/test", &query, None)));
    }

    #[test]
    fn test_host_case_insensitive() {
        let r = rule(serde_json::json!({"host": "API.Example.com", "path": "/p"}));
        let query = HashMap::new();
        assert!(r.matches(&target("api.example.com", "/p", &query, None)));
        assert!(!r.matches(&target("other.example.com", "/p", &query, None)));
    }

    #[test]
    fn test_params_require_every_pair() {
        let r = rule(serde_json::json!({"path": "/api/test", "params": "a=1&b=2"}));
        let mut query = HashMap::new();
        query.insert("a".to_string(), "1".to_string());
        assert!(!r.matches(&target("h", "/api/test", &query, None)));

        query.insert("b".to_string(), "2".to_string());
        assert!(r.matches(&target("h", "/api/test", &query, None)));

        query.insert("b".to_string(), "3".to_string());
        assert!(!r.matches(&target("h", "/api/test", &query, None)));
    }

    #[test]
    fn test_params_satisfied_from_form_body() {
        let r = rule(serde_json::json!({"path": "/api/test", "params": "a=1&b=2"}));
        let query = HashMap::new();
        let mut form = HashMap::new();
        form.insert("a".to_string(), "1".to_string());
        form.insert("b".to_string(), "2".to_string());
        assert!(r.matches(&target("h", "/api/test", &query, Some(&form))));
    }

    #[test]
    fn test_params_mix_of_query_and_form() {
        let r = rule(serde_json::json!({"path": "/p", "params": "a=1&b=2"}));
        let mut query = HashMap::new();
        query.insert("a".to_string(), "1".to_string());
        let mut form = HashMap::new();
        form.insert("b".to_string(), "2".to_string());
        assert!(r.matches(&target("h", "/p", &query, Some(&form))));
    }

    #[test]
    fn test_first_match_is_order_stable() {
        let rules = vec![
            rule(serde_json::json!({"path": "/p", "status": 201})),
            rule(serde_json::json!({"path": "/p", "status": 202})),
        ];
        let query = HashMap::new();
        let hit = first_match(&rules, &target("h", "/p", &query, None)).unwrap();
        assert_eq!(hit.rule.status, 201);

        // Swapping the tail must not change the winner.
        let rules = vec![
            rule(serde_json::json!({"path": "/p", "status": 201})),
            rule(serde_json::json!({"path": "/other", "status": 203})),
            rule(serde_json::json!({"path": "/p", "status": 202})),
        ];
        let hit = first_match(&rules, &target("h", "/p", &query, None)).unwrap();
        assert_eq!(hit.rule.status, 201);
    }

    #[test]
    fn test_compile_rejects_bad_regex() {
        let raw: Rule =
            serde_json::from_value(serde_json::json!({"path": "(unclosed", "pathtype": "regexp"}))
                .unwrap();
        assert!(CompiledRule::compile(3, raw).is_err());
    }
}
