//! Wire types for mock rules.

use serde::{Deserialize, Serialize};

/// How a rule's `path` is compared against the inbound pathname.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    #[default]
    Literal,
    Regexp,
}

/// Whether `response` is returned verbatim or expanded through the template
/// engine first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    #[default]
    Raw,
    Mockjs,
}

/// One mock entry in a client's rule list.
///
/// A rule without a `response` is a watchpoint: it matches (and shows up in
/// events as a mock hit) but the exchange is still forwarded upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Matches only when the inbound target host equals this, case-insensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Literal path or regular expression, per `pathtype`.
    pub path: String,

    #[serde(default)]
    pub pathtype: PathKind,

    /// Prefix prepended to `path` before comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepath: Option<String>,

    /// Required parameters in `k=v&k=v` form; each pair must be present in
    /// the target query string or the form-decoded POST body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,

    /// Artificial latency in milliseconds before the mock response is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub responsetype: ResponseKind,

    /// Body to return. Absent means pass-through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,

    /// Fields this engine does not interpret, carried through round trips.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub(crate) fn default_status() -> u16 {
    200
}

impl Rule {
    /// The path actually compared against the inbound pathname.
    pub fn effective_path(&self) -> String {
        match &self.prepath {
            Some(prepath) => format!("{prepath}{}", self.path),
            None => self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_deserialize_defaults() {
        let rule: Rule = serde_json::from_str(r#"{"path": "/api/nonexist"}"#).unwrap();
        assert_eq!(rule.pathtype, PathKind::Literal);
        assert_eq!(rule.responsetype, ResponseKind::Raw);
        assert_eq!(rule.status, 200);
        assert!(rule.response.is_none());
        assert!(rule.delay.is_none());
    }

    #[test]
    fn test_rule_effective_path() {
        let rule: Rule =
            serde_json::from_str(r#"{"path": "/test", "prepath": "/api"}"#).unwrap();
        assert_eq!(rule.effective_path(), "/api/test");
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let rule: Rule =
            serde_json::from_str(r#"{"path": "/p", "note": "from the ui"}"#).unwrap();
        assert_eq!(rule.extra.get("note").and_then(|v| v.as_str()), Some("from the ui"));
        let out = serde_json::to_value(&rule).unwrap();
        assert_eq!(out["note"], "from the ui");
    }

    #[test]
    fn test_pathtype_wire_values() {
        let rule: Rule =
            serde_json::from_str(r#"{"path": "x", "pathtype": "regexp"}"#).unwrap();
        assert_eq!(rule.pathtype, PathKind::Regexp);
        let rule: Rule =
            serde_json::from_str(r#"{"path": "x", "responsetype": "mockjs"}"#).unwrap();
        assert_eq!(rule.responsetype, ResponseKind::Mockjs);
    }
}
