//! Response synthesis for matched rules.

use serde_json::Value;

use super::inbound::{InboundRequest, ReqType};
use crate::error::RewriteError;
use crate::rule::{ResponseKind, Rule};
use crate::template::Expander;

/// Outcome of consulting a matched rule.
#[derive(Debug)]
pub enum Synthesized {
    /// The rule has no `response`: it matched for observation only and the
    /// exchange still goes upstream.
    PassThrough,
    Mock(MockResponse),
}

#[derive(Debug)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
    pub delay_ms: u64,
}

/// Build the mock response a matched rule describes.
pub fn synthesize(rule: &Rule, inbound: &InboundRequest) -> Result<Synthesized, RewriteError> {
    let Some(template) = &rule.response else {
        return Ok(Synthesized::PassThrough);
    };

    let value = match rule.responsetype {
        ResponseKind::Raw => template.clone(),
        ResponseKind::Mockjs => Expander::new().expand(template),
    };

    let (content_type, body) = match inbound.reqtype {
        // The wrap is textual: a string body is spliced between the
        // parentheses verbatim, never re-parsed or re-escaped.
        ReqType::Jsonp => {
            let callback = inbound.jsonp_callback();
            let text = body_as_json_text(&value)?;
            (
                "application/javascript".to_string(),
                format!("{callback}({text})"),
            )
        }
        ReqType::Normal => match &value {
            Value::String(s) => ("text/plain".to_string(), s.clone()),
            other => (
                "application/json; charset=utf-8".to_string(),
                serialize(other)?,
            ),
        },
    };

    Ok(Synthesized::Mock(MockResponse {
        status: rule.status,
        content_type,
        body,
        delay_ms: rule.delay.unwrap_or(0),
    }))
}

fn body_as_json_text(value: &Value) -> Result<String, RewriteError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => serialize(other),
    }
}

fn serialize(value: &Value) -> Result<String, RewriteError> {
    serde_json::to_string(value).map_err(|e| RewriteError::Rule(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hyper::{HeaderMap, Method, Uri};
    use serde_json::json;

    fn inbound(query: &str) -> InboundRequest {
        let uri: Uri = format!("http://proxy.local/api/rewrite?{query}")
            .parse()
            .unwrap();
        InboundRequest::parse(Method::GET, &uri, &HeaderMap::new(), Bytes::new(), "__mcid").unwrap()
    }

    fn rule(json: serde_json::Value) -> Rule {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_missing_response_is_pass_through() {
        let r = rule(json!({"path": "/p"}));
        let out = synthesize(&r, &inbound("url=https%3A%2F%2Fh%2Fp")).unwrap();
        assert!(matches!(out, Synthesized::PassThrough));
    }

    #[test]
    fn test_json_value_serialized_with_json_content_type() {
        let r = rule(json!({"path": "/p", "response": {"code": 200, "msg": "mock response"}}));
        let Synthesized::Mock(mock) = synthesize(&r, &inbound("url=https%3A%2F%2Fh%2Fp")).unwrap()
        else {
            panic!("expected mock");
        };
        assert_eq!(mock.status, 200);
        assert_eq!(mock.content_type, "application/json; charset=utf-8");
        assert_eq!(
            serde_json::from_str::<Value>(&mock.body).unwrap(),
            json!({"code": 200, "msg": "mock response"})
        );
    }

    #[test]
    fn test_string_body_is_plain_text() {
        let r = rule(json!({"path": "/p", "status": 503, "response": "down for maintenance"}));
        let Synthesized::Mock(mock) = synthesize(&r, &inbound("url=https%3A%2F%2Fh%2Fp")).unwrap()
        else {
            panic!("expected mock");
        };
        assert_eq!(mock.status, 503);
        assert_eq!(mock.content_type, "text/plain");
        assert_eq!(mock.body, "down for maintenance");
    }

    #[test]
    fn test_jsonp_wraps_string_verbatim() {
        // Unbalanced or nested parentheses in the body must survive the wrap.
        let r = rule(json!({"path": "/p", "response": r#"{"code":200,"msg":"(a(b)c)"}"#}));
        let target = inbound("url=https%3A%2F%2Fh%2Fp%3Fcallback%3Djsonp_cb&reqtype=jsonp");
        let Synthesized::Mock(mock) = synthesize(&r, &target).unwrap() else {
            panic!("expected mock");
        };
        assert_eq!(mock.content_type, "application/javascript");
        assert_eq!(mock.body, r#"jsonp_cb({"code":200,"msg":"(a(b)c)"})"#);
    }

    #[test]
    fn test_jsonp_wraps_json_value() {
        let r = rule(json!({"path": "/p", "response": {"ok": true}}));
        let target = inbound("url=https%3A%2F%2Fh%2Fp%3Fcallback%3Dcb&reqtype=jsonp");
        let Synthesized::Mock(mock) = synthesize(&r, &target).unwrap() else {
            panic!("expected mock");
        };
        assert_eq!(mock.body, r#"cb({"ok":true})"#);
    }

    #[test]
    fn test_jsonp_callback_defaults_when_absent() {
        let r = rule(json!({"path": "/p", "response": "x"}));
        let target = inbound("url=https%3A%2F%2Fh%2Fp&reqtype=jsonp");
        let Synthesized::Mock(mock) = synthesize(&r, &target).unwrap() else {
            panic!("expected mock");
        };
        assert_eq!(mock.body, "callback(x)");
    }

    #[test]
    fn test_mockjs_expansion_applied() {
        let r = rule(json!({
            "path": "/p",
            "responsetype": "mockjs",
            "response": {"code": 200, "msg|3": ["mock response"]}
        }));
        let Synthesized::Mock(mock) = synthesize(&r, &inbound("url=https%3A%2F%2Fh%2Fp")).unwrap()
        else {
            panic!("expected mock");
        };
        let body: Value = serde_json::from_str(&mock.body).unwrap();
        assert_eq!(
            body,
            json!({"code": 200, "msg": ["mock response", "mock response", "mock response"]})
        );
    }

    #[test]
    fn test_delay_carried_through() {
        let r = rule(json!({"path": "/p", "delay": 150, "response": "x"}));
        let Synthesized::Mock(mock) = synthesize(&r, &inbound("url=https%3A%2F%2Fh%2Fp")).unwrap()
        else {
            panic!("expected mock");
        };
        assert_eq!(mock.delay_ms, 150);
    }
}
