//! Parsing of the rewrite endpoint's inputs.

use std::collections::HashMap;

use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, ORIGIN};
use hyper::{HeaderMap, Method, Uri};

use crate::cookies;
use crate::error::RewriteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReqType {
    #[default]
    Normal,
    Jsonp,
}

/// One tunneled exchange, decoded from `/api/rewrite?url=…&cookie=…`.
///
/// `cookie` is the header to impersonate upstream, taken from the query
/// parameter; the caller's own `Cookie` header is deliberately never read.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub target_url: String,
    pub host: String,
    pub pathname: String,
    pub query: HashMap<String, String>,
    pub cookie: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub origin: Option<String>,
    pub reqtype: ReqType,
    pub client_id: Option<String>,
    /// Caller headers, title-cased, for event payloads.
    pub headers: HashMap<String, String>,
}

impl InboundRequest {
    pub fn parse(
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
        client_cookie: &str,
    ) -> Result<Self, RewriteError> {
        let own_query = parse_query_string(uri.query());

        let target_url = own_query
            .get("url")
            .cloned()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RewriteError::BadRequest("missing url parameter".to_string()))?;

        let target: Uri = target_url
            .parse()
            .map_err(|_| RewriteError::BadRequest(format!("unparseable url: {target_url}")))?;
        let host = target
            .host()
            .ok_or_else(|| RewriteError::BadRequest(format!("url has no host: {target_url}")))?
            .to_string();
        if target.scheme().is_none() {
            return Err(RewriteError::BadRequest(format!(
                "url has no scheme: {target_url}"
            )));
        }

        let cookie = own_query.get("cookie").cloned().unwrap_or_default();
        let client_id = cookies::get(&cookie, client_cookie);
        let reqtype = match own_query.get("reqtype").map(String::as_str) {
            Some("jsonp") => ReqType::Jsonp,
            _ => ReqType::Normal,
        };

        let origin = headers
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers = headers
            .iter()
            .map(|(k, v)| {
                (
                    title_case(k.as_str()),
                    v.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();

        Ok(Self {
            method,
            host,
            pathname: target.path().to_string(),
            query: parse_query_string(target.query()),
            target_url,
            cookie,
            body,
            content_type,
            origin,
            reqtype,
            client_id,
            headers,
        })
    }

    /// The `requestData` field of event payloads.
    ///
    /// A POST body with a JSON content type must parse; anything else is
    /// carried as a decoded form object or the raw string.
    pub fn request_data(&self) -> Result<serde_json::Value, RewriteError> {
        if self.method != Method::POST {
            return Ok(serde_json::Value::String("not POST request".to_string()));
        }

        let content_type = self
            .content_type
            .as_deref()
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.contains("application/json") {
            return serde_json::from_slice(&self.body)
                .map_err(|e| RewriteError::BadRequest(format!("malformed JSON body: {e}")));
        }

        if content_type.contains("application/x-www-form-urlencoded") {
            let form = decode_form(&String::from_utf8_lossy(&self.body));
            let map = form
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();
            return Ok(serde_json::Value::Object(map));
        }

        Ok(serde_json::Value::String(
            String::from_utf8_lossy(&self.body).to_string(),
        ))
    }

    /// Form-decoded POST body for the matcher's params predicate.
    pub fn form_params(&self) -> Option<HashMap<String, String>> {
        if self.method != Method::POST || self.body.is_empty() {
            return None;
        }
        let decoded = decode_form(&String::from_utf8_lossy(&self.body));
        if decoded.is_empty() {
            None
        } else {
            Some(decoded.into_iter().collect())
        }
    }

    /// JSONP callback name from the target URL, with the conventional default.
    pub fn jsonp_callback(&self) -> String {
        self.query
            .get("callback")
            .cloned()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "callback".to_string())
    }
}

/// Parse a query string into a map, percent-decoding values.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let decoded = urlencoding::decode(value).unwrap_or_default().to_string();
                params.insert(key.to_string(), decoded);
            } else if !pair.is_empty() {
                params.insert(pair.to_string(), String::new());
            }
        }
    }
    params
}

fn decode_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, value),
                None => (pair, ""),
            };
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(value).unwrap_or_default().into_owned();
            Some((key, value))
        })
        .collect()
}

/// `content-type` → `Content-Type`, the way recorded headers read.
fn title_case(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
