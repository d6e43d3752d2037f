//! Rule list management: `GET /api/rules` and `PUT /api/rules`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use tracing::info;

use super::{collect_body, error_response, json_response};
use crate::rewrite::parse_query_string;
use crate::rule::{Rule, RuleStore};

#[derive(Debug, Serialize)]
struct PutRulesResponse {
    result: &'static str,
    count: usize,
}

/// Return the stored rule list for a client.
pub fn handle_get(query: Option<&str>, store: &RuleStore) -> Response<Full<Bytes>> {
    let Some(client_id) = client_from_query(query) else {
        return error_response(StatusCode::BAD_REQUEST, "missing client parameter");
    };
    json_response(StatusCode::OK, &store.rules_for(&client_id))
}

/// Replace the rule list for a client.
///
/// The body must be a JSON array of rules; any ill-formed entry rejects the
/// whole update so the matcher never sees a partial list.
pub async fn handle_put(
    req: Request<Incoming>,
    store: &RuleStore,
) -> Response<Full<Bytes>> {
    let query = req.uri().query().map(str::to_string);
    let Some(client_id) = client_from_query(query.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing client parameter");
    };

    let body = match collect_body(req).await {
        Ok(bytes) => bytes,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let rules: Vec<Rule> = match serde_json::from_slice(&body) {
        Ok(rules) => rules,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("invalid rule list: {e}"))
        }
    };

    match store.put(&client_id, rules) {
        Ok(count) => {
            info!(client = %client_id, count, "rule list updated");
            json_response(
                StatusCode::OK,
                &PutRulesResponse {
                    result: "ok",
                    count,
                },
            )
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn client_from_query(query: Option<&str>) -> Option<String> {
    parse_query_string(query)
        .remove("client")
        .filter(|id| !id.is_empty())
}
