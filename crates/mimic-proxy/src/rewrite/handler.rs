//! The `/api/rewrite` endpoint.
//!
//! Per request the handler walks RECEIVED → RESOLVED_CLIENT →
//! DECIDED(mock | forward | passthrough) → RESPONDING → DONE. Requests
//! short-circuited before DECIDED respond without publishing anything; every
//! request that reaches DECIDED publishes exactly one start and one end
//! event, in that order, no matter how the response turns out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, ORIGIN};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, warn};

use super::cors;
use super::inbound::InboundRequest;
use super::synthesize::{synthesize, Synthesized};
use crate::config::Config;
use crate::cookies;
use crate::error::RewriteError;
use crate::events::{Event, EventPublisher, RequestEnd, RequestStart, REQUEST_END, REQUEST_START};
use crate::forward::Forwarder;
use crate::rule::{first_match, MatchTarget, RuleStore};

/// Fixed body for callers that have not been onboarded. With no client id
/// there are no rules and no observers, so there is nothing to do or watch.
pub const NO_CLIENT_BODY: &str = "no clientID, ignored";

/// Shared state every rewrite exchange needs.
pub struct RewriteContext {
    pub config: Arc<Config>,
    pub store: Arc<RuleStore>,
    pub forwarder: Arc<Forwarder>,
    pub publisher: Arc<dyn EventPublisher>,
}

pub async fn handle_rewrite(
    req: Request<Incoming>,
    ctx: Arc<RewriteContext>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();
    let origin = headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return text_response(
                StatusCode::BAD_REQUEST,
                format!("failed to read request body: {e}"),
                origin.as_deref(),
            )
        }
    };

    // RECEIVED: an unparseable url responds 400 with no events.
    let inbound =
        match InboundRequest::parse(method, &uri, &headers, body, &ctx.config.client_cookie) {
            Ok(inbound) => inbound,
            Err(e) => {
                debug!("rewrite input rejected: {e}");
                return text_response(StatusCode::BAD_REQUEST, e.to_string(), origin.as_deref());
            }
        };

    // RESOLVED_CLIENT: no client id, nothing to match or watch.
    let Some(client_id) = inbound.client_id.clone() else {
        debug!(url = %inbound.target_url, "{}", RewriteError::NoClient);
        return text_response(StatusCode::OK, NO_CLIENT_BODY, origin.as_deref());
    };

    let request_data = match inbound.request_data() {
        Ok(value) => value,
        Err(e) => {
            debug!("rewrite body rejected: {e}");
            return text_response(StatusCode::BAD_REQUEST, e.to_string(), origin.as_deref());
        }
    };

    // DECIDED onward runs detached: a caller disconnect drops this future,
    // but the exchange still finishes and the closing event still fires.
    let exchange = tokio::spawn(run_exchange(ctx, inbound, client_id, request_data));
    match exchange.await {
        Ok(response) => response,
        Err(e) => {
            warn!("rewrite exchange aborted: {e}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
                origin.as_deref(),
            )
        }
    }
}

async fn run_exchange(
    ctx: Arc<RewriteContext>,
    inbound: InboundRequest,
    client_id: String,
    request_data: serde_json::Value,
) -> Response<Full<Bytes>> {
    let started = Instant::now();

    let rules = ctx.store.get(&client_id);
    let form = inbound.form_params();
    let target = MatchTarget {
        host: &inbound.host,
        pathname: &inbound.pathname,
        query: &inbound.query,
        form: form.as_ref(),
    };
    let matched = first_match(&rules, &target);

    ctx.publisher.publish(
        &client_id,
        Event::new(
            REQUEST_START,
            RequestStart {
                is_mock: matched.is_some(),
                method: inbound.method.to_string(),
                host: inbound.host.clone(),
                pathname: inbound.pathname.clone(),
                url: inbound.target_url.clone(),
                request_headers: inbound.headers.clone(),
                request_data: request_data.clone(),
            },
        ),
    );

    let decision = match matched {
        Some(rule) => synthesize(&rule.rule, &inbound),
        None => Ok(Synthesized::PassThrough),
    };

    let (mut response, status, response_body) = match decision {
        Ok(Synthesized::Mock(mock)) => {
            // The artificial latency counts into timecost: it runs after the
            // start event and before the response is written.
            if mock.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(mock.delay_ms)).await;
            }
            let response_body = parse_or_string(&mock.body);
            let response = Response::builder()
                .status(mock.status)
                .header(CONTENT_TYPE, mock.content_type.as_str())
                .body(Full::new(Bytes::from(mock.body)))
                .unwrap_or_else(|_| {
                    fallback_response(StatusCode::INTERNAL_SERVER_ERROR, "response build error")
                });
            let status = response.status().as_u16();
            (response, status, response_body)
        }
        Ok(Synthesized::PassThrough) => {
            let outbound_cookie = cookies::strip(&inbound.cookie, &ctx.config.client_cookie);
            match ctx.forwarder.forward(&inbound, &outbound_cookie).await {
                Ok(upstream) => {
                    let mut builder = Response::builder().status(upstream.status);
                    for (name, value) in upstream.relay_headers() {
                        builder = builder.header(name, value);
                    }
                    let response_body = parse_or_string(&String::from_utf8_lossy(&upstream.body));
                    let response = builder
                        .body(Full::new(upstream.body.clone()))
                        .unwrap_or_else(|_| {
                            fallback_response(StatusCode::BAD_GATEWAY, "upstream relay error")
                        });
                    let status = response.status().as_u16();
                    (response, status, response_body)
                }
                Err(e) => {
                    let err = RewriteError::Upstream(e.to_string());
                    warn!(url = %inbound.target_url, "{err}");
                    let reason = err.to_string();
                    let response = fallback_response(StatusCode::BAD_GATEWAY, &reason);
                    (response, 502, serde_json::Value::String(reason))
                }
            }
        }
        Err(e) => {
            let reason = e.to_string();
            warn!(url = %inbound.target_url, "synthesis failed: {reason}");
            let response = fallback_response(StatusCode::INTERNAL_SERVER_ERROR, &reason);
            (response, 500, serde_json::Value::String(reason))
        }
    };

    cors::apply(response.headers_mut(), inbound.origin.as_deref());

    ctx.publisher.publish(
        &client_id,
        Event::new(
            REQUEST_END,
            RequestEnd {
                status,
                request_data,
                request_headers: inbound.headers.clone(),
                response_body,
                timecost: started.elapsed().as_millis() as u64,
            },
        ),
    );

    response
}

/// Event payloads carry parsed JSON when the body parses, the raw text
/// otherwise.
fn parse_or_string(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}

fn text_response(
    status: StatusCode,
    body: impl Into<Bytes>,
    origin: Option<&str>,
) -> Response<Full<Bytes>> {
    let mut response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| fallback_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error"));
    cors::apply(response.headers_mut(), origin);
    response
}

fn fallback_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}
