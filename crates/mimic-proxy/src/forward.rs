//! Upstream forwarding for exchanges no rule mocks.

use anyhow::Context;
use bytes::Bytes;
use hyper::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::redirect;
use std::time::Duration;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::rewrite::InboundRequest;

/// Headers never relayed back to the caller. The outbound client already
/// handled transfer framing and decompression, so echoing these would lie
/// about the body it produced.
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "transfer-encoding",
    "connection",
    "keep-alive",
    "content-length",
    "content-encoding",
];

/// Everything captured from the upstream response.
///
/// Headers keep their original order and duplicates, so multi-valued headers
/// like `Set-Cookie` survive intact.
#[derive(Debug)]
pub struct ForwardedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ForwardedResponse {
    /// Headers safe to relay to the caller.
    pub fn relay_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .filter(|(name, _)| !is_skipped_header(name))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

pub fn is_skipped_header(name: &str) -> bool {
    SKIPPED_RESPONSE_HEADERS
        .iter()
        .any(|skipped| name.eq_ignore_ascii_case(skipped))
}

/// Performs outbound requests mirroring the tunneled exchange.
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self { client })
    }

    /// Forward the exchange to its real target.
    ///
    /// `cookie` is the already-filtered outbound cookie header; the proxy's
    /// own cookies never reach the target. Redirects are followed
    /// transparently up to the configured cap, and the final response is what
    /// the caller sees.
    pub async fn forward(
        &self,
        inbound: &InboundRequest,
        cookie: &str,
    ) -> Result<ForwardedResponse, anyhow::Error> {
        let target_url = &inbound.target_url;
        debug!(method = %inbound.method, url = %target_url, "forwarding upstream");

        let mut request = match inbound.method {
            Method::GET => self.client.get(target_url),
            Method::POST => self.client.post(target_url),
            Method::PUT => self.client.put(target_url),
            Method::DELETE => self.client.delete(target_url),
            Method::PATCH => self.client.patch(target_url),
            Method::HEAD => self.client.head(target_url),
            _ => self.client.get(target_url),
        };

        if !cookie.is_empty() {
            request = request.header(COOKIE, cookie);
        }

        if inbound.method == Method::POST && !inbound.body.is_empty() {
            if let Some(content_type) = &inbound.content_type {
                request = request.header(CONTENT_TYPE, content_type);
            }
            request = request.body(inbound.body.clone());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("no response from {target_url}"))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .with_context(|| format!("unreadable response body from {target_url}"))?;

        debug!(status, bytes = body.len(), "upstream response captured");
        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}
