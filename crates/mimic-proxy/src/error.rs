//! Error taxonomy for the rewrite engine.

use thiserror::Error;

/// Errors a single rewrite exchange can produce.
///
/// The handler never lets these escape to the connection: every variant maps
/// to a concrete HTTP response, and only some of them close with an event.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Unparseable `url` parameter or malformed JSON body on POST.
    /// Surfaced as 400 text; no events are published.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The `cookie` parameter carried no client-id cookie.
    /// Surfaced as 200 with a fixed text body; no events are published.
    #[error("no client id in cookie")]
    NoClient,

    /// Any failure from the upstream forwarder (DNS, connect, TLS, read,
    /// redirect cap). Surfaced as 502; the closing event carries the reason.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// A matched rule failed to synthesize its response.
    /// Surfaced as 500; the closing event carries the error text.
    #[error("rule synthesis failed: {0}")]
    Rule(String),
}

/// Errors rejecting a rule list wholesale at store time.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule {index}: empty path")]
    EmptyPath { index: usize },

    #[error("rule {index}: invalid path pattern: {source}")]
    BadPattern {
        index: usize,
        #[source]
        source: regex::Error,
    },
}
