//! The rewrite engine: input parsing, the protocol state machine, response
//! synthesis, and the CORS echo.

pub mod cors;
mod handler;
mod inbound;
mod synthesize;

pub use handler::{handle_rewrite, RewriteContext, NO_CLIENT_BODY};
pub use inbound::{parse_query_string, InboundRequest, ReqType};
pub use synthesize::{synthesize, MockResponse, Synthesized};
