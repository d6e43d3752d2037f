//! Per-client HTTP interception and mocking proxy.
//!
//! Callers tunnel requests through `/api/rewrite`; per-client rule lists
//! decide whether each exchange is answered with a synthesized response or
//! forwarded to its real target, and every decided exchange is streamed as a
//! start/end event pair to the client's observers.

pub mod admin;
pub mod config;
pub mod cookies;
pub mod error;
pub mod events;
pub mod forward;
pub mod rewrite;
pub mod rule;
pub mod server;
pub mod template;
