//! Mock rules: wire types, compilation, matching, and the per-client store.

mod matcher;
mod store;
mod types;

pub use matcher::{first_match, CompiledRule, MatchTarget};
pub use store::RuleStore;
pub use types::{PathKind, ResponseKind, Rule};
