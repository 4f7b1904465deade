//! Runtime integration for the stats relay.
//!
//! This crate owns everything the deterministic core stays away from: the
//! HTTP clients for the memory and stats APIs, secret lookup, environment
//! configuration, and the Lambda entry points. The relay pipeline itself
//! lives in `handlers::relay` and talks to the outside world only through
//! the port traits in `adapters`.

pub mod adapters;
pub mod handlers;
pub mod runtime;
