//! Deterministic building blocks for the stats relay.
//!
//! Everything in this crate is pure: the configuration contract and its
//! validation, schedule-expression parsing, memory-envelope decoding, and
//! payload shaping. Network clients, secret lookup, and scheduling live in
//! `stats_relay_lambda`, which re-exports these modules through its
//! `runtime` facade.

pub mod config;
pub mod envelope;
pub mod payload;
pub mod schedule;
