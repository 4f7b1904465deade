//! Single module boundary over the deterministic relay primitives, so
//! handlers, adapters, and binaries never import `stats_relay_core` paths
//! directly.

pub use stats_relay_core::config;
pub use stats_relay_core::envelope;
pub use stats_relay_core::payload;
pub use stats_relay_core::schedule;
