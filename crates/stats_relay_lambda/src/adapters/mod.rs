pub mod env_config;
pub mod memory_source;
pub mod secret_store;
pub mod stats_sink;
