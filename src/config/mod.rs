//! Configuration module for the page pool
//!
//! This module provides the `PoolConfig` struct and its builder. A config is
//! validated once and then frozen inside the pool it configures.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::PoolConfigBuilder;
pub use types::PoolConfig;
