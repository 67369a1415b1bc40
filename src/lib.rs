//! Floodgate - Client-Side Rate Limiting
//!
//! This crate implements a soft, advisory rate limiter for client
//! applications: per-action, per-identifier sliding windows persisted in
//! a local key-value store, so duplicate submissions and runaway retries
//! are stopped before they ever reach the network. Real enforcement
//! belongs to the backend; floodgate also recognizes the backend's
//! answer (HTTP 429) and surfaces both kinds of throttling distinctly.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod storage;

pub use config::LimiterConfig;
pub use error::{FloodgateError, Result, StorageError};
pub use http::GuardedClient;
pub use ratelimit::{
    CleanupStats, Decision, Janitor, LimitRule, RateLimiter, RulesConfig, DEFAULT_IDENTIFIER,
};
pub use storage::{FileStore, MemoryStore, StorageBackend};
