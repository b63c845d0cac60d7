//! Flagcache - client-side feature flag evaluation
//!
//! Answers "what value does flag X have for user Y?" from a local TTL cache,
//! falling back to a remote evaluation API on a miss.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod models;
pub mod remote;
pub mod tasks;

pub use cache::{cache_key, CacheStats, TtlCache};
pub use client::{FlagClient, FlagClientBuilder};
pub use config::{CacheConfig, ClientConfig, HttpConfig};
pub use error::{FlagError, Result};
pub use evaluation::EvaluationCache;
pub use models::{EvaluationResult, FlagType, FlagValue};
pub use remote::{HttpEvaluator, RemoteEvaluator};
pub use tasks::{spawn_sweep_task, SweepHandle};
