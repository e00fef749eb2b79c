//! Typed pipeline configuration: retry/backoff policy, cache TTLs, the
//! `wait_for_categorization` bound, and completion-check backoff — the ambient
//! knobs §10a commits this crate to exposing explicitly rather than hard-coding.

pub mod defaults;
pub mod paths;
pub mod service;
pub mod validation;

pub use service::ConfigService;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub wait_for_categorization_timeout_secs: u64,
    pub completion_check: CompletionCheckConfig,
    pub worker_concurrency: HashMap<String, usize>,
}

/// Backoff for action retries per §4.4: `base * 2^(attempt-1)` capped at `max_backoff_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub memory_ttl_secs: u64,
    pub shared_ttl_secs: u64,
}

/// Backoff for completion-check sentinel re-enqueue per §4.10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionCheckConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_retries: u32,
}

impl RetryConfig {
    /// `base * 2^(attempt-1)`, capped at `max_backoff_ms`. `attempt` is 1-based.
    pub fn backoff_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let scaled = self.base_backoff_ms.saturating_mul(1u64 << exp);
        std::time::Duration::from_millis(scaled.min(self.max_backoff_ms))
    }
}

impl CompletionCheckConfig {
    /// Doubling backoff starting at `initial_backoff_ms`, capped at `max_backoff_ms`.
    pub fn backoff_for_retry(&self, retry: u32) -> std::time::Duration {
        let exp = retry.min(32);
        let scaled = self.initial_backoff_ms.saturating_mul(1u64 << exp);
        std::time::Duration::from_millis(scaled.min(self.max_backoff_ms))
    }
}
