//! Compiled-in default values for `PipelineConfig`.
//!
//! Mirrors the teacher's `core/config/defaults.rs` role (a pure function returning
//! baked-in fallback values) but for this crate's retry/backoff/TTL knobs instead
//! of persona prompts.

use std::collections::HashMap;

use super::{CacheConfig, CompletionCheckConfig, PipelineConfig, RetryConfig};

/// Base retry backoff per §4.4: `base * 2^(attempt-1)` capped at `max_backoff_ms`.
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Completion-check sentinel backoff per §4.10: 100ms doubling, capped at 5s, 60 retries.
pub const DEFAULT_COMPLETION_CHECK_INITIAL_MS: u64 = 100;
pub const DEFAULT_COMPLETION_CHECK_MAX_MS: u64 = 5_000;
pub const DEFAULT_COMPLETION_CHECK_MAX_RETRIES: u32 = 60;

/// `wait_for_categorization` bound per §4.6 / open question decision in DESIGN.md.
pub const DEFAULT_WAIT_FOR_CATEGORIZATION_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_MEMORY_TTL_SECS: u64 = 30;
pub const DEFAULT_SHARED_TTL_SECS: u64 = 300;

pub const DEFAULT_WORKER_CONCURRENCY: usize = 1;

pub fn default_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryConfig {
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        },
        cache: CacheConfig {
            memory_ttl_secs: DEFAULT_MEMORY_TTL_SECS,
            shared_ttl_secs: DEFAULT_SHARED_TTL_SECS,
        },
        wait_for_categorization_timeout_secs: DEFAULT_WAIT_FOR_CATEGORIZATION_TIMEOUT_SECS,
        completion_check: CompletionCheckConfig {
            initial_backoff_ms: DEFAULT_COMPLETION_CHECK_INITIAL_MS,
            max_backoff_ms: DEFAULT_COMPLETION_CHECK_MAX_MS,
            max_retries: DEFAULT_COMPLETION_CHECK_MAX_RETRIES,
        },
        worker_concurrency: default_worker_concurrency(),
    }
}

fn default_worker_concurrency() -> HashMap<String, usize> {
    [
        "note", "ingredient", "instruction", "image", "source", "pattern_tracking",
    ]
    .iter()
    .map(|name| (name.to_string(), DEFAULT_WORKER_CONCURRENCY))
    .collect()
}
