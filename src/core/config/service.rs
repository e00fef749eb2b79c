//! `ConfigService::load_config` — YAML-backed config with env override and
//! compiled-in defaults, mirroring the teacher's `core/config/service.rs` merge
//! shape (`load_yaml_file` + `deep_merge`) but applied to a typed struct instead
//! of a free-form JSON tree.

use std::fs;

use serde::Deserialize;

use crate::core::errors::PipelineError;

use super::defaults::default_config;
use super::paths::config_path;
use super::validation::validate_config;
use super::{CacheConfig, CompletionCheckConfig, PipelineConfig, RetryConfig};

/// Partial, all-optional mirror of `PipelineConfig` for parsing a possibly
/// incomplete YAML file. Missing fields fall back to compiled defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfigPartial {
    pub retry: Option<RetryConfigPartial>,
    pub cache: Option<CacheConfigPartial>,
    pub wait_for_categorization_timeout_secs: Option<u64>,
    pub completion_check: Option<CompletionCheckConfigPartial>,
    pub worker_concurrency: Option<std::collections::HashMap<String, usize>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RetryConfigPartial {
    pub base_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfigPartial {
    pub memory_ttl_secs: Option<u64>,
    pub shared_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompletionCheckConfigPartial {
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Clone, Default)]
pub struct ConfigService;

impl ConfigService {
    pub fn new() -> Self {
        Self
    }

    /// Loads the effective config: compiled defaults overridden field-by-field
    /// by whatever is present in the on-disk YAML file (if any), then validated.
    pub fn load_config(&self) -> Result<PipelineConfig, PipelineError> {
        let partial = match config_path() {
            Some(path) => load_yaml_file(&path)?,
            None => PipelineConfigPartial::default(),
        };

        let merged = merge_with_defaults(partial);
        validate_config(&merged)?;
        Ok(merged)
    }
}

fn load_yaml_file(path: &std::path::Path) -> Result<PipelineConfigPartial, PipelineError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| PipelineError::invalid_input(format!("cannot read {}: {}", path.display(), e)))?;
    serde_yaml::from_str(&contents)
        .map_err(|e| PipelineError::invalid_input(format!("cannot parse {}: {}", path.display(), e)))
}

fn merge_with_defaults(partial: PipelineConfigPartial) -> PipelineConfig {
    let defaults = default_config();

    let retry = partial.retry.map_or(defaults.retry.clone(), |r| RetryConfig {
        base_backoff_ms: r.base_backoff_ms.unwrap_or(defaults.retry.base_backoff_ms),
        max_backoff_ms: r.max_backoff_ms.unwrap_or(defaults.retry.max_backoff_ms),
        max_attempts: r.max_attempts.unwrap_or(defaults.retry.max_attempts),
    });

    let cache = partial.cache.map_or(defaults.cache.clone(), |c| CacheConfig {
        memory_ttl_secs: c.memory_ttl_secs.unwrap_or(defaults.cache.memory_ttl_secs),
        shared_ttl_secs: c.shared_ttl_secs.unwrap_or(defaults.cache.shared_ttl_secs),
    });

    let completion_check = partial.completion_check.map_or(
        defaults.completion_check.clone(),
        |cc| CompletionCheckConfig {
            initial_backoff_ms: cc
                .initial_backoff_ms
                .unwrap_or(defaults.completion_check.initial_backoff_ms),
            max_backoff_ms: cc
                .max_backoff_ms
                .unwrap_or(defaults.completion_check.max_backoff_ms),
            max_retries: cc.max_retries.unwrap_or(defaults.completion_check.max_retries),
        },
    );

    PipelineConfig {
        retry,
        cache,
        wait_for_categorization_timeout_secs: partial
            .wait_for_categorization_timeout_secs
            .unwrap_or(defaults.wait_for_categorization_timeout_secs),
        completion_check,
        worker_concurrency: partial.worker_concurrency.unwrap_or(defaults.worker_concurrency),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let merged = merge_with_defaults(PipelineConfigPartial::default());
        assert_eq!(merged, default_config());
    }

    #[test]
    fn partial_overrides_only_named_fields() {
        let partial = PipelineConfigPartial {
            retry: Some(RetryConfigPartial {
                base_backoff_ms: Some(50),
                max_backoff_ms: None,
                max_attempts: None,
            }),
            ..Default::default()
        };
        let merged = merge_with_defaults(partial);
        assert_eq!(merged.retry.base_backoff_ms, 50);
        assert_eq!(merged.retry.max_backoff_ms, default_config().retry.max_backoff_ms);
    }
}
