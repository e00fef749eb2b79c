//! Range validation for `PipelineConfig`, mirroring the teacher's
//! `core/config/validation.rs::validate_u64_field` style: reject out-of-range
//! values with `PipelineError::InvalidInput` instead of panicking.

use crate::core::errors::PipelineError;

use super::PipelineConfig;

pub fn validate_config(config: &PipelineConfig) -> Result<(), PipelineError> {
    validate_u64_field(
        "retry.base_backoff_ms",
        config.retry.base_backoff_ms,
        1,
        600_000,
    )?;
    validate_u64_field(
        "retry.max_backoff_ms",
        config.retry.max_backoff_ms,
        config.retry.base_backoff_ms,
        3_600_000,
    )?;
    validate_u32_field("retry.max_attempts", config.retry.max_attempts, 1, 20)?;

    validate_u64_field("cache.memory_ttl_secs", config.cache.memory_ttl_secs, 0, 86_400)?;
    validate_u64_field("cache.shared_ttl_secs", config.cache.shared_ttl_secs, 0, 604_800)?;

    validate_u64_field(
        "wait_for_categorization_timeout_secs",
        config.wait_for_categorization_timeout_secs,
        1,
        3_600,
    )?;

    validate_u64_field(
        "completion_check.initial_backoff_ms",
        config.completion_check.initial_backoff_ms,
        1,
        60_000,
    )?;
    validate_u64_field(
        "completion_check.max_backoff_ms",
        config.completion_check.max_backoff_ms,
        config.completion_check.initial_backoff_ms,
        600_000,
    )?;
    validate_u32_field(
        "completion_check.max_retries",
        config.completion_check.max_retries,
        1,
        10_000,
    )?;

    for (queue, concurrency) in &config.worker_concurrency {
        if *concurrency == 0 {
            return Err(PipelineError::invalid_input(format!(
                "Invalid config at 'worker_concurrency.{}': must be at least 1",
                queue
            )));
        }
    }

    Ok(())
}

fn validate_u64_field(path: &str, value: u64, min: u64, max: u64) -> Result<(), PipelineError> {
    if value < min || value > max {
        return Err(PipelineError::invalid_input(format!(
            "Invalid config at '{}': must be between {} and {}, got {}",
            path, min, max, value
        )));
    }
    Ok(())
}

fn validate_u32_field(path: &str, value: u32, min: u32, max: u32) -> Result<(), PipelineError> {
    if value < min || value > max {
        return Err(PipelineError::invalid_input(format!(
            "Invalid config at '{}': must be between {} and {}, got {}",
            path, min, max, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::defaults::default_config;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&default_config()).is_ok());
    }

    #[test]
    fn max_backoff_below_base_backoff_is_rejected() {
        let mut config = default_config();
        config.retry.max_backoff_ms = config.retry.base_backoff_ms - 1;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn zero_worker_concurrency_is_rejected() {
        let mut config = default_config();
        config.worker_concurrency.insert("note".to_string(), 0);
        assert!(validate_config(&config).is_err());
    }
}
