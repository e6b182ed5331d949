//! Batch configuration from the environment.
//!
//! Every variable is optional; missing ones keep the `BatchConfig` default.
//!
//! | variable                    | meaning                         |
//! |-----------------------------|---------------------------------|
//! | `BATCHRUN_MAX_CONCURRENCY`  | admission window size           |
//! | `BATCHRUN_TIMEOUT_MS`       | per-attempt deadline            |
//! | `BATCHRUN_MAX_RETRIES`      | retries after the first attempt |
//! | `BATCHRUN_BASE_DELAY_MS`    | delay before the first retry    |
//! | `BATCHRUN_FAILURE_MODE`     | `fail_fast` or `collect_all`    |

use std::str::FromStr;
use std::time::Duration;

use batchrun_core::{BatchConfig, ConfigResult, ConfigurationError, FailureMode};

pub const MAX_CONCURRENCY: &str = "BATCHRUN_MAX_CONCURRENCY";
pub const TIMEOUT_MS: &str = "BATCHRUN_TIMEOUT_MS";
pub const MAX_RETRIES: &str = "BATCHRUN_MAX_RETRIES";
pub const BASE_DELAY_MS: &str = "BATCHRUN_BASE_DELAY_MS";
pub const FAILURE_MODE: &str = "BATCHRUN_FAILURE_MODE";

/// Load and validate the batch configuration from process environment.
pub fn from_env() -> ConfigResult<BatchConfig> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load and validate the batch configuration through `lookup`.
pub fn from_lookup<F>(lookup: F) -> ConfigResult<BatchConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = BatchConfig::default();

    if let Some(max) = parse::<usize, _>(&lookup, MAX_CONCURRENCY)? {
        config.max_concurrency = max;
    }
    if let Some(ms) = parse::<u64, _>(&lookup, TIMEOUT_MS)? {
        config.timeout.timeout = Duration::from_millis(ms);
    }
    if let Some(retries) = parse::<u32, _>(&lookup, MAX_RETRIES)? {
        config.retry.max_retries = retries;
    }
    if let Some(ms) = parse::<u64, _>(&lookup, BASE_DELAY_MS)? {
        config.retry.base_delay = Duration::from_millis(ms);
    }
    if let Some(mode) = lookup(FAILURE_MODE) {
        config.failure_mode = mode.parse::<FailureMode>()?;
    }

    config.validate()?;
    Ok(config)
}

fn parse<T, F>(lookup: &F, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigurationError::invalid_value(key, format!("{raw:?}: {e}"))),
    }
}
