//! Environment overrides applied after file parsing.

use crate::error::ConfigError;

use super::Config;

pub(super) fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty(env_lookup, "TODO_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(secs) = parse_positive::<u64, _>(env_lookup, "TODO_API_TIMEOUT_SECS", "seconds")? {
        config.api.timeout_secs = secs;
    }
    if let Some(limit) = parse_positive::<usize, _>(env_lookup, "TODO_MAX_CONCURRENT", "requests")? {
        config.scheduler.max_concurrent = limit;
    }
    if let Some(rate) =
        parse_positive::<usize, _>(env_lookup, "TODO_RATE_LIMIT_PER_SECOND", "requests")?
    {
        config.scheduler.rate_limit_per_second = rate;
    }
    if let Some(retries) = non_empty(env_lookup, "TODO_MAX_RETRIES") {
        // Zero is meaningful here: it disables retries entirely.
        config.retry.max_retries = retries.parse::<u32>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid TODO_MAX_RETRIES value `{retries}`: expected a non-negative integer"
            ))
        })?;
    }
    Ok(())
}

fn non_empty<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse an integer override and clamp it to at least 1.
fn parse_positive<T, FEnv>(
    env_lookup: &FEnv,
    name: &str,
    unit: &str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr + Ord + From<u8>,
    FEnv: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(env_lookup, name) else {
        return Ok(None);
    };
    let parsed = raw.parse::<T>().map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid {name} value `{raw}`: expected positive integer {unit}"
        ))
    })?;
    Ok(Some(parsed.max(T::from(1u8))))
}
