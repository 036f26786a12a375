//! Retry policy for transient request failures.

use rand::Rng;
use std::time::{Duration, SystemTime};

use crate::config::RetryConfig;

/// Endpoints that are never retried: non-idempotent batch mutations and
/// operations whose repetition is pointless.
pub const NO_RETRY_ENDPOINTS: [&str; 3] = ["/auth/logout", "/tasks/bulk-update", "/tasks/bulk-delete"];

/// Statuses worth another attempt.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Upper bound applied to server-provided `Retry-After` values.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_multiplier: u32,
    /// Jitter fraction drawn uniformly from `[0, jitter)`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_multiplier: config.max_multiplier.max(1),
            jitter: config.jitter.clamp(0.0, 0.999),
        }
    }
}

impl RetryPolicy {
    /// True when `path` is on the retry deny-list.
    pub fn is_excluded(path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path).trim_end_matches('/');
        NO_RETRY_ENDPOINTS
            .iter()
            .any(|endpoint| path == *endpoint || path.ends_with(endpoint))
    }

    /// Decide whether a failed attempt should be retried.
    ///
    /// `status` is `None` when no response arrived at all. `retries_so_far`
    /// counts retries already performed for this request.
    pub fn should_retry(
        &self,
        status: Option<u16>,
        retries_so_far: u32,
        excluded: bool,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if excluded || retries_so_far >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        let retryable = match status {
            None => true,
            Some(code) => RETRYABLE_STATUSES.contains(&code),
        };
        if !retryable {
            return RetryDecision::GiveUp;
        }
        if status == Some(429) {
            if let Some(delay) = retry_after {
                return RetryDecision::Retry(delay.min(MAX_RETRY_AFTER));
            }
        }
        RetryDecision::Retry(self.backoff_delay(retries_so_far.saturating_add(1)))
    }

    /// Backoff before retry number `attempt` (1-based), with random jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let sample = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..self.jitter)
        } else {
            0.0
        };
        self.backoff_delay_with_jitter(attempt, sample)
    }

    /// `base * min(2^(attempt-1), max_multiplier) * (1 + jitter)`, capped at
    /// `max_delay`.
    pub fn backoff_delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let multiplier = 2u64.pow(exponent).min(u64::from(self.max_multiplier));
        let millis = self.base_delay.as_millis() as f64 * multiplier as f64 * (1.0 + jitter);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// Parse a `Retry-After` value given in seconds or as an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds));
        }
        return None;
    }
    let when = httpdate::parse_http_date(value).ok()?;
    Some(
        when.duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    // Verifies only transient statuses and missing responses are retried.
    #[test]
    fn retries_transient_statuses_only() {
        let policy = policy();
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(
                matches!(
                    policy.should_retry(Some(status), 0, false, None),
                    RetryDecision::Retry(_)
                ),
                "status {status} should retry"
            );
        }
        assert!(matches!(
            policy.should_retry(None, 0, false, None),
            RetryDecision::Retry(_)
        ));
        for status in [400, 401, 403, 404, 409, 422, 501] {
            assert_eq!(
                policy.should_retry(Some(status), 0, false, None),
                RetryDecision::GiveUp,
                "status {status} should not retry"
            );
        }
    }

    // Verifies the retry budget and deny-list both stop retries.
    #[test]
    fn gives_up_when_exhausted_or_excluded() {
        let policy = policy();
        assert_eq!(
            policy.should_retry(Some(500), 3, false, None),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy.should_retry(Some(500), 7, false, None),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy.should_retry(Some(503), 0, true, None),
            RetryDecision::GiveUp
        );
    }

    // Verifies delays grow exponentially and stay under the ceiling.
    #[test]
    fn backoff_is_monotonic_and_capped() {
        let policy = policy();
        let mut previous = Duration::ZERO;
        for attempt in 1..=3 {
            let delay = policy.backoff_delay(attempt);
            assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
            assert!(delay <= Duration::from_secs(10));
            previous = delay;
        }
        assert_eq!(
            policy.backoff_delay_with_jitter(1, 0.0),
            Duration::from_millis(1000)
        );
        assert_eq!(
            policy.backoff_delay_with_jitter(3, 0.0),
            Duration::from_millis(4000)
        );
        assert_eq!(
            policy.backoff_delay_with_jitter(2, 0.25),
            Duration::from_millis(2500)
        );
    }

    // Verifies the multiplier cap and absolute ceiling both apply.
    #[test]
    fn backoff_caps_multiplier_and_total() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            max_multiplier: 10,
            jitter: 0.0,
        };
        // 2^9 = 512 would exceed the 10x multiplier cap.
        assert_eq!(
            policy.backoff_delay_with_jitter(10, 0.0),
            Duration::from_millis(1000)
        );
        assert_eq!(policy.backoff_delay(40), Duration::from_millis(1000));

        let default = self::policy();
        assert_eq!(
            default.backoff_delay_with_jitter(8, 0.29),
            Duration::from_secs(10)
        );
    }

    // Verifies Retry-After overrides exponential backoff for 429s only.
    #[test]
    fn retry_after_overrides_backoff_for_429() {
        let policy = policy();
        assert_eq!(
            policy.should_retry(Some(429), 0, false, Some(Duration::from_secs(2))),
            RetryDecision::Retry(Duration::from_secs(2))
        );
        let RetryDecision::Retry(delay) =
            policy.should_retry(Some(503), 0, false, Some(Duration::from_secs(2)))
        else {
            panic!("503 should retry");
        };
        assert!(delay >= Duration::from_millis(1000) && delay < Duration::from_millis(1300));
    }

    // Verifies numeric and HTTP-date Retry-After formats.
    #[test]
    fn parses_retry_after_formats() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
        let future = SystemTime::now() + Duration::from_secs(120);
        let parsed = parse_retry_after(&httpdate::fmt_http_date(future)).expect("date");
        assert!(parsed > Duration::from_secs(100) && parsed <= Duration::from_secs(120));
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-3"), None);
    }

    // Verifies deny-list matching tolerates base paths and query strings.
    #[test]
    fn excluded_endpoints_match_by_suffix() {
        assert!(RetryPolicy::is_excluded("/auth/logout"));
        assert!(RetryPolicy::is_excluded("/api/tasks/bulk-delete"));
        assert!(RetryPolicy::is_excluded("/tasks/bulk-update?dry=1"));
        assert!(!RetryPolicy::is_excluded("/tasks"));
        assert!(!RetryPolicy::is_excluded("/auth/login"));
    }

    #[cfg(feature = "fuzz-tests")]
    mod fuzz {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn backoff_stays_within_cap(attempt in 0u32..64, jitter in 0.0f64..1.0) {
                let policy = RetryPolicy::default();
                let delay = policy.backoff_delay_with_jitter(attempt, jitter);
                prop_assert!(delay <= policy.max_delay);
            }

            #[test]
            fn backoff_never_shrinks_between_attempts(attempt in 1u32..40) {
                let policy = RetryPolicy::default();
                prop_assert!(
                    policy.backoff_delay_with_jitter(attempt, 0.0)
                        <= policy.backoff_delay_with_jitter(attempt + 1, 0.0)
                );
            }
        }
    }
}
