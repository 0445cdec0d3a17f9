use std::str::FromStr;
use std::time::Duration;

/// Timing of the write-behind reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Quiescence window: a flush fires once no mutation arrived for this long.
    pub debounce: Duration,
    /// Upper bound on how long continuous edits may postpone a flush.
    pub max_delay: Duration,
    /// First retry delay after a failed flush; doubles per attempt.
    pub retry_base: Duration,
    /// Cap on the retry delay.
    pub retry_max: Duration,
}

impl FlushPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base.saturating_mul(factor).min(self.retry_max)
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(5_000),
            max_delay: Duration::from_millis(30_000),
            retry_base: Duration::from_millis(500),
            retry_max: Duration::from_millis(30_000),
        }
    }
}

/// Runtime knobs of the live editing core.
///
/// All fields have defaults suitable for production; tests usually shrink
/// the timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConfig {
    /// Idle lifetime of a hot entry, rearmed by every accepted mutation.
    pub hot_ttl: Duration,
    /// Period of the eager expiry sweep.
    pub sweep_interval: Duration,
    pub flush: FlushPolicy,
    /// Per-inspection broadcast buffer; slower subscribers lose the oldest updates.
    pub subscriber_queue_capacity: usize,
    /// Lifetime of a cached rendered report.
    pub report_cache_ttl: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            hot_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
            flush: FlushPolicy::default(),
            subscriber_queue_capacity: 100,
            report_cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl LiveConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default  |
    /// |-----------------------------|----------|
    /// | `HOT_TTL_SECS`              | `86400`  |
    /// | `HOT_SWEEP_INTERVAL_SECS`   | `60`     |
    /// | `FLUSH_DEBOUNCE_MS`         | `5000`   |
    /// | `FLUSH_MAX_DELAY_MS`        | `30000`  |
    /// | `FLUSH_RETRY_BASE_MS`       | `500`    |
    /// | `FLUSH_RETRY_MAX_MS`        | `30000`  |
    /// | `SUBSCRIBER_QUEUE_CAPACITY` | `100`    |
    /// | `REPORT_CACHE_TTL_SECS`     | `86400`  |
    ///
    /// Panics on malformed values; this runs once at start-up.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hot_ttl: Duration::from_secs(env_or("HOT_TTL_SECS", defaults.hot_ttl.as_secs())),
            sweep_interval: Duration::from_secs(env_or(
                "HOT_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            flush: FlushPolicy {
                debounce: millis_or("FLUSH_DEBOUNCE_MS", defaults.flush.debounce),
                max_delay: millis_or("FLUSH_MAX_DELAY_MS", defaults.flush.max_delay),
                retry_base: millis_or("FLUSH_RETRY_BASE_MS", defaults.flush.retry_base),
                retry_max: millis_or("FLUSH_RETRY_MAX_MS", defaults.flush.retry_max),
            },
            subscriber_queue_capacity: env_or(
                "SUBSCRIBER_QUEUE_CAPACITY",
                defaults.subscriber_queue_capacity,
            ),
            report_cache_ttl: Duration::from_secs(env_or(
                "REPORT_CACHE_TTL_SECS",
                defaults.report_cache_ttl.as_secs(),
            )),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid number: {e}")),
        Err(_) => default,
    }
}

fn millis_or(key: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_or(key, default_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = FlushPolicy {
            retry_base: Duration::from_millis(100),
            retry_max: Duration::from_millis(1_000),
            ..FlushPolicy::default()
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1_000));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = LiveConfig::default();
        assert_eq!(config.hot_ttl, Duration::from_secs(86_400));
        assert_eq!(config.flush.debounce, Duration::from_secs(5));
        assert_eq!(config.subscriber_queue_capacity, 100);
    }
}
