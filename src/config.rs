use std::time::Duration;

/// Runtime tuning knobs, built from defaults and overridden by
/// `FAIRPOS_*` environment variables. Unparseable values fall back to the
/// default rather than aborting startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between periodic catalog refreshes.
    pub refresh_interval: Duration,
    /// How long a session may sit idle before its worker is evicted.
    pub session_idle_timeout: Duration,
    /// Upper bound on the quantity of a single cart item.
    pub max_quantity_per_item: u32,
    /// Retry policy for ledger commits.
    pub commit_retry: RetryConfig,
    /// Page size used when folding the ledger into reports.
    pub report_page_size: usize,
}

/// Retry behavior for ledger appends.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of append attempts per commit.
    pub max_attempts: u32,
    /// Base delay between attempts (doubled each retry).
    pub base_delay: Duration,
    /// Ceiling on the backoff delay.
    pub max_delay: Duration,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            session_idle_timeout: Duration::from_secs(1800),
            max_quantity_per_item: 20,
            commit_retry: RetryConfig::default(),
            report_page_size: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            refresh_interval: Duration::from_secs(env_u64(
                "FAIRPOS_REFRESH_SECS",
                defaults.refresh_interval.as_secs(),
            )),
            session_idle_timeout: Duration::from_secs(env_u64(
                "FAIRPOS_IDLE_SECS",
                defaults.session_idle_timeout.as_secs(),
            )),
            max_quantity_per_item: env_u64(
                "FAIRPOS_MAX_QTY",
                defaults.max_quantity_per_item as u64,
            ) as u32,
            commit_retry: RetryConfig {
                max_attempts: env_u64(
                    "FAIRPOS_COMMIT_ATTEMPTS",
                    defaults.commit_retry.max_attempts as u64,
                ) as u32,
                base_delay: Duration::from_millis(env_u64(
                    "FAIRPOS_COMMIT_BASE_MS",
                    defaults.commit_retry.base_delay.as_millis() as u64,
                )),
                max_delay: Duration::from_millis(env_u64(
                    "FAIRPOS_COMMIT_MAX_MS",
                    defaults.commit_retry.max_delay.as_millis() as u64,
                )),
                jitter: defaults.commit_retry.jitter,
            },
            report_page_size: defaults.report_page_size,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_quantity_per_item, 20);
        assert_eq!(config.commit_retry.max_attempts, 4);
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_env_u64_fallback() {
        assert_eq!(env_u64("FAIRPOS_TEST_UNSET_KEY", 7), 7);
    }
}
