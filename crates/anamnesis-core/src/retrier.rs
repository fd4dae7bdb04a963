// ABOUTME: Configurable retry with jittered exponential backoff and named presets.
// ABOUTME: Grounded on the resilience layer described in spec.md §4.8 (resilience utilities).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Invoked after a failed attempt that will be retried, with the 1-based attempt
/// number just completed and the error rendered as text (the retrier is generic
/// over the caller's error type, so the hook can't see it typed).
pub type OnRetryHook = Arc<dyn Fn(u32, &str) + Send + Sync>;

#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_fraction: f64,
    pub on_retry: Option<OnRetryHook>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.2,
            on_retry: None,
        }
    }
}

impl RetryConfig {
    /// Tuned for external API calls: network/timeout errors, moderate backoff.
    pub fn api() -> Self {
        Self { max_attempts: 5, base_delay: Duration::from_millis(500), max_delay: Duration::from_secs(10), backoff_multiplier: 2.0, jitter_fraction: 0.25, on_retry: None }
    }

    /// Tuned for database contention (e.g. sqlite `SQLITE_BUSY`): fewer attempts,
    /// short delays.
    pub fn database() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(2), backoff_multiplier: 2.0, jitter_fraction: 0.1, on_retry: None }
    }

    /// Tuned for transient filesystem errors (e.g. a file mid-write by another
    /// process): few attempts, no jitter.
    pub fn file() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(1), backoff_multiplier: 2.0, jitter_fraction: 0.0, on_retry: None }
    }

    /// `min(max_delay, base_delay * multiplier^(attempt-1))`, then uniformly
    /// jittered by `± jitter_fraction`.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped = exp.min(self.max_delay.as_secs_f64());
        if self.jitter_fraction <= 0.0 {
            return Duration::from_secs_f64(capped.max(0.0));
        }
        let jitter_span = capped * self.jitter_fraction;
        let jitter = fastrand::f64() * jitter_span;
        Duration::from_secs_f64((capped - jitter_span / 2.0 + jitter).max(0.0))
    }

    fn notify_retry(&self, attempt: u32, message: &str) {
        if let Some(hook) = &self.on_retry {
            hook(attempt, message);
        }
    }
}

/// Retry a synchronous fallible operation, calling `should_retry` to decide whether
/// a given error is worth another attempt (e.g. distinguishing transient from
/// permanent failures via the error classifier).
pub fn retry<T, E, F>(config: &RetryConfig, should_retry: impl Fn(&E) -> bool, mut f: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= config.max_attempts || !should_retry(&e) {
                    return Err(e);
                }
                config.notify_retry(attempt, &e.to_string());
                std::thread::sleep(config.delay_for_attempt(attempt));
            }
        }
    }
}

/// Async variant of `retry`, sleeping on the tokio timer between attempts.
pub async fn retry_async<T, E, F, Fut>(config: &RetryConfig, should_retry: impl Fn(&E) -> bool, mut f: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match f(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= config.max_attempts || !should_retry(&e) {
                    return Err(e);
                }
                config.notify_retry(attempt, &e.to_string());
                tokio::time::sleep(config.delay_for_attempt(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn succeeds_without_retry_on_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(&RetryConfig::default(), |_| true, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(42)
        });
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn retries_up_to_max_attempts_then_gives_up() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_attempts: 3, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), jitter_fraction: 0.0, ..RetryConfig::default() };
        let result: Result<u32, &str> = retry(&config, |_| true, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Err("always fails")
        });
        assert_eq!(result, Err("always fails"));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(&RetryConfig::default(), |_| false, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Err("permanent")
        });
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), jitter_fraction: 0.0, ..RetryConfig::default() };
        let result: Result<u32, &str> = retry(&config, |_| true, |attempt| {
            calls.fetch_add(1, Ordering::Relaxed);
            if attempt < 2 {
                Err("transient")
            } else {
                Ok(7)
            }
        });
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn async_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), jitter_fraction: 0.0, ..RetryConfig::default() };
        let result: Result<u32, &str> = retry_async(&config, |_| true, |attempt| async move {
            calls.fetch_add(1, Ordering::Relaxed);
            if attempt < 1 {
                Err("transient")
            } else {
                Ok(9)
            }
        })
        .await;
        assert_eq!(result, Ok(9));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn delay_grows_by_the_configured_multiplier_without_jitter() {
        let config = RetryConfig { base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(10), backoff_multiplier: 2.0, jitter_fraction: 0.0, ..RetryConfig::default() };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let config = RetryConfig { base_delay: Duration::from_millis(100), max_delay: Duration::from_millis(150), backoff_multiplier: 2.0, jitter_fraction: 0.0, ..RetryConfig::default() };
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(150));
    }

    #[test]
    fn presets_match_the_documented_attempt_counts_and_initial_delays() {
        assert_eq!(RetryConfig::api().max_attempts, 5);
        assert_eq!(RetryConfig::api().base_delay, Duration::from_millis(500));
        assert_eq!(RetryConfig::database().max_attempts, 3);
        assert_eq!(RetryConfig::database().base_delay, Duration::from_millis(100));
        assert_eq!(RetryConfig::file().max_attempts, 3);
        assert_eq!(RetryConfig::file().jitter_fraction, 0.0);
    }

    #[test]
    fn on_retry_hook_fires_once_per_retried_attempt() {
        let fired = Arc::new(std::sync::Mutex::new(Vec::new()));
        let fired_clone = fired.clone();
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_fraction: 0.0,
            on_retry: Some(Arc::new(move |attempt, message| fired_clone.lock().unwrap().push((attempt, message.to_string())))),
            ..RetryConfig::default()
        };
        let calls = AtomicU32::new(0);
        let _: Result<u32, &str> = retry(&config, |_| true, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Err("boom")
        });
        assert_eq!(*fired.lock().unwrap(), vec![(1, "boom".to_string()), (2, "boom".to_string())]);
    }
}
