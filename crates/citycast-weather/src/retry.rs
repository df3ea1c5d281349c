//! Retry utilities for weather requests with exponential backoff.
//!
//! Every failure is retried: a city the API does not know still goes through
//! the full backoff sequence, only the final message differs. Progress of the
//! most recently started sequence is published on a watch channel so a
//! display can show "retrying Paris (attempt 2/3)".

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first one
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
        }
    }
}

impl From<&citycast_core::RetryConfig> for RetryConfig {
    fn from(config: &citycast_core::RetryConfig) -> Self {
        Self::new(config.max_retries, config.initial_delay_ms)
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings
    pub fn new(max_retries: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
        }
    }

    /// Calculate the delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Exponential backoff: initial_delay * 2^attempt
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Which labelled sequence is currently retrying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryProgress {
    pub label: String,
    pub attempt: u32,
    pub max_retries: u32,
}

/// Runs async operations with backoff and exposes live retry progress.
///
/// Clones share the same progress channel.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    state: Arc<watch::Sender<Option<RetryProgress>>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            config,
            state: Arc::new(state),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Observe retry progress
    pub fn subscribe(&self) -> watch::Receiver<Option<RetryProgress>> {
        self.state.subscribe()
    }

    /// The sequence currently retrying, if any
    pub fn current(&self) -> Option<RetryProgress> {
        self.state.borrow().clone()
    }

    /// Execute `operation`, retrying failures up to `max_retries` times.
    ///
    /// Returns the first success or the last error once every attempt failed.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_retries = self.config.max_retries;
        let mut published: Option<RetryProgress> = None;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!("{}: request succeeded after {} retries", label, attempt);
                    }
                    self.clear(published.as_ref());
                    return Ok(value);
                }
                Err(e) if attempt < max_retries => {
                    tracing::warn!(
                        "{}: attempt {} of {} failed: {}",
                        label,
                        attempt + 1,
                        max_retries + 1,
                        e
                    );

                    let delay = self.config.delay_for_attempt(attempt);
                    attempt += 1;

                    let progress = RetryProgress {
                        label: label.to_string(),
                        attempt,
                        max_retries,
                    };
                    self.state.send_replace(Some(progress.clone()));
                    published = Some(progress);

                    tracing::info!(
                        "{}: retry attempt {} of {}, waiting {:?}",
                        label,
                        attempt,
                        max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "{}: all {} attempts exhausted: {}",
                        label,
                        max_retries + 1,
                        e
                    );
                    self.clear(published.as_ref());
                    return Err(e);
                }
            }
        }
    }

    /// Clear the published progress unless a newer sequence has replaced it
    fn clear(&self, ours: Option<&RetryProgress>) {
        let Some(ours) = ours else {
            return;
        };
        self.state.send_if_modified(|state| {
            if state.as_ref() == Some(ours) {
                *state = None;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_config_from_core_settings() {
        let core = citycast_core::RetryConfig {
            max_retries: 5,
            initial_delay_ms: 250,
        };
        let config = RetryConfig::from(&core);
        assert_eq!(config, RetryConfig::new(5, 250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_double_and_stop_after_fourth_failure() {
        let policy = RetryPolicy::default();
        let calls = parking_lot::Mutex::new(Vec::new());
        let start = Instant::now();

        let result: Result<(), String> = policy
            .run("Paris", || {
                calls.lock().push(start.elapsed());
                async { Err("boom".to_string()) }
            })
            .await;

        assert_eq!(result, Err("boom".to_string()));
        let calls = calls.into_inner();
        assert_eq!(
            calls,
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(3000),
                Duration::from_millis(7000),
            ]
        );
        assert_eq!(policy.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_does_not_publish() {
        let policy = RetryPolicy::default();
        let rx = policy.subscribe();

        let result: Result<u32, String> = policy.run("Oslo", || async { Ok(7) }).await;

        assert_eq!(result, Ok(7));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(policy.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_visible_while_retrying() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let task = {
            let policy = policy.clone();
            let attempts = attempts.clone();
            tokio::spawn(async move {
                policy
                    .run("Lima", || {
                        let n = attempts.fetch_add(1, Ordering::SeqCst);
                        async move {
                            if n < 2 {
                                Err(format!("failure {}", n))
                            } else {
                                Ok(n)
                            }
                        }
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            policy.current(),
            Some(RetryProgress {
                label: "Lima".to_string(),
                attempt: 1,
                max_retries: 3,
            })
        );

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(policy.current().map(|p| p.attempt), Some(2));

        assert_eq!(task.await.unwrap(), Ok(2));
        assert_eq!(policy.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishing_sequence_leaves_newer_progress_visible() {
        let policy = RetryPolicy::new(RetryConfig::new(3, 100));
        let first_calls = Arc::new(AtomicU32::new(0));

        let first = {
            let policy = policy.clone();
            let calls = first_calls.clone();
            tokio::spawn(async move {
                policy
                    .run("Rome", || {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        async move { if n == 0 { Err("down") } else { Ok(()) } }
                    })
                    .await
            })
        };

        let second = {
            let policy = policy.clone();
            tokio::spawn(async move {
                policy
                    .run("Cairo", || async { Err::<(), _>("down") })
                    .await
            })
        };

        // Rome retries once at t=100ms; Cairo keeps retrying until t=700ms
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(first.await.unwrap().is_ok());
        assert_eq!(policy.current().map(|p| p.label), Some("Cairo".to_string()));

        assert!(second.await.unwrap().is_err());
        assert_eq!(policy.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_fails_immediately() {
        let policy = RetryPolicy::new(RetryConfig::new(0, 1000));
        let start = Instant::now();

        let result: Result<(), &str> = policy.run("Quito", || async { Err("nope") }).await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
