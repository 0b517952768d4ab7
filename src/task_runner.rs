//! Periodic Task Runner with Backoff
//!
//! Runs one iteration of a background task per interval. Failed iterations
//! are retried with exponential backoff instead of taking the process down,
//! so the API keeps serving while the store is unreachable.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Backoff configuration for background tasks
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Consecutive failures after which every failure is logged as an error
    pub alert_after_failures: u32,
    /// Initial delay between retries
    pub initial_retry_delay: Duration,
    /// Maximum delay between retries
    pub max_retry_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            alert_after_failures: 5,
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BackoffState {
    consecutive_failures: u32,
    current_retry_delay: Duration,
}

impl BackoffState {
    fn new(initial_delay: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            current_retry_delay: initial_delay,
        }
    }

    /// Returns the delay to wait before the next attempt
    fn record_failure(&mut self, max_delay: Duration) -> Duration {
        self.consecutive_failures += 1;
        let delay = self.current_retry_delay;
        self.current_retry_delay = std::cmp::min(self.current_retry_delay * 2, max_delay);
        delay
    }

    fn reset(&mut self, initial_delay: Duration) {
        self.consecutive_failures = 0;
        self.current_retry_delay = initial_delay;
    }
}

/// Run `task_fn` every `interval` until the surrounding task is aborted.
///
/// # Arguments
/// * `task_name` - Name of the task for logging purposes
/// * `interval` - Pause after a successful iteration
/// * `config` - Backoff applied after failed iterations
/// * `task_fn` - Async function that executes one iteration of the task
pub async fn run_periodic<F, Fut, E>(
    task_name: &str,
    interval: Duration,
    config: BackoffConfig,
    mut task_fn: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut state = BackoffState::new(config.initial_retry_delay);
    info!("Task '{}' started, interval {:?}", task_name, interval);

    loop {
        match task_fn().await {
            Ok(()) => {
                if state.consecutive_failures > 0 {
                    info!(
                        "Task '{}' recovered after {} failures",
                        task_name, state.consecutive_failures
                    );
                }
                state.reset(config.initial_retry_delay);
                sleep(interval).await;
            }
            Err(e) => {
                let delay = state.record_failure(config.max_retry_delay);
                if state.consecutive_failures >= config.alert_after_failures {
                    error!(
                        "Task '{}' failing repeatedly ({} in a row): {}",
                        task_name, state.consecutive_failures, e
                    );
                } else {
                    warn!(
                        "Task '{}' failed (attempt {}): {}, retrying in {:?}",
                        task_name, state.consecutive_failures, e, delay
                    );
                }
                sleep(delay).await;
            }
        }
    }
}
