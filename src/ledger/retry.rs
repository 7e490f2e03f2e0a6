//! Bounded exponential backoff for conflicting rating commits

use crate::config::app::RetrySettings;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// How often and how patiently a conflicting write is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }
}

/// Run `operation`, retrying only on [`LedgerError::Conflict`] with
/// exponential backoff until `policy.max_attempts` is exhausted.
///
/// `on_conflict` is invoked once per conflict observed.
///
/// [`LedgerError::Conflict`]: crate::error::LedgerError::Conflict
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    mut on_conflict: impl FnMut(),
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                on_conflict();
                if attempt >= policy.max_attempts {
                    error!("Giving up after {} conflicting attempts: {}", attempt, e);
                    return Err(e);
                }

                let delay = policy.backoff_for(attempt);
                warn!(
                    "Attempt {} hit a concurrent write: {}. Retrying in {:?}",
                    attempt, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
