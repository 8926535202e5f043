use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backoff::retry_delay;
use crate::classify::{RetrySignal, is_retryable_error};
use crate::config::RetryConfig;
use crate::envelope::Envelope;
use crate::error::RetryError;

pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Backoff settings plus the decision of which failures deserve another try.
pub struct RetryOptions<E> {
    pub config: RetryConfig,
    retry_if: Option<RetryPredicate<E>>,
}

impl<E> RetryOptions<E> {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retry_if: None,
        }
    }

    /// Replaces the default transient-failure classifier.
    pub fn with_retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    pub(crate) fn should_retry(&self, error: &E) -> bool
    where
        E: RetrySignal,
    {
        match &self.retry_if {
            Some(predicate) => predicate(error),
            None => is_retryable_error(error),
        }
    }
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            retry_if: self.retry_if.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("config", &self.config)
            .field("custom_retry_if", &self.retry_if.is_some())
            .finish()
    }
}

/// How a retried call ended. Failures are reported here rather than returned
/// as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T, E> {
    pub data: Option<T>,
    pub error: Option<E>,
    /// First attempt included; never more than `max_retries + 1`.
    pub attempts: u32,
    /// Errors that triggered a retry, oldest first. The terminal error lives in
    /// `error` only.
    pub retried_errors: Vec<E>,
}

impl<T, E> RetryOutcome<T, E> {
    pub(crate) fn succeeded(data: T, attempts: u32, retried_errors: Vec<E>) -> Self {
        Self {
            data: Some(data),
            error: None,
            attempts,
            retried_errors,
        }
    }

    pub(crate) fn failed(error: E, attempts: u32, retried_errors: Vec<E>) -> Self {
        Self {
            data: None,
            error: Some(error),
            attempts,
            retried_errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Option<T>, E> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }

    /// Like [`RetryOutcome::into_result`], with the terminal error folded into
    /// a [`RetryError`] that records how many attempts were spent.
    pub fn into_retry_result(self) -> Result<Option<T>, RetryError>
    where
        E: RetrySignal,
    {
        let attempts = self.attempts;
        self.into_result()
            .map_err(|error| RetryError::Exhausted {
                attempts,
                message: error.message(),
            })
    }
}

impl<T, E> RetryOutcome<Option<T>, E> {
    pub(crate) fn flatten(self) -> RetryOutcome<T, E> {
        RetryOutcome {
            data: self.data.flatten(),
            error: self.error,
            attempts: self.attempts,
            retried_errors: self.retried_errors,
        }
    }
}

/// Runs `operation`, retrying transient failures with exponential backoff.
///
/// Returns as soon as the operation succeeds, the failure is not worth
/// retrying, or `max_retries` retries have been spent.
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    options: &RetryOptions<E>,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetrySignal,
{
    let max_retries = options.config.max_retries;
    let max_attempts = options.config.max_attempts();
    let mut retried_errors = Vec::new();
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(data) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "operation succeeded after retrying");
                }
                return RetryOutcome::succeeded(data, attempt + 1, retried_errors);
            }
            Err(err) => {
                if options.should_retry(&err) && attempt < max_retries {
                    let delay = retry_delay(attempt, &options.config);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "operation failed, retrying"
                    );
                    retried_errors.push(err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                debug!(
                    attempts = attempt + 1,
                    max_attempts,
                    error = %err,
                    "operation failed, giving up"
                );
                return RetryOutcome::failed(err, attempt + 1, retried_errors);
            }
        }
    }
}

/// [`with_retry`] for operations that resolve to a `{ data, error }`
/// envelope. An envelope error is retried exactly like an `Err`; on success
/// the envelope's `data` is returned.
pub async fn with_retry_envelope<F, Fut, T, E>(
    mut operation: F,
    options: &RetryOptions<E>,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Envelope<T, E>, E>>,
    E: RetrySignal,
{
    with_retry(
        || {
            let pending = operation();
            async move { pending.await.and_then(Envelope::into_result) }
        },
        options,
    )
    .await
    .flatten()
}
