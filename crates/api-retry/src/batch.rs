use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::join_all;
use tracing::{error, info};

use crate::classify::RetrySignal;
use crate::config::BatchConfig;
use crate::envelope::Envelope;
use crate::error::RetryError;
use crate::executor::{RetryOptions, RetryOutcome, with_retry};

#[derive(Debug)]
pub struct BatchOptions<E> {
    pub retry: RetryOptions<E>,
    /// Items started together; the next chunk waits for the whole chunk.
    pub concurrency: usize,
}

impl<E> BatchOptions<E> {
    pub fn new(retry: RetryOptions<E>, concurrency: usize) -> Self {
        Self { retry, concurrency }
    }

    pub fn from_config(config: BatchConfig) -> Self {
        Self::new(RetryOptions::new(config.retry), config.concurrency)
    }
}

impl<E> Default for BatchOptions<E> {
    fn default() -> Self {
        Self::from_config(BatchConfig::default())
    }
}

impl<E> Clone for BatchOptions<E> {
    fn clone(&self) -> Self {
        Self::new(self.retry.clone(), self.concurrency)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry<I, R, E> {
    pub item: I,
    pub outcome: RetryOutcome<R, E>,
}

impl<I, R, E> BatchEntry<I, R, E> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items that needed more than one attempt, whatever their final result.
    pub retried_items: usize,
}

pub fn summarize<I, R, E>(entries: &[BatchEntry<I, R, E>]) -> BatchSummary {
    entries
        .iter()
        .fold(BatchSummary::default(), |mut summary, entry| {
            summary.total += 1;
            if entry.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if entry.outcome.attempts > 1 {
                summary.retried_items += 1;
            }
            summary
        })
}

/// Applies [`with_retry`] to every item, `concurrency` items at a time.
///
/// Items are split into contiguous chunks; a chunk runs concurrently and must
/// fully settle before the next one starts. Entries come back in input order.
/// A panic inside one item's operation is reported as that item's failure
/// with a single attempt.
pub async fn batch_with_retry<I, F, Fut, R, E>(
    items: Vec<I>,
    operation: F,
    options: &BatchOptions<E>,
) -> Vec<BatchEntry<I, R, E>>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: RetrySignal + From<RetryError>,
{
    let concurrency = options.concurrency.max(1);
    let mut entries = Vec::with_capacity(items.len());
    let mut pending = items.into_iter().peekable();

    while pending.peek().is_some() {
        let chunk = pending.by_ref().take(concurrency).collect::<Vec<_>>();
        let settled = join_all(
            chunk
                .into_iter()
                .map(|item| run_item(item, &operation, &options.retry)),
        )
        .await;
        entries.extend(settled);
    }

    let summary = summarize(&entries);
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        retried_items = summary.retried_items,
        concurrency,
        "batch finished"
    );
    entries
}

/// [`batch_with_retry`] for operations that resolve to a `{ data, error }`
/// envelope.
pub async fn batch_with_retry_envelope<I, F, Fut, T, E>(
    items: Vec<I>,
    operation: F,
    options: &BatchOptions<E>,
) -> Vec<BatchEntry<I, T, E>>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<Envelope<T, E>, E>>,
    E: RetrySignal + From<RetryError>,
{
    let entries = batch_with_retry(
        items,
        |item| {
            let pending = operation(item);
            async move { pending.await.and_then(Envelope::into_result) }
        },
        options,
    )
    .await;

    entries
        .into_iter()
        .map(|entry| BatchEntry {
            item: entry.item,
            outcome: entry.outcome.flatten(),
        })
        .collect()
}

async fn run_item<I, F, Fut, R, E>(
    item: I,
    operation: &F,
    options: &RetryOptions<E>,
) -> BatchEntry<I, R, E>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: RetrySignal + From<RetryError>,
{
    let settled = AssertUnwindSafe(with_retry(|| operation(item.clone()), options))
        .catch_unwind()
        .await;

    let outcome = match settled {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "batch item panicked");
            RetryOutcome::failed(E::from(RetryError::Panicked(message)), 1, Vec::new())
        }
    };

    BatchEntry { item, outcome }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::panic_any;

    use super::{BatchEntry, panic_message, summarize};
    use crate::error::OperationError;
    use crate::executor::RetryOutcome;

    #[test]
    fn panic_messages_are_extracted_from_common_payloads() {
        let payload = std::panic::catch_unwind(|| {
            panic_any("static message");
        })
        .expect_err("closure should panic");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = std::panic::catch_unwind(|| {
            panic_any(String::from("owned message"));
        })
        .expect_err("closure should panic");
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload = std::panic::catch_unwind(|| {
            panic_any(7_u8);
        })
        .expect_err("closure should panic");
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn summary_counts_successes_failures_and_retries() {
        let entries: Vec<BatchEntry<u32, u32, OperationError>> = vec![
            BatchEntry {
                item: 1,
                outcome: RetryOutcome::succeeded(10, 1, Vec::new()),
            },
            BatchEntry {
                item: 2,
                outcome: RetryOutcome::succeeded(
                    20,
                    2,
                    vec![OperationError::new("timeout").with_status(504)],
                ),
            },
            BatchEntry {
                item: 3,
                outcome: RetryOutcome::failed(OperationError::new("bad request"), 1, Vec::new()),
            },
        ];

        let summary = summarize(&entries);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retried_items, 1);
    }
}
