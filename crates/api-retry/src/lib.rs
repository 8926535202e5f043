//! Retry helpers for calls into the hosted database client and other remote
//! APIs: exponential backoff with jitter, a transient-failure classifier, and
//! a chunked batch runner with bounded concurrency.

pub mod backoff;
pub mod batch;
pub mod classify;
pub mod config;
mod config_env;
pub mod envelope;
pub mod error;
pub mod executor;

pub use backoff::{apply_jitter, base_delay_ms, retry_delay};
pub use batch::{
    BatchEntry, BatchOptions, BatchSummary, batch_with_retry, batch_with_retry_envelope, summarize,
};
pub use classify::{
    RETRYABLE_MESSAGE_PATTERNS, RETRYABLE_STATUS_CODES, RetrySignal, is_retryable_error,
};
pub use config::{BatchConfig, RetryConfig, RetryConfigError};
pub use envelope::Envelope;
pub use error::{OperationError, RetryError, VersionConflictError, is_version_conflict};
pub use executor::{RetryOptions, RetryOutcome, RetryPredicate, with_retry, with_retry_envelope};
