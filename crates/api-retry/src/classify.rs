use std::fmt::Display;
use std::io;

use serde_json::Value;

/// Request timeout, too many requests, and the 5xx family that usually clears
/// up on its own.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Matched case-insensitively against the error message.
pub const RETRYABLE_MESSAGE_PATTERNS: [&str; 7] = [
    "network",
    "timeout",
    "econnreset",
    "econnrefused",
    "socket hang up",
    "fetch failed",
    "rate limit",
];

/// What the default classifier needs to know about a failure.
///
/// Only `Display` is required; the provided methods return "unknown" so a
/// plain error type falls back to message matching.
pub trait RetrySignal: Display {
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Machine-readable code, e.g. a PostgREST `PGRST116`.
    fn error_code(&self) -> Option<&str> {
        None
    }

    /// Set by client errors that know the request never got a response.
    fn is_transport_failure(&self) -> bool {
        false
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

pub fn is_retryable_error<E>(error: &E) -> bool
where
    E: RetrySignal + ?Sized,
{
    if error
        .status_code()
        .is_some_and(|status| RETRYABLE_STATUS_CODES.contains(&status))
    {
        return true;
    }
    if error.is_transport_failure() {
        return true;
    }

    let message = error.message().to_ascii_lowercase();
    RETRYABLE_MESSAGE_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

impl RetrySignal for String {}

impl RetrySignal for &'static str {}

impl RetrySignal for io::Error {
    fn is_transport_failure(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::TimedOut
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        )
    }
}

impl RetrySignal for reqwest::Error {
    fn status_code(&self) -> Option<u16> {
        self.status().map(|status| status.as_u16())
    }

    fn is_transport_failure(&self) -> bool {
        self.is_timeout() || self.is_connect()
    }
}

/// JSON error bodies, as returned inside `{ "data": ..., "error": {...} }`
/// responses.
impl RetrySignal for Value {
    fn status_code(&self) -> Option<u16> {
        ["status", "statusCode"]
            .iter()
            .find_map(|key| self.get(key))
            .and_then(json_status)
    }

    fn error_code(&self) -> Option<&str> {
        self.get("code").and_then(Value::as_str)
    }

    fn message(&self) -> String {
        match self {
            Value::String(message) => message.clone(),
            _ => self
                .get("message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .unwrap_or_else(|| self.to_string()),
        }
    }
}

fn json_status(value: &Value) -> Option<u16> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|raw| u16::try_from(raw).ok()),
        Value::String(raw) => raw.trim().parse::<u16>().ok(),
        _ => None,
    }
}
