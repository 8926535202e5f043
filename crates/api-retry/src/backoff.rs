use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

const MAX_JITTER_FRACTION: f64 = 0.5;

/// Unjittered delay before retry number `attempt + 1`, in milliseconds.
///
/// `attempt` is 0-based: the delay after the first failure uses `attempt = 0`.
pub fn base_delay_ms(attempt: u32, config: &RetryConfig) -> f64 {
    let initial = config.initial_delay();
    // 0 * inf is NaN once factor^attempt overflows.
    if initial.is_zero() {
        return 0.0;
    }
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let scaled = initial.as_millis() as f64 * config.factor.powi(exponent);
    scaled.min(config.max_delay().as_millis() as f64)
}

/// Stretches `base_ms` by `sample * base_ms`; `sample` is expected in `[0, 0.5)`.
pub fn apply_jitter(base_ms: f64, sample: f64) -> f64 {
    base_ms + sample * base_ms
}

pub fn retry_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = base_delay_ms(attempt, config);
    let delay_ms = if config.jitter {
        apply_jitter(base_ms, rand::rng().random_range(0.0..MAX_JITTER_FRACTION))
    } else {
        base_ms
    };

    Duration::from_millis(whole_millis(delay_ms))
}

fn whole_millis(delay_ms: f64) -> u64 {
    if delay_ms.is_finite() && delay_ms > 0.0 {
        delay_ms.floor() as u64
    } else {
        0
    }
}
