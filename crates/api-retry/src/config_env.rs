use std::str::FromStr;

use crate::config::RetryConfigError;

/// Reads typed settings through `lookup`, usually `std::env::var`.
///
/// Unset and blank values fall back to the supplied default.
pub(crate) struct EnvReader<L> {
    lookup: L,
}

impl<L> EnvReader<L>
where
    L: Fn(&str) -> Option<String>,
{
    pub(crate) fn new(lookup: L) -> Self {
        Self { lookup }
    }

    fn value(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|raw| raw.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn integer<T: FromStr>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, RetryConfigError> {
        self.parsed(key, default, |value| value.parse().ok(), |key, value| {
            RetryConfigError::ParseInt { key, value }
        })
    }

    pub(crate) fn float(&self, key: &str, default: f64) -> Result<f64, RetryConfigError> {
        self.parsed(key, default, |value| value.parse().ok(), |key, value| {
            RetryConfigError::ParseFloat { key, value }
        })
    }

    pub(crate) fn flag(&self, key: &str, default: bool) -> Result<bool, RetryConfigError> {
        self.parsed(key, default, parse_bool, |key, value| {
            RetryConfigError::ParseBool { key, value }
        })
    }

    fn parsed<T>(
        &self,
        key: &str,
        default: T,
        parse: impl FnOnce(&str) -> Option<T>,
        invalid: impl FnOnce(String, String) -> RetryConfigError,
    ) -> Result<T, RetryConfigError> {
        let Some(value) = self.value(key) else {
            return Ok(default);
        };
        parse(&value).ok_or_else(|| invalid(key.to_string(), value))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
