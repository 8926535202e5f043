use serde::{Deserialize, Serialize};

/// The `{ data, error }` shape returned by the database client instead of
/// failing outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>, E: Deserialize<'de>"))]
pub struct Envelope<T, E> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<E>,
}

impl<T, E> Envelope<T, E> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: E) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    /// A present `error` wins over any `data`; an empty envelope is a success
    /// with no payload.
    pub fn into_result(self) -> Result<Option<T>, E> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::Envelope;

    #[test]
    fn error_field_takes_precedence() {
        let envelope: Envelope<Value, Value> = serde_json::from_value(json!({
            "data": [{ "id": 1 }],
            "error": { "message": "rate limit" }
        }))
        .expect("envelope should deserialize");

        let err = envelope.into_result().expect_err("error should be surfaced");
        assert_eq!(err["message"], "rate limit");
    }

    #[test]
    fn null_error_is_success() {
        let envelope: Envelope<Vec<u32>, Value> =
            serde_json::from_value(json!({ "data": [1, 2, 3], "error": null }))
                .expect("envelope should deserialize");

        assert_eq!(envelope.into_result().ok(), Some(Some(vec![1, 2, 3])));
    }

    #[test]
    fn missing_fields_deserialize_as_empty_success() {
        let envelope: Envelope<Value, Value> =
            serde_json::from_value(json!({})).expect("envelope should deserialize");

        assert_eq!(envelope.into_result().ok(), Some(None));
    }
}
