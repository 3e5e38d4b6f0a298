use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("{0}")]
    Rejected(String),
    #[error("response envelope carried no data")]
    MissingData,
    #[error("unexpected payload: {0}")]
    Decode(String),
}

/// A body counts as an envelope only when it is an object with a boolean `success`.
fn is_envelope(body: &Value) -> bool {
    body.as_object()
        .and_then(|object| object.get("success"))
        .is_some_and(Value::is_boolean)
}

fn open(body: Value) -> Result<Option<Value>, EnvelopeError> {
    if !is_envelope(&body) {
        return Ok(Some(body));
    }

    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message =
            extract_error_message(&body).unwrap_or_else(|| "request was not successful".to_string());
        return Err(EnvelopeError::Rejected(message));
    }

    match body {
        Value::Object(mut object) => match object.remove("data") {
            None | Some(Value::Null) => Ok(None),
            Some(data) => Ok(Some(data)),
        },
        _ => Ok(None),
    }
}

/// Accepts either a bare payload or `{success, data, message}` and returns the payload.
pub fn unwrap_payload<T: DeserializeOwned>(body: Value) -> Result<T, EnvelopeError> {
    let data = open(body)?.ok_or(EnvelopeError::MissingData)?;
    serde_json::from_value(data).map_err(|err| EnvelopeError::Decode(err.to_string()))
}

/// Like [`unwrap_payload`], but `null` (bare or as envelope data) means "nothing yet".
pub fn unwrap_optional_payload<T: DeserializeOwned>(body: Value) -> Result<Option<T>, EnvelopeError> {
    match open(body)? {
        None | Some(Value::Null) => Ok(None),
        Some(data) => {
            serde_json::from_value(data).map(Some).map_err(|err| EnvelopeError::Decode(err.to_string()))
        }
    }
}

/// Best human-readable message in an error body: `detail`, then `message`, then `error`.
pub fn extract_error_message(payload: &Value) -> Option<String> {
    if let Some(detail) = payload.get("detail") {
        if let Some(text) = detail.as_str().filter(|text| !text.trim().is_empty()) {
            return Some(text.to_string());
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .or_else(|| item.get("message").and_then(Value::as_str))
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .map(ToString::to_string)
}
