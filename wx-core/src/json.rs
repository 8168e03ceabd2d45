//! Fetching and shape-checking provider JSON.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::{DriverError, Result},
    transport::{Request, Transport, truncate_body},
};

/// Predicate telling whether a response looks like a success.
pub(crate) type Marker = fn(&Value) -> bool;

/// GET `request`, parse JSON, check the provider's success marker and decode.
///
/// `step` names the request in error messages.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    step: &'static str,
    request: &Request,
    marker: Marker,
) -> Result<T> {
    let body = transport.get(request).await.map_err(|e| {
        warn!(step, url = %request.url, error = %e, "request failed");
        DriverError::Transport { step, message: e.to_string() }
    })?;

    let value: Value = serde_json::from_str(&body).map_err(|e| {
        warn!(step, error = %e, body = %truncate_body(&body), "response is not JSON");
        DriverError::InvalidResponse { step, reason: format!("not valid JSON: {e}") }
    })?;

    if !marker(&value) {
        warn!(step, body = %truncate_body(&body), "success marker missing");
        return Err(DriverError::InvalidResponse {
            step,
            reason: "expected fields are missing".to_string(),
        });
    }

    debug!(step, "response accepted");
    serde_json::from_value(value)
        .map_err(|e| DriverError::InvalidResponse { step, reason: e.to_string() })
}

/// Present and not null, empty string or empty array.
pub(crate) fn present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

/// Accepts `"61"` and `61` alike.
pub(crate) fn code<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts numbers and numeric strings such as `"1013.2"`; anything else is absent.
pub(crate) fn number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Like [`number`] for arrays with holes (`[12.1, null, 13.0]`).
pub(crate) fn numbers<'de, D>(deserializer: D) -> std::result::Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect())
}

/// Like [`code`] for arrays.
pub(crate) fn codes<'de, D>(deserializer: D) -> std::result::Result<Vec<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}
