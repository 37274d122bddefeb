pub mod headers;

mod error;
mod location;
mod trigger;

pub use error::ProtocolError;
pub use location::Location;
pub use trigger::{EventSubscription, Scope, Trigger};

use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a JSON error response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Body sent along with `Refresh-Antiforgery-Token`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiforgeryRefresh {
    pub token: String,
}

/// Reads a header as UTF-8.
///
/// Header values may carry non-ASCII UTF-8 (event subjects, parameters), so
/// this deliberately doesn't go through `HeaderValue::to_str`.
pub fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
}

/// Reads a header and parses it as JSON of type `T`
pub fn header_json<T: serde::de::DeserializeOwned>(
    headers: &HeaderMap,
    name: &'static str,
) -> Result<Option<T>, ProtocolError> {
    match header_str(headers, name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|err| ProtocolError::InvalidJson {
                header: name,
                reason: err.to_string(),
            }),
    }
}

pub fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ProtocolError> {
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|_| ProtocolError::InvalidHeaderValue { header: name })
}

pub fn json_header_value<T: Serialize>(
    name: &'static str,
    value: &T,
) -> Result<HeaderValue, ProtocolError> {
    let json = serde_json::to_string(value).map_err(|err| ProtocolError::InvalidJson {
        header: name,
        reason: err.to_string(),
    })?;
    header_value(name, &json)
}

/// Whether a boolean protocol header is set
pub fn header_flag(headers: &HeaderMap, name: &str) -> bool {
    header_str(headers, name).is_some_and(|value| value.eq_ignore_ascii_case(headers::TRUE))
}
