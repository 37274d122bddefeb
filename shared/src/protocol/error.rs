use thiserror::Error;

/// Errors produced while reading or writing protocol headers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Header carries JSON that doesn't match the expected shape
    #[error("Header '{header}' is not valid JSON for its type: {reason}")]
    InvalidJson { header: &'static str, reason: String },
    /// Event data is not valid base64
    #[error("Event data is not valid base64: {reason}")]
    InvalidEventData { reason: String },
    /// A value can't be represented as an HTTP header value
    #[error("Value for header '{header}' contains characters not allowed in a header")]
    InvalidHeaderValue { header: &'static str },
}
