use thiserror::Error;

/// Errors produced while opening a state token or protected value.
///
/// Every variant means the token is rejected as a whole; nothing is ever
/// partially decoded.
#[derive(Debug, Error)]
pub enum StateTokenError {
    /// Token is not valid url-safe base64
    #[error("State token is not valid base64: {reason}")]
    NotBase64 { reason: String },
    /// Token is shorter than a version byte plus a MAC
    #[error("State token is {length} bytes, too short to hold a version and a MAC")]
    TooShort { length: usize },
    /// MAC does not match the contents, the token was forged, modified or sealed with another secret
    #[error("State token failed its integrity check")]
    IntegrityCheckFailed,
    /// Version byte is not one this codec knows how to read
    #[error("State token has unknown version {version}")]
    UnknownVersion { version: u8 },
    /// Token payload is compressed and this build can't decompress it
    #[error("State token is compressed but zstd support is not enabled")]
    CompressionUnsupported,
    /// Compressing or decompressing the payload failed
    #[error("State token compression failed: {reason}")]
    Compression { reason: String },
    /// Payload is not a JSON object of the expected shape
    #[error("State token payload is not a valid state object: {reason}")]
    InvalidPayload { reason: String },
}
