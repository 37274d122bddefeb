use thiserror::Error;

/// Errors produced when reading a component id sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Id does not start with the `W` prefix
    #[error("Component id '{raw}' does not start with 'W'")]
    MissingPrefix { raw: String },
    /// Id has the wrong number of hex digits
    #[error("Component id '{raw}' has {length} hex digits, expected 32")]
    WrongLength { raw: String, length: usize },
    /// Id contains characters other than upper-case hex digits
    #[error("Component id '{raw}' contains characters other than upper-case hex digits")]
    NotHex { raw: String },
}

/// Errors produced when parsing a property path such as `items[2].name`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Path is empty or has an empty segment (`a..b`, `.a`)
    #[error("Property path '{path}' has an empty segment")]
    EmptySegment { path: String },
    /// A segment contains characters that can't appear in a property name
    #[error("Property path segment '{segment}' is not a valid property name")]
    InvalidName { segment: String },
    /// An index is not a non-negative integer or its bracket is unclosed
    #[error("Property path segment '{segment}' has a malformed index")]
    MalformedIndex { segment: String },
}
