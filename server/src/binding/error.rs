use thiserror::Error;

use tether_shared::PathError;

/// A leaf value couldn't be converted to the property's type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Can't convert {value} to {target} for '{segment}' in '{path}'")]
pub struct ConversionError {
    pub path: String,
    pub segment: String,
    pub target: &'static str,
    pub value: String,
}

/// Errors produced while applying a property path assignment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// Field name is not a valid property path
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    /// Root property is not declared on the component
    #[error("Component '{component}' has no property '{segment}' (path '{path}')")]
    UnknownProperty {
        component: &'static str,
        path: String,
        segment: String,
    },
    /// An intermediate segment names a field the value doesn't have
    #[error("No property '{segment}' in '{path}'")]
    NoSuchProperty { path: String, segment: String },
    /// List index past the end of the list
    #[error("Index {segment} is out of range for a list of {len} in '{path}'")]
    IndexOutOfRange {
        path: String,
        segment: String,
        len: usize,
    },
    /// An index was applied to something that isn't a list, or a field to something that is
    #[error("Segment '{segment}' can't be applied to the value in '{path}'")]
    NotIndexable { path: String, segment: String },
    /// Path ends on a value that can't be assigned as a whole
    #[error("'{segment}' in '{path}' is not a writable leaf property")]
    NotALeaf { path: String, segment: String },
    /// An action parameter is missing from the request
    #[error("Missing parameter '{name}'")]
    MissingParameter { name: String },
    /// Leaf conversion failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
