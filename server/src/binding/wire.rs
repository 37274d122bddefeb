use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A file handed over by the transport for a file input
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A raw value as it arrives from the client
#[derive(Clone, Debug, PartialEq)]
pub enum WireValue {
    /// Single form field
    Text(String),
    /// Repeated form field
    Many(Vec<String>),
    /// Value from a JSON source (action parameters, bind events)
    Json(Value),
    /// Files selected in a file input, possibly none
    Files(Vec<UploadedFile>),
    Null,
}

impl WireValue {
    /// Whether this is an empty selection: no value, no files, no items
    pub fn is_empty(&self) -> bool {
        match self {
            WireValue::Text(text) => text.is_empty(),
            WireValue::Many(items) => items.is_empty(),
            WireValue::Json(Value::Null) | WireValue::Null => true,
            WireValue::Json(_) => false,
            WireValue::Files(files) => files.is_empty(),
        }
    }

    /// Splits a multi-value into its items
    pub(crate) fn items(&self) -> Vec<WireValue> {
        match self {
            WireValue::Text(text) => vec![WireValue::Text(text.clone())],
            WireValue::Many(items) => items.iter().cloned().map(WireValue::Text).collect(),
            WireValue::Json(Value::Array(items)) => {
                items.iter().cloned().map(WireValue::Json).collect()
            }
            WireValue::Json(Value::Null) | WireValue::Null => Vec::new(),
            WireValue::Json(value) => vec![WireValue::Json(value.clone())],
            WireValue::Files(files) => files
                .iter()
                .map(|file| WireValue::Files(vec![file.clone()]))
                .collect(),
        }
    }

    /// Short description for error messages, never the full payload
    pub(crate) fn describe(&self) -> String {
        fn clip(text: &str) -> String {
            let mut clipped: String = text.chars().take(40).collect();
            if clipped.len() < text.len() {
                clipped.push('…');
            }
            format!("'{clipped}'")
        }
        match self {
            WireValue::Text(text) => clip(text),
            WireValue::Many(items) => format!("{} values", items.len()),
            WireValue::Json(value) => clip(&value.to_string()),
            WireValue::Files(files) => format!("{} files", files.len()),
            WireValue::Null => "null".to_string(),
        }
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        WireValue::Json(value)
    }
}

impl From<&str> for WireValue {
    fn from(text: &str) -> Self {
        WireValue::Text(text.to_string())
    }
}
