use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Soft navigation requested by a component, carried in `Tether-Location`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    /// Selector of the element whose content is replaced, `body` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Sent back to the server as `Tether-Payload` on the navigation request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: None,
            payload: None,
        }
    }
}
