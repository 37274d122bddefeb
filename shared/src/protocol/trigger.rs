use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProtocolError;
use crate::{ComponentId, OperationId};

/// Who receives an outbound event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only the component that rendered the dispatcher
    Parent,
    /// Every subscriber on the page
    Global,
}

/// An outbound event as carried in the `Tether-Trigger` header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub name: String,
    /// base64 of the JSON event data
    pub data: String,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub operation_id: OperationId,
    /// Receiving component for [`Scope::Parent`] events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ComponentId>,
}

impl Trigger {
    pub fn encode_data(data: &Value) -> String {
        base64::encode(data.to_string())
    }

    pub fn decode_data(encoded: &str) -> Result<Value, ProtocolError> {
        let bytes = base64::decode(encoded).map_err(|err| ProtocolError::InvalidEventData {
            reason: err.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|err| ProtocolError::InvalidEventData {
            reason: err.to_string(),
        })
    }

    pub fn data_value(&self) -> Result<Value, ProtocolError> {
        Self::decode_data(&self.data)
    }
}

/// A subscription as advertised to the client inside a component's markup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Endpoint the client posts the event to
    pub path: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn triggers_use_the_wire_field_names() {
        let trigger = Trigger {
            name: "ItemAdded".into(),
            data: Trigger::encode_data(&json!({"id": 4})),
            scope: Scope::Global,
            subject: None,
            operation_id: OperationId::from("op-1"),
            target: None,
        };
        let json = serde_json::to_value(vec![trigger.clone()]).unwrap();
        assert_eq!(json[0]["scope"], "global");
        assert_eq!(json[0]["operationId"], "op-1");
        assert!(json[0].get("target").is_none());

        let back: Vec<Trigger> = serde_json::from_value(json).unwrap();
        assert_eq!(back[0].data_value().unwrap(), json!({"id": 4}));
    }

    #[test]
    fn bad_event_data_is_an_error() {
        assert!(Trigger::decode_data("%%%").is_err());
        assert!(Trigger::decode_data(&base64::encode("{oops")).is_err());
    }
}
