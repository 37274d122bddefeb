use serde_json::Value;

use tether_shared::{ComponentId, OperationId, Scope, Trigger};

/// An event dispatched during a request, waiting to be written into the
/// `Tether-Trigger` header
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OutboundEvent {
    pub(crate) name: &'static str,
    pub(crate) data: Value,
    pub(crate) scope: Scope,
    pub(crate) subject: Option<String>,
    pub(crate) operation_id: OperationId,
    /// Receiving component of a [`Scope::Parent`] event
    pub(crate) target: Option<ComponentId>,
}

impl OutboundEvent {
    pub(crate) fn to_trigger(&self) -> Trigger {
        Trigger {
            name: self.name.to_string(),
            data: Trigger::encode_data(&self.data),
            scope: self.scope,
            subject: self.subject.clone(),
            operation_id: self.operation_id.clone(),
            target: self.target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn trigger_carries_base64_data() {
        let event = OutboundEvent {
            name: "Saved",
            data: json!({ "id": 3 }),
            scope: Scope::Global,
            subject: Some("orders".into()),
            operation_id: OperationId::new("op-1"),
            target: None,
        };
        let trigger = event.to_trigger();
        assert_eq!(trigger.name, "Saved");
        assert_eq!(trigger.data_value().unwrap(), json!({ "id": 3 }));
        assert_eq!(trigger.subject.as_deref(), Some("orders"));
        assert_eq!(trigger.operation_id.as_str(), "op-1");
    }
}
