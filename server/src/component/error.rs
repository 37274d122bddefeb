use thiserror::Error;

use tether_shared::{html::HtmlError, ProtocolError, StateTokenError};

use crate::binding::BindingError;

/// Errors produced while registering a component type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Two state properties share a name
    #[error("Component '{component}' declares property '{name}' more than once")]
    DuplicateProperty {
        component: &'static str,
        name: &'static str,
    },
    /// Two actions share a name and the same parameter names
    #[error("Component '{component}' declares action '{name}' with the same parameters more than once")]
    DuplicateAction {
        component: &'static str,
        name: &'static str,
    },
    /// A polled action takes parameters, the poller has none to give it
    #[error("Polled action '{name}' on component '{component}' must not take parameters")]
    PollWithParameters {
        component: &'static str,
        name: &'static str,
    },
    /// A polled action has a zero interval
    #[error("Polled action '{name}' on component '{component}' needs an interval above zero")]
    ZeroPollInterval {
        component: &'static str,
        name: &'static str,
    },
    /// Two registered types share a name
    #[error("A component named '{component}' is already registered")]
    DuplicateComponent { component: &'static str },
    /// Name can't be used in a route
    #[error("Component name '{component}' must be non-empty and contain only letters, digits, '-' and '_'")]
    InvalidName { component: &'static str },
}

/// An action request that doesn't match any declared action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// No action with that name (case-insensitive)
    #[error("Component '{component}' has no action '{action}'")]
    NotFound {
        component: &'static str,
        action: String,
    },
    /// An action with that name exists but not with these parameters
    #[error("Wrong action parameters for '{action}' on component '{component}'")]
    WrongParameters {
        component: &'static str,
        action: String,
        received: Vec<String>,
    },
}

/// Errors raised by component code or while rendering a component
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Application error raised by a hook or handler
    #[error("{message}")]
    Failed { message: String },
    /// A property binding or action parameter failed
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// Declared state couldn't be serialized or deserialized
    #[error("Serialization failed for '{what}': {reason}")]
    Serialization { what: String, reason: String },
    /// Parameters passed on mount don't fit the component
    #[error("Invalid parameter '{name}' for component '{component}': {reason}")]
    InvalidParameter {
        component: &'static str,
        name: String,
        reason: String,
    },
    /// State token couldn't be produced
    #[error(transparent)]
    StateToken(#[from] StateTokenError),
    /// Markup returned by `view` is unusable
    #[error("Markup of component '{component}' is invalid: {source}")]
    Markup {
        component: &'static str,
        source: HtmlError,
    },
    /// A request header the component reads is malformed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A nested component type was never registered
    #[error("Component type '{type_name}' is not registered")]
    NotRegistered { type_name: &'static str },
    /// A cache slot holds a value of a different type than requested
    #[error("Cache entry '{key}' holds a value of another type")]
    CacheTypeMismatch { key: String },
    /// Component code panicked
    #[error("Component panicked: {message}")]
    Panicked { message: String },
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        ComponentError::Failed {
            message: message.into(),
        }
    }

    pub(crate) fn serialization(what: impl Into<String>, error: serde_json::Error) -> Self {
        ComponentError::Serialization {
            what: what.into(),
            reason: error.to_string(),
        }
    }
}
