use http::StatusCode;
use thiserror::Error;

use tether_shared::{ProtocolError, StateTokenError};

use crate::{
    component::{ActionError, ComponentError, DescriptorError},
    envelope::EnvelopeError,
};

/// Errors the server answers a request with, or returns to the host
#[derive(Debug, Error)]
pub enum TetherServerError {
    /// The path isn't a component endpoint
    #[error("No component endpoint at '{path}'")]
    NotFound { path: String },
    /// The route names a component that was never registered
    #[error("No component named '{name}' is registered")]
    UnknownComponent { name: String },
    /// The synchronization request is malformed
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The prior state token was rejected
    #[error(transparent)]
    StateToken(#[from] StateTokenError),
    /// The action doesn't exist or was called with other parameters
    #[error(transparent)]
    InvalidActionCall(#[from] ActionError),
    /// An authorization filter rejected the request
    #[error("Request to component '{component}' was not authorized")]
    AuthorizationDenied { component: &'static str },
    /// A component type couldn't be registered
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// Component code failed outside of a synchronization request
    #[error(transparent)]
    Component(#[from] ComponentError),
    /// A response header couldn't be written
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A page render asked for a type that was never registered
    #[error("Component type '{type_name}' is not registered")]
    NotRegistered { type_name: &'static str },
}

impl TetherServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            TetherServerError::NotFound { .. } | TetherServerError::UnknownComponent { .. } => {
                StatusCode::NOT_FOUND
            }
            TetherServerError::Envelope(_) | TetherServerError::StateToken(_) => {
                StatusCode::BAD_REQUEST
            }
            TetherServerError::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
            TetherServerError::InvalidActionCall(_)
            | TetherServerError::Descriptor(_)
            | TetherServerError::Component(_)
            | TetherServerError::Protocol(_)
            | TetherServerError::NotRegistered { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
