use thiserror::Error;

use tether_shared::{html::HtmlError, ProtocolError};

/// Errors a Client reports, either returned from a call or surfaced through
/// [`ErrorEvent`](crate::ErrorEvent)
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered a request with a failure status
    #[error("{message}")]
    RequestFailed { status: u16, message: String },
    /// The server refused the request with 403
    #[error("Unauthorized access")]
    Unauthorized,
    /// A boosted navigation failed, the host should load `url` itself
    #[error("Navigation to '{url}' failed with status {status}")]
    NavigationFailed { url: String, status: u16 },
    /// No component with this id is on the page
    #[error("No component with id '{id}' is on the page")]
    UnknownComponent { id: String },
    /// No element matches the target of a navigation
    #[error("No element matches navigation target '{selector}'")]
    MissingTarget { selector: String },
    /// A component root is missing its `tether-name` or state token
    #[error("Component '{id}' is missing its {what}")]
    MalformedComponent { id: String, what: &'static str },
    /// The server sent markup that couldn't be read
    #[error(transparent)]
    Markup(#[from] HtmlError),
    /// A response header couldn't be read
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A request couldn't be built
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },
}
