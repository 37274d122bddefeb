mod descriptor;
mod error;
mod handler;
mod registry;

pub use descriptor::{ActionDescriptor, ComponentDescriptor};
pub use error::{ActionError, ComponentError, DescriptorError};
pub use handler::{Args, HandlerFuture};

pub(crate) use descriptor::SubscriptionHandler;
pub(crate) use handler::EventHandler;
pub(crate) use registry::{ComponentRuntime, Registry};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use tether_shared::PropertyPath;

use crate::{binding::WireValue, validation::ValidationReport, Context, ViewContext};

/// A server-rendered UI fragment whose declared state survives round trips.
///
/// A fresh instance is created with `Default` for every request, its declared
/// state restored from the client's token, and thrown away once the response
/// is written.
pub trait Component: Default + Send + 'static {
    /// Name used in endpoint routes and in the `tether-name` attribute
    const NAME: &'static str;

    /// Declares state, actions, subscriptions, rules and filters. Runs once,
    /// when the type is registered.
    fn describe(descriptor: &mut ComponentDescriptor<Self>);

    /// Produces the component's markup. Must have exactly one root element.
    fn view(&self, view: &mut ViewContext<'_>) -> Result<String, ComponentError>;

    /// Runs once when the component is first rendered, never on
    /// synchronization requests
    fn mount(&mut self, _ctx: &mut Context) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Runs before every render
    fn render(&mut self, _ctx: &mut Context) -> Result<(), ComponentError> {
        Ok(())
    }

    fn after_render(&mut self, _ctx: &mut Context, _first_render: bool) {}

    /// Returning `false` answers with `Tether-Skip-Output` instead of markup
    fn should_render(&self) -> bool {
        true
    }

    /// Runs after every successful property binding
    fn bind(
        &mut self,
        _ctx: &mut Context,
        _path: &PropertyPath,
        _value: &WireValue,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Adds validation failures beyond the declared rules
    fn validate(&self, _report: &mut ValidationReport) {}

    /// Handles an error raised while processing a request. The default turns
    /// it into a global [`UnhandledError`] event.
    fn handle_error(&mut self, ctx: &mut Context, error: &ComponentError) {
        let message = ctx.user_safe_message(error);
        let event = UnhandledError {
            message,
            data: None,
        };
        if let Err(err) = ctx.dispatch_global(event, None) {
            log::warn!("Failed to dispatch UnhandledError: {err}");
        }
    }
}

/// An event components can dispatch and subscribe to
pub trait Event: Serialize + DeserializeOwned + Send + 'static {
    const NAME: &'static str;
}

/// Assigns a property, subscribed by every component type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bind {
    pub name: String,
    pub value: Value,
}

impl Event for Bind {
    const NAME: &'static str = "Bind";
}

/// Dispatched globally when a request fails with an unhandled error
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnhandledError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Event for UnhandledError {
    const NAME: &'static str = "UnhandledError";
}
