//! # Tether Server
//! Renders stateful UI components and answers the synchronization requests
//! tether-client sends as users interact with them. Component state travels
//! with the client in a signed token, so the server keeps nothing between
//! requests besides explicit application caches.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use tether_shared::{
        derive_id, headers, CodecConfig, ComponentId, CompressionMode, EventSubscription,
        Location, OperationId, PropertyPath, Scope, Segment, StateCodec, Trigger,
    };
}

mod antiforgery;
mod authorization;
mod binding;
mod component;
mod context;
mod envelope;
mod error;
mod events;
mod pipeline;
mod render;
mod server;
mod validation;

pub use antiforgery::{AntiforgeryConfig, AntiforgeryValidator, SignedTokens};
pub use authorization::{AuthorizationFilter, RequestInfo};
pub use binding::{
    BindCx, Bindable, BindingError, ConversionError, Converters, FromWire, UploadedFile, WireValue,
};
pub use component::{
    ActionDescriptor, ActionError, Args, Bind, Component, ComponentDescriptor, ComponentError,
    DescriptorError, Event, HandlerFuture, UnhandledError,
};
pub use context::{CacheLifetime, Cached, Context, CookieOptions, CookieStorage};
pub use envelope::{Envelope, EnvelopeError, RequestKind, Route};
pub use error::TetherServerError;
pub use render::ViewContext;
pub use server::{PageFragment, Server, ServerConfig};
pub use validation::{
    Rule, ValidationError, ValidationFailure, ValidationOutcome, ValidationReport,
};
