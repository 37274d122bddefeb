//! # Tether Shared
//! Common functionality shared between tether-server & tether-client crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub mod html;
pub mod protocol;

mod codec;
mod error;
mod identity;
mod operation;
mod path;

pub use codec::{
    CodecConfig, ComponentState, CompressionMode, StateCodec, StateMap, StateToken,
    StateTokenError,
};
pub use error::{IdentityError, PathError};
pub use identity::{derive_id, is_already_rendered, placeholder, ComponentId};
pub use operation::OperationId;
pub use path::{PropertyPath, Segment};
pub use protocol::{headers, EventSubscription, Location, ProtocolError, Scope, Trigger};
