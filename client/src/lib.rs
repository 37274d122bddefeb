//! # Tether Client
//! Keeps the components of a server-rendered page in sync with
//! tether-server. The client is sans-IO: the host feeds it user input and the
//! time, sends the requests it returns and hands back the responses.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use tether_shared::{headers, ComponentId, OperationId, Scope, Trigger};
}

pub mod dom;

mod client;
mod client_config;
mod error;
mod events;
mod morph;
mod queue;
mod timer;

pub use client::{Client, OutgoingRequest};
pub use client_config::{AntiforgeryToken, ClientConfig};
pub use error::ClientError;
pub use events::{
    ClientEvent, ClientEvents, ErrorEvent, HistoryEntry, HistoryEvent, RedirectEvent, ScriptEvent,
    TriggerEvent,
};
pub use morph::{Morph, KeyedMorph, Update, Updating};
pub use queue::{QueueState, Ticket};
