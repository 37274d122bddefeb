use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
};

use serde_json::{Map, Value};

use tether_shared::OperationId;

/// Identifies a request handed to the host until its response comes back
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub(crate) u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a component's requests stand
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    /// Requests are waiting for the next `poll`
    Queued,
    /// A request is out, the next one waits for its response
    InFlight,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum OperationKind {
    /// Sends the named fields only
    Bind { fields: BTreeSet<String> },
    Action {
        name: String,
        parameters: Map<String, Value>,
    },
    Event {
        name: String,
        subject: Option<String>,
        /// base64 JSON, forwarded as the server sent it
        data: String,
        path: String,
    },
}

/// One request's worth of work for a component
#[derive(Clone, Debug)]
pub(crate) struct Operation {
    pub(crate) id: OperationId,
    pub(crate) component: String,
    pub(crate) kind: OperationKind,
    pub(crate) client_event: Option<String>,
}

impl Operation {
    pub(crate) fn describe(&self) -> String {
        match &self.kind {
            OperationKind::Bind { .. } => "bind".to_string(),
            OperationKind::Action { name, .. } => format!("action '{name}'"),
            OperationKind::Event { name, .. } => format!("event '{name}'"),
        }
    }

    /// Whether the request sends the value of `field`
    pub(crate) fn carries(&self, field: &str) -> bool {
        match &self.kind {
            OperationKind::Bind { fields } => fields.contains(field),
            OperationKind::Action { .. } => true,
            OperationKind::Event { .. } => false,
        }
    }
}

/// Requests of one component, sent one at a time in order
#[derive(Debug, Default)]
pub(crate) struct ComponentQueue {
    pending: VecDeque<Operation>,
    in_flight: Option<Ticket>,
}

impl ComponentQueue {
    pub(crate) fn state(&self) -> QueueState {
        if self.in_flight.is_some() {
            QueueState::InFlight
        } else if self.pending.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Queued
        }
    }

    pub(crate) fn push(&mut self, operation: Operation) {
        self.pending.push_back(operation);
    }

    /// Whether an action with this name is already waiting
    pub(crate) fn has_pending_action(&self, action: &str) -> bool {
        self.pending.iter().any(|operation| {
            matches!(&operation.kind, OperationKind::Action { name, .. } if name == action)
        })
    }

    /// The next operation to send, if nothing is in flight
    pub(crate) fn next(&mut self) -> Option<Operation> {
        if self.in_flight.is_some() {
            return None;
        }
        self.pending.pop_front()
    }

    pub(crate) fn sent(&mut self, ticket: Ticket) {
        self.in_flight = Some(ticket);
    }

    pub(crate) fn completed(&mut self, ticket: Ticket) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
    }
}
