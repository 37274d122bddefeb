use std::vec::IntoIter;

use tether_shared::Trigger;

use crate::ClientError;

/// An entry the host should push onto the browser history
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub url: String,
    pub title: Option<String>,
}

/// What happened during calls into a Client that the host has to act on
pub struct ClientEvents {
    errors: Vec<ClientError>,
    scripts: Vec<String>,
    redirects: Vec<String>,
    history: Vec<HistoryEntry>,
    triggers: Vec<Trigger>,
    empty: bool,
}

impl Default for ClientEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientEvents {
    pub(crate) fn new() -> Self {
        Self {
            errors: Vec::new(),
            scripts: Vec::new(),
            redirects: Vec::new(),
            history: Vec::new(),
            triggers: Vec::new(),
            empty: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: ClientEvent>(&mut self) -> V::Iter {
        return V::iter(self);
    }

    pub fn has<V: ClientEvent>(&self) -> bool {
        return V::has(self);
    }

    pub(crate) fn push_error(&mut self, error: ClientError) {
        self.errors.push(error);
        self.empty = false;
    }

    pub(crate) fn push_script(&mut self, script: String) {
        self.scripts.push(script);
        self.empty = false;
    }

    pub(crate) fn push_redirect(&mut self, url: String) {
        self.redirects.push(url);
        self.empty = false;
    }

    pub(crate) fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        self.empty = false;
    }

    pub(crate) fn push_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
        self.empty = false;
    }
}

// Event Trait
pub trait ClientEvent {
    type Iter;

    fn iter(events: &mut ClientEvents) -> Self::Iter;

    fn has(events: &ClientEvents) -> bool;
}

// Error Event: the page's global `UnhandledError`
pub struct ErrorEvent;
impl ClientEvent for ErrorEvent {
    type Iter = IntoIter<ClientError>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.errors);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &ClientEvents) -> bool {
        !events.errors.is_empty()
    }
}

// Script Event: scripts components asked to run
pub struct ScriptEvent;
impl ClientEvent for ScriptEvent {
    type Iter = IntoIter<String>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.scripts);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &ClientEvents) -> bool {
        !events.scripts.is_empty()
    }
}

// Redirect Event: full page loads
pub struct RedirectEvent;
impl ClientEvent for RedirectEvent {
    type Iter = IntoIter<String>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.redirects);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &ClientEvents) -> bool {
        !events.redirects.is_empty()
    }
}

// History Event
pub struct HistoryEvent;
impl ClientEvent for HistoryEvent {
    type Iter = IntoIter<HistoryEntry>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.history);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &ClientEvents) -> bool {
        !events.history.is_empty()
    }
}

// Trigger Event: every event dispatched on the page, whether or not a
// component subscribed to it
pub struct TriggerEvent;
impl ClientEvent for TriggerEvent {
    type Iter = IntoIter<Trigger>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.triggers);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &ClientEvents) -> bool {
        !events.triggers.is_empty()
    }
}
