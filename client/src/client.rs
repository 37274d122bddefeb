use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    time::{Duration, Instant},
};

use http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use log::{debug, info, trace, warn};
use serde_json::{Map, Value};

use tether_shared::{
    headers,
    protocol::{header_flag, header_json, header_str, header_value, json_header_value, ErrorBody},
    EventSubscription, Location, OperationId, Scope, Trigger,
};

use crate::{
    dom::{Document, NodeId},
    events::{ClientEvents, HistoryEntry},
    morph::{Morph, KeyedMorph, Update},
    queue::{ComponentQueue, Operation, OperationKind, QueueState, Ticket},
    timer::Timer,
    AntiforgeryToken, ClientConfig, ClientError,
};

const COMPONENT_ATTRIBUTE: &str = "tether";
const NAME_ATTRIBUTE: &str = "tether-name";
const PLACEHOLDER_ATTRIBUTE: &str = "tether-placeholder";
const ACTION_ATTRIBUTE: &str = "tether-action";
const PARAMETERS_ATTRIBUTE: &str = "tether-parameters";
const POLL_ATTRIBUTE: &str = "tether-poll";
const EVENT_ATTRIBUTE: &str = "tether-event";
const SCRIPT_ATTRIBUTE: &str = "tether-js";
const STATE_ATTRIBUTE: &str = "data-id";
/// Bound inputs with this attribute bind on `change` only
const LAZY_ATTRIBUTE: &str = "tether-lazy";
/// Debounce window of a bound input, in milliseconds
const DEBOUNCE_ATTRIBUTE: &str = "tether-debounce";
const OPERATION_ATTRIBUTE: &str = "tether-operation-id";
const BUSY_CLASS: &str = "tether-request";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const UNBOUND_INPUT_TYPES: [&str; 5] = ["button", "submit", "reset", "image", "file"];

/// A request for the host to send. Hand the response back to
/// [`Client::receive`] with the same ticket.
#[derive(Debug)]
pub struct OutgoingRequest {
    pub ticket: Ticket,
    pub request: http::Request<String>,
}

/// Edits of one component waiting for their debounce window to close
struct BindWindow {
    operation_id: OperationId,
    fields: BTreeSet<String>,
    deadline: Instant,
    client_event: String,
}

/// Busy state of the elements that started an operation
struct Busy {
    /// Requests of the operation queued or in flight
    outstanding: usize,
    apply_at: Instant,
    applied: bool,
    release_at: Option<Instant>,
}

struct Poll {
    component: String,
    action: String,
    timer: Timer,
    /// A tick came due while the document was hidden
    missed: bool,
}

struct Navigation {
    sequence: u64,
    url: String,
    target: String,
    push: bool,
}

enum Pending {
    Operation(Operation),
    Navigation(Navigation),
}

/// Keeps the components of one page in sync with the server.
///
/// The Client does no IO and reads no clock. The host feeds it user input
/// and the current time, sends what [`Client::poll`] returns and passes the
/// responses to [`Client::receive`]. Anything the host has to act on, such
/// as scripts, redirects or errors, is collected in [`ClientEvents`].
pub struct Client<M: Morph = KeyedMorph> {
    config: ClientConfig,
    document: Document,
    morph: M,
    events: ClientEvents,
    queues: BTreeMap<String, ComponentQueue>,
    in_flight: HashMap<Ticket, Pending>,
    outbox: Vec<OutgoingRequest>,
    next_ticket: u64,
    bind_windows: BTreeMap<String, BindWindow>,
    /// (component id, field name) → operation that will save the field
    dirty: HashMap<(String, String), OperationId>,
    busy: HashMap<OperationId, Busy>,
    polls: Vec<Poll>,
    hidden: bool,
    navigation_sequence: u64,
}

impl Client<KeyedMorph> {
    /// Create a new Client for a loaded page
    pub fn new(config: ClientConfig, document: Document, now: Instant) -> Self {
        Self::with_morph(config, document, KeyedMorph, now)
    }
}

impl<M: Morph> Client<M> {
    pub fn with_morph(config: ClientConfig, document: Document, morph: M, now: Instant) -> Self {
        let mut client = Self {
            config,
            document,
            morph,
            events: ClientEvents::new(),
            queues: BTreeMap::new(),
            in_flight: HashMap::new(),
            outbox: Vec::new(),
            next_ticket: 0,
            bind_windows: BTreeMap::new(),
            dirty: HashMap::new(),
            busy: HashMap::new(),
            polls: Vec::new(),
            hidden: false,
            navigation_sequence: 0,
        };
        let root = client.document.root();
        client.after_update(now, root);
        client
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Everything that happened since the last call
    pub fn take_events(&mut self) -> ClientEvents {
        std::mem::take(&mut self.events)
    }

    pub fn queue_state(&self, component: &str) -> QueueState {
        self.queues
            .get(component)
            .map_or(QueueState::Idle, ComponentQueue::state)
    }

    /// The operation that will save `field` of `component`, while the user's
    /// edit of it hasn't come back from the server
    pub fn dirty_operation(&self, component: &str, field: &str) -> Option<&OperationId> {
        self.dirty.get(&(component.to_string(), field.to_string()))
    }

    pub fn antiforgery_token(&self) -> Option<&AntiforgeryToken> {
        self.config.antiforgery.as_ref()
    }

    // Input

    pub fn focus(&mut self, node: NodeId) {
        self.document.focus(node);
    }

    pub fn blur(&mut self) {
        self.document.blur();
    }

    /// The user typed into a control. Bound controls save their value once
    /// typing pauses for the debounce window.
    pub fn input(&mut self, now: Instant, node: NodeId, value: &str) {
        self.document.set_value(node, value);
        if self.document.has_attribute(node, LAZY_ATTRIBUTE) {
            return;
        }
        let window = self
            .document
            .attribute(node, DEBOUNCE_ATTRIBUTE)
            .and_then(|ms| ms.trim().parse::<u64>().ok())
            .map_or(self.config.default_bind_debounce, Duration::from_millis);
        self.arm_bind(now, node, window, "input");
    }

    /// A control's value was committed, as a select pick or leaving a text
    /// input does
    pub fn change(&mut self, now: Instant, node: NodeId, value: &str) {
        self.document.set_value(node, value);
        self.arm_bind(now, node, self.config.bind_coalesce, "change");
    }

    pub fn check(&mut self, now: Instant, node: NodeId, checked: bool) {
        self.document.set_checked(node, checked);
        self.arm_bind(now, node, self.config.bind_coalesce, "change");
    }

    /// The user clicked `node`. Calls the action of the nearest element
    /// carrying `tether-action`, if any.
    pub fn click(&mut self, now: Instant, node: NodeId) -> Result<Option<OperationId>, ClientError> {
        let Some(trigger) = self.document.closest_with_attribute(node, ACTION_ATTRIBUTE) else {
            return Ok(None);
        };
        if self.document.has_attribute(trigger, POLL_ATTRIBUTE) {
            return Ok(None);
        }
        let Some(component) = self.owner(trigger) else {
            debug!("Ignoring action outside of any component");
            return Ok(None);
        };
        let action = self
            .document
            .attribute(trigger, ACTION_ATTRIBUTE)
            .unwrap_or_default()
            .to_string();
        let parameters = match self.document.attribute(trigger, PARAMETERS_ATTRIBUTE) {
            Some(raw) => {
                serde_json::from_str(raw).map_err(|err| ClientError::InvalidRequest {
                    reason: format!("'{PARAMETERS_ATTRIBUTE}' of action '{action}': {err}"),
                })?
            }
            None => Value::Null,
        };
        self.enqueue_action(now, &component, &action, parameters, Some(trigger), Some("click"))
            .map(Some)
    }

    /// Calls an action of a component on the page. `parameters` is a JSON
    /// object, or null for none.
    pub fn call_action(
        &mut self,
        now: Instant,
        component: &str,
        action: &str,
        parameters: Value,
    ) -> Result<OperationId, ClientError> {
        self.enqueue_action(now, component, action, parameters, None, None)
    }

    /// Dispatches an event from the page to every component subscribed to it
    pub fn dispatch(&mut self, name: &str, data: &Value, subject: Option<&str>) -> OperationId {
        let operation_id = new_operation_id();
        self.route_trigger(Trigger {
            name: name.to_string(),
            data: Trigger::encode_data(data),
            scope: Scope::Global,
            subject: subject.map(str::to_string),
            operation_id: operation_id.clone(),
            target: None,
        });
        operation_id
    }

    /// Pauses polling while hidden. A poll that came due in the meantime
    /// fires as soon as the document is visible again.
    pub fn set_hidden(&mut self, now: Instant, hidden: bool) {
        self.hidden = hidden;
        if hidden {
            return;
        }
        let mut missed = Vec::new();
        for poll in &mut self.polls {
            if poll.missed {
                poll.missed = false;
                poll.timer.reset(now);
                missed.push((poll.component.clone(), poll.action.clone()));
            }
        }
        for (component, action) in missed {
            self.enqueue_poll(&component, &action);
        }
    }

    // Navigation

    /// Loads `url` into the page body without a full page load, then asks
    /// the host to push it onto the history
    pub fn navigate(&mut self, url: &str) {
        self.start_navigation(url.to_string(), None, None, true);
    }

    /// Loads `url` after the user went back or forward in the history
    pub fn pop_state(&mut self, url: &str) {
        self.start_navigation(url.to_string(), None, None, false);
    }

    fn start_navigation(
        &mut self,
        url: String,
        target: Option<String>,
        payload: Option<Value>,
        push: bool,
    ) {
        self.navigation_sequence += 1;
        let target = target.unwrap_or_else(|| "body".to_string());
        info!("Navigating to '{url}'");

        match navigation_request(&url, payload.as_ref()) {
            Ok(request) => {
                let ticket = self.next_ticket();
                self.in_flight.insert(
                    ticket,
                    Pending::Navigation(Navigation {
                        sequence: self.navigation_sequence,
                        url,
                        target,
                        push,
                    }),
                );
                self.outbox.push(OutgoingRequest { ticket, request });
            }
            Err(err) => {
                warn!("Can't navigate to '{url}': {err}");
                self.events.push_error(err);
                self.events.push_redirect(url);
            }
        }
    }

    // Time

    /// Fires due timers and returns the requests to send now
    pub fn poll(&mut self, now: Instant) -> Vec<OutgoingRequest> {
        let closed: Vec<String> = self
            .bind_windows
            .iter()
            .filter(|(_, window)| window.deadline <= now)
            .map(|(component, _)| component.clone())
            .collect();
        for component in closed {
            self.flush_bind_window(&component);
        }

        self.fire_polls(now);
        self.update_busy(now);
        self.release_queued(now);
        std::mem::take(&mut self.outbox)
    }

    /// Applies the response to a request returned by [`Client::poll`]
    pub fn receive(&mut self, now: Instant, ticket: Ticket, response: Response<String>) {
        let Some(pending) = self.in_flight.remove(&ticket) else {
            debug!("Dropping response for unknown request {ticket}");
            return;
        };
        match pending {
            Pending::Navigation(navigation) => self.finish_navigation(now, navigation, response),
            Pending::Operation(operation) => {
                if let Some(queue) = self.queues.get_mut(&operation.component) {
                    queue.completed(ticket);
                }
                trace!(
                    "Response to {} of component {} with status {}",
                    operation.describe(),
                    operation.component,
                    response.status()
                );
                self.apply_response(now, &operation, response);
                self.clear_dirty(&operation.id);
                self.complete_busy(now, &operation.id);
            }
        }
    }

    // Binding

    fn arm_bind(&mut self, now: Instant, node: NodeId, window: Duration, client_event: &str) {
        if !self.is_bound_field(node) {
            return;
        }
        let (Some(component), Some(field)) = (
            self.owner(node),
            self.document.attribute(node, "name").map(str::to_string),
        ) else {
            return;
        };

        let operation_id = match self.bind_windows.get_mut(&component) {
            Some(open) => {
                open.deadline = now + window;
                open.client_event = client_event.to_string();
                open.fields.insert(field.clone());
                open.operation_id.clone()
            }
            None => {
                let operation_id = new_operation_id();
                self.bind_windows.insert(
                    component.clone(),
                    BindWindow {
                        operation_id: operation_id.clone(),
                        fields: BTreeSet::from([field.clone()]),
                        deadline: now + window,
                        client_event: client_event.to_string(),
                    },
                );
                operation_id
            }
        };
        trace!("Field '{field}' of component {component} is dirty under operation {operation_id}");
        self.dirty.insert((component, field), operation_id);
    }

    fn flush_bind_window(&mut self, component: &str) {
        if let Some(window) = self.bind_windows.remove(component) {
            self.enqueue(Operation {
                id: window.operation_id,
                component: component.to_string(),
                kind: OperationKind::Bind {
                    fields: window.fields,
                },
                client_event: Some(window.client_event),
            });
        }
    }

    /// Saves the focused control of `component` if it holds edits nothing
    /// is going to send yet
    fn flush_focused_edit(&mut self, component: &str) {
        let Some(focused) = self.document.focused() else {
            return;
        };
        if !self.is_bound_field(focused)
            || self.owner(focused).as_deref() != Some(component)
            || !self.document.is_changed(focused)
        {
            return;
        }
        let Some(field) = self.document.attribute(focused, "name").map(str::to_string) else {
            return;
        };
        let key = (component.to_string(), field.clone());
        if self.dirty.contains_key(&key) {
            return;
        }

        let operation_id = new_operation_id();
        self.dirty.insert(key, operation_id.clone());
        self.enqueue(Operation {
            id: operation_id,
            component: component.to_string(),
            kind: OperationKind::Bind {
                fields: BTreeSet::from([field]),
            },
            client_event: Some("change".to_string()),
        });
    }

    fn clear_dirty(&mut self, operation_id: &OperationId) {
        self.dirty.retain(|_, mark| mark != operation_id);
    }

    // Queueing

    fn enqueue_action(
        &mut self,
        now: Instant,
        component: &str,
        action: &str,
        parameters: Value,
        trigger: Option<NodeId>,
        client_event: Option<&str>,
    ) -> Result<OperationId, ClientError> {
        if self.component_root(component).is_none() {
            return Err(ClientError::UnknownComponent {
                id: component.to_string(),
            });
        }
        let parameters = match parameters {
            Value::Object(parameters) => parameters,
            Value::Null => Map::new(),
            other => {
                return Err(ClientError::InvalidRequest {
                    reason: format!("parameters of action '{action}' must be an object, got {other}"),
                })
            }
        };

        // edits made before the click are saved before the action runs
        self.flush_bind_window(component);
        self.flush_focused_edit(component);

        let operation_id = new_operation_id();
        if let Some(trigger) = trigger {
            self.document
                .set_attribute(trigger, OPERATION_ATTRIBUTE, Some(operation_id.as_str()));
            self.busy.insert(
                operation_id.clone(),
                Busy {
                    outstanding: 0,
                    apply_at: now + self.config.busy_delay,
                    applied: false,
                    release_at: None,
                },
            );
        }
        self.enqueue(Operation {
            id: operation_id.clone(),
            component: component.to_string(),
            kind: OperationKind::Action {
                name: action.to_string(),
                parameters,
            },
            client_event: client_event.map(str::to_string),
        });
        Ok(operation_id)
    }

    fn enqueue_poll(&mut self, component: &str, action: &str) {
        let queue = self.queues.entry(component.to_string()).or_default();
        if queue.has_pending_action(action) {
            trace!("Poll of '{action}' on component {component} is already queued");
            return;
        }
        self.enqueue(Operation {
            id: new_operation_id(),
            component: component.to_string(),
            kind: OperationKind::Action {
                name: action.to_string(),
                parameters: Map::new(),
            },
            client_event: None,
        });
    }

    fn enqueue(&mut self, operation: Operation) {
        if let Some(busy) = self.busy.get_mut(&operation.id) {
            busy.outstanding += 1;
            busy.release_at = None;
        }
        trace!(
            "Queued {} of component {} under operation {}",
            operation.describe(),
            operation.component,
            operation.id
        );
        self.queues
            .entry(operation.component.clone())
            .or_default()
            .push(operation);
    }

    fn release_queued(&mut self, now: Instant) {
        let components: Vec<String> = self
            .queues
            .iter()
            .filter(|(_, queue)| queue.state() == QueueState::Queued)
            .map(|(component, _)| component.clone())
            .collect();

        for component in components {
            loop {
                let Some(operation) = self.queues.get_mut(&component).and_then(ComponentQueue::next)
                else {
                    break;
                };
                match self.build_request(&operation) {
                    Ok(request) => {
                        let ticket = self.next_ticket();
                        if let Some(queue) = self.queues.get_mut(&component) {
                            queue.sent(ticket);
                        }
                        trace!(
                            "Sending {} of component {component} as request {ticket}",
                            operation.describe()
                        );
                        self.in_flight.insert(ticket, Pending::Operation(operation));
                        self.outbox.push(OutgoingRequest { ticket, request });
                        break;
                    }
                    Err(err) => {
                        self.clear_dirty(&operation.id);
                        self.complete_busy(now, &operation.id);
                        if matches!(operation.kind, OperationKind::Event { .. }) {
                            debug!(
                                "Dropping {} of component {component}: {err}",
                                operation.describe()
                            );
                        } else {
                            warn!(
                                "Dropping {} of component {component}: {err}",
                                operation.describe()
                            );
                            self.events.push_error(err);
                        }
                    }
                }
            }
        }
    }

    fn next_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    // Requests

    fn build_request(&self, operation: &Operation) -> Result<http::Request<String>, ClientError> {
        let root = self
            .component_root(&operation.component)
            .ok_or_else(|| ClientError::UnknownComponent {
                id: operation.component.clone(),
            })?;
        let name = self
            .document
            .attribute(root, NAME_ATTRIBUTE)
            .ok_or_else(|| ClientError::MalformedComponent {
                id: operation.component.clone(),
                what: "name",
            })?;
        let token = self
            .state_token(root, &operation.component)
            .ok_or_else(|| ClientError::MalformedComponent {
                id: operation.component.clone(),
                what: "state token",
            })?;

        let prefix = self.config.path_prefix.trim_end_matches('/');
        let path = match &operation.kind {
            OperationKind::Bind { .. } => format!("{prefix}/{name}"),
            OperationKind::Action { name: action, .. } => format!("{prefix}/{name}/{action}"),
            OperationKind::Event { path, .. } => path.clone(),
        };

        let mut builder = http::Request::post(path)
            .header(headers::REQUEST, HeaderValue::from_static(headers::TRUE))
            .header(headers::MODEL, header_value(headers::MODEL, &token)?)
            .header(
                headers::ALL_IDS,
                json_header_value(headers::ALL_IDS, &self.rendered_ids(root))?,
            )
            .header(
                headers::OPERATION_ID,
                header_value(headers::OPERATION_ID, operation.id.as_str())?,
            );
        if let Some(parent) = self
            .document
            .parent(root)
            .and_then(|parent| self.owner(parent))
        {
            builder = builder.header(headers::PARENT_ID, header_value(headers::PARENT_ID, &parent)?);
        }
        if let Some(client_event) = &operation.client_event {
            builder = builder.header(
                headers::CLIENT_EVENT_NAME,
                header_value(headers::CLIENT_EVENT_NAME, client_event)?,
            );
        }
        if let Some(antiforgery) = &self.config.antiforgery {
            builder = builder.header(antiforgery.header_name.as_str(), antiforgery.token.as_str());
        }

        let body = match &operation.kind {
            OperationKind::Bind { fields } => {
                builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
                self.form_body(root, Some(fields))
            }
            OperationKind::Action { parameters, .. } => {
                builder = builder
                    .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                    .header(
                        headers::PARAMETERS,
                        json_header_value(headers::PARAMETERS, parameters)?,
                    );
                self.form_body(root, None)
            }
            OperationKind::Event {
                name,
                subject,
                data,
                ..
            } => {
                builder = builder.header(headers::EVENT_NAME, header_value(headers::EVENT_NAME, name)?);
                if let Some(subject) = subject {
                    builder = builder.header(
                        headers::EVENT_SUBJECT,
                        header_value(headers::EVENT_SUBJECT, subject)?,
                    );
                }
                data.clone()
            }
        };

        builder.body(body).map_err(|err| ClientError::InvalidRequest {
            reason: err.to_string(),
        })
    }

    /// Values of the bound controls of the component at `root`, limited to
    /// `only` when given. Controls of nested components belong to those.
    fn form_body(&self, root: NodeId, only: Option<&BTreeSet<String>>) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        for node in self.document.descendants(root) {
            if !self.is_bound_field(node) || self.component_root_of(node) != Some(root) {
                continue;
            }
            let Some(name) = self.document.attribute(node, "name") else {
                continue;
            };
            if only.is_some_and(|fields| !fields.contains(name)) {
                continue;
            }
            let is_radio = self
                .document
                .attribute(node, "type")
                .is_some_and(|kind| kind.eq_ignore_ascii_case("radio"));
            if is_radio {
                if self.document.checked(node) {
                    form.append_pair(name, &self.document.value(node));
                }
            } else if self.document.is_checkable(node) {
                let checked = if self.document.checked(node) { "true" } else { "false" };
                form.append_pair(name, checked);
            } else {
                form.append_pair(name, &self.document.value(node));
            }
        }
        form.finish()
    }

    /// The component's own id first, then every component nested in it
    fn rendered_ids(&self, root: NodeId) -> Vec<String> {
        let mut ids: Vec<String> = self
            .document
            .attribute(root, "id")
            .map(str::to_string)
            .into_iter()
            .collect();
        for nested in self.document.elements_with_attribute(root, COMPONENT_ATTRIBUTE) {
            if let Some(id) = self.document.attribute(nested, "id") {
                ids.push(id.to_string());
            }
        }
        ids
    }

    fn state_token(&self, root: NodeId, component: &str) -> Option<String> {
        self.document
            .elements_with_attribute(root, STATE_ATTRIBUTE)
            .into_iter()
            .find(|script| self.document.attribute(*script, STATE_ATTRIBUTE) == Some(component))
            .map(|script| self.document.text_content(script))
    }

    // Responses

    fn apply_response(&mut self, now: Instant, operation: &Operation, response: Response<String>) {
        let status = response.status();
        let response_headers = response.headers();

        if status == StatusCode::BAD_REQUEST {
            if let Some(token) = header_str(response_headers, headers::REFRESH_ANTIFORGERY_TOKEN) {
                debug!("Refreshed the antiforgery token");
                match &mut self.config.antiforgery {
                    Some(antiforgery) => antiforgery.token = token.to_string(),
                    None => self.config.antiforgery = Some(AntiforgeryToken::new(token)),
                }
                return;
            }
        }
        if !status.is_success() {
            if matches!(operation.kind, OperationKind::Event { .. }) {
                debug!(
                    "{} of component {} failed with status {status}",
                    operation.describe(),
                    operation.component
                );
                return;
            }
            let error = if status == StatusCode::FORBIDDEN {
                ClientError::Unauthorized
            } else {
                let message = serde_json::from_str::<ErrorBody>(response.body())
                    .map(|body| body.message)
                    .unwrap_or_else(|_| {
                        status
                            .canonical_reason()
                            .unwrap_or("Request failed")
                            .to_string()
                    });
                ClientError::RequestFailed {
                    status: status.as_u16(),
                    message,
                }
            };
            warn!(
                "{} of component {} failed: {error}",
                operation.describe(),
                operation.component
            );
            self.events.push_error(error);
            return;
        }

        match header_json::<Vec<String>>(response_headers, headers::JS) {
            Ok(scripts) => {
                for script in scripts.unwrap_or_default() {
                    self.events.push_script(script);
                }
            }
            Err(err) => self.events.push_error(err.into()),
        }
        if let Some(redirect) = header_str(response_headers, headers::REDIRECT) {
            info!("Redirecting to '{redirect}'");
            self.events.push_redirect(redirect.to_string());
            return;
        }

        if !header_flag(response_headers, headers::SKIP_OUTPUT) && !response.body().trim().is_empty()
        {
            if let Err(err) = self.patch_component(now, operation, response.body()) {
                warn!(
                    "Couldn't apply the response of component {}: {err}",
                    operation.component
                );
                self.events.push_error(err);
            }
        }

        match header_json::<Vec<Trigger>>(response_headers, headers::TRIGGER) {
            Ok(triggers) => {
                for trigger in triggers.unwrap_or_default() {
                    self.route_trigger(trigger);
                }
            }
            Err(err) => self.events.push_error(err.into()),
        }

        match header_json::<Location>(response_headers, headers::LOCATION) {
            Ok(Some(location)) => {
                let target = location.target.clone().or_else(|| {
                    header_str(response_headers, headers::LOCATION_TARGET).map(str::to_string)
                });
                self.start_navigation(location.path, target, location.payload, true);
            }
            Ok(None) => {}
            Err(err) => self.events.push_error(err.into()),
        }
    }

    fn patch_component(
        &mut self,
        now: Instant,
        operation: &Operation,
        html: &str,
    ) -> Result<(), ClientError> {
        let Some(target) = self.component_root(&operation.component) else {
            debug!(
                "Component {} left the page before its response arrived",
                operation.component
            );
            return Ok(());
        };
        let mut incoming = Document::parse(html)?;
        let Some(source) = incoming.first_element() else {
            return Ok(());
        };
        // a placeholder only stands in for a component the page still has
        for placeholder in incoming.elements_with_attribute(source, PLACEHOLDER_ATTRIBUTE) {
            let id = incoming.attribute(placeholder, "id").unwrap_or_default();
            if self.component_root(id).is_none() {
                debug!("Dropping placeholder of component '{id}' that isn't on the page");
                incoming.detach(placeholder);
            }
        }

        let dirty = &self.dirty;
        let busy = &self.busy;
        self.morph.morph(
            &mut self.document,
            target,
            &mut incoming,
            source,
            &mut |live, from, incoming, to| guard(dirty, busy, operation, live, from, incoming, to),
        );

        let root = self.component_root(&operation.component).unwrap_or(target);
        self.after_update(now, root);
        Ok(())
    }

    fn finish_navigation(
        &mut self,
        now: Instant,
        navigation: Navigation,
        response: Response<String>,
    ) {
        if navigation.sequence != self.navigation_sequence {
            debug!("Ignoring the outdated navigation to '{}'", navigation.url);
            return;
        }
        let status = response.status();
        let result = if status.is_success() {
            self.swap_content(now, &navigation, &response)
        } else {
            Err(ClientError::NavigationFailed {
                url: navigation.url.clone(),
                status: status.as_u16(),
            })
        };
        if let Err(err) = result {
            warn!("Boosted navigation failed, loading '{}' instead: {err}", navigation.url);
            self.events.push_error(err);
            self.events.push_redirect(navigation.url);
        }
    }

    fn swap_content(
        &mut self,
        now: Instant,
        navigation: &Navigation,
        response: &Response<String>,
    ) -> Result<(), ClientError> {
        let incoming = Document::parse(response.body())?;
        let target = self
            .document
            .select(&navigation.target)
            .ok_or_else(|| ClientError::MissingTarget {
                selector: navigation.target.clone(),
            })?;
        // a full page brings its own copy of the target
        let source = incoming
            .select(&navigation.target)
            .unwrap_or_else(|| incoming.root());
        let title = header_str(response.headers(), headers::LOCATION_TITLE)
            .map(str::to_string)
            .or_else(|| incoming.title().map(str::to_string));

        self.document.clear_children(target);
        for child in incoming.children(source) {
            let copy = self.document.import(&incoming, *child);
            self.document.append_child(target, copy);
        }
        if title.is_some() {
            self.document.set_title(title.clone());
        }
        info!("Navigated to '{}'", navigation.url);
        if navigation.push {
            self.events.push_history(HistoryEntry {
                url: navigation.url.clone(),
                title,
            });
        }
        self.after_update(now, target);
        Ok(())
    }

    /// Runs the static scripts of freshly inserted markup and picks up the
    /// polls it declares
    fn after_update(&mut self, now: Instant, scope: NodeId) {
        for script in self.document.elements_with_attribute(scope, SCRIPT_ATTRIBUTE) {
            let code = self.document.text_content(script).replace("<\\/", "</");
            self.document.detach(script);
            self.events.push_script(code);
        }
        self.scan_polls(now);
    }

    // Events

    fn route_trigger(&mut self, trigger: Trigger) {
        let subscribers = self.subscribers(&trigger);
        if trigger.scope == Scope::Parent && trigger.target.is_none() {
            debug!("Dropping event '{}' that has no parent to go to", trigger.name);
        }
        for (component, subscription) in subscribers {
            self.enqueue(Operation {
                id: trigger.operation_id.clone(),
                component,
                kind: OperationKind::Event {
                    name: trigger.name.clone(),
                    subject: trigger.subject.clone(),
                    data: trigger.data.clone(),
                    path: subscription.path,
                },
                client_event: None,
            });
        }
        self.events.push_trigger(trigger);
    }

    fn subscribers(&self, trigger: &Trigger) -> Vec<(String, EventSubscription)> {
        let mut subscribers = Vec::new();
        let root = self.document.root();
        for script in self.document.elements_with_attribute(root, EVENT_ATTRIBUTE) {
            let Some(raw) = self.document.attribute(script, EVENT_ATTRIBUTE) else {
                continue;
            };
            let subscription: EventSubscription = match serde_json::from_str(raw) {
                Ok(subscription) => subscription,
                Err(err) => {
                    warn!("Ignoring unreadable event subscription: {err}");
                    continue;
                }
            };
            if subscription.name != trigger.name {
                continue;
            }
            if subscription.subject.is_some() && subscription.subject != trigger.subject {
                continue;
            }
            let Some(component) = self.owner(script) else {
                continue;
            };
            let addressed = match trigger.scope {
                Scope::Global => true,
                Scope::Parent => trigger
                    .target
                    .as_ref()
                    .is_some_and(|target| target.as_str() == component),
            };
            if addressed {
                subscribers.push((component, subscription));
            }
        }
        subscribers
    }

    // Polling

    fn scan_polls(&mut self, now: Instant) {
        let root = self.document.root();
        let mut polls = Vec::new();
        for script in self.document.elements_with_attribute(root, POLL_ATTRIBUTE) {
            let interval = self
                .document
                .attribute(script, POLL_ATTRIBUTE)
                .and_then(|ms| ms.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis);
            let action = self.document.attribute(script, ACTION_ATTRIBUTE);
            let (Some(interval), Some(action), Some(component)) =
                (interval, action, self.owner(script))
            else {
                continue;
            };

            let existing = self
                .polls
                .iter()
                .position(|poll| poll.component == component && poll.action == action);
            match existing {
                Some(index) => {
                    let mut poll = self.polls.swap_remove(index);
                    if poll.timer.duration() != interval {
                        poll.timer = Timer::new(interval, now);
                    }
                    polls.push(poll);
                }
                None => {
                    debug!("Polling '{action}' of component {component} every {interval:?}");
                    polls.push(Poll {
                        component,
                        action: action.to_string(),
                        timer: Timer::new(interval, now),
                        missed: false,
                    });
                }
            }
        }
        self.polls = polls;
    }

    fn fire_polls(&mut self, now: Instant) {
        let hidden = self.hidden;
        let mut due = Vec::new();
        for poll in &mut self.polls {
            if !poll.timer.ringing(now) {
                continue;
            }
            poll.timer.reset(now);
            if hidden {
                poll.missed = true;
            } else {
                due.push((poll.component.clone(), poll.action.clone()));
            }
        }
        for (component, action) in due {
            self.enqueue_poll(&component, &action);
        }
    }

    // Busy state

    fn update_busy(&mut self, now: Instant) {
        let mut apply = Vec::new();
        let mut release = Vec::new();
        for (operation_id, busy) in &mut self.busy {
            if busy.outstanding > 0 && !busy.applied && now >= busy.apply_at {
                busy.applied = true;
                apply.push(operation_id.clone());
            }
            if busy.outstanding == 0 && busy.release_at.is_some_and(|at| now >= at) {
                release.push(operation_id.clone());
            }
        }
        for operation_id in apply {
            for node in self.tagged_with(&operation_id) {
                if !self.document.has_attribute(node, "disabled") {
                    self.document.set_attribute(node, "disabled", None);
                    self.document.add_class(node, BUSY_CLASS);
                }
            }
        }
        for operation_id in release {
            self.busy.remove(&operation_id);
            for node in self.tagged_with(&operation_id) {
                self.document.remove_attribute(node, OPERATION_ATTRIBUTE);
                if self.document.has_class(node, BUSY_CLASS) {
                    self.document.remove_class(node, BUSY_CLASS);
                    self.document.remove_attribute(node, "disabled");
                }
            }
        }
    }

    fn complete_busy(&mut self, now: Instant, operation_id: &OperationId) {
        if let Some(busy) = self.busy.get_mut(operation_id) {
            busy.outstanding = busy.outstanding.saturating_sub(1);
            if busy.outstanding == 0 {
                busy.release_at = Some(now + self.config.busy_release_delay);
            }
        }
    }

    fn tagged_with(&self, operation_id: &OperationId) -> Vec<NodeId> {
        self.document
            .elements_with_attribute(self.document.root(), OPERATION_ATTRIBUTE)
            .into_iter()
            .filter(|node| {
                self.document.attribute(*node, OPERATION_ATTRIBUTE) == Some(operation_id.as_str())
            })
            .collect()
    }

    // Lookup

    fn component_root(&self, component: &str) -> Option<NodeId> {
        self.document
            .element_by_id(component)
            .filter(|root| self.document.has_attribute(*root, COMPONENT_ATTRIBUTE))
    }

    fn component_root_of(&self, node: NodeId) -> Option<NodeId> {
        self.document.closest_with_attribute(node, COMPONENT_ATTRIBUTE)
    }

    /// Id of the component `node` belongs to
    fn owner(&self, node: NodeId) -> Option<String> {
        owner_id(&self.document, node).map(str::to_string)
    }

    fn is_bound_field(&self, node: NodeId) -> bool {
        if !self.document.is_form_control(node) || !self.document.has_attribute(node, "name") {
            return false;
        }
        !self
            .document
            .attribute(node, "type")
            .is_some_and(|kind| UNBOUND_INPUT_TYPES.contains(&kind.to_ascii_lowercase().as_str()))
    }
}

/// Decides, node by node, what a response may change on the page
fn guard(
    dirty: &HashMap<(String, String), OperationId>,
    busy: &HashMap<OperationId, Busy>,
    operation: &Operation,
    live: &Document,
    from: NodeId,
    incoming: &mut Document,
    to: NodeId,
) -> Update {
    // the server left out a nested component the page already has
    if incoming.has_attribute(to, PLACEHOLDER_ATTRIBUTE) {
        let live_id = live.attribute(from, "id");
        if live_id.is_some() && live_id == incoming.attribute(to, "id") {
            trace!("Keeping nested component {}", live_id.unwrap_or_default());
            return Update::Skip;
        }
    }

    if live.is_form_control(from) {
        if let (Some(field), Some(component)) = (live.attribute(from, "name"), owner_id(live, from)) {
            match dirty.get(&(component.to_string(), field.to_string())) {
                Some(mark) if *mark != operation.id => {
                    debug!(
                        "Keeping field '{field}' of component {component}, it has edits of operation {mark}"
                    );
                    return Update::Skip;
                }
                Some(_) => {}
                // edits nothing is saving yet, as typing into a lazy input
                None if live.is_changed(from)
                    && (live.focused() == Some(from) || !operation.carries(field)) =>
                {
                    debug!("Keeping unsaved edits of field '{field}' of component {component}");
                    return Update::Skip;
                }
                None => {}
            }
        }
    }

    // busy state survives the re-render
    if let Some(tag) = live.attribute(from, OPERATION_ATTRIBUTE) {
        if busy.contains_key(&OperationId::from(tag)) && incoming.is_element(to) {
            incoming.set_attribute(to, OPERATION_ATTRIBUTE, Some(tag));
            if live.has_class(from, BUSY_CLASS) {
                incoming.add_class(to, BUSY_CLASS);
                incoming.set_attribute(to, "disabled", None);
            }
        }
    }
    Update::Patch
}

fn owner_id(document: &Document, node: NodeId) -> Option<&str> {
    document
        .closest_with_attribute(node, COMPONENT_ATTRIBUTE)
        .and_then(|root| document.attribute(root, "id"))
}

fn navigation_request(url: &str, payload: Option<&Value>) -> Result<http::Request<String>, ClientError> {
    let mut builder = http::Request::get(url)
        .header(headers::REQUEST, HeaderValue::from_static(headers::TRUE))
        .header(headers::BOOSTED, HeaderValue::from_static(headers::TRUE));
    if let Some(payload) = payload {
        builder = builder.header(headers::PAYLOAD, json_header_value(headers::PAYLOAD, payload)?);
    }
    builder
        .body(String::new())
        .map_err(|err| ClientError::InvalidRequest {
            reason: err.to_string(),
        })
}

fn new_operation_id() -> OperationId {
    OperationId::new(uuid::Uuid::new_v4().simple().to_string())
}
