use http::HeaderMap;
use serde_json::{Map, Value};
use thiserror::Error;

use tether_shared::{
    headers,
    protocol::{header_json, header_str},
    ComponentId, IdentityError, OperationId, ProtocolError, Trigger,
};

use crate::binding::{UploadedFile, WireValue};

/// Method segment selecting an event request
const EVENT_METHOD: &str = "event";

/// Errors produced while reading a synchronization request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// A mandatory header is absent
    #[error("Synchronization request is missing the '{header}' header")]
    MissingHeader { header: &'static str },
    /// `Tether-All-Ids` lists no component
    #[error("Synchronization request lists no rendered component")]
    NoRenderedIds,
    /// An id sent by the client isn't one the server could have minted
    #[error(transparent)]
    InvalidComponentId(#[from] IdentityError),
    /// A protocol header is malformed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// `Tether-Parameters` is not a JSON object
    #[error("Action parameters must be a JSON object")]
    ParametersNotAnObject,
}

/// `{prefix}/{component}/{method?}`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub component: String,
    pub method: Option<String>,
}

impl Route {
    /// Splits a request path, `None` when it isn't below `prefix`
    pub fn parse(prefix: &str, path: &str) -> Option<Route> {
        let rest = path.strip_prefix(prefix.trim_end_matches('/'))?;
        let rest = rest.strip_prefix('/')?.trim_end_matches('/');
        let mut parts = rest.split('/');
        let component = parts.next().filter(|part| !part.is_empty())?;
        let method = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return None;
        }
        Some(Route {
            component: component.to_string(),
            method,
        })
    }
}

/// What a synchronization request asks for
#[derive(Clone, Debug, PartialEq)]
pub enum RequestKind {
    /// Only bind the form values and re-render
    Bind,
    Action {
        name: String,
        parameters: Map<String, Value>,
    },
    Event {
        name: String,
        subject: Option<String>,
        data: Value,
    },
}

/// A parsed synchronization request
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Component name from the route
    pub component: String,
    pub kind: RequestKind,
    /// Prior state token
    pub token: String,
    /// Ids of the components the client has rendered, the target first
    pub rendered_ids: Vec<ComponentId>,
    pub operation_id: Option<OperationId>,
    pub parent_id: Option<ComponentId>,
    pub client_event: Option<String>,
    /// Form fields in the order they first appear, repeated keys collected
    pub form: Vec<(String, WireValue)>,
}

impl Envelope {
    pub fn parse(route: Route, headers: &HeaderMap, body: &[u8]) -> Result<Self, EnvelopeError> {
        let token = header_str(headers, headers::MODEL)
            .ok_or(EnvelopeError::MissingHeader {
                header: headers::MODEL,
            })?
            .to_string();

        let raw_ids: Vec<String> =
            header_json(headers, headers::ALL_IDS)?.ok_or(EnvelopeError::MissingHeader {
                header: headers::ALL_IDS,
            })?;
        if raw_ids.is_empty() {
            return Err(EnvelopeError::NoRenderedIds);
        }
        let rendered_ids = raw_ids
            .iter()
            .map(|raw| ComponentId::try_from_wire(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let parent_id = header_str(headers, headers::PARENT_ID)
            .filter(|raw| !raw.is_empty())
            .map(ComponentId::try_from_wire)
            .transpose()?;
        let operation_id = header_str(headers, headers::OPERATION_ID)
            .filter(|raw| !raw.is_empty())
            .map(OperationId::from);
        let client_event = header_str(headers, headers::CLIENT_EVENT_NAME)
            .filter(|raw| !raw.is_empty())
            .map(str::to_string);

        let (kind, form) = match route.method.as_deref() {
            None => (RequestKind::Bind, parse_form(body)),
            Some(method) if method.eq_ignore_ascii_case(EVENT_METHOD) => {
                let name = header_str(headers, headers::EVENT_NAME)
                    .ok_or(EnvelopeError::MissingHeader {
                        header: headers::EVENT_NAME,
                    })?
                    .to_string();
                let subject = header_str(headers, headers::EVENT_SUBJECT)
                    .filter(|raw| !raw.is_empty())
                    .map(str::to_string);
                let data = parse_event_data(body)?;
                (
                    RequestKind::Event {
                        name,
                        subject,
                        data,
                    },
                    Vec::new(),
                )
            }
            Some(method) => {
                let parameters = match header_json::<Value>(headers, headers::PARAMETERS)? {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(parameters)) => parameters,
                    Some(_) => return Err(EnvelopeError::ParametersNotAnObject),
                };
                (
                    RequestKind::Action {
                        name: method.to_string(),
                        parameters,
                    },
                    parse_form(body),
                )
            }
        };

        Ok(Self {
            component: route.component,
            kind,
            token,
            rendered_ids,
            operation_id,
            parent_id,
            client_event,
            form,
        })
    }

    /// Adds the files the transport extracted for a file input. An empty
    /// list binds as an empty selection.
    pub fn with_files(mut self, field: impl Into<String>, files: Vec<UploadedFile>) -> Self {
        let field = field.into();
        self.form.retain(|(name, _)| *name != field);
        self.form.push((field, WireValue::Files(files)));
        self
    }

    /// The component the request is addressed to, the first rendered id
    pub fn target_id(&self) -> Result<&ComponentId, EnvelopeError> {
        self.rendered_ids.first().ok_or(EnvelopeError::NoRenderedIds)
    }
}

fn parse_form(body: &[u8]) -> Vec<(String, WireValue)> {
    let mut form: Vec<(String, WireValue)> = Vec::new();
    for (name, value) in url::form_urlencoded::parse(body) {
        let value = value.into_owned();
        match form.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, WireValue::Many(items))) => items.push(value),
            Some((_, slot)) => {
                let first = match std::mem::replace(slot, WireValue::Null) {
                    WireValue::Text(first) => first,
                    _ => String::new(),
                };
                *slot = WireValue::Many(vec![first, value]);
            }
            None => form.push((name.into_owned(), WireValue::Text(value))),
        }
    }
    form
}

fn parse_event_data(body: &[u8]) -> Result<Value, EnvelopeError> {
    let encoded = String::from_utf8_lossy(body);
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Trigger::decode_data(encoded)?)
}
