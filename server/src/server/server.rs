use std::sync::Arc;

use http::{
    header::{CONTENT_TYPE, SET_COOKIE},
    HeaderValue, Method, Response, StatusCode,
};
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};

use tether_shared::{
    derive_id, headers,
    protocol::{header_json, header_value, json_header_value, AntiforgeryRefresh, ErrorBody},
    Location, ProtocolError, StateCodec, Trigger,
};

use crate::{
    authorization::RequestInfo,
    binding::{Converters, WireValue},
    component::{ActionError, Component, DescriptorError, Registry},
    context::{fresh_operation_id, CacheStore, RequestScope},
    envelope::{Envelope, Route},
    error::TetherServerError,
    pipeline::Reply,
    render::{render_static, NestedOutput, RenderScope, StaticRender},
    ServerConfig,
};

const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";

/// A component rendered into a full page, along with what it produced
/// besides markup
#[derive(Debug)]
pub struct PageFragment {
    pub html: String,
    /// `Set-Cookie` header values to send with the page
    pub set_cookies: Vec<String>,
    /// Events dispatched while rendering
    pub triggers: Vec<Trigger>,
    pub redirect: Option<String>,
    pub location: Option<Location>,
}

/// Renders components and answers the synchronization requests of
/// tether-client. The host web server routes `POST {path_prefix}/...` to
/// [`Server::handle`] and embeds [`Server::render_page`] output in its pages.
pub struct Server {
    config: ServerConfig,
    codec: Arc<StateCodec>,
    registry: Arc<Registry>,
    converters: Arc<Converters>,
    app_cache: Arc<CacheStore>,
}

impl Server {
    /// Create a new Server
    pub fn new(config: ServerConfig) -> Self {
        let codec = Arc::new(StateCodec::new(&config.codec));
        Self {
            config,
            codec,
            registry: Arc::new(Registry::default()),
            converters: Arc::new(Converters::new()),
            app_cache: Arc::new(CacheStore::new()),
        }
    }

    // Registration

    /// Registers component type `C`, building its descriptor
    pub fn register<C: Component>(&mut self) -> Result<&mut Self, DescriptorError> {
        Arc::make_mut(&mut self.registry).register::<C>()?;
        Ok(self)
    }

    /// Replaces the built-in conversion of bound values of type `T`
    pub fn convert<T, F>(&mut self, convert: F) -> &mut Self
    where
        T: 'static,
        F: Fn(&WireValue) -> Option<T> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.converters).register(convert);
        self
    }

    /// Runs `map` on every bound value of type `T`, such as trimming strings
    pub fn map_values<T, F>(&mut self, map: F) -> &mut Self
    where
        T: 'static,
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.converters).map(map);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn codec(&self) -> &StateCodec {
        &self.codec
    }

    /// Issues an antiforgery token to embed in a page, when a validator is
    /// configured
    pub fn antiforgery_token(&self, request: &RequestInfo) -> Option<String> {
        self.config
            .antiforgery
            .as_ref()
            .map(|antiforgery| antiforgery.validator.issue(request))
    }

    // Rendering

    /// Renders `C` for a full page. The component gets no parent, its id is
    /// seeded with a random nonce so several instances can share a page.
    pub fn render_page<C: Component>(
        &self,
        request: &RequestInfo,
        key: Option<&str>,
        parameters: Value,
    ) -> Result<PageFragment, TetherServerError> {
        let descriptor = self
            .registry
            .descriptor::<C>()
            .ok_or(TetherServerError::NotRegistered { type_name: C::NAME })?;
        let scope = self.render_scope(Arc::new(request.clone()), Vec::new(), false);
        let nonce = format!("{:032x}", fastrand::u128(..));

        let mut output = NestedOutput::default();
        let html = render_static(
            &scope,
            &descriptor,
            StaticRender {
                id: derive_id(&nonce, C::NAME, key),
                parent_id: None,
                key,
                parameters,
                operation_id: fresh_operation_id(),
            },
            &mut output,
        )?;
        Ok(PageFragment {
            html,
            set_cookies: scope.request.set_cookie_headers(),
            triggers: output.events.iter().map(|event| event.to_trigger()).collect(),
            redirect: output.redirect,
            location: output.location,
        })
    }

    // Requests

    /// Answers a request to a component endpoint.
    ///
    /// Synchronization requests run the full pipeline; other POSTs render a
    /// fresh instance with the parameters of `Tether-Parameters`.
    pub async fn handle<B: AsRef<[u8]>>(&self, request: &http::Request<B>) -> Response<String> {
        let path = request.uri().path();
        let route = match Route::parse(&self.config.path_prefix, path) {
            Some(route) if request.method() == Method::POST => route,
            _ => {
                return error_response(&TetherServerError::NotFound {
                    path: path.to_string(),
                })
            }
        };
        let info = RequestInfo::from_request(request);

        if !info.is_synchronization() {
            return self.render_route(info, &route.component);
        }
        match Envelope::parse(route, request.headers(), request.body().as_ref()) {
            Ok(envelope) => self.synchronize(info, envelope).await,
            Err(err) => {
                warn!("Rejected synchronization request to '{path}': {err}");
                error_response(&err.into())
            }
        }
    }

    /// Runs a parsed synchronization request. Hosts that extract uploaded
    /// files parse the envelope themselves, attach the files with
    /// [`Envelope::with_files`] and call this.
    pub async fn synchronize(&self, info: RequestInfo, envelope: Envelope) -> Response<String> {
        if let Some(rejection) = self.check_antiforgery(&info) {
            return rejection;
        }
        let Some(runtime) = self.registry.runtime(&envelope.component) else {
            return error_response(&TetherServerError::UnknownComponent {
                name: envelope.component,
            });
        };

        let scope = self.render_scope(Arc::new(info), envelope.rendered_ids.clone(), true);
        match runtime.synchronize(scope, envelope).await {
            Ok(reply) => reply_response(reply).unwrap_or_else(|err| error_response(&err.into())),
            Err(err) => {
                warn!("Synchronization of component '{}' failed: {err}", runtime.name());
                error_response(&err)
            }
        }
    }

    fn render_route(&self, info: RequestInfo, component: &str) -> Response<String> {
        let Some(runtime) = self.registry.runtime(component) else {
            return error_response(&TetherServerError::UnknownComponent {
                name: component.to_string(),
            });
        };
        let parameters = match header_json::<Value>(&info.headers, headers::PARAMETERS) {
            Ok(parameters) => parameters.unwrap_or(Value::Null),
            Err(err) => return error_response(&err.into()),
        };

        let scope = self.render_scope(Arc::new(info), Vec::new(), false);
        let mut output = NestedOutput::default();
        let html = match runtime.render_static(&scope, parameters, &mut output) {
            Ok(html) => html,
            Err(err) => {
                warn!("Rendering component '{}' failed: {err}", runtime.name());
                return error_response(&err.into());
            }
        };
        info!("Rendered component '{}'", runtime.name());

        let mut response = text_response(StatusCode::OK, HTML, html);
        for cookie in scope.request.set_cookie_headers() {
            if let Ok(value) = header_value("set-cookie", &cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }

    fn check_antiforgery(&self, info: &RequestInfo) -> Option<Response<String>> {
        let antiforgery = self.config.antiforgery.as_ref()?;
        let token = info.header(&antiforgery.header_name);
        if antiforgery.validator.validate(info, token) {
            return None;
        }

        warn!("Rejected synchronization request with an invalid antiforgery token");
        let fresh = antiforgery.validator.issue(info);
        let mut response = json_response(
            StatusCode::BAD_REQUEST,
            &AntiforgeryRefresh {
                token: fresh.clone(),
            },
        );
        if let Ok(value) = header_value(headers::REFRESH_ANTIFORGERY_TOKEN, &fresh) {
            response
                .headers_mut()
                .insert(headers::REFRESH_ANTIFORGERY_TOKEN, value);
        }
        Some(response)
    }

    fn render_scope(
        &self,
        request: Arc<RequestInfo>,
        rendered_ids: Vec<tether_shared::ComponentId>,
        synchronizing: bool,
    ) -> RenderScope {
        RenderScope {
            request: Arc::new(RequestScope::new(
                request,
                self.codec.clone(),
                self.converters.clone(),
                self.app_cache.clone(),
                self.config.expose_error_details,
            )),
            registry: self.registry.clone(),
            rendered_ids,
            synchronizing,
            path_prefix: self.config.path_prefix.clone(),
        }
    }
}

fn reply_response(reply: Reply) -> Result<Response<String>, ProtocolError> {
    let skip_output = reply.html.is_none();
    let mut response = text_response(StatusCode::OK, HTML, reply.html.unwrap_or_default());
    let response_headers = response.headers_mut();

    if skip_output {
        response_headers.insert(headers::SKIP_OUTPUT, HeaderValue::from_static(headers::TRUE));
    }
    if !reply.triggers.is_empty() {
        response_headers.insert(
            headers::TRIGGER,
            json_header_value(headers::TRIGGER, &reply.triggers)?,
        );
    }
    if !reply.scripts.is_empty() {
        response_headers.insert(headers::JS, json_header_value(headers::JS, &reply.scripts)?);
    }
    if let Some(redirect) = &reply.redirect {
        response_headers.insert(headers::REDIRECT, header_value(headers::REDIRECT, redirect)?);
    }
    if let Some(location) = &reply.location {
        response_headers.insert(
            headers::LOCATION,
            json_header_value(headers::LOCATION, location)?,
        );
        if let Some(target) = &location.target {
            response_headers.insert(
                headers::LOCATION_TARGET,
                header_value(headers::LOCATION_TARGET, target)?,
            );
        }
    }
    response_headers.insert(
        headers::OPERATION_ID,
        header_value(headers::OPERATION_ID, reply.operation_id.as_str())?,
    );
    for cookie in &reply.set_cookies {
        response_headers.append(SET_COOKIE, header_value("set-cookie", cookie)?);
    }
    Ok(response)
}

fn error_response(error: &TetherServerError) -> Response<String> {
    let status = error.status();
    match error {
        TetherServerError::AuthorizationDenied { .. }
        | TetherServerError::NotFound { .. }
        | TetherServerError::UnknownComponent { .. } => {
            text_response(status, HTML, String::new())
        }
        TetherServerError::InvalidActionCall(ActionError::WrongParameters { received, .. }) => {
            json_response(
                status,
                &ErrorBody {
                    message: error.to_string(),
                    data: Some(json!({ "received": received })),
                },
            )
        }
        _ => json_response(
            status,
            &ErrorBody {
                message: error.to_string(),
                data: None,
            },
        ),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<String> {
    // the bodies are plain structs of strings and JSON values
    let body = serde_json::to_string(body).unwrap_or_default();
    text_response(status, JSON, body)
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
