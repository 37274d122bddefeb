mod cache;
mod cookies;

pub use cache::{CacheLifetime, Cached};
pub use cookies::{CookieOptions, CookieStorage};

pub(crate) use cache::{CacheKey, CacheStore};
pub(crate) use cookies::PendingCookie;

use std::{any::Any, collections::BTreeSet, sync::Arc};

use log::debug;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use tether_shared::{ComponentId, Location, OperationId, Scope, StateCodec};

use crate::{
    authorization::RequestInfo,
    binding::{BindingError, Converters},
    component::{Component, ComponentDescriptor, ComponentError, Event},
    events::OutboundEvent,
    validation::{ValidationError, ValidationOutcome},
};

const USER_SAFE_MESSAGE: &str =
    "There was a problem with this operation and the changes weren't saved";

/// Everything shared by the components taking part in one request
pub(crate) struct RequestScope {
    pub(crate) request: Arc<RequestInfo>,
    pub(crate) codec: Arc<StateCodec>,
    pub(crate) converters: Arc<Converters>,
    pub(crate) request_cache: Arc<CacheStore>,
    pub(crate) app_cache: Arc<CacheStore>,
    pub(crate) cookies: Mutex<Vec<PendingCookie>>,
    pub(crate) expose_error_details: bool,
}

impl RequestScope {
    pub(crate) fn new(
        request: Arc<RequestInfo>,
        codec: Arc<StateCodec>,
        converters: Arc<Converters>,
        app_cache: Arc<CacheStore>,
        expose_error_details: bool,
    ) -> Self {
        Self {
            request,
            codec,
            converters,
            request_cache: Arc::new(CacheStore::new()),
            app_cache,
            cookies: Mutex::new(Vec::new()),
            expose_error_details,
        }
    }

    pub(crate) fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies
            .lock()
            .iter()
            .map(|cookie| cookie.header.clone())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(request: Arc<RequestInfo>) -> Self {
        Self::new(
            request,
            Arc::new(StateCodec::new(&tether_shared::CodecConfig::default())),
            Arc::new(Converters::new()),
            Arc::new(CacheStore::new()),
            false,
        )
    }
}

/// A random operation id for work the server starts on its own
pub(crate) fn fresh_operation_id() -> OperationId {
    OperationId::new(format!("{:032x}", fastrand::u128(..)))
}

/// Who a component is and where it sits in the tree
pub(crate) struct ContextInit {
    pub(crate) component_id: ComponentId,
    pub(crate) component_name: &'static str,
    pub(crate) parent_id: Option<ComponentId>,
    pub(crate) key: Option<String>,
    pub(crate) operation_id: OperationId,
    pub(crate) is_mount: bool,
    pub(crate) client_event: Option<String>,
    /// `Arc<ComponentDescriptor<C>>` of the component's type
    pub(crate) descriptor: Arc<dyn Any + Send + Sync>,
}

/// Per-request view of a component's surroundings, handed to every hook and
/// handler.
///
/// Collects what the request produces besides markup: outbound events,
/// client scripts, redirects and cookies.
pub struct Context {
    scope: Arc<RequestScope>,
    component_id: ComponentId,
    component_name: &'static str,
    parent_id: Option<ComponentId>,
    key: Option<String>,
    operation_id: OperationId,
    is_mount: bool,
    client_event: Option<String>,
    descriptor: Arc<dyn Any + Send + Sync>,
    pub(crate) touched: BTreeSet<String>,
    pub(crate) model_touched: bool,
    pub(crate) validation: ValidationOutcome,
    pub(crate) binding_errors: Vec<BindingError>,
    pub(crate) outbound: Vec<OutboundEvent>,
    pub(crate) scripts: Vec<String>,
    pub(crate) redirect: Option<String>,
    pub(crate) location: Option<Location>,
}

impl Context {
    pub(crate) fn new(scope: Arc<RequestScope>, init: ContextInit) -> Self {
        Self {
            scope,
            component_id: init.component_id,
            component_name: init.component_name,
            parent_id: init.parent_id,
            key: init.key,
            operation_id: init.operation_id,
            is_mount: init.is_mount,
            client_event: init.client_event,
            descriptor: init.descriptor,
            touched: BTreeSet::new(),
            model_touched: false,
            validation: ValidationOutcome::default(),
            binding_errors: Vec::new(),
            outbound: Vec::new(),
            scripts: Vec::new(),
            redirect: None,
            location: None,
        }
    }

    // Identity

    pub fn id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn parent_id(&self) -> Option<&ComponentId> {
        self.parent_id.as_ref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    /// Whether this is the first render of the component
    pub fn is_mount(&self) -> bool {
        self.is_mount
    }

    /// Name of the DOM event that caused the request, when the client sent one
    pub fn client_event_name(&self) -> Option<&str> {
        self.client_event.as_deref()
    }

    pub fn request(&self) -> &RequestInfo {
        &self.scope.request
    }

    // Events

    /// Dispatches `event` to the given scope, with the request's operation id
    pub fn dispatch<E: Event>(&mut self, event: E, scope: Scope) -> Result<(), ComponentError> {
        let operation_id = self.operation_id.clone();
        self.push_event(event, scope, None, operation_id)
    }

    /// Dispatches `event` to every subscriber on the page. With a `subject`,
    /// subscriptions for another subject don't see it.
    pub fn dispatch_global<E: Event>(
        &mut self,
        event: E,
        subject: Option<&str>,
    ) -> Result<(), ComponentError> {
        let operation_id = self.operation_id.clone();
        self.push_event(event, Scope::Global, subject.map(str::to_string), operation_id)
    }

    /// Dispatches `event` as an operation of its own, so the client doesn't
    /// hold this request's busy state while the event is handled
    pub fn dispatch_async<E: Event>(
        &mut self,
        event: E,
        scope: Scope,
    ) -> Result<(), ComponentError> {
        self.push_event(event, scope, None, fresh_operation_id())
    }

    fn push_event<E: Event>(
        &mut self,
        event: E,
        scope: Scope,
        subject: Option<String>,
        operation_id: OperationId,
    ) -> Result<(), ComponentError> {
        let target = match scope {
            Scope::Global => None,
            Scope::Parent => match &self.parent_id {
                Some(parent) => Some(parent.clone()),
                None => {
                    debug!(
                        "Dropping '{}' from component '{}': no parent to receive it",
                        E::NAME,
                        self.component_name
                    );
                    return Ok(());
                }
            },
        };
        let data =
            serde_json::to_value(&event).map_err(|err| ComponentError::serialization(E::NAME, err))?;
        self.outbound.push(OutboundEvent {
            name: E::NAME,
            data,
            scope,
            subject,
            operation_id,
            target,
        });
        Ok(())
    }

    // Client effects

    /// Runs `script` on the client once the response is applied
    pub fn execute_js(&mut self, script: impl Into<String>) {
        self.scripts.push(script.into());
    }

    /// Sends the browser to `url` with a full page load
    pub fn redirect(&mut self, url: impl Into<String>) {
        self.redirect = Some(url.into());
    }

    /// Loads `location.path` into the page without a full reload
    pub fn location(&mut self, location: Location) {
        self.location = Some(location);
    }

    /// Payload a previous request attached with [`Context::location`]
    pub fn payload<T: DeserializeOwned>(&self) -> Result<Option<T>, ComponentError> {
        Ok(self.scope.request.payload()?)
    }

    // Stores

    /// Returns the value cached under `key`, computing it with `init` when
    /// there is none. Application values are private to this component.
    pub fn cache<T, F>(
        &self,
        key: &str,
        lifetime: CacheLifetime,
        init: F,
    ) -> Result<Cached<T>, ComponentError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let (store, key) = match lifetime {
            CacheLifetime::Request => (
                &self.scope.request_cache,
                CacheKey {
                    scope: String::new(),
                    name: key.to_string(),
                },
            ),
            CacheLifetime::Application => (
                &self.scope.app_cache,
                CacheKey {
                    scope: self.component_id.to_string(),
                    name: key.to_string(),
                },
            ),
        };
        let value = store.get_or_init(&key, init)?;
        Ok(Cached::new(value, store.clone(), key))
    }

    pub fn cookies(&self) -> CookieStorage<'_> {
        CookieStorage::new(&self.scope)
    }

    // Validation

    /// Marks the whole model touched and validates it, as on an explicit submit
    pub fn validate<C: Component>(&mut self, component: &C) -> Result<bool, ComponentError> {
        let descriptor = self
            .descriptor
            .downcast_ref::<ComponentDescriptor<C>>()
            .ok_or(ComponentError::NotRegistered { type_name: C::NAME })?;
        self.model_touched = true;
        self.validation = descriptor.validate(component, &self.touched, true);
        Ok(self.validation.is_valid())
    }

    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.validation.errors
    }

    /// Form fields of this request that failed to bind
    pub fn binding_errors(&self) -> &[BindingError] {
        &self.binding_errors
    }

    pub fn is_touched(&self, root: &str) -> bool {
        self.model_touched || self.touched.contains(root)
    }

    pub(crate) fn touch(&mut self, root: &str) {
        self.touched.insert(root.to_string());
    }

    /// The message shown to users for `error`. Details are only exposed when
    /// `ServerConfig::expose_error_details` is set.
    pub fn user_safe_message(&self, error: &ComponentError) -> String {
        if self.scope.expose_error_details {
            error.to_string()
        } else {
            USER_SAFE_MESSAGE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, Method, Uri};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Saved {
        id: u32,
    }

    impl Event for Saved {
        const NAME: &'static str = "Saved";
    }

    fn context(parent: Option<&str>) -> Context {
        let request = Arc::new(RequestInfo::new(
            Method::POST,
            Uri::from_static("/tether/list"),
            HeaderMap::new(),
        ));
        Context::new(
            Arc::new(RequestScope::for_tests(request)),
            ContextInit {
                component_id: tether_shared::derive_id("root", "list", None),
                component_name: "list",
                parent_id: parent.map(|p| tether_shared::derive_id(p, "page", None)),
                key: None,
                operation_id: OperationId::new("op-1"),
                is_mount: false,
                client_event: None,
                descriptor: Arc::new(()),
            },
        )
    }

    #[test]
    fn parent_dispatch_without_parent_is_dropped() {
        let mut ctx = context(None);
        ctx.dispatch(Saved { id: 1 }, Scope::Parent).unwrap();
        assert!(ctx.outbound.is_empty());
    }

    #[test]
    fn parent_dispatch_targets_the_parent() {
        let mut ctx = context(Some("root"));
        ctx.dispatch(Saved { id: 1 }, Scope::Parent).unwrap();
        let event = &ctx.outbound[0];
        assert_eq!(event.target.as_ref(), ctx.parent_id());
        assert_eq!(event.operation_id.as_str(), "op-1");
        assert_eq!(event.data, json!({ "id": 1 }));
    }

    #[test]
    fn async_dispatch_gets_its_own_operation() {
        let mut ctx = context(None);
        ctx.dispatch_async(Saved { id: 2 }, Scope::Global).unwrap();
        ctx.dispatch_global(Saved { id: 3 }, Some("orders")).unwrap();
        assert_ne!(ctx.outbound[0].operation_id.as_str(), "op-1");
        assert_eq!(ctx.outbound[1].operation_id.as_str(), "op-1");
        assert_eq!(ctx.outbound[1].subject.as_deref(), Some("orders"));
    }

    #[test]
    fn request_cache_is_shared_by_key_only() {
        let ctx = context(None);
        let first = ctx.cache("rates", CacheLifetime::Request, || 7u32).unwrap();
        let second = ctx.cache("rates", CacheLifetime::Request, || 8u32).unwrap();
        assert_eq!(*first, 7);
        assert_eq!(*second, 7);
        second.reset();
        assert_eq!(*ctx.cache("rates", CacheLifetime::Request, || 9u32).unwrap(), 9);
    }

    #[test]
    fn error_details_stay_hidden_by_default() {
        let ctx = context(None);
        let message = ctx.user_safe_message(&ComponentError::new("db down"));
        assert_eq!(message, USER_SAFE_MESSAGE);
    }
}
