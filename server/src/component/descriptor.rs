use std::{
    collections::{BTreeSet, HashMap},
    marker::PhantomData,
    time::Duration,
};

use log::{trace, warn};
use serde_json::{Map, Value};

use tether_shared::{Segment, StateMap};

use super::{
    handler::{
        ActionHandler, AsyncAction, AsyncSubscription, EventHandler, HandlerFuture, SyncAction,
        SyncSubscription,
    },
    ActionError, Args, Bind, Component, ComponentError, DescriptorError, Event,
};
use crate::{
    authorization::{AuthorizationFilter, RequestInfo},
    binding::{BindCx, Bindable, BindingError, WireValue},
    validation::{PredicateRule, Rule, ValidationOutcome, ValidationReport},
    Context,
};

trait PropertyAccess<C>: Send + Sync {
    fn read(&self, component: &C) -> Result<Value, serde_json::Error>;
    fn write(&self, component: &mut C, value: Value) -> Result<(), serde_json::Error>;
    fn bind(
        &self,
        component: &mut C,
        path: &[Segment],
        value: &WireValue,
        cx: &BindCx<'_>,
    ) -> Result<(), BindingError>;
}

struct FieldAccess<C, T> {
    get: fn(&C) -> &T,
    get_mut: fn(&mut C) -> &mut T,
}

impl<C, T: Bindable> PropertyAccess<C> for FieldAccess<C, T> {
    fn read(&self, component: &C) -> Result<Value, serde_json::Error> {
        serde_json::to_value((self.get)(component))
    }

    fn write(&self, component: &mut C, value: Value) -> Result<(), serde_json::Error> {
        *(self.get_mut)(component) = serde_json::from_value(value)?;
        Ok(())
    }

    fn bind(
        &self,
        component: &mut C,
        path: &[Segment],
        value: &WireValue,
        cx: &BindCx<'_>,
    ) -> Result<(), BindingError> {
        (self.get_mut)(component).bind(path, value, cx)
    }
}

struct StateProperty<C> {
    name: &'static str,
    /// Transient properties bind but are not carried in the state token
    persisted: bool,
    access: Box<dyn PropertyAccess<C>>,
}

/// A declared action.
///
/// Returned by [`ComponentDescriptor::action`] so the declaration can be
/// refined with [`skip_output`](Self::skip_output) and [`poll`](Self::poll).
pub struct ActionDescriptor<C> {
    name: &'static str,
    parameters: Vec<&'static str>,
    skip_output: bool,
    poll: Option<Duration>,
    handler: Box<dyn ActionHandler<C>>,
}

impl<C> ActionDescriptor<C> {
    /// Answer calls with `Tether-Skip-Output` instead of re-rendering
    pub fn skip_output(&mut self) -> &mut Self {
        self.skip_output = true;
        self
    }

    /// Have the client call this action every `interval` while the page is visible
    pub fn poll(&mut self, interval: Duration) -> &mut Self {
        self.poll = Some(interval);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &[&'static str] {
        &self.parameters
    }

    pub fn skips_output(&self) -> bool {
        self.skip_output
    }

    pub(crate) fn call<'a>(
        &'a self,
        component: &'a mut C,
        ctx: &'a mut Context,
        args: Args,
    ) -> HandlerFuture<'a> {
        self.handler.call(component, ctx, args)
    }

    fn takes_exactly(&self, received: &BTreeSet<&str>) -> bool {
        self.parameters.len() == received.len()
            && self.parameters.iter().all(|name| received.contains(name))
    }
}

pub(crate) enum SubscriptionHandler<C> {
    /// The built-in [`Bind`] subscription
    Bind,
    Typed(Box<dyn EventHandler<C>>),
}

pub(crate) struct Subscription<C> {
    pub(crate) name: &'static str,
    pub(crate) subject: Option<String>,
    pub(crate) handler: SubscriptionHandler<C>,
}

impl<C> Subscription<C> {
    fn matches(&self, name: &str, subject: Option<&str>) -> bool {
        self.name == name
            && self
                .subject
                .as_deref()
                .map_or(true, |wanted| subject == Some(wanted))
    }
}

/// Everything the server knows about a component type, built once by
/// [`Component::describe`] when the type is registered.
pub struct ComponentDescriptor<C: Component> {
    properties: Vec<StateProperty<C>>,
    actions: Vec<ActionDescriptor<C>>,
    action_index: HashMap<String, Vec<usize>>,
    subscriptions: Vec<Subscription<C>>,
    rules: Vec<Box<dyn Rule<C>>>,
    filters: Vec<Box<dyn AuthorizationFilter<C>>>,
    problems: Vec<DescriptorError>,
}

impl<C: Component> ComponentDescriptor<C> {
    pub(crate) fn new() -> Self {
        Self {
            properties: Vec::new(),
            actions: Vec::new(),
            action_index: HashMap::new(),
            subscriptions: vec![Subscription {
                name: Bind::NAME,
                subject: None,
                handler: SubscriptionHandler::Bind,
            }],
            rules: Vec::new(),
            filters: Vec::new(),
            problems: Vec::new(),
        }
    }

    /// Builds and checks the descriptor of `C`
    pub(crate) fn build() -> Result<Self, DescriptorError> {
        let mut descriptor = Self::new();
        C::describe(&mut descriptor);
        descriptor.finish()
    }

    fn finish(mut self) -> Result<Self, DescriptorError> {
        if let Some(problem) = self.problems.drain(..).next() {
            return Err(problem);
        }

        let mut seen: Vec<(String, BTreeSet<&'static str>)> = Vec::new();
        for (index, action) in self.actions.iter().enumerate() {
            if let Some(interval) = action.poll {
                if !action.parameters.is_empty() {
                    return Err(DescriptorError::PollWithParameters {
                        component: C::NAME,
                        name: action.name,
                    });
                }
                if interval.is_zero() {
                    return Err(DescriptorError::ZeroPollInterval {
                        component: C::NAME,
                        name: action.name,
                    });
                }
            }

            let lower = action.name.to_lowercase();
            let parameters: BTreeSet<&'static str> = action.parameters.iter().copied().collect();
            if seen
                .iter()
                .any(|(name, existing)| *name == lower && *existing == parameters)
            {
                return Err(DescriptorError::DuplicateAction {
                    component: C::NAME,
                    name: action.name,
                });
            }
            seen.push((lower.clone(), parameters));
            self.action_index.entry(lower).or_default().push(index);
        }
        Ok(self)
    }

    // Declarations

    /// Declares a state property carried from request to request
    pub fn state<T: Bindable>(
        &mut self,
        name: &'static str,
        get: fn(&C) -> &T,
        get_mut: fn(&mut C) -> &mut T,
    ) -> &mut Self {
        self.add_property(name, true, get, get_mut)
    }

    /// Declares a property that binds but isn't carried in the state token
    pub fn transient<T: Bindable>(
        &mut self,
        name: &'static str,
        get: fn(&C) -> &T,
        get_mut: fn(&mut C) -> &mut T,
    ) -> &mut Self {
        self.add_property(name, false, get, get_mut)
    }

    fn add_property<T: Bindable>(
        &mut self,
        name: &'static str,
        persisted: bool,
        get: fn(&C) -> &T,
        get_mut: fn(&mut C) -> &mut T,
    ) -> &mut Self {
        if self.properties.iter().any(|property| property.name == name) {
            self.problems.push(DescriptorError::DuplicateProperty {
                component: C::NAME,
                name,
            });
            return self;
        }
        self.properties.push(StateProperty {
            name,
            persisted,
            access: Box::new(FieldAccess { get, get_mut }),
        });
        self
    }

    /// Declares an action callable as `POST {prefix}/{component}/{name}`.
    ///
    /// Requests must name exactly `parameters`.
    pub fn action<F>(
        &mut self,
        name: &'static str,
        parameters: &[&'static str],
        handler: F,
    ) -> &mut ActionDescriptor<C>
    where
        F: Fn(&mut C, &mut Context, &Args) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        self.push_action(name, parameters, Box::new(SyncAction { handler }))
    }

    pub fn action_async<F>(
        &mut self,
        name: &'static str,
        parameters: &[&'static str],
        handler: F,
    ) -> &mut ActionDescriptor<C>
    where
        F: for<'a> Fn(&'a mut C, &'a mut Context, Args) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.push_action(name, parameters, Box::new(AsyncAction { handler }))
    }

    fn push_action(
        &mut self,
        name: &'static str,
        parameters: &[&'static str],
        handler: Box<dyn ActionHandler<C>>,
    ) -> &mut ActionDescriptor<C> {
        let index = self.actions.len();
        self.actions.push(ActionDescriptor {
            name,
            parameters: parameters.to_vec(),
            skip_output: false,
            poll: None,
            handler,
        });
        &mut self.actions[index]
    }

    pub fn subscribe<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(&mut C, &mut Context, E) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        self.push_subscription::<E>(
            None,
            Box::new(SyncSubscription {
                handler,
                phantom_e: PhantomData,
            }),
        )
    }

    /// Subscribes only to events dispatched with `subject`
    pub fn subscribe_subject<E, F>(&mut self, subject: impl Into<String>, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(&mut C, &mut Context, E) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        self.push_subscription::<E>(
            Some(subject.into()),
            Box::new(SyncSubscription {
                handler,
                phantom_e: PhantomData,
            }),
        )
    }

    pub fn subscribe_async<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: Event,
        F: for<'a> Fn(&'a mut C, &'a mut Context, E) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.push_subscription::<E>(
            None,
            Box::new(AsyncSubscription {
                handler,
                phantom_e: PhantomData,
            }),
        )
    }

    fn push_subscription<E: Event>(
        &mut self,
        subject: Option<String>,
        handler: Box<dyn EventHandler<C>>,
    ) -> &mut Self {
        self.subscriptions.push(Subscription {
            name: E::NAME,
            subject,
            handler: SubscriptionHandler::Typed(handler),
        });
        self
    }

    /// Adds a rule failing with `message` on `member` whenever `check` returns false
    pub fn rule(
        &mut self,
        member: &'static str,
        message: impl Into<String>,
        check: fn(&C) -> bool,
    ) -> &mut Self {
        self.rules.push(Box::new(PredicateRule::new(member, message, check)));
        self
    }

    pub fn rule_with<R: Rule<C> + 'static>(&mut self, rule: R) -> &mut Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Adds an authorization filter, evaluated before any binding, event or action
    pub fn authorize<F>(&mut self, filter: F) -> &mut Self
    where
        F: Fn(&RequestInfo, &C) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn authorize_with<A: AuthorizationFilter<C> + 'static>(&mut self, filter: A) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    // Lookups

    pub(crate) fn resolve_action(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<&ActionDescriptor<C>, ActionError> {
        let candidates = self
            .action_index
            .get(&name.to_lowercase())
            .ok_or_else(|| ActionError::NotFound {
                component: C::NAME,
                action: name.to_string(),
            })?;
        let received: BTreeSet<&str> = parameters.keys().map(String::as_str).collect();
        candidates
            .iter()
            .map(|&index| &self.actions[index])
            .find(|action| action.takes_exactly(&received))
            .ok_or_else(|| ActionError::WrongParameters {
                component: C::NAME,
                action: name.to_string(),
                received: parameters.keys().cloned().collect(),
            })
    }

    pub(crate) fn polls(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.actions
            .iter()
            .filter_map(|action| action.poll.map(|interval| (action.name, interval)))
    }

    pub(crate) fn subscriptions_for<'s>(
        &'s self,
        name: &'s str,
        subject: Option<&'s str>,
    ) -> impl Iterator<Item = &'s Subscription<C>> + 's {
        self.subscriptions
            .iter()
            .filter(move |subscription| subscription.matches(name, subject))
    }

    /// Subscriptions advertised to the client, the built-in bind excluded
    pub(crate) fn advertised_subscriptions(&self) -> impl Iterator<Item = &Subscription<C>> {
        self.subscriptions
            .iter()
            .filter(|subscription| matches!(subscription.handler, SubscriptionHandler::Typed(_)))
    }

    pub(crate) fn authorize_request(&self, request: &RequestInfo, component: &C) -> bool {
        self.filters
            .iter()
            .all(|filter| filter.authorize(request, component))
    }

    // State

    /// Restores declared state. Keys that no longer match a property, or no
    /// longer fit its type, are skipped so older tokens keep working.
    pub(crate) fn load_state(&self, component: &mut C, state: &StateMap) {
        for (name, value) in state {
            let Some(property) = self
                .properties
                .iter()
                .find(|property| property.persisted && property.name == name)
            else {
                trace!("Ignoring unknown state property '{name}' for component '{}'", C::NAME);
                continue;
            };
            if let Err(err) = property.access.write(component, value.clone()) {
                warn!(
                    "Ignoring state property '{name}' for component '{}': {err}",
                    C::NAME
                );
            }
        }
    }

    pub(crate) fn save_state(&self, component: &C) -> Result<StateMap, ComponentError> {
        let mut state = StateMap::new();
        for property in self.properties.iter().filter(|property| property.persisted) {
            let value = property
                .access
                .read(component)
                .map_err(|err| ComponentError::serialization(property.name, err))?;
            state.insert(property.name.to_string(), value);
        }
        Ok(state)
    }

    /// Applies mount parameters. Unlike restoring state, a parameter that
    /// doesn't fit is an error: it comes from the application, not a client.
    pub(crate) fn apply_parameters(
        &self,
        component: &mut C,
        parameters: Value,
    ) -> Result<(), ComponentError> {
        let parameters = match parameters {
            Value::Null => return Ok(()),
            Value::Object(parameters) => parameters,
            other => {
                return Err(ComponentError::InvalidParameter {
                    component: C::NAME,
                    name: String::new(),
                    reason: format!("parameters must be a JSON object, got {other}"),
                })
            }
        };
        for (name, value) in parameters {
            let property = self
                .properties
                .iter()
                .find(|property| property.name == name)
                .ok_or_else(|| ComponentError::InvalidParameter {
                    component: C::NAME,
                    name: name.clone(),
                    reason: "no such property".to_string(),
                })?;
            property
                .access
                .write(component, value)
                .map_err(|err| ComponentError::InvalidParameter {
                    component: C::NAME,
                    name: name.clone(),
                    reason: err.to_string(),
                })?;
        }
        Ok(())
    }

    /// Assigns `value` at `path`, `path` being relative to the root property
    pub(crate) fn bind_property(
        &self,
        component: &mut C,
        root: &str,
        path: &[Segment],
        value: &WireValue,
        cx: &BindCx<'_>,
    ) -> Result<(), BindingError> {
        let property = self
            .properties
            .iter()
            .find(|property| property.name == root)
            .ok_or_else(|| BindingError::UnknownProperty {
                component: C::NAME,
                path: cx.path().to_string(),
                segment: root.to_string(),
            })?;
        property.access.bind(component, path, value, cx)
    }

    // Validation

    /// Runs rules and the component's own hook, keeping only failures the
    /// user has touched
    pub(crate) fn validate(
        &self,
        component: &C,
        touched: &BTreeSet<String>,
        model_touched: bool,
    ) -> ValidationOutcome {
        let mut report = ValidationReport::new();
        for rule in &self.rules {
            rule.check(component, &mut report);
        }
        component.validate(&mut report);
        report.into_outcome(touched, model_touched)
    }
}

