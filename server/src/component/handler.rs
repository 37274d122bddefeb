use std::{marker::PhantomData, sync::Arc};

use futures::future::{self, BoxFuture};
use serde_json::{Map, Value};

use tether_shared::PropertyPath;

use super::{ComponentError, Event};
use crate::{
    binding::{BindCx, Bindable, BindingError, Converters, WireValue},
    Context,
};

/// Parameters of an action call.
///
/// Values are converted with the same rules as bound properties.
pub struct Args {
    values: Map<String, Value>,
    converters: Arc<Converters>,
}

impl Args {
    pub(crate) fn new(values: Map<String, Value>, converters: Arc<Converters>) -> Self {
        Self { values, converters }
    }

    pub fn get<T: Bindable + Default>(&self, name: &str) -> Result<T, BindingError> {
        let raw = self
            .values
            .get(name)
            .ok_or_else(|| BindingError::MissingParameter {
                name: name.to_string(),
            })?;
        let path = PropertyPath::parse(name)?;
        let cx = BindCx::new(&self.converters, &path);
        let mut value = T::default();
        value.bind(&[], &WireValue::Json(raw.clone()), &cx)?;
        Ok(value)
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Future returned by async actions and subscriptions
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), ComponentError>>;

pub(crate) trait ActionHandler<C>: Send + Sync {
    fn call<'a>(&'a self, component: &'a mut C, ctx: &'a mut Context, args: Args)
        -> HandlerFuture<'a>;
}

pub(crate) trait EventHandler<C>: Send + Sync {
    fn call<'a>(&'a self, component: &'a mut C, ctx: &'a mut Context, data: Value)
        -> HandlerFuture<'a>;
}

pub(crate) struct SyncAction<F> {
    pub(crate) handler: F,
}

impl<C, F> ActionHandler<C> for SyncAction<F>
where
    F: Fn(&mut C, &mut Context, &Args) -> Result<(), ComponentError> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        component: &'a mut C,
        ctx: &'a mut Context,
        args: Args,
    ) -> HandlerFuture<'a> {
        Box::pin(future::ready((self.handler)(component, ctx, &args)))
    }
}

pub(crate) struct AsyncAction<F> {
    pub(crate) handler: F,
}

impl<C, F> ActionHandler<C> for AsyncAction<F>
where
    F: for<'a> Fn(&'a mut C, &'a mut Context, Args) -> HandlerFuture<'a> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        component: &'a mut C,
        ctx: &'a mut Context,
        args: Args,
    ) -> HandlerFuture<'a> {
        (self.handler)(component, ctx, args)
    }
}

pub(crate) struct SyncSubscription<E, F> {
    pub(crate) handler: F,
    pub(crate) phantom_e: PhantomData<fn(E)>,
}

impl<C, E, F> EventHandler<C> for SyncSubscription<E, F>
where
    E: Event,
    F: Fn(&mut C, &mut Context, E) -> Result<(), ComponentError> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        component: &'a mut C,
        ctx: &'a mut Context,
        data: Value,
    ) -> HandlerFuture<'a> {
        let result = decode_event::<E>(data).and_then(|event| (self.handler)(component, ctx, event));
        Box::pin(future::ready(result))
    }
}

pub(crate) struct AsyncSubscription<E, F> {
    pub(crate) handler: F,
    pub(crate) phantom_e: PhantomData<fn(E)>,
}

impl<C, E, F> EventHandler<C> for AsyncSubscription<E, F>
where
    E: Event,
    F: for<'a> Fn(&'a mut C, &'a mut Context, E) -> HandlerFuture<'a> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        component: &'a mut C,
        ctx: &'a mut Context,
        data: Value,
    ) -> HandlerFuture<'a> {
        match decode_event::<E>(data) {
            Ok(event) => (self.handler)(component, ctx, event),
            Err(err) => Box::pin(future::ready(Err(err))),
        }
    }
}

fn decode_event<E: Event>(data: Value) -> Result<E, ComponentError> {
    serde_json::from_value(data).map_err(|err| ComponentError::serialization(E::NAME, err))
}
