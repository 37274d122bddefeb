use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::{debug, warn};
use serde_json::{Map, Value};

use tether_shared::{Location, OperationId, PropertyPath, Trigger};

use crate::{
    binding::{BindCx, BindingError, WireValue},
    component::{
        ActionDescriptor, Args, Bind, Component, ComponentDescriptor, ComponentError, Event,
        EventHandler, SubscriptionHandler,
    },
    context::{fresh_operation_id, Context, ContextInit},
    envelope::{Envelope, RequestKind},
    error::TetherServerError,
    render::{render_markup, NestedOutput, RenderScope},
};

/// Form fields the client uses for its own bookkeeping
const RESERVED_FIELD_PREFIX: &str = "__";

/// Outcome of a synchronization request, before it becomes a response
#[derive(Debug)]
pub(crate) struct Reply {
    /// `None` answers with `Tether-Skip-Output`
    pub(crate) html: Option<String>,
    pub(crate) triggers: Vec<Trigger>,
    pub(crate) scripts: Vec<String>,
    pub(crate) redirect: Option<String>,
    pub(crate) location: Option<Location>,
    pub(crate) operation_id: OperationId,
    pub(crate) set_cookies: Vec<String>,
}

/// Runs a synchronization request against a fresh instance of `C`.
///
/// Decoding the token, resolving the action and authorizing happen before
/// anything from the request touches the component; failures there become
/// error responses. Failures after that point go through
/// [`Component::handle_error`] and answer with skipped output.
pub(crate) async fn synchronize<C: Component>(
    descriptor: Arc<ComponentDescriptor<C>>,
    scope: RenderScope,
    envelope: Envelope,
) -> Result<Reply, TetherServerError> {
    let component_id = envelope.target_id()?.clone();
    let prior = scope.request.codec.decode(&envelope.token)?;

    let mut component = C::default();
    descriptor.load_state(&mut component, &prior.state);

    let action = match &envelope.kind {
        RequestKind::Action { name, parameters } => Some((
            descriptor.resolve_action(name, parameters)?,
            parameters.clone(),
        )),
        RequestKind::Bind | RequestKind::Event { .. } => None,
    };

    if !descriptor.authorize_request(&scope.request.request, &component) {
        return Err(TetherServerError::AuthorizationDenied { component: C::NAME });
    }

    let mut ctx = Context::new(
        scope.request.clone(),
        ContextInit {
            component_id,
            component_name: C::NAME,
            parent_id: envelope.parent_id.clone(),
            key: prior.key,
            operation_id: envelope
                .operation_id
                .clone()
                .unwrap_or_else(fresh_operation_id),
            is_mount: false,
            client_event: envelope.client_event.clone(),
            descriptor: descriptor.clone(),
        },
    );
    ctx.touched = prior.touched;
    ctx.model_touched = prior.model_touched;

    let mut output = NestedOutput::default();
    let processed = AssertUnwindSafe(process(
        &descriptor,
        &scope,
        &envelope,
        action,
        &mut component,
        &mut ctx,
        &mut output,
    ))
    .catch_unwind()
    .await;

    let html = match processed {
        Ok(Ok(html)) => html,
        Ok(Err(error)) => {
            recover(&mut component, &mut ctx, error);
            None
        }
        Err(panic) => {
            let error = ComponentError::Panicked {
                message: panic_message(panic.as_ref()),
            };
            recover(&mut component, &mut ctx, error);
            None
        }
    };

    let operation_id = ctx.operation_id().clone();
    let mut triggers: Vec<Trigger> = ctx.outbound.iter().map(|event| event.to_trigger()).collect();
    triggers.extend(output.events.iter().map(|event| event.to_trigger()));
    Ok(Reply {
        html,
        triggers,
        scripts: ctx.scripts,
        redirect: ctx.redirect.or(output.redirect),
        location: ctx.location.or(output.location),
        operation_id,
        set_cookies: scope.request.set_cookie_headers(),
    })
}

async fn process<C: Component>(
    descriptor: &ComponentDescriptor<C>,
    scope: &RenderScope,
    envelope: &Envelope,
    action: Option<(&ActionDescriptor<C>, Map<String, Value>)>,
    component: &mut C,
    ctx: &mut Context,
    output: &mut NestedOutput,
) -> Result<Option<String>, ComponentError> {
    for (name, value) in &envelope.form {
        if name.starts_with(RESERVED_FIELD_PREFIX) {
            continue;
        }
        let path = match PropertyPath::parse(name) {
            Ok(path) => path,
            Err(err) => {
                warn!("Skipping form field '{name}' of component '{}': {err}", C::NAME);
                ctx.binding_errors.push(err.into());
                continue;
            }
        };
        bind_field(descriptor, scope, component, ctx, &path, value)?;
    }

    if let RequestKind::Event {
        name,
        subject,
        data,
    } = &envelope.kind
    {
        for subscription in descriptor.subscriptions_for(name, subject.as_deref()) {
            match &subscription.handler {
                SubscriptionHandler::Bind => {
                    let bind: Bind = serde_json::from_value(data.clone())
                        .map_err(|err| ComponentError::serialization(Bind::NAME, err))?;
                    let path = PropertyPath::parse(&bind.name).map_err(BindingError::from)?;
                    bind_field(descriptor, scope, component, ctx, &path, &WireValue::Json(bind.value))?;
                }
                SubscriptionHandler::Typed(handler) => {
                    handler.call(component, ctx, data.clone()).await?;
                }
            }
        }
    }

    let mut skip_output = false;
    if let Some((action, parameters)) = action {
        debug!("Calling action '{}' on component '{}'", action.name(), C::NAME);
        let args = Args::new(parameters, scope.request.converters.clone());
        action.call(component, ctx, args).await?;
        skip_output = action.skips_output();
    }

    ctx.validation = descriptor.validate(component, &ctx.touched, ctx.model_touched);

    if skip_output || !component.should_render() {
        return Ok(None);
    }
    component.render(ctx)?;
    let html = render_markup(scope, descriptor, component, ctx, output, false)?;
    component.after_render(ctx, false);
    Ok(Some(html))
}

/// Binds one value. A value that doesn't bind is logged and recorded, the
/// request carries on; an error from the `bind` hook fails the request.
fn bind_field<C: Component>(
    descriptor: &ComponentDescriptor<C>,
    scope: &RenderScope,
    component: &mut C,
    ctx: &mut Context,
    path: &PropertyPath,
    value: &WireValue,
) -> Result<(), ComponentError> {
    let cx = BindCx::new(&scope.request.converters, path);
    match descriptor.bind_property(component, path.root(), path.rest(), value, &cx) {
        Ok(()) => {
            ctx.touch(path.root());
            component.bind(ctx, path, value)
        }
        Err(err @ BindingError::UnknownProperty { .. }) => {
            debug!("{err}");
            ctx.binding_errors.push(err);
            Ok(())
        }
        Err(err) => {
            warn!("{err}");
            ctx.binding_errors.push(err);
            Ok(())
        }
    }
}

fn recover<C: Component>(component: &mut C, ctx: &mut Context, error: ComponentError) {
    warn!("Component '{}' failed: {error}", C::NAME);
    component.handle_error(ctx, &error);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
