mod decorate;

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use tether_shared::{
    derive_id, is_already_rendered, placeholder, ComponentId, ComponentState, EventSubscription,
    Location, OperationId,
};

use crate::{
    component::{Component, ComponentDescriptor, ComponentError, Registry},
    context::{Context, ContextInit, RequestScope},
    events::OutboundEvent,
    validation::ValidationOutcome,
};
use decorate::{decorate, Decoration};

/// Everything needed to render components during one request
pub(crate) struct RenderScope {
    pub(crate) request: Arc<RequestScope>,
    pub(crate) registry: Arc<Registry>,
    /// Components the client already has, only set when synchronizing
    pub(crate) rendered_ids: Vec<ComponentId>,
    pub(crate) synchronizing: bool,
    pub(crate) path_prefix: String,
}

/// What nested components produce besides their markup
#[derive(Default)]
pub(crate) struct NestedOutput {
    pub(crate) events: Vec<OutboundEvent>,
    pub(crate) redirect: Option<String>,
    pub(crate) location: Option<Location>,
}

impl NestedOutput {
    fn absorb(&mut self, ctx: Context) {
        self.events.extend(ctx.outbound);
        if ctx.redirect.is_some() {
            self.redirect = ctx.redirect;
        }
        if ctx.location.is_some() {
            self.location = ctx.location;
        }
    }
}

/// Handed to [`Component::view`]: validation results for the markup, and
/// rendering of nested components.
pub struct ViewContext<'v> {
    scope: &'v RenderScope,
    id: &'v ComponentId,
    validation: &'v ValidationOutcome,
    output: &'v mut NestedOutput,
}

impl<'v> ViewContext<'v> {
    /// Id of the component being rendered
    pub fn id(&self) -> &ComponentId {
        self.id
    }

    /// Messages of the surfaced validation errors for `member`
    pub fn errors_for<'a>(&'a self, member: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.validation.errors_for(member)
    }

    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }

    /// Renders a nested component of type `N`.
    ///
    /// `parameters` is a JSON object applied to the nested component's state
    /// before it mounts. When synchronizing and the client already shows the
    /// component, a placeholder is returned and nothing of `N` runs.
    pub fn component<N: Component>(
        &mut self,
        key: Option<&str>,
        parameters: Value,
    ) -> Result<String, ComponentError> {
        let id = derive_id(self.id.as_str(), N::NAME, key);
        if self.scope.synchronizing && is_already_rendered(&id, &self.scope.rendered_ids) {
            debug!("Component '{}' ({id}) is already rendered", N::NAME);
            return Ok(placeholder(&id));
        }
        let descriptor = self
            .scope
            .registry
            .descriptor::<N>()
            .ok_or(ComponentError::NotRegistered { type_name: N::NAME })?;
        render_static(
            self.scope,
            &descriptor,
            StaticRender {
                id,
                parent_id: Some(self.id.clone()),
                key,
                parameters,
                operation_id: crate::context::fresh_operation_id(),
            },
            self.output,
        )
    }
}

pub(crate) struct StaticRender<'k> {
    pub(crate) id: ComponentId,
    pub(crate) parent_id: Option<ComponentId>,
    pub(crate) key: Option<&'k str>,
    pub(crate) parameters: Value,
    pub(crate) operation_id: OperationId,
}

/// First render of a component: parameters, authorization, mount, render,
/// markup, then `after_render`. A denied request renders nothing.
pub(crate) fn render_static<C: Component>(
    scope: &RenderScope,
    descriptor: &Arc<ComponentDescriptor<C>>,
    render: StaticRender<'_>,
    output: &mut NestedOutput,
) -> Result<String, ComponentError> {
    let mut component = C::default();
    descriptor.apply_parameters(&mut component, render.parameters)?;
    if !descriptor.authorize_request(&scope.request.request, &component) {
        debug!("Rendering of component '{}' was not authorized", C::NAME);
        return Ok(String::new());
    }

    let mut ctx = Context::new(
        scope.request.clone(),
        ContextInit {
            component_id: render.id,
            component_name: C::NAME,
            parent_id: render.parent_id,
            key: render.key.map(str::to_string),
            operation_id: render.operation_id,
            is_mount: true,
            client_event: None,
            descriptor: descriptor.clone(),
        },
    );
    component.mount(&mut ctx)?;
    component.render(&mut ctx)?;
    let html = render_markup(scope, descriptor, &component, &ctx, output, true)?;
    component.after_render(&mut ctx, true);
    output.absorb(ctx);
    Ok(html)
}

/// Runs `view` and decorates the result with the component's identity,
/// state token and client scripts
pub(crate) fn render_markup<C: Component>(
    scope: &RenderScope,
    descriptor: &ComponentDescriptor<C>,
    component: &C,
    ctx: &Context,
    output: &mut NestedOutput,
    inline_scripts: bool,
) -> Result<String, ComponentError> {
    let html = {
        let mut view = ViewContext {
            scope,
            id: ctx.id(),
            validation: &ctx.validation,
            output,
        };
        component.view(&mut view)?
    };

    let state = ComponentState {
        state: descriptor.save_state(component)?,
        key: ctx.key().map(str::to_string),
        touched: ctx.touched.clone(),
        model_touched: ctx.model_touched,
    };
    let token = scope.request.codec.encode(&state)?;

    let event_path = format!(
        "{}/{}/event",
        scope.path_prefix.trim_end_matches('/'),
        C::NAME
    );
    let subscriptions = descriptor
        .advertised_subscriptions()
        .map(|subscription| EventSubscription {
            name: subscription.name.to_string(),
            subject: subscription.subject.clone(),
            path: event_path.clone(),
        })
        .collect();
    let scripts: &[String] = if inline_scripts { &ctx.scripts } else { &[] };

    decorate(
        &html,
        &Decoration {
            id: ctx.id(),
            name: C::NAME,
            token: token.as_str(),
            polls: descriptor.polls().collect(),
            subscriptions,
            scripts,
        },
    )
    .map_err(|source| ComponentError::Markup {
        component: C::NAME,
        source,
    })
}
