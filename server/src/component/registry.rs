use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use futures::future::BoxFuture;
use log::info;
use serde_json::Value;

use super::{Component, ComponentDescriptor, ComponentError, DescriptorError};
use crate::{
    envelope::Envelope,
    error::TetherServerError,
    pipeline::{self, Reply},
    render::{self, NestedOutput, RenderScope, StaticRender},
};

/// Type-erased entry point into the request pipeline of one component type
pub(crate) trait ComponentRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    fn synchronize<'a>(
        &'a self,
        scope: RenderScope,
        envelope: Envelope,
    ) -> BoxFuture<'a, Result<Reply, TetherServerError>>;

    /// Renders a fresh instance, for requests that aren't synchronizations
    fn render_static(
        &self,
        scope: &RenderScope,
        parameters: Value,
        output: &mut NestedOutput,
    ) -> Result<String, ComponentError>;
}

struct Registration<C: Component> {
    descriptor: Arc<ComponentDescriptor<C>>,
}

impl<C: Component> ComponentRuntime for Registration<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn synchronize<'a>(
        &'a self,
        scope: RenderScope,
        envelope: Envelope,
    ) -> BoxFuture<'a, Result<Reply, TetherServerError>> {
        Box::pin(pipeline::synchronize(self.descriptor.clone(), scope, envelope))
    }

    fn render_static(
        &self,
        scope: &RenderScope,
        parameters: Value,
        output: &mut NestedOutput,
    ) -> Result<String, ComponentError> {
        let nonce = format!("{:032x}", fastrand::u128(..));
        render::render_static(
            scope,
            &self.descriptor,
            StaticRender {
                id: tether_shared::derive_id(&nonce, C::NAME, None),
                parent_id: None,
                key: None,
                parameters,
                operation_id: crate::context::fresh_operation_id(),
            },
            output,
        )
    }
}

/// Registered component types, by route name and by Rust type
#[derive(Clone, Default)]
pub(crate) struct Registry {
    by_name: HashMap<String, Arc<dyn ComponentRuntime>>,
    by_type: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Registry {
    pub(crate) fn register<C: Component>(&mut self) -> Result<(), DescriptorError> {
        let valid_name = !C::NAME.is_empty()
            && C::NAME
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_name {
            return Err(DescriptorError::InvalidName { component: C::NAME });
        }
        let name = C::NAME.to_lowercase();
        if self.by_name.contains_key(&name) || self.by_type.contains_key(&TypeId::of::<C>()) {
            return Err(DescriptorError::DuplicateComponent { component: C::NAME });
        }

        let descriptor = Arc::new(ComponentDescriptor::<C>::build()?);
        self.by_type.insert(TypeId::of::<C>(), descriptor.clone());
        self.by_name.insert(name, Arc::new(Registration { descriptor }));
        info!("Registered component '{}'", C::NAME);
        Ok(())
    }

    /// Looks a component up by its route name, ignoring case
    pub(crate) fn runtime(&self, name: &str) -> Option<Arc<dyn ComponentRuntime>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    pub(crate) fn descriptor<C: Component>(&self) -> Option<Arc<ComponentDescriptor<C>>> {
        self.by_type
            .get(&TypeId::of::<C>())?
            .clone()
            .downcast::<ComponentDescriptor<C>>()
            .ok()
    }
}
