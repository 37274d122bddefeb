use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use super::WireValue;

type ConvertFn<T> = Box<dyn Fn(&WireValue) -> Option<T> + Send + Sync>;
type MapFn<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Per-type conversion and post-conversion mapping registry.
///
/// Converters replace the built-in conversion for a type; mappers run on
/// every successfully converted value of a type (for example to trim
/// strings). Entries are stored type-erased and recovered by `TypeId`.
#[derive(Clone, Default)]
pub struct Converters {
    converters: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    mappers: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Converters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, F>(&mut self, convert: F)
    where
        T: 'static,
        F: Fn(&WireValue) -> Option<T> + Send + Sync + 'static,
    {
        let convert: ConvertFn<T> = Box::new(convert);
        self.converters.insert(TypeId::of::<T>(), Arc::new(convert));
    }

    pub fn map<T, F>(&mut self, map: F)
    where
        T: 'static,
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        let map: MapFn<T> = Box::new(map);
        self.mappers.insert(TypeId::of::<T>(), Arc::new(map));
    }

    /// Runs the registered converter for `T`. The outer `None` means there is
    /// no converter, the inner one that it rejected the value.
    pub(crate) fn convert<T: 'static>(&self, value: &WireValue) -> Option<Option<T>> {
        let convert = self
            .converters
            .get(&TypeId::of::<T>())?
            .downcast_ref::<ConvertFn<T>>()?;
        Some(convert(value))
    }

    pub(crate) fn apply_mapper<T: 'static>(&self, value: T) -> T {
        match self
            .mappers
            .get(&TypeId::of::<T>())
            .and_then(|map| map.downcast_ref::<MapFn<T>>())
        {
            Some(map) => map(value),
            None => value,
        }
    }
}
