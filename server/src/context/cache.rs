use std::{
    any::Any,
    collections::HashMap,
    fmt,
    ops::Deref,
    sync::Arc,
};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::ComponentError;

/// How long a cached value lives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheLifetime {
    /// Shared by the components of one request
    Request,
    /// Shared by every request the server handles
    Application,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) scope: String,
    pub(crate) name: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

type Slot = Arc<OnceCell<Arc<dyn Any + Send + Sync>>>;

/// Get-or-create value store.
///
/// The map lock is only held to find or insert a slot; populating happens
/// through the slot's `OnceCell`, so concurrent callers for one key compute
/// the value once while other keys proceed.
#[derive(Default)]
pub(crate) struct CacheStore {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl CacheStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get_or_init<T, F>(&self, key: &CacheKey, init: F) -> Result<Arc<T>, ComponentError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let slot = {
            let mut slots = self.slots.lock();
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let value = slot
            .get_or_init(|| {
                let value: Arc<dyn Any + Send + Sync> = Arc::new(init());
                value
            })
            .clone();
        value
            .downcast::<T>()
            .map_err(|_| ComponentError::CacheTypeMismatch {
                key: key.to_string(),
            })
    }

    pub(crate) fn remove(&self, key: &CacheKey) {
        self.slots.lock().remove(key);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

/// A cached value. Dereferences to the value.
pub struct Cached<T> {
    value: Arc<T>,
    store: Arc<CacheStore>,
    key: CacheKey,
}

impl<T> Cached<T> {
    pub(crate) fn new(value: Arc<T>, store: Arc<CacheStore>, key: CacheKey) -> Self {
        Self { value, store, key }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Drops the cached value so the next lookup computes it again. This
    /// handle keeps the old value.
    pub fn reset(&self) {
        self.store.remove(&self.key);
    }
}

impl<T> Deref for Cached<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
