use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use parking_lot::Mutex;

use crate::{
    errors::InjectError,
    factories::Provider,
    resolver::ScopedProvider,
    types::Injectable,
};

/// Lazily resolved dependency
///
/// Resolved on the first successful [get](Lazy::get), later calls return the same value.
/// Failures are not memoized, the next call tries again.
///
/// Every access fails once the scope is closed, including accesses to an already resolved value.
pub struct Lazy<T: ?Sized>(Arc<LazyInner<T>>);
struct LazyInner<T: ?Sized> {
    provider: ScopedProvider<T>,
    once: OnceLock<Arc<T>>,
    /// Serializes the first resolution
    init: Mutex<()>,
}
impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy(self.0.clone())
    }
}
impl<T: ?Sized> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lazy")
            .field("provider", &self.0.provider)
            .field("resolved", &self.0.once.get().is_some())
            .finish()
    }
}

impl<T: ?Sized + Injectable> Lazy<T> {
    pub(crate) fn new(provider: ScopedProvider<T>) -> Self {
        Lazy(Arc::new(LazyInner {
            provider,
            once: OnceLock::new(),
            init: Mutex::new(()),
        }))
    }

    /// Accesses the Lazy Dependency, resolving it on first access
    pub fn get(&self) -> Result<Arc<T>, InjectError> {
        self.0.provider.scope().ensure_open()?;

        if let Some(resolved) = self.0.once.get() {
            return Ok(resolved.clone());
        }

        // Lock, so the value is not resolved twice
        let _init = self.0.init.lock();

        // Double check once - it might have been set while we waited for the lock
        if let Some(resolved) = self.0.once.get() {
            return Ok(resolved.clone());
        }

        let resolved = self.0.provider.get()?;
        Ok(self.0.once.get_or_init(|| resolved).clone())
    }

    /// True once the dependency was resolved
    pub fn is_resolved(&self) -> bool {
        self.0.once.get().is_some()
    }
}

impl<T: ?Sized + Injectable> Provider<T> for Lazy<T> {
    fn get(&self) -> Result<Arc<T>, InjectError> {
        Lazy::get(self)
    }
}
