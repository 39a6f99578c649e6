use std::sync::Arc;

use crate::{
    errors::InjectError,
    scope::Scope,
    types::{BindingKey, Injectable},
};

mod lazy;
mod scoped;

pub use lazy::Lazy;
pub use scoped::ScopedProvider;

/// Allows custom behaviour on injection
///
/// Factories usually resolve their dependencies through [Scope::resolve].
pub trait Resolver: Sized {
    /// The binding this resolver asks its scope for
    fn key(name: Option<&str>) -> BindingKey;

    fn resolve(scope: &Scope, name: Option<&str>) -> Result<Self, InjectError>;
}

impl<T: ?Sized + Injectable> Resolver for Arc<T> {
    fn key(name: Option<&str>) -> BindingKey {
        BindingKey::of::<T>(name)
    }

    fn resolve(scope: &Scope, name: Option<&str>) -> Result<Self, InjectError> {
        scope.instance_of::<T>(name)
    }
}

impl<T: ?Sized + Injectable> Resolver for ScopedProvider<T> {
    fn key(name: Option<&str>) -> BindingKey {
        BindingKey::of::<T>(name)
    }

    fn resolve(scope: &Scope, name: Option<&str>) -> Result<Self, InjectError> {
        scope.ensure_open()?;
        Ok(ScopedProvider::new(scope.clone(), name))
    }
}

impl<T: ?Sized + Injectable> Resolver for Lazy<T> {
    fn key(name: Option<&str>) -> BindingKey {
        BindingKey::of::<T>(name)
    }

    fn resolve(scope: &Scope, name: Option<&str>) -> Result<Self, InjectError> {
        ScopedProvider::<T>::resolve(scope, name).map(Lazy::new)
    }
}

impl<Resolvable: Resolver> Resolver for Option<Resolvable> {
    fn key(name: Option<&str>) -> BindingKey {
        Resolvable::key(name)
    }

    fn resolve(scope: &Scope, name: Option<&str>) -> Result<Self, InjectError> {
        match Resolvable::resolve(scope, name) {
            Ok(resolved) => Ok(Some(resolved)),
            // Only the requested binding itself may be missing
            Err(e) if e.is_missing(&Self::key(name)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
