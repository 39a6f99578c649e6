use std::{any::Any, marker::PhantomData, sync::Arc};

use crate::{
    errors::{InjectError, ResolveError},
    scope::Scope,
    types::{DynError, Injectable, Instance, ProviderFlags, ScopeAnnotation, TypeInfo},
};

/// A Factory constructing instances of a given type
///
/// Factories are usually generated, they are looked up by class in a
/// [FactoryRegistry](crate::FactoryRegistry).
pub trait InstanceFactory: Send + Sync + 'static {
    type Provides: Injectable;

    /// Constructs a new instance, resolving its dependencies from `scope`
    ///
    /// Errors raised by thicket (e.g. a failed dependency lookup) are passed through to the caller unchanged.
    fn construct(&self, scope: &Scope) -> Result<Self::Provides, DynError>;

    /// The scope marker the class is declared under, if any
    fn scope_annotation(&self) -> Option<ScopeAnnotation> {
        None
    }

    fn is_singleton(&self) -> bool {
        false
    }

    fn is_releasable(&self) -> bool {
        false
    }

    /// Only meaningful if the product is a provider
    fn provides_singleton(&self) -> bool {
        false
    }

    /// Only meaningful if the product is a provider
    fn provides_releasable(&self) -> bool {
        false
    }
}

/// Wrapper Trait for factories, constructing type erased instances
pub trait DynFactory: Send + Sync {
    fn supplies(&self) -> TypeInfo;

    fn construct(&self, scope: &Scope) -> Result<Instance, InjectError>;

    /// The scope the product is placed in when discovered dynamically
    ///
    /// A singleton without an explicit annotation is placed under the built-in [Singleton](crate::Singleton) marker.
    fn scope_annotation(&self) -> Option<ScopeAnnotation>;

    fn flags(&self) -> ProviderFlags;
}
// Impl DynFactory for any InstanceFactory
impl<T: Injectable, SpecificFactory: InstanceFactory<Provides = T>> DynFactory for SpecificFactory {
    fn supplies(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn construct(&self, scope: &Scope) -> Result<Instance, InjectError> {
        // Forward the call to the specific implementation
        InstanceFactory::construct(self, scope)
            .map(Instance::new)
            .map_err(|e| InjectError::from_factory(TypeInfo::of::<T>(), e))
    }

    fn scope_annotation(&self) -> Option<ScopeAnnotation> {
        match InstanceFactory::scope_annotation(self) {
            Some(annotation) => Some(annotation),
            None if self.is_singleton() => Some(ScopeAnnotation::singleton()),
            None => None,
        }
    }

    fn flags(&self) -> ProviderFlags {
        ProviderFlags {
            singleton: self.is_singleton(),
            releasable: self.is_releasable(),
            providing_singleton: self.provides_singleton(),
            providing_releasable: self.provides_releasable(),
        }
    }
}

/// Populates the injectable members of an already constructed value
pub trait MemberInjector: Send + Sync + 'static {
    type Target: Injectable;

    fn inject(&self, target: &mut Self::Target, scope: &Scope) -> Result<(), DynError>;
}

/// Wrapper Trait for member injectors, accepting any target
pub trait DynMemberInjector: Send + Sync {
    fn target(&self) -> TypeInfo;

    fn inject(&self, target: &mut dyn Any, scope: &Scope) -> Result<(), InjectError>;
}
impl<T: Injectable, SpecificInjector: MemberInjector<Target = T>> DynMemberInjector
    for SpecificInjector
{
    fn target(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn inject(&self, target: &mut dyn Any, scope: &Scope) -> Result<(), InjectError> {
        let Some(target) = target.downcast_mut::<T>() else {
            return Err(ResolveError::DowncastFailed {
                required_type: std::any::type_name::<T>(),
                actual_type: "unknown",
            }
            .into());
        };

        MemberInjector::inject(self, target, scope)
            .map_err(|e| InjectError::from_member_injector(TypeInfo::of::<T>(), e))
    }
}

/// Provides values of `T` on demand
pub trait Provider<T: ?Sized + Injectable>: Send + Sync + 'static {
    fn get(&self) -> Result<Arc<T>, InjectError>;
}
impl<T: ?Sized + Injectable, P: Provider<T>> Provider<T> for Arc<P> {
    fn get(&self) -> Result<Arc<T>, InjectError> {
        <P as Provider<T>>::get(self)
    }
}

/// A [Provider] backed by a closure
///
/// ```rust
/// use std::sync::Arc;
/// use thicket_di::{FnProvider, Provider};
///
/// let provider = FnProvider::new(|| Ok(Arc::new(42_u32)));
/// assert_eq!(*provider.get().unwrap(), 42);
/// ```
pub struct FnProvider<F>(F);
impl<F> FnProvider<F> {
    pub fn new<T>(provide: F) -> Self
    where
        T: ?Sized + Injectable,
        F: Fn() -> Result<Arc<T>, InjectError> + Send + Sync + 'static,
    {
        FnProvider(provide)
    }
}
impl<T, F> Provider<T> for FnProvider<F>
where
    T: ?Sized + Injectable,
    F: Fn() -> Result<Arc<T>, InjectError> + Send + Sync + 'static,
{
    fn get(&self) -> Result<Arc<T>, InjectError> {
        (self.0)()
    }
}

/// Type erased [Provider]
pub(crate) trait DynProvider: Send + Sync {
    fn provide(&self) -> Result<Instance, InjectError>;
}

pub(crate) struct ErasedProvider<T: ?Sized, P> {
    provider: P,
    _marker: PhantomData<fn() -> Arc<T>>,
}
impl<T: ?Sized + Injectable, P: Provider<T>> ErasedProvider<T, P> {
    pub(crate) fn erase(provider: P) -> Arc<dyn DynProvider> {
        Arc::new(ErasedProvider {
            provider,
            _marker: PhantomData,
        })
    }
}
impl<T: ?Sized + Injectable, P: Provider<T>> DynProvider for ErasedProvider<T, P> {
    fn provide(&self) -> Result<Instance, InjectError> {
        self.provider.get().map(Instance::from_arc)
    }
}
