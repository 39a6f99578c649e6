use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    binding::{InstanceAdapter, ProviderAdapter},
    errors::InjectError,
    factories::{DynFactory, DynProvider},
    scope::{Scope, WeakScope},
    types::{Instance, ProviderFlags, TypeInfo},
};

/// How the provider builds values, fixed at construction
enum Source {
    Instance,
    ProviderInstance,
    Factory(Option<InstanceAdapter>),
    ProviderFactory(ProviderAdapter),
}

/// The factory of a provider, located on first use
enum FactoryCell {
    Class(TypeInfo),
    Resolved(Arc<dyn DynFactory>),
}

struct ProviderState {
    flags: ProviderFlags,
    instance: Option<Instance>,
    provider: Option<Arc<dyn DynProvider>>,
    factory: Option<FactoryCell>,
}

/// Lazily builds and memoizes the values of one binding
///
/// All resolution goes through the provider's own lock, so a cacheable value is never built twice.
pub(crate) struct InternalProvider {
    supplies: TypeInfo,
    source: Source,
    /// Values are built against this scope instead of the requesting one
    bound_scope: Option<WeakScope>,
    state: Mutex<ProviderState>,
}

impl InternalProvider {
    fn new(supplies: TypeInfo, source: Source, state: ProviderState) -> Self {
        InternalProvider {
            supplies,
            source,
            bound_scope: None,
            state: Mutex::new(state),
        }
    }

    pub(crate) fn from_instance(instance: Instance) -> Self {
        let state = ProviderState {
            flags: ProviderFlags {
                singleton: true,
                ..Default::default()
            },
            instance: Some(instance.clone()),
            provider: None,
            factory: None,
        };
        Self::new(instance.info, Source::Instance, state)
    }

    pub(crate) fn from_provider(
        supplies: TypeInfo,
        provider: Arc<dyn DynProvider>,
        providing_singleton: bool,
        providing_releasable: bool,
    ) -> Self {
        let state = ProviderState {
            flags: ProviderFlags {
                providing_singleton,
                providing_releasable,
                ..Default::default()
            },
            instance: None,
            provider: Some(provider),
            factory: None,
        };
        Self::new(supplies, Source::ProviderInstance, state)
    }

    /// A provider whose factory is located on first use
    pub(crate) fn from_factory_class(
        supplies: TypeInfo,
        class: TypeInfo,
        adapt: Option<InstanceAdapter>,
        flags: ProviderFlags,
    ) -> Self {
        let state = ProviderState {
            flags,
            instance: None,
            provider: None,
            factory: Some(FactoryCell::Class(class)),
        };
        Self::new(supplies, Source::Factory(adapt), state)
    }

    /// A provider for a dynamically discovered class, the flags are taken from the factory
    pub(crate) fn from_factory(factory: Arc<dyn DynFactory>) -> Self {
        let state = ProviderState {
            flags: factory.flags(),
            instance: None,
            provider: None,
            factory: None,
        };
        let supplies = factory.supplies();
        let mut provider = Self::new(supplies, Source::Factory(None), state);
        provider.state.get_mut().factory = Some(FactoryCell::Resolved(factory));
        provider
    }

    pub(crate) fn from_provider_class(
        supplies: TypeInfo,
        class: TypeInfo,
        adapt: ProviderAdapter,
        flags: ProviderFlags,
    ) -> Self {
        let state = ProviderState {
            flags,
            instance: None,
            provider: None,
            factory: Some(FactoryCell::Class(class)),
        };
        Self::new(supplies, Source::ProviderFactory(adapt), state)
    }

    /// Builds values against `scope`, regardless of where they are requested from
    pub(crate) fn bound_to(mut self, scope: &Scope) -> Self {
        self.bound_scope = Some(scope.downgrade());
        self
    }

    #[cfg(test)]
    fn flags(&self) -> ProviderFlags {
        self.state.lock().flags
    }

    /// Returns the value of the binding, building it if required
    pub(crate) fn get(&self, requested_from: &Scope) -> Result<Instance, InjectError> {
        let bound = match &self.bound_scope {
            Some(bound) => {
                let bound = bound.upgrade()?;
                bound.ensure_open()?;
                Some(bound)
            }
            None => None,
        };
        let scope = bound.as_ref().unwrap_or(requested_from);

        let mut guard = self.state.lock();
        let state = &mut *guard;

        // 1. Fixed or memoized value
        if let Some(instance) = &state.instance {
            return Ok(instance.clone());
        }

        // 2. Provider instance
        if let Some(provider) = state.provider.clone() {
            if !state.flags.providing_singleton {
                return provider.provide();
            }
            let instance = provider.provide()?;
            state.instance = Some(instance.clone());
            if !state.flags.providing_releasable {
                state.provider = None;
            }
            return Ok(instance);
        }

        // 3. Locate the factory once, its metadata can only upgrade our flags
        let factory = match &state.factory {
            Some(FactoryCell::Resolved(factory)) => factory.clone(),
            Some(FactoryCell::Class(class)) => {
                let class = *class;
                let factory = scope.shared().locator.factory_for(&class)?;
                state.flags.merge(factory.flags());
                state.factory = Some(FactoryCell::Resolved(factory.clone()));
                factory
            }
            None => return Err(InjectError::IllegalProviderState(self.supplies)),
        };

        match &self.source {
            // 4. Factory
            Source::Factory(adapt) => {
                let build = || {
                    let instance = factory.construct(scope)?;
                    match adapt {
                        Some(adapt) => (**adapt)(instance),
                        None => Ok(instance),
                    }
                };

                if !state.flags.singleton {
                    return build();
                }
                let instance = build()?;
                state.instance = Some(instance.clone());
                if !state.flags.rebuilds_after_release() {
                    state.factory = None;
                }
                Ok(instance)
            }
            // 5. Provider factory
            Source::ProviderFactory(adapt) => {
                let provider = (**adapt)(factory.construct(scope)?)?;

                if state.flags.singleton {
                    if !state.flags.releasable {
                        state.factory = None;
                    }
                    if !state.flags.providing_singleton {
                        state.provider = Some(provider.clone());
                        return provider.provide();
                    }
                    let instance = provider.provide()?;
                    state.instance = Some(instance.clone());
                    if state.flags.providing_releasable {
                        state.provider = Some(provider);
                    }
                    return Ok(instance);
                }

                if !state.flags.providing_singleton {
                    return provider.provide();
                }
                let instance = provider.provide()?;
                state.instance = Some(instance.clone());
                if !state.flags.rebuilds_after_release() {
                    state.factory = None;
                }
                Ok(instance)
            }
            // 6. Fixed instances and provider instances never lose their value
            Source::Instance | Source::ProviderInstance => {
                Err(InjectError::IllegalProviderState(self.supplies))
            }
        }
    }

    /// Drops releasable cached values, they are rebuilt on the next `get`
    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        if state.flags.releasable {
            state.instance = None;
            if matches!(self.source, Source::ProviderFactory(_)) {
                state.provider = None;
            }
        }
        if state.flags.providing_releasable {
            state.instance = None;
        }
    }
}
