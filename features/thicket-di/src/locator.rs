use std::{any::TypeId, sync::Arc};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::{
    errors::ConfigError,
    factories::{DynFactory, DynMemberInjector, InstanceFactory, MemberInjector},
    types::TypeInfo,
};

/// Anything factories and member injectors can be looked up from
pub trait FactorySource: Send + Sync {
    fn factory_for(&self, class: &TypeInfo) -> Option<Arc<dyn DynFactory>>;

    fn member_injector_for(&self, class: &TypeInfo) -> Option<Arc<dyn DynMemberInjector>>;
}

/// Registry of factories and member injectors, keyed by the class they serve
///
/// Registries can be nested: child registries are consulted in registration order
/// after the registry's own entries.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: DashMap<TypeId, Arc<dyn DynFactory>>,
    member_injectors: DashMap<TypeId, Arc<dyn DynMemberInjector>>,
    children: RwLock<Vec<Arc<dyn FactorySource>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory<Factory: InstanceFactory>(&self, factory: Factory) -> &Self {
        let factory: Arc<dyn DynFactory> = Arc::new(factory);
        let supplies = factory.supplies();
        tracing::trace!("Registered factory for {}", supplies);
        self.factories.insert(supplies.type_id, factory);
        self
    }

    pub fn register_member_injector<Injector: MemberInjector>(&self, injector: Injector) -> &Self {
        let injector: Arc<dyn DynMemberInjector> = Arc::new(injector);
        let target = injector.target();
        tracing::trace!("Registered member injector for {}", target);
        self.member_injectors.insert(target.type_id, injector);
        self
    }

    pub fn add_child_registry(&self, child: Arc<dyn FactorySource>) -> &Self {
        self.children.write().push(child);
        self
    }
}

impl FactorySource for FactoryRegistry {
    fn factory_for(&self, class: &TypeInfo) -> Option<Arc<dyn DynFactory>> {
        if let Some(factory) = self.factories.get(&class.type_id) {
            return Some(factory.value().clone());
        }
        self.children
            .read()
            .iter()
            .find_map(|child| child.factory_for(class))
    }

    fn member_injector_for(&self, class: &TypeInfo) -> Option<Arc<dyn DynMemberInjector>> {
        if let Some(injector) = self.member_injectors.get(&class.type_id) {
            return Some(injector.value().clone());
        }
        self.children
            .read()
            .iter()
            .find_map(|child| child.member_injector_for(class))
    }
}

/// Looks up factories and member injectors for classes
///
/// The primary registry is always consulted first. The fallback source is only used if enabled,
/// otherwise a miss in the primary registry is an error.
pub(crate) struct FactoryLocator {
    primary: Arc<FactoryRegistry>,
    fallback: Option<Arc<dyn FactorySource>>,
    use_fallback: bool,
}

impl FactoryLocator {
    pub(crate) fn new(
        primary: Arc<FactoryRegistry>,
        fallback: Option<Arc<dyn FactorySource>>,
        use_fallback: bool,
    ) -> Self {
        FactoryLocator {
            primary,
            fallback,
            use_fallback,
        }
    }

    pub(crate) fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.primary
    }

    fn fallback(&self) -> Option<&Arc<dyn FactorySource>> {
        self.fallback.as_ref().filter(|_| self.use_fallback)
    }

    pub(crate) fn factory_for(&self, class: &TypeInfo) -> Result<Arc<dyn DynFactory>, ConfigError> {
        if let Some(factory) = self.primary.factory_for(class) {
            return Ok(factory);
        }
        match self.fallback().and_then(|fallback| fallback.factory_for(class)) {
            Some(factory) => {
                tracing::debug!("Using fallback factory for {}", class);
                Ok(factory)
            }
            None => Err(ConfigError::NoFactory(*class)),
        }
    }

    pub(crate) fn member_injector_for(
        &self,
        class: &TypeInfo,
    ) -> Result<Arc<dyn DynMemberInjector>, ConfigError> {
        if let Some(injector) = self.primary.member_injector_for(class) {
            return Ok(injector);
        }
        match self
            .fallback()
            .and_then(|fallback| fallback.member_injector_for(class))
        {
            Some(injector) => {
                tracing::debug!("Using fallback member injector for {}", class);
                Ok(injector)
            }
            None => Err(ConfigError::NoMemberInjector(*class)),
        }
    }
}
