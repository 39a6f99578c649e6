use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    configuration::Configuration,
    directory::{ScopeDirectory, Shared},
    locator::{FactoryLocator, FactoryRegistry, FactorySource},
};

/// Builds a [ScopeDirectory]
///
/// ```rust
/// use thicket_di::{Configuration, FactoryRegistry, ScopeDirectory};
///
/// let registry = FactoryRegistry::new();
/// let directory = ScopeDirectory::builder()
///     .with_configuration(Configuration::for_development())
///     .with_registry(registry)
///     .build();
/// assert!(directory.configuration().detects_cycles());
/// ```
pub struct DirectoryBuilder {
    configuration: Configuration,
    registry: Arc<FactoryRegistry>,
    fallback: Option<Arc<dyn FactorySource>>,
}
impl Default for DirectoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryBuilder {
    pub fn new() -> Self {
        DirectoryBuilder {
            configuration: Configuration::default(),
            registry: Arc::new(FactoryRegistry::new()),
            fallback: None,
        }
    }
}
impl DirectoryBuilder {
    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    /// The registry consulted first for factories and member injectors
    pub fn with_registry(mut self, registry: impl Into<Arc<FactoryRegistry>>) -> Self {
        self.registry = registry.into();
        self
    }

    /// Consulted on registry misses, only if the configuration enables the fallback
    pub fn with_fallback(mut self, fallback: Arc<dyn FactorySource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn build(self) -> ScopeDirectory {
        let DirectoryBuilder {
            configuration,
            registry,
            fallback,
        } = self;

        tracing::debug!("Building scope directory with {:?}", configuration);
        let locator = FactoryLocator::new(registry, fallback, configuration.uses_fallback());
        ScopeDirectory::new(Shared {
            configuration,
            locator,
            unbound_providers: Mutex::new(HashMap::new()),
        })
    }
}
