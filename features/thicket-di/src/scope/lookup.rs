use std::sync::Arc;

use super::Scope;
use crate::{
    errors::{ConfigError, InjectError, ResolveError},
    provider::InternalProvider,
    types::{BindingKey, ScopeAnnotation, TypeInfo},
};

impl Scope {
    /// Finds the provider for `key`, discovering it through the factory locator if required
    ///
    /// Own bindings shadow inherited ones, bound providers shadow the unbound pool.
    pub(crate) fn lookup_provider(
        &self,
        key: &BindingKey,
    ) -> Result<Arc<InternalProvider>, InjectError> {
        if let Some(provider) = self.bound_provider(key) {
            return Ok(provider);
        }
        for ancestor in self.ancestors() {
            if let Some(provider) = ancestor.bound_provider(key) {
                return Ok(provider);
            }
        }

        // Names have no default factory
        if key.is_named() {
            return Err(ResolveError::NoBinding {
                key: key.clone(),
                scope: self.name().clone(),
                ancestors: self.ancestor_names(),
            }
            .into());
        }

        let shared = self.shared();
        if let Some(provider) = shared
            .unbound_providers
            .lock()
            .get(&key.class.type_id)
            .cloned()
        {
            return Ok(provider);
        }

        let factory = shared.locator.factory_for(&key.class)?;
        match factory.scope_annotation() {
            Some(annotation) => {
                let target = self.target_scope(&annotation, key.class)?;
                let provider = InternalProvider::from_factory(factory).bound_to(&target);
                Ok(target.install_if_absent(key.class, provider))
            }
            None => {
                let provider = shared
                    .unbound_providers
                    .lock()
                    .entry(key.class.type_id)
                    .or_insert_with(|| {
                        tracing::trace!("Added unbound provider for {}", key.class);
                        Arc::new(InternalProvider::from_factory(factory))
                    })
                    .clone();
                Ok(provider)
            }
        }
    }

    /// Bound providers of this scope only
    fn bound_provider(&self, key: &BindingKey) -> Option<Arc<InternalProvider>> {
        match key.name {
            Some(_) => self.0.named_providers.lock().get(key).cloned(),
            None => self
                .0
                .unnamed_providers
                .lock()
                .get(&key.class.type_id)
                .cloned(),
        }
    }

    fn target_scope(
        &self,
        annotation: &ScopeAnnotation,
        class: TypeInfo,
    ) -> Result<Scope, ConfigError> {
        self.nearest_ancestor_supporting(annotation)
            .map_err(|_| ConfigError::UnsupportedScopeAnnotation {
                class,
                annotation: *annotation,
                scope: self.name().clone(),
                ancestors: self.ancestor_names(),
            })
    }

    /// Installs a dynamically discovered provider, a provider installed concurrently wins
    fn install_if_absent(&self, class: TypeInfo, provider: InternalProvider) -> Arc<InternalProvider> {
        self.0
            .unnamed_providers
            .lock()
            .entry(class.type_id)
            .or_insert_with(|| {
                tracing::debug!("Placed provider for {} in scope '{}'", class, self.name());
                Arc::new(provider)
            })
            .clone()
    }
}
