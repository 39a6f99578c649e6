use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};

use crate::{
    binding::{Binding, BindingMode, Module},
    directory::Shared,
    errors::{ConfigError, InjectError, ResolveError},
    provider::InternalProvider,
    resolver::{Lazy, Resolver, ScopedProvider},
    types::{BindingKey, Injectable, Instance, ScopeAnnotation, ScopeName, TypeInfo},
};

mod lookup;
mod node;

/// A node of the injection forest, owning bindings and caching instances
///
/// Scopes are cheap to clone handles. Resolution falls back to the ancestors of a scope,
/// a scope's own bindings always shadow the inherited ones.
#[derive(Clone)]
pub struct Scope(pub(crate) Arc<ScopeInner>);

pub(crate) struct ScopeInner {
    name: ScopeName,
    open: AtomicBool,
    annotations: DashSet<ScopeAnnotation>,
    /// Snapshot taken at attach time, closest ancestor first
    ancestors: RwLock<Arc<[WeakScope]>>,
    children: DashMap<ScopeName, Scope>,
    named_providers: Mutex<HashMap<BindingKey, Arc<InternalProvider>>>,
    unnamed_providers: Mutex<HashMap<TypeId, Arc<InternalProvider>>>,
    has_test_modules: AtomicBool,
    shared: Arc<Shared>,
}

/// Non owning reference to a scope, used for ancestors and bound providers
#[derive(Clone)]
pub(crate) struct WeakScope {
    name: ScopeName,
    inner: Weak<ScopeInner>,
}
impl WeakScope {
    pub(crate) fn upgrade(&self) -> Result<Scope, InjectError> {
        self.inner
            .upgrade()
            .map(Scope)
            .ok_or_else(|| InjectError::ScopeClosed(self.name.clone()))
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let children: Vec<ScopeName> = self.0.children.iter().map(|c| c.key().clone()).collect();
        f.debug_struct("Scope")
            .field("name", &self.0.name)
            .field("open", &self.is_open())
            .field("children", &children)
            .finish()
    }
}

impl Scope {
    pub(crate) fn new(name: ScopeName, shared: Arc<Shared>) -> Self {
        let annotations = DashSet::new();
        if let Some(annotation) = name.annotation() {
            annotations.insert(annotation);
        }

        Scope(Arc::new(ScopeInner {
            name,
            open: AtomicBool::new(true),
            annotations,
            ancestors: RwLock::new(Arc::from(Vec::new())),
            children: DashMap::new(),
            named_providers: Mutex::new(HashMap::new()),
            unnamed_providers: Mutex::new(HashMap::new()),
            has_test_modules: AtomicBool::new(false),
            shared,
        }))
    }

    pub fn name(&self) -> &ScopeName {
        &self.0.name
    }

    pub fn is_open(&self) -> bool {
        self.0.open.load(Ordering::Acquire)
    }

    /// Returns true if both handles refer to the same scope
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope {
            name: self.0.name.clone(),
            inner: Arc::downgrade(&self.0),
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.0.shared
    }

    pub(crate) fn ensure_open(&self) -> Result<(), InjectError> {
        match self.is_open() {
            true => Ok(()),
            false => Err(InjectError::ScopeClosed(self.0.name.clone())),
        }
    }
}

// Resolution
impl Scope {
    /// Returns the instance of `T`, constructing it if required
    pub fn get_instance<T: ?Sized + Injectable>(&self) -> Result<Arc<T>, InjectError> {
        self.instance_of::<T>(None)
    }

    /// Returns the instance bound to `T` under `name`
    ///
    /// Named instances are never discovered dynamically, they must be bound in this scope or an ancestor.
    pub fn get_named_instance<T: ?Sized + Injectable>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, InjectError> {
        self.instance_of::<T>(Some(name))
    }

    /// Returns a provider resolving `T` through this scope on every call
    pub fn get_provider<T: ?Sized + Injectable>(&self) -> Result<ScopedProvider<T>, InjectError> {
        self.ensure_open()?;
        Ok(ScopedProvider::new(self.clone(), None))
    }

    pub fn get_named_provider<T: ?Sized + Injectable>(
        &self,
        name: &str,
    ) -> Result<ScopedProvider<T>, InjectError> {
        self.ensure_open()?;
        Ok(ScopedProvider::new(self.clone(), Some(name)))
    }

    /// Returns a handle resolving `T` on first access
    pub fn get_lazy<T: ?Sized + Injectable>(&self) -> Result<Lazy<T>, InjectError> {
        self.ensure_open()?;
        Ok(Lazy::new(ScopedProvider::new(self.clone(), None)))
    }

    pub fn get_named_lazy<T: ?Sized + Injectable>(&self, name: &str) -> Result<Lazy<T>, InjectError> {
        self.ensure_open()?;
        Ok(Lazy::new(ScopedProvider::new(self.clone(), Some(name))))
    }

    /// Resolves any [Resolver], e.g. `Option<Arc<T>>` or `Lazy<T>`
    pub fn resolve<R: Resolver>(&self) -> Result<R, InjectError> {
        R::resolve(self, None)
    }

    pub fn resolve_named<R: Resolver>(&self, name: &str) -> Result<R, InjectError> {
        R::resolve(self, Some(name))
    }

    /// Populates the members of an existing value through its member injector
    pub fn inject<T: Injectable>(&self, target: &mut T) -> Result<(), InjectError> {
        self.ensure_open()?;
        let injector = self
            .shared()
            .locator
            .member_injector_for(&TypeInfo::of::<T>())?;
        injector.inject(target, self)
    }

    pub(crate) fn instance_of<T: ?Sized + Injectable>(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<T>, InjectError> {
        let instance = self.resolve_key(&BindingKey::of::<T>(name))?;
        instance.downcast::<T>().map_err(|actual_type| {
            ResolveError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            }
            .into()
        })
    }

    pub(crate) fn resolve_key(&self, key: &BindingKey) -> Result<Instance, InjectError> {
        self.ensure_open()?;
        // Held until the value is built, nested resolutions see this key on the stack
        let _guard = self.shared().configuration.enter_resolution(key)?;
        let provider = self.lookup_provider(key)?;
        provider.get(self)
    }
}

// Bindings
impl Scope {
    /// Installs the bindings of all modules
    ///
    /// A binding only takes effect if its slot is still free, repeated installs are no-ops.
    pub fn install_modules(
        &self,
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<(), ConfigError> {
        let bindings = self.checked_bindings(modules)?;
        tracing::debug!("Installing {} bindings in scope '{}'", bindings.len(), self.0.name);
        for binding in bindings {
            self.install_binding(binding, false);
        }
        Ok(())
    }

    /// Installs bindings overriding any existing ones
    ///
    /// Test modules can only be installed once, until the scope is [reset](Scope::reset).
    /// A rejected install does not count.
    pub fn install_test_modules(
        &self,
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<(), ConfigError> {
        let bindings = self.checked_bindings(modules)?;
        if self.0.has_test_modules.swap(true, Ordering::AcqRel) {
            return Err(ConfigError::TestModulesAlreadyInstalled(self.0.name.clone()));
        }
        tracing::debug!(
            "Installing {} test bindings in scope '{}'",
            bindings.len(),
            self.0.name
        );
        for binding in bindings {
            self.install_binding(binding, true);
        }
        Ok(())
    }

    /// Validates every binding before any of them is installed
    fn checked_bindings(
        &self,
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<Vec<Binding>, ConfigError> {
        let bindings: Vec<Binding> = modules.into_iter().flatten().collect();
        for binding in &bindings {
            binding.validate()?;
            if self.shared().configuration.checks_illegal_bindings() {
                self.check_illegal_binding(binding)?;
            }
        }
        Ok(bindings)
    }

    /// A class declared under a scope marker may only be bound in scopes supporting the marker
    fn check_illegal_binding(&self, binding: &Binding) -> Result<(), ConfigError> {
        let Some(class) = binding.constructed_class() else {
            return Ok(());
        };
        // Without a factory there is no declared annotation to check
        let Ok(factory) = self.shared().locator.factory_for(&class) else {
            return Ok(());
        };
        match factory.scope_annotation() {
            Some(annotation) if !self.supports_scope_annotation(&annotation) => {
                Err(ConfigError::IllegalBinding {
                    class,
                    annotation,
                    scope: self.0.name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn install_binding(&self, binding: Binding, overwrite: bool) {
        let in_declaring_scope = binding.in_declaring_scope;
        let key = binding.key.clone();

        let mut provider = provider_for(binding);
        if in_declaring_scope {
            provider = provider.bound_to(self);
        }
        let provider = Arc::new(provider);

        match key.name {
            Some(_) => {
                let mut named = self.0.named_providers.lock();
                if overwrite {
                    named.insert(key.clone(), provider);
                } else {
                    named.entry(key.clone()).or_insert(provider);
                }
            }
            None => {
                let mut unnamed = self.0.unnamed_providers.lock();
                if overwrite {
                    unnamed.insert(key.class.type_id, provider);
                } else {
                    unnamed.entry(key.class.type_id).or_insert(provider);
                }
            }
        }
        tracing::trace!("Bound {} in scope '{}'", key, self.0.name);
    }

    /// Drops every releasable value cached by this scope and its descendants
    pub fn release(&self) {
        let providers: Vec<Arc<InternalProvider>> = {
            let named = self.0.named_providers.lock();
            let unnamed = self.0.unnamed_providers.lock();
            named.values().chain(unnamed.values()).cloned().collect()
        };
        tracing::debug!("Releasing {} providers of scope '{}'", providers.len(), self.0.name);
        for provider in providers {
            provider.release();
        }

        for child in self.children() {
            child.release();
        }
    }

    /// Returns the scope to its freshly opened state
    ///
    /// Bindings, cached values, test modules and added annotations are dropped.
    /// Children stay attached.
    pub fn reset(&self) {
        self.0.named_providers.lock().clear();
        self.0.unnamed_providers.lock().clear();
        self.0.has_test_modules.store(false, Ordering::Release);

        self.0.annotations.clear();
        if let Some(annotation) = self.0.name.annotation() {
            self.0.annotations.insert(annotation);
        }
        self.0.open.store(true, Ordering::Release);
        tracing::debug!("Reset scope '{}'", self.0.name);
    }
}

fn provider_for(binding: Binding) -> InternalProvider {
    let Binding {
        key, mode, flags, ..
    } = binding;

    match mode {
        BindingMode::Simple => InternalProvider::from_factory_class(key.class, key.class, None, flags),
        BindingMode::Class {
            implementation,
            adapt,
        } => InternalProvider::from_factory_class(key.class, implementation, Some(adapt), flags),
        BindingMode::Instance(instance) => InternalProvider::from_instance(instance),
        BindingMode::ProviderInstance(provider) => InternalProvider::from_provider(
            key.class,
            provider,
            flags.providing_singleton,
            flags.providing_releasable,
        ),
        BindingMode::ProviderClass { provider, adapt } => {
            InternalProvider::from_provider_class(key.class, provider, adapt, flags)
        }
    }
}
