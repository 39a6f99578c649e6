use std::{any::TypeId, collections::HashMap, fmt::Debug, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;

use crate::{
    builder::DirectoryBuilder,
    configuration::Configuration,
    errors::ConfigError,
    locator::{FactoryLocator, FactoryRegistry},
    provider::InternalProvider,
    scope::Scope,
    types::ScopeName,
};

/// State shared by every scope of a directory
pub(crate) struct Shared {
    pub(crate) configuration: Configuration,
    pub(crate) locator: FactoryLocator,
    /// Providers of classes without scope annotation, shared by all scopes
    pub(crate) unbound_providers: Mutex<HashMap<TypeId, Arc<InternalProvider>>>,
}

/// Directory of all open scopes, addressed by name
///
/// The directory owns its scopes: closing a scope removes it and its descendants,
/// once no handle is left the scopes are dropped.
#[derive(Clone)]
pub struct ScopeDirectory(Arc<DirectoryInner>);
struct DirectoryInner {
    scopes: DashMap<ScopeName, Scope>,
    shared: Arc<Shared>,
    /// The only root scope, tracked if multiple root scopes are prevented
    root: Mutex<Option<ScopeName>>,
}
impl Debug for ScopeDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for scope in self.0.scopes.iter() {
            let parent = scope.value().parent().map(|parent| parent.name().clone());
            map.entry(scope.key(), &parent);
        }
        map.finish()
    }
}

impl ScopeDirectory {
    pub fn builder() -> DirectoryBuilder {
        DirectoryBuilder::new()
    }

    pub(crate) fn new(shared: Shared) -> Self {
        ScopeDirectory(Arc::new(DirectoryInner {
            scopes: DashMap::new(),
            shared: Arc::new(shared),
            root: Mutex::new(None),
        }))
    }

    pub fn configuration(&self) -> &Configuration {
        &self.0.shared.configuration
    }

    /// The primary factory registry, factories can still be registered after build
    pub fn factories(&self) -> &Arc<FactoryRegistry> {
        self.0.shared.locator.registry()
    }

    /// Returns the scope named `name`, creating it if required
    pub fn open(&self, name: impl Into<ScopeName>) -> Result<Scope, ConfigError> {
        self.open_scope(name.into(), true)
    }

    /// Opens every scope and attaches each one to the previous, returning the last one
    ///
    /// ```rust
    /// use thicket_di::{ScopeDirectory, ScopeName};
    ///
    /// let directory = ScopeDirectory::builder().build();
    /// let session = directory.open_chain(["app", "session"]).unwrap();
    /// assert_eq!(session.parent().unwrap().name(), &ScopeName::from("app"));
    ///
    /// // Reopening the chain returns the same leaf
    /// let again = directory.open_chain(["app", "session"]).unwrap();
    /// assert!(again.ptr_eq(&session));
    /// ```
    pub fn open_chain<Name: Into<ScopeName>>(
        &self,
        names: impl IntoIterator<Item = Name>,
    ) -> Result<Scope, ConfigError> {
        let mut names = names.into_iter();
        let first = names.next().ok_or(ConfigError::EmptyScopeChain)?;

        let mut current = self.open_scope(first.into(), true)?;
        for name in names {
            // Attached right away, so never a second root
            let child = self.open_scope(name.into(), false)?;
            current = current.attach_child(&child)?;
        }
        Ok(current)
    }

    fn open_scope(&self, name: ScopeName, check_root: bool) -> Result<Scope, ConfigError> {
        let scope = match self.0.scopes.entry(name.clone()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let scope = Scope::new(name.clone(), self.0.shared.clone());
                slot.insert(scope.clone());
                scope
            }
        };
        tracing::debug!("Opened scope '{}'", name);

        if check_root && !self.0.shared.configuration.allows_multiple_root_scopes() {
            let mut root = self.0.root.lock();
            match root.as_ref() {
                None => *root = Some(name),
                Some(existing) if existing == &name => {}
                Some(existing) => {
                    let existing = existing.clone();
                    drop(root);
                    self.0.scopes.remove_if(&name, |_, open| open.ptr_eq(&scope));
                    scope.mark_closed();
                    tracing::warn!("Rejected scope '{}', '{}' is already the root", name, existing);
                    return Err(ConfigError::MultipleRootScopes {
                        scope: name,
                        root: existing,
                    });
                }
            }
        }
        Ok(scope)
    }

    /// Closes the scope named `name` and all of its descendants
    ///
    /// Returns false if no such scope was open.
    pub fn close(&self, name: impl Into<ScopeName>) -> bool {
        let name = name.into();
        let Some((_, scope)) = self.0.scopes.remove(&name) else {
            return false;
        };

        if let Some(parent) = scope.parent() {
            if let Err(e) = parent.detach_child(&scope) {
                tracing::warn!("Failed to detach closed scope: {}", e);
            }
        }
        {
            let mut root = self.0.root.lock();
            if root.as_ref() == Some(&name) {
                *root = None;
            }
        }

        self.remove_descendants(&scope);
        scope.mark_closed();
        tracing::debug!("Closed scope '{}'", name);
        true
    }

    fn remove_descendants(&self, scope: &Scope) {
        for child in scope.children() {
            self.0
                .scopes
                .remove_if(child.name(), |_, open| open.ptr_eq(&child));
            self.remove_descendants(&child);
        }
    }

    /// Closes every scope and forgets all unbound providers
    pub fn reset(&self) {
        let names: Vec<ScopeName> = self.0.scopes.iter().map(|s| s.key().clone()).collect();
        for name in names {
            self.close(name);
        }
        self.0.shared.unbound_providers.lock().clear();
        *self.0.root.lock() = None;
        tracing::debug!("Reset scope directory");
    }

    /// Resets a single scope, see [Scope::reset]
    pub fn reset_scope(&self, name: impl Into<ScopeName>) -> bool {
        match self.get(name) {
            Some(scope) => {
                scope.reset();
                true
            }
            None => false,
        }
    }

    /// Returns the open scope named `name`, without creating it
    pub fn get(&self, name: impl Into<ScopeName>) -> Option<Scope> {
        self.0
            .scopes
            .get(&name.into())
            .map(|scope| scope.value().clone())
    }

    pub fn is_open(&self, name: impl Into<ScopeName>) -> bool {
        self.0.scopes.contains_key(&name.into())
    }

    /// Number of open scopes
    pub fn len(&self) -> usize {
        self.0.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.scopes.is_empty()
    }
}
