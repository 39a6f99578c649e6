use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use crate::{errors::InjectError, factories::Provider, scope::Scope, types::Injectable};

/// Resolves `T` through its scope on every call
///
/// Singletons are still only built once, the scope's providers decide what is cached.
/// Calls fail once the scope is closed.
pub struct ScopedProvider<T: ?Sized> {
    scope: Scope,
    name: Option<Arc<str>>,
    _marker: PhantomData<fn() -> Arc<T>>,
}
impl<T: ?Sized> Clone for ScopedProvider<T> {
    fn clone(&self) -> Self {
        ScopedProvider {
            scope: self.scope.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}
impl<T: ?Sized> Debug for ScopedProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedProvider")
            .field("type", &std::any::type_name::<T>())
            .field("name", &self.name)
            .field("scope", self.scope.name())
            .finish()
    }
}

impl<T: ?Sized + Injectable> ScopedProvider<T> {
    pub(crate) fn new(scope: Scope, name: Option<&str>) -> Self {
        ScopedProvider {
            scope,
            name: name.map(Arc::from),
            _marker: PhantomData,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl<T: ?Sized + Injectable> Provider<T> for ScopedProvider<T> {
    fn get(&self) -> Result<Arc<T>, InjectError> {
        self.scope.instance_of::<T>(self.name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binding::Module, ScopeDirectory};

    #[test]
    fn resolves_on_every_call_until_closed() {
        let directory = ScopeDirectory::builder().build();
        let scope = directory.open("app").unwrap();
        let mut module = Module::new();
        module.bind::<u32>().with_name("port").to_instance(8080_u32);
        scope.install_modules([module]).unwrap();

        let provider = scope.get_named_provider::<u32>("port").unwrap();
        let copy = provider.clone();
        assert_eq!(*provider.get().unwrap(), 8080);

        directory.close("app");
        assert!(matches!(copy.get(), Err(InjectError::ScopeClosed(_))));
    }
}
