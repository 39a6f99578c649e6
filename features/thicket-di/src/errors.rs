use std::sync::Arc;

use thiserror::Error;

use crate::{
    binding::BindingKind,
    types::{BindingKey, DynError, ScopeAnnotation, ScopeName, TypeInfo},
};

#[derive(Error, Debug, Clone)]
pub enum InjectError {
    /// Modules, scopes or factories are set up incorrectly
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A dependency could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The scope was closed, no further resolution is possible
    #[error("Scope '{0}' is closed")]
    ScopeClosed(ScopeName),
    /// A provider without instance, provider, factory or provider factory. This is a bug in thicket.
    #[error("Provider for '{0}' has neither an instance, a provider, a factory nor a provider factory")]
    IllegalProviderState(TypeInfo),
    /// A Factory failed to build
    #[error("Factory for '{product}' failed - error: {error:?}")]
    FactoryFailed {
        product: &'static str,
        error: Arc<DynError>,
    },
    /// A Member Injector failed to populate its target
    #[error("Member injector for '{target}' failed - error: {error:?}")]
    InjectionFailed {
        target: &'static str,
        error: Arc<DynError>,
    },
}
impl InjectError {
    /// Wraps an error returned by generated code
    ///
    /// Errors which originate from thicket itself are passed through unchanged.
    pub(crate) fn from_factory(product: TypeInfo, error: DynError) -> Self {
        match error.downcast::<InjectError>() {
            Ok(inner) => *inner,
            Err(error) => InjectError::FactoryFailed {
                product: product.type_name,
                error: Arc::new(error),
            },
        }
    }

    pub(crate) fn from_member_injector(target: TypeInfo, error: DynError) -> Self {
        match error.downcast::<InjectError>() {
            Ok(inner) => *inner,
            Err(error) => InjectError::InjectionFailed {
                target: target.type_name,
                error: Arc::new(error),
            },
        }
    }

    /// True if the error only means that nothing is bound or constructible for `key`
    ///
    /// A missing transitive dependency of `key` does not count.
    pub fn is_missing(&self, key: &BindingKey) -> bool {
        match self {
            InjectError::Resolve(ResolveError::NoBinding { key: missing, .. }) => missing == key,
            InjectError::Config(ConfigError::NoFactory(class)) => *class == key.class,
            _ => false,
        }
    }
}

/// Errors in the configuration of scopes and bindings
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The locator knows no factory for the class
    #[error("No factory could be found for '{0}'")]
    NoFactory(TypeInfo),
    /// The locator knows no member injector for the class
    #[error("No member injector could be found for '{0}'")]
    NoMemberInjector(TypeInfo),
    #[error("Binding for '{0}' has an empty name")]
    InvalidBinding(TypeInfo),
    #[error("Binding for '{class}' is a {kind:?} binding, its singleton and releasable flags would have no effect")]
    IneffectiveFlags { class: TypeInfo, kind: BindingKind },
    #[error("Scope '{0}' already has test modules installed, reset it first")]
    TestModulesAlreadyInstalled(ScopeName),
    #[error("'{class}' is annotated with {annotation} but is bound in scope '{scope}' which does not support it")]
    IllegalBinding {
        class: TypeInfo,
        annotation: ScopeAnnotation,
        scope: ScopeName,
    },
    #[error("No scope supports {annotation}, searched '{scope}' and its parents [{}]", join(.ancestors))]
    NoScopeSupporting {
        annotation: ScopeAnnotation,
        scope: ScopeName,
        ancestors: Vec<ScopeName>,
    },
    #[error("'{class}' is annotated with {annotation} but neither '{scope}' nor its parents [{}] support it", join(.ancestors))]
    UnsupportedScopeAnnotation {
        class: TypeInfo,
        annotation: ScopeAnnotation,
        scope: ScopeName,
        ancestors: Vec<ScopeName>,
    },
    #[error("Scope '{child}' already has the parent '{parent}', it can not be attached to '{requested}'")]
    ParentConflict {
        child: ScopeName,
        parent: ScopeName,
        requested: ScopeName,
    },
    #[error("Scope '{child}' can not be attached to '{parent}', it would become its own ancestor")]
    AttachCycle { child: ScopeName, parent: ScopeName },
    #[error("Scope '{child}' is not a child of '{parent}'")]
    NotAChild { child: ScopeName, parent: ScopeName },
    #[error("Scope '{scope}' would be a second root scope next to '{root}'")]
    MultipleRootScopes { scope: ScopeName, root: ScopeName },
    #[error("At least one scope name is required to open a chain of scopes")]
    EmptyScopeChain,
}

/// Errors when trying to resolve a dependency
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Named lookups are never satisfied by dynamic discovery
    #[error("No binding was defined for '{key}' in scope '{scope}' and its parents [{}]", join(.ancestors))]
    NoBinding {
        key: BindingKey,
        scope: ScopeName,
        ancestors: Vec<ScopeName>,
    },
    #[error("A Circular Dependency on '{key}' exists through {} - Consider using `Lazy`", chain(.path))]
    CyclicDependency {
        key: BindingKey,
        path: Vec<BindingKey>,
    },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

fn join(names: &[ScopeName]) -> String {
    names
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn chain(path: &[BindingKey]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    struct Foo;
    struct Bar;

    #[test]
    fn no_binding_lists_ancestors() {
        let error = ResolveError::NoBinding {
            key: BindingKey::of::<Foo>(Some("main")),
            scope: ScopeName::from("child"),
            ancestors: vec![ScopeName::from("parent"), ScopeName::from("root")],
        };

        assert_eq!(
            error.to_string(),
            format!(
                "No binding was defined for '{}#main' in scope 'child' and its parents [parent, root]",
                std::any::type_name::<Foo>()
            )
        );
    }

    #[test]
    fn cycle_lists_path() {
        let foo = BindingKey::of::<Foo>(None);
        let bar = BindingKey::of::<Bar>(None);
        let error = ResolveError::CyclicDependency {
            key: foo.clone(),
            path: vec![foo.clone(), bar.clone(), foo.clone()],
        };

        assert!(error
            .to_string()
            .contains(&format!("{foo} -> {bar} -> {foo}")));
    }

    #[test]
    fn factory_errors_pass_through_inject_errors() {
        let inner: DynError = Box::new(InjectError::ScopeClosed(ScopeName::from("gone")));
        let error = InjectError::from_factory(TypeInfo::of::<Foo>(), inner);
        assert!(matches!(error, InjectError::ScopeClosed(_)));

        let other: DynError = "boom".into();
        let error = InjectError::from_factory(TypeInfo::of::<Foo>(), other);
        assert!(matches!(error, InjectError::FactoryFailed { .. }));
    }
}
