use std::{marker::PhantomData, sync::Arc};

use crate::{
    errors::{ConfigError, InjectError, ResolveError},
    factories::{DynProvider, ErasedProvider, Provider},
    types::{BindingKey, Injectable, Instance, ProviderFlags, TypeInfo},
};

/// Converts the product of an implementation factory into the bound type
pub(crate) type InstanceAdapter = Arc<dyn Fn(Instance) -> Result<Instance, InjectError> + Send + Sync>;
/// Converts the product of a provider factory into a provider
pub(crate) type ProviderAdapter =
    Arc<dyn Fn(Instance) -> Result<Arc<dyn DynProvider>, InjectError> + Send + Sync>;

/// How a binding produces its values, resolved once at install time
#[derive(Clone)]
pub(crate) enum BindingMode {
    /// The bound class constructs itself
    Simple,
    /// An implementation class is constructed and exposed as the bound class
    Class {
        implementation: TypeInfo,
        adapt: InstanceAdapter,
    },
    Instance(Instance),
    ProviderInstance(Arc<dyn DynProvider>),
    /// A provider class is constructed, its values are exposed as the bound class
    ProviderClass {
        provider: TypeInfo,
        adapt: ProviderAdapter,
    },
}

/// Public view of a [Binding]'s mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Simple,
    Class,
    Instance,
    ProviderInstance,
    ProviderClass,
}

/// Declares how a class (optionally named) is provided in a scope
#[derive(Clone)]
pub struct Binding {
    pub(crate) key: BindingKey,
    pub(crate) mode: BindingMode,
    pub(crate) flags: ProviderFlags,
    pub(crate) in_declaring_scope: bool,
}

impl Binding {
    fn new<T: ?Sized + Injectable>() -> Self {
        Binding {
            key: BindingKey::of::<T>(None),
            mode: BindingMode::Simple,
            flags: ProviderFlags::default(),
            in_declaring_scope: false,
        }
    }

    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    pub fn kind(&self) -> BindingKind {
        match self.mode {
            BindingMode::Simple => BindingKind::Simple,
            BindingMode::Class { .. } => BindingKind::Class,
            BindingMode::Instance(_) => BindingKind::Instance,
            BindingMode::ProviderInstance(_) => BindingKind::ProviderInstance,
            BindingMode::ProviderClass { .. } => BindingKind::ProviderClass,
        }
    }

    pub fn flags(&self) -> ProviderFlags {
        self.flags
    }

    /// Products are built against the scope the binding is installed in
    pub fn creates_in_declaring_scope(&self) -> bool {
        self.in_declaring_scope
    }

    /// The class whose factory builds values for this binding, if any
    pub(crate) fn constructed_class(&self) -> Option<TypeInfo> {
        match &self.mode {
            BindingMode::Simple => Some(self.key.class),
            BindingMode::Class { implementation, .. } => Some(*implementation),
            BindingMode::ProviderClass { provider, .. } => Some(*provider),
            BindingMode::Instance(_) | BindingMode::ProviderInstance(_) => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some("") = self.key.name.as_deref() {
            return Err(ConfigError::InvalidBinding(self.key.class));
        }
        // Fixed instances are always shared, provider instances are never rebuilt
        let ignored = match self.mode {
            BindingMode::Instance(_) => self.flags != ProviderFlags::default(),
            BindingMode::ProviderInstance(_) => self.flags.singleton || self.flags.releasable,
            _ => false,
        };
        if ignored {
            return Err(ConfigError::IneffectiveFlags {
                class: self.key.class,
                kind: self.kind(),
            });
        }
        Ok(())
    }
}

/// A set of bindings, installed into a scope at once
///
/// ```rust
/// use thicket_di::Module;
///
/// struct Config {
///     port: u16,
/// }
///
/// let mut module = Module::new();
/// module.bind::<Config>().to_instance(Config { port: 8080 });
/// module
///     .bind::<String>()
///     .with_name("greeting")
///     .to_instance("hello".to_string());
/// assert_eq!(module.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Module {
    bindings: Vec<Binding>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new binding for `T`, by default `T` constructs itself
    pub fn bind<T: ?Sized + Injectable>(&mut self) -> BindingBuilder<'_, T> {
        self.bindings.push(Binding::new::<T>());
        let index = self.bindings.len() - 1;
        BindingBuilder {
            binding: &mut self.bindings[index],
            _marker: PhantomData,
        }
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
impl IntoIterator for Module {
    type Item = Binding;
    type IntoIter = std::vec::IntoIter<Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}

/// Configures a binding in place
pub struct BindingBuilder<'m, T: ?Sized> {
    binding: &'m mut Binding,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'m, T: ?Sized + Injectable> BindingBuilder<'m, T> {
    pub fn with_name(self, name: impl AsRef<str>) -> Self {
        self.binding.key.name = Some(Arc::from(name.as_ref()));
        self
    }

    /// Binds to an implementation class, converted by `cast`
    ///
    /// A non capturing closure is enough for trait objects: `.to_class::<English>(|english| english)`.
    pub fn to_class<I: Injectable>(self, cast: fn(Arc<I>) -> Arc<T>) -> Self {
        let adapt: InstanceAdapter =
            Arc::new(move |instance: Instance| -> Result<Instance, InjectError> {
                let implementation = instance.downcast::<I>().map_err(|actual_type| {
                    InjectError::from(ResolveError::DowncastFailed {
                        required_type: std::any::type_name::<I>(),
                        actual_type,
                    })
                })?;
                Ok(Instance::from_arc(cast(implementation)))
            });
        self.binding.mode = BindingMode::Class {
            implementation: TypeInfo::of::<I>(),
            adapt,
        };
        self
    }

    /// Binds to a fixed value, which is a singleton by nature
    pub fn to_instance(self, instance: impl Into<Arc<T>>) -> Self {
        self.binding.mode = BindingMode::Instance(Instance::from_arc(instance.into()));
        self
    }

    pub fn to_provider_instance<P: Provider<T>>(self, provider: P) -> Self {
        self.binding.mode = BindingMode::ProviderInstance(ErasedProvider::<T, P>::erase(provider));
        self
    }

    /// Binds to a provider class, which is itself constructed by its factory
    pub fn to_provider_class<P: Provider<T> + Injectable>(self) -> Self {
        let adapt: ProviderAdapter =
            Arc::new(|instance: Instance| -> Result<Arc<dyn DynProvider>, InjectError> {
                let provider = instance.downcast::<P>().map_err(|actual_type| {
                    InjectError::from(ResolveError::DowncastFailed {
                        required_type: std::any::type_name::<P>(),
                        actual_type,
                    })
                })?;
                Ok(ErasedProvider::<T, Arc<P>>::erase(provider))
            });
        self.binding.mode = BindingMode::ProviderClass {
            provider: TypeInfo::of::<P>(),
            adapt,
        };
        self
    }

    /// Creates one value and shares it, the value is built in the declaring scope
    ///
    /// Instance and provider instance bindings reject this flag when installed.
    pub fn singleton(self) -> Self {
        self.binding.flags.singleton = true;
        self.binding.in_declaring_scope = true;
        self
    }

    /// A singleton whose value may be dropped by [Scope::release](crate::Scope::release)
    pub fn releasable(self) -> Self {
        self.binding.flags.releasable = true;
        self.singleton()
    }

    /// Values are built against the declaring scope instead of the requesting scope
    pub fn instances_in_scope(self) -> Self {
        self.binding.in_declaring_scope = true;
        self
    }

    /// The value produced by the provider is cached
    ///
    /// Instance bindings reject this flag when installed.
    pub fn providing_singleton(self) -> Self {
        self.binding.flags.providing_singleton = true;
        self
    }

    /// The cached provided value may be dropped by [Scope::release](crate::Scope::release)
    pub fn providing_releasable(self) -> Self {
        self.binding.flags.providing_releasable = true;
        self.providing_singleton()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factories::FnProvider;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }
    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn builder_sets_mode_and_flags() {
        let mut module = Module::new();
        module.bind::<English>();
        module
            .bind::<dyn Greeter>()
            .to_class::<English>(|english| english)
            .releasable();
        module
            .bind::<u32>()
            .with_name("answer")
            .to_provider_instance(FnProvider::new(|| Ok(Arc::new(42_u32))))
            .providing_releasable();

        let bindings: Vec<_> = module.into_iter().collect();
        assert_eq!(bindings[0].kind(), BindingKind::Simple);
        assert!(!bindings[0].creates_in_declaring_scope());

        assert_eq!(bindings[1].kind(), BindingKind::Class);
        assert_eq!(bindings[1].constructed_class(), Some(TypeInfo::of::<English>()));
        assert!(bindings[1].flags().singleton && bindings[1].flags().releasable);
        assert!(bindings[1].creates_in_declaring_scope());

        assert_eq!(bindings[2].key().name.as_deref(), Some("answer"));
        assert_eq!(bindings[2].constructed_class(), None);
        assert!(bindings[2].flags().providing_singleton);
    }

    #[test]
    fn class_adapter_casts_to_the_bound_type() {
        let mut module = Module::new();
        module
            .bind::<dyn Greeter>()
            .to_class::<English>(|english| english);

        let binding = module.into_iter().next().unwrap();
        let BindingMode::Class { adapt, .. } = binding.mode else {
            panic!("expected a class binding");
        };

        let greeter = (*adapt)(Instance::new(English)).unwrap();
        assert_eq!(greeter.downcast::<dyn Greeter>().unwrap().greet(), "hello");
        assert!((*adapt)(Instance::new(1_u8)).is_err());
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut module = Module::new();
        module.bind::<u8>().with_name("");
        let binding = module.into_iter().next().unwrap();
        assert!(matches!(binding.validate(), Err(ConfigError::InvalidBinding(_))));
    }

    #[test]
    fn flags_without_effect_are_rejected() {
        let mut module = Module::new();
        module.bind::<u8>().to_instance(1_u8).singleton();
        module
            .bind::<u16>()
            .to_instance(2_u16)
            .providing_singleton();
        module
            .bind::<u32>()
            .to_provider_instance(FnProvider::new(|| Ok(Arc::new(3_u32))))
            .releasable();
        module
            .bind::<u64>()
            .to_provider_instance(FnProvider::new(|| Ok(Arc::new(4_u64))))
            .providing_releasable();

        let results: Vec<_> = module.into_iter().map(|binding| binding.validate()).collect();
        assert!(matches!(
            results[0],
            Err(ConfigError::IneffectiveFlags {
                kind: BindingKind::Instance,
                ..
            })
        ));
        assert!(matches!(
            results[1],
            Err(ConfigError::IneffectiveFlags {
                kind: BindingKind::Instance,
                ..
            })
        ));
        assert!(matches!(
            results[2],
            Err(ConfigError::IneffectiveFlags {
                kind: BindingKind::ProviderInstance,
                ..
            })
        ));
        assert!(results[3].is_ok());
    }
}
