use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// All errors must be clone
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Scopes are shared between threads, so anything injectable needs to be Send + Sync + 'static.
///
/// Unsized types (`dyn Trait`) are injectable too, they are handed out as `Arc<dyn Trait>`.
pub trait Injectable: Send + Sync + 'static {}
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// Type erased instance produced by a provider
///
/// Holds an `Arc<T>` behind `dyn Any`, which allows `T` to be unsized.
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<T: Injectable>(instance: T) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub fn from_arc<T: ?Sized + Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance: Arc::new(instance),
        }
    }

    pub fn downcast<T: ?Sized + Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match self.instance.downcast_ref::<Arc<T>>() {
            Some(downcasted) => Ok(downcasted.clone()),
            None => Err(self.info.type_name),
        }
    }

    /// Returns true if both instances share the same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// A class plus an optional binding name
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BindingKey {
    pub class: TypeInfo,
    pub name: Option<Arc<str>>,
}
impl BindingKey {
    pub fn of<T: ?Sized + 'static>(name: Option<&str>) -> Self {
        BindingKey {
            class: TypeInfo::of::<T>(),
            name: name.map(Arc::from),
        }
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}
impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}#{}", self.class, name),
            None => write!(f, "{}", self.class),
        }
    }
}

/// Identifies a scope in the [ScopeDirectory](crate::ScopeDirectory)
///
/// A scope is either named by a string, or by a marker type. Scopes named by a
/// marker type support the [ScopeAnnotation] of that marker.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum ScopeName {
    Named(Arc<str>),
    Marker(TypeInfo),
}
impl ScopeName {
    pub fn of<Marker: ?Sized + 'static>() -> Self {
        ScopeName::Marker(TypeInfo::of::<Marker>())
    }

    /// The annotation implied by the name, if it is a marker
    pub fn annotation(&self) -> Option<ScopeAnnotation> {
        match self {
            ScopeName::Named(_) => None,
            ScopeName::Marker(info) => Some(ScopeAnnotation(*info)),
        }
    }
}
impl From<&str> for ScopeName {
    fn from(name: &str) -> Self {
        ScopeName::Named(Arc::from(name))
    }
}
impl From<String> for ScopeName {
    fn from(name: String) -> Self {
        ScopeName::Named(Arc::from(name))
    }
}
impl From<&ScopeName> for ScopeName {
    fn from(name: &ScopeName) -> Self {
        name.clone()
    }
}
impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeName::Named(name) => f.write_str(name),
            ScopeName::Marker(info) => f.write_str(info.type_name),
        }
    }
}

/// Built-in scope marker, supported by every root scope
#[derive(Debug, Clone, Copy, Default)]
pub struct Singleton;

/// A scope marker a class can be declared under
///
/// Classes declared under a marker are placed in the nearest scope supporting it.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ScopeAnnotation(TypeInfo);
impl ScopeAnnotation {
    pub fn of<Marker: ?Sized + 'static>() -> Self {
        ScopeAnnotation(TypeInfo::of::<Marker>())
    }

    pub fn singleton() -> Self {
        Self::of::<Singleton>()
    }

    pub fn is_singleton(&self) -> bool {
        self.0.type_id == TypeId::of::<Singleton>()
    }

    pub fn info(&self) -> TypeInfo {
        self.0
    }
}
impl fmt::Display for ScopeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0.type_name)
    }
}

/// Singleton and releasable policy of a provider
///
/// Flags only ever get upgraded: merging factory metadata into a binding never clears a flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderFlags {
    /// The product is created once and cached
    pub singleton: bool,
    /// The cached product may be dropped by `release`
    pub releasable: bool,
    /// The product is a provider whose value is cached
    pub providing_singleton: bool,
    /// The cached provided value may be dropped by `release`
    pub providing_releasable: bool,
}
impl ProviderFlags {
    pub(crate) fn merge(&mut self, other: ProviderFlags) {
        self.singleton |= other.singleton;
        self.releasable |= other.releasable;
        self.providing_singleton |= other.providing_singleton;
        self.providing_releasable |= other.providing_releasable;
    }

    /// `release` may drop a cached value, so the factory has to be kept around
    pub(crate) fn rebuilds_after_release(&self) -> bool {
        self.releasable || self.providing_releasable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }
    struct English;
    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn instance_downcasts_unsized() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::from_arc(greeter);

        let resolved = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(resolved.greet(), "hello");
        assert!(instance.downcast::<English>().is_err());
    }

    #[test]
    fn marker_names_imply_annotation() {
        struct Activity;
        assert_eq!(
            ScopeName::of::<Activity>().annotation(),
            Some(ScopeAnnotation::of::<Activity>())
        );
        assert_eq!(ScopeName::from("root").annotation(), None);
        assert!(ScopeAnnotation::singleton().is_singleton());
        assert!(!ScopeAnnotation::of::<Activity>().is_singleton());
    }

    #[test]
    fn flags_merge_never_downgrades() {
        let mut flags = ProviderFlags {
            singleton: true,
            ..Default::default()
        };
        flags.merge(ProviderFlags {
            releasable: true,
            ..Default::default()
        });
        assert_eq!(
            flags,
            ProviderFlags {
                singleton: true,
                releasable: true,
                providing_singleton: false,
                providing_releasable: false,
            }
        );
    }
}
