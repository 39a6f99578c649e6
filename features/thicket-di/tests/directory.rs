use std::sync::Arc;

use pretty_assertions::assert_eq;
use thicket_di::{
    ConfigError, Configuration, DynError, FactoryRegistry, FactorySource, FnProvider, InjectError,
    InstanceFactory, MemberInjector, Module, Provider, Scope, ScopeAnnotation, ScopeDirectory,
    ScopeName,
};

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

struct English;
impl Greeter for English {
    fn greet(&self, name: &str) -> String {
        format!("Hello {name}")
    }
}
struct EnglishFactory;
impl InstanceFactory for EnglishFactory {
    type Provides = English;

    fn construct(&self, _scope: &Scope) -> Result<English, DynError> {
        Ok(English)
    }
}

/// Provider class handing out greetings
struct GreetingProvider {
    greeter: Arc<dyn Greeter>,
}
impl Provider<String> for GreetingProvider {
    fn get(&self) -> Result<Arc<String>, InjectError> {
        Ok(Arc::new(self.greeter.greet("world")))
    }
}
struct GreetingProviderFactory;
impl InstanceFactory for GreetingProviderFactory {
    type Provides = GreetingProvider;

    fn construct(&self, scope: &Scope) -> Result<GreetingProvider, DynError> {
        Ok(GreetingProvider {
            greeter: scope.get_instance::<dyn Greeter>()?,
        })
    }
}

#[derive(Default)]
struct Page {
    greeter: Option<Arc<dyn Greeter>>,
    title: Option<Arc<String>>,
}
struct PageInjector;
impl MemberInjector for PageInjector {
    type Target = Page;

    fn inject(&self, target: &mut Page, scope: &Scope) -> Result<(), DynError> {
        target.greeter = Some(scope.get_instance::<dyn Greeter>()?);
        target.title = scope.resolve_named("title")?;
        Ok(())
    }
}

struct Failing;
struct FailingFactory;
impl InstanceFactory for FailingFactory {
    type Provides = Failing;

    fn construct(&self, _scope: &Scope) -> Result<Failing, DynError> {
        Err("out of coffee".into())
    }
}

fn greeting_module() -> Module {
    let mut module = Module::new();
    module
        .bind::<dyn Greeter>()
        .to_class::<English>(|english| english)
        .singleton();
    module
}

#[test]
fn provider_classes_are_constructed_by_their_factory() {
    let registry = FactoryRegistry::new();
    registry
        .register_factory(EnglishFactory)
        .register_factory(GreetingProviderFactory);
    let directory = ScopeDirectory::builder().with_registry(registry).build();
    let scope = directory.open("app").unwrap();

    let mut module = greeting_module();
    module
        .bind::<String>()
        .with_name("greeting")
        .to_provider_class::<GreetingProvider>()
        .providing_singleton();
    scope.install_modules([module]).unwrap();

    let greeting = scope.get_named_instance::<String>("greeting").unwrap();
    assert_eq!(greeting.as_str(), "Hello world");
    assert!(Arc::ptr_eq(
        &greeting,
        &scope.get_named_instance::<String>("greeting").unwrap()
    ));
}

#[test]
fn providing_releasable_values_are_rebuilt_after_release() {
    let directory = ScopeDirectory::builder().build();
    let scope = directory.open("app").unwrap();
    let mut module = Module::new();
    module
        .bind::<Vec<u8>>()
        .to_provider_instance(FnProvider::new(|| Ok(Arc::new(vec![1_u8, 2, 3]))))
        .providing_releasable();
    scope.install_modules([module]).unwrap();

    let first = scope.get_instance::<Vec<u8>>().unwrap();
    assert!(Arc::ptr_eq(&first, &scope.get_instance::<Vec<u8>>().unwrap()));

    scope.release();
    let second = scope.get_instance::<Vec<u8>>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
}

#[test]
fn member_injectors_populate_existing_values() {
    let registry = FactoryRegistry::new();
    registry
        .register_factory(EnglishFactory)
        .register_member_injector(PageInjector);
    let directory = ScopeDirectory::builder().with_registry(registry).build();
    let scope = directory.open("app").unwrap();
    scope.install_modules([greeting_module()]).unwrap();

    let mut page = Page::default();
    scope.inject(&mut page).unwrap();
    assert_eq!(page.greeter.unwrap().greet("you"), "Hello you");
    assert!(page.title.is_none());
}

#[test]
fn fallback_sources_are_opt_in() {
    let fallback = Arc::new(FactoryRegistry::new());
    fallback.register_factory(EnglishFactory);

    let strict = ScopeDirectory::builder()
        .with_fallback(fallback.clone())
        .build();
    assert!(matches!(
        strict.open("app").unwrap().get_instance::<English>(),
        Err(InjectError::Config(ConfigError::NoFactory(_)))
    ));

    let lenient = ScopeDirectory::builder()
        .with_configuration(Configuration::default().enable_fallback())
        .with_fallback(fallback)
        .build();
    assert!(lenient.open("app").unwrap().get_instance::<English>().is_ok());
}

#[test]
fn child_registries_extend_the_primary_registry() {
    let child: Arc<dyn FactorySource> = {
        let registry = FactoryRegistry::new();
        registry.register_factory(EnglishFactory);
        Arc::new(registry)
    };
    let directory = ScopeDirectory::builder().build();
    directory.factories().add_child_registry(child);

    let scope = directory.open("app").unwrap();
    assert!(scope.get_instance::<English>().is_ok());
}

#[test]
fn factory_failures_name_the_product() {
    let registry = FactoryRegistry::new();
    registry.register_factory(FailingFactory);
    let directory = ScopeDirectory::builder().with_registry(registry).build();

    match directory.open("app").unwrap().get_instance::<Failing>() {
        Err(InjectError::FactoryFailed { product, error }) => {
            assert_eq!(product, std::any::type_name::<Failing>());
            assert_eq!(error.to_string(), "out of coffee");
        }
        Err(other) => panic!("expected a factory failure, got {other:?}"),
        Ok(_) => panic!("expected a factory failure"),
    }
}

#[test]
fn marker_named_scopes_support_their_marker() {
    struct Session;
    let directory = ScopeDirectory::builder().build();
    let scope = directory
        .open_chain([ScopeName::from("app"), ScopeName::of::<Session>()])
        .unwrap();

    assert_eq!(scope.name(), &ScopeName::of::<Session>());
    assert!(scope.supports_scope_annotation(&ScopeAnnotation::of::<Session>()));
    assert!(!scope.supports_scope_annotation(&ScopeAnnotation::singleton()));
    assert!(scope
        .root()
        .supports_scope_annotation(&ScopeAnnotation::singleton()));
}

#[test]
fn a_single_root_can_be_enforced() {
    let directory = ScopeDirectory::builder()
        .with_configuration(Configuration::for_development().prevent_multiple_root_scopes())
        .build();

    let leaf = directory.open_chain(["app", "session", "screen"]).unwrap();
    match directory.open("other") {
        Err(ConfigError::MultipleRootScopes { scope, root }) => {
            assert_eq!(scope, ScopeName::from("other"));
            assert_eq!(root, ScopeName::from("app"));
        }
        other => panic!("expected a second root to fail, got {other:?}"),
    }

    directory.close("app");
    assert!(directory.is_empty());
    assert!(!leaf.is_open());
    assert!(directory.open("other").is_ok());
}
