use std::sync::Arc;

use thicket_di::{
    Configuration, DynError, FactoryRegistry, InstanceFactory, Module, Scope, ScopeAnnotation,
    ScopeDirectory,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), DynError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("THICKET_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = FactoryRegistry::new();
    registry
        .register_factory(ConfigFactory)
        .register_factory(SessionFactory);

    let directory = ScopeDirectory::builder()
        .with_configuration(Configuration::for_development())
        .with_registry(registry)
        .build();

    let app = directory.open("app")?;
    let mut module = Module::new();
    module
        .bind::<String>()
        .with_name("greeting")
        .to_instance("Hello".to_string());
    app.install_modules([module])?;

    for user in ["alice", "bob"] {
        let session = directory.open_chain(["app", user])?;
        session.support_scope_annotation(ScopeAnnotation::of::<SessionScope>());

        let first = session.get_instance::<Session>()?;
        let second = session.get_instance::<Session>()?;
        println!("{} ({:?})", first.greet(user), Arc::ptr_eq(&first, &second));
    }

    println!("{:?}", directory);
    directory.close("alice");
    println!("{:?}", directory);
    Ok(())
}

/// Marker for session scopes
struct SessionScope;

#[derive(Debug)]
struct Config {
    greeting: Arc<String>,
}
struct ConfigFactory;
impl InstanceFactory for ConfigFactory {
    type Provides = Config;

    fn construct(&self, scope: &Scope) -> Result<Config, DynError> {
        Ok(Config {
            greeting: scope.get_named_instance::<String>("greeting")?,
        })
    }

    fn is_singleton(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct Session {
    config: Arc<Config>,
}
impl Session {
    fn greet(&self, user: &str) -> String {
        format!("{}, {}!", self.config.greeting, user)
    }
}
struct SessionFactory;
impl InstanceFactory for SessionFactory {
    type Provides = Session;

    fn construct(&self, scope: &Scope) -> Result<Session, DynError> {
        Ok(Session {
            config: scope.get_instance::<Config>()?,
        })
    }

    fn scope_annotation(&self) -> Option<ScopeAnnotation> {
        Some(ScopeAnnotation::of::<SessionScope>())
    }

    fn is_singleton(&self) -> bool {
        true
    }
}
