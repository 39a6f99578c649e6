//! Scoped dependency injection
//!
//! Instances live in a forest of [Scope]s kept by a [ScopeDirectory]. Every scope owns
//! the bindings installed through [Module]s and resolves everything it does not bind
//! through its ancestors. Classes which are not bound anywhere are constructed by the
//! [InstanceFactory] registered for them in a [FactoryRegistry].
//!
//! ```rust
//! use std::sync::Arc;
//! use thicket_di::{DynError, FactoryRegistry, InstanceFactory, Module, Scope, ScopeDirectory};
//!
//! struct Database {
//!     url: Arc<String>,
//! }
//! struct DatabaseFactory;
//! impl InstanceFactory for DatabaseFactory {
//!     type Provides = Database;
//!
//!     fn construct(&self, scope: &Scope) -> Result<Database, DynError> {
//!         Ok(Database {
//!             url: scope.get_named_instance::<String>("url")?,
//!         })
//!     }
//!
//!     fn is_singleton(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let registry = FactoryRegistry::new();
//! registry.register_factory(DatabaseFactory);
//! let directory = ScopeDirectory::builder().with_registry(registry).build();
//!
//! let app = directory.open("app").unwrap();
//! let mut module = Module::new();
//! module
//!     .bind::<String>()
//!     .with_name("url")
//!     .to_instance("postgres://localhost".to_string());
//! app.install_modules([module]).unwrap();
//!
//! // Singletons are placed in the root scope, children share them
//! let request = directory.open_chain(["app", "request"]).unwrap();
//! let database = request.get_instance::<Database>().unwrap();
//! assert_eq!(database.url.as_str(), "postgres://localhost");
//! assert!(Arc::ptr_eq(&database, &app.get_instance::<Database>().unwrap()));
//! ```

mod binding;
mod builder;
mod configuration;
mod cycle_check;
mod directory;
mod errors;
mod factories;
mod locator;
mod provider;
mod resolver;
mod scope;
mod types;

pub use binding::*;
pub use builder::*;
pub use configuration::*;
pub use directory::ScopeDirectory;
pub use errors::*;
pub use factories::{DynFactory, DynMemberInjector, FnProvider, InstanceFactory, MemberInjector, Provider};
pub use locator::{FactoryRegistry, FactorySource};
pub use resolver::*;
pub use scope::Scope;
pub use types::*;
