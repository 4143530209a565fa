//! lazybind - deferred name binding
//!
//! Declarations made inside a guard window become sentinels; the first
//! legal lookup loads the value, rewrites the scope and returns it.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod guard;
pub mod ident;
pub mod import_spec;
pub mod interner;
pub mod loader;
pub mod resolve;
pub mod scenario;
pub mod scope;
pub mod sentinel;
pub mod tracker;
pub mod value;

pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use engine::{Engine, EngineBuilder};
pub use error::{BindError, ErrorRecord, FailureCause, FixSuggestion, LoadError, ScenarioError};
pub use event_log::{Event, EventKind, EventLog};
pub use guard::{GuardHandle, GuardId, GuardMode, GuardOptions};
pub use import_spec::{DeclarationSite, ImportSpec, Item};
pub use loader::{create_loader, FnLoader, Loader, StaticLoader};
pub use scope::{Entry, Scope, ScopeRef};
pub use sentinel::{BindingState, SentinelBinding};
pub use tracker::{CallBoundaryTracker, Distance, NoIntrospection, StackIntrospection};
pub use value::Value;
