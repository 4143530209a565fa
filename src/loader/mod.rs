//! # Loader Abstraction Layer
//!
//! The module-loading subsystem is external to the engine; it is reached
//! only through the [`Loader`] trait.
//!
//! - [`Loader`] - turn an [`ImportSpec`] into a value
//! - [`StaticLoader`] - in-memory module registry with call counting and patching
//! - [`FnLoader`] - wrap a closure
//!
//! ## Creating Loaders
//!
//! ```rust
//! use lazybind::loader::create_loader;
//!
//! assert!(create_loader("static").is_ok());
//! assert!(create_loader("invalid").is_err());
//! ```
//!
//! The loader receives the calling [`ExecutionContext`] so that loading a
//! module can itself perform lookups, exactly as running a module body
//! would.

mod fn_loader;
mod static_loader;

pub use fn_loader::FnLoader;
pub use static_loader::{PatchGuard, StaticLoader};

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::error::LoadError;
use crate::import_spec::ImportSpec;
use crate::value::Value;

/// Produces the value an import spec names
pub trait Loader: Send + Sync {
    /// Loader name for logs and diagnostics
    fn name(&self) -> &str;

    /// Load `spec.source` and return the requested item (or the whole module)
    fn resolve(&self, cx: &ExecutionContext, spec: &ImportSpec) -> Result<Value, LoadError>;
}

/// Create a loader by name
pub fn create_loader(name: &str) -> Result<Box<dyn Loader>> {
    match name.to_lowercase().as_str() {
        "static" => Ok(Box::new(StaticLoader::new())),
        _ => anyhow::bail!("Unknown loader: '{}'. Available: static", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_known_loader() {
        let loader = create_loader("Static").unwrap();
        assert_eq!(loader.name(), "static");
    }

    #[test]
    fn create_unknown_loader_lists_available() {
        let err = create_loader("python").err().unwrap();
        assert!(err.to_string().contains("Available: static"));
    }
}
