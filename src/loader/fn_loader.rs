//! Closure-backed loader

use std::fmt;

use super::Loader;
use crate::context::ExecutionContext;
use crate::error::LoadError;
use crate::import_spec::ImportSpec;
use crate::value::Value;

/// Loader that delegates to a closure
pub struct FnLoader<F> {
    name: String,
    load: F,
}

impl<F> FnLoader<F>
where
    F: Fn(&ExecutionContext, &ImportSpec) -> Result<Value, LoadError> + Send + Sync,
{
    pub fn new(load: F) -> Self {
        Self {
            name: "fn".to_string(),
            load,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Loader for FnLoader<F>
where
    F: Fn(&ExecutionContext, &ImportSpec) -> Result<Value, LoadError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, cx: &ExecutionContext, spec: &ImportSpec) -> Result<Value, LoadError> {
        (self.load)(cx, spec)
    }
}

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader").field("name", &self.name).finish()
    }
}
