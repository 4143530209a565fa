//! In-memory module registry
//!
//! Modules are JSON objects keyed by dotted path. Every `resolve` is counted
//! per `(source, item)` so callers can assert how often loading happened.
//! Clones share state, so a test can keep a handle after moving one into
//! an [`Engine`](crate::Engine).

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use super::Loader;
use crate::context::ExecutionContext;
use crate::error::LoadError;
use crate::import_spec::{ImportSpec, Item};
use crate::value::Value;

type CallKey = (Arc<str>, String);

/// Loader backed by a shared module map
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    modules: Arc<DashMap<Arc<str>, Value>>,
    calls: Arc<DashMap<CallKey, usize>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a whole module
    pub fn insert_module(&self, source: &str, module: Value) {
        self.modules.insert(Arc::from(source), module);
    }

    pub fn remove_module(&self, source: &str) -> Option<Value> {
        self.modules.remove(source).map(|(_, module)| module)
    }

    pub fn has_module(&self, source: &str) -> bool {
        self.modules.contains_key(source)
    }

    /// Set one member, creating the module if needed; returns the old member
    pub fn set_item(&self, source: &str, item: &str, value: Value) -> Option<Value> {
        let mut module = self
            .modules
            .entry(Arc::from(source))
            .or_insert_with(|| Value::Object(Default::default()));
        if !module.is_object() {
            *module = Value::Object(Default::default());
        }
        module
            .as_object_mut()
            .and_then(|members| members.insert(item.to_string(), value))
    }

    fn remove_item(&self, source: &str, item: &str) {
        if let Some(mut module) = self.modules.get_mut(source) {
            if let Some(members) = module.as_object_mut() {
                members.remove(item);
            }
        }
    }

    /// Replace a member until the returned guard drops
    ///
    /// Bindings already resolved keep the value they saw; only pending
    /// bindings observe the patch.
    pub fn patch(&self, source: &str, item: &str, value: Value) -> PatchGuard {
        let previous = self.set_item(source, item, value);
        PatchGuard {
            loader: self.clone(),
            source: source.to_string(),
            item: item.to_string(),
            previous,
            restored: false,
        }
    }

    /// Loader invocations for `(source, item)`; the whole module is `*module*`
    pub fn calls(&self, source: &str, item: &str) -> usize {
        self.calls
            .get(&(Arc::from(source), item.to_string()))
            .map(|count| *count)
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    fn record_call(&self, spec: &ImportSpec) {
        let item = match &spec.item {
            Item::Module => crate::import_spec::MODULE_ITEM.to_string(),
            Item::Wildcard => crate::import_spec::WILDCARD_ITEM.to_string(),
            Item::Name(name) => name.to_string(),
        };
        *self
            .calls
            .entry((Arc::clone(&spec.source), item))
            .or_insert(0) += 1;
    }
}

impl Loader for StaticLoader {
    fn name(&self) -> &str {
        "static"
    }

    fn resolve(&self, _cx: &ExecutionContext, spec: &ImportSpec) -> Result<Value, LoadError> {
        self.record_call(spec);
        trace!(%spec, "static loader resolve");

        // Clone out so no shard lock outlives this call
        let module = self
            .modules
            .get(spec.source.as_ref())
            .map(|module| module.value().clone())
            .ok_or_else(|| LoadError::ModuleNotFound {
                module: spec.source.to_string(),
            })?;

        match &spec.item {
            Item::Module | Item::Wildcard => Ok(module),
            Item::Name(name) => module
                .get(name.as_ref())
                .cloned()
                .ok_or_else(|| LoadError::ItemNotFound {
                    module: spec.source.to_string(),
                    item: name.to_string(),
                }),
        }
    }
}

/// Restores a patched member on drop
#[derive(Debug)]
pub struct PatchGuard {
    loader: StaticLoader,
    source: String,
    item: String,
    previous: Option<Value>,
    restored: bool,
}

impl PatchGuard {
    /// Restore now instead of at drop
    pub fn restore(mut self) {
        self.restore_inner();
    }

    fn restore_inner(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        match self.previous.take() {
            Some(previous) => {
                self.loader.set_item(&self.source, &self.item, previous);
            }
            None => self.loader.remove_item(&self.source, &self.item),
        }
    }
}

impl Drop for PatchGuard {
    fn drop(&mut self) {
        self.restore_inner();
    }
}
