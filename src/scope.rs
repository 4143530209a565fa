//! Scopes and the lookup interception layer
//!
//! A [`Scope`] is a concurrent name → [`Entry`] map with an optional
//! enclosing scope. Entries are a tagged union: a plain value or exactly
//! one [`SentinelBinding`]. Writing a plain value under a name destroys any
//! sentinel stored there (last declaration wins).
//!
//! Lookup walks local → enclosing → global. Plain entries cost one
//! discriminator check; sentinel entries go through the call-boundary check
//! and then the resolution engine.
//!
//! Entries are cloned out of the map before any resolution runs, so no
//! shard lock is held while a loader executes (loaders may look names up
//! in the same scope).

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Map;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::BindError;
use crate::event_log::EventKind;
use crate::interner::intern;
use crate::resolve;
use crate::sentinel::SentinelBinding;
use crate::tracker::Distance;
use crate::value::Value;

/// Shared handle to a scope
pub type ScopeRef = Arc<Scope>;

/// What a name maps to inside one scope
#[derive(Debug, Clone)]
pub enum Entry {
    Value(Value),
    Deferred(Arc<SentinelBinding>),
}

impl Entry {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Entry::Deferred(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Deferred(_) => None,
        }
    }

    pub fn as_sentinel(&self) -> Option<&Arc<SentinelBinding>> {
        match self {
            Entry::Deferred(s) => Some(s),
            Entry::Value(_) => None,
        }
    }
}

/// A lexical scope: name → entry, plus the enclosing scope
#[derive(Debug)]
pub struct Scope {
    name: Arc<str>,
    parent: Option<ScopeRef>,
    entries: DashMap<Arc<str>, Entry>,
}

impl Scope {
    /// Outermost scope of a unit
    pub fn global(name: &str) -> ScopeRef {
        Arc::new(Self {
            name: intern(name),
            parent: None,
            entries: DashMap::new(),
        })
    }

    /// Scope nested inside `parent`
    pub fn child(parent: &ScopeRef, name: &str) -> ScopeRef {
        Arc::new(Self {
            name: intern(name),
            parent: Some(Arc::clone(parent)),
            entries: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    /// Ordinary assignment; replaces any sentinel under `name`
    pub fn set(&self, name: &str, value: Value) {
        self.entries.insert(intern(name), Entry::Value(value));
    }

    /// Raw entry in this scope only, no interception
    pub fn entry(&self, name: &str) -> Option<Entry> {
        self.entries.get(name).map(|e| e.value().clone())
    }

    /// Plain value in this scope only; `None` for sentinels
    pub fn get_plain(&self, name: &str) -> Option<Value> {
        self.entries
            .get(name)
            .and_then(|e| e.value().as_value().cloned())
    }

    /// Sentinel in this scope only
    pub fn sentinel(&self, name: &str) -> Option<Arc<SentinelBinding>> {
        self.entries
            .get(name)
            .and_then(|e| e.value().as_sentinel().cloned())
    }

    pub fn remove(&self, name: &str) -> Option<Entry> {
        self.entries.remove(name).map(|(_, entry)| entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_deferred(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|e| e.value().is_deferred())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All names in this scope, sorted
    pub fn names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<_> = self.entries.iter().map(|e| Arc::clone(e.key())).collect();
        names.sort();
        names
    }

    /// Names currently holding a sentinel, sorted
    pub fn deferred_names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.value().is_deferred())
            .map(|e| Arc::clone(e.key()))
            .collect();
        names.sort();
        names
    }

    /// Snapshot as a JSON object; sentinels render as their import statement
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for name in self.names() {
            if let Some(entry) = self.entry(&name) {
                let value = match entry {
                    Entry::Value(v) => v,
                    Entry::Deferred(s) => Value::String(s.to_string()),
                };
                map.insert(name.to_string(), value);
            }
        }
        Value::Object(map)
    }

    /// Install a sentinel under `name`, replacing whatever was there
    pub(crate) fn install(&self, name: Arc<str>, sentinel: Arc<SentinelBinding>) {
        self.entries.insert(name, Entry::Deferred(sentinel));
    }

    /// Replace every reference to `binding` with `value`
    ///
    /// Names rebound since the declaration are left alone. Returns how many
    /// names were rewritten.
    pub(crate) fn rebind_resolved(&self, binding: &Arc<SentinelBinding>, value: &Value) -> usize {
        let mut rebound = 0;
        for name in binding.refs() {
            if let Some(mut entry) = self.entries.get_mut(&name) {
                let same = matches!(entry.value(), Entry::Deferred(s) if Arc::ptr_eq(s, binding));
                if same {
                    *entry.value_mut() = Entry::Value(value.clone());
                    rebound += 1;
                }
            }
        }
        rebound
    }

    /// Intercepted lookup: local → enclosing → global
    pub fn lookup(&self, cx: &ExecutionContext, name: &str) -> Result<Value, BindError> {
        let mut current = Some(self);
        while let Some(scope) = current {
            match scope.entry(name) {
                Some(Entry::Value(value)) => return Ok(value),
                Some(Entry::Deferred(binding)) => return intercept(cx, name, &binding),
                None => current = scope.parent.as_deref(),
            }
        }
        Err(BindError::Undefined {
            name: name.to_string(),
        })
    }
}

/// Lookup hit a sentinel: enforce the call boundary, then resolve
fn intercept(
    cx: &ExecutionContext,
    name: &str,
    binding: &Arc<SentinelBinding>,
) -> Result<Value, BindError> {
    // Terminal sentinels replay their memoized outcome
    if !binding.is_pending() {
        return resolve::resolve(cx, binding);
    }

    match cx.distance_since_declaration(binding) {
        Distance::Crossings(distance) if distance < binding.min_call_boundary() => {
            cx.engine().events().emit(EventKind::LookupDeferred {
                name: intern(name),
                distance,
                required: binding.min_call_boundary(),
            });
            Err(BindError::NotYetVisible {
                name: name.to_string(),
                distance,
                required: binding.min_call_boundary(),
                site: binding.site().clone(),
            })
        }
        Distance::Crossings(_) => resolve::resolve(cx, binding),
        Distance::Unavailable => {
            debug!(name, "call distance unavailable, resolving without boundary check");
            resolve::resolve(cx, binding)
        }
    }
}
