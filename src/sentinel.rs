//! Sentinel bindings - placeholders installed in place of a value
//!
//! A [`SentinelBinding`] carries everything needed to resolve itself on
//! demand: the import spec, the declaration site, the guard that created
//! it, the call distance required before it may resolve, and an optional
//! fallback for type-only declarations.
//!
//! State machine (mutated only by [`crate::resolve`]):
//!
//! ```text
//! Pending ──→ Resolving ──→ Resolved(value)
//!                  └──────→ Failed(record)
//! ```
//!
//! `Resolved` and `Failed` are terminal.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use parking_lot::{Condvar, Mutex};

use crate::error::ErrorRecord;
use crate::guard::GuardId;
use crate::import_spec::{DeclarationSite, ImportSpec, Item};
use crate::scope::Scope;
use crate::tracker::CallMark;
use crate::value::Value;

/// Resolution state of a sentinel binding
#[derive(Debug, Clone, PartialEq)]
pub enum BindingState {
    Pending,
    /// Loader call in flight on `owner`
    Resolving { owner: ThreadId },
    Resolved(Value),
    Failed(ErrorRecord),
}

impl BindingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BindingState::Resolved(_) | BindingState::Failed(_))
    }

    /// Short label for logs and events
    pub fn label(&self) -> &'static str {
        match self {
            BindingState::Pending => "pending",
            BindingState::Resolving { .. } => "resolving",
            BindingState::Resolved(_) => "resolved",
            BindingState::Failed(_) => "failed",
        }
    }
}

/// Placeholder stored under a name until first legal lookup
pub struct SentinelBinding {
    name: Arc<str>,
    spec: ImportSpec,
    site: DeclarationSite,
    fallback: Option<Value>,
    origin_guard: GuardId,
    min_call_boundary: u32,
    declared_at: CallMark,
    scope: Weak<Scope>,
    /// Every name in the owning scope that was bound to this sentinel
    refs: Mutex<Vec<Arc<str>>>,
    pub(crate) state: Mutex<BindingState>,
    pub(crate) settled: Condvar,
    /// Set when the loader's own execution looked this binding up
    pub(crate) reentered: AtomicBool,
}

/// Construction parameters for [`SentinelBinding`]
#[derive(Debug, Clone)]
pub struct SentinelParts {
    pub name: Arc<str>,
    pub spec: ImportSpec,
    pub site: DeclarationSite,
    pub fallback: Option<Value>,
    pub origin_guard: GuardId,
    pub min_call_boundary: u32,
    pub declared_at: CallMark,
}

impl SentinelBinding {
    pub fn new(parts: SentinelParts, scope: &Arc<Scope>) -> Arc<Self> {
        Arc::new(Self {
            refs: Mutex::new(vec![Arc::clone(&parts.name)]),
            name: parts.name,
            spec: parts.spec,
            site: parts.site,
            fallback: parts.fallback,
            origin_guard: parts.origin_guard,
            min_call_boundary: parts.min_call_boundary,
            declared_at: parts.declared_at,
            scope: Arc::downgrade(scope),
            state: Mutex::new(BindingState::Pending),
            settled: Condvar::new(),
            reentered: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn spec(&self) -> &ImportSpec {
        &self.spec
    }

    pub fn site(&self) -> &DeclarationSite {
        &self.site
    }

    pub fn fallback(&self) -> Option<&Value> {
        self.fallback.as_ref()
    }

    pub fn origin_guard(&self) -> GuardId {
        self.origin_guard
    }

    pub fn min_call_boundary(&self) -> u32 {
        self.min_call_boundary
    }

    pub fn declared_at(&self) -> CallMark {
        self.declared_at
    }

    /// Owning scope, if it is still alive
    pub fn owning_scope(&self) -> Option<Arc<Scope>> {
        self.scope.upgrade()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> BindingState {
        self.state.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), BindingState::Pending)
    }

    /// Names bound to this sentinel in the owning scope
    pub fn refs(&self) -> Vec<Arc<str>> {
        self.refs.lock().clone()
    }

    pub(crate) fn add_ref(&self, name: Arc<str>) {
        let mut refs = self.refs.lock();
        if !refs.iter().any(|r| *r == name) {
            refs.push(name);
        }
    }
}

impl fmt::Display for SentinelBinding {
    /// `<import pkg (file:line)>` / `<from pkg import X (file:line)>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.spec.item {
            Item::Module => write!(f, "<import {} ({})>", self.spec.source, self.site),
            Item::Name(item) => write!(
                f,
                "<from {} import {} ({})>",
                self.spec.source, item, self.site
            ),
            Item::Wildcard => write!(f, "<from {} import * ({})>", self.spec.source, self.site),
        }
    }
}

impl fmt::Debug for SentinelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentinelBinding")
            .field("name", &self.name)
            .field("spec", &self.spec.to_string())
            .field("site", &self.site.to_string())
            .field("state", &self.state.lock().label())
            .field("origin_guard", &self.origin_guard)
            .field("min_call_boundary", &self.min_call_boundary)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn parts(name: &str, spec: ImportSpec) -> SentinelParts {
        SentinelParts {
            name: Arc::from(name),
            spec,
            site: DeclarationSite::new("tests/app.rs", 3, 1),
            fallback: None,
            origin_guard: GuardId(1),
            min_call_boundary: 1,
            declared_at: CallMark(7),
        }
    }

    #[test]
    fn new_sentinel_is_pending() {
        let scope = Scope::global("app");
        let binding = SentinelBinding::new(parts("X", ImportSpec::item("pkg", "X")), &scope);
        assert!(binding.is_pending());
        assert_eq!(binding.state().label(), "pending");
        assert!(!binding.state().is_terminal());
        assert_eq!(binding.min_call_boundary(), 1);
        assert_eq!(binding.declared_at(), CallMark(7));
    }

    #[test]
    fn display_simulates_import_statement() {
        let scope = Scope::global("app");
        let module = SentinelBinding::new(parts("pkg", ImportSpec::module("pkg")), &scope);
        assert_eq!(module.to_string(), "<import pkg (tests/app.rs:3)>");

        let attr = SentinelBinding::new(parts("attr", ImportSpec::item("module", "attr")), &scope);
        assert_eq!(attr.to_string(), "<from module import attr (tests/app.rs:3)>");
    }

    #[test]
    fn refs_are_deduplicated() {
        let scope = Scope::global("app");
        let binding = SentinelBinding::new(parts("X", ImportSpec::item("pkg", "X")), &scope);
        binding.add_ref(Arc::from("alias"));
        binding.add_ref(Arc::from("X"));
        binding.add_ref(Arc::from("alias"));
        assert_eq!(binding.refs().len(), 2);
    }

    #[test]
    fn owning_scope_is_weak() {
        let scope = Scope::global("app");
        let binding = SentinelBinding::new(parts("X", ImportSpec::item("pkg", "X")), &scope);
        assert!(binding.owning_scope().is_some());
        drop(scope);
        assert!(binding.owning_scope().is_none());
    }
}
