//! Execution context - the public surface calling code works with
//!
//! One [`ExecutionContext`] per thread of execution. It owns that thread's
//! guard stack and call-frame stack and shares an [`Engine`] with every
//! other context.
//!
//! ```text
//! open_guard ─→ declare (captured as sentinel) ─→ close
//!                                     ↓
//!            call(|cx| lookup) ─→ boundary check ─→ resolve ─→ plain value
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::engine::Engine;
use crate::error::BindError;
use crate::event_log::EventKind;
use crate::guard::{self, GuardHandle, GuardMode, GuardOptions, GuardStack};
use crate::ident::validate_identifier;
use crate::import_spec::{DeclarationSite, ImportSpec, Item};
use crate::interner::intern;
use crate::scope::{Entry, Scope, ScopeRef};
use crate::sentinel::{SentinelBinding, SentinelParts};
use crate::tracker::{CallFrame, CallMark, Distance, FrameStack};
use crate::value::Value;

/// Per-thread guard and call-frame bookkeeping
#[derive(Debug)]
pub struct ExecutionContext {
    engine: Arc<Engine>,
    frames: FrameStack,
    guards: GuardStack,
}

impl ExecutionContext {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            frames: FrameStack::new(),
            guards: GuardStack::new(),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn guards(&self) -> &GuardStack {
        &self.guards
    }

    pub fn frames(&self) -> &FrameStack {
        &self.frames
    }

    // ═══════════════════════════════════════════
    // CALL BOUNDARIES
    // ═══════════════════════════════════════════

    /// Enter a nested call; the boundary ends when the frame drops
    pub fn enter_call(&self) -> CallFrame<'_> {
        self.frames.enter(self.engine.clock().tick())
    }

    /// Run `f` one call boundary deeper
    pub fn call<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _frame = self.enter_call();
        f(self)
    }

    /// Live boundary crossings since `binding` was installed
    pub fn distance_since_declaration(&self, binding: &SentinelBinding) -> Distance {
        self.engine
            .tracker()
            .distance_since_declaration(&self.frames, binding.declared_at())
    }

    // ═══════════════════════════════════════════
    // GUARDS
    // ═══════════════════════════════════════════

    pub fn open_guard(&self, options: GuardOptions) -> Result<GuardHandle<'_>, BindError> {
        guard::open(self, options)
    }

    /// Open a guard only when `condition` holds; otherwise bind eagerly
    pub fn open_guard_if(
        &self,
        condition: bool,
        options: GuardOptions,
    ) -> Result<Option<GuardHandle<'_>>, BindError> {
        if condition {
            self.open_guard(options).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Type-only window: failures degrade to `fallback`
    /// (the unknown-type marker when `None`)
    pub fn open_type_guard(&self, fallback: Option<Value>) -> Result<GuardHandle<'_>, BindError> {
        self.open_guard(GuardOptions::type_only(fallback))
    }

    // ═══════════════════════════════════════════
    // DECLARATIONS
    // ═══════════════════════════════════════════

    /// Bind `name` to `spec` in `scope`
    ///
    /// Inside a capturing guard this installs a sentinel; otherwise the
    /// loader runs immediately and a plain value is bound. The caller's
    /// source location is recorded as the declaration site.
    #[track_caller]
    pub fn declare(&self, scope: &ScopeRef, name: &str, spec: ImportSpec) -> Result<(), BindError> {
        self.declare_at(scope, name, spec, DeclarationSite::caller())
    }

    /// [`declare`](Self::declare) with an explicit declaration site
    pub fn declare_at(
        &self,
        scope: &ScopeRef,
        name: &str,
        spec: ImportSpec,
        site: DeclarationSite,
    ) -> Result<(), BindError> {
        validate_identifier(name)?;
        spec.validate()?;

        let guard = self.guards.innermost();
        let fallback = guard
            .as_ref()
            .and_then(|g| g.effective_fallback(self.engine.config().default_fallback.as_ref()));

        let guard = match guard {
            Some(guard) if guard.mode == GuardMode::Capture => guard,
            _ => return self.bind_eagerly(scope, name, &spec, &site, fallback),
        };

        if spec.is_wildcard() {
            return Err(BindError::WildcardUnsupported {
                spec: spec.to_string(),
            });
        }

        let name = intern(name);
        let parts = SentinelParts {
            name: Arc::clone(&name),
            spec,
            site,
            fallback,
            origin_guard: guard.id,
            min_call_boundary: guard.depth,
            declared_at: CallMark(self.engine.clock().tick()),
        };
        let sentinel = SentinelBinding::new(parts, scope);

        debug!(%name, binding = %sentinel, guard = %guard.id, "deferred binding declared");
        self.engine.events().emit(EventKind::BindingDeclared {
            name: Arc::clone(&name),
            spec: sentinel.spec().to_string(),
            guard_id: guard.id,
            min_call_boundary: sentinel.min_call_boundary(),
            site: sentinel.site().to_string(),
        });
        scope.install(name, sentinel);
        Ok(())
    }

    /// Bind `name` to whatever `target` holds in the same scope
    ///
    /// A sentinel is shared, so resolving it through either name rebinds both.
    pub fn alias(&self, scope: &Scope, name: &str, target: &str) -> Result<(), BindError> {
        validate_identifier(name)?;
        match scope.entry(target) {
            Some(Entry::Deferred(sentinel)) => {
                let name = intern(name);
                sentinel.add_ref(Arc::clone(&name));
                self.engine.events().emit(EventKind::BindingAliased {
                    name: Arc::clone(&name),
                    target: intern(target),
                });
                scope.install(name, sentinel);
                Ok(())
            }
            Some(Entry::Value(value)) => {
                scope.set(name, value);
                Ok(())
            }
            None => Err(BindError::Undefined {
                name: target.to_string(),
            }),
        }
    }

    /// Ordinary name lookup through the interception layer
    pub fn lookup(&self, scope: &Scope, name: &str) -> Result<Value, BindError> {
        scope.lookup(self, name)
    }

    fn bind_eagerly(
        &self,
        scope: &Scope,
        name: &str,
        spec: &ImportSpec,
        site: &DeclarationSite,
        fallback: Option<Value>,
    ) -> Result<(), BindError> {
        let value = match self.engine.loader().resolve(self, spec) {
            Ok(value) => value,
            Err(err) => {
                let error = BindError::Loader {
                    name: name.to_string(),
                    spec: spec.to_string(),
                    reason: err.to_string(),
                    site: site.clone(),
                };
                match fallback {
                    // Wildcards have no single name to degrade
                    Some(fallback) if !spec.is_wildcard() => fallback,
                    _ => return Err(error),
                }
            }
        };

        if let Item::Wildcard = spec.item {
            return self.bind_members(scope, spec, site, value);
        }

        self.engine.events().emit(EventKind::EagerBound {
            name: intern(name),
            spec: spec.to_string(),
        });
        scope.set(name, value);
        Ok(())
    }

    /// `from source import *`: bind every identifier-named member
    fn bind_members(
        &self,
        scope: &Scope,
        spec: &ImportSpec,
        site: &DeclarationSite,
        module: Value,
    ) -> Result<(), BindError> {
        let Value::Object(members) = module else {
            return Err(BindError::Loader {
                name: crate::import_spec::WILDCARD_ITEM.to_string(),
                spec: spec.to_string(),
                reason: format!("Module '{}' has no members to import", spec.source),
                site: site.clone(),
            });
        };

        for (member, value) in members {
            if validate_identifier(&member).is_err() {
                continue;
            }
            self.engine.events().emit(EventKind::EagerBound {
                name: intern(&member),
                spec: spec.to_string(),
            });
            scope.set(&member, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticLoader;
    use crate::sentinel::BindingState;
    use crate::tracker::NoIntrospection;
    use serde_json::json;

    fn setup() -> (ExecutionContext, StaticLoader, ScopeRef) {
        let loader = StaticLoader::new();
        loader.insert_module("pkg", json!({"X": "V", "Y": 2}));
        let engine = Engine::builder().loader(loader.clone()).build();
        (ExecutionContext::new(engine), loader, Scope::global("app"))
    }

    // ═══════════════════════════════════════════════════════════════
    // Declarations
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn declare_inside_guard_installs_sentinel() {
        let (cx, loader, scope) = setup();
        {
            let _guard = cx.open_guard(GuardOptions::default()).unwrap();
            cx.declare(&scope, "X", ImportSpec::item("pkg", "X")).unwrap();
        }
        assert!(scope.is_deferred("X"));
        assert_eq!(loader.total_calls(), 0);

        let sentinel = scope.sentinel("X").unwrap();
        assert!(sentinel.site().file.ends_with("context.rs"));
        assert_eq!(sentinel.min_call_boundary(), 1);
    }

    #[test]
    fn declare_outside_guard_is_eager() {
        let (cx, loader, scope) = setup();
        cx.declare(&scope, "X", ImportSpec::item("pkg", "X")).unwrap();
        assert_eq!(scope.get_plain("X"), Some(json!("V")));
        assert_eq!(loader.total_calls(), 1);
    }

    #[test]
    fn eager_declare_failure_names_site() {
        let (cx, _, scope) = setup();
        let err = cx
            .declare(&scope, "Z", ImportSpec::item("pkg", "Z"))
            .unwrap_err();
        match err {
            BindError::Loader { reason, site, .. } => {
                assert_eq!(reason, "Cannot import name 'Z' from 'pkg'");
                assert!(site.file.ends_with("context.rs"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn declare_validates_names() {
        let (cx, _, scope) = setup();
        assert!(matches!(
            cx.declare(&scope, "not-a-name", ImportSpec::module("pkg")),
            Err(BindError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            cx.declare(&scope, "x", ImportSpec::module("pkg..sub")),
            Err(BindError::InvalidModulePath { .. })
        ));
    }

    #[test]
    fn nested_guard_raises_min_call_boundary() {
        let (cx, _, scope) = setup();
        let _outer = cx.open_guard(GuardOptions::default()).unwrap();
        let _inner = cx.open_guard(GuardOptions::default()).unwrap();
        cx.declare(&scope, "X", ImportSpec::item("pkg", "X")).unwrap();
        assert_eq!(scope.sentinel("X").unwrap().min_call_boundary(), 2);
    }

    #[test]
    fn wildcard_rejected_inside_guard() {
        let (cx, _, scope) = setup();
        let _guard = cx.open_guard(GuardOptions::default()).unwrap();
        let err = cx
            .declare(&scope, "star", ImportSpec::wildcard("whatever"))
            .unwrap_err();
        assert_eq!(
            err,
            BindError::WildcardUnsupported {
                spec: "from whatever import *".into()
            }
        );
    }

    #[test]
    fn wildcard_outside_guard_binds_members() {
        let (cx, _, scope) = setup();
        cx.declare(&scope, "star", ImportSpec::wildcard("pkg")).unwrap();
        assert_eq!(scope.get_plain("X"), Some(json!("V")));
        assert_eq!(scope.get_plain("Y"), Some(json!(2)));
        assert!(!scope.contains("star"));
    }

    #[test]
    fn eager_guard_binds_immediately() {
        let loader = StaticLoader::new();
        loader.insert_module("pkg", json!({"X": 1}));
        let engine = Engine::builder()
            .loader(loader.clone())
            .tracker(NoIntrospection)
            .build();
        let cx = ExecutionContext::new(engine);
        let scope = Scope::global("lib");

        let guard = cx.open_guard(GuardOptions::allow_eager()).unwrap();
        cx.declare(&scope, "X", ImportSpec::item("pkg", "X")).unwrap();
        guard.close().unwrap();

        assert_eq!(scope.get_plain("X"), Some(json!(1)));
        assert_eq!(loader.calls("pkg", "X"), 1);
    }

    #[test]
    fn open_guard_if_false_never_fails() {
        let engine = Engine::builder().tracker(NoIntrospection).build();
        let cx = ExecutionContext::new(engine);
        assert!(cx
            .open_guard_if(false, GuardOptions::default())
            .unwrap()
            .is_none());
        assert!(cx.open_guard_if(true, GuardOptions::default()).is_err());
        assert!(cx
            .open_guard_if(true, GuardOptions::allow_eager())
            .unwrap()
            .is_some());
    }

    // ═══════════════════════════════════════════════════════════════
    // Aliases and lookups
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn alias_shares_sentinel_and_rebinds_both() {
        let (cx, loader, scope) = setup();
        {
            let _guard = cx.open_guard(GuardOptions::default()).unwrap();
            cx.declare(&scope, "X", ImportSpec::item("pkg", "X")).unwrap();
            cx.alias(&scope, "other", "X").unwrap();
        }
        let value = cx.call(|cx| cx.lookup(&scope, "other")).unwrap();
        assert_eq!(value, json!("V"));
        assert_eq!(scope.get_plain("X"), Some(json!("V")));
        assert_eq!(scope.get_plain("other"), Some(json!("V")));
        assert_eq!(loader.total_calls(), 1);
    }

    #[test]
    fn alias_of_plain_value_copies() {
        let (cx, _, scope) = setup();
        scope.set("a", json!(3));
        cx.alias(&scope, "b", "a").unwrap();
        assert_eq!(scope.get_plain("b"), Some(json!(3)));
        assert!(cx.alias(&scope, "c", "missing").is_err());
    }

    #[test]
    fn lookup_same_unit_is_not_yet_visible() {
        let (cx, loader, scope) = setup();
        {
            let _guard = cx.open_guard(GuardOptions::default()).unwrap();
            cx.declare(&scope, "X", ImportSpec::item("pkg", "X")).unwrap();
        }
        let err = cx.lookup(&scope, "X").unwrap_err();
        assert!(matches!(err, BindError::NotYetVisible { distance: 0, required: 1, .. }));
        assert!(err.is_name_error());
        assert_eq!(loader.total_calls(), 0);
        assert_eq!(scope.sentinel("X").unwrap().state(), BindingState::Pending);
    }

    #[test]
    fn call_made_before_declaration_does_not_count() {
        let (cx, _, scope) = setup();
        let _outer = cx.enter_call();
        {
            let _guard = cx.open_guard(GuardOptions::default()).unwrap();
            cx.declare(&scope, "X", ImportSpec::item("pkg", "X")).unwrap();
        }
        assert!(cx.lookup(&scope, "X").is_err());
        assert_eq!(cx.call(|cx| cx.lookup(&scope, "X")).unwrap(), json!("V"));
    }
}
