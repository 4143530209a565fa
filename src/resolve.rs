//! Resolution engine - turns a sentinel into a value, at most once
//!
//! 1. Terminal state → replay it (value, recorded error, or fallback)
//! 2. `Resolving` on this thread → reentrant lookup, fail with `Reentrancy`
//! 3. `Resolving` on another thread → wait for it, then replay, unless the
//!    owner is itself (transitively) waiting on this thread: that cycle is
//!    reentrancy too
//! 4. Otherwise mark `Resolving`, call the loader without holding the lock
//! 5. Settle the terminal state, wake waiters, rewrite the owning scope
//!
//! A failed binding never retries. Type-only bindings degrade to their
//! fallback, which is also written into the scope.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::{BindError, ErrorRecord, FailureCause};
use crate::event_log::EventKind;
use crate::sentinel::{BindingState, SentinelBinding};
use crate::value::Value;

/// Which thread waits on which in-flight binding
///
/// Each entry is an edge `waiter → owner`. An edge is only added when it
/// does not close a cycle, so the graph stays acyclic and a chain walk
/// always ends.
#[derive(Default)]
pub(crate) struct WaitGraph {
    edges: Mutex<HashMap<ThreadId, WaitEdge>>,
}

struct WaitEdge {
    owner: ThreadId,
    binding: Arc<SentinelBinding>,
}

impl WaitGraph {
    /// Record that `waiter` blocks on `binding` owned by `owner`.
    /// Returns false when `owner` is already waiting, directly or through
    /// other threads, on `waiter`.
    fn enter(&self, waiter: ThreadId, owner: ThreadId, binding: &Arc<SentinelBinding>) -> bool {
        let mut edges = self.edges.lock();
        let mut current = owner;
        loop {
            if current == waiter {
                return false;
            }
            match edges.get(&current) {
                Some(edge) => current = edge.owner,
                None => break,
            }
        }
        edges.insert(
            waiter,
            WaitEdge {
                owner,
                binding: Arc::clone(binding),
            },
        );
        true
    }

    fn leave(&self, waiter: ThreadId) {
        self.edges.lock().remove(&waiter);
    }

    /// Drop every edge pointing at a binding that just settled
    fn release(&self, binding: &SentinelBinding) {
        self.edges
            .lock()
            .retain(|_, edge| !std::ptr::eq(Arc::as_ptr(&edge.binding), binding));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.edges.lock().len()
    }
}

/// Resolve `binding`, memoizing the outcome
///
/// Reentrancy is fatal: once the loader's execution has looked this binding
/// up again, the binding settles as `Failed(Reentrancy)` even if the loader
/// swallowed the inner error and returned a value.
pub fn resolve(cx: &ExecutionContext, binding: &Arc<SentinelBinding>) -> Result<Value, BindError> {
    let me = thread::current().id();
    let waits = cx.engine().waits();
    let mut state = binding.state.lock();
    loop {
        match &*state {
            BindingState::Resolved(value) => return Ok(value.clone()),
            BindingState::Failed(record) => return replay_failure(binding, record),
            BindingState::Resolving { owner } if *owner == me => {
                drop(state);
                return Err(reentered(cx, binding));
            }
            BindingState::Resolving { owner } => {
                if !waits.enter(me, *owner, binding) {
                    drop(state);
                    debug!(name = %binding.name(), "cross-thread resolution cycle");
                    return Err(reentered(cx, binding));
                }
                binding.settled.wait(&mut state);
                waits.leave(me);
            }
            BindingState::Pending => break,
        }
    }
    *state = BindingState::Resolving { owner: me };
    drop(state);

    let engine = cx.engine();
    debug!(name = %binding.name(), spec = %binding.spec(), "resolving deferred binding");
    engine.events().emit(EventKind::ResolutionStarted {
        name: Arc::clone(binding.name()),
        spec: binding.spec().to_string(),
    });

    let settle = Settle::new(binding, waits);
    let outcome = match engine.loader().resolve(cx, binding.spec()) {
        Ok(_) if binding.reentered.load(Ordering::SeqCst) => Err(FailureCause::Reentrancy),
        Ok(value) => match binding.owning_scope() {
            Some(scope) => Ok((scope, value)),
            None => Err(FailureCause::ScopeMutation {
                reason: "owning scope was dropped before resolution".into(),
            }),
        },
        Err(_) if binding.reentered.load(Ordering::SeqCst) => Err(FailureCause::Reentrancy),
        Err(err) => Err(FailureCause::Loader {
            reason: err.to_string(),
        }),
    };

    match outcome {
        Ok((scope, value)) => {
            settle.finish(BindingState::Resolved(value.clone()));
            let rebound = scope.rebind_resolved(binding, &value);
            engine.events().emit(EventKind::BindingResolved {
                name: Arc::clone(binding.name()),
                spec: binding.spec().to_string(),
                rebound,
            });
            Ok(value)
        }
        Err(cause) => {
            let record = ErrorRecord::new(binding.spec().clone(), cause, binding.site().clone());
            let error = record.to_error(binding.name());
            settle.finish(BindingState::Failed(record));

            match binding.fallback() {
                Some(fallback) => {
                    debug!(name = %binding.name(), %error, "type-only binding degraded to fallback");
                    if let Some(scope) = binding.owning_scope() {
                        scope.rebind_resolved(binding, fallback);
                    }
                    engine.events().emit(EventKind::FallbackApplied {
                        name: Arc::clone(binding.name()),
                        spec: binding.spec().to_string(),
                        error: error.to_string(),
                    });
                    Ok(fallback.clone())
                }
                None => {
                    engine.events().emit(EventKind::BindingFailed {
                        name: Arc::clone(binding.name()),
                        spec: binding.spec().to_string(),
                        error: error.to_string(),
                    });
                    Err(error)
                }
            }
        }
    }
}

/// Flag `binding` as looked up during its own resolution
fn reentered(cx: &ExecutionContext, binding: &SentinelBinding) -> BindError {
    binding.reentered.store(true, Ordering::SeqCst);
    cx.engine().events().emit(EventKind::ReentrancyDetected {
        name: Arc::clone(binding.name()),
        spec: binding.spec().to_string(),
    });
    BindError::Reentrancy {
        name: binding.name().to_string(),
        spec: binding.spec().to_string(),
        site: binding.site().clone(),
    }
}

fn replay_failure(binding: &SentinelBinding, record: &ErrorRecord) -> Result<Value, BindError> {
    match binding.fallback() {
        Some(fallback) => Ok(fallback.clone()),
        None => Err(record.to_error(binding.name())),
    }
}

/// Settles the binding exactly once; a panicking loader settles it as failed
struct Settle<'a> {
    binding: &'a SentinelBinding,
    waits: &'a WaitGraph,
    done: bool,
}

impl<'a> Settle<'a> {
    fn new(binding: &'a SentinelBinding, waits: &'a WaitGraph) -> Self {
        Self {
            binding,
            waits,
            done: false,
        }
    }

    fn finish(mut self, terminal: BindingState) {
        self.store(terminal);
        self.done = true;
    }

    fn store(&self, terminal: BindingState) {
        let mut state = self.binding.state.lock();
        *state = terminal;
        // Waiters only add edges while holding the state lock and seeing
        // `Resolving`, so none can point here after this release
        self.waits.release(self.binding);
        drop(state);
        self.binding.settled.notify_all();
    }
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        warn!(name = %self.binding.name(), "loader panicked, binding marked failed");
        self.store(BindingState::Failed(ErrorRecord::new(
            self.binding.spec().clone(),
            FailureCause::Loader {
                reason: "loader panicked".into(),
            },
            self.binding.site().clone(),
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::guard::GuardOptions;
    use crate::import_spec::ImportSpec;
    use crate::loader::{FnLoader, StaticLoader};
    use crate::scope::Scope;
    use serde_json::json;

    fn declared(cx: &ExecutionContext, scope: &Arc<Scope>, name: &str, spec: ImportSpec) -> Arc<SentinelBinding> {
        let guard = cx.open_guard(GuardOptions::default()).unwrap();
        cx.declare(scope, name, spec).unwrap();
        guard.close().unwrap();
        scope.sentinel(name).unwrap()
    }

    #[test]
    fn success_memoizes_and_rebinds() {
        let loader = StaticLoader::new();
        loader.insert_module("pkg", json!({"X": 42}));
        let cx = ExecutionContext::new(Engine::builder().loader(loader.clone()).build());
        let scope = Scope::global("app");
        let binding = declared(&cx, &scope, "X", ImportSpec::item("pkg", "X"));

        assert_eq!(resolve(&cx, &binding).unwrap(), json!(42));
        assert_eq!(resolve(&cx, &binding).unwrap(), json!(42));
        assert_eq!(loader.calls("pkg", "X"), 1);
        assert_eq!(binding.state(), BindingState::Resolved(json!(42)));
        assert_eq!(scope.get_plain("X"), Some(json!(42)));
    }

    #[test]
    fn failure_is_permanent_and_deterministic() {
        let loader = StaticLoader::new();
        let cx = ExecutionContext::new(Engine::builder().loader(loader.clone()).build());
        let scope = Scope::global("app");
        let binding = declared(&cx, &scope, "X", ImportSpec::item("missing", "X"));

        let first = resolve(&cx, &binding).unwrap_err();
        let second = resolve(&cx, &binding).unwrap_err();
        assert_eq!(first, second);
        assert!(matches!(first, BindError::Loader { .. }));
        assert_eq!(loader.calls("missing", "X"), 1);
        // Sentinel stays installed so later lookups repeat the failure
        assert!(scope.is_deferred("X"));
    }

    #[test]
    fn dropped_scope_fails_with_scope_mutation() {
        let loader = StaticLoader::new();
        loader.insert_module("pkg", json!({"X": 1}));
        let cx = ExecutionContext::new(Engine::builder().loader(loader).build());
        let scope = Scope::global("app");
        let binding = declared(&cx, &scope, "X", ImportSpec::item("pkg", "X"));
        drop(scope);

        let err = resolve(&cx, &binding).unwrap_err();
        assert!(matches!(err, BindError::ScopeMutation { .. }));
    }

    #[test]
    fn panicking_loader_settles_failed() {
        let loader = FnLoader::new(|_, _| -> Result<Value, crate::error::LoadError> {
            panic!("boom")
        });
        let cx = ExecutionContext::new(Engine::builder().loader(loader).build());
        let scope = Scope::global("app");
        let binding = declared(&cx, &scope, "X", ImportSpec::item("pkg", "X"));

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = resolve(&cx, &binding);
        }));
        assert!(unwound.is_err());
        let err = resolve(&cx, &binding).unwrap_err();
        assert!(matches!(err, BindError::Loader { ref reason, .. } if reason == "loader panicked"));
    }

    #[test]
    fn swallowed_reentrancy_still_fails() {
        let scope = Scope::global("app");
        let inner = Arc::clone(&scope);
        let loader = FnLoader::new(move |cx: &ExecutionContext, _: &ImportSpec| {
            assert!(cx.lookup(&inner, "X").is_err());
            Ok(json!("loaded anyway"))
        });
        let cx = ExecutionContext::new(Engine::builder().loader(loader).build());
        let binding = declared(&cx, &scope, "X", ImportSpec::item("pkg", "X"));

        let err = cx.call(|_| resolve(&cx, &binding)).unwrap_err();
        assert_eq!(err.code(), "LAZY-030");
        assert!(matches!(
            binding.state(),
            BindingState::Failed(ErrorRecord { cause: FailureCause::Reentrancy, .. })
        ));
        assert!(scope.is_deferred("X"));
    }

    #[test]
    fn wait_graph_refuses_cycles() {
        let cx = ExecutionContext::new(Engine::builder().build());
        let scope = Scope::global("app");
        let x = declared(&cx, &scope, "X", ImportSpec::item("pkg", "X"));
        let y = declared(&cx, &scope, "Y", ImportSpec::item("pkg", "Y"));
        let a = thread::current().id();
        let b = thread::spawn(|| thread::current().id()).join().unwrap();
        let c = thread::spawn(|| thread::current().id()).join().unwrap();

        let graph = WaitGraph::default();
        assert!(graph.enter(a, b, &y));
        assert!(graph.enter(b, c, &x));
        assert!(!graph.enter(c, a, &x));
        assert_eq!(graph.len(), 2);

        graph.release(&x);
        assert_eq!(graph.len(), 1);
        assert!(graph.enter(c, a, &x));
        graph.leave(a);
        graph.leave(c);
        assert_eq!(graph.len(), 0);
    }
}
