//! Guard controller - scoped windows that capture declarations
//!
//! Opening a guard pushes it onto the execution context's guard stack and
//! returns a [`GuardHandle`]; dropping or closing the handle pops it, on
//! every exit path. Only the innermost guard receives declarations.
//!
//! Capability policy at open time:
//!
//! | introspection | prevent_eager | result |
//! |---|---|---|
//! | available | any | [`GuardMode::Capture`] |
//! | unavailable | `true` | `BindError::Capability` |
//! | unavailable | `false` | [`GuardMode::Eager`] |
//!
//! An engine configured as disabled opens every guard in eager mode.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::error::BindError;
use crate::event_log::EventKind;
use crate::value::{unknown_type, Value};

/// Identifier of a guard window (unique per engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuardId(pub u64);

impl fmt::Display for GuardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Options for a guard window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardOptions {
    /// Fail at open time instead of silently binding eagerly
    pub prevent_eager: bool,
    /// Loader failures degrade to `fallback` instead of propagating
    pub type_only: bool,
    /// Used only when `type_only`; defaults to the unknown-type marker
    pub fallback: Option<Value>,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            prevent_eager: true,
            type_only: false,
            fallback: None,
        }
    }
}

impl GuardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recommended for libraries: degrade to eager binding on hosts
    /// without call-boundary introspection
    pub fn allow_eager() -> Self {
        Self {
            prevent_eager: false,
            ..Self::default()
        }
    }

    /// Type-only window with an optional fallback value
    pub fn type_only(fallback: Option<Value>) -> Self {
        Self {
            prevent_eager: true,
            type_only: true,
            fallback,
        }
    }

    pub fn with_prevent_eager(mut self, prevent_eager: bool) -> Self {
        self.prevent_eager = prevent_eager;
        self
    }
}

/// How declarations inside a guard are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardMode {
    /// Declarations become sentinel bindings
    Capture,
    /// Declarations resolve immediately
    Eager,
}

impl GuardMode {
    pub fn label(self) -> &'static str {
        match self {
            GuardMode::Capture => "capture",
            GuardMode::Eager => "eager",
        }
    }
}

/// An open guard on the stack
#[derive(Debug, Clone)]
pub struct ActiveGuard {
    pub id: GuardId,
    pub mode: GuardMode,
    pub options: GuardOptions,
    /// 1 for the outermost guard
    pub depth: u32,
}

impl ActiveGuard {
    /// Fallback installed when a type-only resolution fails
    pub fn effective_fallback(&self, engine_default: Option<&Value>) -> Option<Value> {
        if !self.options.type_only {
            return None;
        }
        Some(
            self.options
                .fallback
                .clone()
                .or_else(|| engine_default.cloned())
                .unwrap_or_else(unknown_type),
        )
    }
}

/// Guard stack of one execution context
#[derive(Debug, Default)]
pub struct GuardStack {
    guards: RefCell<Vec<ActiveGuard>>,
}

impl GuardStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push and return the new nesting depth
    fn push(&self, id: GuardId, mode: GuardMode, options: GuardOptions) -> u32 {
        let mut guards = self.guards.borrow_mut();
        let depth = u32::try_from(guards.len() + 1).unwrap_or(u32::MAX);
        guards.push(ActiveGuard {
            id,
            mode,
            options,
            depth,
        });
        depth
    }

    /// Remove `id`; out-of-order removal still removes but reports it
    fn pop(&self, id: GuardId) -> Result<bool, BindError> {
        let mut guards = self.guards.borrow_mut();
        match guards.last() {
            Some(top) if top.id == id => {
                guards.pop();
                Ok(true)
            }
            Some(top) => {
                let expected = top.id;
                match guards.iter().position(|g| g.id == id) {
                    Some(pos) => {
                        guards.remove(pos);
                        Err(BindError::GuardOrder {
                            expected: expected.0,
                            found: id.0,
                        })
                    }
                    None => Ok(false),
                }
            }
            None => Ok(false),
        }
    }

    /// Innermost open guard
    pub fn innermost(&self) -> Option<ActiveGuard> {
        self.guards.borrow().last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.guards.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.borrow().is_empty()
    }
}

/// Scoped handle of an open guard; closes the guard when dropped
#[must_use = "the guard closes as soon as the handle is dropped"]
pub struct GuardHandle<'cx> {
    cx: &'cx ExecutionContext,
    id: GuardId,
    mode: GuardMode,
    closed: bool,
}

impl<'cx> GuardHandle<'cx> {
    pub fn id(&self) -> GuardId {
        self.id
    }

    pub fn mode(&self) -> GuardMode {
        self.mode
    }

    pub fn is_capturing(&self) -> bool {
        self.mode == GuardMode::Capture
    }

    /// Close explicitly, reporting interleaved closes
    pub fn close(mut self) -> Result<(), BindError> {
        self.closed = true;
        close(self.cx, self.id)
    }
}

impl Drop for GuardHandle<'_> {
    fn drop(&mut self) {
        if !self.closed {
            // Interleaving is already logged by close()
            let _ = close(self.cx, self.id);
        }
    }
}

impl fmt::Debug for GuardHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardHandle")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Open a guard window on `cx`
pub(crate) fn open<'cx>(
    cx: &'cx ExecutionContext,
    options: GuardOptions,
) -> Result<GuardHandle<'cx>, BindError> {
    let engine = cx.engine();
    let id = GuardId(engine.next_guard_id());

    let mode = if engine.config().disabled {
        if !engine.config().no_warn && !engine.disabled_warned.swap(true, Ordering::SeqCst) {
            warn!("deferred binding is disabled, guards bind eagerly");
        }
        GuardMode::Eager
    } else if engine.tracker().introspection_available() {
        GuardMode::Capture
    } else if options.prevent_eager {
        return Err(BindError::Capability { guard_id: id.0 });
    } else {
        warn!(guard = %id, "call-boundary introspection unavailable, binding eagerly");
        engine.events().emit(EventKind::EagerFallback { guard_id: id });
        GuardMode::Eager
    };

    let type_only = options.type_only;
    let depth = cx.guards().push(id, mode, options);
    info!(guard = %id, mode = mode.label(), depth, "guard opened");
    engine.events().emit(EventKind::GuardOpened {
        guard_id: id,
        mode,
        depth,
        type_only,
    });

    Ok(GuardHandle {
        cx,
        id,
        mode,
        closed: false,
    })
}

fn close(cx: &ExecutionContext, id: GuardId) -> Result<(), BindError> {
    let result = cx.guards().pop(id);
    match &result {
        Ok(true) => {}
        Ok(false) => return Ok(()),
        Err(err) => warn!(guard = %id, "{}", err),
    }
    info!(guard = %id, "guard closed");
    cx.engine()
        .events()
        .emit(EventKind::GuardClosed { guard_id: id });
    result.map(|_| ())
}
