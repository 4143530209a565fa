//! Audit trail of deferred-binding activity
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: guard, declaration and resolution events
//! - EventLog: thread-safe, append-only log shared by every context of an engine

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::guard::{GuardId, GuardMode};

/// Single event in the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since engine start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All event types
///
/// Uses Arc<str> for binding names so cloning is cheap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // GUARD LEVEL
    // ═══════════════════════════════════════════
    GuardOpened {
        guard_id: GuardId,
        mode: GuardMode,
        depth: u32,
        type_only: bool,
    },
    GuardClosed {
        guard_id: GuardId,
    },
    /// Introspection unavailable and the guard allowed eager binding
    EagerFallback {
        guard_id: GuardId,
    },

    // ═══════════════════════════════════════════
    // DECLARATION LEVEL
    // ═══════════════════════════════════════════
    BindingDeclared {
        name: Arc<str>,
        spec: String,
        guard_id: GuardId,
        min_call_boundary: u32,
        site: String,
    },
    BindingAliased {
        name: Arc<str>,
        target: Arc<str>,
    },
    /// Declaration resolved immediately (no capturing guard)
    EagerBound {
        name: Arc<str>,
        spec: String,
    },

    // ═══════════════════════════════════════════
    // RESOLUTION LEVEL
    // ═══════════════════════════════════════════
    /// Lookup happened before the call boundary was crossed
    LookupDeferred {
        name: Arc<str>,
        distance: u32,
        required: u32,
    },
    ResolutionStarted {
        name: Arc<str>,
        spec: String,
    },
    BindingResolved {
        name: Arc<str>,
        spec: String,
        rebound: usize,
    },
    BindingFailed {
        name: Arc<str>,
        spec: String,
        error: String,
    },
    FallbackApplied {
        name: Arc<str>,
        spec: String,
        error: String,
    },
    ReentrancyDetected {
        name: Arc<str>,
        spec: String,
    },
}

impl EventKind {
    /// Extract the binding name if the event is binding-related
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::BindingDeclared { name, .. }
            | Self::BindingAliased { name, .. }
            | Self::EagerBound { name, .. }
            | Self::LookupDeferred { name, .. }
            | Self::ResolutionStarted { name, .. }
            | Self::BindingResolved { name, .. }
            | Self::BindingFailed { name, .. }
            | Self::FallbackApplied { name, .. }
            | Self::ReentrancyDetected { name, .. } => Some(name),
            Self::GuardOpened { .. } | Self::GuardClosed { .. } | Self::EagerFallback { .. } => {
                None
            }
        }
    }

    /// Check if this is a guard-level event
    pub fn is_guard_event(&self) -> bool {
        matches!(
            self,
            Self::GuardOpened { .. } | Self::GuardClosed { .. } | Self::EagerFallback { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by binding name
    pub fn filter_name(&self, name: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.name() == Some(name))
            .collect()
    }

    /// Filter guard-level events only
    pub fn guard_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_guard_event())
            .collect()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&EventKind) -> bool) -> usize {
        self.events.read().iter().filter(|e| predicate(&e.kind)).count()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}
