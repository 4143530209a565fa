//! Engine - state shared by every execution context
//!
//! Holds the loader, the call-boundary tracker, configuration, the audit
//! trail, the cross-thread wait graph and the serial counters. Build one
//! with [`Engine::builder`] and hand an `Arc<Engine>` to each
//! [`ExecutionContext`](crate::ExecutionContext).

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::event_log::EventLog;
use crate::loader::{Loader, StaticLoader};
use crate::resolve::WaitGraph;
use crate::tracker::{CallBoundaryTracker, SerialClock, StackIntrospection};

/// Shared deferred-binding engine
pub struct Engine {
    loader: Arc<dyn Loader>,
    tracker: Arc<dyn CallBoundaryTracker>,
    config: EngineConfig,
    events: EventLog,
    clock: SerialClock,
    waits: WaitGraph,
    next_guard: AtomicU64,
    pub(crate) disabled_warned: AtomicBool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn loader(&self) -> &dyn Loader {
        self.loader.as_ref()
    }

    pub fn tracker(&self) -> &dyn CallBoundaryTracker {
        self.tracker.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn clock(&self) -> &SerialClock {
        &self.clock
    }

    pub(crate) fn waits(&self) -> &WaitGraph {
        &self.waits
    }

    pub(crate) fn next_guard_id(&self) -> u64 {
        self.next_guard.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("loader", &self.loader.name())
            .field("introspection", &self.tracker.introspection_available())
            .field("config", &self.config)
            .field("events", &self.events)
            .finish()
    }
}

/// Builder for [`Engine`]
#[derive(Default)]
pub struct EngineBuilder {
    loader: Option<Arc<dyn Loader>>,
    tracker: Option<Arc<dyn CallBoundaryTracker>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn shared_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn tracker(mut self, tracker: impl CallBoundaryTracker + 'static) -> Self {
        self.tracker = Some(Arc::new(tracker));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults: empty [`StaticLoader`], [`StackIntrospection`]
    pub fn build(self) -> Arc<Engine> {
        Arc::new(Engine {
            loader: self
                .loader
                .unwrap_or_else(|| Arc::new(StaticLoader::new())),
            tracker: self
                .tracker
                .unwrap_or_else(|| Arc::new(StackIntrospection)),
            config: self.config,
            events: EventLog::new(),
            clock: SerialClock::new(),
            waits: WaitGraph::default(),
            next_guard: AtomicU64::new(0),
            disabled_warned: AtomicBool::new(false),
        })
    }
}
