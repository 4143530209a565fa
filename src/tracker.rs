//! Call-boundary tracking
//!
//! A deferred binding may only resolve once control has crossed at least
//! `min_call_boundary` call boundaries since it was declared. The host
//! reports boundaries by entering [`CallFrame`]s on its [`FrameStack`];
//! a [`CallBoundaryTracker`] turns the live stack into a distance.
//!
//! Frames and declarations draw serials from one engine-wide clock, so
//! "entered after the declaration" is a plain serial comparison, also for
//! frames entered on other threads.
//!
//! Trackers are purely observational: they read the stack, never mutate it.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic serial source shared by frames and declarations
#[derive(Debug, Default)]
pub struct SerialClock {
    next: AtomicU64,
}

impl SerialClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next serial (starts at 1)
    pub fn tick(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Point in time a binding was installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallMark(pub u64);

/// Outcome of a distance query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Boundary crossings since the mark that are still live
    Crossings(u32),
    /// Host cannot introspect its call stack
    Unavailable,
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Crossings(n) => write!(f, "{}", n),
            Distance::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Live call frames of one execution context
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: RefCell<Vec<u64>>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a frame with the given serial; leaving happens on drop
    pub fn enter(&self, serial: u64) -> CallFrame<'_> {
        self.frames.borrow_mut().push(serial);
        CallFrame {
            stack: self,
            serial,
        }
    }

    /// Number of live frames
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Live frames entered strictly after `mark`
    pub fn frames_after(&self, mark: CallMark) -> u32 {
        let count = self
            .frames
            .borrow()
            .iter()
            .filter(|&&serial| serial > mark.0)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn leave(&self, serial: u64) {
        let mut frames = self.frames.borrow_mut();
        if frames.last() == Some(&serial) {
            frames.pop();
        } else if let Some(pos) = frames.iter().rposition(|&s| s == serial) {
            frames.remove(pos);
        }
    }
}

/// A live call boundary; popped from its stack when dropped
#[must_use = "the call boundary ends as soon as the frame is dropped"]
#[derive(Debug)]
pub struct CallFrame<'a> {
    stack: &'a FrameStack,
    serial: u64,
}

impl CallFrame<'_> {
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl Drop for CallFrame<'_> {
    fn drop(&mut self) {
        self.stack.leave(self.serial);
    }
}

/// Capability interface for measuring call distance
pub trait CallBoundaryTracker: Send + Sync {
    /// Whether distances can be measured at all
    fn introspection_available(&self) -> bool;

    /// Boundary crossings on `stack` that happened strictly after `mark`
    fn distance_since_declaration(&self, stack: &FrameStack, mark: CallMark) -> Distance;
}

/// Tracker reading the host-maintained [`FrameStack`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StackIntrospection;

impl CallBoundaryTracker for StackIntrospection {
    fn introspection_available(&self) -> bool {
        true
    }

    fn distance_since_declaration(&self, stack: &FrameStack, mark: CallMark) -> Distance {
        Distance::Crossings(stack.frames_after(mark))
    }
}

/// Tracker for hosts without stack introspection
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntrospection;

impl CallBoundaryTracker for NoIntrospection {
    fn introspection_available(&self) -> bool {
        false
    }

    fn distance_since_declaration(&self, _stack: &FrameStack, _mark: CallMark) -> Distance {
        Distance::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = SerialClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert_eq!(a, 1);
        assert!(b > a);
    }

    #[test]
    fn frames_pop_on_drop() {
        let stack = FrameStack::new();
        {
            let _outer = stack.enter(1);
            {
                let _inner = stack.enter(2);
                assert_eq!(stack.depth(), 2);
            }
            assert_eq!(stack.depth(), 1);
        }
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn only_frames_after_mark_count() {
        let clock = SerialClock::new();
        let stack = FrameStack::new();

        let _before = stack.enter(clock.tick());
        let mark = CallMark(clock.tick());
        assert_eq!(stack.frames_after(mark), 0);

        let _first = stack.enter(clock.tick());
        assert_eq!(stack.frames_after(mark), 1);

        let _second = stack.enter(clock.tick());
        assert_eq!(stack.frames_after(mark), 2);
    }

    #[test]
    fn distance_drops_when_call_returns() {
        let clock = SerialClock::new();
        let stack = FrameStack::new();
        let mark = CallMark(clock.tick());
        {
            let _call = stack.enter(clock.tick());
            assert_eq!(
                StackIntrospection.distance_since_declaration(&stack, mark),
                Distance::Crossings(1)
            );
        }
        assert_eq!(
            StackIntrospection.distance_since_declaration(&stack, mark),
            Distance::Crossings(0)
        );
    }

    #[test]
    fn out_of_order_leave_removes_right_frame() {
        let stack = FrameStack::new();
        let a = stack.enter(1);
        let b = stack.enter(2);
        drop(a);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.frames_after(CallMark(1)), 1);
        drop(b);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn no_introspection_reports_unavailable() {
        let stack = FrameStack::new();
        let _call = stack.enter(5);
        assert!(!NoIntrospection.introspection_available());
        assert_eq!(
            NoIntrospection.distance_since_declaration(&stack, CallMark(1)),
            Distance::Unavailable
        );
    }
}
