//! String interning for binding and scope names
//!
//! The same handful of names is declared, looked up and logged over and
//! over; interning keeps one `Arc<str>` per distinct name so scope keys,
//! sentinel refs and events share a single allocation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Global name interner (thread-safe)
///
/// Entries are never evicted, so the map grows with every distinct name
/// for the life of the process. Only identifiers and scope names go in.
static INTERNER: Lazy<Interner> = Lazy::new(Interner::new);

/// Thread-safe string interner using DashMap
pub struct Interner {
    strings: DashMap<Arc<str>, ()>,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            strings: DashMap::new(),
        }
    }

    /// Intern a string, returning the shared Arc<str>
    pub fn intern(&self, s: &str) -> Arc<str> {
        // Fast path: no allocation when already interned
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing.key());
        }

        // Entry API so two racing threads agree on one Arc
        match self.strings.entry(Arc::from(s)) {
            Entry::Occupied(e) => Arc::clone(e.key()),
            Entry::Vacant(v) => {
                let key = Arc::clone(v.key());
                v.insert(());
                key
            }
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

/// Intern a name using the global interner
#[inline]
pub fn intern(s: &str) -> Arc<str> {
    INTERNER.intern(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_arc_for_same_string() {
        let interner = Interner::new();

        let a1 = interner.intern("attr");
        let a2 = interner.intern("attr");

        assert!(Arc::ptr_eq(&a1, &a2));
    }

    #[test]
    fn intern_different_strings_different_arcs() {
        let interner = Interner::new();

        let a = interner.intern("member1");
        let b = interner.intern("member2");

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn global_intern_works() {
        let a1 = intern("global_name");
        let a2 = intern("global_name");

        assert!(Arc::ptr_eq(&a1, &a2));
    }

    #[test]
    fn concurrent_same_string_returns_same_arc() {
        use std::sync::mpsc;
        use std::thread;

        let interner = Arc::new(Interner::new());
        let (tx, rx) = mpsc::channel();

        for _ in 0..10 {
            let interner = Arc::clone(&interner);
            let tx = tx.clone();
            thread::spawn(move || {
                tx.send(interner.intern("shared_name")).unwrap();
            });
        }

        drop(tx);

        let results: Vec<Arc<str>> = rx.iter().collect();
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert_eq!(interner.len(), 1);
    }
}
