//! Ordered handler registry for one event signature.
//!
//! A [`HandlerStore`] owns every handler registered on it. Invocation order is
//! registration order. One-shot entries are unlinked as part of the pass that
//! invokes them, so they can never run twice and never disturb the position
//! of the entries that follow.
//!
//! The store is not synchronized; wrap it in a
//! [`ThreadedProvider`](crate::ThreadedProvider) for cross-thread use.

use herald_core::Handle;
use tracing::trace;

/// Boxed handler for argument type `A`.
///
/// Multi-parameter signatures use a tuple: `HandlerStore<(String, u32)>`.
pub type Handler<A> = Box<dyn FnMut(&A) + Send>;

/// One registration: the callable, its identity and whether it fires once.
pub(crate) struct HandlerEntry<A> {
    handle: Handle,
    once: bool,
    handler: Handler<A>,
}

impl<A> HandlerEntry<A> {
    pub(crate) fn persistent(handler: Handler<A>) -> Self {
        Self {
            handle: Handle::new(),
            once: false,
            handler,
        }
    }

    pub(crate) fn one_shot(handler: Handler<A>) -> Self {
        Self {
            handle: Handle::new(),
            once: true,
            handler,
        }
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }
}

pub struct HandlerStore<A> {
    entries: Vec<HandlerEntry<A>>,
}

impl<A> HandlerStore<A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a handler that fires on every trigger.
    pub fn register<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.insert(HandlerEntry::persistent(Box::new(handler)))
    }

    /// Append a handler that is removed right after its first invocation.
    pub fn register_once<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.insert(HandlerEntry::one_shot(Box::new(handler)))
    }

    pub(crate) fn insert(&mut self, entry: HandlerEntry<A>) -> Handle {
        let handle = entry.handle();
        trace!(%handle, once = entry.once, "handler registered");
        self.entries.push(entry);
        handle
    }

    /// Invoke every registered handler with `args`, in registration order.
    ///
    /// A one-shot entry is unlinked before its call, so the entry after it is
    /// visited exactly once and a panicking one-shot handler is still gone.
    pub fn trigger(&mut self, args: &A) {
        if self.entries.is_empty() {
            return;
        }
        trace!(handlers = self.entries.len(), "trigger");

        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].once {
                let mut entry = self.entries.remove(i);
                (entry.handler)(args);
            } else {
                (self.entries[i].handler)(args);
                i += 1;
            }
        }
    }

    /// Unlink the entry registered under `handle`.
    ///
    /// Returns `None` when nothing matches (never registered, already removed,
    /// or a one-shot that already fired).
    pub fn remove(&mut self, handle: Handle) -> Option<Handle> {
        let pos = self.entries.iter().position(|e| e.handle == handle)?;
        self.entries.remove(pos);
        trace!(%handle, "handler removed");
        Some(handle)
    }

    pub fn remove_all(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for HandlerStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> core::fmt::Debug for HandlerStore<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerStore")
            .field("handlers", &self.entries.len())
            .field("one_shot", &self.entries.iter().filter(|e| e.once).count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Handler<u32> {
        let log = Arc::clone(log);
        Box::new(move |_| log.lock().unwrap().push(tag))
    }

    #[test]
    fn trigger_on_empty_store_is_noop() {
        let mut store: HandlerStore<u32> = HandlerStore::new();
        store.trigger(&1);
        assert!(store.is_empty());
    }

    #[test]
    fn handlers_receive_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut store: HandlerStore<(String, u32)> = HandlerStore::new();
        let sink = Arc::clone(&seen);
        store.register(move |(name, n): &(String, u32)| {
            sink.lock().unwrap().push(format!("{name}={n}"));
        });

        store.trigger(&("a".to_string(), 1));
        store.trigger(&("b".to_string(), 2));

        assert_eq!(*seen.lock().unwrap(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn invocation_follows_registration_order() {
        let log = recorder();
        let mut store = HandlerStore::new();
        store.register(record(&log, "first"));
        store.register(record(&log, "second"));
        store.register(record(&log, "third"));

        store.trigger(&0);

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn one_shot_fires_once() {
        let hits = counter();
        let mut store = HandlerStore::new();
        let h = Arc::clone(&hits);
        store.register_once(move |_: &u32| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        store.trigger(&0);
        store.trigger(&0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn self_erasing_entry_does_not_skip_its_neighbour() {
        let log = recorder();
        let mut store = HandlerStore::new();
        store.register(record(&log, "a"));
        store.register_once(record(&log, "once"));
        store.register(record(&log, "b"));

        store.trigger(&0);
        store.trigger(&0);

        assert_eq!(*log.lock().unwrap(), vec!["a", "once", "b", "a", "b"]);
    }

    #[test]
    fn consecutive_one_shots_all_fire() {
        let log = recorder();
        let mut store = HandlerStore::new();
        store.register_once(record(&log, "x"));
        store.register_once(record(&log, "y"));
        store.register(record(&log, "z"));

        store.trigger(&0);

        assert_eq!(*log.lock().unwrap(), vec!["x", "y", "z"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removed_handler_never_runs() {
        let hits = counter();
        let mut store = HandlerStore::new();
        let h = Arc::clone(&hits);
        let handle = store.register(move |_: &u32| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(store.remove(handle), Some(handle));
        store.trigger(&0);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removing_unknown_handle_returns_none() {
        let mut store: HandlerStore<u32> = HandlerStore::new();
        let handle = store.register(|_| {});
        assert_eq!(store.remove(handle), Some(handle));
        assert_eq!(store.remove(handle), None);
        assert_eq!(store.remove(Handle::new()), None);
    }

    #[test]
    fn fired_one_shot_handle_is_stale() {
        let mut store: HandlerStore<u32> = HandlerStore::new();
        let handle = store.register_once(|_| {});
        assert!(store.contains(handle));
        store.trigger(&0);
        assert!(!store.contains(handle));
        assert_eq!(store.remove(handle), None);
    }

    #[test]
    fn remove_all_clears_everything() {
        let hits = counter();
        let mut store = HandlerStore::new();
        for _ in 0..3 {
            let h = Arc::clone(&hits);
            store.register(move |_: &u32| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }

        store.remove_all();
        store.trigger(&0);

        assert!(store.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_the_store_releases_handlers() {
        let token = Arc::new(());
        let mut store: HandlerStore<u32> = HandlerStore::new();
        let held = Arc::clone(&token);
        store.register(move |_| {
            let _ = &held;
        });
        assert_eq!(Arc::strong_count(&token), 2);

        drop(store);
        assert_eq!(Arc::strong_count(&token), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: a persistent counter handler sees exactly N triggers.
        #[test]
        fn persistent_handler_counts_every_trigger(n in 0usize..200) {
            let hits = counter();
            let mut store = HandlerStore::new();
            let h = Arc::clone(&hits);
            store.register(move |_: &u32| {
                h.fetch_add(1, Ordering::SeqCst);
            });

            for i in 0..n {
                store.trigger(&(i as u32));
            }

            prop_assert_eq!(hits.load(Ordering::SeqCst), n);
        }

        /// Property: for any mix of persistent and one-shot registrations,
        /// each persistent entry fires once per trigger, each one-shot fires
        /// exactly once overall, and only persistent entries remain.
        #[test]
        fn mixed_registrations_fire_expected_counts(
            kinds in prop::collection::vec(any::<bool>(), 0..24),
            triggers in 1usize..6,
        ) {
            let mut store = HandlerStore::new();
            let counters: Vec<Arc<AtomicUsize>> = kinds.iter().map(|_| counter()).collect();

            for (once, hits) in kinds.iter().zip(&counters) {
                let h = Arc::clone(hits);
                let bump = move |_: &u32| {
                    h.fetch_add(1, Ordering::SeqCst);
                };
                if *once {
                    store.register_once(bump);
                } else {
                    store.register(bump);
                }
            }

            for _ in 0..triggers {
                store.trigger(&0);
            }

            for (once, hits) in kinds.iter().zip(&counters) {
                let expected = if *once { 1 } else { triggers };
                prop_assert_eq!(hits.load(Ordering::SeqCst), expected);
            }
            prop_assert_eq!(store.len(), kinds.iter().filter(|once| !**once).count());
        }

        /// Property: within one trigger the call sequence is registration order.
        #[test]
        fn call_sequence_matches_registration(kinds in prop::collection::vec(any::<bool>(), 1..24)) {
            let order = Arc::new(Mutex::new(Vec::new()));
            let mut store = HandlerStore::new();

            for (idx, once) in kinds.iter().enumerate() {
                let order = Arc::clone(&order);
                let push = move |_: &u32| order.lock().unwrap().push(idx);
                if *once {
                    store.register_once(push);
                } else {
                    store.register(push);
                }
            }

            store.trigger(&0);

            let expected: Vec<usize> = (0..kinds.len()).collect();
            prop_assert_eq!(order.lock().unwrap().clone(), expected);
        }
    }
}
