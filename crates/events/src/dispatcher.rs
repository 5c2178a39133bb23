//! Keyed demultiplexing over a single channel.
//!
//! A [`Dispatcher`] owns a base provider whose argument is `(key, args)` and
//! registers exactly one persistent handler on it. That handler looks up the
//! handlers registered for the incoming key and runs them with `args`.
//!
//! The base decides delivery: with the default [`HandlerStore`] dispatch is
//! immediate, over a [`DeferredProvider`](crate::DeferredProvider) it happens
//! when the base is drained, over a [`ThreadedProvider`](crate::ThreadedProvider)
//! it runs under the provider lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use herald_core::Handle;
use tracing::trace;

use crate::lock;
use crate::source::EventSource;
use crate::store::HandlerStore;

type Routes<K, A> = Arc<Mutex<BTreeMap<K, HandlerStore<A>>>>;

/// Key-routed handler registry.
///
/// Handlers under equal keys run in registration order. Key order only
/// serves lookup; a trigger never runs handlers of other keys.
pub struct Dispatcher<K, A, P = HandlerStore<(K, A)>> {
    base: P,
    routes: Routes<K, A>,
}

impl<K, A> Dispatcher<K, A>
where
    K: Ord + Send + 'static,
    A: Send + 'static,
{
    /// Dispatcher over an immediate [`HandlerStore`].
    pub fn new() -> Self {
        Self::with_base(HandlerStore::new())
    }
}

impl<K, A> Default for Dispatcher<K, A>
where
    K: Ord + Send + 'static,
    A: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A, P> Dispatcher<K, A, P>
where
    K: Ord + Send + 'static,
    A: Send + 'static,
    P: EventSource<(K, A)>,
{
    /// Build on an existing base provider.
    ///
    /// The routing handler is the base's only link to this dispatcher; calling
    /// `remove_all` on the base directly disconnects every key.
    pub fn with_base(mut base: P) -> Self {
        let routes: Routes<K, A> = Arc::new(Mutex::new(BTreeMap::new()));
        let shared = Arc::clone(&routes);

        base.on(move |(key, args): &(K, A)| {
            let mut routes = lock(&shared);
            if let Some(handlers) = routes.get_mut(key) {
                trace!(handlers = handlers.len(), "dispatching keyed event");
                handlers.trigger(args);
                if handlers.is_empty() {
                    routes.remove(key);
                }
            }
        });

        Self { base, routes }
    }

    pub fn on<F>(&mut self, key: K, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        lock(&self.routes).entry(key).or_default().register(handler)
    }

    /// Register a handler that is removed after it first fires for `key`.
    pub fn once<F>(&mut self, key: K, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        lock(&self.routes)
            .entry(key)
            .or_default()
            .register_once(handler)
    }

    /// Remove the registration matching both `key` and `handle`.
    ///
    /// A handle registered under a different key is left alone and `None` is
    /// returned.
    pub fn remove(&mut self, key: &K, handle: Handle) -> Option<Handle> {
        let mut routes = lock(&self.routes);
        let handlers = routes.get_mut(key)?;
        let removed = handlers.remove(handle);
        if handlers.is_empty() {
            routes.remove(key);
        }
        removed
    }

    /// Remove every handler under `key`. Returns how many were removed.
    pub fn remove_all(&mut self, key: &K) -> usize {
        lock(&self.routes)
            .remove(key)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    pub fn handler_count(&self, key: &K) -> usize {
        lock(&self.routes).get(key).map(HandlerStore::len).unwrap_or(0)
    }

    /// Trigger `key` with `args` through the base provider.
    pub fn trigger(&mut self, key: K, args: A) {
        self.base.trigger((key, args));
    }

    pub fn base(&self) -> &P {
        &self.base
    }

    /// Mutable access to the base, e.g. to drain a deferred base.
    pub fn base_mut(&mut self) -> &mut P {
        &mut self.base
    }
}

impl<K, A, P> core::fmt::Debug for Dispatcher<K, A, P>
where
    K: core::fmt::Debug,
    P: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let routes = lock(&self.routes);
        f.debug_struct("Dispatcher")
            .field("keys", &routes.keys().collect::<Vec<_>>())
            .field("base", &self.base)
            .finish()
    }
}
