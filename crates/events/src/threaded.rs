//! Thread-safe provider with blocking wait, one-shot futures and
//! thread-spawning handlers.
//!
//! One mutex guards the whole handler list. Registration, removal and trigger
//! hold it for their full duration, so two triggers never interleave and a
//! trigger blocks a concurrent registration. Handlers run under that lock and
//! should be short; slow work belongs in [`ThreadedProvider::async_on`].
//!
//! ## Waiting
//!
//! `wait` installs a one-shot handler that raises a flag, then sleeps on a
//! condition variable paired with the same mutex. Every trigger broadcasts
//! after its full handler pass, and the flag is only read under the lock, so
//! a waiter cannot miss the trigger that fired its handler. On timeout the
//! handler is removed before the lock is released.
//!
//! ## Re-entrancy
//!
//! A handler may call back into the provider that is running it. Such calls
//! are detected per thread and do not take the lock again: `trigger`, `on`,
//! `once`, `remove`, `remove_all` and `run_deferred` are queued and applied in
//! call order once the current pass finishes, still under the lock. `wait`
//! from inside a handler returns `false` immediately.
//!
//! Blocking a handler on another thread that uses the same provider (joining
//! it, or waiting on a channel it feeds) deadlocks and is not supported.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use herald_core::{EmitterConfig, EmitterError, EmitterResult, Handle};
use tracing::{debug, error, trace, warn};

use crate::deferred::{DeferredQueue, DeferredTask};
use crate::future::EventFuture;
use crate::lock;
use crate::source::EventSource;
use crate::store::{HandlerEntry, HandlerStore};

/// Timeout sentinel: block until the event arrives.
pub const WAIT_FOREVER: Duration = Duration::MAX;

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Providers whose handler pass is running on this thread.
    static IN_PASS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

fn in_pass(provider: u64) -> bool {
    IN_PASS.with(|ids| ids.borrow().contains(&provider))
}

/// Marks a provider as dispatching on the current thread until dropped,
/// including when a handler unwinds.
struct PassScope {
    provider: u64,
}

impl PassScope {
    fn enter(provider: u64) -> Self {
        IN_PASS.with(|ids| ids.borrow_mut().push(provider));
        Self { provider }
    }
}

impl Drop for PassScope {
    fn drop(&mut self) {
        IN_PASS.with(|ids| {
            let mut ids = ids.borrow_mut();
            if let Some(pos) = ids.iter().rposition(|id| *id == self.provider) {
                ids.remove(pos);
            }
        });
    }
}

/// Empties a provider's pending queue if its pass unwinds.
struct DiscardOnUnwind<'a, A> {
    provider: u64,
    pending: &'a Mutex<Vec<DeferredTask<HandlerStore<A>>>>,
}

impl<A> Drop for DiscardOnUnwind<'_, A> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let dropped = std::mem::take(&mut *lock(self.pending));
        if !dropped.is_empty() {
            warn!(
                provider = self.provider,
                dropped = dropped.len(),
                "handler panicked; discarding operations scheduled during the pass"
            );
        }
    }
}

/// Handler store behind a mutex and condition variable.
///
/// Share it across threads with `Arc<ThreadedProvider<A>>`.
pub struct ThreadedProvider<A> {
    id: u64,
    store: Mutex<HandlerStore<A>>,
    condition: Condvar,
    /// Operations issued from inside a handler pass, applied after it.
    pending: Mutex<Vec<DeferredTask<HandlerStore<A>>>>,
    deferred: DeferredQueue<HandlerStore<A>>,
    config: EmitterConfig,
}

impl<A> ThreadedProvider<A>
where
    A: Send + 'static,
{
    pub fn new() -> Self {
        Self::with_config(EmitterConfig::default())
    }

    pub fn with_config(config: EmitterConfig) -> Self {
        Self {
            id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
            store: Mutex::new(HandlerStore::new()),
            condition: Condvar::new(),
            pending: Mutex::new(Vec::new()),
            deferred: DeferredQueue::new(),
            config,
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn on<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.insert(HandlerEntry::persistent(Box::new(handler)))
    }

    pub fn once<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.insert(HandlerEntry::one_shot(Box::new(handler)))
    }

    /// Remove a registration.
    ///
    /// From inside a handler the removal is scheduled for the end of the
    /// current pass. `Some(handle)` then only means "scheduled": membership is
    /// not checked, so an unknown or already removed handle also yields
    /// `Some`.
    pub fn remove(&self, handle: Handle) -> Option<Handle> {
        if in_pass(self.id) {
            self.schedule(move |store| {
                store.remove(handle);
            });
            return Some(handle);
        }
        lock(&self.store).remove(handle)
    }

    pub fn remove_all(&self) {
        if in_pass(self.id) {
            self.schedule(|store| store.remove_all());
            return;
        }
        lock(&self.store).remove_all()
    }

    /// Run every handler with `args` under the lock, then wake all waiters.
    pub fn trigger(&self, args: A) {
        if in_pass(self.id) {
            trace!(provider = self.id, "nested trigger scheduled");
            self.schedule(move |store| store.trigger(&args));
            return;
        }
        let mut store = lock(&self.store);
        self.run_pass(&mut store, |store| store.trigger(&args));
        self.condition.notify_all();
    }

    /// Block until the next trigger or until `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wait_with(|_| {}, timeout)
    }

    /// Run `handler` on the next trigger, blocking until it has run or
    /// `timeout` elapses ([`WAIT_FOREVER`] blocks indefinitely).
    ///
    /// Returns `false` on timeout; the handler is unregistered by then, so a
    /// later trigger never invokes it.
    pub fn wait_with<F>(&self, handler: F, timeout: Duration) -> bool
    where
        F: FnMut(&A) + Send + 'static,
    {
        if in_pass(self.id) {
            warn!(provider = self.id, "wait called from a handler of the same provider");
            return false;
        }
        let (entry, finished) = waiter(handler);
        let mut store = lock(&self.store);
        let handle = store.insert(entry);
        self.block(store, handle, &finished, timeout)
    }

    /// [`wait_with`](Self::wait_with) on a helper thread; `on_timeout` runs on
    /// that thread if the wait times out.
    ///
    /// The handler is registered before this returns, so a trigger issued
    /// right afterwards is observed. The helper cannot be joined or
    /// cancelled; it ends when the event fires or the timeout expires.
    ///
    /// With [`WAIT_FOREVER`] and an event that never fires, the helper thread
    /// never exits and its `Arc` keeps the provider alive for the rest of the
    /// process.
    pub fn async_wait<F, T>(
        self: &Arc<Self>,
        handler: F,
        timeout: Duration,
        on_timeout: T,
    ) -> EmitterResult<()>
    where
        F: FnMut(&A) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let (entry, finished) = waiter(handler);
        let handle = self.insert(entry);

        let provider = Arc::clone(self);
        let spawned = self.config.thread_builder().spawn(move || {
            let store = lock(&provider.store);
            if !provider.block(store, handle, &finished, timeout) {
                on_timeout();
            }
        });

        if let Err(err) = spawned {
            error!(provider = self.id, error = %err, "failed to spawn async wait thread");
            self.remove(handle);
            return Err(EmitterError::spawn(err.to_string()));
        }
        Ok(())
    }

    /// Register a handler whose body runs on a fresh thread per trigger.
    ///
    /// The trigger only clones the arguments and spawns; it does not wait for
    /// the handler to finish.
    pub fn async_on<F>(&self, handler: F) -> Handle
    where
        A: Clone,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.on(spawn_per_call(self.config.clone(), handler))
    }

    /// One-shot variant of [`async_on`](Self::async_on).
    pub fn async_once<F>(&self, handler: F) -> Handle
    where
        A: Clone,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.once(spawn_per_call(self.config.clone(), handler))
    }

    /// A future fulfilled with the arguments of the next trigger.
    pub fn future_once(&self) -> EventFuture<A>
    where
        A: Clone,
    {
        let (promise, future) = EventFuture::channel();
        let mut promise = Some(promise);
        self.once(move |args: &A| {
            if let Some(promise) = promise.take() {
                promise.fulfill(args.clone());
            }
        });
        future
    }

    /// Queue a trigger for a later [`run_deferred`](Self::run_deferred).
    pub fn defer(&self, args: A) {
        self.deferred
            .push(move |store: &mut HandlerStore<A>| store.trigger(&args));
    }

    /// Run the oldest deferred trigger as a full locked trigger (waiters are
    /// woken). Returns whether more remain.
    pub fn run_deferred(&self) -> bool {
        if let Some(task) = self.deferred.pop() {
            if in_pass(self.id) {
                self.schedule(task);
            } else {
                let mut store = lock(&self.store);
                self.run_pass(&mut store, task);
                self.condition.notify_all();
            }
        }
        !self.deferred.is_empty()
    }

    pub fn run_all_deferred(&self) {
        while self.run_deferred() {}
    }

    pub fn clear_deferred(&self) -> usize {
        self.deferred.clear_deferred()
    }

    fn insert(&self, entry: HandlerEntry<A>) -> Handle {
        if in_pass(self.id) {
            let handle = entry.handle();
            self.schedule(move |store| {
                store.insert(entry);
            });
            return handle;
        }
        lock(&self.store).insert(entry)
    }

    fn schedule<F>(&self, op: F)
    where
        F: FnOnce(&mut HandlerStore<A>) + Send + 'static,
    {
        lock(&self.pending).push(Box::new(op));
    }

    /// Run `pass` and every operation it schedules, with this provider marked
    /// as dispatching on the current thread.
    ///
    /// If a handler panics, operations scheduled earlier in the pass are
    /// dropped with it instead of leaking into the next trigger.
    fn run_pass<F>(&self, store: &mut HandlerStore<A>, pass: F)
    where
        F: FnOnce(&mut HandlerStore<A>),
    {
        let _scope = PassScope::enter(self.id);
        let _discard = DiscardOnUnwind {
            provider: self.id,
            pending: &self.pending,
        };
        pass(store);
        loop {
            let batch = std::mem::take(&mut *lock(&self.pending));
            if batch.is_empty() {
                break;
            }
            for op in batch {
                op(store);
            }
        }
    }

    fn block(
        &self,
        store: MutexGuard<'_, HandlerStore<A>>,
        handle: Handle,
        finished: &AtomicBool,
        timeout: Duration,
    ) -> bool {
        let not_finished = |_: &mut HandlerStore<A>| !finished.load(Ordering::Acquire);

        let mut store = if timeout == WAIT_FOREVER {
            self.condition
                .wait_while(store, not_finished)
                .unwrap_or_else(PoisonError::into_inner)
        } else {
            self.condition
                .wait_timeout_while(store, timeout, not_finished)
                .map(|(store, _)| store)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0)
        };

        let done = finished.load(Ordering::Acquire);
        if !done {
            store.remove(handle);
        }
        debug!(provider = self.id, %handle, notified = done, "wait finished");
        done
    }
}

impl<A> Default for ThreadedProvider<A>
where
    A: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> core::fmt::Debug for ThreadedProvider<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadedProvider")
            .field("id", &self.id)
            .field("deferred", &self.deferred)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<A> EventSource<A> for ThreadedProvider<A>
where
    A: Send + 'static,
{
    fn on<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        ThreadedProvider::on(self, handler)
    }

    fn once<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        ThreadedProvider::once(self, handler)
    }

    fn remove(&mut self, handle: Handle) -> Option<Handle> {
        ThreadedProvider::remove(self, handle)
    }

    fn remove_all(&mut self) {
        ThreadedProvider::remove_all(self)
    }

    fn trigger(&mut self, args: A) {
        ThreadedProvider::trigger(self, args)
    }
}

/// One-shot entry that runs `handler` and then raises the returned flag.
fn waiter<A, F>(mut handler: F) -> (HandlerEntry<A>, Arc<AtomicBool>)
where
    A: 'static,
    F: FnMut(&A) + Send + 'static,
{
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let entry = HandlerEntry::one_shot(Box::new(move |args: &A| {
        handler(args);
        flag.store(true, Ordering::Release);
    }));
    (entry, finished)
}

fn spawn_per_call<A, F>(config: EmitterConfig, handler: F) -> impl FnMut(&A) + Send + 'static
where
    A: Clone + Send + 'static,
    F: Fn(&A) + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    move |args: &A| {
        let handler = Arc::clone(&handler);
        let args = args.clone();
        if let Err(err) = config.thread_builder().spawn(move || handler(&args)) {
            error!(error = %err, "failed to spawn async handler thread");
        }
    }
}
