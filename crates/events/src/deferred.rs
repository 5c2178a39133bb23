//! Deferred (queued, pulled) delivery.
//!
//! Triggering a [`DeferredProvider`] only records the call. Handlers run when
//! the owner drains the queue with [`run_deferred`](DeferredProvider::run_deferred)
//! or [`run_all_deferred`](DeferredProvider::run_all_deferred), in trigger order.
//! Nothing runs spontaneously.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use herald_core::Handle;
use tracing::{debug, trace};

use crate::lock;
use crate::source::EventSource;
use crate::store::HandlerStore;

/// A queued unit of work, run against the context `C` when drained.
pub type DeferredTask<C> = Box<dyn FnOnce(&mut C) + Send>;

/// FIFO of deferred tasks.
///
/// Clones share the same queue. A task is popped under the queue lock and run
/// after the lock is released, so a running task may enqueue more work; that
/// work lands at the back and runs on a later drain step.
pub struct DeferredQueue<C> {
    tasks: Arc<Mutex<VecDeque<DeferredTask<C>>>>,
}

impl<C> DeferredQueue<C> {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn push<F>(&self, task: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        let mut tasks = lock(&self.tasks);
        tasks.push_back(Box::new(task));
        trace!(queued = tasks.len(), "deferred task queued");
    }

    pub fn pop(&self) -> Option<DeferredTask<C>> {
        lock(&self.tasks).pop_front()
    }

    /// Run the oldest task against `ctx`. Returns whether tasks remain.
    pub fn run_deferred(&self, ctx: &mut C) -> bool {
        if let Some(task) = self.pop() {
            task(ctx);
        }
        !self.is_empty()
    }

    /// Drain the queue, including tasks enqueued while draining.
    pub fn run_all_deferred(&self, ctx: &mut C) {
        while self.run_deferred(ctx) {}
    }

    /// Drop every queued task without running it. Returns how many were dropped.
    pub fn clear_deferred(&self) -> usize {
        let mut tasks = lock(&self.tasks);
        let dropped = tasks.len();
        tasks.clear();
        if dropped > 0 {
            debug!(dropped, "deferred queue cleared");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.tasks).is_empty()
    }
}

impl<C> Clone for DeferredQueue<C> {
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl<C> Default for DeferredQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> core::fmt::Debug for DeferredQueue<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("queued", &self.len())
            .finish()
    }
}

/// Handler registry whose `trigger` is deferred until an explicit drain.
///
/// Arguments are moved into the queue at trigger time, so they stay valid for
/// however long the entry waits.
pub struct DeferredProvider<A> {
    store: HandlerStore<A>,
    queue: DeferredQueue<HandlerStore<A>>,
}

impl<A> DeferredProvider<A>
where
    A: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            store: HandlerStore::new(),
            queue: DeferredQueue::new(),
        }
    }

    pub fn on<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.store.register(handler)
    }

    pub fn once<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.store.register_once(handler)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<Handle> {
        self.store.remove(handle)
    }

    pub fn remove_all(&mut self) {
        self.store.remove_all()
    }

    /// Queue a trigger with `args`; no handler runs until the queue is drained.
    pub fn trigger(&mut self, args: A) {
        self.queue
            .push(move |store: &mut HandlerStore<A>| store.trigger(&args));
    }

    /// Run the oldest queued trigger. Returns whether more remain.
    pub fn run_deferred(&mut self) -> bool {
        self.queue.run_deferred(&mut self.store)
    }

    pub fn run_all_deferred(&mut self) {
        self.queue.run_all_deferred(&mut self.store)
    }

    /// Discard every queued trigger without invoking any handler.
    pub fn clear_deferred(&mut self) -> usize {
        self.queue.clear_deferred()
    }

    /// Number of triggers waiting to be drained.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// A cloneable trigger endpoint for this provider's queue.
    ///
    /// Handlers can capture it to raise follow-up events; those are queued
    /// behind the current entry rather than run recursively.
    pub fn deferrer(&self) -> Deferrer<A> {
        Deferrer {
            queue: self.queue.clone(),
        }
    }
}

impl<A> Default for DeferredProvider<A>
where
    A: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> core::fmt::Debug for DeferredProvider<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeferredProvider")
            .field("store", &self.store)
            .field("queue", &self.queue)
            .finish()
    }
}

impl<A> EventSource<A> for DeferredProvider<A>
where
    A: Send + 'static,
{
    fn on<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        DeferredProvider::on(self, handler)
    }

    fn once<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        DeferredProvider::once(self, handler)
    }

    fn remove(&mut self, handle: Handle) -> Option<Handle> {
        DeferredProvider::remove(self, handle)
    }

    fn remove_all(&mut self) {
        DeferredProvider::remove_all(self)
    }

    fn trigger(&mut self, args: A) {
        DeferredProvider::trigger(self, args)
    }
}

/// Enqueues triggers on a [`DeferredProvider`] it was taken from.
pub struct Deferrer<A> {
    queue: DeferredQueue<HandlerStore<A>>,
}

impl<A> Deferrer<A>
where
    A: Send + 'static,
{
    pub fn trigger(&self, args: A) {
        self.queue
            .push(move |store: &mut HandlerStore<A>| store.trigger(&args));
    }
}

impl<A> Clone for Deferrer<A> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<A> core::fmt::Debug for Deferrer<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Deferrer").field("queue", &self.queue).finish()
    }
}
