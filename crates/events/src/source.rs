use herald_core::Handle;

use crate::store::HandlerStore;

/// Common surface of every provider flavour.
///
/// [`Dispatcher`](crate::Dispatcher) is generic over this trait, which is how
/// keyed dispatch composes with immediate, deferred or threaded delivery.
///
/// `trigger` takes its arguments by value; what "trigger" means is up to the
/// provider (run now, enqueue, or run under a lock and wake waiters).
pub trait EventSource<A> {
    fn on<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static;

    fn once<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static;

    fn remove(&mut self, handle: Handle) -> Option<Handle>;

    fn remove_all(&mut self);

    fn trigger(&mut self, args: A);
}

impl<A> EventSource<A> for HandlerStore<A> {
    fn on<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.register(handler)
    }

    fn once<F>(&mut self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.register_once(handler)
    }

    fn remove(&mut self, handle: Handle) -> Option<Handle> {
        HandlerStore::remove(self, handle)
    }

    fn remove_all(&mut self) {
        HandlerStore::remove_all(self)
    }

    fn trigger(&mut self, args: A) {
        HandlerStore::trigger(self, &args)
    }
}
