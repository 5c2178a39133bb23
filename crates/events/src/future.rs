//! One-shot value retrieval for the next trigger of a threaded provider.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

use herald_core::{EmitterError, EmitterResult};

/// Write side of an [`EventFuture`]. Consumed by the first fulfilment.
pub(crate) struct Promise<A> {
    sender: SyncSender<A>,
}

impl<A> Promise<A> {
    pub(crate) fn fulfill(self, value: A) {
        // The future may already be gone; nothing to report then.
        let _ = self.sender.send(value);
    }
}

/// Arguments of one forthcoming trigger, obtained via
/// [`ThreadedProvider::future_once`](crate::ThreadedProvider::future_once).
///
/// The slot is filled at most once. If the registration behind it is dropped
/// before firing (removed, cleared, provider dropped) retrieval reports
/// [`EmitterError::Abandoned`].
#[derive(Debug)]
pub struct EventFuture<A> {
    receiver: Receiver<A>,
    ready: Option<A>,
}

impl<A> EventFuture<A> {
    pub(crate) fn channel() -> (Promise<A>, Self) {
        let (sender, receiver) = mpsc::sync_channel(1);
        (
            Promise { sender },
            Self {
                receiver,
                ready: None,
            },
        )
    }

    /// Whether the value has arrived (or the source is gone, in which case
    /// retrieval fails immediately).
    pub fn is_ready(&mut self) -> bool {
        if self.ready.is_some() {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(value) => {
                self.ready = Some(value);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => true,
        }
    }

    /// Take the value without blocking. `Ok(None)` while still pending.
    pub fn try_get(&mut self) -> EmitterResult<Option<A>> {
        if let Some(value) = self.ready.take() {
            return Ok(Some(value));
        }
        match self.receiver.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EmitterError::Abandoned),
        }
    }

    /// Block up to `timeout`. On [`EmitterError::Timeout`] the future stays usable.
    pub fn get_timeout(&mut self, timeout: Duration) -> EmitterResult<A> {
        if let Some(value) = self.ready.take() {
            return Ok(value);
        }
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => EmitterError::Timeout,
            RecvTimeoutError::Disconnected => EmitterError::Abandoned,
        })
    }

    /// Block until the value arrives.
    pub fn get(mut self) -> EmitterResult<A> {
        if let Some(value) = self.ready.take() {
            return Ok(value);
        }
        self.receiver.recv().map_err(|_| EmitterError::Abandoned)
    }
}
