//! Unsubscribe and close: one-shot async boundary calls, with blocking
//! variants adapted over a rendezvous channel.

use std::sync::atomic::Ordering;
use std::sync::mpsc;

use parking_lot::Mutex;

use crate::error::ClientError;
use super::complete_off_thread;
use super::handle::Consumer;

pub(crate) type CompletionCallback = Box<dyn FnOnce(Result<(), ClientError>) + Send>;

/// One-shot wrapper around a user completion callback.
pub(crate) struct CompletionContext {
    callback: Mutex<Option<CompletionCallback>>,
}

impl CompletionContext {
    pub(crate) fn new(callback: CompletionCallback) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
        }
    }

    pub(crate) fn take_callback(&self) -> Option<CompletionCallback> {
        self.callback.lock().take()
    }
}

/// Close completion context; carries the consumer so the completion can
/// finish teardown once the engine confirms.
pub(crate) struct CloseContext {
    consumer: Consumer,
    callback: Mutex<Option<CompletionCallback>>,
}

impl CloseContext {
    pub(crate) fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    pub(crate) fn take_callback(&self) -> Option<CompletionCallback> {
        self.callback.lock().take()
    }
}

impl Consumer {
    /// Unsubscribes, blocking until the engine completes.
    pub fn unsubscribe(&self) -> Result<(), ClientError> {
        block_on_completion(|callback| self.unsubscribe_async(callback))
    }

    /// Unsubscribes asynchronously. The callback is invoked exactly once,
    /// off the caller's thread.
    pub fn unsubscribe_async(&self, callback: impl FnOnce(Result<(), ClientError>) + Send + 'static) {
        let Some(native) = self.inner.native_ref_if_open() else {
            complete_off_thread(callback, Err(ClientError::AlreadyClosed));
            return;
        };
        let token = self
            .inner
            .registry
            .save(CompletionContext::new(Box::new(callback)));
        self.inner.engine.unsubscribe_async(native, token);
    }

    /// Closes the consumer, blocking until the engine completes.
    ///
    /// The second and any later close completes with
    /// [`ClientError::AlreadyClosed`] without touching the engine.
    pub fn close(&self) -> Result<(), ClientError> {
        block_on_completion(|callback| self.close_async(callback))
    }

    /// Closes the consumer asynchronously.
    ///
    /// The default delivery channel (when one exists) is closed before the
    /// native call is issued, so pushes racing the close are dropped instead
    /// of delivered. On the engine's success completion the listener
    /// registration is removed and the native reference released; a failed
    /// close leaves the reference to the drop safety net.
    pub fn close_async(&self, callback: impl FnOnce(Result<(), ClientError>) + Send + 'static) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            complete_off_thread(callback, Err(ClientError::AlreadyClosed));
            return;
        }
        if let Some(bridge) = &self.inner.bridge {
            bridge.close();
        }
        let Some(native) = self.inner.native_ref() else {
            complete_off_thread(callback, Err(ClientError::AlreadyClosed));
            return;
        };
        let token = self.inner.registry.save(CloseContext {
            consumer: self.clone(),
            callback: Mutex::new(Some(Box::new(callback))),
        });
        self.inner.engine.close_async(native, token);
    }

    /// Asks the engine to redeliver everything unacknowledged. Fire and
    /// forget: no completion exists and failures are handled entirely inside
    /// the engine. No-op after close.
    pub fn redeliver_unacked_messages(&self) {
        if let Some(native) = self.inner.native_ref_if_open() {
            self.inner.engine.redeliver_unacknowledged_messages(native);
        }
    }
}

/// Adapts a one-shot async completion to a blocking call: the callback
/// funnels the result through a rendezvous channel and the caller blocks on
/// the single receive.
fn block_on_completion(
    issue: impl FnOnce(Box<dyn FnOnce(Result<(), ClientError>) + Send>),
) -> Result<(), ClientError> {
    let (tx, rx) = mpsc::channel();
    issue(Box::new(move |result| {
        let _ = tx.send(result);
    }));
    match rx.recv() {
        Ok(result) => result,
        Err(_) => Err(ClientError::CompletionDropped),
    }
}
