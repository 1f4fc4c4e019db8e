//! Client attachment point: binds this crate's callback router to a native
//! engine and exposes the subscribe entry surface.

use std::sync::Arc;

use crate::consumer::{subscribe_async, CallbackRouter, Consumer, ConsumerOptions};
use crate::engine::{ClientRef, ContextRegistry, NativeEngine};
use crate::error::ClientError;

/// Host-side handle to an engine-side client object.
pub struct Client {
    engine: Arc<dyn NativeEngine>,
    registry: Arc<ContextRegistry>,
    client_ref: ClientRef,
}

impl Client {
    /// Attaches to an engine-side client. Installs this crate's callback
    /// router as the engine's event sink; all subsequent completions and
    /// listener pushes flow through it.
    pub fn attach(engine: Arc<dyn NativeEngine>, client_ref: ClientRef) -> Self {
        let registry = Arc::new(ContextRegistry::new());
        engine.bind(Arc::new(CallbackRouter::new(
            Arc::clone(&engine),
            Arc::clone(&registry),
        )));
        Self {
            engine,
            registry,
            client_ref,
        }
    }

    /// Subscribes asynchronously. The callback is invoked exactly once, off
    /// the caller's thread: with `InvalidConfiguration` when the options are
    /// rejected locally, or with the engine completion's translated result.
    pub fn subscribe_async(
        &self,
        options: ConsumerOptions,
        callback: impl FnOnce(Result<Consumer, ClientError>) + Send + 'static,
    ) {
        subscribe_async(
            &self.engine,
            &self.registry,
            self.client_ref,
            options,
            callback,
        );
    }

    /// Subscribes, blocking until the engine completes.
    pub fn subscribe(&self, options: ConsumerOptions) -> Result<Consumer, ClientError> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.subscribe_async(options, move |result| {
            let _ = tx.send(result);
        });
        match rx.recv() {
            Ok(result) => result,
            Err(_) => Err(ClientError::CompletionDropped),
        }
    }

    /// Number of host values currently parked for boundary callbacks.
    ///
    /// One long-lived entry exists per live consumer (its listener
    /// registration); anything beyond that is an in-flight completion. A
    /// count that keeps growing while the set of consumers does not means
    /// the engine binding is dropping completions, so this is worth wiring
    /// into whatever gauge the host application exports.
    pub fn live_contexts(&self) -> usize {
        self.registry.len()
    }
}
