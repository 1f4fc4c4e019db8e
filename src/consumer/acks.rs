//! Acknowledgment dispatch.
//!
//! Plain acknowledgments are fire and forget: the boundary call carries no
//! completion token and the local result is always ok, so delivery is
//! at-most-once from the caller's perspective and engine-side failures stay
//! invisible. Callers who need confirmation use `ack_with_receipt`.

use crate::error::ClientError;
use crate::message::{Message, MessageId};
use super::complete_off_thread;
use super::handle::Consumer;
use super::lifecycle::CompletionContext;

impl Consumer {
    /// Acknowledges one message.
    pub fn ack(&self, message: &Message) -> Result<(), ClientError> {
        self.ack_id(message.id)
    }

    /// Acknowledges one message by id.
    pub fn ack_id(&self, id: MessageId) -> Result<(), ClientError> {
        self.dispatch_ack(id, false)
    }

    /// Acknowledges the message and everything before it in the stream.
    pub fn ack_cumulative(&self, message: &Message) -> Result<(), ClientError> {
        self.ack_cumulative_id(message.id)
    }

    /// Cumulative acknowledgment by id.
    pub fn ack_cumulative_id(&self, id: MessageId) -> Result<(), ClientError> {
        self.dispatch_ack(id, true)
    }

    /// Acknowledges with a completion receipt. The callback is invoked
    /// exactly once, off the caller's thread, with the engine's translated
    /// result.
    pub fn ack_with_receipt(
        &self,
        id: MessageId,
        cumulative: bool,
        callback: impl FnOnce(Result<(), ClientError>) + Send + 'static,
    ) {
        let Some(native) = self.inner.native_ref_if_open() else {
            complete_off_thread(callback, Err(ClientError::AlreadyClosed));
            return;
        };
        let token = self
            .inner
            .registry
            .save(CompletionContext::new(Box::new(callback)));
        self.inner
            .engine
            .acknowledge_async(native, id, cumulative, Some(token));
    }

    fn dispatch_ack(&self, id: MessageId, cumulative: bool) -> Result<(), ClientError> {
        let Some(native) = self.inner.native_ref_if_open() else {
            return Err(ClientError::AlreadyClosed);
        };
        self.inner.engine.acknowledge_async(native, id, cumulative, None);
        Ok(())
    }
}
