//! Fan-in bridge between the engine's push-style listener and the pull-style
//! `receive` call.
//!
//! The engine invokes the message listener on its own threads, once per
//! message, for the life of the registration. This module converts those
//! pushes into channel sends and exposes the other end as a cancellable
//! receive. Closing is an explicit state transition guarded by a lock; a
//! push that loses the race against close is dropped silently, never allowed
//! to fault back across the boundary.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ClientError;
use crate::message::{ConsumerMessage, Message};
use super::handle::{Consumer, ConsumerInner};

/// What happened to one pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Delivered,
    /// The delivery side was already closed; the message is gone. The engine
    /// redelivers on ack timeout, so this is loss only from the channel's
    /// point of view.
    Dropped,
}

/// The consumer's private delivery channel plus the close guard around it.
pub(crate) struct DeliveryBridge {
    tx: mpsc::Sender<ConsumerMessage>,
    rx: tokio::sync::Mutex<mpsc::Receiver<ConsumerMessage>>,
    /// Checked under this lock before every send; set under it by `close`.
    closed: Mutex<bool>,
    shutdown: CancellationToken,
}

impl DeliveryBridge {
    pub(crate) fn new() -> Self {
        // Capacity 1 keeps the engine thread parked until a receiver takes
        // the message, the closest analogue of a rendezvous handoff.
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            closed: Mutex::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Sends one pushed message toward the receive side. Called from engine
    /// threads only; must never run inside an async runtime.
    pub(crate) fn push(&self, envelope: ConsumerMessage) -> PushOutcome {
        if *self.closed.lock() {
            debug!(topic = %envelope.message.topic, "delivery closed, dropping pushed message");
            return PushOutcome::Dropped;
        }
        match self.tx.blocking_send(envelope) {
            Ok(()) => PushOutcome::Delivered,
            Err(err) => {
                debug!(topic = %err.0.message.topic, "delivery channel gone, dropping pushed message");
                PushOutcome::Dropped
            }
        }
    }

    /// Marks the bridge closed. Subsequent pushes are dropped and a parked
    /// `receive` returns `AlreadyClosed`. Idempotent.
    pub(crate) fn close(&self) {
        {
            let mut closed = self.closed.lock();
            if *closed {
                return;
            }
            *closed = true;
        }
        self.shutdown.cancel();
        // Fail out any engine thread parked in a blocking send. When a
        // receive holds the receiver right now, it performs the same close
        // on its way out instead (see `receive`).
        if let Ok(mut rx) = self.rx.try_lock() {
            rx.close();
        }
    }

    /// Waits for the next pushed message, racing the caller's cancellation
    /// token and bridge closure.
    pub(crate) async fn receive(&self, cancel: &CancellationToken) -> Result<Message, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            _ = self.shutdown.cancelled() => {
                rx.close();
                Err(ClientError::AlreadyClosed)
            }
            delivered = rx.recv() => match delivered {
                Some(envelope) => Ok(envelope.message),
                None => Err(ClientError::AlreadyClosed),
            },
        }
    }
}

/// Where a listener push lands: the consumer's own bridge, or a channel the
/// caller supplied at subscribe time. A caller-supplied channel is never
/// closed by this crate, so sends into it keep working across a consumer
/// close for as long as the engine keeps pushing.
pub(crate) enum DeliveryTarget {
    Bridge(Arc<DeliveryBridge>),
    External(mpsc::Sender<ConsumerMessage>),
}

impl DeliveryTarget {
    fn push(&self, envelope: ConsumerMessage) -> PushOutcome {
        match self {
            Self::Bridge(bridge) => bridge.push(envelope),
            Self::External(tx) => match tx.blocking_send(envelope) {
                Ok(()) => PushOutcome::Delivered,
                Err(err) => {
                    debug!(topic = %err.0.message.topic, "caller channel gone, dropping pushed message");
                    PushOutcome::Dropped
                }
            },
        }
    }
}

/// Long-lived binding between a consumer and its delivery channel. Saved in
/// the context registry at subscribe time and looked up, not consumed, on
/// every push until the close completion removes it.
///
/// The back-reference is weak: the registry entry must not keep the
/// consumer alive, or a failed close would pin its native reference forever
/// (the drop safety net could never run).
pub(crate) struct ListenerRegistration {
    consumer: Weak<ConsumerInner>,
    target: DeliveryTarget,
}

impl ListenerRegistration {
    pub(crate) fn new(consumer: Weak<ConsumerInner>, target: DeliveryTarget) -> Self {
        Self { consumer, target }
    }

    pub(crate) fn deliver(&self, message: Message) -> PushOutcome {
        let Some(inner) = self.consumer.upgrade() else {
            debug!(topic = %message.topic, "consumer gone, dropping pushed message");
            return PushOutcome::Dropped;
        };
        self.target.push(ConsumerMessage {
            consumer: Consumer { inner },
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageId;
    use std::thread;

    fn envelope_free_message(topic: &str) -> Message {
        Message::new(MessageId::new(1, 1), topic, "payload")
    }

    fn bridged(message: Message, bridge: &Arc<DeliveryBridge>) -> thread::JoinHandle<PushOutcome> {
        let bridge = Arc::clone(bridge);
        thread::spawn(move || {
            bridge.push(ConsumerMessage {
                consumer: crate::consumer::handle::tests::detached_consumer(),
                message,
            })
        })
    }

    #[tokio::test]
    async fn test_push_then_receive_hands_over_the_message() {
        let bridge = Arc::new(DeliveryBridge::new());
        let pusher = bridged(envelope_free_message("t1"), &bridge);
        let message = bridge
            .receive(&CancellationToken::new())
            .await
            .expect("receive");
        assert_eq!(message.topic, "t1");
        assert_eq!(pusher.join().expect("pusher"), PushOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_receive_with_cancelled_token_never_touches_the_channel() {
        let bridge = Arc::new(DeliveryBridge::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = bridge.receive(&cancel).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
        // The channel was untouched: a later receive still gets the message.
        let pusher = bridged(envelope_free_message("t1"), &bridge);
        let message = bridge
            .receive(&CancellationToken::new())
            .await
            .expect("receive");
        assert_eq!(message.topic, "t1");
        pusher.join().expect("pusher");
    }

    #[tokio::test]
    async fn test_push_after_close_is_dropped_without_panic() {
        let bridge = Arc::new(DeliveryBridge::new());
        bridge.close();
        let pusher = bridged(envelope_free_message("t1"), &bridge);
        assert_eq!(pusher.join().expect("pusher"), PushOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_receive_after_close_reports_closed() {
        let bridge = Arc::new(DeliveryBridge::new());
        bridge.close();
        let result = bridge.receive(&CancellationToken::new()).await;
        assert!(matches!(result, Err(ClientError::AlreadyClosed)));
    }

    #[tokio::test]
    async fn test_close_unparks_a_blocked_pusher() {
        let bridge = Arc::new(DeliveryBridge::new());
        // Fill the single slot so the second push parks.
        let first = bridged(envelope_free_message("t1"), &bridge);
        while !first.is_finished() {
            tokio::task::yield_now().await;
        }
        let parked = bridged(envelope_free_message("t2"), &bridge);
        bridge.close();
        assert_eq!(parked.join().expect("parked pusher"), PushOutcome::Dropped);
        first.join().expect("first pusher");
    }

    #[test]
    fn test_push_for_a_dropped_consumer_is_discarded() {
        let bridge = Arc::new(DeliveryBridge::new());
        let consumer = crate::consumer::handle::tests::detached_consumer();
        let registration = ListenerRegistration::new(
            Arc::downgrade(&consumer.inner),
            DeliveryTarget::Bridge(Arc::clone(&bridge)),
        );
        drop(consumer);
        let outcome = registration.deliver(envelope_free_message("t1"));
        assert_eq!(outcome, PushOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let bridge = Arc::new(DeliveryBridge::new());
        bridge.close();
        bridge.close();
        let result = bridge.receive(&CancellationToken::new()).await;
        assert!(matches!(result, Err(ClientError::AlreadyClosed)));
    }
}
