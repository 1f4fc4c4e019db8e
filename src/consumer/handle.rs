//! The consumer handle and its native-reference ownership discipline.
//!
//! One `ConsumerInner` exclusively owns one engine-side consumer reference.
//! The reference is installed exactly once, on successful subscribe
//! completion, and released at most once: either by the close completion or,
//! as a safety net, when the last handle is dropped. A handle that never
//! activated holds no reference and releases nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{ConsumerRef, ContextRegistry, ContextToken, NativeEngine};
use crate::error::ClientError;
use crate::message::Message;
use super::delivery::DeliveryBridge;

/// Handle to a subscription. Cheap to clone; all clones share one native
/// consumer reference.
#[derive(Clone)]
pub struct Consumer {
    pub(crate) inner: Arc<ConsumerInner>,
}

impl Consumer {
    /// The topic this consumer is subscribed to.
    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// The subscription name.
    pub fn subscription(&self) -> &str {
        &self.inner.subscription
    }

    /// Waits for the next message pushed by the engine.
    ///
    /// Returns [`ClientError::Cancelled`] immediately when `cancel` has
    /// already fired, without touching the delivery channel. Returns
    /// [`ClientError::NoDefaultChannel`] when the subscription was created
    /// with a caller-supplied message channel; drain that channel instead.
    pub async fn receive(&self, cancel: &CancellationToken) -> Result<Message, ClientError> {
        match &self.inner.bridge {
            Some(bridge) => bridge.receive(cancel).await,
            None => Err(ClientError::NoDefaultChannel),
        }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("topic", &self.inner.topic)
            .field("subscription", &self.inner.subscription)
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}

pub(crate) struct ConsumerInner {
    pub(crate) engine: Arc<dyn NativeEngine>,
    pub(crate) registry: Arc<ContextRegistry>,
    pub(crate) topic: String,
    pub(crate) subscription: String,
    /// Installed once on activation; taken at most once by `release`.
    native: Mutex<Option<ConsumerRef>>,
    /// Present only when the caller did not supply a message channel.
    pub(crate) bridge: Option<Arc<DeliveryBridge>>,
    /// Token of the listener registration, removed once the engine confirms
    /// close.
    listener_token: Mutex<Option<ContextToken>>,
    pub(crate) closed: AtomicBool,
}

impl ConsumerInner {
    pub(crate) fn new(
        engine: Arc<dyn NativeEngine>,
        registry: Arc<ContextRegistry>,
        topic: String,
        subscription: String,
        bridge: Option<Arc<DeliveryBridge>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            registry,
            topic,
            subscription,
            native: Mutex::new(None),
            bridge,
            listener_token: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn set_listener_token(&self, token: ContextToken) {
        *self.listener_token.lock() = Some(token);
    }

    /// Installs the native reference. Only the subscribe completion calls
    /// this, and only on success.
    pub(crate) fn activate(&self, native: ConsumerRef) {
        let mut slot = self.native.lock();
        debug_assert!(slot.is_none(), "consumer activated twice");
        *slot = Some(native);
    }

    pub(crate) fn native_ref(&self) -> Option<ConsumerRef> {
        *self.native.lock()
    }

    /// The native reference, unless the consumer has been closed.
    pub(crate) fn native_ref_if_open(&self) -> Option<ConsumerRef> {
        if self.closed.load(Ordering::SeqCst) {
            None
        } else {
            self.native_ref()
        }
    }

    /// Frees the native reference if this handle still owns it.
    pub(crate) fn release(&self) {
        if let Some(native) = self.native.lock().take() {
            self.engine.free_consumer(native);
        }
    }

    pub(crate) fn drop_listener_registration(&self) {
        if let Some(token) = self.listener_token.lock().take() {
            self.registry.remove(token);
        }
    }

    /// Teardown performed when the engine confirms a close: the listener
    /// will never be invoked again, so the registration and the native
    /// reference can both go.
    pub(crate) fn finish_close(&self) {
        self.drop_listener_registration();
        self.release();
    }
}

impl Drop for ConsumerInner {
    fn drop(&mut self) {
        // Safety net for handles dropped without an explicit close. A handle
        // that never activated holds None here and frees nothing.
        if let Some(native) = self.native.get_mut().take() {
            debug!(consumer = native.0, topic = %self.topic, "releasing native consumer on drop");
            self.engine.free_consumer(native);
        }
        // The registration only holds a weak back-reference by now; remove
        // it after the free so a push racing this drop still resolves its
        // token and is discarded by the failed upgrade.
        self.drop_listener_registration();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::testkit::MockEngine;

    /// A consumer with no native reference and no delivery bridge, for tests
    /// that only need the envelope back-reference.
    pub(crate) fn detached_consumer() -> Consumer {
        Consumer {
            inner: ConsumerInner::new(
                Arc::new(MockEngine::new()),
                Arc::new(ContextRegistry::new()),
                "t1".to_string(),
                "s1".to_string(),
                None,
            ),
        }
    }

    #[test]
    fn test_unactivated_handle_frees_nothing_on_drop() {
        let engine = Arc::new(MockEngine::new());
        let registry = Arc::new(ContextRegistry::new());
        let inner = ConsumerInner::new(
            engine.clone() as Arc<dyn NativeEngine>,
            registry,
            "t1".to_string(),
            "s1".to_string(),
            None,
        );
        drop(inner);
        assert_eq!(engine.total_frees(), 0);
    }

    #[test]
    fn test_activated_handle_frees_exactly_once() {
        let engine = Arc::new(MockEngine::new());
        let registry = Arc::new(ContextRegistry::new());
        let inner = ConsumerInner::new(
            engine.clone() as Arc<dyn NativeEngine>,
            registry,
            "t1".to_string(),
            "s1".to_string(),
            None,
        );
        inner.activate(ConsumerRef(9));
        inner.release();
        inner.release();
        drop(inner);
        assert_eq!(engine.free_count(ConsumerRef(9)), 1);
    }

    #[test]
    fn test_drop_releases_when_never_explicitly_released() {
        let engine = Arc::new(MockEngine::new());
        let registry = Arc::new(ContextRegistry::new());
        let inner = ConsumerInner::new(
            engine.clone() as Arc<dyn NativeEngine>,
            registry,
            "t1".to_string(),
            "s1".to_string(),
            None,
        );
        inner.activate(ConsumerRef(4));
        drop(inner);
        assert_eq!(engine.free_count(ConsumerRef(4)), 1);
    }
}
