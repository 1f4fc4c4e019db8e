//! The subscribe flow and the callback router.
//!
//! `subscribe_async` validates options in-process, builds the native
//! configuration, registers the listener binding, and hands the engine a
//! one-shot completion token. `CallbackRouter` is the host-side half of the
//! callback protocol: the engine invokes it on its own threads, and it
//! recovers the original host values through the context registry.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::warn;

use crate::engine::{
    ClientRef, ConfigRef, ConsumerRef, ContextRegistry, ContextToken, EngineEvents, NativeEngine,
    ResultCode,
};
use crate::error::{translate, ClientError};
use crate::message::Message;
use super::delivery::{DeliveryBridge, DeliveryTarget, ListenerRegistration};
use super::handle::{Consumer, ConsumerInner};
use super::lifecycle::{CloseContext, CompletionContext};
use super::options::{ConsumerOptions, ConsumerType};

pub(crate) type SubscribeCallback = Box<dyn FnOnce(Result<Consumer, ClientError>) + Send>;

/// One-shot pairing of the native configuration, the not-yet-active handle,
/// and the user callback. Consumed by the subscribe completion.
pub(crate) struct SubscribeContext {
    cfg: ConfigRef,
    consumer: Consumer,
    callback: Mutex<Option<SubscribeCallback>>,
}

impl SubscribeContext {
    fn take_callback(&self) -> Option<SubscribeCallback> {
        self.callback.lock().take()
    }
}

/// Drives an async subscribe. The callback is always invoked off the
/// caller's thread, exactly once: with `InvalidConfiguration` before any
/// boundary call when validation fails, or from the engine's completion
/// otherwise.
pub(crate) fn subscribe_async(
    engine: &Arc<dyn NativeEngine>,
    registry: &Arc<ContextRegistry>,
    client: ClientRef,
    options: ConsumerOptions,
    callback: impl FnOnce(Result<Consumer, ClientError>) + Send + 'static,
) {
    if options.topic.is_empty() {
        reject(callback, "topic is required");
        return;
    }
    if options.subscription_name.is_empty() {
        reject(callback, "subscription name is required");
        return;
    }

    let cfg = engine.create_configuration();

    let (bridge, target) = match options.message_channel {
        Some(tx) => (None, DeliveryTarget::External(tx)),
        None => {
            let bridge = Arc::new(DeliveryBridge::new());
            (Some(Arc::clone(&bridge)), DeliveryTarget::Bridge(bridge))
        }
    };

    let consumer = Consumer {
        inner: ConsumerInner::new(
            Arc::clone(engine),
            Arc::clone(registry),
            options.topic.clone(),
            options.subscription_name.clone(),
            bridge,
        ),
    };

    // The listener binding outlives this call: it is looked up on every push
    // until the close completion removes it. Registered before the subscribe
    // is issued so no push can ever observe a missing token.
    let listener_token =
        registry.save(ListenerRegistration::new(Arc::downgrade(&consumer.inner), target));
    consumer.inner.set_listener_token(listener_token);
    engine.set_message_listener(cfg, listener_token);

    if !options.ack_timeout.is_zero() {
        engine.set_ack_timeout_ms(cfg, options.ack_timeout.as_millis() as u64);
    }
    if options.consumer_type != ConsumerType::Exclusive {
        engine.set_consumer_type(cfg, options.consumer_type);
    }
    // Zero keeps the engine default. The host API uses negative values to
    // disable prefetching; the engine's sentinel for that is zero.
    if options.receiver_queue_size > 0 {
        engine.set_receiver_queue_size(cfg, options.receiver_queue_size);
    } else if options.receiver_queue_size < 0 {
        engine.set_receiver_queue_size(cfg, 0);
    }
    if options.max_total_receiver_queue_size_across_partitions != 0 {
        engine.set_max_total_receiver_queue_size_across_partitions(
            cfg,
            options.max_total_receiver_queue_size_across_partitions,
        );
    }
    if !options.name.is_empty() {
        engine.set_consumer_name(cfg, &options.name);
    }

    let token = registry.save(SubscribeContext {
        cfg,
        consumer,
        callback: Mutex::new(Some(Box::new(callback))),
    });
    engine.subscribe_async(
        client,
        &options.topic,
        &options.subscription_name,
        cfg,
        token,
    );
}

/// Delivers a validation failure without crossing the boundary. Off-thread,
/// so callers cannot depend on synchronous callback invocation on any path.
fn reject(
    callback: impl FnOnce(Result<Consumer, ClientError>) + Send + 'static,
    reason: &'static str,
) {
    thread::spawn(move || callback(Err(ClientError::InvalidConfiguration(reason.to_string()))));
}

/// Routes engine callbacks to the host values behind their tokens.
pub(crate) struct CallbackRouter {
    engine: Arc<dyn NativeEngine>,
    registry: Arc<ContextRegistry>,
}

impl CallbackRouter {
    pub(crate) fn new(engine: Arc<dyn NativeEngine>, registry: Arc<ContextRegistry>) -> Self {
        Self { engine, registry }
    }
}

impl EngineEvents for CallbackRouter {
    fn on_subscribe_complete(
        &self,
        code: ResultCode,
        consumer: Option<ConsumerRef>,
        token: ContextToken,
    ) {
        let ctx = self.registry.restore::<SubscribeContext>(token);
        // The configuration was consumed by the subscribe attempt either way.
        self.engine.free_configuration(ctx.cfg);
        let Some(callback) = ctx.take_callback() else {
            return;
        };
        let native = match (code.is_ok(), consumer) {
            (true, Some(native)) => native,
            (true, None) => {
                warn!("engine reported ok without a consumer reference");
                ctx.consumer.inner.drop_listener_registration();
                callback(Err(ClientError::from_code(
                    ResultCode::UnknownError,
                    "failed to subscribe to topic",
                )));
                return;
            }
            (false, _) => {
                // The handle never activates; drop the listener binding so
                // the registry does not pin it forever.
                ctx.consumer.inner.drop_listener_registration();
                callback(Err(ClientError::from_code(
                    code,
                    "failed to subscribe to topic",
                )));
                return;
            }
        };
        ctx.consumer.inner.activate(native);
        callback(Ok(ctx.consumer.clone()));
    }

    fn on_message(&self, _consumer: ConsumerRef, message: Message, token: ContextToken) {
        let registration = self.registry.restore_keep_alive::<ListenerRegistration>(token);
        // A push that lost the race against close is dropped here; the
        // outcome is not reported back to the engine.
        registration.deliver(message);
    }

    fn on_unsubscribe_complete(&self, code: ResultCode, token: ContextToken) {
        let ctx = self.registry.restore::<CompletionContext>(token);
        if let Some(callback) = ctx.take_callback() {
            callback(translate(code, "failed to unsubscribe consumer"));
        }
    }

    fn on_close_complete(&self, code: ResultCode, token: ContextToken) {
        let ctx = self.registry.restore::<CloseContext>(token);
        let result = translate(code, "failed to close consumer");
        if result.is_ok() {
            // The engine will never invoke the listener again: remove the
            // registration and release the native reference now rather than
            // waiting for the drop safety net.
            ctx.consumer().inner.finish_close();
        }
        if let Some(callback) = ctx.take_callback() {
            callback(result);
        }
    }

    fn on_ack_complete(&self, code: ResultCode, token: ContextToken) {
        let ctx = self.registry.restore::<CompletionContext>(token);
        if let Some(callback) = ctx.take_callback() {
            callback(translate(code, "acknowledge was not accepted"));
        }
    }
}
