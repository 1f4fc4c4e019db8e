//! Recording fake engine for tests.
//!
//! `MockEngine` implements [`NativeEngine`] without any broker behind it:
//! every boundary call is recorded as a typed [`EngineCall`], async calls
//! complete from a spawned thread (the stand-in for an engine-owned thread)
//! with a configurable result code, and [`MockEngine::push`] simulates the
//! engine invoking the message listener for a subscribed consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use super::api::{ClientRef, ConfigRef, ConsumerRef, EngineEvents, NativeEngine, ResultCode};
use super::context::ContextToken;
use crate::consumer::ConsumerType;
use crate::message::{Message, MessageId};

/// One recorded boundary call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateConfiguration(ConfigRef),
    FreeConfiguration(ConfigRef),
    SetMessageListener(ConfigRef, ContextToken),
    SetAckTimeoutMs(ConfigRef, u64),
    SetConsumerType(ConfigRef, ConsumerType),
    SetReceiverQueueSize(ConfigRef, i32),
    SetMaxTotalReceiverQueueSize(ConfigRef, i32),
    SetConsumerName(ConfigRef, String),
    Subscribe {
        topic: String,
        subscription: String,
        cfg: ConfigRef,
    },
    Unsubscribe(ConsumerRef),
    Close(ConsumerRef),
    Acknowledge {
        consumer: ConsumerRef,
        id: MessageId,
        cumulative: bool,
    },
    Redeliver(ConsumerRef),
    FreeConsumer(ConsumerRef),
}

struct MockState {
    calls: Vec<EngineCall>,
    events: Option<Arc<dyn EngineEvents>>,
    /// Listener token installed per configuration, moved to the consumer on
    /// successful subscribe.
    listener_tokens: HashMap<ConfigRef, ContextToken>,
    consumer_listeners: HashMap<ConsumerRef, ContextToken>,
    created_consumers: Vec<ConsumerRef>,
    free_counts: HashMap<ConsumerRef, u32>,
    subscribe_result: ResultCode,
    unsubscribe_result: ResultCode,
    close_result: ResultCode,
    ack_result: ResultCode,
    hold_close: bool,
    held_closes: Vec<ContextToken>,
}

/// In-memory [`NativeEngine`] double.
pub struct MockEngine {
    state: Mutex<MockState>,
    next_ref: AtomicU64,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                events: None,
                listener_tokens: HashMap::new(),
                consumer_listeners: HashMap::new(),
                created_consumers: Vec::new(),
                free_counts: HashMap::new(),
                subscribe_result: ResultCode::Ok,
                unsubscribe_result: ResultCode::Ok,
                close_result: ResultCode::Ok,
                ack_result: ResultCode::Ok,
                hold_close: false,
                held_closes: Vec::new(),
            }),
            next_ref: AtomicU64::new(1),
        }
    }

    /// The engine-side client object tests attach to.
    pub fn client_ref(&self) -> ClientRef {
        ClientRef(1)
    }

    pub fn complete_subscribe_with(&self, code: ResultCode) {
        self.state.lock().subscribe_result = code;
    }

    pub fn complete_unsubscribe_with(&self, code: ResultCode) {
        self.state.lock().unsubscribe_result = code;
    }

    pub fn complete_close_with(&self, code: ResultCode) {
        self.state.lock().close_result = code;
    }

    pub fn complete_ack_with(&self, code: ResultCode) {
        self.state.lock().ack_result = code;
    }

    /// Every boundary call recorded so far, in issue order.
    pub fn recorded_calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    /// Consumer references handed out by successful subscribes, in order.
    pub fn subscribed_consumers(&self) -> Vec<ConsumerRef> {
        self.state.lock().created_consumers.clone()
    }

    /// Parks close completions instead of firing them, so tests can exercise
    /// the window between a close being issued and the engine confirming it.
    pub fn hold_close_completions(&self) {
        self.state.lock().hold_close = true;
    }

    /// Fires every parked close completion on its own thread. Join the
    /// handles to wait for them.
    pub fn release_close_completions(&self) -> Vec<thread::JoinHandle<()>> {
        let (events, code, held) = {
            let mut state = self.state.lock();
            state.hold_close = false;
            let held = std::mem::take(&mut state.held_closes);
            (
                state.events.clone().expect("engine not bound"),
                state.close_result,
                held,
            )
        };
        held.into_iter()
            .map(|token| {
                let events = Arc::clone(&events);
                thread::spawn(move || events.on_close_complete(code, token))
            })
            .collect()
    }

    /// How many times `free_consumer` ran for the given reference.
    pub fn free_count(&self, consumer: ConsumerRef) -> u32 {
        self.state
            .lock()
            .free_counts
            .get(&consumer)
            .copied()
            .unwrap_or(0)
    }

    /// Total `free_consumer` invocations across all references.
    pub fn total_frees(&self) -> u32 {
        self.state.lock().free_counts.values().sum()
    }

    /// Simulates the engine pushing one message to the listener registered
    /// for `consumer`. Runs on a spawned thread like a real engine push;
    /// join the handle to observe completion.
    ///
    /// # Panics
    ///
    /// Panics if the consumer was never subscribed through this engine.
    pub fn push(&self, consumer: ConsumerRef, message: Message) -> thread::JoinHandle<()> {
        let (events, token) = {
            let state = self.state.lock();
            let token = *state
                .consumer_listeners
                .get(&consumer)
                .expect("push for a consumer this engine never created");
            (state.events.clone().expect("engine not bound"), token)
        };
        thread::spawn(move || events.on_message(consumer, message, token))
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().calls.push(call);
    }

    fn events(&self) -> Arc<dyn EngineEvents> {
        self.state.lock().events.clone().expect("engine not bound")
    }
}

impl NativeEngine for MockEngine {
    fn bind(&self, events: Arc<dyn EngineEvents>) {
        self.state.lock().events = Some(events);
    }

    fn create_configuration(&self) -> ConfigRef {
        let cfg = ConfigRef(self.next_ref.fetch_add(1, Ordering::Relaxed));
        self.record(EngineCall::CreateConfiguration(cfg));
        cfg
    }

    fn free_configuration(&self, cfg: ConfigRef) {
        self.record(EngineCall::FreeConfiguration(cfg));
    }

    fn set_message_listener(&self, cfg: ConfigRef, token: ContextToken) {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::SetMessageListener(cfg, token));
        state.listener_tokens.insert(cfg, token);
    }

    fn set_ack_timeout_ms(&self, cfg: ConfigRef, timeout_ms: u64) {
        self.record(EngineCall::SetAckTimeoutMs(cfg, timeout_ms));
    }

    fn set_consumer_type(&self, cfg: ConfigRef, consumer_type: ConsumerType) {
        self.record(EngineCall::SetConsumerType(cfg, consumer_type));
    }

    fn set_receiver_queue_size(&self, cfg: ConfigRef, size: i32) {
        self.record(EngineCall::SetReceiverQueueSize(cfg, size));
    }

    fn set_max_total_receiver_queue_size_across_partitions(&self, cfg: ConfigRef, size: i32) {
        self.record(EngineCall::SetMaxTotalReceiverQueueSize(cfg, size));
    }

    fn set_consumer_name(&self, cfg: ConfigRef, name: &str) {
        self.record(EngineCall::SetConsumerName(cfg, name.to_string()));
    }

    fn subscribe_async(
        &self,
        _client: ClientRef,
        topic: &str,
        subscription: &str,
        cfg: ConfigRef,
        token: ContextToken,
    ) {
        let (events, code, consumer) = {
            let mut state = self.state.lock();
            state.calls.push(EngineCall::Subscribe {
                topic: topic.to_string(),
                subscription: subscription.to_string(),
                cfg,
            });
            let code = state.subscribe_result;
            let consumer = if code.is_ok() {
                let consumer = ConsumerRef(self.next_ref.fetch_add(1, Ordering::Relaxed));
                if let Some(listener) = state.listener_tokens.get(&cfg).copied() {
                    state.consumer_listeners.insert(consumer, listener);
                }
                state.created_consumers.push(consumer);
                Some(consumer)
            } else {
                None
            };
            (state.events.clone().expect("engine not bound"), code, consumer)
        };
        thread::spawn(move || events.on_subscribe_complete(code, consumer, token));
    }

    fn unsubscribe_async(&self, consumer: ConsumerRef, token: ContextToken) {
        self.record(EngineCall::Unsubscribe(consumer));
        let events = self.events();
        let code = self.state.lock().unsubscribe_result;
        thread::spawn(move || events.on_unsubscribe_complete(code, token));
    }

    fn close_async(&self, consumer: ConsumerRef, token: ContextToken) {
        let (events, code) = {
            let mut state = self.state.lock();
            state.calls.push(EngineCall::Close(consumer));
            if state.hold_close {
                state.held_closes.push(token);
                return;
            }
            (
                state.events.clone().expect("engine not bound"),
                state.close_result,
            )
        };
        thread::spawn(move || events.on_close_complete(code, token));
    }

    fn acknowledge_async(
        &self,
        consumer: ConsumerRef,
        id: MessageId,
        cumulative: bool,
        token: Option<ContextToken>,
    ) {
        self.record(EngineCall::Acknowledge {
            consumer,
            id,
            cumulative,
        });
        if let Some(token) = token {
            let events = self.events();
            let code = self.state.lock().ack_result;
            thread::spawn(move || events.on_ack_complete(code, token));
        }
    }

    fn redeliver_unacknowledged_messages(&self, consumer: ConsumerRef) {
        self.record(EngineCall::Redeliver(consumer));
    }

    fn free_consumer(&self, consumer: ConsumerRef) {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::FreeConsumer(consumer));
        *state.free_counts.entry(consumer).or_insert(0) += 1;
    }
}
