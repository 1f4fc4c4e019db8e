//! The native engine boundary.
//!
//! [`NativeEngine`] is the consumed half of the contract: the calls this
//! crate issues into the engine. [`EngineEvents`] is the produced half: the
//! callbacks the engine invokes from its own threads. Host values never
//! cross in either direction; every async call carries a [`ContextToken`]
//! minted by the [`ContextRegistry`](super::ContextRegistry), and the
//! matching completion hands the same token back.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::ContextToken;
use crate::consumer::ConsumerType;
use crate::message::{Message, MessageId};

/// Opaque reference to the engine-side client object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientRef(pub u64);

/// Opaque reference to an engine-side consumer configuration. Freed exactly
/// once, by whichever completion consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigRef(pub u64);

/// Opaque reference to an engine-side consumer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerRef(pub u64);

/// Result codes reported by the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Ok,
    UnknownError,
    InvalidConfiguration,
    Timeout,
    NotConnected,
    AlreadyClosed,
    ConsumerBusy,
    ConnectError,
    AuthenticationError,
    TopicNotFound,
    SubscriptionNotFound,
}

impl ResultCode {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::UnknownError => "unknown error",
            Self::InvalidConfiguration => "invalid configuration",
            Self::Timeout => "operation timed out",
            Self::NotConnected => "not connected to broker",
            Self::AlreadyClosed => "object already closed",
            Self::ConsumerBusy => "exclusive consumer is already connected",
            Self::ConnectError => "connection error",
            Self::AuthenticationError => "authentication failed",
            Self::TopicNotFound => "topic not found",
            Self::SubscriptionNotFound => "subscription not found",
        };
        f.write_str(text)
    }
}

/// Callback surface the engine invokes from its own threads.
///
/// Every `on_*_complete` is a one-shot completion: invoked exactly once per
/// async call, with the token that call carried. `on_message` is invoked
/// once per pushed message for the whole lifetime of a listener
/// registration.
pub trait EngineEvents: Send + Sync + 'static {
    fn on_subscribe_complete(
        &self,
        code: ResultCode,
        consumer: Option<ConsumerRef>,
        token: ContextToken,
    );
    fn on_message(&self, consumer: ConsumerRef, message: Message, token: ContextToken);
    fn on_unsubscribe_complete(&self, code: ResultCode, token: ContextToken);
    fn on_close_complete(&self, code: ResultCode, token: ContextToken);
    fn on_ack_complete(&self, code: ResultCode, token: ContextToken);
}

/// The native pub/sub engine, reduced to the calls the consumer side needs.
///
/// Implementations own connection handling, the broker wire protocol, topic
/// lookup and partitioning, and message serialization; this crate treats all
/// of that as a black box. Async methods complete by invoking the bound
/// [`EngineEvents`] sink, exactly once, on an engine thread.
pub trait NativeEngine: Send + Sync + 'static {
    /// Installs the callback sink. Called once, before any other method.
    fn bind(&self, events: Arc<dyn EngineEvents>);

    fn create_configuration(&self) -> ConfigRef;
    fn free_configuration(&self, cfg: ConfigRef);

    fn set_message_listener(&self, cfg: ConfigRef, token: ContextToken);
    fn set_ack_timeout_ms(&self, cfg: ConfigRef, timeout_ms: u64);
    fn set_consumer_type(&self, cfg: ConfigRef, consumer_type: ConsumerType);
    fn set_receiver_queue_size(&self, cfg: ConfigRef, size: i32);
    fn set_max_total_receiver_queue_size_across_partitions(&self, cfg: ConfigRef, size: i32);
    fn set_consumer_name(&self, cfg: ConfigRef, name: &str);

    fn subscribe_async(
        &self,
        client: ClientRef,
        topic: &str,
        subscription: &str,
        cfg: ConfigRef,
        token: ContextToken,
    );
    fn unsubscribe_async(&self, consumer: ConsumerRef, token: ContextToken);
    fn close_async(&self, consumer: ConsumerRef, token: ContextToken);

    /// Acknowledges by message id. No completion fires unless `token` is
    /// supplied.
    fn acknowledge_async(
        &self,
        consumer: ConsumerRef,
        id: MessageId,
        cumulative: bool,
        token: Option<ContextToken>,
    );

    /// Fire-and-forget redelivery request; the engine tracks no completion.
    fn redeliver_unacknowledged_messages(&self, consumer: ConsumerRef);

    /// Releases the engine-side consumer object. Not idempotent: callers
    /// must invoke it at most once per reference.
    fn free_consumer(&self, consumer: ConsumerRef);
}
