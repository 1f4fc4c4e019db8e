//! Subscription options.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::message::ConsumerMessage;

/// Subscription mode for a consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerType {
    /// Single consumer per subscription. Engine default; never sent across
    /// the boundary explicitly.
    #[default]
    Exclusive,
    /// Multiple consumers, messages dispatched round-robin.
    Shared,
    /// Multiple consumers, one active at a time.
    Failover,
}

/// Options accepted by [`Client::subscribe_async`](crate::Client::subscribe_async).
///
/// Sentinel conventions follow the native engine:
/// - `ack_timeout` zero leaves the engine's redelivery default in place
/// - `receiver_queue_size` zero keeps the engine default, negative disables
///   prefetching entirely
/// - `max_total_receiver_queue_size_across_partitions` zero is unset
/// - empty `name` lets the engine pick one
#[derive(Debug, Default)]
pub struct ConsumerOptions {
    /// Topic to subscribe to. Required.
    pub topic: String,
    /// Subscription name. Required.
    pub subscription_name: String,
    pub consumer_type: ConsumerType,
    pub ack_timeout: Duration,
    pub receiver_queue_size: i32,
    pub max_total_receiver_queue_size_across_partitions: i32,
    pub name: String,
    /// Destination for pushed messages. When absent, the consumer creates a
    /// private channel and [`Consumer::receive`](crate::Consumer::receive)
    /// reads from it; when present, the engine pushes directly into this
    /// channel and `receive` is unavailable.
    pub message_channel: Option<mpsc::Sender<ConsumerMessage>>,
}

impl ConsumerOptions {
    pub fn new(topic: impl Into<String>, subscription_name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            subscription_name: subscription_name.into(),
            ..Self::default()
        }
    }

    pub fn with_consumer_type(mut self, consumer_type: ConsumerType) -> Self {
        self.consumer_type = consumer_type;
        self
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn with_receiver_queue_size(mut self, size: i32) -> Self {
        self.receiver_queue_size = size;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_message_channel(mut self, channel: mpsc::Sender<ConsumerMessage>) -> Self {
        self.message_channel = Some(channel);
        self
    }
}
