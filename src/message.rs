//! Message types delivered by the native engine.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::consumer::Consumer;

/// Identifies a single message within a topic partition.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MessageId {
    pub ledger_id: u64,
    pub entry_id: u64,
    pub partition: i32,
    pub batch_index: i32,
}

impl MessageId {
    pub fn new(ledger_id: u64, entry_id: u64) -> Self {
        Self {
            ledger_id,
            entry_id,
            partition: -1,
            batch_index: -1,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.ledger_id, self.entry_id, self.partition, self.batch_index
        )
    }
}

/// A message pushed by the native engine. Payload bytes are shared, so
/// cloning is cheap.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub topic: String,
    pub payload: Bytes,
    pub properties: HashMap<String, String>,
    /// Broker publish timestamp, milliseconds since the epoch.
    pub publish_time_ms: u64,
}

impl Message {
    pub fn new(id: MessageId, topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            topic: topic.into(),
            payload: payload.into(),
            properties: HashMap::new(),
            publish_time_ms: 0,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_publish_time_ms(mut self, publish_time_ms: u64) -> Self {
        self.publish_time_ms = publish_time_ms;
        self
    }
}

/// A delivered message paired with the consumer it arrived on, so receivers
/// draining a shared channel can route acknowledgments back to the right
/// subscription.
#[derive(Clone)]
pub struct ConsumerMessage {
    pub consumer: Consumer,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_display() {
        let id = MessageId::new(12, 7);
        assert_eq!(id.to_string(), "12:7:-1:-1");
    }

    #[test]
    fn test_message_builder() {
        let msg = Message::new(MessageId::new(1, 2), "events", "payload")
            .with_property("origin", "unit")
            .with_publish_time_ms(42);
        assert_eq!(msg.topic, "events");
        assert_eq!(msg.payload, Bytes::from("payload"));
        assert_eq!(msg.properties.get("origin").map(String::as_str), Some("unit"));
        assert_eq!(msg.publish_time_ms, 42);
    }
}
