#![deny(unused, dead_code)]
#![deny(clippy::all, clippy::pedantic)]
// Module naming: common pattern in domain-driven code
#![allow(clippy::module_name_repetitions)]
// Documentation style
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// API ergonomics: prefer simplicity over must_use annotations
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
// Numeric casts: intentional at the boundary
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Format strings: allow non-inlined for readability
#![allow(clippy::uninlined_format_args)]
// Control flow style
#![allow(clippy::single_match_else)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::items_after_statements)]
// Unit patterns
#![allow(clippy::ignored_unit_patterns)]
// Debug impl completeness
#![allow(clippy::missing_fields_in_debug)]

//! Photon - consumer-side bridge over a native pub/sub client engine.
//!
//! The native engine owns the wire protocol, connection handling, and broker
//! interaction; its objects are opaque references manipulated through
//! boundary calls, and its async operations complete by invoking callbacks
//! on engine-owned threads. This crate wraps that surface in a safe,
//! concurrency-aware [`Consumer`]: subscribe, receive, acknowledge,
//! unsubscribe, close.
//!
//! # Module Organization
//!
//! - `engine::api` - the engine collaborator contract ([`NativeEngine`]) and
//!   the callback surface it invokes ([`EngineEvents`])
//! - `engine::context` - token table mapping boundary contexts to host values
//! - `engine::testkit` - recording fake engine for tests
//! - `consumer` - the consumer surface: options, handle, delivery bridge,
//!   lifecycle, acknowledgments
//! - `client` - engine attachment and subscribe entry points
//! - `message` - message and message-id types
//! - `error` - error taxonomy and result-code translation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use photon::engine::testkit::MockEngine;
//! use photon::{Client, ConsumerOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), photon::ClientError> {
//! let engine = Arc::new(MockEngine::new());
//! let client = Client::attach(engine.clone(), engine.client_ref());
//!
//! let consumer = client.subscribe(ConsumerOptions::new("events", "worker"))?;
//! let message = consumer.receive(&CancellationToken::new()).await?;
//! consumer.ack(&message)?;
//! consumer.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod message;

// Re-exports for convenience
pub use client::Client;
pub use consumer::{Consumer, ConsumerOptions, ConsumerType};
pub use engine::{
    ClientRef, ConfigRef, ConsumerRef, ContextRegistry, ContextToken, EngineEvents, NativeEngine,
    ResultCode,
};
pub use error::ClientError;
pub use message::{ConsumerMessage, Message, MessageId};
