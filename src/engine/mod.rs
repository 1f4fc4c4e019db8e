//! Native engine boundary: the collaborator contract, the context token
//! table, and an in-memory engine double for tests.

pub mod api;
pub mod context;
pub mod testkit;

pub use api::{ClientRef, ConfigRef, ConsumerRef, EngineEvents, NativeEngine, ResultCode};
pub use context::{ContextRegistry, ContextToken};
