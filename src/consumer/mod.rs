//! Consumer surface: subscribe flow, handle ownership, message delivery,
//! lifecycle, and acknowledgments.

mod acks;
mod delivery;
mod handle;
mod lifecycle;
mod options;
mod subscribe;

use std::thread;

use crate::error::ClientError;

pub use handle::Consumer;
pub use options::{ConsumerOptions, ConsumerType};

pub(crate) use subscribe::{subscribe_async, CallbackRouter};

/// Invokes a callback with an already-known result, off the current thread,
/// preserving the rule that completion callbacks never run synchronously
/// with the call that arranged them.
pub(crate) fn complete_off_thread<T: Send + 'static>(
    callback: impl FnOnce(Result<T, ClientError>) + Send + 'static,
    result: Result<T, ClientError>,
) {
    thread::spawn(move || callback(result));
}
