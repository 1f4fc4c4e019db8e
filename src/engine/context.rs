//! Token table for passing host values across the native boundary.
//!
//! The native engine only accepts opaque context handles with its async
//! calls, and it invokes completion and listener callbacks on its own
//! threads. Host values are therefore never handed to the engine directly:
//! they are parked here under a small integer token, and the callback side
//! recovers them by token. Tokens are minted from a monotonic counter and
//! never reused, so a stale token can never alias a live value.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Opaque key standing in for a host value on the other side of the
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(pub u64);

/// Concurrency-safe table of host values registered for boundary callbacks.
///
/// Two lookup disciplines exist:
/// - one-shot completion contexts are recovered with [`restore`], which
///   consumes the entry
/// - listener registrations are recovered with [`restore_keep_alive`] once
///   per pushed message, and stay registered until [`remove`] at close
///
/// [`restore`]: ContextRegistry::restore
/// [`restore_keep_alive`]: ContextRegistry::restore_keep_alive
/// [`remove`]: ContextRegistry::remove
pub struct ContextRegistry {
    entries: Mutex<HashMap<u64, Arc<dyn Any + Send + Sync>>>,
    next: AtomicU64,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// Registers a host value and returns the token to pass across the
    /// boundary.
    pub fn save<T: Any + Send + Sync>(&self, value: T) -> ContextToken {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(id, Arc::new(value));
        ContextToken(id)
    }

    /// Recovers and consumes a one-shot value.
    ///
    /// # Panics
    ///
    /// Panics if the token is unknown, already consumed, or maps to a value
    /// of a different type. All three mean the callback protocol between the
    /// engine binding and this crate is broken, which is not a recoverable
    /// condition.
    pub fn restore<T: Any + Send + Sync>(&self, token: ContextToken) -> Arc<T> {
        let entry = self
            .entries
            .lock()
            .remove(&token.0)
            .unwrap_or_else(|| panic!("context token {} unknown or already consumed", token.0));
        entry
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("context token {} restored as the wrong type", token.0))
    }

    /// Recovers a long-lived value without consuming it.
    ///
    /// # Panics
    ///
    /// Same contract as [`restore`](ContextRegistry::restore).
    pub fn restore_keep_alive<T: Any + Send + Sync>(&self, token: ContextToken) -> Arc<T> {
        let entry = self
            .entries
            .lock()
            .get(&token.0)
            .cloned()
            .unwrap_or_else(|| panic!("context token {} unknown or already consumed", token.0));
        entry
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("context token {} restored as the wrong type", token.0))
    }

    /// Drops a long-lived entry. Returns whether it was still registered.
    pub fn remove(&self, token: ContextToken) -> bool {
        self.entries.lock().remove(&token.0).is_some()
    }

    /// Number of currently registered values.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_save_restore_roundtrip() {
        let registry = ContextRegistry::new();
        let token = registry.save(String::from("ctx"));
        assert_eq!(registry.len(), 1);
        let value = registry.restore::<String>(token);
        assert_eq!(value.as_str(), "ctx");
        assert!(registry.is_empty());
    }

    #[test]
    #[should_panic(expected = "unknown or already consumed")]
    fn test_restore_is_single_use() {
        let registry = ContextRegistry::new();
        let token = registry.save(7u32);
        let _ = registry.restore::<u32>(token);
        let _ = registry.restore::<u32>(token);
    }

    #[test]
    #[should_panic(expected = "wrong type")]
    fn test_restore_wrong_type_is_fatal() {
        let registry = ContextRegistry::new();
        let token = registry.save(7u32);
        let _ = registry.restore::<String>(token);
    }

    #[test]
    fn test_keep_alive_survives_repeated_lookups() {
        let registry = ContextRegistry::new();
        let token = registry.save(String::from("listener"));
        for _ in 0..100 {
            let value = registry.restore_keep_alive::<String>(token);
            assert_eq!(value.as_str(), "listener");
        }
        assert!(registry.remove(token));
        assert!(!registry.remove(token));
    }

    #[test]
    fn test_concurrent_save_yields_unique_tokens() {
        let registry = Arc::new(ContextRegistry::new());
        let mut handles = Vec::new();
        for worker in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                (0..200)
                    .map(|i| registry.save(worker * 1000 + i))
                    .collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for token in handle.join().expect("worker") {
                assert!(seen.insert(token), "token handed out twice");
            }
        }
        assert_eq!(registry.len(), 8 * 200);
    }

    #[test]
    fn test_concurrent_restore_consumes_exactly_once() {
        let registry = Arc::new(ContextRegistry::new());
        let tokens: Vec<_> = (0..64).map(|i| registry.save(i)).collect();
        let mut handles = Vec::new();
        for chunk in tokens.chunks(16) {
            let registry = Arc::clone(&registry);
            let chunk = chunk.to_vec();
            handles.push(thread::spawn(move || {
                for token in chunk {
                    let _ = registry.restore::<i32>(token);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker");
        }
        assert!(registry.is_empty());
    }
}
