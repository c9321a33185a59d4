// MIT License

//! Subscription registry: (signal type, join) to observer callbacks.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::signal::{SignalType, SignalValue};

/// Key for a subscription: the signal-type tag plus the join number.
pub type SubscriptionKey = (SignalType, u16);

/// Observer invoked with `(signal type, join, value)` for every matching
/// inbound join update.
pub type SignalCallback = Arc<dyn Fn(SignalType, u16, &SignalValue) + Send + Sync>;

/// Append-only mapping from subscription keys to callback lists.
///
/// Multiple callbacks may be stored per key; dispatch invokes them in
/// insertion order. There is no removal: a subscription lives as long as
/// the engine.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<HashMap<SubscriptionKey, Vec<SignalCallback>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for the given key.
    pub fn subscribe(&self, signal_type: SignalType, join: u16, callback: SignalCallback) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entry((signal_type, join))
            .or_default()
            .push(callback);
    }

    /// Invoke every callback registered for the key, in insertion order.
    ///
    /// Unknown keys dispatch to no one; the processor broadcasts every
    /// join on registration regardless of subscriber interest. A panic in
    /// one callback is trapped so the remaining subscribers still run.
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, signal_type: SignalType, join: u16, value: &SignalValue) -> usize {
        let callbacks = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.get(&(signal_type, join)) {
                Some(list) => list.clone(),
                None => return 0,
            }
        };
        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(signal_type, join, value))).is_err() {
                warn!("subscriber callback for {}{} panicked", signal_type.tag(), join);
            }
        }
        callbacks.len()
    }

    /// Number of callbacks registered for a key.
    pub fn subscriber_count(&self, signal_type: SignalType, join: u16) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(&(signal_type, join)).map_or(0, Vec::len)
    }
}
