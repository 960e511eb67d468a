//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag polled after every decode step of a long operation.
///
/// Clones share the flag, so a UI thread can cancel work running on the
/// decode thread. The engine clears the flag once it has reported a
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear a consumed cancellation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}
