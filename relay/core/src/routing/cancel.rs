//! Cooperative cancellation for in-progress routes

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag the host sets to stop a route.
///
/// The router checks it before each attempt and before returning a success.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; visible to every clone
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_visible_to_clones() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!handle.is_cancelled());

        flag.cancel();
        assert!(handle.is_cancelled());
    }
}
