//! The single cancellation signal shared by every Reader and Writer task
//! (`spec.md` §5). Deliberately simpler than a cancellation-token crate:
//! one `AtomicBool`, checked once per round-trip, is the entirety of what
//! the spec requires ("cancellation is observable within one round-trip
//! per worker").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_latches_once_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let cloned = token.clone();
        cloned.cancel();
        assert!(token.is_cancelled());
    }
}
