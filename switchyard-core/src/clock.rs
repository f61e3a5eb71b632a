//! Clock abstraction so expiry/TTL logic is deterministically testable.

use crate::identity::Timestamp;
use chrono::Utc;
use std::sync::{Arc, RwLock};

/// Anything that can report the current time. Production code uses
/// [`SystemClock`]; tests use [`FixedClock`] to pin `now()` and advance it
/// explicitly instead of sleeping.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    inner: Arc<RwLock<Timestamp>>,
}

impl FixedClock {
    pub fn new(at: Timestamp) -> Self {
        Self {
            inner: Arc::new(RwLock::new(at)),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.inner.write().expect("fixed clock lock poisoned");
        *guard += delta;
    }

    pub fn set(&self, at: Timestamp) {
        *self.inner.write().expect("fixed clock lock poisoned") = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.inner.read().expect("fixed clock lock poisoned")
    }
}

/// Shared, type-erased clock handle threaded through the application state.
pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fixed_clock_advances_deterministically() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));
    }
}
