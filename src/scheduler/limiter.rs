use std::sync::atomic::{AtomicU64, Ordering};

/// A reserved iteration number (1-based, global across workers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    pub iteration: u64,
    /// This reservation used up the configured iteration count.
    pub last: bool,
}

/// Hands out iteration numbers, up to an optional limit.
#[derive(Debug)]
pub(crate) struct IterationLimiter {
    limit: Option<u64>,
    counter: AtomicU64,
}

impl IterationLimiter {
    pub(crate) const fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            counter: AtomicU64::new(0),
        }
    }

    pub(crate) fn try_reserve(&self) -> Option<Reservation> {
        loop {
            let current = self.counter.load(Ordering::Relaxed);
            if let Some(limit) = self.limit
                && current >= limit
            {
                return None;
            }
            let next = current.checked_add(1)?;
            if self
                .counter
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Some(Reservation {
                    iteration: next,
                    last: self.limit == Some(next),
                });
            }
        }
    }

    pub(crate) fn reserved(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}
