//! Service ID allocation.
//!
//! Every command carries a one-byte SID that the PLC echoes back, which is
//! how replies are matched to requests. [`SidAllocator`] hands out SIDs in
//! increasing order, wrapping from 255 to 0. It is lock-free and safe to
//! share between threads; the session additionally skips SIDs that still
//! belong to an outstanding request.

use std::sync::atomic::{AtomicU8, Ordering};

/// Number of distinct SIDs.
pub const SID_SPACE: usize = 256;

/// Monotonic, wrapping SID counter.
#[derive(Debug, Default)]
pub struct SidAllocator {
    next: AtomicU8,
}

impl SidAllocator {
    /// Creates an allocator whose first SID is 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates an allocator whose first SID is `first`.
    pub fn starting_at(first: u8) -> Self {
        Self {
            next: AtomicU8::new(first),
        }
    }

    /// Returns the next SID. `fetch_add` on `AtomicU8` wraps on overflow.
    pub fn next(&self) -> u8 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the SID the next call to [`next`](Self::next) would yield.
    pub fn peek(&self) -> u8 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_sequential_and_wraps() {
        let sids = SidAllocator::starting_at(254);
        assert_eq!(sids.next(), 254);
        assert_eq!(sids.next(), 255);
        assert_eq!(sids.next(), 0);
        assert_eq!(sids.peek(), 1);
    }

    #[test]
    fn test_full_cycle_is_distinct() {
        let sids = SidAllocator::new();
        let seen: HashSet<u8> = (0..SID_SPACE).map(|_| sids.next()).collect();
        assert_eq!(seen.len(), SID_SPACE);
        assert_eq!(sids.next(), 0);
    }

    #[test]
    fn test_concurrent_allocation_is_distinct() {
        let sids = Arc::new(SidAllocator::new());
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sids = Arc::clone(&sids);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    for _ in 0..32 {
                        let sid = sids.next();
                        assert!(seen.lock().unwrap().insert(sid));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), SID_SPACE);
    }
}
