//! One-shot countdown rendezvous.

use parking_lot::{Condvar, Mutex};
use std::fmt;

/// A one-shot rendezvous point for a fixed number of parties.
///
/// Each party calls [`wait`](Self::wait); nobody returns until all
/// `count` parties have arrived. Unlike `std::sync::Barrier` this is
/// one-shot: once released it cannot be reused for a second round, and any
/// later arrival returns immediately.
///
/// Dropping a barrier before every party has arrived is a contract
/// violation, diagnosed in debug builds.
///
/// # Example
///
/// ```
/// use postwork::Barrier;
/// use std::sync::Arc;
///
/// let barrier = Arc::new(Barrier::new(2));
/// let other = Arc::clone(&barrier);
/// let thread = std::thread::spawn(move || other.wait());
/// barrier.wait();
/// thread.join().unwrap();
/// ```
pub struct Barrier {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl Barrier {
    /// Creates a barrier for exactly `count` parties.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero; a rendezvous of nobody is a contract
    /// violation.
    #[must_use]
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "barrier requires at least one party");
        Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    /// Arrives at the barrier and blocks until all parties have arrived.
    ///
    /// The call that brings the count to zero releases every waiter.
    /// Arrivals after release return immediately.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            drop(remaining);
            self.released.notify_all();
            return;
        }
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        debug_assert_eq!(
            *self.remaining.get_mut(),
            0,
            "barrier dropped before all parties arrived"
        );
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier")
            .field("remaining", &*self.remaining.lock())
            .finish()
    }
}
