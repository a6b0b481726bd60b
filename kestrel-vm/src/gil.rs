//! The global interpreter lock.
//!
//! One lock per [`crate::machine::Machine`] serializes every touch of the
//! object graph: refcount traffic, container mutation, slot dispatch and
//! the interpreter loop itself. A thread must hold the lock whenever it
//! runs engine code and must release it around anything that blocks
//! (sleeps, joins, blocking I/O). There is no preemption; the only
//! suspension points are explicit [`Gil::blocking`] regions.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Cooperative global lock. Not an RAII mutex: acquisition and release
/// are explicit so native code can drop the lock across a blocking call
/// and pick it back up afterwards, the way the interpreter expects.
#[derive(Debug, Default)]
pub struct Gil {
    held: Mutex<bool>,
    cv: Condvar,
}

impl Gil {
    /// New, unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is free, then take it.
    pub fn acquire(&self) {
        let mut held = self.held.lock();
        while *held {
            self.cv.wait(&mut held);
        }
        *held = true;
    }

    /// Release the lock, waking one waiter.
    pub fn release(&self) {
        let mut held = self.held.lock();
        debug_assert!(*held, "released a GIL that was not held");
        *held = false;
        self.cv.notify_one();
    }

    /// Run `f` with the lock released, reacquiring before returning.
    ///
    /// `f` must not touch the object graph: no allocation, no refcount
    /// traffic, no dispatch.
    pub fn blocking<R>(&self, f: impl FnOnce() -> R) -> R {
        self.release();
        let out = f();
        self.acquire();
        out
    }

    /// Sleep for `seconds` (fractional) with the lock released.
    pub fn sleep(&self, seconds: f64) {
        let dur = Duration::from_secs_f64(seconds.max(0.0));
        self.blocking(|| std::thread::sleep(dur));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn mutual_exclusion() {
        let gil = Arc::new(Gil::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let gil = gil.clone();
                let inside = inside.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        gil.acquire();
                        let seen = inside.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(seen, 0, "two threads inside the GIL");
                        inside.fetch_sub(1, Ordering::SeqCst);
                        gil.release();
                    }
                })
            })
            .collect();

        for w in workers {
            w.join().unwrap();
        }
    }

    #[test]
    fn blocking_releases_and_reacquires() {
        let gil = Arc::new(Gil::new());
        gil.acquire();

        let other = {
            let gil = gil.clone();
            std::thread::spawn(move || {
                gil.acquire();
                gil.release();
            })
        };

        // The other thread can only finish while we are inside `blocking`.
        gil.blocking(|| {
            other.join().unwrap();
        });
        gil.release();
    }
}
