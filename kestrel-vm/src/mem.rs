//! Process-wide object accounting.
//!
//! Every object construction and drop is recorded here, giving the same
//! current/peak picture the original tracking allocator kept by stamping
//! sizes ahead of each allocation. Rust's allocator owns the memory
//! itself; this module only observes it.

use std::sync::atomic::{AtomicUsize, Ordering};

static LIVE_OBJECTS: AtomicUsize = AtomicUsize::new(0);
static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);

/// Record an object of approximately `bytes` payload coming alive.
pub(crate) fn on_alloc(bytes: usize) {
    LIVE_OBJECTS.fetch_add(1, Ordering::Relaxed);
    let now = LIVE_BYTES.fetch_add(bytes, Ordering::Relaxed) + bytes;
    PEAK_BYTES.fetch_max(now, Ordering::Relaxed);
}

/// Record an object of approximately `bytes` payload being freed.
pub(crate) fn on_free(bytes: usize) {
    LIVE_OBJECTS.fetch_sub(1, Ordering::Relaxed);
    LIVE_BYTES.fetch_sub(bytes, Ordering::Relaxed);
}

/// Snapshot of the allocation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemStats {
    /// Objects currently alive.
    pub live_objects: usize,
    /// Approximate payload bytes currently alive.
    pub live_bytes: usize,
    /// High-water mark of [`MemStats::live_bytes`].
    pub peak_bytes: usize,
}

/// Read the current allocation counters.
pub fn stats() -> MemStats {
    MemStats {
        live_objects: LIVE_OBJECTS.load(Ordering::Relaxed),
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        peak_bytes: PEAK_BYTES.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    // Other tests allocate concurrently, so the assertions use a batch
    // large enough to dominate any unrelated churn.
    #[test]
    fn alloc_and_free_move_the_counters() {
        const BATCH: usize = 10_000;

        let before = stats();
        let batch: Vec<Value> = (0..BATCH)
            .map(|i| Value::str(format!("memory accounting probe {i}")))
            .collect();
        let during = stats();
        assert!(during.live_objects >= before.live_objects + BATCH);
        assert!(during.live_bytes > before.live_bytes);
        assert!(during.peak_bytes >= during.live_bytes);

        drop(batch);
        let after = stats();
        assert!(after.live_objects < during.live_objects);
        assert!(after.peak_bytes >= before.peak_bytes);
    }
}
