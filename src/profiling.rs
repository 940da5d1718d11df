/*!
Exact-operation counters.

With the `profiling-exact` feature enabled, the decision layer counts
every dispatched operation and how many of them were exact (rounding
error zero), exposing how much of a workload round-to-nearest already
answers exactly. Without the feature the counters compile to nothing.
*/

#[cfg(feature = "profiling-exact")]
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "profiling-exact")]
static NUM_OPS: AtomicU64 = AtomicU64::new(0);

#[cfg(feature = "profiling-exact")]
static NUM_EXACT_OPS: AtomicU64 = AtomicU64::new(0);

/// Counts one dispatched operation.
#[inline]
pub fn count_op() {
    #[cfg(feature = "profiling-exact")]
    {
        let _ = NUM_OPS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counts one operation whose rounding error was exactly zero.
#[inline]
pub fn count_exact() {
    #[cfg(feature = "profiling-exact")]
    {
        let _ = NUM_EXACT_OPS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Resets both counters.
pub fn reset() {
    #[cfg(feature = "profiling-exact")]
    {
        NUM_OPS.store(0, Ordering::Relaxed);
        NUM_EXACT_OPS.store(0, Ordering::Relaxed);
    }
}

/// Returns `(total_ops, exact_ops)`. Both are zero when the feature is
/// disabled.
pub fn snapshot() -> (u64, u64) {
    #[cfg(feature = "profiling-exact")]
    {
        return (
            NUM_OPS.load(Ordering::Relaxed),
            NUM_EXACT_OPS.load(Ordering::Relaxed),
        );
    }
    #[cfg(not(feature = "profiling-exact"))]
    (0, 0)
}
