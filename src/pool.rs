//! Worker pool sizing heuristic.

use rayon::ThreadPool;

use crate::error::{LinkError, Result};

/// Number of logical CPUs, falling back to 1 when the query fails
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Threads chosen for `units_a * units_b` units of work: the full unit
/// count when the machine has headroom (`cpu * multiplier` exceeds it),
/// otherwise a fixed cap of `cpu * multiplier`.
pub fn pool_threads(units_a: usize, units_b: usize, multiplier: usize) -> usize {
    let cap = cpu_count().saturating_mul(multiplier.max(1));
    let units = units_a.saturating_mul(units_b);
    if cap > units {
        units.max(1)
    } else {
        cap.max(1)
    }
}

/// Build a worker pool sized for a two-sided workload. Small workloads get
/// one thread per unit; large Cartesian products are capped at
/// `cpu * multiplier` threads.
pub fn smart_pool(units_a: usize, units_b: usize, multiplier: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(pool_threads(units_a, units_b, multiplier))
        .build()
        .map_err(|e| LinkError::ThreadPool(e.to_string()))
}
