//! Worker pool configuration for the parallel permutation loop.
//!
//! A single shared pool serves runs that do not request an explicit worker
//! count; it is sized to the host's logical cores minus one, keeping a
//! margin for the coordinating thread. All numeric kernels inside a
//! permutation are single-threaded, so the pool size is the only source of
//! parallelism and cannot oversubscribe the host.

#[cfg(feature = "parallel")]
use rayon::ThreadPool;

#[cfg(feature = "parallel")]
use std::sync::OnceLock;

#[cfg(feature = "parallel")]
static THREAD_POOL: OnceLock<ThreadPool> = OnceLock::new();

/// Default worker count: logical cores minus one, at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
}

#[cfg(feature = "parallel")]
fn shared_pool() -> &'static ThreadPool {
    THREAD_POOL.get_or_init(|| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(default_workers())
            .stack_size(8 * 1024 * 1024)
            .build()
            .expect("failed to build shared thread pool")
    })
}

/// Execute `op` on the worker pool.
///
/// `workers = None` uses the shared pool; an explicit count builds a
/// dedicated pool for this run.
#[cfg(feature = "parallel")]
pub fn install<OP, R>(workers: Option<usize>, op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    match workers {
        None => shared_pool().install(op),
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n.max(1))
            .stack_size(8 * 1024 * 1024)
            .build()
            .expect("failed to build dedicated thread pool")
            .install(op),
    }
}

/// Serial fallback when the `parallel` feature is disabled.
#[cfg(not(feature = "parallel"))]
pub fn install<OP, R>(_workers: Option<usize>, op: OP) -> R
where
    OP: FnOnce() -> R,
{
    op()
}
