/// Concurrency management for Callweave.
/// Sizes rayon pools as a share of the machine so loading never takes
/// every core.

use anyhow::Result;
use tracing::info;

/// Workers for `ratio` of the available cores, minimum 1.
pub fn worker_count(ratio: f64) -> usize {
    let cores = num_cpus::get();
    let workers = (cores as f64 * ratio).floor() as usize;
    workers.clamp(1, cores.max(1))
}

/// Initialize the global rayon thread pool with controlled worker count.
pub fn init_thread_pool(ratio: f64) -> Result<usize> {
    let workers = worker_count(ratio);

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()?;

    info!(workers, cores = num_cpus::get(), "initialized thread pool");
    Ok(workers)
}
