//! Thread-pool setup.
//!
//! Shard loading runs on rayon; capacity is reserved for the host
//! editor, which stays on its own thread.

use anyhow::Result;

/// Initialize the global rayon pool with half the cores, minimum one
/// worker. Fails if a pool was already installed by the host.
pub fn init_thread_pool() -> Result<()> {
    let cores = num_cpus::get();
    let workers = std::cmp::max(1, cores / 2);

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()?;

    println!(
        "[fortrace] thread pool: {} workers ({} cores available)",
        workers, cores
    );

    Ok(())
}
