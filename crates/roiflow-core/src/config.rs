//! Execution configuration for the pooling operators
//!
//! Controls whether the kernels fan out over rayon workers and how the
//! backward scatter-add is partitioned. A process-wide default lives behind
//! [`get_pooling_config`] / [`set_pooling_config`]; every operator also has a
//! `_with_config` variant that takes an explicit configuration.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::sync::{OnceLock, RwLock};

/// Configuration for pooling kernel execution
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PoolingConfig {
    /// Run kernels on the rayon thread pool
    pub parallel: bool,
    /// Below this many regions the kernels stay on the calling thread
    pub min_parallel_rois: usize,
    /// Number of partial gradient buffers used by backward.
    ///
    /// Each buffer is a full `[N, C, H, W]` gradient, so peak memory is this
    /// count times the feature-map size. `None` means one per rayon worker,
    /// but never more than one per `min_parallel_rois` regions. A fixed value
    /// makes backward bit-for-bit reproducible across thread pool sizes.
    pub partial_buffers: Option<usize>,
}

impl Default for PoolingConfig {
    fn default() -> Self {
        Self {
            parallel: cfg!(feature = "parallel"),
            min_parallel_rois: 2,
            partial_buffers: None,
        }
    }
}

impl PoolingConfig {
    /// Single-threaded execution
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    /// Parallel execution with a fixed backward partition count
    pub fn deterministic(partitions: usize) -> Self {
        Self {
            parallel: cfg!(feature = "parallel"),
            min_parallel_rois: 2,
            partial_buffers: Some(partitions.max(1)),
        }
    }

    /// Whether a call over `num_rois` regions should use the thread pool
    pub fn use_parallel(&self, num_rois: usize) -> bool {
        cfg!(feature = "parallel") && self.parallel && num_rois >= self.min_parallel_rois.max(1)
    }

    /// Number of contiguous region partitions backward accumulates into
    pub fn backward_partitions(&self, num_rois: usize) -> usize {
        if !self.use_parallel(num_rois) {
            return 1;
        }
        let per_worker = || worker_count().min(num_rois / self.min_parallel_rois.max(1));
        self.partial_buffers
            .unwrap_or_else(per_worker)
            .clamp(1, num_rois.max(1))
    }
}

#[cfg(feature = "parallel")]
fn worker_count() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
fn worker_count() -> usize {
    1
}

static GLOBAL_POOLING_CONFIG: OnceLock<RwLock<PoolingConfig>> = OnceLock::new();

fn global_config() -> &'static RwLock<PoolingConfig> {
    GLOBAL_POOLING_CONFIG.get_or_init(|| RwLock::new(PoolingConfig::default()))
}

/// Get the global pooling configuration
pub fn get_pooling_config() -> PoolingConfig {
    global_config()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Set the global pooling configuration
pub fn set_pooling_config(config: PoolingConfig) {
    log::debug!("pooling config set to {:?}", config);
    *global_config()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
}

/// Scoped pooling configuration
///
/// Installs a configuration globally and restores the previous one on drop.
pub struct PoolingConfigScope {
    previous: PoolingConfig,
}

impl PoolingConfigScope {
    pub fn new(config: PoolingConfig) -> Self {
        let previous = get_pooling_config();
        set_pooling_config(config);
        Self { previous }
    }
}

impl Drop for PoolingConfigScope {
    fn drop(&mut self) {
        set_pooling_config(self.previous.clone());
    }
}
