//! Growable descriptor pool allocator.

use std::sync::Arc;

use ash::vk;

use crate::backend::GpuBackend;
use crate::config::DescriptorPoolConfig;
use crate::error::{RhiError, RhiResult};

/// Allocates descriptor sets from a list of pools, adding a pool whenever
/// the current one runs out.
///
/// Sets are never freed individually; [`reset`](Self::reset) recycles every
/// pool at once, which is only legal once the GPU no longer uses any set.
pub struct DescriptorSetAllocator {
    backend: Arc<dyn GpuBackend>,
    config: DescriptorPoolConfig,
    pools: Vec<vk::DescriptorPool>,
    current: usize,
}

impl DescriptorSetAllocator {
    pub fn new(backend: Arc<dyn GpuBackend>, config: DescriptorPoolConfig) -> Self {
        Self {
            backend,
            config,
            pools: Vec::new(),
            current: 0,
        }
    }

    /// Allocate one set of `layout`.
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        loop {
            let fresh = self.current == self.pools.len();
            if fresh {
                let pool = self
                    .backend
                    .create_descriptor_pool(self.config.max_sets, &self.config.pool_sizes)?;
                log::debug!("Created descriptor pool #{}", self.pools.len());
                self.pools.push(pool);
            }

            match self
                .backend
                .allocate_descriptor_set(self.pools[self.current], layout)
            {
                Ok(set) => return Ok(set),
                // A set that does not fit an empty pool never will.
                Err(RhiError::OutOfPoolMemory) if !fresh => {
                    log::trace!("Descriptor pool #{} exhausted", self.current);
                    self.current += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Return every allocated set to its pool.
    pub fn reset(&mut self) -> RhiResult<()> {
        for &pool in &self.pools {
            self.backend.reset_descriptor_pool(pool)?;
        }
        self.current = 0;
        Ok(())
    }

    /// Number of pools created so far.
    pub fn num_pools(&self) -> usize {
        self.pools.len()
    }
}

impl Drop for DescriptorSetAllocator {
    fn drop(&mut self) {
        for pool in self.pools.drain(..) {
            self.backend.destroy_descriptor_pool(pool);
        }
    }
}

impl std::fmt::Debug for DescriptorSetAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSetAllocator")
            .field("pools", &self.pools.len())
            .field("current", &self.current)
            .finish()
    }
}
