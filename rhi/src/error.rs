//! RHI error types.

use ash::vk;
use thiserror::Error;

/// Errors reported by the device boundary.
///
/// Contract violations (recording outside the `Recording` state, binding a
/// null resource, out-of-range view indices) are not represented here: they
/// panic at the call site.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RhiError {
    /// Failed to bring up the instance or device.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a GPU object.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of host or device memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// A descriptor pool has no room left for the requested set.
    #[error("descriptor pool exhausted")]
    OutOfPoolMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// A wait on the GPU did not complete in time.
    #[error("timed out waiting for the GPU")]
    Timeout,
    /// Any other Vulkan error code.
    #[error("vulkan call failed: {0:?}")]
    Vulkan(vk::Result),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate.
pub type RhiResult<T> = Result<T, RhiError>;

impl From<vk::Result> for RhiError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory
            }
            vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                Self::OutOfPoolMemory
            }
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::TIMEOUT => Self::Timeout,
            other => Self::Vulkan(other),
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl From<gpu_allocator::AllocationError> for RhiError {
    fn from(error: gpu_allocator::AllocationError) -> Self {
        match error {
            gpu_allocator::AllocationError::OutOfMemory => Self::OutOfMemory,
            other => Self::ResourceCreationFailed(format!("allocation failed: {other}")),
        }
    }
}
