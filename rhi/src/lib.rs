//! # RedLilium RHI
//!
//! Thin Vulkan render hardware interface for RedLilium.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderDevice`] - creates textures, buffers, layouts, pipelines and
//!   command buffers, and submits recorded work
//! - [`Texture`] / [`TextureBuilder`] - images with their per-mip and
//!   per-layer views, tracked layout and optional sampler
//! - [`CommandBuffer`] - recording state machine with automatic barrier
//!   batching and descriptor set building
//! - [`BarrierBuilder`] - batched image, buffer and memory barriers
//! - [`DescriptorSetBuilder`] - validated, cached descriptor sets
//! - [`backend`] - the [`GpuBackend`](backend::GpuBackend) seam with Vulkan and
//!   Dummy (for testing) implementations
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_rhi::*;
//!
//! let device = RenderDevice::new(RhiConfig::from_env())?;
//! let mut texture = TextureBuilder::new()
//!     .extent(Extent2D::new(256, 256))
//!     .pixel_format(PixelFormat::Rgba8Unorm)
//!     .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST | ImageUsage::TRANSFER_SRC)
//!     .build(&device)?;
//!
//! let mut cb = device.create_command_buffer()?;
//! cb.begin()?;
//! cb.generate_mipmaps(&mut texture, TexelFilter::Linear);
//! prepare_for_reading(&mut cb, &mut texture);
//! cb.end()?;
//! device.submit(&mut cb)?;
//! ```

pub mod profiling;

pub mod backend;
mod barrier;
mod command;
mod config;
mod descriptor;
mod device;
mod error;
mod resources;
pub mod types;

pub use backend::MemoryLocation;
pub use barrier::BarrierBuilder;
pub use command::{
    AttachmentInfo, ClearValue, CommandBuffer, CommandBufferState, DebugGroup, FramebufferInfo,
    GeometryInfo, InvariantFlags, LoadOp, prepare_for_attachment, prepare_for_reading,
};
pub use config::{DEBUG_LABELS_ENV, DescriptorPoolConfig, RhiConfig, VALIDATION_ENV};
pub use descriptor::{
    DescriptorSetAllocator, DescriptorSetBuilder, DescriptorSetCache, ResourceBinding,
    ResourceBindings,
};
pub use device::RenderDevice;
pub use error::{RhiError, RhiResult};
pub use resources::{
    BlendMode, Buffer, ComputePipelineDesc, DescriptorBinding, DescriptorSetLayout,
    GraphicsPipelineDesc, IndexBuffer, IndexType, Pipeline, PipelineKind, PipelineLayoutDesc,
    ShaderStage, Texture, TextureBuilder, VertexAttribute, VertexBuffer,
};
pub use types::*;

/// Raw Vulkan bindings, re-exported so callers use the same `ash` version.
pub use ash::vk;

/// RHI library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_device() {
        let device = RenderDevice::dummy();
        assert_eq!(device.backend().name(), "Dummy Backend");
    }
}
