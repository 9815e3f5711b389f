//! GPU backend abstraction layer.
//!
//! This module hides the device/queue context behind the [`GpuBackend`]
//! trait, so resources and command buffers can be created, recorded and
//! submitted without knowing which implementation sits underneath.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: no GPU; records commands and simulates buffer memory
//!   for tests
//! - `VulkanBackend` (`vulkan-backend` feature): native Vulkan through ash and
//!   gpu-allocator
//!
//! Handles crossing this boundary are raw `ash::vk` handles. Ownership stays
//! with the RHI objects that created them ([`Texture`](crate::Texture),
//! [`Buffer`](crate::Buffer), ...), which hand them back for destruction.

pub mod dummy;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

use std::fmt;

use ash::vk;

use crate::error::RhiResult;
use crate::resources::{ComputePipelineDesc, GraphicsPipelineDesc};

pub use dummy::{DummyBackend, RecordedCommand};
#[cfg(feature = "vulkan-backend")]
pub use vulkan::VulkanBackend;

/// Device memory backing an image or buffer.
#[cfg(feature = "vulkan-backend")]
pub type DeviceAllocation = gpu_allocator::vulkan::Allocation;

/// Device memory backing an image or buffer (no allocator compiled in).
#[cfg(not(feature = "vulkan-backend"))]
#[derive(Debug)]
pub enum DeviceAllocation {}

/// Where a buffer's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryLocation {
    /// Device-local, not host visible.
    #[default]
    GpuOnly,
    /// Host visible, written by the CPU and read by the GPU.
    CpuToGpu,
    /// Host visible, written by the GPU and read back by the CPU.
    GpuToCpu,
}

impl MemoryLocation {
    pub fn is_host_visible(self) -> bool {
        !matches!(self, Self::GpuOnly)
    }
}

/// An image together with the memory bound to it.
///
/// The allocation is `None` for backends that do not allocate memory.
#[derive(Debug)]
pub struct AllocatedImage {
    pub handle: vk::Image,
    pub allocation: Option<DeviceAllocation>,
}

/// A buffer together with the memory bound to it.
#[derive(Debug)]
pub struct AllocatedBuffer {
    pub handle: vk::Buffer,
    pub size: u64,
    pub location: MemoryLocation,
    pub allocation: Option<DeviceAllocation>,
}

/// Handles backing one command buffer: its private pool, the buffer and the
/// fence signalled when a submission of it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBufferHandles {
    pub pool: vk::CommandPool,
    pub buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
}

/// The device boundary.
///
/// Object creation returns [`RhiResult`]; recording entry points (`cmd_*`)
/// cannot fail at record time and return nothing. Implementations must be
/// usable from several recording threads at once, as long as each command
/// buffer is recorded by one thread.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Optimal/linear tiling and buffer features of `format`.
    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties;

    // Images, views, samplers
    fn create_image(
        &self,
        info: &vk::ImageCreateInfo<'_>,
        name: &str,
    ) -> RhiResult<AllocatedImage>;
    fn destroy_image(&self, image: AllocatedImage);
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> RhiResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);
    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> RhiResult<vk::Sampler>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    // Buffers
    fn create_buffer(
        &self,
        info: &vk::BufferCreateInfo<'_>,
        location: MemoryLocation,
        name: &str,
    ) -> RhiResult<AllocatedBuffer>;
    fn destroy_buffer(&self, buffer: AllocatedBuffer);
    /// Write through a host-visible mapping.
    fn write_buffer(
        &self,
        buffer: &mut AllocatedBuffer,
        offset: u64,
        data: &[u8],
    ) -> RhiResult<()>;
    /// Read through a host-visible mapping.
    fn read_buffer(&self, buffer: &AllocatedBuffer, offset: u64, size: u64) -> RhiResult<Vec<u8>>;

    // Descriptors
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RhiResult<()>;
    /// Fails with [`RhiError::OutOfPoolMemory`](crate::RhiError::OutOfPoolMemory)
    /// when the pool is exhausted.
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RhiResult<vk::DescriptorSet>;
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]);

    // Pipelines
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_>,
        layout: vk::PipelineLayout,
    ) -> RhiResult<vk::Pipeline>;
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_>,
        layout: vk::PipelineLayout,
    ) -> RhiResult<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // Command buffers and submission
    /// Create a command buffer with its own pool and an unsignalled fence.
    fn create_command_buffer(&self) -> RhiResult<CommandBufferHandles>;
    fn destroy_command_buffer(&self, handles: CommandBufferHandles);
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> RhiResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> RhiResult<()>;
    /// Reset the pool (and with it the buffer) and unsignal the fence.
    fn reset_command_buffer(&self, handles: &CommandBufferHandles) -> RhiResult<()>;
    /// Submit a recorded buffer; `fence` is signalled on completion.
    fn submit(&self, cmd: vk::CommandBuffer, fence: vk::Fence) -> RhiResult<()>;
    /// Non-blocking fence query.
    fn fence_signaled(&self, fence: vk::Fence) -> RhiResult<bool>;
    /// Returns `false` if the timeout elapsed first.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> RhiResult<bool>;
    fn wait_idle(&self) -> RhiResult<()>;

    // Recording
    fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );
    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    );
    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );
    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, x: u32, y: u32, z: u32);
    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, info: &vk::RenderingInfo<'_>);
    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer);
    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport);
    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D);
    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64);
    fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    );
    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn cmd_fill_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        data: u32,
    );
    /// Inline update; `data` is at most [`MAX_INLINE_UPDATE_SIZE`] bytes.
    fn cmd_update_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        data: &[u8],
    );
    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );
    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    );
    fn cmd_clear_color_image(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: &vk::ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    );
    fn cmd_clear_depth_stencil_image(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: &vk::ClearDepthStencilValue,
        ranges: &[vk::ImageSubresourceRange],
    );
    #[allow(clippy::too_many_arguments)]
    fn cmd_blit_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    );
    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    );
    fn cmd_begin_debug_label(&self, cmd: vk::CommandBuffer, label: &str, color: [f32; 4]);
    fn cmd_end_debug_label(&self, cmd: vk::CommandBuffer);
}

/// Largest payload of a single inline buffer update (`vkCmdUpdateBuffer`).
pub const MAX_INLINE_UPDATE_SIZE: usize = 65536;

impl fmt::Debug for dyn GpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBackend")
            .field("name", &self.name())
            .finish()
    }
}
