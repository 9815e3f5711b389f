//! Render device.
//!
//! The [`RenderDevice`] is the entry point for creating GPU resources and
//! command buffers and for submitting recorded work.

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::backend::{DummyBackend, GpuBackend, MemoryLocation};
use crate::command::CommandBuffer;
use crate::config::RhiConfig;
use crate::error::RhiResult;
use crate::profiling::profile_scope;
use crate::resources::{
    Buffer, ComputePipelineDesc, DescriptorBinding, DescriptorSetLayout, GraphicsPipelineDesc,
    IndexBuffer, IndexType, Pipeline, Texture, TextureShape, VertexBuffer,
};
use crate::types::{BufferUsage, Extent2D, ImageUsage, PixelFormat, SamplerInfo};

/// A device for creating GPU resources and submitting command buffers.
///
/// `RenderDevice` is `Send + Sync`; resources created from it may be used
/// from any thread. Samplers are owned by the device and shared between
/// textures, so the device must outlive every texture holding one.
///
/// # Example
///
/// ```ignore
/// let device = RenderDevice::new(RhiConfig::from_env())?;
/// let texture = TextureBuilder::new()
///     .extent(Extent2D::new(256, 256))
///     .pixel_format(PixelFormat::Rgba8Unorm)
///     .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST)
///     .build(&device)?;
/// ```
pub struct RenderDevice {
    backend: Arc<dyn GpuBackend>,
    config: RhiConfig,
    samplers: Mutex<FxHashMap<SamplerInfo, vk::Sampler>>,
}

impl RenderDevice {
    /// Bring up a Vulkan device.
    #[cfg(feature = "vulkan-backend")]
    pub fn new(config: RhiConfig) -> RhiResult<Self> {
        let backend = crate::backend::VulkanBackend::new(&config)?;
        Ok(Self::with_backend(Arc::new(backend), config))
    }

    /// Wrap an existing backend.
    pub fn with_backend(backend: Arc<dyn GpuBackend>, config: RhiConfig) -> Self {
        log::info!("RenderDevice using {}", backend.name());
        Self {
            backend,
            config,
            samplers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Device over a [`DummyBackend`], for tests and headless tooling.
    pub fn dummy() -> Self {
        Self::with_backend(Arc::new(DummyBackend::new()), RhiConfig::default())
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn config(&self) -> &RhiConfig {
        &self.config
    }

    /// Whether `format` supports every feature `usage` requires with
    /// optimal tiling.
    pub fn is_format_supported(&self, format: PixelFormat, usage: ImageUsage) -> bool {
        if format == PixelFormat::Undefined {
            return false;
        }
        let required = usage.required_format_features(format);
        let properties = self.backend.format_properties(format.to_vk());
        properties.optimal_tiling_features.contains(required)
    }

    // Textures

    /// Create a 2-D texture, arrayed when `num_layers > 0`.
    ///
    /// A zero `num_mip_levels` selects the full mip chain.
    pub fn create_texture_2d(
        &self,
        extent: Extent2D,
        format: PixelFormat,
        num_mip_levels: u32,
        num_layers: u32,
        usage: ImageUsage,
    ) -> RhiResult<Texture> {
        self.create_texture_2d_named(extent, format, num_mip_levels, num_layers, usage, "texture")
    }

    pub fn create_texture_2d_named(
        &self,
        extent: Extent2D,
        format: PixelFormat,
        num_mip_levels: u32,
        num_layers: u32,
        usage: ImageUsage,
        name: &str,
    ) -> RhiResult<Texture> {
        let shape = TextureShape {
            extent,
            depth: 0,
            format,
            num_mip_levels,
            num_layers,
            num_faces: 1,
            usage,
        };
        Texture::allocate(&self.backend, shape, name)
    }

    /// Create a 3-D texture.
    pub fn create_texture_3d(
        &self,
        extent: Extent2D,
        depth: u32,
        format: PixelFormat,
        num_mip_levels: u32,
        usage: ImageUsage,
    ) -> RhiResult<Texture> {
        self.create_texture_3d_named(extent, depth, format, num_mip_levels, usage, "texture_3d")
    }

    pub fn create_texture_3d_named(
        &self,
        extent: Extent2D,
        depth: u32,
        format: PixelFormat,
        num_mip_levels: u32,
        usage: ImageUsage,
        name: &str,
    ) -> RhiResult<Texture> {
        assert!(depth > 0, "3-D texture {:?} needs a non-zero depth", name);
        let shape = TextureShape {
            extent,
            depth,
            format,
            num_mip_levels,
            num_layers: 0,
            num_faces: 1,
            usage,
        };
        Texture::allocate(&self.backend, shape, name)
    }

    /// Create a cube map, a cube array when `num_layers > 0`.
    ///
    /// # Panics
    ///
    /// Panics if `extent` is not square.
    pub fn create_cubemap(
        &self,
        extent: Extent2D,
        format: PixelFormat,
        num_mip_levels: u32,
        num_layers: u32,
        usage: ImageUsage,
    ) -> RhiResult<Texture> {
        self.create_cubemap_named(extent, format, num_mip_levels, num_layers, usage, "cubemap")
    }

    pub fn create_cubemap_named(
        &self,
        extent: Extent2D,
        format: PixelFormat,
        num_mip_levels: u32,
        num_layers: u32,
        usage: ImageUsage,
        name: &str,
    ) -> RhiResult<Texture> {
        let shape = TextureShape {
            extent,
            depth: 0,
            format,
            num_mip_levels,
            num_layers,
            num_faces: 6,
            usage,
        };
        Texture::allocate(&self.backend, shape, name)
    }

    /// Wrap a swapchain image. The image itself stays owned by the swapchain.
    pub fn wrap_swapchain_image(
        &self,
        image: vk::Image,
        extent: Extent2D,
        format: PixelFormat,
    ) -> RhiResult<Texture> {
        Texture::wrap_external(&self.backend, image, extent, format)
    }

    // Samplers

    /// Device-owned sampler for `info`, created on first request.
    pub fn get_sampler(&self, info: &SamplerInfo) -> RhiResult<vk::Sampler> {
        let mut samplers = self.samplers.lock();
        if let Some(&sampler) = samplers.get(info) {
            return Ok(sampler);
        }
        let sampler = self.backend.create_sampler(&info.to_vk())?;
        log::debug!("Created sampler {:?} for {:?}", sampler, info);
        samplers.insert(*info, sampler);
        Ok(sampler)
    }

    /// Attach the sampler for `info` to `texture`.
    pub fn setup_sampler(&self, texture: &mut Texture, info: &SamplerInfo) -> RhiResult<()> {
        texture.set_sampler(self.get_sampler(info)?);
        Ok(())
    }

    /// Number of distinct samplers created so far.
    pub fn sampler_count(&self) -> usize {
        self.samplers.lock().len()
    }

    // Buffers

    pub fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        location: MemoryLocation,
        label: &str,
    ) -> RhiResult<Buffer> {
        Buffer::new(&self.backend, size, usage, location, label)
    }

    /// GPU-only vertex buffer of `vertex_count` vertices, filled by transfers.
    pub fn create_vertex_buffer(
        &self,
        vertex_count: u32,
        stride: u32,
        label: &str,
    ) -> RhiResult<VertexBuffer> {
        let buffer = self.create_buffer(
            u64::from(vertex_count) * u64::from(stride),
            BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            label,
        )?;
        Ok(VertexBuffer::new(buffer, stride))
    }

    /// GPU-only index buffer of `index_count` indices, filled by transfers.
    pub fn create_index_buffer(
        &self,
        index_count: u32,
        index_type: IndexType,
        label: &str,
    ) -> RhiResult<IndexBuffer> {
        let buffer = self.create_buffer(
            u64::from(index_count) * u64::from(index_type.size()),
            BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            label,
        )?;
        Ok(IndexBuffer::new(buffer, index_type))
    }

    // Layouts and pipelines

    pub fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> RhiResult<DescriptorSetLayout> {
        DescriptorSetLayout::new(&self.backend, bindings)
    }

    pub fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_>,
    ) -> RhiResult<Arc<Pipeline>> {
        profile_scope!("RenderDevice::create_compute_pipeline");
        Pipeline::new_compute(&self.backend, desc).map(Arc::new)
    }

    pub fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> RhiResult<Arc<Pipeline>> {
        profile_scope!("RenderDevice::create_graphics_pipeline");
        Pipeline::new_graphics(&self.backend, desc).map(Arc::new)
    }

    // Command buffers

    pub fn create_command_buffer(&self) -> RhiResult<CommandBuffer> {
        CommandBuffer::new(&self.backend, &self.config)
    }

    /// Submit a recorded command buffer; it becomes `Pending` until its
    /// fence signals.
    ///
    /// # Panics
    ///
    /// Panics unless the buffer is `Executable`.
    pub fn submit(&self, command_buffer: &mut CommandBuffer) -> RhiResult<()> {
        profile_scope!("RenderDevice::submit");
        assert_eq!(
            command_buffer.state(),
            crate::command::CommandBufferState::Executable,
            "only an Executable command buffer can be submitted"
        );
        self.backend
            .submit(command_buffer.handle(), command_buffer.fence())?;
        command_buffer.mark_pending();
        log::trace!("Submitted command buffer {:?}", command_buffer.handle());
        Ok(())
    }

    /// Block until the GPU is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.backend.wait_idle()
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        for (_, sampler) in self.samplers.get_mut().drain() {
            self.backend.destroy_sampler(sampler);
        }
    }
}

impl std::fmt::Debug for RenderDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDevice")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("samplers", &self.samplers.lock().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AddressMode, TextureType};
    use rstest::rstest;

    #[rstest]
    #[case::color_sampled(PixelFormat::Rgba8Unorm, ImageUsage::SAMPLED, true)]
    #[case::undefined(PixelFormat::Undefined, ImageUsage::SAMPLED, false)]
    fn test_format_support(
        #[case] format: PixelFormat,
        #[case] usage: ImageUsage,
        #[case] expected: bool,
    ) {
        let device = RenderDevice::dummy();
        assert_eq!(device.is_format_supported(format, usage), expected);
    }

    #[test]
    fn test_format_support_requires_every_feature() {
        let dummy = Arc::new(DummyBackend::new());
        dummy.set_format_features(
            vk::Format::R8G8B8A8_UNORM,
            vk::FormatFeatureFlags::SAMPLED_IMAGE,
        );
        let device = RenderDevice::with_backend(dummy, RhiConfig::default());
        assert!(device.is_format_supported(PixelFormat::Rgba8Unorm, ImageUsage::SAMPLED));
        assert!(!device.is_format_supported(
            PixelFormat::Rgba8Unorm,
            ImageUsage::SAMPLED | ImageUsage::STORAGE
        ));
    }

    #[test]
    fn test_samplers_are_shared() {
        let device = RenderDevice::dummy();
        let a = device.get_sampler(&SamplerInfo::optimal(4)).unwrap();
        let b = device.get_sampler(&SamplerInfo::optimal(4)).unwrap();
        let c = device
            .get_sampler(&SamplerInfo::optimal(4).with_address_mode(AddressMode::ClampToEdge))
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(device.sampler_count(), 2);
    }

    #[test]
    fn test_samplers_destroyed_with_device() {
        let dummy = Arc::new(DummyBackend::new());
        let device = RenderDevice::with_backend(dummy.clone(), RhiConfig::default());
        device.get_sampler(&SamplerInfo::default()).unwrap();
        assert_eq!(dummy.live_objects().samplers, 1);
        drop(device);
        assert_eq!(dummy.live_objects().samplers, 0);
    }

    #[test]
    fn test_cubemap_path() {
        let device = RenderDevice::dummy();
        let texture = device
            .create_cubemap(
                Extent2D::square(32),
                PixelFormat::Rgba16Float,
                1,
                0,
                ImageUsage::SAMPLED,
            )
            .unwrap();
        assert_eq!(texture.texture_type(), TextureType::TextureCube);
        assert_eq!(texture.array_layers(), 6);
    }

    #[test]
    fn test_buffer_helpers() {
        let device = RenderDevice::dummy();
        let vertices = device.create_vertex_buffer(10, 32, "quad").unwrap();
        assert_eq!(vertices.buffer().size(), 320);
        let indices = device
            .create_index_buffer(6, IndexType::U32, "quad_indices")
            .unwrap();
        assert_eq!(indices.capacity(), 6);
        assert!(indices.buffer().usage().contains(BufferUsage::TRANSFER_DST));
    }
}
