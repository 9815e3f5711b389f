//! Command buffer recording.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use bitflags::bitflags;
use bytemuck::Pod;

use super::framebuffer::{ClearValue, FramebufferInfo, GeometryInfo};
use crate::backend::{CommandBufferHandles, GpuBackend, MAX_INLINE_UPDATE_SIZE};
use crate::barrier::BarrierBuilder;
use crate::config::RhiConfig;
use crate::descriptor::{DescriptorSetBuilder, ResourceBindings};
use crate::error::RhiResult;
use crate::profiling::{DynamicSpan, profile_scope, profile_scope_dynamic};
use crate::resources::{Buffer, Pipeline, PipelineKind, Texture};
use crate::types::{BufferUsage, ImageLayout, ImageUsage, Rect2D, TexelFilter};

/// Lifecycle state of a [`CommandBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    /// Unusable; only seen while the buffer is torn down.
    Invalid,
    /// Ready to begin recording.
    Initial,
    /// Between `begin` and `end`.
    Recording,
    /// Recorded and ready to submit.
    Executable,
    /// Submitted; the GPU may still be executing it.
    Pending,
}

bitflags! {
    /// Recording context an operation requires.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InvariantFlags: u32 {
        /// A pipeline is bound.
        const VALID_PIPELINE = 1 << 0;
        /// The bound pipeline is a graphics pipeline.
        const GRAPHICS = 1 << 1;
        /// The bound pipeline is a compute pipeline.
        const COMPUTE = 1 << 2;
        /// A render pass is open.
        const INSIDE_RENDER_PASS = 1 << 3;
        /// No render pass is open.
        const OUTSIDE_RENDER_PASS = 1 << 4;

        const VALID_GRAPHICS_PIPELINE = Self::VALID_PIPELINE.bits() | Self::GRAPHICS.bits();
        const VALID_COMPUTE_PIPELINE = Self::VALID_PIPELINE.bits() | Self::COMPUTE.bits();
    }
}

/// Push constant range recorded before a pipeline was bound.
#[derive(Debug)]
struct DeferredPushConstants {
    stages: vk::ShaderStageFlags,
    offset: u32,
    data: Vec<u8>,
}

const DEBUG_LABEL_COLOR: [f32; 4] = [0.4, 0.7, 1.0, 1.0];

/// A single recordable command stream.
///
/// Every recording operation panics unless the buffer is in the
/// [`Recording`](CommandBufferState::Recording) state and the operation's
/// [`InvariantFlags`] hold. Each buffer owns its command pool, fence,
/// [`BarrierBuilder`] and [`DescriptorSetBuilder`], so buffers can be
/// recorded on different threads independently.
///
/// ```ignore
/// let mut cmd = device.create_command_buffer()?;
/// cmd.begin()?;
/// cmd.bind_pipeline(&pipeline);
/// cmd.bind_resources(&bindings)?;
/// cmd.dispatch(8, 8, 1);
/// cmd.end()?;
/// device.submit(&mut cmd)?;
/// cmd.wait(Duration::from_secs(1))?;
/// ```
pub struct CommandBuffer {
    backend: Arc<dyn GpuBackend>,
    handles: CommandBufferHandles,
    state: CommandBufferState,
    debug_labels: bool,
    pipeline: Option<Arc<Pipeline>>,
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    inside_render_pass: bool,
    deferred_sets: BTreeMap<u32, vk::DescriptorSet>,
    deferred_push_constants: Vec<DeferredPushConstants>,
    barriers: BarrierBuilder,
    descriptors: DescriptorSetBuilder,
}

impl CommandBuffer {
    pub(crate) fn new(backend: &Arc<dyn GpuBackend>, config: &RhiConfig) -> RhiResult<Self> {
        let handles = backend.create_command_buffer()?;
        log::trace!("Created command buffer {:?}", handles.buffer);
        Ok(Self {
            backend: Arc::clone(backend),
            handles,
            state: CommandBufferState::Initial,
            debug_labels: config.debug_labels,
            pipeline: None,
            vertex_buffer: vk::Buffer::null(),
            index_buffer: vk::Buffer::null(),
            inside_render_pass: false,
            deferred_sets: BTreeMap::new(),
            deferred_push_constants: Vec::new(),
            barriers: BarrierBuilder::new(),
            descriptors: DescriptorSetBuilder::new(
                Arc::clone(backend),
                config.descriptor_pool.clone(),
            ),
        })
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub fn handle(&self) -> vk::CommandBuffer {
        self.handles.buffer
    }

    /// Fence signalled when the last submission completes.
    pub fn fence(&self) -> vk::Fence {
        self.handles.fence
    }

    /// Context flags that currently hold.
    pub fn invariants(&self) -> InvariantFlags {
        let mut flags = if self.inside_render_pass {
            InvariantFlags::INSIDE_RENDER_PASS
        } else {
            InvariantFlags::OUTSIDE_RENDER_PASS
        };
        if let Some(pipeline) = &self.pipeline {
            flags |= match pipeline.kind() {
                PipelineKind::Graphics => InvariantFlags::VALID_GRAPHICS_PIPELINE,
                PipelineKind::Compute => InvariantFlags::VALID_COMPUTE_PIPELINE,
            };
        }
        flags
    }

    fn check(&self, operation: &str, required: InvariantFlags) {
        assert_eq!(
            self.state,
            CommandBufferState::Recording,
            "{}() requires the Recording state",
            operation
        );
        let missing = required - self.invariants();
        assert!(
            missing.is_empty(),
            "{}() requires {:?}",
            operation,
            missing
        );
    }

    fn clear_bound_state(&mut self) {
        self.pipeline = None;
        self.vertex_buffer = vk::Buffer::null();
        self.index_buffer = vk::Buffer::null();
        self.inside_render_pass = false;
        self.deferred_sets.clear();
        self.deferred_push_constants.clear();
    }

    // Lifecycle

    /// Start recording. Requires the `Initial` state.
    pub fn begin(&mut self) -> RhiResult<()> {
        assert_eq!(
            self.state,
            CommandBufferState::Initial,
            "begin() requires the Initial state"
        );
        self.backend.begin_command_buffer(self.handles.buffer)?;
        self.clear_bound_state();
        self.state = CommandBufferState::Recording;
        log::trace!("Begin command buffer {:?}", self.handles.buffer);
        Ok(())
    }

    /// Finish recording. Pending barriers are flushed first.
    pub fn end(&mut self) -> RhiResult<()> {
        self.check("end", InvariantFlags::OUTSIDE_RENDER_PASS);
        self.flush_barriers();
        self.backend.end_command_buffer(self.handles.buffer)?;
        self.state = CommandBufferState::Executable;
        log::trace!("End command buffer {:?}", self.handles.buffer);
        Ok(())
    }

    /// Return to the `Initial` state, recycling descriptor pools.
    ///
    /// # Panics
    ///
    /// Panics unless the buffer is `Executable`, or `Pending` with a
    /// signalled fence.
    pub fn reset(&mut self) -> RhiResult<()> {
        profile_scope!("CommandBuffer::reset");
        match self.state {
            CommandBufferState::Executable => {}
            CommandBufferState::Pending => assert!(
                self.backend.fence_signaled(self.handles.fence)?,
                "reset() while the GPU is still executing the command buffer"
            ),
            state => panic!("reset() requires the Executable or Pending state, not {:?}", state),
        }
        self.backend.reset_command_buffer(&self.handles)?;
        self.descriptors.reset()?;
        self.barriers.clear();
        self.clear_bound_state();
        self.state = CommandBufferState::Initial;
        log::trace!("Reset command buffer {:?}", self.handles.buffer);
        Ok(())
    }

    pub(crate) fn mark_pending(&mut self) {
        assert_eq!(
            self.state,
            CommandBufferState::Executable,
            "submit requires the Executable state"
        );
        self.state = CommandBufferState::Pending;
    }

    /// Whether a submission of this buffer has finished on the GPU.
    pub fn is_complete(&self) -> RhiResult<bool> {
        if self.state != CommandBufferState::Pending {
            return Ok(false);
        }
        self.backend.fence_signaled(self.handles.fence)
    }

    /// Block until the submission finishes. Returns `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> RhiResult<bool> {
        assert_eq!(
            self.state,
            CommandBufferState::Pending,
            "wait() requires a submitted command buffer"
        );
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        self.backend.wait_for_fence(self.handles.fence, timeout_ns)
    }

    // Pipeline state

    /// Bind `pipeline` and replay descriptor sets and push constants
    /// recorded before any pipeline was bound.
    pub fn bind_pipeline(&mut self, pipeline: &Arc<Pipeline>) {
        self.check("bind_pipeline", InvariantFlags::empty());
        let bind_point = pipeline.kind().bind_point();
        if self
            .pipeline
            .as_ref()
            .is_none_or(|bound| bound.handle() != pipeline.handle())
        {
            self.backend
                .cmd_bind_pipeline(self.handles.buffer, bind_point, pipeline.handle());
        }
        self.pipeline = Some(Arc::clone(pipeline));

        for (set, descriptor_set) in std::mem::take(&mut self.deferred_sets) {
            self.backend.cmd_bind_descriptor_sets(
                self.handles.buffer,
                bind_point,
                pipeline.layout(),
                set,
                &[descriptor_set],
            );
        }
        for push in std::mem::take(&mut self.deferred_push_constants) {
            self.backend.cmd_push_constants(
                self.handles.buffer,
                pipeline.layout(),
                push.stages,
                push.offset,
                &push.data,
            );
        }
    }

    /// Bind a descriptor set at `index`, deferred until a pipeline is bound.
    pub fn bind_descriptor_set(&mut self, index: u32, set: vk::DescriptorSet) {
        self.check("bind_descriptor_set", InvariantFlags::empty());
        assert!(
            set != vk::DescriptorSet::null(),
            "null descriptor set bound at index {}",
            index
        );
        match &self.pipeline {
            Some(pipeline) => self.backend.cmd_bind_descriptor_sets(
                self.handles.buffer,
                pipeline.kind().bind_point(),
                pipeline.layout(),
                index,
                &[set],
            ),
            None => {
                self.deferred_sets.insert(index, set);
            }
        }
    }

    /// Build and bind every set of `bindings` against the bound pipeline's
    /// descriptor set layouts.
    pub fn bind_resources(&mut self, bindings: &ResourceBindings<'_>) -> RhiResult<()> {
        self.check("bind_resources", InvariantFlags::VALID_PIPELINE);
        profile_scope!("CommandBuffer::bind_resources");
        let pipeline = Arc::clone(
            self.pipeline
                .as_ref()
                .unwrap_or_else(|| unreachable!("pipeline presence is checked by invariants")),
        );
        for (set, slots) in bindings.sets() {
            for (&slot, resource) in slots {
                self.descriptors.bind(slot, *resource);
            }
            let descriptor_set = self.descriptors.build(pipeline.set_layout(set))?;
            self.bind_descriptor_set(set, descriptor_set);
        }
        Ok(())
    }

    /// Upload push constants, deferred until a pipeline is bound.
    ///
    /// `offset` and the data length must be multiples of 4.
    pub fn push_constants(&mut self, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        self.check("push_constants", InvariantFlags::empty());
        assert!(
            offset % 4 == 0 && data.len() % 4 == 0 && !data.is_empty(),
            "push constant range {}+{} is not a non-empty multiple of 4",
            offset,
            data.len()
        );
        match &self.pipeline {
            Some(pipeline) => self.backend.cmd_push_constants(
                self.handles.buffer,
                pipeline.layout(),
                stages,
                offset,
                data,
            ),
            None => self.deferred_push_constants.push(DeferredPushConstants {
                stages,
                offset,
                data: data.to_vec(),
            }),
        }
    }

    /// Upload one plain-data value as push constants.
    pub fn push_constant<T: Pod>(&mut self, stages: vk::ShaderStageFlags, offset: u32, value: &T) {
        self.push_constants(stages, offset, bytemuck::bytes_of(value));
    }

    // Compute

    /// Dispatch compute work groups. Pending barriers are flushed first.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.check(
            "dispatch",
            InvariantFlags::VALID_COMPUTE_PIPELINE | InvariantFlags::OUTSIDE_RENDER_PASS,
        );
        self.flush_barriers();
        self.backend.cmd_dispatch(self.handles.buffer, x, y, z);
    }

    /// Bind `pipeline` and dispatch.
    pub fn dispatch_pipeline(&mut self, pipeline: &Arc<Pipeline>, x: u32, y: u32, z: u32) {
        self.bind_pipeline(pipeline);
        self.dispatch(x, y, z);
    }

    // Rendering

    /// Open a render pass over `framebuffer`.
    ///
    /// Pending barriers are flushed first, and viewport and scissor are set
    /// to the render area. Attachments must already be in attachment
    /// layouts, see [`prepare_for_attachment`](super::prepare_for_attachment).
    pub fn begin_rendering(&mut self, framebuffer: &FramebufferInfo<'_>) {
        self.check("begin_rendering", InvariantFlags::OUTSIDE_RENDER_PASS);
        profile_scope!("CommandBuffer::begin_rendering");
        assert!(
            !framebuffer.color_attachments.is_empty() || framebuffer.depth_attachment.is_some(),
            "render pass without attachments"
        );
        self.flush_barriers();

        let color_attachments: Vec<_> = framebuffer
            .color_attachments
            .iter()
            .map(|attachment| {
                let layout = attachment.texture.layout();
                assert!(
                    matches!(layout, ImageLayout::ColorAttachment | ImageLayout::General),
                    "color attachment is in {:?}",
                    layout
                );
                attachment.to_vk(layout.to_vk())
            })
            .collect();

        let depth = framebuffer.depth_attachment.map(|attachment| {
            let layout = attachment.texture.layout();
            assert!(
                layout.is_depth_stencil() || layout == ImageLayout::General,
                "depth attachment is in {:?}",
                layout
            );
            (
                attachment.to_vk(layout.to_vk()),
                attachment.texture.format().has_stencil(),
            )
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(framebuffer.area.to_vk())
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some((depth_attachment, has_stencil)) = &depth {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
            if *has_stencil {
                rendering_info = rendering_info.stencil_attachment(depth_attachment);
            }
        }

        self.backend
            .cmd_begin_rendering(self.handles.buffer, &rendering_info);
        self.inside_render_pass = true;
        self.set_viewport(framebuffer.area);
        self.set_scissor(framebuffer.area);
    }

    pub fn end_rendering(&mut self) {
        self.check("end_rendering", InvariantFlags::INSIDE_RENDER_PASS);
        self.backend.cmd_end_rendering(self.handles.buffer);
        self.inside_render_pass = false;
    }

    pub fn set_viewport(&mut self, area: Rect2D) {
        self.check("set_viewport", InvariantFlags::empty());
        self.backend
            .cmd_set_viewport(self.handles.buffer, area.to_viewport());
    }

    pub fn set_scissor(&mut self, area: Rect2D) {
        self.check("set_scissor", InvariantFlags::empty());
        self.backend.cmd_set_scissor(self.handles.buffer, area.to_vk());
    }

    /// Draw `geometry` `instances` times.
    ///
    /// Vertex and index buffers are rebound only when they change; an index
    /// buffer selects an indexed draw.
    pub fn draw(&mut self, geometry: &GeometryInfo<'_>, instances: u32) {
        self.check(
            "draw",
            InvariantFlags::VALID_GRAPHICS_PIPELINE | InvariantFlags::INSIDE_RENDER_PASS,
        );
        let cmd = self.handles.buffer;

        if let Some(vertex_buffer) = geometry.vertex_buffer {
            let handle = vertex_buffer.buffer().handle();
            if handle != self.vertex_buffer {
                self.backend.cmd_bind_vertex_buffer(cmd, handle, 0);
                self.vertex_buffer = handle;
            }
        }

        match geometry.index_buffer {
            Some(index_buffer) => {
                let handle = index_buffer.buffer().handle();
                if handle != self.index_buffer {
                    self.backend.cmd_bind_index_buffer(
                        cmd,
                        handle,
                        0,
                        index_buffer.index_type().to_vk(),
                    );
                    self.index_buffer = handle;
                }
                self.backend.cmd_draw_indexed(
                    cmd,
                    geometry.index_count,
                    instances,
                    geometry.first_index,
                    geometry.vertex_offset,
                    0,
                );
            }
            None => self.backend.cmd_draw(
                cmd,
                geometry.vertex_count,
                instances,
                geometry.first_vertex,
                0,
            ),
        }
    }

    /// One triangle covering the viewport, positions generated in the shader.
    pub fn draw_full_screen_triangle(&mut self) {
        self.draw(&GeometryInfo::procedural(3), 1);
    }

    /// A unit cube of 36 generated vertices.
    pub fn draw_cube(&mut self) {
        self.draw(&GeometryInfo::procedural(36), 1);
    }

    // Transfer

    /// Fill the whole buffer with a repeated 32-bit value.
    pub fn clear_buffer(&mut self, buffer: &Buffer, value: u32) {
        self.check("clear_buffer", InvariantFlags::OUTSIDE_RENDER_PASS);
        check_buffer_usage(buffer, BufferUsage::TRANSFER_DST);
        self.flush_barriers();
        self.backend
            .cmd_fill_buffer(self.handles.buffer, buffer.handle(), 0, vk::WHOLE_SIZE, value);
    }

    /// Clear every mip and layer of `texture`, leaving it in `TransferDst`.
    pub fn clear_texture(&mut self, texture: &mut Texture, value: ClearValue) {
        self.check("clear_texture", InvariantFlags::OUTSIDE_RENDER_PASS);
        check_texture_usage(texture, ImageUsage::TRANSFER_DST);
        self.barriers.image_barrier(texture, ImageLayout::TransferDst);
        self.flush_barriers();

        let range = whole_range(texture);
        let cmd = self.handles.buffer;
        let layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        match value {
            ClearValue::Color(float32) => {
                assert!(
                    !texture.format().is_depth_stencil(),
                    "color clear of depth texture {:?}",
                    texture.format()
                );
                self.backend.cmd_clear_color_image(
                    cmd,
                    texture.image(),
                    layout,
                    &vk::ClearColorValue { float32 },
                    &[range],
                );
            }
            ClearValue::DepthStencil { depth, stencil } => {
                assert!(
                    texture.format().is_depth_stencil(),
                    "depth clear of color texture {:?}",
                    texture.format()
                );
                self.backend.cmd_clear_depth_stencil_image(
                    cmd,
                    texture.image(),
                    layout,
                    &vk::ClearDepthStencilValue { depth, stencil },
                    &[range],
                );
            }
        }
    }

    /// Copy `region` from `src` to `dst`.
    pub fn copy_buffer(&mut self, src: &Buffer, dst: &Buffer, region: vk::BufferCopy) {
        self.check("copy_buffer", InvariantFlags::OUTSIDE_RENDER_PASS);
        check_buffer_usage(src, BufferUsage::TRANSFER_SRC);
        check_buffer_usage(dst, BufferUsage::TRANSFER_DST);
        check_buffer_range(src, region.src_offset, region.size);
        check_buffer_range(dst, region.dst_offset, region.size);
        self.flush_barriers();
        self.backend
            .cmd_copy_buffer(self.handles.buffer, src.handle(), dst.handle(), &[region]);
    }

    /// Upload tightly packed texels for mip 0 of every layer.
    pub fn copy_buffer_to_texture(&mut self, src: &Buffer, dst: &mut Texture) {
        let extent = dst.mip_extent(0);
        let required = u64::from(extent.width)
            * u64::from(extent.height)
            * u64::from(extent.depth)
            * u64::from(dst.array_layers())
            * u64::from(dst.format().block_size());
        assert!(
            src.size() >= required,
            "buffer {:?} holds {} bytes, texture upload needs {}",
            src.label(),
            src.size(),
            required
        );
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: dst.array_layers(),
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: extent.depth,
            });
        self.copy_buffer_to_texture_regions(src, dst, &[region]);
    }

    /// Upload `regions` into `dst`, leaving it in `TransferDst`.
    pub fn copy_buffer_to_texture_regions(
        &mut self,
        src: &Buffer,
        dst: &mut Texture,
        regions: &[vk::BufferImageCopy],
    ) {
        self.check(
            "copy_buffer_to_texture",
            InvariantFlags::OUTSIDE_RENDER_PASS,
        );
        check_buffer_usage(src, BufferUsage::TRANSFER_SRC);
        check_texture_usage(dst, ImageUsage::TRANSFER_DST);
        assert!(
            !dst.format().is_depth_stencil(),
            "buffer uploads into depth textures are not supported"
        );
        for region in regions {
            assert!(
                region.image_subresource.mip_level < dst.num_mip_levels(),
                "copy into mip {} of a texture with {} mips",
                region.image_subresource.mip_level,
                dst.num_mip_levels()
            );
            assert!(
                region.buffer_offset < src.size(),
                "copy source offset {} exceeds buffer {:?}",
                region.buffer_offset,
                src.label()
            );
        }

        self.barriers.image_barrier(dst, ImageLayout::TransferDst);
        self.flush_barriers();
        self.backend.cmd_copy_buffer_to_image(
            self.handles.buffer,
            src.handle(),
            dst.image(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            regions,
        );
    }

    /// Write `data` into `buffer` at `offset` from the command stream.
    ///
    /// Payloads larger than the inline update limit are split into
    /// consecutive updates. `offset` and the length must be multiples of 4.
    pub fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) {
        self.check("update_buffer", InvariantFlags::OUTSIDE_RENDER_PASS);
        check_buffer_usage(buffer, BufferUsage::TRANSFER_DST);
        assert!(
            offset % 4 == 0 && data.len() % 4 == 0,
            "buffer update {}+{} is not 4-byte aligned",
            offset,
            data.len()
        );
        check_buffer_range(buffer, offset, data.len() as u64);
        self.flush_barriers();

        for (i, chunk) in data.chunks(MAX_INLINE_UPDATE_SIZE).enumerate() {
            let chunk_offset = offset + (i * MAX_INLINE_UPDATE_SIZE) as u64;
            self.backend
                .cmd_update_buffer(self.handles.buffer, buffer.handle(), chunk_offset, chunk);
        }
    }

    /// Scale mip 0 of `src` onto mip 0 of `dst`, all layers.
    ///
    /// Leaves `src` in `TransferSrc` and `dst` in `TransferDst`.
    pub fn blit(&mut self, src: &mut Texture, dst: &mut Texture, filter: TexelFilter) {
        self.check("blit", InvariantFlags::OUTSIDE_RENDER_PASS);
        check_texture_usage(src, ImageUsage::TRANSFER_SRC);
        check_texture_usage(dst, ImageUsage::TRANSFER_DST);
        assert_eq!(
            src.array_layers(),
            dst.array_layers(),
            "blit between textures with different layer counts"
        );

        self.barriers.image_barrier(src, ImageLayout::TransferSrc);
        self.barriers.image_barrier(dst, ImageLayout::TransferDst);
        self.flush_barriers();

        let region = blit_region(src, 0, dst, 0);
        self.backend.cmd_blit_image(
            self.handles.buffer,
            src.image(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            dst.image(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
            filter.to_vk(),
        );
    }

    /// Fill mips 1.. of `texture` by successively downscaling mip 0.
    ///
    /// Leaves every mip in `TransferSrc`.
    pub fn generate_mipmaps(&mut self, texture: &mut Texture, filter: TexelFilter) {
        self.check("generate_mipmaps", InvariantFlags::OUTSIDE_RENDER_PASS);
        check_texture_usage(texture, ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST);
        profile_scope!("CommandBuffer::generate_mipmaps");

        self.barriers.image_barrier(texture, ImageLayout::TransferDst);
        self.flush_barriers();
        let image = texture.image();
        let cmd = self.handles.buffer;
        for level in 1..texture.num_mip_levels() {
            self.barriers.image_subresource_barrier(
                image,
                mip_range(texture, level - 1),
                ImageLayout::TransferDst,
                ImageLayout::TransferSrc,
            );
            self.flush_barriers();
            let region = blit_region(texture, level - 1, texture, level);
            self.backend.cmd_blit_image(
                cmd,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                filter.to_vk(),
            );
        }

        let last = texture.num_mip_levels() - 1;
        self.barriers.image_subresource_barrier(
            image,
            mip_range(texture, last),
            ImageLayout::TransferDst,
            ImageLayout::TransferSrc,
        );
        self.flush_barriers();
        texture.set_layout(ImageLayout::TransferSrc);
    }

    // Synchronization

    /// Emit every pending barrier.
    pub fn flush_barriers(&mut self) {
        self.check("flush_barriers", InvariantFlags::OUTSIDE_RENDER_PASS);
        self.barriers
            .flush(self.backend.as_ref(), self.handles.buffer);
    }

    /// Full pipeline barrier between everything before and after.
    ///
    /// Masks missing barriers instead of fixing them.
    #[deprecated(note = "register the precise transition with the barrier builder")]
    pub fn insert_fat_barrier_unchecked(&mut self) {
        log::warn!(
            "Fat barrier inserted into command buffer {:?}",
            self.handles.buffer
        );
        self.check(
            "insert_fat_barrier_unchecked",
            InvariantFlags::OUTSIDE_RENDER_PASS,
        );
        self.barriers.full_barrier();
        self.flush_barriers();
    }

    pub fn barrier_builder(&mut self) -> &mut BarrierBuilder {
        &mut self.barriers
    }

    pub fn descriptor_set_builder(&mut self) -> &mut DescriptorSetBuilder {
        &mut self.descriptors
    }

    // Debugging

    /// Open a labelled debug region closed when the guard drops.
    ///
    /// The label reaches GPU tools when debug labels are enabled and the
    /// CPU profiler when profiling is compiled in.
    pub fn debug_group(&mut self, label: &str) -> DebugGroup<'_> {
        self.check("debug_group", InvariantFlags::empty());
        let span = profile_scope_dynamic!(label);
        if self.debug_labels {
            self.backend
                .cmd_begin_debug_label(self.handles.buffer, label, DEBUG_LABEL_COLOR);
        }
        let labelled = self.debug_labels;
        DebugGroup {
            command_buffer: self,
            labelled,
            _span: span,
        }
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        if self.state == CommandBufferState::Pending {
            match self.backend.fence_signaled(self.handles.fence) {
                Ok(true) => {}
                _ => {
                    log::warn!(
                        "Command buffer {:?} dropped while executing, waiting for it",
                        self.handles.buffer
                    );
                    if let Err(e) = self.backend.wait_for_fence(self.handles.fence, u64::MAX) {
                        log::error!("Failed to wait for command buffer: {}", e);
                    }
                }
            }
        }
        self.state = CommandBufferState::Invalid;
        self.backend.destroy_command_buffer(self.handles);
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handles.buffer)
            .field("state", &self.state)
            .field("invariants", &self.invariants())
            .field("pending_barriers", &self.barriers.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandBuffer: Send, Sync);

/// Debug region guard returned by [`CommandBuffer::debug_group`].
///
/// Dereferences to the command buffer so recording continues through it.
pub struct DebugGroup<'a> {
    command_buffer: &'a mut CommandBuffer,
    labelled: bool,
    _span: DynamicSpan,
}

impl Deref for DebugGroup<'_> {
    type Target = CommandBuffer;

    fn deref(&self) -> &CommandBuffer {
        self.command_buffer
    }
}

impl DerefMut for DebugGroup<'_> {
    fn deref_mut(&mut self) -> &mut CommandBuffer {
        self.command_buffer
    }
}

impl Drop for DebugGroup<'_> {
    fn drop(&mut self) {
        if self.labelled {
            self.command_buffer
                .backend
                .cmd_end_debug_label(self.command_buffer.handles.buffer);
        }
    }
}

fn check_buffer_usage(buffer: &Buffer, usage: BufferUsage) {
    assert!(
        buffer.usage().contains(usage),
        "buffer {:?} lacks {:?} usage",
        buffer.label(),
        usage
    );
}

fn check_buffer_range(buffer: &Buffer, offset: u64, size: u64) {
    assert!(
        buffer.contains_range(offset, size),
        "range {}+{} exceeds buffer {:?} of {} bytes",
        offset,
        size,
        buffer.label(),
        buffer.size()
    );
}

fn check_texture_usage(texture: &Texture, usage: ImageUsage) {
    assert!(texture.is_valid(), "operation on an invalid texture");
    assert!(
        texture.usage().contains(usage),
        "texture lacks {} usage",
        usage
    );
}

fn whole_range(texture: &Texture) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: texture.aspect_mask(),
        base_mip_level: 0,
        level_count: texture.num_mip_levels(),
        base_array_layer: 0,
        layer_count: texture.array_layers(),
    }
}

fn mip_range(texture: &Texture, level: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        base_mip_level: level,
        level_count: 1,
        ..whole_range(texture)
    }
}

fn blit_region(src: &Texture, src_mip: u32, dst: &Texture, dst_mip: u32) -> vk::ImageBlit {
    let corner = |texture: &Texture, mip| {
        let extent = texture.mip_extent(mip);
        vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: extent.depth as i32,
        }
    };
    let layers = |texture: &Texture, mip_level| vk::ImageSubresourceLayers {
        aspect_mask: texture.aspect_mask(),
        mip_level,
        base_array_layer: 0,
        layer_count: texture.array_layers(),
    };
    vk::ImageBlit {
        src_subresource: layers(src, src_mip),
        src_offsets: [vk::Offset3D::default(), corner(src, src_mip)],
        dst_subresource: layers(dst, dst_mip),
        dst_offsets: [vk::Offset3D::default(), corner(dst, dst_mip)],
    }
}
