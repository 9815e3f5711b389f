//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. It hands out unique fake handles,
//! counts live objects, records every command per command buffer and keeps a
//! byte array per buffer, so fills, inline updates and buffer copies can be
//! replayed when a command buffer is submitted.

use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{RhiError, RhiResult};
use crate::resources::{ComputePipelineDesc, GraphicsPipelineDesc};
use crate::types::{Extent2D, Rect2D};

use super::{AllocatedBuffer, AllocatedImage, CommandBufferHandles, GpuBackend, MemoryLocation};

/// A command captured by the [`DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    PushConstants {
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    BeginRendering {
        area: Rect2D,
        color_attachments: usize,
        depth_attachment: bool,
    },
    EndRendering,
    SetViewport {
        area: Rect2D,
    },
    SetScissor {
        area: Rect2D,
    },
    BindVertexBuffer {
        buffer: vk::Buffer,
        offset: u64,
    },
    BindIndexBuffer {
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    FillBuffer {
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        data: u32,
    },
    UpdateBuffer {
        buffer: vk::Buffer,
        offset: u64,
        data: Vec<u8>,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        /// `(src_offset, dst_offset, size)` per region.
        regions: Vec<(u64, u64, u64)>,
    },
    CopyBufferToImage {
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: usize,
    },
    ClearColorImage {
        image: vk::Image,
        layout: vk::ImageLayout,
    },
    ClearDepthStencilImage {
        image: vk::Image,
        layout: vk::ImageLayout,
    },
    BlitImage {
        src: vk::Image,
        dst: vk::Image,
        /// `(src_mip, dst_mip)` per region.
        mips: Vec<(u32, u32)>,
        filter: vk::Filter,
    },
    PipelineBarrier {
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        memory_barriers: usize,
        buffer_barriers: usize,
        /// `(image, old_layout, new_layout)` per image barrier.
        image_barriers: Vec<(vk::Image, vk::ImageLayout, vk::ImageLayout)>,
    },
    BeginDebugLabel {
        label: String,
    },
    EndDebugLabel,
}

/// Number of objects currently alive in a [`DummyBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub images: usize,
    pub image_views: usize,
    pub samplers: usize,
    pub buffers: usize,
    pub descriptor_set_layouts: usize,
    pub descriptor_pools: usize,
    pub pipeline_layouts: usize,
    pub pipelines: usize,
    pub command_buffers: usize,
}

#[derive(Debug)]
struct PoolState {
    max_sets: u32,
    allocated: u32,
}

#[derive(Debug, Default)]
struct DummyState {
    format_overrides: FxHashMap<vk::Format, vk::FormatFeatureFlags>,
    live: LiveObjects,
    pools: FxHashMap<vk::DescriptorPool, PoolState>,
    allocated_descriptor_sets: usize,
    descriptor_writes: usize,
    recordings: FxHashMap<vk::CommandBuffer, Vec<RecordedCommand>>,
    memory: FxHashMap<vk::Buffer, Vec<u8>>,
    fences: FxHashMap<vk::Fence, bool>,
    hold_submissions: bool,
    pending: Vec<(vk::CommandBuffer, vk::Fence)>,
    submissions: usize,
}

impl DummyState {
    fn record(&mut self, cmd: vk::CommandBuffer, command: RecordedCommand) {
        self.recordings.entry(cmd).or_default().push(command);
    }

    /// Replay the memory-affecting commands of `cmd` and signal `fence`.
    fn execute(&mut self, cmd: vk::CommandBuffer, fence: vk::Fence) {
        let commands = self.recordings.get(&cmd).cloned().unwrap_or_default();
        for command in commands {
            match command {
                RecordedCommand::UpdateBuffer {
                    buffer,
                    offset,
                    data,
                } => {
                    if let Some(memory) = self.memory.get_mut(&buffer) {
                        let start = offset as usize;
                        memory[start..start + data.len()].copy_from_slice(&data);
                    }
                }
                RecordedCommand::FillBuffer {
                    buffer,
                    offset,
                    size,
                    data,
                } => {
                    if let Some(memory) = self.memory.get_mut(&buffer) {
                        let start = offset as usize;
                        let end = if size == vk::WHOLE_SIZE {
                            memory.len()
                        } else {
                            start + size as usize
                        };
                        let pattern = data.to_le_bytes();
                        for (i, byte) in memory[start..end].iter_mut().enumerate() {
                            *byte = pattern[i % 4];
                        }
                    }
                }
                RecordedCommand::CopyBuffer { src, dst, regions } => {
                    for (src_offset, dst_offset, size) in regions {
                        let Some(bytes) = self.memory.get(&src).map(|memory| {
                            memory[src_offset as usize..(src_offset + size) as usize].to_vec()
                        }) else {
                            continue;
                        };
                        if let Some(memory) = self.memory.get_mut(&dst) {
                            let start = dst_offset as usize;
                            memory[start..start + bytes.len()].copy_from_slice(&bytes);
                        }
                    }
                }
                _ => {}
            }
        }
        self.fences.insert(fence, true);
    }
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_handle: AtomicU64,
    state: Mutex<DummyState>,
}

impl DummyBackend {
    /// Create a new dummy backend supporting every format for every usage.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn next<T: Handle>(&self) -> T {
        T::from_raw(self.next_raw())
    }

    /// Report `features` as the optimal-tiling features of `format`.
    pub fn set_format_features(&self, format: vk::Format, features: vk::FormatFeatureFlags) {
        self.state.lock().format_overrides.insert(format, features);
    }

    /// Keep submitted work pending until [`complete_submissions`](Self::complete_submissions).
    pub fn hold_submissions(&self, hold: bool) {
        self.state.lock().hold_submissions = hold;
    }

    /// Execute all held submissions and signal their fences.
    pub fn complete_submissions(&self) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        for (cmd, fence) in pending {
            state.execute(cmd, fence);
        }
    }

    pub fn live_objects(&self) -> LiveObjects {
        self.state.lock().live
    }

    /// Descriptor sets allocated since creation (resets do not lower this).
    pub fn allocated_descriptor_sets(&self) -> usize {
        self.state.lock().allocated_descriptor_sets
    }

    /// Descriptor writes issued since creation.
    pub fn descriptor_writes(&self) -> usize {
        self.state.lock().descriptor_writes
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    /// Commands recorded into `cmd` since it was last begun or reset.
    pub fn commands(&self, cmd: vk::CommandBuffer) -> Vec<RecordedCommand> {
        self.state
            .lock()
            .recordings
            .get(&cmd)
            .cloned()
            .unwrap_or_default()
    }

    /// Current simulated contents of `buffer`.
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
        self.state.lock().memory.get(&buffer).cloned()
    }
}

const ALL_FORMAT_FEATURES: vk::FormatFeatureFlags = vk::FormatFeatureFlags::from_raw(
    vk::FormatFeatureFlags::SAMPLED_IMAGE.as_raw()
        | vk::FormatFeatureFlags::STORAGE_IMAGE.as_raw()
        | vk::FormatFeatureFlags::COLOR_ATTACHMENT.as_raw()
        | vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT.as_raw()
        | vk::FormatFeatureFlags::BLIT_SRC.as_raw()
        | vk::FormatFeatureFlags::BLIT_DST.as_raw()
        | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR.as_raw()
        | vk::FormatFeatureFlags::TRANSFER_SRC.as_raw()
        | vk::FormatFeatureFlags::TRANSFER_DST.as_raw(),
);

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        let features = self
            .state
            .lock()
            .format_overrides
            .get(&format)
            .copied()
            .unwrap_or(ALL_FORMAT_FEATURES);
        vk::FormatProperties {
            linear_tiling_features: features,
            optimal_tiling_features: features,
            buffer_features: vk::FormatFeatureFlags::empty(),
        }
    }

    fn create_image(
        &self,
        info: &vk::ImageCreateInfo<'_>,
        name: &str,
    ) -> RhiResult<AllocatedImage> {
        log::trace!(
            "DummyBackend: creating image {name:?} ({}x{}x{}, {} mips, {} layers)",
            info.extent.width,
            info.extent.height,
            info.extent.depth,
            info.mip_levels,
            info.array_layers
        );
        self.state.lock().live.images += 1;
        Ok(AllocatedImage {
            handle: self.next(),
            allocation: None,
        })
    }

    fn destroy_image(&self, _image: AllocatedImage) {
        self.state.lock().live.images -= 1;
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> RhiResult<vk::ImageView> {
        self.state.lock().live.image_views += 1;
        Ok(self.next())
    }

    fn destroy_image_view(&self, _view: vk::ImageView) {
        self.state.lock().live.image_views -= 1;
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> RhiResult<vk::Sampler> {
        self.state.lock().live.samplers += 1;
        Ok(self.next())
    }

    fn destroy_sampler(&self, _sampler: vk::Sampler) {
        self.state.lock().live.samplers -= 1;
    }

    fn create_buffer(
        &self,
        info: &vk::BufferCreateInfo<'_>,
        location: MemoryLocation,
        name: &str,
    ) -> RhiResult<AllocatedBuffer> {
        log::trace!("DummyBackend: creating buffer {name:?} (size: {})", info.size);
        let handle: vk::Buffer = self.next();
        let mut state = self.state.lock();
        state.live.buffers += 1;
        state.memory.insert(handle, vec![0; info.size as usize]);
        Ok(AllocatedBuffer {
            handle,
            size: info.size,
            location,
            allocation: None,
        })
    }

    fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        let mut state = self.state.lock();
        state.live.buffers -= 1;
        state.memory.remove(&buffer.handle);
    }

    fn write_buffer(
        &self,
        buffer: &mut AllocatedBuffer,
        offset: u64,
        data: &[u8],
    ) -> RhiResult<()> {
        if !buffer.location.is_host_visible() {
            return Err(RhiError::Internal(
                "Buffer is not mapped for CPU access".to_string(),
            ));
        }
        let mut state = self.state.lock();
        let memory = state
            .memory
            .get_mut(&buffer.handle)
            .ok_or_else(|| RhiError::Internal("Unknown buffer".to_string()))?;
        let start = offset as usize;
        memory[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &AllocatedBuffer, offset: u64, size: u64) -> RhiResult<Vec<u8>> {
        if !buffer.location.is_host_visible() {
            return Err(RhiError::Internal(
                "Buffer is not mapped for CPU access".to_string(),
            ));
        }
        let state = self.state.lock();
        let memory = state
            .memory
            .get(&buffer.handle)
            .ok_or_else(|| RhiError::Internal("Unknown buffer".to_string()))?;
        Ok(memory[offset as usize..(offset + size) as usize].to_vec())
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<vk::DescriptorSetLayout> {
        self.state.lock().live.descriptor_set_layouts += 1;
        Ok(self.next())
    }

    fn destroy_descriptor_set_layout(&self, _layout: vk::DescriptorSetLayout) {
        self.state.lock().live.descriptor_set_layouts -= 1;
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        _pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<vk::DescriptorPool> {
        let pool = self.next();
        let mut state = self.state.lock();
        state.live.descriptor_pools += 1;
        state.pools.insert(
            pool,
            PoolState {
                max_sets,
                allocated: 0,
            },
        );
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state.lock();
        state.live.descriptor_pools -= 1;
        state.pools.remove(&pool);
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RhiResult<()> {
        if let Some(pool) = self.state.lock().pools.get_mut(&pool) {
            pool.allocated = 0;
        }
        Ok(())
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> RhiResult<vk::DescriptorSet> {
        let set = self.next();
        let mut state = self.state.lock();
        let pool = state
            .pools
            .get_mut(&pool)
            .ok_or_else(|| RhiError::Internal("Unknown descriptor pool".to_string()))?;
        if pool.allocated >= pool.max_sets {
            return Err(RhiError::OutOfPoolMemory);
        }
        pool.allocated += 1;
        state.allocated_descriptor_sets += 1;
        Ok(set)
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        self.state.lock().descriptor_writes += writes.len();
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[vk::DescriptorSetLayout],
        _push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<vk::PipelineLayout> {
        self.state.lock().live.pipeline_layouts += 1;
        Ok(self.next())
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {
        self.state.lock().live.pipeline_layouts -= 1;
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_>,
        _layout: vk::PipelineLayout,
    ) -> RhiResult<vk::Pipeline> {
        log::trace!("DummyBackend: creating compute pipeline {:?}", desc.label);
        self.state.lock().live.pipelines += 1;
        Ok(self.next())
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_>,
        _layout: vk::PipelineLayout,
    ) -> RhiResult<vk::Pipeline> {
        log::trace!("DummyBackend: creating graphics pipeline {:?}", desc.label);
        self.state.lock().live.pipelines += 1;
        Ok(self.next())
    }

    fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.state.lock().live.pipelines -= 1;
    }

    fn create_command_buffer(&self) -> RhiResult<CommandBufferHandles> {
        let handles = CommandBufferHandles {
            pool: self.next(),
            buffer: self.next(),
            fence: self.next(),
        };
        let mut state = self.state.lock();
        state.live.command_buffers += 1;
        state.fences.insert(handles.fence, false);
        Ok(handles)
    }

    fn destroy_command_buffer(&self, handles: CommandBufferHandles) {
        let mut state = self.state.lock();
        state.live.command_buffers -= 1;
        state.recordings.remove(&handles.buffer);
        state.fences.remove(&handles.fence);
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> RhiResult<()> {
        self.state.lock().recordings.insert(cmd, Vec::new());
        Ok(())
    }

    fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> RhiResult<()> {
        Ok(())
    }

    fn reset_command_buffer(&self, handles: &CommandBufferHandles) -> RhiResult<()> {
        let mut state = self.state.lock();
        state.recordings.remove(&handles.buffer);
        state.fences.insert(handles.fence, false);
        Ok(())
    }

    fn submit(&self, cmd: vk::CommandBuffer, fence: vk::Fence) -> RhiResult<()> {
        let mut state = self.state.lock();
        state.submissions += 1;
        if state.hold_submissions {
            state.pending.push((cmd, fence));
        } else {
            state.execute(cmd, fence);
        }
        Ok(())
    }

    fn fence_signaled(&self, fence: vk::Fence) -> RhiResult<bool> {
        Ok(self.state.lock().fences.get(&fence).copied().unwrap_or(false))
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> RhiResult<bool> {
        // Held work never completes on its own, so a wait reports the timeout.
        self.fence_signaled(fence)
    }

    fn wait_idle(&self) -> RhiResult<()> {
        Ok(())
    }

    fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::BindPipeline {
                bind_point,
                pipeline,
            },
        );
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::BindDescriptorSets {
                bind_point,
                first_set,
                sets: sets.to_vec(),
            },
        );
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::PushConstants {
                stages,
                offset,
                data: data.to_vec(),
            },
        );
    }

    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::Dispatch { x, y, z });
    }

    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, info: &vk::RenderingInfo<'_>) {
        self.state.lock().record(
            cmd,
            RecordedCommand::BeginRendering {
                area: rect_from_vk(info.render_area),
                color_attachments: info.color_attachment_count as usize,
                depth_attachment: !info.p_depth_attachment.is_null(),
            },
        );
    }

    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer) {
        self.state.lock().record(cmd, RecordedCommand::EndRendering);
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        let area = Rect2D::new(
            viewport.x as i32,
            viewport.y as i32,
            Extent2D::new(viewport.width as u32, viewport.height as u32),
        );
        self.state
            .lock()
            .record(cmd, RecordedCommand::SetViewport { area });
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.state.lock().record(
            cmd,
            RecordedCommand::SetScissor {
                area: rect_from_vk(scissor),
            },
        );
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::BindVertexBuffer { buffer, offset });
    }

    fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::BindIndexBuffer {
                buffer,
                offset,
                index_type,
            },
        );
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            },
        );
    }

    fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            },
        );
    }

    fn cmd_fill_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        data: u32,
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::FillBuffer {
                buffer,
                offset,
                size,
                data,
            },
        );
    }

    fn cmd_update_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        data: &[u8],
    ) {
        assert!(
            data.len() <= super::MAX_INLINE_UPDATE_SIZE,
            "inline update of {} bytes exceeds the API limit",
            data.len()
        );
        self.state.lock().record(
            cmd,
            RecordedCommand::UpdateBuffer {
                buffer,
                offset,
                data: data.to_vec(),
            },
        );
    }

    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        let regions = regions
            .iter()
            .map(|r| (r.src_offset, r.dst_offset, r.size))
            .collect();
        self.state
            .lock()
            .record(cmd, RecordedCommand::CopyBuffer { src, dst, regions });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::CopyBufferToImage {
                src,
                dst,
                dst_layout,
                regions: regions.len(),
            },
        );
    }

    fn cmd_clear_color_image(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        _color: &vk::ClearColorValue,
        _ranges: &[vk::ImageSubresourceRange],
    ) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::ClearColorImage { image, layout });
    }

    fn cmd_clear_depth_stencil_image(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        _value: &vk::ClearDepthStencilValue,
        _ranges: &[vk::ImageSubresourceRange],
    ) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::ClearDepthStencilImage { image, layout });
    }

    fn cmd_blit_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        _src_layout: vk::ImageLayout,
        dst: vk::Image,
        _dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        let mips = regions
            .iter()
            .map(|r| (r.src_subresource.mip_level, r.dst_subresource.mip_level))
            .collect();
        self.state.lock().record(
            cmd,
            RecordedCommand::BlitImage {
                src,
                dst,
                mips,
                filter,
            },
        );
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        let image_barriers = image_barriers
            .iter()
            .map(|b| (b.image, b.old_layout, b.new_layout))
            .collect();
        self.state.lock().record(
            cmd,
            RecordedCommand::PipelineBarrier {
                src_stage,
                dst_stage,
                memory_barriers: memory_barriers.len(),
                buffer_barriers: buffer_barriers.len(),
                image_barriers,
            },
        );
    }

    fn cmd_begin_debug_label(&self, cmd: vk::CommandBuffer, label: &str, _color: [f32; 4]) {
        self.state.lock().record(
            cmd,
            RecordedCommand::BeginDebugLabel {
                label: label.to_string(),
            },
        );
    }

    fn cmd_end_debug_label(&self, cmd: vk::CommandBuffer) {
        self.state.lock().record(cmd, RecordedCommand::EndDebugLabel);
    }
}

fn rect_from_vk(rect: vk::Rect2D) -> Rect2D {
    Rect2D::new(rect.offset.x, rect.offset.y, rect.extent.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let backend = DummyBackend::new();
        let a: vk::Image = backend.next();
        let b: vk::Image = backend.next();
        assert_ne!(a, b);
        assert_ne!(a, vk::Image::null());
    }

    #[test]
    fn test_format_override() {
        let backend = DummyBackend::new();
        backend.set_format_features(vk::Format::R8_UNORM, vk::FormatFeatureFlags::SAMPLED_IMAGE);
        let props = backend.format_properties(vk::Format::R8_UNORM);
        assert_eq!(
            props.optimal_tiling_features,
            vk::FormatFeatureFlags::SAMPLED_IMAGE
        );
        let props = backend.format_properties(vk::Format::R8G8B8A8_UNORM);
        assert!(
            props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::STORAGE_IMAGE)
        );
    }

    #[test]
    fn test_pool_exhaustion() {
        let backend = DummyBackend::new();
        let pool = backend.create_descriptor_pool(1, &[]).unwrap();
        let layout = vk::DescriptorSetLayout::null();
        assert!(backend.allocate_descriptor_set(pool, layout).is_ok());
        assert_eq!(
            backend.allocate_descriptor_set(pool, layout),
            Err(RhiError::OutOfPoolMemory)
        );
        backend.reset_descriptor_pool(pool).unwrap();
        assert!(backend.allocate_descriptor_set(pool, layout).is_ok());
        assert_eq!(backend.allocated_descriptor_sets(), 2);
    }

    #[test]
    fn test_submit_replays_updates() {
        let backend = DummyBackend::new();
        let info = vk::BufferCreateInfo::default().size(8);
        let buffer = backend
            .create_buffer(&info, MemoryLocation::GpuOnly, "test")
            .unwrap();
        let handles = backend.create_command_buffer().unwrap();
        backend.begin_command_buffer(handles.buffer).unwrap();
        backend.cmd_fill_buffer(handles.buffer, buffer.handle, 0, vk::WHOLE_SIZE, 0x0101_0101);
        backend.cmd_update_buffer(handles.buffer, buffer.handle, 4, &[9, 9]);
        backend.end_command_buffer(handles.buffer).unwrap();

        assert_eq!(backend.buffer_contents(buffer.handle), Some(vec![0; 8]));
        backend.submit(handles.buffer, handles.fence).unwrap();
        assert_eq!(
            backend.buffer_contents(buffer.handle),
            Some(vec![1, 1, 1, 1, 9, 9, 1, 1])
        );
        assert!(backend.fence_signaled(handles.fence).unwrap());
    }
}
