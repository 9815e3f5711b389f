//! Batched pipeline barriers.
//!
//! A [`BarrierBuilder`] collects image layout transitions, buffer barriers
//! and global memory barriers, then emits all of them with a single
//! `vkCmdPipelineBarrier` when flushed. Stage masks are the union over every
//! pending barrier.

use ash::vk;

use crate::backend::GpuBackend;
use crate::profiling::profile_scope;
use crate::resources::{Buffer, Texture};
use crate::types::{BufferAccess, ImageLayout};

#[derive(Debug, Clone, Copy)]
struct ImageBarrierInfo {
    image: vk::Image,
    old_layout: ImageLayout,
    new_layout: ImageLayout,
    range: vk::ImageSubresourceRange,
    /// Whole-image transitions of one image are merged before a flush.
    whole: bool,
}

#[derive(Debug, Clone, Copy)]
struct BufferBarrierInfo {
    buffer: vk::Buffer,
    offset: u64,
    size: u64,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
}

/// Accumulates barriers until [`flush`](Self::flush).
#[derive(Debug, Default)]
pub struct BarrierBuilder {
    image_barriers: Vec<ImageBarrierInfo>,
    buffer_barriers: Vec<BufferBarrierInfo>,
    memory_access: Option<(vk::AccessFlags, vk::AccessFlags)>,
    src_stage_mask: vk::PipelineStageFlags,
    dst_stage_mask: vk::PipelineStageFlags,
}

impl BarrierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition the whole texture to `new_layout`.
    ///
    /// The texture's tracked layout is updated immediately; the transition
    /// takes effect on the GPU at the next flush. Nothing is recorded when the
    /// layout does not change and neither side writes.
    pub fn image_barrier(&mut self, texture: &mut Texture, new_layout: ImageLayout) {
        assert!(texture.is_valid(), "barrier on an empty texture");

        let old_layout = texture.layout();
        if old_layout == new_layout && !new_layout.is_writable() {
            return;
        }
        texture.set_layout(new_layout);

        let image = texture.image();
        if let Some(pending) = self
            .image_barriers
            .iter_mut()
            .find(|b| b.whole && b.image == image)
        {
            // Collapse into one transition from the first old layout.
            pending.new_layout = new_layout;
        } else {
            self.image_barriers.push(ImageBarrierInfo {
                image,
                old_layout,
                new_layout,
                range: vk::ImageSubresourceRange {
                    aspect_mask: texture.aspect_mask(),
                    base_mip_level: 0,
                    level_count: vk::REMAINING_MIP_LEVELS,
                    base_array_layer: 0,
                    layer_count: vk::REMAINING_ARRAY_LAYERS,
                },
                whole: true,
            });
        }
        self.src_stage_mask |= old_layout.src_stage();
        self.dst_stage_mask |= new_layout.dst_stage();
    }

    /// Transition a mip/layer range of an image.
    ///
    /// Tracked texture state is not touched; the caller is responsible for
    /// leaving the texture in the layout it records afterwards.
    pub fn image_subresource_barrier(
        &mut self,
        image: vk::Image,
        range: vk::ImageSubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        assert!(image != vk::Image::null(), "barrier on a null image");
        self.image_barriers.push(ImageBarrierInfo {
            image,
            old_layout,
            new_layout,
            range,
            whole: false,
        });
        self.src_stage_mask |= old_layout.src_stage();
        self.dst_stage_mask |= new_layout.dst_stage();
    }

    /// Order `src` accesses of the whole buffer before `dst` accesses.
    pub fn buffer_barrier(&mut self, buffer: &Buffer, src: BufferAccess, dst: BufferAccess) {
        self.buffer_range_barrier(buffer.handle(), 0, vk::WHOLE_SIZE, src, dst);
    }

    /// Order `src` accesses of a buffer range before `dst` accesses.
    pub fn buffer_range_barrier(
        &mut self,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        src: BufferAccess,
        dst: BufferAccess,
    ) {
        assert!(buffer != vk::Buffer::null(), "barrier on a null buffer");
        self.buffer_barriers.push(BufferBarrierInfo {
            buffer,
            offset,
            size,
            src_access: src.access_mask(),
            dst_access: dst.access_mask(),
        });
        self.src_stage_mask |= src.stage();
        self.dst_stage_mask |= dst.stage();
    }

    /// Global memory dependency between two access kinds.
    pub fn memory_barrier(&mut self, src: BufferAccess, dst: BufferAccess) {
        self.add_memory_barrier(
            src.access_mask(),
            src.stage(),
            dst.access_mask(),
            dst.stage(),
        );
    }

    /// Wait for everything before, block everything after.
    pub(crate) fn full_barrier(&mut self) {
        let access = vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE;
        self.add_memory_barrier(
            access,
            vk::PipelineStageFlags::ALL_COMMANDS,
            access,
            vk::PipelineStageFlags::ALL_COMMANDS,
        );
    }

    fn add_memory_barrier(
        &mut self,
        src_access: vk::AccessFlags,
        src_stage: vk::PipelineStageFlags,
        dst_access: vk::AccessFlags,
        dst_stage: vk::PipelineStageFlags,
    ) {
        let (src, dst) = self
            .memory_access
            .unwrap_or((vk::AccessFlags::empty(), vk::AccessFlags::empty()));
        self.memory_access = Some((src | src_access, dst | dst_access));
        self.src_stage_mask |= src_stage;
        self.dst_stage_mask |= dst_stage;
    }

    /// Check if any barrier is pending.
    pub fn is_empty(&self) -> bool {
        self.image_barriers.is_empty()
            && self.buffer_barriers.is_empty()
            && self.memory_access.is_none()
    }

    /// Number of pending barriers of all kinds.
    pub fn len(&self) -> usize {
        self.image_barriers.len()
            + self.buffer_barriers.len()
            + usize::from(self.memory_access.is_some())
    }

    /// Emit every pending barrier as one pipeline barrier and clear.
    ///
    /// Does nothing if no barrier is pending.
    pub fn flush(&mut self, backend: &dyn GpuBackend, cmd: vk::CommandBuffer) {
        if self.is_empty() {
            return;
        }
        profile_scope!("BarrierBuilder::flush");

        let image_barriers: Vec<vk::ImageMemoryBarrier<'_>> = self
            .image_barriers
            .iter()
            .map(|info| {
                vk::ImageMemoryBarrier::default()
                    .old_layout(info.old_layout.to_vk())
                    .new_layout(info.new_layout.to_vk())
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(info.image)
                    .subresource_range(info.range)
                    .src_access_mask(info.old_layout.src_access_mask())
                    .dst_access_mask(info.new_layout.dst_access_mask())
            })
            .collect();

        let buffer_barriers: Vec<vk::BufferMemoryBarrier<'_>> = self
            .buffer_barriers
            .iter()
            .map(|info| {
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(info.src_access)
                    .dst_access_mask(info.dst_access)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(info.buffer)
                    .offset(info.offset)
                    .size(info.size)
            })
            .collect();

        let memory_barriers: Vec<vk::MemoryBarrier<'_>> = self
            .memory_access
            .map(|(src, dst)| {
                vk::MemoryBarrier::default()
                    .src_access_mask(src)
                    .dst_access_mask(dst)
            })
            .into_iter()
            .collect();

        let src_stage = if self.src_stage_mask.is_empty() {
            vk::PipelineStageFlags::TOP_OF_PIPE
        } else {
            self.src_stage_mask
        };
        let dst_stage = if self.dst_stage_mask.is_empty() {
            vk::PipelineStageFlags::BOTTOM_OF_PIPE
        } else {
            self.dst_stage_mask
        };

        log::trace!(
            "Flushing barriers: {} image, {} buffer, {} memory ({:?} -> {:?})",
            image_barriers.len(),
            buffer_barriers.len(),
            memory_barriers.len(),
            src_stage,
            dst_stage
        );

        backend.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            &memory_barriers,
            &buffer_barriers,
            &image_barriers,
        );

        self.clear();
    }

    /// Drop all pending barriers without emitting them.
    pub fn clear(&mut self) {
        self.image_barriers.clear();
        self.buffer_barriers.clear();
        self.memory_access = None;
        self.src_stage_mask = vk::PipelineStageFlags::empty();
        self.dst_stage_mask = vk::PipelineStageFlags::empty();
    }
}

static_assertions::assert_impl_all!(BarrierBuilder: Send, Sync);
