//! Descriptor set construction with content-hash deduplication.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use rustc_hash::FxHasher;

use super::allocator::DescriptorSetAllocator;
use super::binding::ResourceBinding;
use super::cache::DescriptorSetCache;
use crate::backend::GpuBackend;
use crate::config::DescriptorPoolConfig;
use crate::error::RhiResult;
use crate::profiling::profile_scope;
use crate::resources::{Buffer, DescriptorSetLayout, Texture};
use crate::types::{BufferUsage, ImageLayout};

/// Where the payload of one slot lives.
#[derive(Debug, Clone, Copy)]
enum Payload {
    Images { start: usize, count: usize },
    Buffers { start: usize, count: usize },
}

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    ty: vk::DescriptorType,
    payload: Payload,
}

/// Accumulates bindings for one descriptor set and turns them into a set.
///
/// Equal contents built against the same layout return the same set: the
/// first build allocates and writes it, later ones hit the cache and touch
/// no GPU state. Bindings are cleared after every [`build`](Self::build).
///
/// ```ignore
/// let set = builder
///     .bind_uniform_buffer(0, &camera, 0, camera.size())
///     .bind_combined_image_sampler(1, &albedo, None)
///     .build(pipeline.set_layout(0))?;
/// ```
pub struct DescriptorSetBuilder {
    backend: Arc<dyn GpuBackend>,
    allocator: DescriptorSetAllocator,
    cache: DescriptorSetCache,
    slots: BTreeMap<u32, SlotEntry>,
    image_infos: Vec<vk::DescriptorImageInfo>,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
}

impl DescriptorSetBuilder {
    pub fn new(backend: Arc<dyn GpuBackend>, pool_config: DescriptorPoolConfig) -> Self {
        Self {
            allocator: DescriptorSetAllocator::new(Arc::clone(&backend), pool_config),
            backend,
            cache: DescriptorSetCache::new(),
            slots: BTreeMap::new(),
            image_infos: Vec::new(),
            buffer_infos: Vec::new(),
        }
    }

    /// Bind any resource kind to `slot`, replacing a previous binding.
    pub fn bind(&mut self, slot: u32, resource: ResourceBinding<'_>) -> &mut Self {
        match resource {
            ResourceBinding::Sampler(sampler) => self.bind_sampler(slot, sampler),
            ResourceBinding::CombinedImageSampler { texture, sampler } => {
                self.bind_combined_image_sampler(slot, texture, sampler)
            }
            ResourceBinding::SampledImage(texture) => self.bind_sampled_image(slot, texture),
            ResourceBinding::StorageImage { texture, mip } => {
                self.bind_storage_image(slot, texture, mip)
            }
            ResourceBinding::UniformBuffer {
                buffer,
                offset,
                range,
            } => self.bind_uniform_buffer(slot, buffer, offset, range),
            ResourceBinding::StorageBuffer {
                buffer,
                offset,
                range,
            } => self.bind_storage_buffer(slot, buffer, offset, range),
        }
    }

    pub fn bind_sampler(&mut self, slot: u32, sampler: vk::Sampler) -> &mut Self {
        assert!(
            sampler != vk::Sampler::null(),
            "null sampler bound to slot {}",
            slot
        );
        self.push_images(
            slot,
            vk::DescriptorType::SAMPLER,
            [vk::DescriptorImageInfo {
                sampler,
                image_view: vk::ImageView::null(),
                image_layout: vk::ImageLayout::UNDEFINED,
            }],
        )
    }

    /// Bind a texture with `sampler`, or with the sampler attached to the
    /// texture when `None`.
    pub fn bind_combined_image_sampler(
        &mut self,
        slot: u32,
        texture: &Texture,
        sampler: Option<vk::Sampler>,
    ) -> &mut Self {
        check_sampled(slot, texture);
        let sampler = sampler.unwrap_or_else(|| texture.sampler());
        assert!(
            sampler != vk::Sampler::null(),
            "texture bound to slot {} has no sampler",
            slot
        );
        self.push_images(
            slot,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            [vk::DescriptorImageInfo {
                sampler,
                image_view: texture.view(),
                image_layout: texture.layout().to_vk(),
            }],
        )
    }

    pub fn bind_sampled_image(&mut self, slot: u32, texture: &Texture) -> &mut Self {
        check_sampled(slot, texture);
        self.push_images(
            slot,
            vk::DescriptorType::SAMPLED_IMAGE,
            [vk::DescriptorImageInfo {
                sampler: vk::Sampler::null(),
                image_view: texture.view(),
                image_layout: texture.layout().to_vk(),
            }],
        )
    }

    /// Bind a texture for load/store access.
    ///
    /// With `mip` set only that level is bound; otherwise every level is
    /// bound as consecutive array elements of the slot.
    pub fn bind_storage_image(
        &mut self,
        slot: u32,
        texture: &Texture,
        mip: Option<u32>,
    ) -> &mut Self {
        assert!(texture.is_valid(), "invalid texture bound to slot {}", slot);
        assert_eq!(
            texture.layout(),
            ImageLayout::General,
            "storage image bound to slot {} must be in the General layout",
            slot
        );

        let info = |view| vk::DescriptorImageInfo {
            sampler: vk::Sampler::null(),
            image_view: view,
            image_layout: vk::ImageLayout::GENERAL,
        };
        match mip {
            Some(level) => self.push_images(
                slot,
                vk::DescriptorType::STORAGE_IMAGE,
                [info(texture.get_mip_level(level))],
            ),
            None => self.push_images(
                slot,
                vk::DescriptorType::STORAGE_IMAGE,
                texture.mip_views().iter().copied().map(info),
            ),
        }
    }

    pub fn bind_uniform_buffer(
        &mut self,
        slot: u32,
        buffer: &Buffer,
        offset: u64,
        range: u64,
    ) -> &mut Self {
        check_buffer(slot, buffer, BufferUsage::UNIFORM, offset, range);
        self.push_buffer(slot, vk::DescriptorType::UNIFORM_BUFFER, buffer, offset, range)
    }

    pub fn bind_storage_buffer(
        &mut self,
        slot: u32,
        buffer: &Buffer,
        offset: u64,
        range: u64,
    ) -> &mut Self {
        check_buffer(slot, buffer, BufferUsage::STORAGE, offset, range);
        self.push_buffer(slot, vk::DescriptorType::STORAGE_BUFFER, buffer, offset, range)
    }

    fn push_images(
        &mut self,
        slot: u32,
        ty: vk::DescriptorType,
        infos: impl IntoIterator<Item = vk::DescriptorImageInfo>,
    ) -> &mut Self {
        let start = self.image_infos.len();
        self.image_infos.extend(infos);
        let count = self.image_infos.len() - start;
        self.slots.insert(
            slot,
            SlotEntry {
                ty,
                payload: Payload::Images { start, count },
            },
        );
        self
    }

    fn push_buffer(
        &mut self,
        slot: u32,
        ty: vk::DescriptorType,
        buffer: &Buffer,
        offset: u64,
        range: u64,
    ) -> &mut Self {
        let start = self.buffer_infos.len();
        self.buffer_infos.push(vk::DescriptorBufferInfo {
            buffer: buffer.handle(),
            offset,
            range,
        });
        self.slots.insert(
            slot,
            SlotEntry {
                ty,
                payload: Payload::Buffers { start, count: 1 },
            },
        );
        self
    }

    /// Number of slots bound since the last build.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Content hash of the pending bindings against `layout`.
    pub fn content_hash(&self, layout: vk::DescriptorSetLayout) -> u64 {
        let mut hasher = FxHasher::default();
        layout.as_raw().hash(&mut hasher);
        for (slot, entry) in &self.slots {
            slot.hash(&mut hasher);
            entry.ty.as_raw().hash(&mut hasher);
            match entry.payload {
                Payload::Images { start, count } => {
                    for info in &self.image_infos[start..start + count] {
                        info.sampler.as_raw().hash(&mut hasher);
                        info.image_view.as_raw().hash(&mut hasher);
                        info.image_layout.as_raw().hash(&mut hasher);
                    }
                }
                Payload::Buffers { start, count } => {
                    for info in &self.buffer_infos[start..start + count] {
                        info.buffer.as_raw().hash(&mut hasher);
                        info.offset.hash(&mut hasher);
                        info.range.hash(&mut hasher);
                    }
                }
            }
        }
        hasher.finish()
    }

    /// Turn the pending bindings into a descriptor set of `layout`.
    ///
    /// The pending bindings are cleared whether or not this succeeds.
    ///
    /// # Panics
    ///
    /// Panics if a bound slot is missing from `layout`, has a different
    /// descriptor type, or holds more elements than the layout declares.
    pub fn build(&mut self, layout: &DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        profile_scope!("DescriptorSetBuilder::build");
        let result = self.build_inner(layout);
        self.clear();
        result
    }

    fn build_inner(&mut self, layout: &DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        self.check_layout(layout);

        let hash = self.content_hash(layout.handle());
        if let Some(set) = self.cache.get(hash) {
            return Ok(set);
        }

        let set = self.allocator.allocate(layout.handle())?;
        let writes: Vec<vk::WriteDescriptorSet<'_>> = self
            .slots
            .iter()
            .map(|(&slot, entry)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(slot)
                    .descriptor_type(entry.ty);
                match entry.payload {
                    Payload::Images { start, count } => {
                        write.image_info(&self.image_infos[start..start + count])
                    }
                    Payload::Buffers { start, count } => {
                        write.buffer_info(&self.buffer_infos[start..start + count])
                    }
                }
            })
            .collect();
        if !writes.is_empty() {
            self.backend.update_descriptor_sets(&writes);
        }
        log::trace!(
            "Wrote descriptor set {:?} ({} slots, hash {:#018x})",
            set,
            writes.len(),
            hash
        );

        self.cache.insert(hash, set);
        Ok(set)
    }

    fn check_layout(&self, layout: &DescriptorSetLayout) {
        for (&slot, entry) in &self.slots {
            let Some(declared) = layout.binding(slot) else {
                panic!("descriptor set layout has no binding {}", slot);
            };
            assert_eq!(
                declared.ty, entry.ty,
                "slot {} is declared as {:?} but bound as {:?}",
                slot, declared.ty, entry.ty
            );
            let count = match entry.payload {
                Payload::Images { count, .. } | Payload::Buffers { count, .. } => count,
            };
            assert!(
                count as u32 <= declared.count,
                "slot {} holds {} descriptors but the layout declares {}",
                slot,
                count,
                declared.count
            );
        }
    }

    /// Drop pending bindings without building.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.image_infos.clear();
        self.buffer_infos.clear();
    }

    /// Recycle every set handed out so far.
    ///
    /// Only legal once the GPU has finished with all of them.
    pub fn reset(&mut self) -> RhiResult<()> {
        self.clear();
        self.cache.clear();
        self.allocator.reset()
    }

    pub fn cache(&self) -> &DescriptorSetCache {
        &self.cache
    }

    pub fn allocator(&self) -> &DescriptorSetAllocator {
        &self.allocator
    }
}

impl std::fmt::Debug for DescriptorSetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSetBuilder")
            .field("pending_slots", &self.slots.len())
            .field("cached_sets", &self.cache.len())
            .field("allocator", &self.allocator)
            .finish()
    }
}

static_assertions::assert_impl_all!(DescriptorSetBuilder: Send, Sync);

fn check_sampled(slot: u32, texture: &Texture) {
    assert!(texture.is_valid(), "invalid texture bound to slot {}", slot);
    assert!(
        matches!(
            texture.layout(),
            ImageLayout::ShaderReadOnly | ImageLayout::DepthStencilReadOnly | ImageLayout::General
        ),
        "texture bound to slot {} is in {:?}, not a readable layout",
        slot,
        texture.layout()
    );
}

fn check_buffer(slot: u32, buffer: &Buffer, usage: BufferUsage, offset: u64, range: u64) {
    assert!(
        buffer.usage().contains(usage),
        "buffer {:?} bound to slot {} lacks {:?} usage",
        buffer.label(),
        slot,
        usage
    );
    assert!(
        buffer.contains_range(offset, range),
        "range {}+{} bound to slot {} exceeds buffer {:?} of {} bytes",
        offset,
        range,
        slot,
        buffer.label(),
        buffer.size()
    );
}
