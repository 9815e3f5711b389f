//! Resource binding descriptions.

use std::collections::BTreeMap;

use ash::vk;

use crate::resources::{Buffer, Texture};

/// One resource bound to a descriptor slot.
///
/// The six kinds mirror the descriptor types the RHI builds sets from.
#[derive(Debug, Clone, Copy)]
pub enum ResourceBinding<'a> {
    /// A standalone sampler.
    Sampler(vk::Sampler),
    /// A texture with a sampler. `None` uses the sampler attached to the
    /// texture.
    CombinedImageSampler {
        texture: &'a Texture,
        sampler: Option<vk::Sampler>,
    },
    /// A texture read without a sampler.
    SampledImage(&'a Texture),
    /// A texture in the `General` layout for load/store access.
    ///
    /// Without a fixed mip every mip level is bound as one array element.
    StorageImage { texture: &'a Texture, mip: Option<u32> },
    /// A uniform buffer range.
    UniformBuffer {
        buffer: &'a Buffer,
        offset: u64,
        range: u64,
    },
    /// A storage buffer range.
    StorageBuffer {
        buffer: &'a Buffer,
        offset: u64,
        range: u64,
    },
}

impl<'a> ResourceBinding<'a> {
    /// The whole buffer as a uniform buffer.
    pub fn uniform(buffer: &'a Buffer) -> Self {
        Self::UniformBuffer {
            buffer,
            offset: 0,
            range: buffer.size(),
        }
    }

    /// The whole buffer as a storage buffer.
    pub fn storage(buffer: &'a Buffer) -> Self {
        Self::StorageBuffer {
            buffer,
            offset: 0,
            range: buffer.size(),
        }
    }

    /// The texture with its own sampler.
    pub fn combined(texture: &'a Texture) -> Self {
        Self::CombinedImageSampler {
            texture,
            sampler: None,
        }
    }

    /// The texture sampled through `sampler` instead of its own.
    pub fn combined_with_sampler(texture: &'a Texture, sampler: vk::Sampler) -> Self {
        Self::CombinedImageSampler {
            texture,
            sampler: Some(sampler),
        }
    }

    /// Every mip of the texture as a storage image array.
    pub fn storage_image(texture: &'a Texture) -> Self {
        Self::StorageImage { texture, mip: None }
    }

    /// Descriptor type written for this binding.
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Self::Sampler(_) => vk::DescriptorType::SAMPLER,
            Self::CombinedImageSampler { .. } => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::SampledImage(_) => vk::DescriptorType::SAMPLED_IMAGE,
            Self::StorageImage { .. } => vk::DescriptorType::STORAGE_IMAGE,
            Self::UniformBuffer { .. } => vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer { .. } => vk::DescriptorType::STORAGE_BUFFER,
        }
    }
}

/// Resources for every descriptor set of a pipeline, keyed by set index and
/// then by slot.
#[derive(Debug, Clone, Default)]
pub struct ResourceBindings<'a> {
    sets: BTreeMap<u32, BTreeMap<u32, ResourceBinding<'a>>>,
}

impl<'a> ResourceBindings<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `resource` at (`set`, `slot`), replacing any previous binding.
    pub fn bind(&mut self, set: u32, slot: u32, resource: ResourceBinding<'a>) -> &mut Self {
        self.sets.entry(set).or_default().insert(slot, resource);
        self
    }

    /// Builder-style [`bind`](Self::bind).
    pub fn with(mut self, set: u32, slot: u32, resource: ResourceBinding<'a>) -> Self {
        self.bind(set, slot, resource);
        self
    }

    /// Bindings of one set in slot order.
    pub fn set(&self, set: u32) -> Option<&BTreeMap<u32, ResourceBinding<'a>>> {
        self.sets.get(&set)
    }

    /// All sets in index order.
    pub fn sets(&self) -> impl Iterator<Item = (u32, &BTreeMap<u32, ResourceBinding<'a>>)> {
        self.sets.iter().map(|(set, slots)| (*set, slots))
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
