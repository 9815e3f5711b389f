//! Descriptor set layouts.

use std::sync::Arc;

use ash::vk;

use crate::backend::GpuBackend;
use crate::error::RhiResult;

/// One binding slot of a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

impl DescriptorBinding {
    /// Single-descriptor binding.
    pub const fn new(binding: u32, ty: vk::DescriptorType, stages: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            ty,
            count: 1,
            stages,
        }
    }

    /// Arrayed binding with `count` descriptors.
    pub const fn array(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    fn to_vk(self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.ty)
            .descriptor_count(self.count)
            .stage_flags(self.stages)
    }
}

/// An owned descriptor set layout that remembers its bindings.
pub struct DescriptorSetLayout {
    backend: Arc<dyn GpuBackend>,
    handle: vk::DescriptorSetLayout,
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayout {
    pub(crate) fn new(
        backend: &Arc<dyn GpuBackend>,
        bindings: &[DescriptorBinding],
    ) -> RhiResult<Self> {
        let raw: Vec<_> = bindings.iter().map(|b| b.to_vk()).collect();
        let handle = backend.create_descriptor_set_layout(&raw)?;
        Ok(Self {
            backend: Arc::clone(backend),
            handle,
            bindings: bindings.to_vec(),
        })
    }

    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    /// Binding declared at `slot`, if any.
    pub fn binding(&self, slot: u32) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.binding == slot)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        self.backend.destroy_descriptor_set_layout(self.handle);
    }
}

impl std::fmt::Debug for DescriptorSetLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSetLayout")
            .field("handle", &self.handle)
            .field("bindings", &self.bindings)
            .finish()
    }
}
