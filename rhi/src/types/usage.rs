//! Image and buffer usage flags.

use std::fmt;

use ash::vk;
use bitflags::bitflags;

use super::PixelFormat;

bitflags! {
    /// Usage flags for images.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsage: u32 {
        /// Image can be copied or blitted from.
        const TRANSFER_SRC = 1 << 0;
        /// Image can be copied, blitted or cleared to.
        const TRANSFER_DST = 1 << 1;
        /// Image can be bound as a storage image.
        const STORAGE = 1 << 2;
        /// Image can be a color or depth/stencil attachment.
        const RENDER_TARGET = 1 << 3;
        /// Image can be sampled in a shader.
        const SAMPLED = 1 << 4;
    }
}

impl ImageUsage {
    /// Vulkan usage flags for an image of the given aspect.
    ///
    /// Panics if the result would be both a storage image and a color
    /// attachment.
    pub fn to_vk(self, aspect_mask: vk::ImageAspectFlags) -> vk::ImageUsageFlags {
        let mut flags = vk::ImageUsageFlags::empty();
        if self.contains(Self::TRANSFER_SRC) {
            flags |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        if self.contains(Self::TRANSFER_DST) {
            flags |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        if self.contains(Self::STORAGE) {
            flags |= vk::ImageUsageFlags::STORAGE;
        }
        if self.contains(Self::RENDER_TARGET) {
            flags |= if aspect_mask.contains(vk::ImageAspectFlags::COLOR) {
                vk::ImageUsageFlags::COLOR_ATTACHMENT
            } else {
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
            };
        }
        if self.contains(Self::SAMPLED) {
            flags |= vk::ImageUsageFlags::SAMPLED;
        }
        assert!(
            !flags.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE),
            "an image cannot be both a storage image and a color attachment"
        );
        flags
    }

    /// Optimal-tiling format features a device must report for this usage.
    pub fn required_format_features(self, format: PixelFormat) -> vk::FormatFeatureFlags {
        let mut features = vk::FormatFeatureFlags::empty();
        if self.contains(Self::TRANSFER_SRC) {
            features |= vk::FormatFeatureFlags::TRANSFER_SRC;
        }
        if self.contains(Self::TRANSFER_DST) {
            features |= vk::FormatFeatureFlags::TRANSFER_DST;
        }
        if self.contains(Self::STORAGE) {
            features |= vk::FormatFeatureFlags::STORAGE_IMAGE;
        }
        if self.contains(Self::RENDER_TARGET) {
            features |= if format.is_depth_stencil() {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::COLOR_ATTACHMENT
            };
        }
        if self.contains(Self::SAMPLED) {
            features |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
        }
        features
    }
}

impl fmt::Display for ImageUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Buffer can be copied from.
        const TRANSFER_SRC = 1 << 0;
        /// Buffer can be copied, filled or updated.
        const TRANSFER_DST = 1 << 1;
        /// Buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be bound as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 4;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 5;
        /// Buffer can source indirect draw arguments.
        const INDIRECT = 1 << 6;
    }
}

impl BufferUsage {
    /// Vulkan usage flags.
    pub fn to_vk(self) -> vk::BufferUsageFlags {
        let mut flags = vk::BufferUsageFlags::empty();
        if self.contains(Self::TRANSFER_SRC) {
            flags |= vk::BufferUsageFlags::TRANSFER_SRC;
        }
        if self.contains(Self::TRANSFER_DST) {
            flags |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        if self.contains(Self::UNIFORM) {
            flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
        }
        if self.contains(Self::STORAGE) {
            flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
        }
        if self.contains(Self::VERTEX) {
            flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
        }
        if self.contains(Self::INDEX) {
            flags |= vk::BufferUsageFlags::INDEX_BUFFER;
        }
        if self.contains(Self::INDIRECT) {
            flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
        }
        flags
    }
}
