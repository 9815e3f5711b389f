//! Sampler descriptions.

use std::hash::{Hash, Hasher};

use ash::vk;

/// Texel filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexelFilter {
    #[default]
    Nearest,
    Linear,
}

impl TexelFilter {
    pub fn to_vk(self) -> vk::Filter {
        match self {
            Self::Nearest => vk::Filter::NEAREST,
            Self::Linear => vk::Filter::LINEAR,
        }
    }
}

/// Filtering between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipmapMode {
    #[default]
    Nearest,
    Linear,
}

impl MipmapMode {
    pub fn to_vk(self) -> vk::SamplerMipmapMode {
        match self {
            Self::Nearest => vk::SamplerMipmapMode::NEAREST,
            Self::Linear => vk::SamplerMipmapMode::LINEAR,
        }
    }
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

impl AddressMode {
    pub fn to_vk(self) -> vk::SamplerAddressMode {
        match self {
            Self::Repeat => vk::SamplerAddressMode::REPEAT,
            Self::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
            Self::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            Self::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        }
    }
}

/// Sampler state. Equal infos share one device sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplerInfo {
    pub min_filter: TexelFilter,
    pub mag_filter: TexelFilter,
    pub mipmap_mode: MipmapMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    /// Anisotropy clamp; 1 disables anisotropic filtering.
    pub max_anisotropy: u16,
    /// Depth comparison for shadow samplers.
    pub compare_op: Option<vk::CompareOp>,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self {
            min_filter: TexelFilter::Nearest,
            mag_filter: TexelFilter::Nearest,
            mipmap_mode: MipmapMode::Nearest,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            max_anisotropy: 1,
            compare_op: None,
            min_lod: 0.0,
            max_lod: vk::LOD_CLAMP_NONE,
        }
    }
}

impl SamplerInfo {
    /// Linear filtering sampler suited to a texture with `num_mip_levels` mips.
    ///
    /// Mipmap filtering is linear only when there is more than one mip.
    pub fn optimal(num_mip_levels: u32) -> Self {
        Self {
            min_filter: TexelFilter::Linear,
            mag_filter: TexelFilter::Linear,
            mipmap_mode: if num_mip_levels > 1 {
                MipmapMode::Linear
            } else {
                MipmapMode::Nearest
            },
            max_anisotropy: 16,
            max_lod: num_mip_levels as f32,
            ..Default::default()
        }
    }

    /// Set address mode for all coordinates.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    /// Set comparison function for depth sampling.
    pub fn with_compare(mut self, compare_op: vk::CompareOp) -> Self {
        self.compare_op = Some(compare_op);
        self
    }

    pub fn to_vk(&self) -> vk::SamplerCreateInfo<'static> {
        vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter.to_vk())
            .min_filter(self.min_filter.to_vk())
            .mipmap_mode(self.mipmap_mode.to_vk())
            .address_mode_u(self.address_mode_u.to_vk())
            .address_mode_v(self.address_mode_v.to_vk())
            .address_mode_w(self.address_mode_w.to_vk())
            .mip_lod_bias(0.0)
            .anisotropy_enable(self.max_anisotropy > 1)
            .max_anisotropy(f32::from(self.max_anisotropy))
            .compare_enable(self.compare_op.is_some())
            .compare_op(self.compare_op.unwrap_or(vk::CompareOp::ALWAYS))
            .min_lod(self.min_lod)
            .max_lod(self.max_lod)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false)
    }

    fn key(&self) -> impl Eq + Hash {
        (
            self.min_filter,
            self.mag_filter,
            self.mipmap_mode,
            [self.address_mode_u, self.address_mode_v, self.address_mode_w],
            self.max_anisotropy,
            self.compare_op.map(|op| op.as_raw()),
            self.min_lod.to_bits(),
            self.max_lod.to_bits(),
        )
    }
}

impl PartialEq for SamplerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SamplerInfo {}

impl Hash for SamplerInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_single_mip_uses_nearest_mipmap() {
        let info = SamplerInfo::optimal(1);
        assert_eq!(info.mipmap_mode, MipmapMode::Nearest);
        assert_eq!(info.min_filter, TexelFilter::Linear);
        assert_eq!(info.max_lod, 1.0);
    }

    #[test]
    fn test_optimal_mip_chain() {
        let info = SamplerInfo::optimal(9);
        assert_eq!(info.mipmap_mode, MipmapMode::Linear);
        assert_eq!(info.max_anisotropy, 16);
        assert_eq!(info.max_lod, 9.0);
        assert!(info.to_vk().anisotropy_enable == vk::TRUE);
    }

    #[test]
    fn test_equality_by_value() {
        assert_eq!(SamplerInfo::optimal(4), SamplerInfo::optimal(4));
        assert_ne!(SamplerInfo::optimal(4), SamplerInfo::optimal(5));
        assert_ne!(
            SamplerInfo::default(),
            SamplerInfo::default().with_compare(vk::CompareOp::LESS)
        );
    }
}
