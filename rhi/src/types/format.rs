//! Pixel formats.

use ash::vk;

/// Pixel format of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum PixelFormat {
    /// No format. Empty textures report this.
    #[default]
    Undefined,

    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit red channel, unsigned integer.
    R8Uint,

    // 16-bit formats
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,
    /// Packed 11/11/10-bit float.
    Rg11b10Float,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RG channels, float.
    Rg32Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24UnormStencil8,
    /// 32-bit depth, float.
    Depth32Float,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl PixelFormat {
    /// Vulkan format for this pixel format.
    pub fn to_vk(self) -> vk::Format {
        match self {
            Self::Undefined => vk::Format::UNDEFINED,
            Self::R8Unorm => vk::Format::R8_UNORM,
            Self::R8Uint => vk::Format::R8_UINT,
            Self::R16Float => vk::Format::R16_SFLOAT,
            Self::Rg8Unorm => vk::Format::R8G8_UNORM,
            Self::R32Float => vk::Format::R32_SFLOAT,
            Self::R32Uint => vk::Format::R32_UINT,
            Self::Rg16Float => vk::Format::R16G16_SFLOAT,
            Self::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
            Self::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
            Self::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
            Self::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
            Self::Rg11b10Float => vk::Format::B10G11R11_UFLOAT_PACK32,
            Self::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
            Self::Rg32Float => vk::Format::R32G32_SFLOAT,
            Self::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
            Self::Depth16Unorm => vk::Format::D16_UNORM,
            Self::Depth24UnormStencil8 => vk::Format::D24_UNORM_S8_UINT,
            Self::Depth32Float => vk::Format::D32_SFLOAT,
            Self::Depth32FloatStencil8 => vk::Format::D32_SFLOAT_S8_UINT,
        }
    }

    /// Map a Vulkan format back, used when wrapping swapchain images.
    pub fn from_vk(format: vk::Format) -> Option<Self> {
        Some(match format {
            vk::Format::R8_UNORM => Self::R8Unorm,
            vk::Format::R8_UINT => Self::R8Uint,
            vk::Format::R16_SFLOAT => Self::R16Float,
            vk::Format::R8G8_UNORM => Self::Rg8Unorm,
            vk::Format::R32_SFLOAT => Self::R32Float,
            vk::Format::R32_UINT => Self::R32Uint,
            vk::Format::R16G16_SFLOAT => Self::Rg16Float,
            vk::Format::R8G8B8A8_UNORM => Self::Rgba8Unorm,
            vk::Format::R8G8B8A8_SRGB => Self::Rgba8UnormSrgb,
            vk::Format::B8G8R8A8_UNORM => Self::Bgra8Unorm,
            vk::Format::B8G8R8A8_SRGB => Self::Bgra8UnormSrgb,
            vk::Format::B10G11R11_UFLOAT_PACK32 => Self::Rg11b10Float,
            vk::Format::R16G16B16A16_SFLOAT => Self::Rgba16Float,
            vk::Format::R32G32_SFLOAT => Self::Rg32Float,
            vk::Format::R32G32B32A32_SFLOAT => Self::Rgba32Float,
            vk::Format::D16_UNORM => Self::Depth16Unorm,
            vk::Format::D24_UNORM_S8_UINT => Self::Depth24UnormStencil8,
            vk::Format::D32_SFLOAT => Self::Depth32Float,
            vk::Format::D32_SFLOAT_S8_UINT => Self::Depth32FloatStencil8,
            _ => return None,
        })
    }

    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24UnormStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8
        )
    }

    /// Image aspects addressed by views of this format.
    pub fn aspect_mask(self) -> vk::ImageAspectFlags {
        if self.has_stencil() {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else if self.is_depth_stencil() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        }
    }

    /// Size in bytes of one texel.
    pub fn block_size(self) -> u32 {
        match self {
            Self::Undefined => 0,
            Self::R8Unorm | Self::R8Uint => 1,
            Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Rg11b10Float
            | Self::Depth24UnormStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PixelFormat::Rgba8Unorm, vk::ImageAspectFlags::COLOR)]
    #[case(PixelFormat::Depth32Float, vk::ImageAspectFlags::DEPTH)]
    #[case(
        PixelFormat::Depth24UnormStencil8,
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    )]
    fn test_aspect_mask(#[case] format: PixelFormat, #[case] expected: vk::ImageAspectFlags) {
        assert_eq!(format.aspect_mask(), expected);
    }

    #[test]
    fn test_vk_mapping_is_reversible() {
        for format in [
            PixelFormat::R8Unorm,
            PixelFormat::Bgra8UnormSrgb,
            PixelFormat::Rgba16Float,
            PixelFormat::Depth32FloatStencil8,
        ] {
            assert_eq!(PixelFormat::from_vk(format.to_vk()), Some(format));
        }
        assert_eq!(PixelFormat::from_vk(vk::Format::UNDEFINED), None);
    }
}
