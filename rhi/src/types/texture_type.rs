//! Logical texture types derived from a texture's shape.

use ash::vk;

/// Shape class of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    Undefined,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

impl TextureType {
    /// Derive the type from extent height, depth, face count and layer count.
    ///
    /// Zero height means 1-D, non-zero depth means 3-D and six faces mean a
    /// cube. A layer count above zero selects the arrayed variant; 3-D
    /// textures cannot be arrayed and yield `Undefined`.
    pub fn derive(height: u32, depth: u32, num_faces: u32, num_layers: u32) -> Self {
        let arrayed = num_layers > 0;
        if num_faces == 6 {
            if arrayed {
                Self::TextureCubeArray
            } else {
                Self::TextureCube
            }
        } else if depth > 0 {
            if arrayed {
                Self::Undefined
            } else {
                Self::Texture3D
            }
        } else if height > 0 {
            if arrayed {
                Self::Texture2DArray
            } else {
                Self::Texture2D
            }
        } else if arrayed {
            Self::Texture1DArray
        } else {
            Self::Texture1D
        }
    }

    /// Whether per-(layer, face) views exist for this type.
    pub fn is_layered(self) -> bool {
        matches!(
            self,
            Self::Texture1DArray
                | Self::Texture2DArray
                | Self::TextureCube
                | Self::TextureCubeArray
        )
    }

    pub fn is_cube(self) -> bool {
        matches!(self, Self::TextureCube | Self::TextureCubeArray)
    }

    pub fn image_type(self) -> vk::ImageType {
        match self {
            Self::Texture1D | Self::Texture1DArray => vk::ImageType::TYPE_1D,
            Self::Texture3D => vk::ImageType::TYPE_3D,
            _ => vk::ImageType::TYPE_2D,
        }
    }

    /// View type of the whole-resource and per-mip views.
    pub fn view_type(self) -> vk::ImageViewType {
        match self {
            Self::Texture1D => vk::ImageViewType::TYPE_1D,
            Self::Texture1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
            Self::Texture2D | Self::Undefined => vk::ImageViewType::TYPE_2D,
            Self::Texture2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
            Self::Texture3D => vk::ImageViewType::TYPE_3D,
            Self::TextureCube => vk::ImageViewType::CUBE,
            Self::TextureCubeArray => vk::ImageViewType::CUBE_ARRAY,
        }
    }

    /// View type of a single (layer, face) view.
    pub fn layer_view_type(self) -> vk::ImageViewType {
        match self {
            Self::Texture1D | Self::Texture1DArray => vk::ImageViewType::TYPE_1D,
            _ => vk::ImageViewType::TYPE_2D,
        }
    }
}
