//! Plain data types shared across the RHI.

mod extent;
mod format;
mod layout;
mod sampler;
mod texture_type;
mod usage;

pub use extent::{Extent2D, Extent3D, Rect2D, calc_mip_levels, calc_mip_size};
pub use format::PixelFormat;
pub use layout::{BufferAccess, ImageLayout};
pub use sampler::{AddressMode, MipmapMode, SamplerInfo, TexelFilter};
pub use texture_type::TextureType;
pub use usage::{BufferUsage, ImageUsage};
