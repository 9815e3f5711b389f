//! GPU resources.
//!
//! This module contains the resource types created through
//! [`RenderDevice`](crate::RenderDevice):
//! - [`Texture`] - image with its whole, per-mip and per-layer views
//! - [`Buffer`], [`VertexBuffer`], [`IndexBuffer`] - GPU memory buffers
//! - [`DescriptorSetLayout`] - shader binding layout
//! - [`Pipeline`] - compute or graphics pipeline owning its layouts
//!
//! Every resource keeps an `Arc` to the backend that created it and releases
//! its GPU objects on drop.

mod buffer;
mod descriptor_layout;
mod pipeline;
mod texture;

pub use buffer::{Buffer, IndexBuffer, IndexType, VertexBuffer};
pub use descriptor_layout::{DescriptorBinding, DescriptorSetLayout};
pub use pipeline::{
    BlendMode, ComputePipelineDesc, GraphicsPipelineDesc, Pipeline, PipelineKind,
    PipelineLayoutDesc, ShaderStage, VertexAttribute,
};
pub use texture::{Texture, TextureBuilder};

pub(crate) use texture::TextureShape;
