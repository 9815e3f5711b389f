//! Render pass attachments and draw geometry descriptions.

use ash::vk;

use crate::resources::{IndexBuffer, Texture, VertexBuffer};
use crate::types::Rect2D;

/// Value an attachment or texture is cleared to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// RGBA color.
    Color([f32; 4]),
    /// Depth and stencil.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color([r, g, b, a])
    }

    /// Depth clear with zero stencil.
    pub fn depth(depth: f32) -> Self {
        Self::DepthStencil { depth, stencil: 0 }
    }

    pub fn to_vk(self) -> vk::ClearValue {
        match self {
            Self::Color(float32) => vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            },
            Self::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::Color([0.0; 4])
    }
}

/// What happens to an attachment's contents when the pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Keep the existing contents.
    #[default]
    Load,
    /// Clear to the given value.
    Clear(ClearValue),
    /// Existing contents may be discarded.
    DontCare,
}

impl LoadOp {
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(ClearValue::color(r, g, b, a))
    }

    pub fn clear_depth(depth: f32) -> Self {
        Self::Clear(ClearValue::depth(depth))
    }

    fn to_vk(self) -> (vk::AttachmentLoadOp, vk::ClearValue) {
        match self {
            Self::Load => (vk::AttachmentLoadOp::LOAD, vk::ClearValue::default()),
            Self::Clear(value) => (vk::AttachmentLoadOp::CLEAR, value.to_vk()),
            Self::DontCare => (vk::AttachmentLoadOp::DONT_CARE, vk::ClearValue::default()),
        }
    }
}

/// One color or depth attachment of a render pass.
///
/// Layered and cube textures render into the single-mip view of
/// (`layer`, `face`); other textures render into the view of `mip`.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentInfo<'a> {
    pub texture: &'a Texture,
    pub layer: u32,
    pub face: u32,
    pub mip: u32,
    pub load: LoadOp,
    /// Keep the rendered contents after the pass.
    pub store: bool,
}

impl<'a> AttachmentInfo<'a> {
    /// Attachment of mip 0, layer 0 that loads and stores.
    pub fn new(texture: &'a Texture) -> Self {
        Self {
            texture,
            layer: 0,
            face: 0,
            mip: 0,
            load: LoadOp::Load,
            store: true,
        }
    }

    pub fn with_load(mut self, load: LoadOp) -> Self {
        self.load = load;
        self
    }

    pub fn with_store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    pub fn with_layer(mut self, layer: u32, face: u32) -> Self {
        self.layer = layer;
        self.face = face;
        self
    }

    pub fn with_mip(mut self, mip: u32) -> Self {
        self.mip = mip;
        self
    }

    /// The view rendered into.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index, or a non-zero mip on a layered
    /// texture.
    pub fn view(&self) -> vk::ImageView {
        assert!(self.texture.is_valid(), "attachment texture is not valid");
        if self.texture.texture_type().is_layered() {
            assert_eq!(
                self.mip, 0,
                "layered attachments render into mip 0 of a layer view"
            );
            self.texture.get_layer(self.layer, self.face)
        } else {
            self.texture.get_mip_level(self.mip)
        }
    }

    pub(crate) fn to_vk(&self, layout: vk::ImageLayout) -> vk::RenderingAttachmentInfo<'static> {
        let (load_op, clear_value) = self.load.to_vk();
        let store_op = if self.store {
            vk::AttachmentStoreOp::STORE
        } else {
            vk::AttachmentStoreOp::DONT_CARE
        };
        vk::RenderingAttachmentInfo::default()
            .image_view(self.view())
            .image_layout(layout)
            .load_op(load_op)
            .store_op(store_op)
            .clear_value(clear_value)
    }
}

/// Attachments and render area of one render pass.
#[derive(Debug, Clone, Default)]
pub struct FramebufferInfo<'a> {
    pub area: Rect2D,
    pub color_attachments: Vec<AttachmentInfo<'a>>,
    pub depth_attachment: Option<AttachmentInfo<'a>>,
}

impl<'a> FramebufferInfo<'a> {
    pub fn new(area: Rect2D) -> Self {
        Self {
            area,
            color_attachments: Vec::new(),
            depth_attachment: None,
        }
    }

    pub fn with_color(mut self, attachment: AttachmentInfo<'a>) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    pub fn with_depth(mut self, attachment: AttachmentInfo<'a>) -> Self {
        self.depth_attachment = Some(attachment);
        self
    }
}

/// Vertex and index input of a draw.
///
/// Without a vertex buffer the vertex shader generates positions from the
/// vertex index.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryInfo<'a> {
    pub vertex_buffer: Option<&'a VertexBuffer>,
    pub index_buffer: Option<&'a IndexBuffer>,
    /// Vertex count of a non-indexed draw.
    pub vertex_count: u32,
    pub first_vertex: u32,
    /// Index count of an indexed draw.
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
}

impl<'a> GeometryInfo<'a> {
    /// Buffer-less geometry of `vertex_count` generated vertices.
    pub fn procedural(vertex_count: u32) -> Self {
        Self {
            vertex_count,
            ..Default::default()
        }
    }

    /// Every vertex of `vertex_buffer`, non-indexed.
    pub fn vertices(vertex_buffer: &'a VertexBuffer) -> Self {
        Self {
            vertex_buffer: Some(vertex_buffer),
            vertex_count: vertex_buffer.capacity(),
            ..Default::default()
        }
    }

    /// Every index of `index_buffer` over `vertex_buffer`.
    pub fn indexed(vertex_buffer: &'a VertexBuffer, index_buffer: &'a IndexBuffer) -> Self {
        Self {
            vertex_buffer: Some(vertex_buffer),
            index_buffer: Some(index_buffer),
            index_count: index_buffer.capacity(),
            ..Default::default()
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }
}
