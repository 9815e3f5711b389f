//! Command recording.
//!
//! [`CommandBuffer`] is the recording state machine; [`FramebufferInfo`] and
//! [`GeometryInfo`] describe render passes and draws. The helpers below
//! register the layout transitions textures need around a pass.

mod buffer;
mod framebuffer;

pub use buffer::{CommandBuffer, CommandBufferState, DebugGroup, InvariantFlags};
pub use framebuffer::{AttachmentInfo, ClearValue, FramebufferInfo, GeometryInfo, LoadOp};

use crate::resources::Texture;
use crate::types::ImageLayout;

/// Register the transition of `texture` into its attachment layout.
///
/// Depth textures go to the read-only depth layout when `read_only` is set;
/// color textures always become writable color attachments.
pub fn prepare_for_attachment(cb: &mut CommandBuffer, texture: &mut Texture, read_only: bool) {
    let layout = if texture.format().is_depth_stencil() {
        if read_only {
            ImageLayout::DepthStencilReadOnly
        } else {
            ImageLayout::DepthStencilAttachment
        }
    } else {
        ImageLayout::ColorAttachment
    };
    cb.barrier_builder().image_barrier(texture, layout);
}

/// Register the transition of `texture` into its shader-readable layout.
pub fn prepare_for_reading(cb: &mut CommandBuffer, texture: &mut Texture) {
    let layout = if texture.format().is_depth_stencil() {
        ImageLayout::DepthStencilReadOnly
    } else {
        ImageLayout::ShaderReadOnly
    };
    cb.barrier_builder().image_barrier(texture, layout);
}
