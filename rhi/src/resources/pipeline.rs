//! Compute and graphics pipelines together with their layouts.

use std::sync::Arc;

use ash::vk;

use crate::backend::GpuBackend;
use crate::error::RhiResult;
use crate::types::PixelFormat;

use super::descriptor_layout::{DescriptorBinding, DescriptorSetLayout};

/// SPIR-V code and entry point of one shader stage.
#[derive(Debug, Clone, Copy)]
pub struct ShaderStage<'a> {
    pub code: &'a [u32],
    pub entry_point: &'a str,
}

impl<'a> ShaderStage<'a> {
    pub fn new(code: &'a [u32]) -> Self {
        Self {
            code,
            entry_point: "main",
        }
    }

    pub fn with_entry_point(mut self, entry_point: &'a str) -> Self {
        self.entry_point = entry_point;
        self
    }
}

/// Descriptor set layouts and push constant ranges of a pipeline.
///
/// `sets[i]` describes set index `i`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineLayoutDesc<'a> {
    pub sets: &'a [&'a [DescriptorBinding]],
    pub push_constant_ranges: &'a [vk::PushConstantRange],
}

/// Description of a compute pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineDesc<'a> {
    pub label: &'a str,
    pub shader: ShaderStage<'a>,
    pub layout: PipelineLayoutDesc<'a>,
}

/// One vertex attribute read from the single vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: vk::Format,
    pub offset: u32,
}

/// Color blending applied to every color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// `src * a + dst * (1 - a)`.
    Alpha,
    /// `src + dst`.
    Additive,
}

impl BlendMode {
    pub(crate) fn to_vk(self) -> vk::PipelineColorBlendAttachmentState {
        let state = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        match self {
            Self::Opaque => state.blend_enable(false),
            Self::Alpha => state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD),
            Self::Additive => state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::ONE)
                .dst_color_blend_factor(vk::BlendFactor::ONE)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE)
                .alpha_blend_op(vk::BlendOp::ADD),
        }
    }
}

/// Description of a graphics pipeline rendering with dynamic rendering.
///
/// Viewport and scissor are dynamic state.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineDesc<'a> {
    pub label: &'a str,
    pub vertex: ShaderStage<'a>,
    pub fragment: Option<ShaderStage<'a>>,
    pub layout: PipelineLayoutDesc<'a>,
    /// Stride of the vertex buffer; 0 means no vertex input.
    pub vertex_stride: u32,
    pub vertex_attributes: &'a [VertexAttribute],
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub color_formats: &'a [PixelFormat],
    pub depth_format: Option<PixelFormat>,
    /// Depth comparison; `None` disables the depth test.
    pub depth_compare: Option<vk::CompareOp>,
    pub depth_write: bool,
    pub blend: BlendMode,
}

impl<'a> GraphicsPipelineDesc<'a> {
    /// Triangle list pipeline without vertex input, culling or depth.
    pub fn new(label: &'a str, vertex: ShaderStage<'a>) -> Self {
        Self {
            label,
            vertex,
            fragment: None,
            layout: PipelineLayoutDesc::default(),
            vertex_stride: 0,
            vertex_attributes: &[],
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::NONE,
            color_formats: &[],
            depth_format: None,
            depth_compare: None,
            depth_write: false,
            blend: BlendMode::Opaque,
        }
    }
}

/// Pipeline bind point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Graphics,
    Compute,
}

impl PipelineKind {
    pub fn bind_point(self) -> vk::PipelineBindPoint {
        match self {
            Self::Graphics => vk::PipelineBindPoint::GRAPHICS,
            Self::Compute => vk::PipelineBindPoint::COMPUTE,
        }
    }
}

/// A pipeline object owning its pipeline layout and descriptor set layouts.
pub struct Pipeline {
    backend: Arc<dyn GpuBackend>,
    kind: PipelineKind,
    label: String,
    handle: vk::Pipeline,
    layout: vk::PipelineLayout,
    set_layouts: Vec<DescriptorSetLayout>,
    push_constant_stages: vk::ShaderStageFlags,
}

struct Layouts {
    set_layouts: Vec<DescriptorSetLayout>,
    layout: vk::PipelineLayout,
    push_constant_stages: vk::ShaderStageFlags,
}

fn create_layouts(
    backend: &Arc<dyn GpuBackend>,
    desc: &PipelineLayoutDesc<'_>,
) -> RhiResult<Layouts> {
    let set_layouts = desc
        .sets
        .iter()
        .map(|bindings| DescriptorSetLayout::new(backend, bindings))
        .collect::<RhiResult<Vec<_>>>()?;
    let raw_layouts: Vec<_> = set_layouts.iter().map(DescriptorSetLayout::handle).collect();
    let layout = backend.create_pipeline_layout(&raw_layouts, desc.push_constant_ranges)?;
    let push_constant_stages = desc
        .push_constant_ranges
        .iter()
        .fold(vk::ShaderStageFlags::empty(), |stages, range| {
            stages | range.stage_flags
        });
    Ok(Layouts {
        set_layouts,
        layout,
        push_constant_stages,
    })
}

impl Pipeline {
    pub(crate) fn new_compute(
        backend: &Arc<dyn GpuBackend>,
        desc: &ComputePipelineDesc<'_>,
    ) -> RhiResult<Self> {
        let layouts = create_layouts(backend, &desc.layout)?;
        let handle = match backend.create_compute_pipeline(desc, layouts.layout) {
            Ok(handle) => handle,
            Err(e) => {
                backend.destroy_pipeline_layout(layouts.layout);
                return Err(e);
            }
        };
        log::debug!("Created compute pipeline {:?}", desc.label);
        Ok(Self::from_parts(backend, PipelineKind::Compute, desc.label, handle, layouts))
    }

    pub(crate) fn new_graphics(
        backend: &Arc<dyn GpuBackend>,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> RhiResult<Self> {
        let layouts = create_layouts(backend, &desc.layout)?;
        let handle = match backend.create_graphics_pipeline(desc, layouts.layout) {
            Ok(handle) => handle,
            Err(e) => {
                backend.destroy_pipeline_layout(layouts.layout);
                return Err(e);
            }
        };
        log::debug!("Created graphics pipeline {:?}", desc.label);
        Ok(Self::from_parts(backend, PipelineKind::Graphics, desc.label, handle, layouts))
    }

    fn from_parts(
        backend: &Arc<dyn GpuBackend>,
        kind: PipelineKind,
        label: &str,
        handle: vk::Pipeline,
        layouts: Layouts,
    ) -> Self {
        Self {
            backend: Arc::clone(backend),
            kind,
            label: label.to_string(),
            handle,
            layout: layouts.layout,
            set_layouts: layouts.set_layouts,
            push_constant_stages: layouts.push_constant_stages,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Layout of descriptor set `set`.
    ///
    /// # Panics
    ///
    /// Panics if the pipeline has no such set.
    pub fn set_layout(&self, set: u32) -> &DescriptorSetLayout {
        assert!(
            (set as usize) < self.set_layouts.len(),
            "pipeline {:?} has no descriptor set {}",
            self.label,
            set
        );
        &self.set_layouts[set as usize]
    }

    pub fn num_sets(&self) -> u32 {
        self.set_layouts.len() as u32
    }

    /// Union of the stages of all push constant ranges.
    pub fn push_constant_stages(&self) -> vk::ShaderStageFlags {
        self.push_constant_stages
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.backend.destroy_pipeline(self.handle);
        self.backend.destroy_pipeline_layout(self.layout);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("sets", &self.set_layouts.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    const SHADER: [u32; 1] = [0x0723_0203];

    #[test]
    fn test_compute_pipeline_owns_layouts() {
        let dummy = Arc::new(DummyBackend::new());
        let backend: Arc<dyn GpuBackend> = dummy.clone();
        let bindings = [DescriptorBinding::new(
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::ShaderStageFlags::COMPUTE,
        )];
        let sets: [&[DescriptorBinding]; 1] = [&bindings];
        let ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::COMPUTE,
            offset: 0,
            size: 16,
        }];
        let desc = ComputePipelineDesc {
            label: "fill",
            shader: ShaderStage::new(&SHADER),
            layout: PipelineLayoutDesc {
                sets: &sets,
                push_constant_ranges: &ranges,
            },
        };

        let pipeline = Pipeline::new_compute(&backend, &desc).unwrap();
        assert_eq!(pipeline.kind(), PipelineKind::Compute);
        assert_eq!(pipeline.num_sets(), 1);
        assert_eq!(pipeline.push_constant_stages(), vk::ShaderStageFlags::COMPUTE);
        let live = dummy.live_objects();
        assert_eq!(live.pipelines, 1);
        assert_eq!(live.pipeline_layouts, 1);
        assert_eq!(live.descriptor_set_layouts, 1);

        drop(pipeline);
        let live = dummy.live_objects();
        assert_eq!(live.pipelines, 0);
        assert_eq!(live.pipeline_layouts, 0);
        assert_eq!(live.descriptor_set_layouts, 0);
    }

    #[test]
    #[should_panic(expected = "has no descriptor set 2")]
    fn test_missing_set_layout() {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let desc = GraphicsPipelineDesc::new("empty", ShaderStage::new(&SHADER));
        let pipeline = Pipeline::new_graphics(&backend, &desc).unwrap();
        pipeline.set_layout(2);
    }
}
