//! Shader module and pipeline creation.

use std::ffi::CString;

use ash::vk;

use crate::error::{RhiError, RhiResult};
use crate::resources::{ComputePipelineDesc, GraphicsPipelineDesc, ShaderStage};

struct ShaderModule<'d> {
    device: &'d ash::Device,
    module: vk::ShaderModule,
    entry_point: CString,
}

impl<'d> ShaderModule<'d> {
    fn new(device: &'d ash::Device, stage: &ShaderStage<'_>, label: &str) -> RhiResult<Self> {
        let entry_point = CString::new(stage.entry_point).map_err(|e| {
            RhiError::ResourceCreationFailed(format!(
                "Invalid entry point name for {:?} (contains null byte): {}",
                label, e
            ))
        })?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(stage.code);
        let module = unsafe { device.create_shader_module(&create_info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!(
                "Failed to create shader module for {:?}: {:?}",
                label, e
            ))
        })?;
        Ok(Self {
            device,
            module,
            entry_point,
        })
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(stage)
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}

pub fn create_compute_pipeline(
    device: &ash::Device,
    desc: &ComputePipelineDesc<'_>,
    layout: vk::PipelineLayout,
) -> RhiResult<vk::Pipeline> {
    let module = ShaderModule::new(device, &desc.shader, desc.label)?;
    let pipeline_info = vk::ComputePipelineCreateInfo::default()
        .stage(module.stage_info(vk::ShaderStageFlags::COMPUTE))
        .layout(layout);

    let pipelines = unsafe {
        device.create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    }
    .map_err(|(_, e)| {
        RhiError::ResourceCreationFailed(format!(
            "Failed to create compute pipeline {:?}: {:?}",
            desc.label, e
        ))
    })?;

    Ok(pipelines[0])
}

pub fn create_graphics_pipeline(
    device: &ash::Device,
    desc: &GraphicsPipelineDesc<'_>,
    layout: vk::PipelineLayout,
) -> RhiResult<vk::Pipeline> {
    let vertex_module = ShaderModule::new(device, &desc.vertex, desc.label)?;
    let fragment_module = desc
        .fragment
        .as_ref()
        .map(|stage| ShaderModule::new(device, stage, desc.label))
        .transpose()?;

    let mut shader_stages = vec![vertex_module.stage_info(vk::ShaderStageFlags::VERTEX)];
    if let Some(module) = &fragment_module {
        shader_stages.push(module.stage_info(vk::ShaderStageFlags::FRAGMENT));
    }

    let binding_descriptions: Vec<vk::VertexInputBindingDescription> = if desc.vertex_stride > 0 {
        vec![
            vk::VertexInputBindingDescription::default()
                .binding(0)
                .stride(desc.vertex_stride)
                .input_rate(vk::VertexInputRate::VERTEX),
        ]
    } else {
        Vec::new()
    };

    let attribute_descriptions: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_attributes
        .iter()
        .map(|attr| {
            vk::VertexInputAttributeDescription::default()
                .location(attr.location)
                .binding(0)
                .format(attr.format)
                .offset(attr.offset)
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&binding_descriptions)
        .vertex_attribute_descriptions(&attribute_descriptions);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(desc.topology)
        .primitive_restart_enable(false);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    // Front faces wind clockwise to match the flipped viewport convention.
    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(desc.cull_mode)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth_compare.is_some())
        .depth_write_enable(desc.depth_write)
        .depth_compare_op(desc.depth_compare.unwrap_or(vk::CompareOp::ALWAYS))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
        .color_formats
        .iter()
        .map(|_| desc.blend.to_vk())
        .collect();

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let color_attachment_formats: Vec<vk::Format> =
        desc.color_formats.iter().map(|f| f.to_vk()).collect();
    let depth_format = desc.depth_format.unwrap_or_default();
    let stencil_format = if depth_format.has_stencil() {
        depth_format.to_vk()
    } else {
        vk::Format::UNDEFINED
    };

    let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
        .color_attachment_formats(&color_attachment_formats)
        .depth_attachment_format(depth_format.to_vk())
        .stencil_attachment_format(stencil_format);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .push_next(&mut rendering_info);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    }
    .map_err(|(_, e)| {
        RhiError::ResourceCreationFailed(format!(
            "Failed to create graphics pipeline {:?}: {:?}",
            desc.label, e
        ))
    })?;

    Ok(pipelines[0])
}
