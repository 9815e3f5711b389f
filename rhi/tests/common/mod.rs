//! Common utilities for RHI integration tests.
//!
//! Every test runs against the [`DummyBackend`], which records commands and
//! simulates buffer memory, so results can be checked without a GPU.

#![allow(dead_code)]

use std::sync::Arc;

use redlilium_rhi::backend::{DummyBackend, RecordedCommand};
use redlilium_rhi::{
    CommandBuffer, ComputePipelineDesc, DescriptorBinding, Extent2D, GraphicsPipelineDesc,
    ImageUsage, PipelineLayoutDesc, Pipeline, PixelFormat, RenderDevice, RhiConfig, ShaderStage,
    Texture, TextureBuilder, vk,
};

/// Placeholder SPIR-V; the dummy backend never compiles it.
pub const SHADER: &[u32] = &[0x0723_0203];

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A device over a dummy backend the test can inspect.
pub struct TestContext {
    pub dummy: Arc<DummyBackend>,
    pub device: RenderDevice,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(RhiConfig::default())
    }

    pub fn with_config(config: RhiConfig) -> Self {
        init_logging();
        let dummy = Arc::new(DummyBackend::new());
        let device = RenderDevice::with_backend(dummy.clone(), config);
        Self { dummy, device }
    }

    /// A command buffer already in the Recording state.
    pub fn recording(&self) -> CommandBuffer {
        let mut cb = self.device.create_command_buffer().unwrap();
        cb.begin().unwrap();
        cb
    }

    /// Commands recorded into `cb` so far.
    pub fn commands(&self, cb: &CommandBuffer) -> Vec<RecordedCommand> {
        self.dummy.commands(cb.handle())
    }

    /// Number of recorded commands matching `predicate`.
    pub fn count(&self, cb: &CommandBuffer, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands(cb).iter().filter(|c| predicate(c)).count()
    }

    pub fn compute_pipeline(&self, sets: &[&[DescriptorBinding]]) -> Arc<Pipeline> {
        self.device
            .create_compute_pipeline(&ComputePipelineDesc {
                label: "test_compute",
                shader: ShaderStage::new(SHADER),
                layout: PipelineLayoutDesc {
                    sets,
                    push_constant_ranges: &[vk::PushConstantRange {
                        stage_flags: vk::ShaderStageFlags::COMPUTE,
                        offset: 0,
                        size: 16,
                    }],
                },
            })
            .unwrap()
    }

    pub fn graphics_pipeline(&self) -> Arc<Pipeline> {
        let mut desc = GraphicsPipelineDesc::new("test_graphics", ShaderStage::new(SHADER));
        desc.fragment = Some(ShaderStage::new(SHADER));
        desc.color_formats = &[PixelFormat::Rgba8Unorm];
        self.device.create_graphics_pipeline(&desc).unwrap()
    }

    /// Single-mip color render target, still in the Undefined layout.
    pub fn color_target(&self, size: u32) -> Texture {
        TextureBuilder::new()
            .name("color_target")
            .extent(Extent2D::square(size))
            .pixel_format(PixelFormat::Rgba8Unorm)
            .num_mip_levels(1)
            .usage(ImageUsage::RENDER_TARGET | ImageUsage::SAMPLED)
            .build(&self.device)
            .unwrap()
    }
}

/// Deterministic non-trivial byte pattern.
pub fn test_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
