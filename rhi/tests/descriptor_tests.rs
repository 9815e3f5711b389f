//! Descriptor set building integration tests.
//!
//! Sets are built through a command buffer's [`DescriptorSetBuilder`] against
//! layouts created by the device; the dummy backend counts allocations and
//! writes so cache behavior can be observed.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::TestContext;
use redlilium_rhi::backend::RecordedCommand;
use redlilium_rhi::{
    BufferUsage, DescriptorBinding, DescriptorPoolConfig, DescriptorSetBuilder,
    DescriptorSetLayout, Extent2D, ImageUsage, MemoryLocation, PixelFormat, ResourceBinding,
    ResourceBindings, RhiConfig, SamplerInfo, TextureBuilder, prepare_for_reading, vk,
};

fn uniform_layout(ctx: &TestContext) -> DescriptorSetLayout {
    ctx.device
        .create_descriptor_set_layout(&[
            DescriptorBinding::new(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            ),
            DescriptorBinding::new(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            ),
        ])
        .unwrap()
}

fn builder(ctx: &TestContext) -> DescriptorSetBuilder {
    DescriptorSetBuilder::new(Arc::clone(ctx.device.backend()), DescriptorPoolConfig::default())
}

#[test]
fn test_identical_build_is_cached() {
    let ctx = TestContext::new();
    let layout = uniform_layout(&ctx);
    let ubo = ctx
        .device
        .create_buffer(128, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu, "camera")
        .unwrap();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::square(32))
        .pixel_format(PixelFormat::Rgba8UnormSrgb)
        .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST)
        .setup_optimal_sampler(true)
        .build(&ctx.device)
        .unwrap();
    let mut cb = ctx.recording();
    prepare_for_reading(&mut cb, &mut texture);

    let mut builder = builder(&ctx);
    builder
        .bind(0, ResourceBinding::uniform(&ubo))
        .bind(1, ResourceBinding::combined(&texture));
    let first = builder.build(&layout).unwrap();
    let writes = ctx.dummy.descriptor_writes();
    assert_eq!(ctx.dummy.allocated_descriptor_sets(), 1);
    assert_eq!(writes, 2);

    builder
        .bind(0, ResourceBinding::uniform(&ubo))
        .bind(1, ResourceBinding::combined(&texture));
    let second = builder.build(&layout).unwrap();

    assert_eq!(first, second);
    assert_eq!(ctx.dummy.allocated_descriptor_sets(), 1);
    assert_eq!(ctx.dummy.descriptor_writes(), writes);
    assert_eq!(builder.cache().hits(), 1);
    assert_eq!(builder.cache().misses(), 1);
}

#[test]
fn test_changed_resource_builds_new_set() {
    let ctx = TestContext::new();
    let layout = ctx
        .device
        .create_descriptor_set_layout(&[DescriptorBinding::new(
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::ShaderStageFlags::COMPUTE,
        )])
        .unwrap();
    let a = ctx
        .device
        .create_buffer(64, BufferUsage::STORAGE, MemoryLocation::GpuOnly, "a")
        .unwrap();
    let b = ctx
        .device
        .create_buffer(64, BufferUsage::STORAGE, MemoryLocation::GpuOnly, "b")
        .unwrap();

    let mut builder = builder(&ctx);
    builder.bind(0, ResourceBinding::storage(&a));
    let first = builder.build(&layout).unwrap();
    builder.bind(0, ResourceBinding::storage(&b));
    let second = builder.build(&layout).unwrap();
    builder.bind_storage_buffer(0, &a, 0, 32);
    let third = builder.build(&layout).unwrap();

    assert_ne!(first, second);
    assert_ne!(first, third);
    assert_eq!(ctx.dummy.allocated_descriptor_sets(), 3);
    assert_eq!(builder.cache().len(), 3);
}

#[test]
#[should_panic(expected = "not a readable layout")]
fn test_sampled_texture_must_be_readable() {
    let ctx = TestContext::new();
    let texture = TextureBuilder::new()
        .extent(Extent2D::square(8))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED)
        .build(&ctx.device)
        .unwrap();
    let mut builder = builder(&ctx);
    builder.bind(0, ResourceBinding::SampledImage(&texture));
}

#[test]
#[should_panic(expected = "has no sampler")]
fn test_combined_sampler_requires_sampler() {
    let ctx = TestContext::new();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::square(8))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED)
        .build(&ctx.device)
        .unwrap();
    let mut cb = ctx.recording();
    prepare_for_reading(&mut cb, &mut texture);
    let mut builder = builder(&ctx);
    builder.bind(0, ResourceBinding::combined(&texture));
}

#[test]
fn test_sampler_override_builds_new_set() {
    let ctx = TestContext::new();
    let layout = uniform_layout(&ctx);
    let ubo = ctx
        .device
        .create_buffer(64, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu, "material")
        .unwrap();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::square(16))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED)
        .setup_optimal_sampler(true)
        .build(&ctx.device)
        .unwrap();
    let mut cb = ctx.recording();
    prepare_for_reading(&mut cb, &mut texture);
    let nearest = ctx.device.get_sampler(&SamplerInfo::default()).unwrap();
    assert_ne!(nearest, texture.sampler());

    let mut builder = builder(&ctx);
    builder
        .bind(0, ResourceBinding::uniform(&ubo))
        .bind(1, ResourceBinding::combined(&texture));
    let own = builder.build(&layout).unwrap();
    builder
        .bind(0, ResourceBinding::uniform(&ubo))
        .bind(1, ResourceBinding::combined_with_sampler(&texture, nearest));
    let overridden = builder.build(&layout).unwrap();

    assert_ne!(own, overridden);
    assert_eq!(builder.cache().misses(), 2);
    assert_eq!(ctx.dummy.allocated_descriptor_sets(), 2);
}

#[test]
fn test_sampler_override_without_attached_sampler() {
    let ctx = TestContext::new();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::square(8))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED)
        .build(&ctx.device)
        .unwrap();
    let mut cb = ctx.recording();
    prepare_for_reading(&mut cb, &mut texture);
    assert_eq!(texture.sampler(), vk::Sampler::null());
    let sampler = ctx.device.get_sampler(&SamplerInfo::default()).unwrap();
    let layout = ctx
        .device
        .create_descriptor_set_layout(&[DescriptorBinding::new(
            0,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        )])
        .unwrap();

    let mut builder = builder(&ctx);
    builder.bind(0, ResourceBinding::combined_with_sampler(&texture, sampler));
    let set = builder.build(&layout).unwrap();
    assert_ne!(set, vk::DescriptorSet::null());
}

#[rstest]
#[case::uniform_into_storage(vk::DescriptorType::STORAGE_BUFFER)]
#[case::uniform_into_sampler(vk::DescriptorType::SAMPLER)]
#[should_panic(expected = "slot 0 is declared as")]
fn test_type_mismatch(#[case] declared: vk::DescriptorType) {
    let ctx = TestContext::new();
    let layout = ctx
        .device
        .create_descriptor_set_layout(&[DescriptorBinding::new(
            0,
            declared,
            vk::ShaderStageFlags::COMPUTE,
        )])
        .unwrap();
    let ubo = ctx
        .device
        .create_buffer(16, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu, "ubo")
        .unwrap();
    let mut builder = builder(&ctx);
    builder.bind(0, ResourceBinding::uniform(&ubo));
    let _ = builder.build(&layout);
}

#[test]
fn test_pools_grow_per_command_buffer() {
    let config = RhiConfig::default().with_descriptor_pool(DescriptorPoolConfig {
        max_sets: 2,
        ..Default::default()
    });
    let ctx = TestContext::with_config(config);
    let bindings = [DescriptorBinding::new(
        0,
        vk::DescriptorType::UNIFORM_BUFFER,
        vk::ShaderStageFlags::COMPUTE,
    )];
    let pipeline = ctx.compute_pipeline(&[&bindings]);
    let buffers: Vec<_> = (0..5)
        .map(|i| {
            ctx.device
                .create_buffer(
                    16,
                    BufferUsage::UNIFORM,
                    MemoryLocation::CpuToGpu,
                    &format!("ubo_{i}"),
                )
                .unwrap()
        })
        .collect();

    let mut cb = ctx.recording();
    cb.bind_pipeline(&pipeline);
    for buffer in &buffers {
        cb.bind_resources(&ResourceBindings::new().with(0, 0, ResourceBinding::uniform(buffer)))
            .unwrap();
        cb.dispatch(1, 1, 1);
    }

    assert_eq!(ctx.dummy.allocated_descriptor_sets(), 5);
    assert_eq!(cb.descriptor_set_builder().allocator().num_pools(), 3);
    let bound: Vec<_> = ctx
        .commands(&cb)
        .into_iter()
        .filter_map(|c| match c {
            RecordedCommand::BindDescriptorSets { sets, .. } => Some(sets[0]),
            _ => None,
        })
        .collect();
    assert_eq!(bound.len(), 5);
    for (i, set) in bound.iter().enumerate() {
        assert!(!bound[..i].contains(set));
    }

    // Reset recycles the pools and forgets the cached sets.
    cb.end().unwrap();
    cb.reset().unwrap();
    assert!(cb.descriptor_set_builder().cache().is_empty());
    assert_eq!(cb.descriptor_set_builder().allocator().num_pools(), 3);
}
