//! Command buffer integration tests.
//!
//! Recording runs against the dummy backend; the recorded command stream and
//! the simulated buffer memory are checked after submission.
//!
//! ```bash
//! cargo test -p redlilium-rhi --test command_buffer_tests
//! ```

mod common;

use std::time::Duration;

use rstest::rstest;

use common::{TestContext, test_pattern};
use redlilium_rhi::backend::RecordedCommand;
use redlilium_rhi::vk::Handle;
use redlilium_rhi::{
    AttachmentInfo, BufferAccess, BufferUsage, ClearValue, CommandBuffer, CommandBufferState,
    DescriptorBinding, Extent2D, FramebufferInfo, GeometryInfo, ImageLayout, ImageUsage,
    IndexType, InvariantFlags, LoadOp, MemoryLocation, PixelFormat, Rect2D, ResourceBinding,
    ResourceBindings, RhiConfig, TexelFilter, TextureBuilder, prepare_for_attachment, vk,
};

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_state_cycle() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer().unwrap();
    assert_eq!(cb.state(), CommandBufferState::Initial);
    assert!(!cb.is_complete().unwrap());

    cb.begin().unwrap();
    assert_eq!(cb.state(), CommandBufferState::Recording);
    cb.end().unwrap();
    assert_eq!(cb.state(), CommandBufferState::Executable);

    ctx.device.submit(&mut cb).unwrap();
    assert_eq!(cb.state(), CommandBufferState::Pending);
    assert!(cb.wait(Duration::from_secs(1)).unwrap());
    assert!(cb.is_complete().unwrap());

    cb.reset().unwrap();
    assert_eq!(cb.state(), CommandBufferState::Initial);
    cb.begin().unwrap();
    assert_eq!(cb.state(), CommandBufferState::Recording);
    assert_eq!(ctx.dummy.submissions(), 1);
}

#[test]
fn test_reset_of_executable_buffer() {
    let ctx = TestContext::new();
    let mut cb = ctx.recording();
    cb.end().unwrap();
    cb.reset().unwrap();
    assert_eq!(cb.state(), CommandBufferState::Initial);
}

fn into_state(ctx: &TestContext, state: CommandBufferState) -> CommandBuffer {
    let mut cb = ctx.device.create_command_buffer().unwrap();
    if state == CommandBufferState::Initial {
        return cb;
    }
    cb.begin().unwrap();
    cb.end().unwrap();
    if state == CommandBufferState::Pending {
        ctx.device.submit(&mut cb).unwrap();
    }
    cb
}

#[rstest]
#[case::initial(CommandBufferState::Initial)]
#[case::executable(CommandBufferState::Executable)]
#[case::pending(CommandBufferState::Pending)]
#[should_panic(expected = "requires the Recording state")]
fn test_draw_outside_recording(#[case] state: CommandBufferState) {
    let ctx = TestContext::new();
    let mut cb = into_state(&ctx, state);
    assert_eq!(cb.state(), state);
    cb.draw_full_screen_triangle();
}

#[test]
#[should_panic(expected = "begin() requires the Initial state")]
fn test_begin_twice() {
    let ctx = TestContext::new();
    let mut cb = ctx.recording();
    let _ = cb.begin();
}

#[test]
#[should_panic(expected = "only an Executable command buffer can be submitted")]
fn test_submit_while_recording() {
    let ctx = TestContext::new();
    let mut cb = ctx.recording();
    let _ = ctx.device.submit(&mut cb);
}

#[test]
#[should_panic(expected = "still executing")]
fn test_reset_while_gpu_busy() {
    let ctx = TestContext::new();
    ctx.dummy.hold_submissions(true);
    let mut cb = into_state(&ctx, CommandBufferState::Pending);
    assert!(!cb.is_complete().unwrap());
    let _ = cb.reset();
}

#[test]
fn test_reset_after_held_work_completes() {
    let ctx = TestContext::new();
    ctx.dummy.hold_submissions(true);
    let mut cb = into_state(&ctx, CommandBufferState::Pending);
    assert!(!cb.wait(Duration::from_millis(1)).unwrap());

    ctx.dummy.complete_submissions();
    assert!(cb.is_complete().unwrap());
    cb.reset().unwrap();
    assert_eq!(cb.state(), CommandBufferState::Initial);
}

// ============================================================================
// Recording invariants
// ============================================================================

#[test]
#[should_panic(expected = "OUTSIDE_RENDER_PASS")]
fn test_dispatch_inside_render_pass() {
    let ctx = TestContext::new();
    let pipeline = ctx.compute_pipeline(&[]);
    let mut target = ctx.color_target(16);
    let mut cb = ctx.recording();
    prepare_for_attachment(&mut cb, &mut target, false);
    cb.begin_rendering(
        &FramebufferInfo::new(Rect2D::from_extent(target.extent()))
            .with_color(AttachmentInfo::new(&target)),
    );
    cb.bind_pipeline(&pipeline);
    cb.dispatch(1, 1, 1);
}

#[test]
#[should_panic(expected = "INSIDE_RENDER_PASS")]
fn test_draw_outside_render_pass() {
    let ctx = TestContext::new();
    let pipeline = ctx.graphics_pipeline();
    let mut cb = ctx.recording();
    cb.bind_pipeline(&pipeline);
    cb.draw_full_screen_triangle();
}

#[test]
#[should_panic(expected = "VALID_PIPELINE")]
fn test_draw_without_pipeline() {
    let ctx = TestContext::new();
    let mut target = ctx.color_target(16);
    let mut cb = ctx.recording();
    prepare_for_attachment(&mut cb, &mut target, false);
    cb.begin_rendering(
        &FramebufferInfo::new(Rect2D::from_extent(target.extent()))
            .with_color(AttachmentInfo::new(&target)),
    );
    cb.draw_cube();
}

#[test]
#[should_panic(expected = "requires InvariantFlags(COMPUTE)")]
fn test_dispatch_with_graphics_pipeline() {
    let ctx = TestContext::new();
    let pipeline = ctx.graphics_pipeline();
    let mut cb = ctx.recording();
    cb.bind_pipeline(&pipeline);
    cb.dispatch(1, 1, 1);
}

#[test]
fn test_invariants_follow_bound_state() {
    let ctx = TestContext::new();
    let pipeline = ctx.compute_pipeline(&[]);
    let mut cb = ctx.recording();
    assert_eq!(cb.invariants(), InvariantFlags::OUTSIDE_RENDER_PASS);

    cb.bind_pipeline(&pipeline);
    assert_eq!(
        cb.invariants(),
        InvariantFlags::OUTSIDE_RENDER_PASS | InvariantFlags::VALID_COMPUTE_PIPELINE
    );

    cb.end().unwrap();
    cb.reset().unwrap();
    cb.begin().unwrap();
    assert_eq!(cb.invariants(), InvariantFlags::OUTSIDE_RENDER_PASS);
}

#[test]
#[should_panic(expected = "color attachment is in Undefined")]
fn test_attachment_must_be_prepared() {
    let ctx = TestContext::new();
    let target = ctx.color_target(16);
    let mut cb = ctx.recording();
    cb.begin_rendering(
        &FramebufferInfo::new(Rect2D::from_extent(target.extent()))
            .with_color(AttachmentInfo::new(&target)),
    );
}

// ============================================================================
// Pipelines and resources
// ============================================================================

#[test]
fn test_deferred_state_replayed_on_bind() {
    let ctx = TestContext::new();
    let pipeline = ctx.compute_pipeline(&[]);
    let set = vk::DescriptorSet::from_raw(0xdead);
    let mut cb = ctx.recording();

    cb.bind_descriptor_set(1, set);
    cb.push_constant(vk::ShaderStageFlags::COMPUTE, 0, &[1u32, 2, 3, 4]);
    assert!(ctx.commands(&cb).is_empty());

    cb.bind_pipeline(&pipeline);
    let commands = ctx.commands(&cb);
    assert_eq!(commands.len(), 3);
    assert!(matches!(commands[0], RecordedCommand::BindPipeline { .. }));
    assert_eq!(
        commands[1],
        RecordedCommand::BindDescriptorSets {
            bind_point: vk::PipelineBindPoint::COMPUTE,
            first_set: 1,
            sets: vec![set],
        }
    );
    let RecordedCommand::PushConstants { offset, data, .. } = &commands[2] else {
        panic!("expected push constants, got {:?}", commands[2]);
    };
    assert_eq!(*offset, 0);
    assert_eq!(data.len(), 16);
    assert_eq!(data[..4], 1u32.to_ne_bytes());

    // Nothing left to replay on a second bind.
    let other = ctx.compute_pipeline(&[]);
    cb.bind_pipeline(&other);
    assert_eq!(ctx.commands(&cb).len(), 4);
}

#[test]
fn test_same_pipeline_bound_once() {
    let ctx = TestContext::new();
    let pipeline = ctx.compute_pipeline(&[]);
    let mut cb = ctx.recording();
    cb.bind_pipeline(&pipeline);
    cb.bind_pipeline(&pipeline);
    cb.dispatch_pipeline(&pipeline, 4, 4, 1);

    assert_eq!(
        ctx.count(&cb, |c| matches!(c, RecordedCommand::BindPipeline { .. })),
        1
    );
    assert!(
        ctx.commands(&cb)
            .contains(&RecordedCommand::Dispatch { x: 4, y: 4, z: 1 })
    );
}

#[test]
fn test_bind_resources_reuses_identical_sets() {
    let ctx = TestContext::new();
    let bindings = [DescriptorBinding::new(
        0,
        vk::DescriptorType::UNIFORM_BUFFER,
        vk::ShaderStageFlags::COMPUTE,
    )];
    let pipeline = ctx.compute_pipeline(&[&bindings]);
    let ubo = ctx
        .device
        .create_buffer(256, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu, "params")
        .unwrap();
    let resources = ResourceBindings::new().with(0, 0, ResourceBinding::uniform(&ubo));

    let mut cb = ctx.recording();
    cb.bind_pipeline(&pipeline);
    cb.bind_resources(&resources).unwrap();
    cb.dispatch(1, 1, 1);
    cb.bind_resources(&resources).unwrap();
    cb.dispatch(1, 1, 1);

    assert_eq!(ctx.dummy.allocated_descriptor_sets(), 1);
    assert_eq!(cb.descriptor_set_builder().cache().hits(), 1);
    assert_eq!(
        ctx.count(&cb, |c| matches!(c, RecordedCommand::BindDescriptorSets { .. })),
        2
    );
}

#[test]
#[should_panic(expected = "VALID_PIPELINE")]
fn test_bind_resources_requires_pipeline() {
    let ctx = TestContext::new();
    let mut cb = ctx.recording();
    let _ = cb.bind_resources(&ResourceBindings::new());
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_begin_rendering_sets_viewport_and_scissor() {
    let ctx = TestContext::new();
    let mut target = ctx.color_target(32);
    let mut depth = TextureBuilder::new()
        .extent(Extent2D::square(32))
        .pixel_format(PixelFormat::Depth24UnormStencil8)
        .num_mip_levels(1)
        .usage(ImageUsage::RENDER_TARGET)
        .build(&ctx.device)
        .unwrap();
    let area = Rect2D::from_extent(Extent2D::square(32));

    let mut cb = ctx.recording();
    prepare_for_attachment(&mut cb, &mut target, false);
    prepare_for_attachment(&mut cb, &mut depth, false);
    assert_eq!(depth.layout(), ImageLayout::DepthStencilAttachment);
    let framebuffer = FramebufferInfo::new(area)
        .with_color(AttachmentInfo::new(&target).with_load(LoadOp::clear_color(0.0, 0.0, 0.0, 1.0)))
        .with_depth(AttachmentInfo::new(&depth).with_load(LoadOp::clear_depth(1.0)));
    cb.begin_rendering(&framebuffer);
    cb.end_rendering();
    cb.end().unwrap();

    let commands = ctx.commands(&cb);
    let begin = commands
        .iter()
        .position(|c| matches!(c, RecordedCommand::BeginRendering { .. }))
        .unwrap();
    assert!(matches!(commands[begin - 1], RecordedCommand::PipelineBarrier { .. }));
    assert_eq!(
        commands[begin],
        RecordedCommand::BeginRendering {
            area,
            color_attachments: 1,
            depth_attachment: true,
        }
    );
    assert_eq!(commands[begin + 1], RecordedCommand::SetViewport { area });
    assert_eq!(commands[begin + 2], RecordedCommand::SetScissor { area });
    assert_eq!(commands[begin + 3], RecordedCommand::EndRendering);
}

#[test]
fn test_draw_rebinds_buffers_only_on_change() {
    let ctx = TestContext::new();
    let pipeline = ctx.graphics_pipeline();
    let mut target = ctx.color_target(16);
    let vertices = ctx.device.create_vertex_buffer(4, 16, "quad").unwrap();
    let indices = ctx
        .device
        .create_index_buffer(6, IndexType::U16, "quad_indices")
        .unwrap();

    let mut cb = ctx.recording();
    prepare_for_attachment(&mut cb, &mut target, false);
    cb.begin_rendering(
        &FramebufferInfo::new(Rect2D::from_extent(target.extent()))
            .with_color(AttachmentInfo::new(&target)),
    );
    cb.bind_pipeline(&pipeline);
    cb.draw(&GeometryInfo::vertices(&vertices), 1);
    cb.draw(&GeometryInfo::vertices(&vertices), 2);
    cb.draw(&GeometryInfo::indexed(&vertices, &indices), 1);
    cb.draw(&GeometryInfo::indexed(&vertices, &indices), 1);
    cb.end_rendering();

    assert_eq!(
        ctx.count(&cb, |c| matches!(c, RecordedCommand::BindVertexBuffer { .. })),
        1
    );
    assert_eq!(
        ctx.count(&cb, |c| matches!(c, RecordedCommand::BindIndexBuffer { .. })),
        1
    );
    assert_eq!(
        ctx.count(&cb, |c| matches!(c, RecordedCommand::Draw { vertex_count: 4, .. })),
        2
    );
    assert_eq!(
        ctx.count(&cb, |c| matches!(c, RecordedCommand::DrawIndexed { index_count: 6, .. })),
        2
    );
}

// ============================================================================
// Transfers
// ============================================================================

#[test]
fn test_large_update_is_chunked() {
    let ctx = TestContext::new();
    let buffer = ctx
        .device
        .create_buffer(
            200_000,
            BufferUsage::TRANSFER_DST | BufferUsage::STORAGE,
            MemoryLocation::GpuOnly,
            "large",
        )
        .unwrap();
    let data = test_pattern(200_000);

    let mut cb = ctx.recording();
    cb.update_buffer(&buffer, 0, &data);
    cb.end().unwrap();
    assert_eq!(
        ctx.count(&cb, |c| matches!(c, RecordedCommand::UpdateBuffer { .. })),
        4
    );

    ctx.device.submit(&mut cb).unwrap();
    assert_eq!(ctx.dummy.buffer_contents(buffer.handle()).unwrap(), data);
}

#[test]
fn test_update_at_offset() {
    let ctx = TestContext::new();
    let buffer = ctx
        .device
        .create_buffer(64, BufferUsage::TRANSFER_DST, MemoryLocation::GpuOnly, "small")
        .unwrap();

    let mut cb = ctx.recording();
    cb.update_buffer(&buffer, 8, &[7u8; 16]);
    cb.end().unwrap();
    ctx.device.submit(&mut cb).unwrap();

    let contents = ctx.dummy.buffer_contents(buffer.handle()).unwrap();
    assert!(contents[..8].iter().all(|&b| b == 0));
    assert!(contents[8..24].iter().all(|&b| b == 7));
    assert!(contents[24..].iter().all(|&b| b == 0));
}

#[test]
#[should_panic(expected = "not 4-byte aligned")]
fn test_unaligned_update() {
    let ctx = TestContext::new();
    let buffer = ctx
        .device
        .create_buffer(64, BufferUsage::TRANSFER_DST, MemoryLocation::GpuOnly, "small")
        .unwrap();
    let mut cb = ctx.recording();
    cb.update_buffer(&buffer, 2, &[0u8; 4]);
}

#[test]
#[should_panic(expected = "exceeds buffer")]
fn test_update_past_the_end() {
    let ctx = TestContext::new();
    let buffer = ctx
        .device
        .create_buffer(64, BufferUsage::TRANSFER_DST, MemoryLocation::GpuOnly, "small")
        .unwrap();
    let mut cb = ctx.recording();
    cb.update_buffer(&buffer, 60, &[0u8; 8]);
}

#[test]
fn test_clear_then_copy() {
    let ctx = TestContext::new();
    let src = ctx
        .device
        .create_buffer(
            32,
            BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            "src",
        )
        .unwrap();
    let dst = ctx
        .device
        .create_buffer(32, BufferUsage::TRANSFER_DST, MemoryLocation::GpuOnly, "dst")
        .unwrap();

    let mut cb = ctx.recording();
    cb.clear_buffer(&src, 0x0403_0201);
    cb.copy_buffer(
        &src,
        &dst,
        vk::BufferCopy {
            src_offset: 0,
            dst_offset: 16,
            size: 8,
        },
    );
    cb.end().unwrap();
    ctx.device.submit(&mut cb).unwrap();

    let contents = ctx.dummy.buffer_contents(dst.handle()).unwrap();
    assert!(contents[..16].iter().all(|&b| b == 0));
    assert_eq!(contents[16..24], [1, 2, 3, 4, 1, 2, 3, 4]);
    assert!(contents[24..].iter().all(|&b| b == 0));
}

#[test]
#[should_panic(expected = "lacks")]
fn test_copy_requires_transfer_usage() {
    let ctx = TestContext::new();
    let src = ctx
        .device
        .create_buffer(16, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu, "ubo")
        .unwrap();
    let dst = ctx
        .device
        .create_buffer(16, BufferUsage::TRANSFER_DST, MemoryLocation::GpuOnly, "dst")
        .unwrap();
    let mut cb = ctx.recording();
    cb.copy_buffer(
        &src,
        &dst,
        vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: 16,
        },
    );
}

#[test]
fn test_generate_mipmaps() {
    let ctx = TestContext::new();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::square(64))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST)
        .build(&ctx.device)
        .unwrap();
    assert_eq!(texture.num_mip_levels(), 7);

    let mut cb = ctx.recording();
    cb.generate_mipmaps(&mut texture, TexelFilter::Linear);
    assert_eq!(texture.layout(), ImageLayout::TransferSrc);

    let blits: Vec<_> = ctx
        .commands(&cb)
        .into_iter()
        .filter_map(|c| match c {
            RecordedCommand::BlitImage { mips, .. } => Some(mips),
            _ => None,
        })
        .collect();
    assert_eq!(blits.len(), 6);
    for (level, mips) in blits.iter().enumerate() {
        assert_eq!(mips, &vec![(level as u32, level as u32 + 1)]);
    }
}

#[test]
fn test_clear_texture() {
    let ctx = TestContext::new();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::square(8))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST)
        .build(&ctx.device)
        .unwrap();

    let mut cb = ctx.recording();
    cb.clear_texture(&mut texture, ClearValue::color(1.0, 0.0, 1.0, 1.0));
    assert_eq!(texture.layout(), ImageLayout::TransferDst);
    assert!(ctx.commands(&cb).contains(&RecordedCommand::ClearColorImage {
        image: texture.image(),
        layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    }));
}

#[test]
fn test_copy_buffer_to_texture() {
    let ctx = TestContext::new();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::new(16, 8))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .num_mip_levels(1)
        .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST)
        .build(&ctx.device)
        .unwrap();
    let staging = ctx
        .device
        .create_buffer(
            16 * 8 * 4,
            BufferUsage::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "staging",
        )
        .unwrap();

    let mut cb = ctx.recording();
    cb.copy_buffer_to_texture(&staging, &mut texture);
    assert!(ctx.commands(&cb).contains(&RecordedCommand::CopyBufferToImage {
        src: staging.handle(),
        dst: texture.image(),
        dst_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        regions: 1,
    }));
}

// ============================================================================
// Barriers and debugging
// ============================================================================

#[test]
fn test_end_flushes_pending_barriers() {
    let ctx = TestContext::new();
    let buffer = ctx
        .device
        .create_buffer(64, BufferUsage::STORAGE, MemoryLocation::GpuOnly, "data")
        .unwrap();
    let mut cb = ctx.recording();
    cb.barrier_builder().buffer_barrier(
        &buffer,
        BufferAccess::ShaderWrite,
        BufferAccess::ShaderRead,
    );
    assert!(ctx.commands(&cb).is_empty());

    cb.end().unwrap();
    assert_eq!(
        ctx.count(&cb, |c| matches!(
            c,
            RecordedCommand::PipelineBarrier {
                buffer_barriers: 1,
                ..
            }
        )),
        1
    );
    assert!(cb.barrier_builder().is_empty());
}

#[test]
fn test_fat_barrier() {
    let ctx = TestContext::new();
    let mut cb = ctx.recording();
    #[allow(deprecated)]
    cb.insert_fat_barrier_unchecked();
    assert_eq!(
        ctx.commands(&cb),
        vec![RecordedCommand::PipelineBarrier {
            src_stage: vk::PipelineStageFlags::ALL_COMMANDS,
            dst_stage: vk::PipelineStageFlags::ALL_COMMANDS,
            memory_barriers: 1,
            buffer_barriers: 0,
            image_barriers: Vec::new(),
        }]
    );
}

#[rstest]
#[case::enabled(true, 2)]
#[case::disabled(false, 0)]
fn test_debug_group_labels(#[case] debug_labels: bool, #[case] label_commands: usize) {
    let ctx = TestContext::with_config(RhiConfig::default().with_debug_labels(debug_labels));
    let mut cb = ctx.recording();
    {
        let mut group = cb.debug_group("shadow");
        group.set_scissor(Rect2D::from_extent(Extent2D::square(4)));
    }

    let commands = ctx.commands(&cb);
    let labels = commands
        .iter()
        .filter(|c| {
            matches!(
                c,
                RecordedCommand::BeginDebugLabel { .. } | RecordedCommand::EndDebugLabel
            )
        })
        .count();
    assert_eq!(labels, label_commands);
    if debug_labels {
        assert_eq!(
            commands[0],
            RecordedCommand::BeginDebugLabel {
                label: "shadow".to_string()
            }
        );
        assert_eq!(commands[2], RecordedCommand::EndDebugLabel);
    }
}
