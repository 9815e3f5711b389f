use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_rhi::{
    BarrierBuilder, BufferAccess, BufferUsage, DescriptorBinding, DescriptorPoolConfig,
    DescriptorSetBuilder, Extent2D, ImageLayout, ImageUsage, MemoryLocation, PixelFormat,
    RenderDevice, ResourceBinding, TextureBuilder, vk,
};

// ---------------------------------------------------------------------------
// Descriptor sets
// ---------------------------------------------------------------------------

fn bench_descriptor_cache_hit(c: &mut Criterion) {
    let device = RenderDevice::dummy();
    let layout = device
        .create_descriptor_set_layout(&[
            DescriptorBinding::new(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::COMPUTE,
            ),
            DescriptorBinding::new(
                1,
                vk::DescriptorType::STORAGE_BUFFER,
                vk::ShaderStageFlags::COMPUTE,
            ),
        ])
        .unwrap();
    let ubo = device
        .create_buffer(256, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu, "ubo")
        .unwrap();
    let ssbo = device
        .create_buffer(4096, BufferUsage::STORAGE, MemoryLocation::GpuOnly, "ssbo")
        .unwrap();
    let mut builder =
        DescriptorSetBuilder::new(Arc::clone(device.backend()), DescriptorPoolConfig::default());

    c.bench_function("descriptor_set_build_cached", |b| {
        b.iter(|| {
            builder
                .bind(0, ResourceBinding::uniform(&ubo))
                .bind(1, ResourceBinding::storage(&ssbo));
            black_box(builder.build(&layout).unwrap());
        });
    });
}

fn bench_descriptor_storage_image_mips(c: &mut Criterion) {
    let device = RenderDevice::dummy();
    let layout = device
        .create_descriptor_set_layout(&[DescriptorBinding::new(
            0,
            vk::DescriptorType::STORAGE_IMAGE,
            vk::ShaderStageFlags::COMPUTE,
        )
        .array(12)])
        .unwrap();
    let mut texture = TextureBuilder::new()
        .extent(Extent2D::square(2048))
        .pixel_format(PixelFormat::Rgba16Float)
        .usage(ImageUsage::STORAGE)
        .build(&device)
        .unwrap();
    BarrierBuilder::new().image_barrier(&mut texture, ImageLayout::General);
    let mut builder =
        DescriptorSetBuilder::new(Arc::clone(device.backend()), DescriptorPoolConfig::default());

    c.bench_function("descriptor_set_hash_12_mips", |b| {
        b.iter(|| {
            builder.bind(0, ResourceBinding::storage_image(&texture));
            black_box(builder.content_hash(layout.handle()));
            builder.clear();
        });
    });
}

// ---------------------------------------------------------------------------
// Barriers
// ---------------------------------------------------------------------------

fn bench_barrier_batch(c: &mut Criterion) {
    let device = RenderDevice::dummy();
    let buffers: Vec<_> = (0..32)
        .map(|i| {
            device
                .create_buffer(
                    1024,
                    BufferUsage::STORAGE,
                    MemoryLocation::GpuOnly,
                    &format!("buffer_{i}"),
                )
                .unwrap()
        })
        .collect();
    let mut barriers = BarrierBuilder::new();

    c.bench_function("barrier_batch_32_buffers", |b| {
        b.iter(|| {
            for buffer in &buffers {
                barriers.buffer_barrier(
                    buffer,
                    BufferAccess::ShaderWrite,
                    BufferAccess::ShaderRead,
                );
            }
            black_box(barriers.len());
            barriers.clear();
        });
    });
}

criterion_group!(
    benches,
    bench_descriptor_cache_hit,
    bench_descriptor_storage_image_mips,
    bench_barrier_batch,
);
criterion_main!(benches);
