//! Texture creation integration tests.

mod common;

use rstest::rstest;

use common::TestContext;
use redlilium_rhi::{
    Extent2D, ImageLayout, ImageUsage, PixelFormat, TextureBuilder, TextureType,
    prepare_for_reading, vk,
};

#[test]
fn test_builder_full_mip_chain() {
    let ctx = TestContext::new();
    let texture = TextureBuilder::new()
        .name("albedo")
        .extent(Extent2D::new(256, 256))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST)
        .setup_optimal_sampler(true)
        .build(&ctx.device)
        .unwrap();

    assert!(texture.is_valid());
    assert_eq!(texture.texture_type(), TextureType::Texture2D);
    assert_eq!(texture.num_mip_levels(), 9);
    assert_eq!(texture.view_count(), 10);
    assert_eq!(texture.layout(), ImageLayout::Undefined);
    assert_ne!(texture.sampler(), vk::Sampler::null());
    assert_eq!(ctx.dummy.live_objects().image_views, 10);
    assert_eq!(ctx.device.sampler_count(), 1);
}

#[rstest]
#[case::cube(true, 0, 0, TextureType::TextureCube)]
#[case::cube_array(true, 0, 3, TextureType::TextureCubeArray)]
#[case::volume(false, 16, 0, TextureType::Texture3D)]
#[case::array(false, 0, 4, TextureType::Texture2DArray)]
fn test_builder_texture_types(
    #[case] cubemap: bool,
    #[case] depth: u32,
    #[case] layers: u32,
    #[case] expected: TextureType,
) {
    let ctx = TestContext::new();
    let texture = TextureBuilder::new()
        .extent(Extent2D::square(16))
        .depth(depth)
        .num_layers(layers)
        .cubemap(cubemap)
        .pixel_format(PixelFormat::Rgba16Float)
        .usage(ImageUsage::SAMPLED)
        .build(&ctx.device)
        .unwrap();
    assert_eq!(texture.texture_type(), expected);
}

#[test]
fn test_unsupported_format_gives_empty_texture() {
    let ctx = TestContext::new();
    ctx.dummy.set_format_features(
        PixelFormat::Rgba32Float.to_vk(),
        vk::FormatFeatureFlags::SAMPLED_IMAGE,
    );
    let texture = TextureBuilder::new()
        .extent(Extent2D::square(64))
        .pixel_format(PixelFormat::Rgba32Float)
        .usage(ImageUsage::STORAGE)
        .build(&ctx.device)
        .unwrap();

    assert!(!texture.is_valid());
    assert_eq!(texture.view_count(), 0);
    assert_eq!(ctx.dummy.live_objects().images, 0);
}

#[test]
#[should_panic]
fn test_non_square_cubemap() {
    let ctx = TestContext::new();
    let _ = TextureBuilder::new()
        .extent(Extent2D::new(64, 32))
        .cubemap(true)
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED)
        .build(&ctx.device);
}

#[test]
#[should_panic(expected = "texture extent must be non-zero")]
fn test_zero_extent_is_rejected() {
    let ctx = TestContext::new();
    let _ = TextureBuilder::new()
        .extent(Extent2D::new(0, 0))
        .pixel_format(PixelFormat::Rgba8Unorm)
        .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST)
        .build(&ctx.device);
}

#[test]
fn test_textures_release_everything_on_drop() {
    let ctx = TestContext::new();
    {
        let _color = ctx.color_target(32);
        let _depth = TextureBuilder::new()
            .extent(Extent2D::square(32))
            .pixel_format(PixelFormat::Depth32Float)
            .usage(ImageUsage::RENDER_TARGET | ImageUsage::SAMPLED)
            .build(&ctx.device)
            .unwrap();
        assert_eq!(ctx.dummy.live_objects().images, 2);
    }
    let live = ctx.dummy.live_objects();
    assert_eq!(live.images, 0);
    assert_eq!(live.image_views, 0);
}

#[test]
fn test_depth_texture_reads_in_depth_layout() {
    let ctx = TestContext::new();
    let mut depth = TextureBuilder::new()
        .extent(Extent2D::square(32))
        .pixel_format(PixelFormat::Depth32Float)
        .num_mip_levels(1)
        .usage(ImageUsage::RENDER_TARGET | ImageUsage::SAMPLED)
        .build(&ctx.device)
        .unwrap();
    assert_eq!(depth.aspect_mask(), vk::ImageAspectFlags::DEPTH);

    let mut cb = ctx.recording();
    prepare_for_reading(&mut cb, &mut depth);
    assert_eq!(depth.layout(), ImageLayout::DepthStencilReadOnly);
}

#[test]
fn test_swapchain_image_is_not_destroyed() {
    let ctx = TestContext::new();
    let texture = TextureBuilder::new()
        .extent(Extent2D::square(4))
        .pixel_format(PixelFormat::Bgra8Unorm)
        .num_mip_levels(1)
        .usage(ImageUsage::RENDER_TARGET)
        .build(&ctx.device)
        .unwrap();
    let wrapped = ctx
        .device
        .wrap_swapchain_image(texture.image(), texture.extent(), PixelFormat::Bgra8Unorm)
        .unwrap();
    assert!(!wrapped.is_owned());
    drop(wrapped);
    assert_eq!(ctx.dummy.live_objects().images, 1);
}
