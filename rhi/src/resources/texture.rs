//! GPU texture resource.
//!
//! A [`Texture`] owns (or wraps) one image and every view onto it: the
//! whole-resource view, one view per mip level and, for layered and cube
//! types, one single-mip view per (layer, face) pair. Views are created
//! together with the texture and destroyed with it.

use std::fmt;
use std::sync::Arc;

use ash::vk;

use crate::backend::{AllocatedImage, GpuBackend};
use crate::device::RenderDevice;
use crate::error::RhiResult;
use crate::profiling::profile_scope;
use crate::types::{
    Extent2D, Extent3D, ImageLayout, ImageUsage, PixelFormat, SamplerInfo, TextureType,
    calc_mip_levels, calc_mip_size,
};

/// Where the texture's image comes from.
#[derive(Default)]
enum ImageStorage {
    /// No image; the texture is the empty value.
    #[default]
    Empty,
    /// Image and memory owned by the texture.
    Owned {
        backend: Arc<dyn GpuBackend>,
        image: AllocatedImage,
    },
    /// Image owned elsewhere (swapchain); only the views are owned.
    External {
        backend: Arc<dyn GpuBackend>,
        image: vk::Image,
    },
}

impl ImageStorage {
    fn backend(&self) -> Option<&Arc<dyn GpuBackend>> {
        match self {
            Self::Empty => None,
            Self::Owned { backend, .. } | Self::External { backend, .. } => Some(backend),
        }
    }

    fn image(&self) -> vk::Image {
        match self {
            Self::Empty => vk::Image::null(),
            Self::Owned { image, .. } => image.handle,
            Self::External { image, .. } => *image,
        }
    }
}

/// Resolved shape of a texture about to be created.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextureShape {
    pub extent: Extent2D,
    /// Zero for anything but 3-D textures.
    pub depth: u32,
    pub format: PixelFormat,
    /// Zero selects the full mip chain.
    pub num_mip_levels: u32,
    /// Zero means not arrayed.
    pub num_layers: u32,
    /// 6 for cube maps, 1 otherwise.
    pub num_faces: u32,
    pub usage: ImageUsage,
}

/// A GPU texture.
///
/// Textures are movable but not copyable. [`Texture::default`] is the empty
/// texture returned when a format/usage combination is unsupported; check
/// [`is_valid`](Self::is_valid) before use.
#[derive(Default)]
pub struct Texture {
    storage: ImageStorage,
    texture_type: TextureType,
    format: PixelFormat,
    extent: Extent2D,
    depth: u32,
    num_mip_levels: u32,
    num_layers: u32,
    num_faces: u32,
    usage: ImageUsage,
    layout: ImageLayout,
    view: vk::ImageView,
    mip_views: Vec<vk::ImageView>,
    layer_views: Vec<vk::ImageView>,
    /// Borrowed from the device sampler cache; never destroyed here.
    sampler: vk::Sampler,
}

impl Texture {
    /// Allocate an image of `shape` and create its full view set.
    pub(crate) fn allocate(
        backend: &Arc<dyn GpuBackend>,
        shape: TextureShape,
        name: &str,
    ) -> RhiResult<Self> {
        profile_scope!("Texture::allocate");

        // Height may be zero for 1-D textures; width never.
        assert!(
            shape.extent.width > 0,
            "texture extent must be non-zero, got {}x{}",
            shape.extent.width,
            shape.extent.height
        );

        let texture_type = TextureType::derive(
            shape.extent.height,
            shape.depth,
            shape.num_faces,
            shape.num_layers,
        );
        assert!(
            texture_type != TextureType::Undefined,
            "3-D textures cannot be arrayed (depth {}, layers {})",
            shape.depth,
            shape.num_layers
        );
        if texture_type.is_cube() {
            assert!(
                shape.extent.is_square(),
                "cube faces must be square, got {}x{}",
                shape.extent.width,
                shape.extent.height
            );
        }

        let num_mip_levels = if shape.num_mip_levels == 0 {
            calc_mip_levels(shape.extent)
        } else {
            shape.num_mip_levels
        };
        let array_layers = shape.num_layers.max(1) * shape.num_faces;

        let mut flags = vk::ImageCreateFlags::empty();
        if texture_type.is_cube() {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }
        let render_target = shape.usage.contains(ImageUsage::RENDER_TARGET);
        if texture_type == TextureType::Texture3D && render_target {
            flags |= vk::ImageCreateFlags::TYPE_2D_ARRAY_COMPATIBLE;
        }

        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(texture_type.image_type())
            .format(shape.format.to_vk())
            .extent(vk::Extent3D {
                width: shape.extent.width,
                height: shape.extent.height.max(1),
                depth: shape.depth.max(1),
            })
            .mip_levels(num_mip_levels)
            .array_layers(array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(shape.usage.to_vk(shape.format.aspect_mask()))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = backend.create_image(&image_info, name)?;

        // From here on a failure drops `texture`, which releases whatever was
        // created so far.
        let mut texture = Self::without_views(
            ImageStorage::Owned {
                backend: Arc::clone(backend),
                image,
            },
            texture_type,
            TextureShape {
                num_mip_levels,
                ..shape
            },
        );
        texture.create_views(backend)?;

        log::debug!(
            "Created {:?} texture {:?} ({}x{}x{}, {:?}, {} mips, {} layers, {} views)",
            texture_type,
            name,
            shape.extent.width,
            shape.extent.height,
            shape.depth,
            shape.format,
            num_mip_levels,
            array_layers,
            texture.view_count()
        );

        Ok(texture)
    }

    /// Wrap an externally owned 2-D image, such as a swapchain image.
    ///
    /// The views are owned by the texture, the image is not.
    pub(crate) fn wrap_external(
        backend: &Arc<dyn GpuBackend>,
        image: vk::Image,
        extent: Extent2D,
        format: PixelFormat,
    ) -> RhiResult<Self> {
        assert!(image != vk::Image::null(), "cannot wrap a null image");

        let mut texture = Self::without_views(
            ImageStorage::External {
                backend: Arc::clone(backend),
                image,
            },
            TextureType::Texture2D,
            TextureShape {
                extent,
                depth: 0,
                format,
                num_mip_levels: 1,
                num_layers: 0,
                num_faces: 1,
                usage: ImageUsage::RENDER_TARGET | ImageUsage::TRANSFER_DST,
            },
        );
        texture.create_views(backend)?;
        Ok(texture)
    }

    fn without_views(
        storage: ImageStorage,
        texture_type: TextureType,
        shape: TextureShape,
    ) -> Self {
        Self {
            storage,
            texture_type,
            format: shape.format,
            extent: shape.extent,
            depth: shape.depth,
            num_mip_levels: shape.num_mip_levels,
            num_layers: shape.num_layers,
            num_faces: shape.num_faces,
            usage: shape.usage,
            layout: ImageLayout::Undefined,
            view: vk::ImageView::null(),
            mip_views: Vec::new(),
            layer_views: Vec::new(),
            sampler: vk::Sampler::null(),
        }
    }

    fn view_info(
        &self,
        view_type: vk::ImageViewType,
        base_mip_level: u32,
        level_count: u32,
        base_array_layer: u32,
        layer_count: u32,
    ) -> vk::ImageViewCreateInfo<'static> {
        vk::ImageViewCreateInfo::default()
            .image(self.storage.image())
            .view_type(view_type)
            .format(self.format.to_vk())
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.format.aspect_mask(),
                base_mip_level,
                level_count,
                base_array_layer,
                layer_count,
            })
    }

    fn create_views(&mut self, backend: &Arc<dyn GpuBackend>) -> RhiResult<()> {
        let array_layers = self.array_layers();
        let view_type = self.texture_type.view_type();

        self.view = backend.create_image_view(&self.view_info(
            view_type,
            0,
            self.num_mip_levels,
            0,
            array_layers,
        ))?;

        for mip in 0..self.num_mip_levels {
            let view =
                backend.create_image_view(&self.view_info(view_type, mip, 1, 0, array_layers))?;
            self.mip_views.push(view);
        }

        if self.texture_type.is_layered() {
            let layer_view_type = self.texture_type.layer_view_type();
            for layer in 0..array_layers {
                let view = backend
                    .create_image_view(&self.view_info(layer_view_type, 0, 1, layer, 1))?;
                self.layer_views.push(view);
            }
        }

        Ok(())
    }

    /// Check whether this texture holds an image.
    pub fn is_valid(&self) -> bool {
        !matches!(self.storage, ImageStorage::Empty)
    }

    /// Whether the image memory is owned by this texture.
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, ImageStorage::Owned { .. })
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Depth of a 3-D texture, zero otherwise.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn num_mip_levels(&self) -> u32 {
        self.num_mip_levels
    }

    /// Requested layer count; zero for non-arrayed textures.
    pub fn num_layers(&self) -> u32 {
        self.num_layers
    }

    pub fn num_faces(&self) -> u32 {
        self.num_faces
    }

    /// Number of API array layers: layers times faces.
    pub fn array_layers(&self) -> u32 {
        self.num_layers.max(1) * self.num_faces.max(1)
    }

    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    pub fn image(&self) -> vk::Image {
        self.storage.image()
    }

    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.format.aspect_mask()
    }

    /// Layout the texture is in once all recorded barriers have executed.
    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: ImageLayout) {
        self.layout = layout;
    }

    /// Whole-resource view.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn mip_views(&self) -> &[vk::ImageView] {
        &self.mip_views
    }

    pub fn layer_views(&self) -> &[vk::ImageView] {
        &self.layer_views
    }

    /// View of mip `level` across all layers.
    ///
    /// # Panics
    ///
    /// Panics if `level` is not below the mip count.
    pub fn get_mip_level(&self, level: u32) -> vk::ImageView {
        assert!(
            level < self.num_mip_levels,
            "mip level {} out of range (texture has {} mips)",
            level,
            self.num_mip_levels
        );
        self.mip_views[level as usize]
    }

    /// Single-mip view of one (layer, face) pair of a layered texture.
    ///
    /// # Panics
    ///
    /// Panics if the texture has no layer views or either index is out of range.
    pub fn get_layer(&self, layer: u32, face: u32) -> vk::ImageView {
        assert!(
            self.texture_type.is_layered(),
            "{:?} texture has no per-layer views",
            self.texture_type
        );
        let num_layers = self.num_layers.max(1);
        assert!(
            layer < num_layers,
            "layer {} out of range (texture has {} layers)",
            layer,
            num_layers
        );
        assert!(
            face < self.num_faces,
            "face {} out of range (texture has {} faces)",
            face,
            self.num_faces
        );
        self.layer_views[(layer * self.num_faces + face) as usize]
    }

    /// Sampler attached to the texture, or a null handle.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Attach a sampler; the texture does not take ownership.
    pub fn set_sampler(&mut self, sampler: vk::Sampler) {
        self.sampler = sampler;
    }

    pub fn is_cubemap(&self) -> bool {
        self.texture_type.is_cube()
    }

    /// Whole view + mip views + layer views.
    pub fn view_count(&self) -> usize {
        let whole = usize::from(self.view != vk::ImageView::null());
        whole + self.mip_views.len() + self.layer_views.len()
    }

    /// Extent of mip `level`, clamped to at least one texel per axis.
    pub fn mip_extent(&self, level: u32) -> Extent3D {
        let base = Extent3D::new(
            self.extent.width,
            self.extent.height.max(1),
            self.depth.max(1),
        );
        let size = calc_mip_size(base, level);
        Extent3D::new(size.width.max(1), size.height.max(1), size.depth.max(1))
    }

    /// Attach the device's optimal sampler for this texture's mip count.
    pub fn setup_optimal_sampler(&mut self, device: &RenderDevice) -> RhiResult<()> {
        self.sampler = device.get_sampler(&SamplerInfo::optimal(self.num_mip_levels))?;
        Ok(())
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        let storage = std::mem::take(&mut self.storage);
        let Some(backend) = storage.backend() else {
            return;
        };

        for view in self.layer_views.drain(..) {
            backend.destroy_image_view(view);
        }
        for view in self.mip_views.drain(..) {
            backend.destroy_image_view(view);
        }
        if self.view != vk::ImageView::null() {
            backend.destroy_image_view(self.view);
        }

        if let ImageStorage::Owned { backend, image } = storage {
            backend.destroy_image(image);
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("type", &self.texture_type)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("depth", &self.depth)
            .field("mips", &self.num_mip_levels)
            .field("layers", &self.num_layers)
            .field("faces", &self.num_faces)
            .field("usage", &format_args!("{}", self.usage))
            .field("layout", &self.layout)
            .field("owned", &self.is_owned())
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);

/// Builder for textures.
///
/// ```ignore
/// let texture = TextureBuilder::new()
///     .extent(Extent2D::new(256, 256))
///     .pixel_format(PixelFormat::Rgba8Unorm)
///     .usage(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST)
///     .setup_optimal_sampler(true)
///     .build(&device)?;
/// if !texture.is_valid() {
///     // format not supported for this usage
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TextureBuilder {
    name: String,
    extent: Extent2D,
    depth: u32,
    format: PixelFormat,
    num_mip_levels: u32,
    num_layers: u32,
    cubemap: bool,
    usage: ImageUsage,
    optimal_sampler: bool,
}

impl TextureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debug name passed to the allocator.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn extent(mut self, extent: Extent2D) -> Self {
        self.extent = extent;
        self
    }

    /// Depth of a 3-D texture; zero keeps the texture 1-D or 2-D.
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Mip count; zero selects the full chain.
    pub fn num_mip_levels(mut self, num_mip_levels: u32) -> Self {
        self.num_mip_levels = num_mip_levels;
        self
    }

    /// Layer count; zero means not arrayed.
    pub fn num_layers(mut self, num_layers: u32) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn cubemap(mut self, cubemap: bool) -> Self {
        self.cubemap = cubemap;
        self
    }

    pub fn usage(mut self, usage: ImageUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Attach a linear filtering sampler after creation.
    pub fn setup_optimal_sampler(mut self, enabled: bool) -> Self {
        self.optimal_sampler = enabled;
        self
    }

    /// Create the texture.
    ///
    /// Returns the empty texture when the device does not support the
    /// format for the requested usage.
    ///
    /// # Panics
    ///
    /// Panics on inconsistent requests: a cube map with a non-square extent
    /// or an arrayed 3-D texture.
    pub fn build(&self, device: &RenderDevice) -> RhiResult<Texture> {
        if !device.is_format_supported(self.format, self.usage) {
            log::warn!(
                "Format {:?} does not support usage [{}]; returning an empty texture",
                self.format,
                self.usage
            );
            return Ok(Texture::default());
        }

        let name = if self.name.is_empty() {
            "texture"
        } else {
            self.name.as_str()
        };

        let mut texture = if self.cubemap {
            device.create_cubemap_named(
                self.extent,
                self.format,
                self.num_mip_levels,
                self.num_layers,
                self.usage,
                name,
            )?
        } else if self.depth > 0 {
            device.create_texture_3d_named(
                self.extent,
                self.depth,
                self.format,
                self.num_mip_levels,
                self.usage,
                name,
            )?
        } else {
            device.create_texture_2d_named(
                self.extent,
                self.format,
                self.num_mip_levels,
                self.num_layers,
                self.usage,
                name,
            )?
        };

        if self.optimal_sampler {
            texture.setup_optimal_sampler(device)?;
        }

        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use ash::vk::Handle;
    use rstest::rstest;

    fn shape(extent: Extent2D, depth: u32, layers: u32, faces: u32) -> TextureShape {
        TextureShape {
            extent,
            depth,
            format: PixelFormat::Rgba8Unorm,
            num_mip_levels: 0,
            num_layers: layers,
            num_faces: faces,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
        }
    }

    #[test]
    fn test_default_is_empty() {
        let texture = Texture::default();
        assert!(!texture.is_valid());
        assert_eq!(texture.view_count(), 0);
        assert_eq!(texture.image(), vk::Image::null());
    }

    #[rstest]
    #[case::plane(Extent2D::new(256, 256), 0, 0, 1, 9, 0)]
    #[case::plane_array(Extent2D::new(64, 32), 0, 4, 1, 7, 4)]
    #[case::cube(Extent2D::square(16), 0, 0, 6, 5, 6)]
    #[case::cube_array(Extent2D::square(16), 0, 2, 6, 5, 12)]
    #[case::volume(Extent2D::new(32, 32), 8, 0, 1, 6, 0)]
    #[case::line_array(Extent2D::new(128, 0), 0, 3, 1, 8, 3)]
    fn test_view_counts(
        #[case] extent: Extent2D,
        #[case] depth: u32,
        #[case] layers: u32,
        #[case] faces: u32,
        #[case] mips: u32,
        #[case] layer_views: usize,
    ) {
        let dummy = Arc::new(DummyBackend::new());
        let backend: Arc<dyn GpuBackend> = dummy.clone();
        let texture =
            Texture::allocate(&backend, shape(extent, depth, layers, faces), "test").unwrap();

        assert_eq!(texture.num_mip_levels(), mips);
        assert_eq!(texture.mip_views().len(), mips as usize);
        assert_eq!(texture.layer_views().len(), layer_views);
        assert_eq!(texture.view_count(), 1 + mips as usize + layer_views);
        assert_eq!(dummy.live_objects().image_views, texture.view_count());
    }

    #[test]
    fn test_drop_releases_views_and_image() {
        let dummy = Arc::new(DummyBackend::new());
        let backend: Arc<dyn GpuBackend> = dummy.clone();
        let texture =
            Texture::allocate(&backend, shape(Extent2D::square(8), 0, 0, 6), "cube").unwrap();
        assert_eq!(dummy.live_objects().images, 1);

        drop(texture);
        let live = dummy.live_objects();
        assert_eq!(live.images, 0);
        assert_eq!(live.image_views, 0);
    }

    #[test]
    fn test_external_image_is_not_destroyed() {
        let dummy = Arc::new(DummyBackend::new());
        let backend: Arc<dyn GpuBackend> = dummy.clone();
        let image = vk::Image::from_raw(0xdead);
        let texture = Texture::wrap_external(
            &backend,
            image,
            Extent2D::new(800, 600),
            PixelFormat::Bgra8UnormSrgb,
        )
        .unwrap();

        assert!(texture.is_valid());
        assert!(!texture.is_owned());
        assert_eq!(texture.image(), image);
        assert_eq!(texture.view_count(), 2);
        assert_eq!(dummy.live_objects().images, 0);

        drop(texture);
        assert_eq!(dummy.live_objects().image_views, 0);
    }

    #[test]
    fn test_layer_index() {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let texture =
            Texture::allocate(&backend, shape(Extent2D::square(4), 0, 2, 6), "cubes").unwrap();
        assert_eq!(texture.get_layer(1, 2), texture.layer_views()[8]);
        assert_eq!(texture.get_layer(0, 0), texture.layer_views()[0]);
    }

    #[test]
    #[should_panic(expected = "mip level 3 out of range")]
    fn test_mip_out_of_range() {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let texture =
            Texture::allocate(&backend, shape(Extent2D::new(4, 4), 0, 0, 1), "small").unwrap();
        texture.get_mip_level(3);
    }

    #[test]
    #[should_panic(expected = "face 6 out of range")]
    fn test_face_out_of_range() {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let texture =
            Texture::allocate(&backend, shape(Extent2D::square(4), 0, 0, 6), "cube").unwrap();
        texture.get_layer(0, 6);
    }

    #[test]
    #[should_panic(expected = "cube faces must be square")]
    fn test_non_square_cube() {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let _ = Texture::allocate(&backend, shape(Extent2D::new(8, 4), 0, 0, 6), "cube");
    }

    #[rstest]
    #[case::empty(Extent2D::new(0, 0))]
    #[case::zero_width(Extent2D::new(0, 16))]
    #[should_panic(expected = "texture extent must be non-zero")]
    fn test_zero_extent(#[case] extent: Extent2D) {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let _ = Texture::allocate(&backend, shape(extent, 0, 0, 1), "empty");
    }

    #[test]
    fn test_mip_extent_clamps_to_one() {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let texture =
            Texture::allocate(&backend, shape(Extent2D::new(256, 64), 0, 0, 1), "wide").unwrap();
        assert_eq!(texture.mip_extent(0), Extent3D::new(256, 64, 1));
        assert_eq!(texture.mip_extent(2), Extent3D::new(64, 16, 1));
        assert_eq!(texture.mip_extent(8), Extent3D::new(1, 1, 1));
    }
}
