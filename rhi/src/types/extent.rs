//! Extents, rectangles and mip chain arithmetic.

use ash::vk;

/// Width and height of an image or region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square extent, as used by cube faces.
    pub const fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }

    pub fn is_square(self) -> bool {
        self.width == self.height
    }

    pub fn to_vk(self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

impl From<vk::Extent2D> for Extent2D {
    fn from(extent: vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }
}

/// Width, height and depth of a mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// Integer rectangle used for render areas, viewports and scissors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub extent: Extent2D,
}

impl Rect2D {
    pub const fn new(x: i32, y: i32, extent: Extent2D) -> Self {
        Self { x, y, extent }
    }

    /// Rectangle covering the whole extent.
    pub const fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, extent }
    }

    pub fn to_vk(self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D {
                x: self.x,
                y: self.y,
            },
            extent: self.extent.to_vk(),
        }
    }

    /// Full-depth viewport over this rectangle.
    pub fn to_viewport(self) -> vk::Viewport {
        vk::Viewport {
            x: self.x as f32,
            y: self.y as f32,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Length of the full mip chain for an extent: `floor(log2(max(w, h))) + 1`.
///
/// A zero extent has no mips.
pub fn calc_mip_levels(extent: Extent2D) -> u32 {
    let largest = extent.width.max(extent.height);
    if largest == 0 {
        0
    } else {
        u32::BITS - largest.leading_zeros()
    }
}

/// Extent of mip `level`: each component halved `level` times, rounded down.
pub fn calc_mip_size(extent: Extent3D, level: u32) -> Extent3D {
    let shrink = |value: u32| value.checked_shr(level).unwrap_or(0);
    Extent3D::new(
        shrink(extent.width),
        shrink(extent.height),
        shrink(extent.depth),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Extent2D::new(1, 1), 1)]
    #[case(Extent2D::new(2, 1), 2)]
    #[case(Extent2D::new(256, 256), 9)]
    #[case(Extent2D::new(255, 64), 8)]
    #[case(Extent2D::new(300, 1024), 11)]
    #[case(Extent2D::new(0, 0), 0)]
    fn test_calc_mip_levels(#[case] extent: Extent2D, #[case] expected: u32) {
        assert_eq!(calc_mip_levels(extent), expected);
    }

    #[test]
    fn test_calc_mip_size() {
        let base = Extent3D::new(256, 100, 1);
        assert_eq!(calc_mip_size(base, 0), base);
        assert_eq!(calc_mip_size(base, 1), Extent3D::new(128, 50, 0));
        assert_eq!(calc_mip_size(base, 3), Extent3D::new(32, 12, 0));
        assert_eq!(calc_mip_size(base, 8), Extent3D::new(1, 0, 0));
        assert_eq!(calc_mip_size(base, 40), Extent3D::new(0, 0, 0));
    }

    #[test]
    fn test_viewport_covers_rect() {
        let viewport = Rect2D::new(4, 8, Extent2D::new(640, 480)).to_viewport();
        assert_eq!(viewport.x, 4.0);
        assert_eq!(viewport.height, 480.0);
        assert_eq!(viewport.max_depth, 1.0);
    }
}
