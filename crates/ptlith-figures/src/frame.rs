//! World-to-pixel mapping for layout previews.

use ptlith_core::geometry::{BBox, Point};

/// Maps layout coordinates (micrometers, y up) to pixel coordinates
/// (y down) with a uniform scale and a fixed margin, keeping the layout
/// centered in the image.
#[derive(Debug, Clone, Copy)]
pub struct FigureFrame {
    width_px: u32,
    height_px: u32,
    center: Point,
    scale: f64,
}

impl FigureFrame {
    /// Fit `world` into a `width_px` x `height_px` image with `margin_px`
    /// of padding on every side.
    pub fn fit(world: &BBox, width_px: u32, height_px: u32, margin_px: f64) -> Self {
        let avail_w = (width_px as f64 - 2.0 * margin_px).max(1.0);
        let avail_h = (height_px as f64 - 2.0 * margin_px).max(1.0);
        let world_w = world.width().max(f64::EPSILON);
        let world_h = world.height().max(f64::EPSILON);
        let scale = (avail_w / world_w).min(avail_h / world_h);

        Self {
            width_px,
            height_px,
            center: world.center(),
            scale,
        }
    }

    /// Pixels per micrometer.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Convert a world point to pixel coordinates, flipping the y axis.
    pub fn to_pixel(&self, p: &Point) -> (i32, i32) {
        let px = self.width_px as f64 / 2.0 + (p.x - self.center.x) * self.scale;
        let py = self.height_px as f64 / 2.0 - (p.y - self.center.y) * self.scale;
        (px.round() as i32, py.round() as i32)
    }

    /// Convert a length in micrometers to pixels, at least one pixel.
    pub fn to_pixel_len(&self, len: f64) -> u32 {
        ((len * self.scale).round() as u32).max(1)
    }
}
