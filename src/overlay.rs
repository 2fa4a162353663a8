//! Drawing detected lines on top of the source image.

use image::{DynamicImage, GenericImageView as _, Rgba};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

use crate::{
    model::{BoundingBox, DetectionResponse},
    prelude::*,
};

/// Outline color for detected lines.
pub const OUTLINE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Outline width in pixels, drawn inward from the box edges.
pub const OUTLINE_WIDTH: i64 = 3;

/// A rectangle in pixel space. Both corners are inclusive, and may lie
/// outside the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl PixelRect {
    /// Scale a fractional bounding box to an image of `width` x `height`
    /// pixels. Each corner is rounded to the nearest pixel.
    ///
    /// Returns `None` if any coordinate isn't finite.
    pub fn from_bounding_box(bbox: &BoundingBox, (width, height): (u32, u32)) -> Option<Self> {
        let (w, h) = (f64::from(width), f64::from(height));
        let x0 = bbox.left * w;
        let y0 = bbox.top * h;
        let x1 = x0 + bbox.width * w;
        let y1 = y0 + bbox.height * h;
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        // `as` saturates, so absurdly large boxes just end up off-canvas.
        let (x0, y0, x1, y1) = (
            x0.round() as i64,
            y0.round() as i64,
            x1.round() as i64,
            y1.round() as i64,
        );
        Some(Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        })
    }

    /// The four bands making up an outline `stroke` pixels wide.
    fn outline_bands(&self, stroke: i64) -> [PixelRect; 4] {
        let inner = stroke.saturating_sub(1);
        [
            // Top and bottom.
            PixelRect {
                y1: self.y0.saturating_add(inner).min(self.y1),
                ..*self
            },
            PixelRect {
                y0: self.y1.saturating_sub(inner).max(self.y0),
                ..*self
            },
            // Left and right.
            PixelRect {
                x1: self.x0.saturating_add(inner).min(self.x1),
                ..*self
            },
            PixelRect {
                x0: self.x1.saturating_sub(inner).max(self.x0),
                ..*self
            },
        ]
    }

    /// Intersect with a `width` x `height` canvas. Returns `None` if nothing
    /// is left.
    fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        let x0 = self.x0.max(0);
        let y0 = self.y0.max(0);
        let x1 = self.x1.min(i64::from(width) - 1);
        let y1 = self.y1.min(i64::from(height) - 1);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        // Everything is within the canvas now, so these conversions can't
        // fail for any image we could have decoded.
        let left = i32::try_from(x0).ok()?;
        let top = i32::try_from(y0).ok()?;
        let w = u32::try_from(x1 - x0 + 1).ok()?;
        let h = u32::try_from(y1 - y0 + 1).ok()?;
        Some(Rect::at(left, top).of_size(w, h))
    }
}

/// Pixel rectangles for every `LINE` block, in block order. Blocks with
/// non-finite geometry are skipped.
pub fn line_rects(response: &DetectionResponse, dimensions: (u32, u32)) -> Vec<PixelRect> {
    response
        .line_blocks()
        .filter_map(|block| {
            let rect =
                PixelRect::from_bounding_box(&block.geometry.bounding_box, dimensions);
            if rect.is_none() {
                warn!(id = %block.id, "Skipping LINE block with non-finite geometry");
            }
            rect
        })
        .collect()
}

/// Draw an outline around every `LINE` block.
///
/// Returns a new image with the same color type as `image`, which is left
/// untouched. Boxes that extend past the edges are clipped.
#[instrument(level = "debug", skip_all)]
pub fn render_overlay(image: &DynamicImage, response: &DetectionResponse) -> DynamicImage {
    let (width, height) = image.dimensions();
    let mut canvas = image.clone();
    let rects = line_rects(response, (width, height));
    for rect in &rects {
        for band in rect.outline_bands(OUTLINE_WIDTH) {
            if let Some(clipped) = band.clip(width, height) {
                draw_filled_rect_mut(&mut canvas, clipped, OUTLINE_COLOR);
            }
        }
    }
    debug!(width, height, boxes = rects.len(), "Drew overlay");
    canvas
}
