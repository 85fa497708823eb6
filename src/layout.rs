//! Placement geometry for the wall engine.
//!
//! Pure helpers over plain values. Positions are in page pixels with the
//! origin at the top-left of the scroll container; the viewport is a
//! window onto that space offset by the scroll position.

use crate::manifest::AnchorPoint;
use crate::Viewport;

/// A position or offset in page pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Display size used when none is configured.
///
/// Wide viewports get a fixed 500px square; narrow ones scale with the
/// viewport width, capped at 300px.
pub fn fallback_display_size(viewport: Viewport, narrow_below: u32) -> f64 {
    if viewport.width < narrow_below {
        (f64::from(viewport.width) * 0.5).min(300.0)
    } else {
        500.0
    }
}

/// Uniform scale that fits an image into a `display_size` square.
///
/// The longest natural edge maps onto `display_size`, so the aspect ratio
/// is always preserved.
pub fn scale_factor(natural_w: u32, natural_h: u32, display_size: f64) -> f64 {
    let longest = natural_w.max(natural_h).max(1);
    display_size / f64::from(longest)
}

/// Rendered dimensions after applying `scale`
pub fn scaled_dimensions(natural_w: u32, natural_h: u32, scale: f64) -> (f64, f64) {
    (f64::from(natural_w) * scale, f64::from(natural_h) * scale)
}

/// Pixel offset of a fractional anchor from the image's top-left corner
pub fn anchor_offset(anchor: AnchorPoint, scaled_w: f64, scaled_h: f64) -> Point {
    Point::new(anchor.x * scaled_w, anchor.y * scaled_h)
}

/// Top-left position that puts this image's entry anchor exactly on the
/// previous image's exit anchor
pub fn connected_position(prev_exit: Point, entry: Point) -> Point {
    Point::new(prev_exit.x - entry.x, prev_exit.y - entry.y)
}

/// Top-left position centering a `display_size` square in the viewport
pub fn centered_position(viewport: Viewport, display_size: f64) -> Point {
    Point::new(
        (f64::from(viewport.width) - display_size) / 2.0,
        (f64::from(viewport.height) - display_size) / 2.0,
    )
}

/// Whole-pixel position with a 1px upward overlap, used by the constrained
/// profile to hide hairline seams between chained images
pub fn snapped_overlap(position: Point) -> Point {
    Point::new(position.x.floor(), position.y.floor() - 1.0)
}

/// Vertical distance between an image's center and the viewport center.
/// `top` is in viewport coordinates.
pub fn center_distance(top: f64, height: f64, viewport: Viewport) -> f64 {
    let image_center = top + height / 2.0;
    (image_center - f64::from(viewport.height) / 2.0).abs()
}

/// Distance between an image and the visible band, used to order eviction
/// candidates. Zero while any part of the image is visible. `top` is in
/// viewport coordinates.
pub fn viewport_distance(top: f64, height: f64, viewport: Viewport) -> f64 {
    let bottom = top + height;
    if bottom < 0.0 {
        -bottom
    } else if top > f64::from(viewport.height) {
        top - f64::from(viewport.height)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor_landscape() {
        // 200x100 into a 100px square scales by the width
        let scale = scale_factor(200, 100, 100.0);
        assert!((scale - 0.5).abs() < 1e-9);
        let (w, h) = scaled_dimensions(200, 100, scale);
        assert!((w - 100.0).abs() < 1e-9);
        assert!((h - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_factor_portrait() {
        let scale = scale_factor(100, 400, 100.0);
        assert!((scale - 0.25).abs() < 1e-9);
        let (w, h) = scaled_dimensions(100, 400, scale);
        assert!((w - 25.0).abs() < 1e-9);
        assert!((h - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_factor_square() {
        assert!((scale_factor(300, 300, 150.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_offset() {
        let anchor = AnchorPoint { x: 0.9, y: 0.9 };
        let offset = anchor_offset(anchor, 100.0, 50.0);
        assert!((offset.x - 90.0).abs() < 1e-9);
        assert!((offset.y - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_connected_position_joins_anchors() {
        let prev_exit = Point::new(640.0, 400.0);
        let entry = Point::new(12.5, 80.0);
        let top_left = connected_position(prev_exit, entry);
        // The entry anchor of the new image must land on the exit anchor
        assert!((top_left.x + entry.x - prev_exit.x).abs() < 1e-9);
        assert!((top_left.y + entry.y - prev_exit.y).abs() < 1e-9);
    }

    #[test]
    fn test_centered_position() {
        let viewport = Viewport {
            width: 1280,
            height: 720,
        };
        let position = centered_position(viewport, 100.0);
        assert!((position.x - 590.0).abs() < 1e-9);
        assert!((position.y - 310.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_display_size() {
        let wide = Viewport {
            width: 1280,
            height: 720,
        };
        let narrow = Viewport {
            width: 400,
            height: 800,
        };
        let very_narrow = Viewport {
            width: 320,
            height: 568,
        };
        assert!((fallback_display_size(wide, 768) - 500.0).abs() < 1e-9);
        // Half the width, capped at 300
        assert!((fallback_display_size(narrow, 768) - 200.0).abs() < 1e-9);
        assert!((fallback_display_size(very_narrow, 768) - 160.0).abs() < 1e-9);
        let almost = Viewport {
            width: 700,
            height: 900,
        };
        assert!((fallback_display_size(almost, 768) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapped_overlap() {
        let snapped = snapped_overlap(Point::new(12.7, 34.2));
        assert!((snapped.x - 12.0).abs() < 1e-9);
        assert!((snapped.y - 33.0).abs() < 1e-9);
    }

    #[test]
    fn test_center_distance() {
        let viewport = Viewport {
            width: 1280,
            height: 720,
        };
        // An image centered in the viewport has distance zero
        assert!(center_distance(310.0, 100.0, viewport) < 1e-9);
        assert!((center_distance(0.0, 100.0, viewport) - 310.0).abs() < 1e-9);
        assert!((center_distance(620.0, 100.0, viewport) - 310.0).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_distance() {
        let viewport = Viewport {
            width: 1280,
            height: 720,
        };
        // Far above: measured from the image bottom to the viewport top
        assert!((viewport_distance(-1000.0, 200.0, viewport) - 800.0).abs() < 1e-9);
        // Far below: measured from the image top to the viewport bottom
        assert!((viewport_distance(2000.0, 200.0, viewport) - 1280.0).abs() < 1e-9);
        // Anything visible, even partially, has distance zero
        assert!(viewport_distance(310.0, 100.0, viewport) < 1e-9);
        assert!(viewport_distance(-50.0, 100.0, viewport) < 1e-9);
        assert!(viewport_distance(700.0, 100.0, viewport) < 1e-9);
    }
}
