// SPDX-License-Identifier: GPL-3.0-only

//! Subject estimate types
//!
//! Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
//! so consumers can map them onto any processing resolution.

use crate::constants::saliency::MIN_BOX_SIZE;
use serde::Serialize;

/// A rectangular region within a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }

    /// Region of the given size centered on (cx, cy)
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width * 0.5, cy - height * 0.5, width, height)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Whether the normalized point lies inside the region
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Whether two regions share any area
    pub fn overlaps(&self, other: &FrameRegion) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Scale both sides around the center without containment
    pub fn expanded(&self, factor: f32) -> Self {
        let (cx, cy) = self.center();
        Self::centered(cx, cy, self.width * factor, self.height * factor)
    }

    /// Fit the region inside the unit square with at least `MIN_BOX_SIZE` per side
    ///
    /// Sides are first grown around the center, then the region is shifted
    /// (not shrunk) back inside the frame.
    pub fn contained(&self) -> Self {
        let width = self.width.clamp(MIN_BOX_SIZE, 1.0);
        let height = self.height.clamp(MIN_BOX_SIZE, 1.0);
        let (cx, cy) = self.center();
        let x = (cx - width * 0.5).clamp(0.0, 1.0 - width);
        let y = (cy - height * 0.5).clamp(0.0, 1.0 - height);
        Self::new(x, y, width, height)
    }

    /// Intersection with the unit square (may be empty)
    pub fn clipped(&self) -> Self {
        let x0 = self.x.clamp(0.0, 1.0);
        let y0 = self.y.clamp(0.0, 1.0);
        let x1 = (self.x + self.width).clamp(0.0, 1.0);
        let y1 = (self.y + self.height).clamp(0.0, 1.0);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// How a subject context was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubjectSource {
    /// Featureless frame or no estimate yet
    Default,
    /// Too few salient pixels; fixed box around the centroid
    Fallback,
    /// Bounding box of the selected salient pixels
    Detected,
}

/// Advisory subject estimate read by the lens and effects stages
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubjectContext {
    /// Salience-weighted centroid, normalized
    pub center_x: f32,
    pub center_y: f32,
    /// Subject bounding box, fully inside the frame
    pub bbox: FrameRegion,
    /// Mean linear luminance inside the box
    pub brightness: f32,
    /// Normalized mean salience inside the box
    pub sharpness: f32,
    /// Box area over frame area
    pub area_ratio: f32,
    /// Normalized centroid distance from the frame center
    pub off_center: f32,
    /// Surroundings noticeably brighter than a dark subject
    pub backlit: bool,
    /// Plausibility of the estimate
    pub confidence: f32,
    /// Blend weight consumers move toward this subject with
    pub strength: f32,
    pub source: SubjectSource,
}

impl Default for SubjectContext {
    fn default() -> Self {
        Self {
            center_x: 0.5,
            center_y: 0.5,
            bbox: FrameRegion::new(0.3, 0.3, 0.4, 0.4),
            brightness: 0.0,
            sharpness: 0.0,
            area_ratio: 0.16,
            off_center: 0.0,
            backlit: false,
            confidence: 0.0,
            strength: 0.0,
            source: SubjectSource::Default,
        }
    }
}

impl SubjectContext {
    /// Blend `from` toward the subject center by the subject strength
    pub fn blended_center(&self, from_x: f32, from_y: f32) -> (f32, f32) {
        let t = self.strength.clamp(0.0, 1.0);
        (
            from_x + (self.center_x - from_x) * t,
            from_y + (self.center_y - from_y) * t,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contained_shifts_inside_frame() {
        let r = FrameRegion::new(0.9, -0.1, 0.3, 0.2).contained();
        assert!((r.x - 0.7).abs() < 1e-6);
        assert_eq!(r.y, 0.0);
        assert!(r.x + r.width <= 1.0 + 1e-6);
    }

    #[test]
    fn test_contained_enforces_minimum_size() {
        let r = FrameRegion::new(0.5, 0.5, 0.0, 0.0).contained();
        assert_eq!(r.width, MIN_BOX_SIZE);
        assert_eq!(r.height, MIN_BOX_SIZE);
        assert!(r.area() > 0.0);
    }

    #[test]
    fn test_default_context_does_not_move_center() {
        let ctx = SubjectContext::default();
        assert_eq!(ctx.blended_center(0.6, 0.4), (0.6, 0.4));
    }
}
