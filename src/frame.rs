// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources
//!
//! The core pulls frames, it never receives pushes. A source exposes an RGBA8
//! (sRGB-encoded, tightly packed) pixel surface plus a generation counter that
//! changes whenever the pixels do, so static images are uploaded only once.

use crate::errors::{EngineError, EngineResult};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::sync::Arc;

/// A pullable RGBA8 frame
pub trait FrameSource {
    /// Native width in pixels
    fn width(&self) -> u32;

    /// Native height in pixels
    fn height(&self) -> u32;

    /// Tightly packed RGBA8 pixels (width * height * 4 bytes)
    fn pixels(&self) -> &[u8];

    /// Changes whenever the pixel contents change
    fn generation(&self) -> u64;

    /// Whether the source mutates in place (video, webcam)
    fn is_live(&self) -> bool {
        false
    }
}

fn check_len(width: u32, height: u32, len: usize) -> EngineResult<()> {
    let expected = width as usize * height as usize * 4;
    if width == 0 || height == 0 {
        return Err(EngineError::InvalidFrame(format!(
            "frame has zero area ({}x{})",
            width, height
        )));
    }
    if len != expected {
        return Err(EngineError::InvalidFrame(format!(
            "RGBA data is {} bytes, expected {} for {}x{}",
            len, expected, width, height
        )));
    }
    Ok(())
}

/// Reject sources whose pixel buffer does not match their declared size
pub fn validate_source(source: &dyn FrameSource) -> EngineResult<()> {
    check_len(source.width(), source.height(), source.pixels().len())
}

/// Immutable image source
#[derive(Debug, Clone)]
pub struct StaticFrame {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl StaticFrame {
    /// Wrap RGBA8 pixels, validating the buffer length
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> EngineResult<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data: Arc::from(data),
        })
    }

    /// Uniformly colored frame
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> EngineResult<Self> {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, data)
    }

    /// Take ownership of a decoded image
    pub fn from_image(image: RgbaImage) -> EngineResult<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Decode an image file from disk
    pub fn open(path: &std::path::Path) -> EngineResult<Self> {
        let image = image::open(path)?.to_rgba8();
        Self::from_image(image)
    }
}

impl FrameSource for StaticFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixels(&self) -> &[u8] {
        &self.data
    }

    fn generation(&self) -> u64 {
        0
    }
}

/// Source whose pixels are overwritten in place (video playback, webcam)
#[derive(Debug, Clone)]
pub struct LiveFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    generation: u64,
}

impl LiveFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> EngineResult<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
            generation: 0,
        })
    }

    /// Mutate the current pixels in place
    pub fn update(&mut self, write: impl FnOnce(&mut [u8])) {
        write(&mut self.data);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Replace the frame, possibly with new dimensions
    pub fn replace(&mut self, width: u32, height: u32, data: Vec<u8>) -> EngineResult<()> {
        check_len(width, height, data.len())?;
        self.width = width;
        self.height = height;
        self.data = data;
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }
}

impl FrameSource for LiveFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixels(&self) -> &[u8] {
        &self.data
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Small RGBA8 copy of a frame for CPU-side analysis
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampledFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DownsampledFrame {
    /// RGBA of the pixel at (x, y)
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ]
    }
}

/// Dimensions that fit within `max_dimension` while preserving aspect ratio
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = max_dimension as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    (w, h)
}

/// Downsample a source for the subject estimator
///
/// Returns `None` when the source pixels do not match its declared size.
pub fn downsample_for_saliency(
    source: &dyn FrameSource,
    max_dimension: u32,
) -> Option<DownsampledFrame> {
    validate_source(source).ok()?;
    let (width, height) = (source.width(), source.height());

    let (w, h) = fit_within(width, height, max_dimension);
    if (w, h) == (width, height) {
        return Some(DownsampledFrame {
            width,
            height,
            rgba: source.pixels().to_vec(),
        });
    }

    let image = RgbaImage::from_raw(width, height, source.pixels().to_vec())?;
    let small = imageops::resize(&image, w, h, FilterType::Triangle);
    Some(DownsampledFrame {
        width: w,
        height: h,
        rgba: small.into_raw(),
    })
}
