//! Raw thumbnail rasters and resampling

use std::num::NonZeroU32;

use fast_image_resize as fir;
use image::RgbaImage;

/// Errors from raster construction and resampling
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("invalid raster dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferMismatch { expected: usize, actual: usize },

    #[error("resize failed: {detail}")]
    Resize { detail: String },
}

impl RasterError {
    fn resize(detail: impl std::fmt::Display) -> Self {
        Self::Resize {
            detail: detail.to_string(),
        }
    }
}

/// Rendered thumbnail pixels.
///
/// RGBA8, row-major, no padding. This is the only pixel format that crosses
/// the worker boundary; drawing surfaces consume it as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Raster {
    /// Wrap an RGBA8 buffer, validating its size
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RasterError::BufferMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Single-colour raster, dimensions clamped to at least 1x1
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width: width.max(1),
            height: height.max(1),
            pixels: if width == 0 || height == 0 {
                vec![0; 4]
            } else {
                img.into_raw()
            },
        }
    }

    #[must_use]
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Nearest-neighbour resample, used for instant zoom transitions
    pub fn resized_fast(&self, width: u32, height: u32) -> Result<Raster, RasterError> {
        self.resized_with(width, height, fir::ResizeAlg::Nearest)
    }

    /// Lanczos3 resample, used where quality matters (drag preview)
    pub fn resized_quality(&self, width: u32, height: u32) -> Result<Raster, RasterError> {
        self.resized_with(
            width,
            height,
            fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3),
        )
    }

    fn resized_with(
        &self,
        width: u32,
        height: u32,
        alg: fir::ResizeAlg,
    ) -> Result<Raster, RasterError> {
        if (width, height) == self.size() {
            return Ok(self.clone());
        }

        let src_width = NonZeroU32::new(self.width)
            .ok_or(RasterError::InvalidDimensions { width, height })?;
        let src_height = NonZeroU32::new(self.height)
            .ok_or(RasterError::InvalidDimensions { width, height })?;
        let dst_width =
            NonZeroU32::new(width).ok_or(RasterError::InvalidDimensions { width, height })?;
        let dst_height =
            NonZeroU32::new(height).ok_or(RasterError::InvalidDimensions { width, height })?;

        let src = fir::Image::from_vec_u8(
            src_width,
            src_height,
            self.pixels.clone(),
            fir::PixelType::U8x4,
        )
        .map_err(RasterError::resize)?;
        let mut dst = fir::Image::new(dst_width, dst_height, fir::PixelType::U8x4);
        let mut resizer = fir::Resizer::new(alg);
        resizer
            .resize(&src.view(), &mut dst.view_mut())
            .map_err(RasterError::resize)?;

        Raster::new(width, height, dst.into_vec())
    }
}
