//! Drag preview: a small fanned stack of the dragged thumbnails

use std::sync::Arc;

use image::{Rgba, RgbaImage, imageops};
use log::debug;
use rayon::prelude::*;

use super::raster::{Raster, RasterError};
use super::surface::{Layer, Primitive};

/// Most thumbnails shown in the fan
pub const MAX_FAN_THUMBS: usize = 5;
/// Height the fan thumbnails are normalised to
pub const FAN_THUMB_SIZE: u32 = 125;

const ROTATION_DEG: f32 = 10.0;
const SHADOW_OFFSET: u32 = 4;
const SHADOW_ALPHA: u8 = 120;
const BORDER: u32 = 3;
const SPREAD: u32 = 5;
const SUPERSAMPLE: u32 = 4;
const CURSOR_OFFSET: (i32, i32) = (30, 20);

/// First three and last two when there are too many
#[must_use]
pub fn sample_for_fan<T: Clone>(items: &[T]) -> Vec<T> {
    if items.len() > MAX_FAN_THUMBS {
        let mut out = items[..3].to_vec();
        out.extend_from_slice(&items[items.len() - 2..]);
        out
    } else {
        items.to_vec()
    }
}

/// Composites the fan image. Later thumbnails sit underneath earlier ones.
pub fn compose_fan(thumbnails: &[Arc<Raster>]) -> Result<Raster, RasterError> {
    let sampled = sample_for_fan(thumbnails);
    if sampled.is_empty() {
        return Err(RasterError::InvalidDimensions { width: 0, height: 0 });
    }
    let ss = SUPERSAMPLE;

    let mut scaled = Vec::with_capacity(sampled.len());
    for thumb in &sampled {
        let (w, h) = thumb.size();
        let aspect = w as f32 / h.max(1) as f32;
        let target_h = FAN_THUMB_SIZE * ss;
        let target_w = ((target_h as f32 * aspect).round() as u32).max(1);
        let img = thumb
            .resized_quality(target_w, target_h)?
            .to_rgba_image()
            .ok_or(RasterError::InvalidDimensions {
                width: target_w,
                height: target_h,
            })?;
        scaled.push(img);
    }

    let count = scaled.len();
    let max_w = scaled.iter().map(RgbaImage::width).max().unwrap_or(1) as f32;
    let max_h = scaled.iter().map(RgbaImage::height).max().unwrap_or(1) as f32;
    let theta = ROTATION_DEG.to_radians();
    let extra_side = (max_h * theta.sin()) as u32;
    let extra_top = (max_w * theta.sin()) as u32;
    let spread = SPREAD * ss * (count as u32).saturating_sub(1);
    let shadow = SHADOW_OFFSET * ss;

    let fan_w = max_w as u32 + extra_side * 2 + spread + shadow * 2;
    let fan_h = max_h as u32 + extra_top * 2 + shadow * 2;
    let mut canvas = RgbaImage::new(fan_w, fan_h);

    let center_y = (fan_h / 2) as i64;
    let min_x = shadow as f32 + max_w * (theta.sin() + 1.0) / 2.0;
    let max_x = fan_w as f32 - min_x - shadow as f32;

    for (idx, thumb) in scaled.iter().enumerate().rev() {
        let factor = if count > 1 {
            idx as f32 / (count as f32 - 0.99)
        } else {
            0.5
        };
        let center_x = (min_x + (max_x - min_x) * factor) as i64;
        let angle = -theta + theta * 2.0 * factor;

        let bordered = with_border(thumb, BORDER * ss);
        let rotated = rotate_expand(&bordered, angle);
        let shade = soft_shadow(&rotated, ss as f32);

        let x = center_x - i64::from(rotated.width() / 2);
        let y = center_y - i64::from(rotated.height() / 2);
        imageops::overlay(&mut canvas, &shade, x + i64::from(shadow), y + i64::from(shadow));
        imageops::overlay(&mut canvas, &rotated, x, y);
    }

    let full = Raster::from_rgba_image(canvas);
    full.resized_quality((fan_w / ss).max(1), (fan_h / ss).max(1))
}

fn with_border(src: &RgbaImage, border: u32) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(
        src.width() + border * 2,
        src.height() + border * 2,
        Rgba([255, 255, 255, 255]),
    );
    imageops::replace(&mut out, src, i64::from(border), i64::from(border));
    out
}

/// Rotates around the centre, growing the canvas to fit. Bilinear, premultiplied.
fn rotate_expand(src: &RgbaImage, angle: f32) -> RgbaImage {
    let (w, h) = src.dimensions();
    let (sin, cos) = angle.sin_cos();
    // Small slack so exact right angles do not grow by a pixel.
    let out_w = ((w as f32 * cos.abs() + h as f32 * sin.abs() - 1e-3).ceil() as u32).max(1);
    let out_h = ((w as f32 * sin.abs() + h as f32 * cos.abs() - 1e-3).ceil() as u32).max(1);
    let (src_cx, src_cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let (dst_cx, dst_cy) = (out_w as f32 / 2.0, out_h as f32 / 2.0);

    let stride = out_w as usize * 4;
    let mut buf = vec![0u8; stride * out_h as usize];
    buf.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let dy = y as f32 + 0.5 - dst_cy;
        for x in 0..out_w as usize {
            let dx = x as f32 + 0.5 - dst_cx;
            let sx = cos * dx + sin * dy + src_cx - 0.5;
            let sy = -sin * dx + cos * dy + src_cy - 0.5;
            let px = sample_bilinear(src, sx, sy);
            row[x * 4..x * 4 + 4].copy_from_slice(&px);
        }
    });

    RgbaImage::from_raw(out_w, out_h, buf).unwrap_or_else(|| RgbaImage::new(out_w, out_h))
}

fn sample_bilinear(src: &RgbaImage, x: f32, y: f32) -> [u8; 4] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0f32; 4];
    for (ox, oy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        let (sx, sy) = (x0 + ox, y0 + oy);
        if sx < 0 || sy < 0 || sx >= i64::from(src.width()) || sy >= i64::from(src.height()) {
            continue;
        }
        let p = src.get_pixel(sx as u32, sy as u32).0;
        let a = p[3] as f32 / 255.0 * weight;
        acc[0] += p[0] as f32 * a;
        acc[1] += p[1] as f32 * a;
        acc[2] += p[2] as f32 * a;
        acc[3] += a;
    }
    if acc[3] <= f32::EPSILON {
        return [0, 0, 0, 0];
    }
    [
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Blurred black silhouette of `src`'s alpha
fn soft_shadow(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let mut mask = RgbaImage::new(src.width(), src.height());
    for (dst, px) in mask.pixels_mut().zip(src.pixels()) {
        let a = (u16::from(px.0[3]) * u16::from(SHADOW_ALPHA) / 255) as u8;
        *dst = Rgba([0, 0, 0, a]);
    }
    imageops::blur(&mask, sigma)
}

/// Live fan following the pointer
#[derive(Debug, Default)]
pub struct FanPreview {
    image: Option<Arc<Raster>>,
    cursor: (i32, i32),
}

impl FanPreview {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the fan. An empty or unusable list leaves the preview inactive.
    pub fn start(&mut self, thumbnails: &[Arc<Raster>], cursor: (i32, i32)) {
        self.cursor = cursor;
        self.image = match compose_fan(thumbnails) {
            Ok(img) => Some(Arc::new(img)),
            Err(e) => {
                debug!("Drag fan not shown: {e}");
                None
            }
        };
    }

    pub fn update_position(&mut self, cursor: (i32, i32)) {
        self.cursor = cursor;
    }

    pub fn stop(&mut self) {
        self.image = None;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.image.is_some()
    }

    #[must_use]
    pub fn image(&self) -> Option<&Arc<Raster>> {
        self.image.as_ref()
    }

    /// Fan centred near the cursor, on top of everything
    #[must_use]
    pub fn primitive(&self) -> Option<Primitive> {
        let image = self.image.as_ref()?;
        let (w, h) = image.size();
        let x = self.cursor.0 + CURSOR_OFFSET.0 - (w / 2) as i32;
        let y = self.cursor.1 + CURSOR_OFFSET.1 - (h / 2) as i32;
        Some(Primitive::image((x, y), Layer::Ephemeral, Arc::clone(image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_keeps_first_three_and_last_two() {
        let items: Vec<u32> = (0..9).collect();
        assert_eq!(sample_for_fan(&items), vec![0, 1, 2, 7, 8]);
        assert_eq!(sample_for_fan(&items[..4]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn rotation_expands_canvas() {
        let src = RgbaImage::from_pixel(40, 20, Rgba([255, 0, 0, 255]));
        let out = rotate_expand(&src, 90f32.to_radians());
        assert_eq!(out.dimensions(), (20, 40));
        assert_eq!(out.get_pixel(10, 20).0, [255, 0, 0, 255]);
    }

    #[test]
    fn fan_is_transparent_around_the_stack() {
        let thumbs: Vec<_> = (0..3)
            .map(|_| Arc::new(Raster::solid(70, 100, [200, 30, 30, 255])))
            .collect();
        let fan = compose_fan(&thumbs).unwrap();
        assert!(fan.height() > FAN_THUMB_SIZE);
        assert_eq!(fan.pixel(0, 0).map(|p| p[3]), Some(0));
    }

    #[test]
    fn preview_tracks_cursor() {
        let mut preview = FanPreview::new();
        preview.start(&[], (0, 0));
        assert!(!preview.is_active());

        preview.start(&[Arc::new(Raster::solid(70, 100, [0, 0, 0, 255]))], (100, 100));
        let (w, h) = preview.image().unwrap().size();
        preview.update_position((200, 300));
        let p = preview.primitive().unwrap();
        assert_eq!(p.origin, (230 - (w / 2) as i32, 320 - (h / 2) as i32));
        preview.stop();
        assert!(preview.primitive().is_none());
    }
}
