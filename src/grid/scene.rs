//! In-memory retained scene with a software rasterizer

use std::collections::BTreeMap;

use image::{Rgba, RgbaImage, imageops};

use super::surface::{Color, DrawableSurface, Layer, Primitive, Shape, SurfaceHandle};
use super::types::Viewport;

/// Operation counters since the last [`RetainedScene::take_counters`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneCounters {
    pub created: usize,
    pub moved: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SceneCounters {
    #[must_use]
    pub fn churn(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

#[derive(Debug)]
struct Node {
    primitive: Primitive,
    seq: u64,
}

/// A [`DrawableSurface`] that keeps every primitive in memory
#[derive(Debug, Default)]
pub struct RetainedScene {
    nodes: BTreeMap<SurfaceHandle, Node>,
    next_handle: u64,
    next_seq: u64,
    counters: SceneCounters,
}

impl RetainedScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, handle: SurfaceHandle) -> Option<&Primitive> {
        self.nodes.get(&handle).map(|node| &node.primitive)
    }

    #[must_use]
    pub fn counters(&self) -> SceneCounters {
        self.counters
    }

    pub fn take_counters(&mut self) -> SceneCounters {
        std::mem::take(&mut self.counters)
    }

    /// Live primitives in paint order
    pub fn paint_order(&self) -> Vec<(SurfaceHandle, &Primitive)> {
        let mut ordered: Vec<_> = self.nodes.iter().collect();
        ordered.sort_by_key(|(_, node)| (node.primitive.layer, node.seq));
        ordered
            .into_iter()
            .map(|(handle, node)| (*handle, &node.primitive))
            .collect()
    }

    /// Count of live primitives in a layer
    #[must_use]
    pub fn layer_len(&self, layer: Layer) -> usize {
        self.nodes
            .values()
            .filter(|node| node.primitive.layer == layer)
            .count()
    }

    /// Software render of the viewport. Text is not rasterized.
    #[must_use]
    pub fn rasterize(&self, viewport: Viewport, background: Color) -> RgbaImage {
        let width = viewport.width.max(1) as u32;
        let height = viewport.height.max(1) as u32;
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba(background.to_array()));
        let offset = (0, -viewport.scroll_y);
        for (_, primitive) in self.paint_order() {
            paint(&mut canvas, primitive, offset);
        }
        canvas
    }
}

impl DrawableSurface for RetainedScene {
    fn create(&mut self, primitive: Primitive) -> SurfaceHandle {
        self.next_handle += 1;
        self.next_seq += 1;
        let handle = SurfaceHandle(self.next_handle);
        self.nodes.insert(
            handle,
            Node {
                primitive,
                seq: self.next_seq,
            },
        );
        self.counters.created += 1;
        handle
    }

    fn move_to(&mut self, handle: SurfaceHandle, origin: (i32, i32)) -> bool {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return false;
        };
        if node.primitive.origin != origin {
            node.primitive.origin = origin;
            self.counters.moved += 1;
        }
        true
    }

    fn update(&mut self, handle: SurfaceHandle, primitive: Primitive) -> bool {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return false;
        };
        node.primitive = primitive;
        self.counters.updated += 1;
        true
    }

    fn delete(&mut self, handle: SurfaceHandle) -> bool {
        let removed = self.nodes.remove(&handle).is_some();
        if removed {
            self.counters.deleted += 1;
        }
        removed
    }

    fn contains(&self, handle: SurfaceHandle) -> bool {
        self.nodes.contains_key(&handle)
    }
}

fn paint(canvas: &mut RgbaImage, primitive: &Primitive, offset: (i32, i32)) {
    let x = primitive.origin.0 + offset.0;
    let y = primitive.origin.1 + offset.1;
    match &primitive.shape {
        Shape::Image(raster) => {
            if let Some(img) = raster.to_rgba_image() {
                imageops::overlay(canvas, &img, i64::from(x), i64::from(y));
            }
        }
        Shape::Rect {
            width,
            height,
            fill,
            outline,
        } => {
            if let Some(fill) = fill {
                fill_rect(canvas, x, y, *width, *height, *fill);
            }
            if let Some((color, line)) = outline {
                let t = (*line).max(1) as i32;
                fill_rect(canvas, x, y, *width, t, *color);
                fill_rect(canvas, x, y + height - t, *width, t, *color);
                fill_rect(canvas, x, y, t, *height, *color);
                fill_rect(canvas, x + width - t, y, t, *height, *color);
            }
        }
        Shape::Line {
            dx,
            dy,
            color,
            width,
            dashed,
        } => draw_line(canvas, (x, y), (x + dx, y + dy), *color, *width, *dashed),
        Shape::Text { .. } => {}
        Shape::Group(children) => {
            for child in children {
                paint(canvas, child, (x, y));
            }
        }
    }
}

fn blend(dst: &mut Rgba<u8>, src: Color) {
    let a = u32::from(src.a);
    if a == 0 {
        return;
    }
    let inv = 255 - a;
    let mix = |s: u8, d: u8| ((u32::from(s) * a + u32::from(d) * inv) / 255) as u8;
    dst.0 = [
        mix(src.r, dst.0[0]),
        mix(src.g, dst.0[1]),
        mix(src.b, dst.0[2]),
        (a + u32::from(dst.0[3]) * inv / 255) as u8,
    ];
}

fn fill_rect(canvas: &mut RgbaImage, x: i32, y: i32, w: i32, h: i32, color: Color) {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let x0 = x.clamp(0, cw);
    let y0 = y.clamp(0, ch);
    let x1 = (x + w).clamp(0, cw);
    let y1 = (y + h).clamp(0, ch);
    for py in y0..y1 {
        for px in x0..x1 {
            blend(canvas.get_pixel_mut(px as u32, py as u32), color);
        }
    }
}

fn draw_line(
    canvas: &mut RgbaImage,
    from: (i32, i32),
    to: (i32, i32),
    color: Color,
    width: u32,
    dashed: bool,
) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
    let half = (width.max(1) / 2) as i32;
    for step in 0..=steps {
        // 4 on, 4 off
        if dashed && (step / 4) % 2 == 1 {
            continue;
        }
        let px = from.0 + (to.0 - from.0) * step / steps;
        let py = from.1 + (to.1 - from.1) * step / steps;
        fill_rect(canvas, px - half, py - half, width.max(1) as i32, width.max(1) as i32, color);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::raster::Raster;
    use super::*;

    #[test]
    fn handles_are_unique_and_tracked() {
        let mut scene = RetainedScene::new();
        let a = scene.create(Primitive::filled_rect((0, 0), Layer::Base, (10, 10), Color::WHITE));
        let b = scene.create(Primitive::filled_rect((20, 0), Layer::Base, (10, 10), Color::WHITE));
        assert_ne!(a, b);
        assert!(scene.move_to(a, (5, 5)));
        assert!(scene.delete(b));
        assert!(!scene.contains(b));
        assert!(!scene.move_to(b, (0, 0)));

        let counters = scene.take_counters();
        assert_eq!(counters.created, 2);
        assert_eq!(counters.moved, 1);
        assert_eq!(counters.deleted, 1);
        assert_eq!(scene.counters(), SceneCounters::default());
    }

    #[test]
    fn overlays_paint_above_later_bases() {
        let mut scene = RetainedScene::new();
        let overlay = scene.create(Primitive::filled_rect((0, 0), Layer::Overlay, (4, 4), Color::BLACK));
        let base = scene.create(Primitive::filled_rect((0, 0), Layer::Base, (4, 4), Color::WHITE));
        let order: Vec<_> = scene.paint_order().into_iter().map(|(h, _)| h).collect();
        assert_eq!(order, vec![base, overlay]);
    }

    #[test]
    fn rasterize_applies_scroll() {
        let mut scene = RetainedScene::new();
        let raster = Arc::new(Raster::solid(4, 4, [255, 0, 0, 255]));
        scene.create(Primitive::image((2, 12), Layer::Base, raster));

        let img = scene.rasterize(
            Viewport {
                scroll_y: 10,
                width: 10,
                height: 10,
            },
            Color::BLACK,
        );
        assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(8, 8).0, [0, 0, 0, 255]);
    }
}
