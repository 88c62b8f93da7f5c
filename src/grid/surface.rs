//! Retained drawing surface seen by the redraw controller
//!
//! Primitives are created once and then addressed by handle: moved, replaced
//! or deleted. Coordinates are content coordinates; scrolling is the host's
//! concern.

use std::sync::Arc;

use super::raster::Raster;

/// Handle to a live primitive on a surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u64);

/// Straight-alpha RGBA colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// From `0xRRGGBB`
    #[must_use]
    pub const fn hex(rgb: u32) -> Self {
        Self::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    #[must_use]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Stacking band. Bands draw in order; within a band, creation order wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Base,
    Overlay,
    Ephemeral,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Raster drawn at its own size
    Image(Arc<Raster>),
    Rect {
        width: i32,
        height: i32,
        fill: Option<Color>,
        outline: Option<(Color, u32)>,
    },
    /// Segment from the origin to `origin + (dx, dy)`
    Line {
        dx: i32,
        dy: i32,
        color: Color,
        width: u32,
        dashed: bool,
    },
    Text {
        text: String,
        color: Color,
        size: u32,
    },
    /// Children positioned relative to the group origin
    Group(Vec<Primitive>),
}

/// A positioned shape
#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub origin: (i32, i32),
    pub layer: Layer,
    pub shape: Shape,
}

impl Primitive {
    #[must_use]
    pub fn new(origin: (i32, i32), layer: Layer, shape: Shape) -> Self {
        Self {
            origin,
            layer,
            shape,
        }
    }

    #[must_use]
    pub fn image(origin: (i32, i32), layer: Layer, raster: Arc<Raster>) -> Self {
        Self::new(origin, layer, Shape::Image(raster))
    }

    #[must_use]
    pub fn filled_rect(origin: (i32, i32), layer: Layer, size: (i32, i32), fill: Color) -> Self {
        Self::new(
            origin,
            layer,
            Shape::Rect {
                width: size.0,
                height: size.1,
                fill: Some(fill),
                outline: None,
            },
        )
    }

    #[must_use]
    pub fn text(origin: (i32, i32), layer: Layer, text: impl Into<String>, color: Color, size: u32) -> Self {
        Self::new(
            origin,
            layer,
            Shape::Text {
                text: text.into(),
                color,
                size,
            },
        )
    }

    #[must_use]
    pub fn group(origin: (i32, i32), layer: Layer, children: Vec<Primitive>) -> Self {
        Self::new(origin, layer, Shape::Group(children))
    }
}

/// Handle-based drawing target
pub trait DrawableSurface {
    fn create(&mut self, primitive: Primitive) -> SurfaceHandle;

    /// Move a primitive without touching its content. False if the handle is gone.
    fn move_to(&mut self, handle: SurfaceHandle, origin: (i32, i32)) -> bool;

    /// Replace a primitive's content in place. False if the handle is gone.
    fn update(&mut self, handle: SurfaceHandle, primitive: Primitive) -> bool;

    fn delete(&mut self, handle: SurfaceHandle) -> bool;

    fn contains(&self, handle: SurfaceHandle) -> bool;
}
