use crate::core::geo::Point;
use crate::core::projection::Projection;
use crate::tiles::image::TileImage;
use serde::{Deserialize, Serialize};

/// RGBA color handed to the rendering host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn from_rgba(rgba: [u8; 4]) -> Self {
        Self::new(rgba[0], rgba[1], rgba[2], rgba[3])
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// Outline style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

impl Stroke {
    pub fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

impl Default for Stroke {
    fn default() -> Self {
        Self::new(Color::rgb(0, 0, 255), 2.0)
    }
}

/// One paintable shape, positioned in world pixels.
///
/// The host subtracts the origin it received through
/// [`RenderHost::set_origin`](crate::layers::host::RenderHost::set_origin)
/// to get screen coordinates, so panning never redraws elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Image {
        origin: Point,
        size: Point,
        image: TileImage,
    },
    Rect {
        origin: Point,
        size: Point,
        fill: Color,
    },
    Polyline {
        points: Vec<Point>,
        stroke: Stroke,
        fill: Option<Color>,
        closed: bool,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Text {
        anchor: Point,
        text: String,
        color: Color,
        size: f32,
    },
}

/// What an element needs to produce its representation
#[derive(Clone, Copy)]
pub struct DrawContext<'a> {
    pub zoom: u8,
    pub projection: &'a dyn Projection,
}

impl<'a> DrawContext<'a> {
    pub fn new(zoom: u8, projection: &'a dyn Projection) -> Self {
        Self { zoom, projection }
    }

    pub fn tile_size(&self) -> f64 {
        self.projection.tile_size() as f64
    }

    pub fn project(&self, lat_lng: &crate::core::geo::LatLng) -> Point {
        self.projection.project(lat_lng, self.zoom)
    }
}
