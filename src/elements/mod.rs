//! Map elements: tiles, points and paths
//!
//! Every element answers three questions: where it sits in paint order, whether
//! it shows up in a given region, and which primitives represent it at a zoom.

pub mod path;
pub mod point;
pub mod primitive;
pub mod tile;

pub use path::PathElement;
pub use point::{PointElement, Symbol};
pub use primitive::{Color, DrawContext, Primitive, Stroke};
pub use tile::{TileContent, TileElement};

use crate::core::viewport::VisibleRegion;

/// Capabilities the visibility engine relies on
pub trait MapElement {
    /// Paint rank; lower paints first
    fn z_index(&self) -> i32;

    /// Whether the element should be attached while `region` is on screen.
    ///
    /// Must be a pure read of the element and the region.
    fn test_visual(&self, region: &VisibleRegion) -> bool;

    /// Produces the element's representation
    fn draw(&self, ctx: &DrawContext<'_>) -> Vec<Primitive>;
}

/// Closed set of element kinds placed on a map
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Tile(TileElement),
    Point(PointElement),
    Path(PathElement),
}

impl Element {
    pub fn as_tile(&self) -> Option<&TileElement> {
        match self {
            Element::Tile(tile) => Some(tile),
            _ => None,
        }
    }

    pub fn is_tile(&self) -> bool {
        matches!(self, Element::Tile(_))
    }
}

impl MapElement for Element {
    fn z_index(&self) -> i32 {
        match self {
            Element::Tile(tile) => tile.z_index(),
            Element::Point(point) => point.z_index(),
            Element::Path(path) => path.z_index(),
        }
    }

    fn test_visual(&self, region: &VisibleRegion) -> bool {
        match self {
            Element::Tile(tile) => tile.test_visual(region),
            Element::Point(point) => point.test_visual(region),
            Element::Path(path) => path.test_visual(region),
        }
    }

    fn draw(&self, ctx: &DrawContext<'_>) -> Vec<Primitive> {
        match self {
            Element::Tile(tile) => tile.draw(ctx),
            Element::Point(point) => point.draw(ctx),
            Element::Path(path) => path.draw(ctx),
        }
    }
}

impl From<TileElement> for Element {
    fn from(tile: TileElement) -> Self {
        Element::Tile(tile)
    }
}

impl From<PointElement> for Element {
    fn from(point: PointElement) -> Self {
        Element::Point(point)
    }
}

impl From<PathElement> for Element {
    fn from(path: PathElement) -> Self {
        Element::Path(path)
    }
}

/// Identity of an element tracked by a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Identity of one attached representation; every attach mints a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualId(pub u64);

/// The representation of an element handed to the rendering host
#[derive(Debug, Clone, PartialEq)]
pub struct MapVisual {
    pub id: VisualId,
    pub element: ElementId,
    pub z_index: i32,
    pub primitives: Vec<Primitive>,
}
