use super::primitive::{Color, DrawContext, Primitive, Stroke};
use super::MapElement;
use crate::core::constants::DEFAULT_Z_INDEX;
use crate::core::geo::{LatLng, LatLngBounds};
use crate::core::viewport::VisibleRegion;

/// A polyline, or a polygon when `closed`.
///
/// The bounding area is recomputed whenever the points change, so visibility
/// tests are a single rectangle intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct PathElement {
    points: Vec<LatLng>,
    area: Option<LatLngBounds>,
    stroke: Stroke,
    fill: Option<Color>,
    closed: bool,
    z_index: i32,
}

impl PathElement {
    pub fn new(points: Vec<LatLng>) -> Self {
        let area = LatLngBounds::from_points(&points);
        Self {
            points,
            area,
            stroke: Stroke::default(),
            fill: None,
            closed: false,
            z_index: DEFAULT_Z_INDEX,
        }
    }

    /// A closed path filled with `fill`
    pub fn polygon(points: Vec<LatLng>, fill: Color) -> Self {
        Self {
            fill: Some(fill),
            closed: true,
            ..Self::new(points)
        }
    }

    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        self.stroke = stroke;
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn set_points(&mut self, points: Vec<LatLng>) {
        self.area = LatLngBounds::from_points(&points);
        self.points = points;
    }

    pub fn push_point(&mut self, point: LatLng) {
        match &mut self.area {
            Some(area) => area.extend(&point),
            None => self.area = Some(LatLngBounds::new(point, point)),
        }
        self.points.push(point);
    }

    /// Bounding box of all points; `None` for an empty path
    pub fn area(&self) -> Option<LatLngBounds> {
        self.area
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl MapElement for PathElement {
    fn z_index(&self) -> i32 {
        self.z_index
    }

    fn test_visual(&self, region: &VisibleRegion) -> bool {
        self.area
            .map(|area| area.intersects(&region.area))
            .unwrap_or(false)
    }

    fn draw(&self, ctx: &DrawContext<'_>) -> Vec<Primitive> {
        if self.points.len() < 2 {
            return Vec::new();
        }
        vec![Primitive::Polyline {
            points: self.points.iter().map(|p| ctx.project(p)).collect(),
            stroke: self.stroke,
            fill: self.fill,
            closed: self.closed,
        }]
    }
}
