use super::primitive::{Color, DrawContext, Primitive, Stroke};
use super::MapElement;
use crate::core::constants::DEFAULT_Z_INDEX;
use crate::core::geo::{LatLng, Point};
use crate::core::viewport::VisibleRegion;
use serde::{Deserialize, Serialize};

/// How a point is painted around its projected position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Symbol {
    Circle {
        radius: f64,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Square {
        size: f64,
        fill: Color,
    },
    Label {
        text: String,
        color: Color,
        size: f32,
    },
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::Circle {
            radius: 5.0,
            fill: Color::rgb(255, 0, 0),
            stroke: Some(Stroke::new(Color::rgb(255, 255, 255), 2.0)),
        }
    }
}

/// A marker anchored at a single geographic position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointElement {
    position: LatLng,
    symbol: Symbol,
    z_index: i32,
}

impl PointElement {
    pub fn new(position: LatLng) -> Self {
        Self {
            position,
            symbol: Symbol::default(),
            z_index: DEFAULT_Z_INDEX,
        }
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn set_position(&mut self, position: LatLng) {
        self.position = position;
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn set_symbol(&mut self, symbol: Symbol) {
        self.symbol = symbol;
    }
}

impl MapElement for PointElement {
    fn z_index(&self) -> i32 {
        self.z_index
    }

    fn test_visual(&self, region: &VisibleRegion) -> bool {
        self.position.is_in(&region.area)
    }

    fn draw(&self, ctx: &DrawContext<'_>) -> Vec<Primitive> {
        let center = ctx.project(&self.position);
        let primitive = match &self.symbol {
            Symbol::Circle {
                radius,
                fill,
                stroke,
            } => Primitive::Circle {
                center,
                radius: *radius,
                fill: *fill,
                stroke: *stroke,
            },
            Symbol::Square { size, fill } => Primitive::Rect {
                origin: Point::new(center.x - size / 2.0, center.y - size / 2.0),
                size: Point::new(*size, *size),
                fill: *fill,
            },
            Symbol::Label { text, color, size } => Primitive::Text {
                anchor: center,
                text: text.clone(),
                color: *color,
                size: *size,
            },
        };
        vec![primitive]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLngBounds;
    use crate::core::projection::WebMercator;

    #[test]
    fn test_point_visibility() {
        let point = PointElement::new(LatLng::new(56.85, 60.6));
        let region = |area| VisibleRegion {
            area,
            origin: Point::default(),
            size: Point::new(100.0, 100.0),
            zoom: 10,
        };

        assert!(point.test_visual(&region(LatLngBounds::from_coords(56.0, 60.0, 57.0, 61.0))));
        assert!(!point.test_visual(&region(LatLngBounds::from_coords(50.0, 60.0, 51.0, 61.0))));
    }

    #[test]
    fn test_square_is_centered_on_position() {
        let projection = WebMercator::default();
        let ctx = DrawContext::new(0, &projection);
        let point = PointElement::new(LatLng::new(0.0, 0.0)).with_symbol(Symbol::Square {
            size: 10.0,
            fill: Color::rgb(0, 0, 0),
        });

        match point.draw(&ctx).as_slice() {
            [Primitive::Rect { origin, size, .. }] => {
                assert!((origin.x - 123.0).abs() < 1e-9);
                assert!((origin.y - 123.0).abs() < 1e-9);
                assert_eq!(*size, Point::new(10.0, 10.0));
            }
            other => panic!("unexpected primitives {:?}", other),
        }
    }
}
