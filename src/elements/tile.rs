use super::primitive::{Color, DrawContext, Primitive};
use super::MapElement;
use crate::core::constants::{PLACEHOLDER_RGBA, TILE_Z_INDEX};
use crate::core::geo::{LatLngBounds, Point, TileCoord};
use crate::core::viewport::VisibleRegion;
use crate::tiles::image::TileImage;

#[derive(Debug, Clone, PartialEq)]
pub enum TileContent {
    /// Shown until the real raster arrives
    Placeholder,
    Loaded(TileImage),
}

/// One raster tile on the map
#[derive(Debug, Clone, PartialEq)]
pub struct TileElement {
    coord: TileCoord,
    content: TileContent,
    bounds: LatLngBounds,
}

impl TileElement {
    pub fn placeholder(coord: TileCoord) -> Self {
        Self {
            coord,
            content: TileContent::Placeholder,
            bounds: coord.bounds(),
        }
    }

    pub fn loaded(coord: TileCoord, image: TileImage) -> Self {
        Self {
            coord,
            content: TileContent::Loaded(image),
            bounds: coord.bounds(),
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn content(&self) -> &TileContent {
        &self.content
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.content, TileContent::Placeholder)
    }

    pub fn image(&self) -> Option<&TileImage> {
        match &self.content {
            TileContent::Loaded(image) => Some(image),
            TileContent::Placeholder => None,
        }
    }
}

impl MapElement for TileElement {
    fn z_index(&self) -> i32 {
        TILE_Z_INDEX
    }

    fn test_visual(&self, region: &VisibleRegion) -> bool {
        region.zoom == self.coord.z && self.bounds.intersects(&region.area)
    }

    fn draw(&self, ctx: &DrawContext<'_>) -> Vec<Primitive> {
        if ctx.zoom != self.coord.z {
            return Vec::new();
        }
        let tile_size = ctx.tile_size();
        let origin = Point::new(self.coord.x as f64 * tile_size, self.coord.y as f64 * tile_size);
        let size = Point::new(tile_size, tile_size);

        let primitive = match &self.content {
            TileContent::Placeholder => Primitive::Rect {
                origin,
                size,
                fill: Color::from_rgba(PLACEHOLDER_RGBA),
            },
            TileContent::Loaded(image) => Primitive::Image {
                origin,
                size,
                image: image.clone(),
            },
        };
        vec![primitive]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::WebMercator;

    fn region(area: LatLngBounds, zoom: u8) -> VisibleRegion {
        VisibleRegion {
            area,
            origin: Point::default(),
            size: Point::new(256.0, 256.0),
            zoom,
        }
    }

    #[test]
    fn test_visibility_requires_matching_zoom() {
        let tile = TileElement::placeholder(TileCoord::new(1, 1, 2));
        let area = TileCoord::new(1, 1, 2).bounds();

        assert!(tile.test_visual(&region(area, 2)));
        assert!(!tile.test_visual(&region(area, 3)));
        assert!(!tile.test_visual(&region(LatLngBounds::from_coords(-80.0, 100.0, -70.0, 120.0), 2)));
    }

    #[test]
    fn test_placeholder_draws_lemon_rect_at_tile_origin() {
        let projection = WebMercator::default();
        let ctx = DrawContext::new(3, &projection);
        let primitives = TileElement::placeholder(TileCoord::new(2, 5, 3)).draw(&ctx);

        assert_eq!(
            primitives,
            vec![Primitive::Rect {
                origin: Point::new(512.0, 1280.0),
                size: Point::new(256.0, 256.0),
                fill: Color::new(0xFF, 0xFA, 0xCD, 0xFF),
            }]
        );
    }

    #[test]
    fn test_loaded_tile_draws_image() {
        let projection = WebMercator::default();
        let image = TileImage::from_rgba(image::RgbaImage::new(1, 1));
        let tile = TileElement::loaded(TileCoord::new(0, 0, 0), image.clone());

        assert!(!tile.is_placeholder());
        match tile.draw(&DrawContext::new(0, &projection)).as_slice() {
            [Primitive::Image { image: drawn, .. }] => assert!(drawn.same_raster(&image)),
            other => panic!("unexpected primitives {:?}", other),
        }
        assert_eq!(tile.z_index(), TILE_Z_INDEX);
    }
}
