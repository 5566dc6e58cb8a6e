use crate::core::geo::{LatLng, LatLngBounds, Point};
use crate::core::projection::Projection;
use serde::{Deserialize, Serialize};

/// Camera state: center, zoom and screen extent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
    /// Screen extent in pixels
    pub size: Point,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// Snapshot of what a viewport shows, produced once per viewport mutation.
///
/// Both the tile-set manager and the visibility engine consume the same
/// snapshot, so a pan or zoom is a single transition for the whole view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleRegion {
    /// Geographic area covered by the screen
    pub area: LatLngBounds,
    /// World pixel of the screen's top-left corner at `zoom`
    pub origin: Point,
    /// Screen extent in pixels
    pub size: Point,
    pub zoom: u8,
}

impl VisibleRegion {
    /// Converts a screen point into world pixels
    pub fn to_world(&self, screen: &Point) -> Point {
        screen.add(&self.origin)
    }

    /// Converts world pixels into a screen point
    pub fn to_screen(&self, world: &Point) -> Point {
        world.subtract(&self.origin)
    }
}

impl Viewport {
    pub fn new(center: LatLng, zoom: u8, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.min(crate::core::constants::MAX_ZOOM),
            size,
            min_zoom: 0,
            max_zoom: crate::core::constants::MAX_ZOOM,
        }
    }

    /// Latitude is kept inside the Mercator band
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(LatLng::clamp_lat(center.lat), center.lng.clamp(-180.0, 180.0));
    }

    /// Clamped to the zoom limits
    pub fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom.saturating_add(1));
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom.saturating_sub(1));
    }

    pub fn set_zoom_limits(&mut self, min_zoom: u8, max_zoom: u8) {
        self.min_zoom = min_zoom.min(max_zoom);
        self.max_zoom = max_zoom.min(crate::core::constants::MAX_ZOOM);
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Negative extents collapse to zero
    pub fn resize(&mut self, size: Point) {
        self.size = Point::new(size.x.max(0.0), size.y.max(0.0));
    }

    /// Moves the map content by a screen-space delta (a drag of `delta`)
    pub fn pan_by(&mut self, delta: Point, projection: &dyn Projection) {
        let center_px = projection.project(&self.center, self.zoom);
        let moved = center_px.subtract(&delta);
        let center = projection.unproject(&moved, self.zoom);
        self.set_center(center);
    }

    /// Computes the region currently shown on screen
    pub fn region(&self, projection: &dyn Projection) -> VisibleRegion {
        let center_px = projection.project(&self.center, self.zoom);
        let origin = Point::new(center_px.x - self.size.x / 2.0, center_px.y - self.size.y / 2.0)
            .floor();
        let north_west = projection.unproject(&origin, self.zoom);
        let south_east = projection.unproject(&origin.add(&self.size), self.zoom);

        VisibleRegion {
            area: LatLngBounds::from_coords(
                south_east.lat,
                north_west.lng,
                north_west.lat,
                south_east.lng,
            ),
            origin,
            size: self.size,
            zoom: self.zoom,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 0, Point::new(800.0, 600.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::WebMercator;

    #[test]
    fn test_new_viewport_keeps_center() {
        let viewport = Viewport::new(LatLng::new(56.8563, 60.5515), 13, Point::new(800.0, 600.0));

        assert_eq!(viewport.zoom, 13);
        assert_eq!(viewport.center.lat, 56.8563);
        assert_eq!(viewport.size, Point::new(800.0, 600.0));
    }

    #[test]
    fn test_zoom_is_clamped_to_limits() {
        let mut viewport = Viewport::new(LatLng::default(), 0, Point::new(256.0, 256.0));
        viewport.set_zoom_limits(2, 15);
        assert_eq!(viewport.zoom, 2);

        viewport.set_zoom(1);
        assert_eq!(viewport.zoom, 2);

        viewport.set_zoom(20);
        assert_eq!(viewport.zoom, 15);

        viewport.zoom_out();
        assert_eq!(viewport.zoom, 14);
    }

    #[test]
    fn test_region_contains_center() {
        let proj = WebMercator::default();
        let viewport = Viewport::new(LatLng::new(56.8563, 60.5515), 13, Point::new(800.0, 600.0));
        let region = viewport.region(&proj);

        assert!(region.area.contains(&viewport.center));
        assert!(region.area.north() > region.area.south());
        assert!(region.area.east() > region.area.west());
        assert_eq!(region.zoom, 13);
    }

    #[test]
    fn test_pan_moves_center_against_drag() {
        let proj = WebMercator::default();
        let mut viewport = Viewport::new(LatLng::new(0.0, 0.0), 4, Point::new(512.0, 512.0));
        let before = viewport.region(&proj);

        // Dragging content to the right reveals what is further west
        viewport.pan_by(Point::new(100.0, 0.0), &proj);
        let after = viewport.region(&proj);

        assert!(viewport.center.lng < 0.0);
        assert!((after.origin.x - (before.origin.x - 100.0)).abs() <= 1.0);
    }
}
