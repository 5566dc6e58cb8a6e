use crate::core::constants::TILE_SIZE;
use crate::core::geo::{LatLng, Point};
use std::f64::consts::PI;

/// Converts between geographic coordinates and world pixels at a zoom level.
///
/// World pixels put the north-west corner of tile (0, 0) at the origin, so the
/// top-left of tile (x, y) lands at `(x * tile_size, y * tile_size)`.
pub trait Projection: Send + Sync {
    /// Projects a LatLng to world pixel coordinates at the given zoom level
    fn project(&self, lat_lng: &LatLng, zoom: u8) -> Point;

    /// Unprojects world pixel coordinates back to LatLng at the given zoom level
    fn unproject(&self, pixel: &Point, zoom: u8) -> LatLng;

    /// Edge length of one tile in world pixels
    fn tile_size(&self) -> u32 {
        TILE_SIZE
    }
}

/// Spherical Web Mercator (EPSG:3857)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercator {
    tile_size: u32,
}

impl WebMercator {
    pub fn new(tile_size: u32) -> Self {
        Self { tile_size }
    }

    fn world_size(&self, zoom: u8) -> f64 {
        self.tile_size as f64 * 2_f64.powi(zoom as i32)
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new(TILE_SIZE)
    }
}

impl Projection for WebMercator {
    fn project(&self, lat_lng: &LatLng, zoom: u8) -> Point {
        let scale = self.world_size(zoom);
        let lat_rad = LatLng::clamp_lat(lat_lng.lat).to_radians();

        let x = (lat_lng.lng + 180.0) / 360.0 * scale;
        let y = (1.0 - (PI / 4.0 + lat_rad / 2.0).tan().ln() / PI) / 2.0 * scale;

        Point::new(x, y)
    }

    fn unproject(&self, pixel: &Point, zoom: u8) -> LatLng {
        let scale = self.world_size(zoom);

        let lng = pixel.x / scale * 360.0 - 180.0;
        let merc_y = PI * (1.0 - 2.0 * pixel.y / scale);
        let lat = (2.0 * merc_y.exp().atan() - PI / 2.0).to_degrees();

        LatLng::new(lat, lng)
    }

    fn tile_size(&self) -> u32 {
        self.tile_size
    }
}
