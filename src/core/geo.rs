//! Geographic and pixel-space primitives plus slippy-map tile addressing

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::core::constants::MAX_ZOOM;

/// Latitude limit of the square Web Mercator world
const MERCATOR_LAT_LIMIT: f64 = 85.0511287798;

/// A WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Clamps a latitude into the band Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MERCATOR_LAT_LIMIT, MERCATOR_LAT_LIMIT)
    }

    pub fn is_in(&self, area: &LatLngBounds) -> bool {
        area.contains(self)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self { lat: 0.0, lng: 0.0 }
    }
}

/// Screen or world-pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn floor(&self) -> Point {
        Self {
            x: self.x.floor(),
            y: self.y.floor(),
        }
    }
}

/// Pixel rectangle given by its top-left corner and extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub size: Point,
}

impl Rect {
    pub fn new(min: Point, size: Point) -> Self {
        Self { min, size }
    }

    pub fn max(&self) -> Point {
        self.min.add(&self.size)
    }
}

/// Geographic rectangle; edges are inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south_west: LatLng { lat: south, lng: west },
            north_east: LatLng { lat: north, lng: east },
        }
    }

    /// Smallest bounds enclosing every point, `None` for an empty slice
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::new(*first, *first);
        for point in rest {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn west(&self) -> f64 {
        self.south_west.lng
    }

    pub fn east(&self) -> f64 {
        self.north_east.lng
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    /// The most northern-western corner
    pub fn north_west(&self) -> LatLng {
        LatLng::new(self.north(), self.west())
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        (self.south()..=self.north()).contains(&point.lat)
            && (self.west()..=self.east()).contains(&point.lng)
    }

    /// True when the rectangles share at least an edge
    pub fn intersects(&self, other: &LatLngBounds) -> bool {
        self.south() <= other.north()
            && other.south() <= self.north()
            && self.west() <= other.east()
            && other.west() <= self.east()
    }

    /// Grows the bounds to cover `point`
    pub fn extend(&mut self, point: &LatLng) {
        let (south, north) = (self.south().min(point.lat), self.north().max(point.lat));
        let (west, east) = (self.west().min(point.lng), self.east().max(point.lng));
        *self = Self::from_coords(south, west, north, east);
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            self.south() + (self.north() - self.south()) / 2.0,
            self.west() + (self.east() - self.west()) / 2.0,
        )
    }
}

/// Address of one raster tile: column `x`, row `y` (counted from the north),
/// zoom `z`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at `zoom`
    pub fn tiles_per_axis(zoom: u8) -> u32 {
        1u32 << zoom.min(MAX_ZOOM)
    }

    /// Column of the tile containing `lng` at `zoom`
    pub fn horizontal_index(lng: f64, zoom: u8) -> u32 {
        let n = Self::tiles_per_axis(zoom) as f64;
        let x = ((lng + 180.0) / 360.0 * n).floor();
        x.clamp(0.0, n - 1.0) as u32
    }

    /// Row of the tile containing `lat` at `zoom`
    pub fn vertical_index(lat: f64, zoom: u8) -> u32 {
        let n = Self::tiles_per_axis(zoom) as f64;
        let lat_rad = LatLng::clamp_lat(lat).to_radians();
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();
        y.clamp(0.0, n - 1.0) as u32
    }

    /// The tile containing `lat_lng`
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Self {
        Self {
            x: Self::horizontal_index(lat_lng.lng, zoom),
            y: Self::vertical_index(lat_lng.lat, zoom),
            z: zoom,
        }
    }

    /// North-west corner of the tile
    pub fn to_lat_lng(&self) -> LatLng {
        Self::corner(self.x, self.y, self.z)
    }

    /// Geographic footprint of the tile
    pub fn bounds(&self) -> LatLngBounds {
        let north_west = self.to_lat_lng();
        let south_east = Self::corner(self.x + 1, self.y + 1, self.z);
        LatLngBounds::from_coords(south_east.lat, north_west.lng, north_west.lat, south_east.lng)
    }

    pub fn is_valid(&self) -> bool {
        let per_axis = Self::tiles_per_axis(self.z);
        self.z <= MAX_ZOOM && self.x < per_axis && self.y < per_axis
    }

    fn corner(x: u32, y: u32, z: u8) -> LatLng {
        let n = f64::from(Self::tiles_per_axis(z));
        let lng = f64::from(x) / n * 360.0 - 180.0;
        let merc = PI * (1.0 - 2.0 * f64::from(y) / n);
        LatLng::new(merc.sinh().atan().to_degrees(), lng)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
