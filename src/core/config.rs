//! Configuration for the tile pipeline and the view
//!
//! Every section has sensible defaults and a couple of presets, and the whole
//! tree can be loaded from JSON so hosts can keep it next to their own settings.

use crate::core::constants::{
    DEFAULT_CACHE_TTL, DEFAULT_DOWNLOAD_WORKERS, MAX_ZOOM, TILE_SIZE,
};
use crate::core::geo::{LatLng, Point};
use crate::core::viewport::Viewport;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration handed to [`crate::core::map::MapView`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapViewConfig {
    pub dispatcher: DispatcherConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub tiles: TileSetConfig,
    pub viewport: ViewportConfig,
}

impl MapViewConfig {
    /// Parses a JSON document; missing sections fall back to defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.workers == 0 {
            return Err(MapError::Config("dispatcher.workers must be at least 1".into()));
        }
        if self.tiles.tile_size == 0 {
            return Err(MapError::Config("tiles.tile_size must be positive".into()));
        }
        if self.viewport.min_zoom > self.viewport.max_zoom {
            return Err(MapError::Config(format!(
                "viewport.min_zoom {} exceeds max_zoom {}",
                self.viewport.min_zoom, self.viewport.max_zoom
            )));
        }
        if self.viewport.max_zoom > MAX_ZOOM {
            return Err(MapError::Config(format!(
                "viewport.max_zoom {} exceeds {}",
                self.viewport.max_zoom, MAX_ZOOM
            )));
        }
        Ok(())
    }

    /// Small pool, short timeouts, no memory tier
    pub fn for_testing(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            dispatcher: DispatcherConfig { workers: 2 },
            cache: CacheConfig {
                root: cache_root.into(),
                ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
                memory_capacity: 0,
            },
            fetch: FetchConfig {
                timeout_ms: 2_000,
                ..FetchConfig::default()
            },
            tiles: TileSetConfig::default(),
            viewport: ViewportConfig::default(),
        }
    }

    pub fn low_resource() -> Self {
        Self {
            dispatcher: DispatcherConfig { workers: 4 },
            cache: CacheConfig {
                memory_capacity: 64,
                ..CacheConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Download dispatcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of parallel download slots
    pub workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_DOWNLOAD_WORKERS,
        }
    }
}

/// Disk cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory that holds `<cache name>/<zoom>/<x>.<y>.png`
    pub root: PathBuf,
    /// Maximum age of a cached tile, in seconds
    pub ttl_secs: u64,
    /// Tiles kept in memory in front of the disk; 0 disables the tier
    pub memory_capacity: usize,
}

impl CacheConfig {
    /// Cache under the platform's local data directory for `organization`/`application`
    pub fn app_data(organization: &str, application: &str) -> Option<Self> {
        let dirs = directories::ProjectDirs::from("", organization, application)?;
        Some(Self {
            root: dirs.data_local_dir().join("Tiles Cache"),
            ..Self::default()
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("mapview-tiles"),
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            memory_capacity: 256,
        }
    }
}

/// HTTP client settings for the default fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Sent with every tile request
    pub user_agent: String,
    pub timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("mapview/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 30_000,
            pool_max_idle_per_host: 16,
        }
    }
}

/// Tile-set manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSetConfig {
    pub tile_size: u32,
    /// Drop tiles that leave the needed rectangle (and abort their loads)
    pub evict_out_of_range: bool,
}

impl Default for TileSetConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            evict_out_of_range: true,
        }
    }
}

/// Initial camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub center: LatLng,
    pub zoom: u8,
    pub width: f64,
    pub height: f64,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl ViewportConfig {
    pub fn to_viewport(&self) -> Viewport {
        let mut viewport = Viewport::new(self.center, self.zoom, Point::new(self.width, self.height));
        viewport.set_zoom_limits(self.min_zoom, self.max_zoom);
        viewport
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            center: LatLng::new(56.8563, 60.5515),
            zoom: 13,
            width: 800.0,
            height: 600.0,
            min_zoom: 0,
            max_zoom: MAX_ZOOM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapViewConfig::default();
        assert_eq!(config.dispatcher.workers, 10);
        assert_eq!(config.cache.ttl(), Duration::from_secs(40 * 24 * 3600));
        assert_eq!(config.tiles.tile_size, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MapViewConfig::from_json_str(
            r#"{ "dispatcher": { "workers": 3 }, "cache": { "ttl_secs": 60 } }"#,
        )
        .unwrap();
        assert_eq!(config.dispatcher.workers, 3);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.memory_capacity, 256);
        assert_eq!(config.viewport.zoom, 13);
    }

    #[test]
    fn test_json_round_trip() {
        let config = MapViewConfig::for_testing("/tmp/tiles");
        let json = config.to_json_string().unwrap();
        assert_eq!(MapViewConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = MapViewConfig::from_json_str(r#"{ "dispatcher": { "workers": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, MapError::Config(_)));

        let err = MapViewConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, MapError::Serialization(_)));
    }

    #[test]
    fn test_viewport_config() {
        let viewport = ViewportConfig {
            zoom: 20,
            max_zoom: 16,
            ..ViewportConfig::default()
        }
        .to_viewport();
        assert_eq!(viewport.zoom, 16);
    }
}
