//! # mapview
//!
//! Tile acquisition and visibility engine for pannable, zoomable raster maps.
//!
//! The crate covers two subsystems and leaves painting, gestures and UI
//! plumbing to the host:
//!
//! - the **tile pipeline**: a bounded-parallel [`DownloadDispatcher`], a
//!   TTL-gated disk [`TileCacheStore`], and a per-tile [`TileLoadingContext`]
//!   state machine tying them together;
//! - the **view**: a [`TileSetManager`] that keeps the visible tile rectangle
//!   populated with placeholders and loaded tiles, and a [`VisibilityEngine`]
//!   that attaches and detaches element representations on every viewport
//!   change while keeping them in z-order.
//!
//! [`MapView`] owns both and is driven from a single owning thread.

pub mod core;
pub mod elements;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::MapViewConfig,
    geo::{LatLng, LatLngBounds, Point, Rect, TileCoord},
    map::{MapCommand, MapCommandSender, MapView},
    projection::{Projection, WebMercator},
    viewport::{Viewport, VisibleRegion},
};

pub use elements::{Element, ElementId, MapElement, MapVisual, PathElement, PointElement, TileElement};

pub use layers::{
    host::{RecordingHost, RenderHost},
    rendered::RenderedSet,
    tile_set::TileSetManager,
    visibility::VisibilityEngine,
};

pub use tiles::{
    cache::TileCacheStore,
    context::{LoadOutcome, LoadState, TileEvent, TileLoadingContext},
    dispatcher::DownloadDispatcher,
    fetch::{HttpFetcher, TileFetcher},
    loader::TileLoader,
    source::{TemplateSource, TileSource},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Failed to write cache file {path}: {source}")]
    CacheWrite {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl MapError {
    /// Cooperative aborts are not failures and are never surfaced to users
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MapError::Cancelled)
    }
}

/// Error type alias for convenience
pub type Error = MapError;

/// Installs `env_logger`, honoring `RUST_LOG`. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
