//! Tile acquisition pipeline: naming, fetching, caching and per-tile loading

pub mod cache;
pub mod context;
pub mod dispatcher;
pub mod fetch;
pub mod image;
pub mod loader;
pub mod source;

// Re-exports for convenience
pub use context::{LoadOutcome, LoadState, TileEvent, TileLoadingContext};
pub use image::TileImage;
pub use loader::TileLoader;
pub use source::{TemplateSource, TileSource};
