//! Prelude module for common mapview types and traits
//!
//! `use mapview::prelude::*;` brings in what a host needs to build a map,
//! feed it viewport changes and drain its command queue.

pub use crate::core::{
    config::{CacheConfig, DispatcherConfig, FetchConfig, MapViewConfig, TileSetConfig, ViewportConfig},
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::{MapCommand, MapCommandSender, MapView},
    projection::{Projection, WebMercator},
    viewport::{Viewport, VisibleRegion},
};

pub use crate::elements::{
    Color, Element, ElementId, MapElement, MapVisual, PathElement, PointElement, Primitive,
    Stroke, Symbol, TileElement,
};

pub use crate::layers::{RecordingHost, RenderHost, TileSetStats};

pub use crate::runtime::{AsyncHandle, AsyncSpawner, SharedSpawner, TokioSpawner};

pub use crate::tiles::{
    fetch::{HttpFetcher, TileFetcher},
    LoadOutcome, LoadState, TemplateSource, TileImage, TileLoader, TileLoadingContext, TileSource,
};

pub use crate::{MapError, Result};

pub use std::{sync::Arc, time::Duration};
