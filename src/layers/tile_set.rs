//! Keeps the tile rectangle under the viewport populated
//!
//! Every missing tile immediately gets a placeholder element so the surface
//! never shows a gap, and a loading context whose completion comes back to
//! the owning thread as a [`MapCommand::TileEvent`]. Ready tiles replace their
//! placeholder in place; failed ones keep it until [`TileSetManager::retry_failed`].

use super::host::RenderHost;
use super::visibility::VisibilityEngine;
use crate::core::config::TileSetConfig;
use crate::core::geo::TileCoord;
use crate::core::map::{MapCommand, MapCommandSender};
use crate::core::projection::Projection;
use crate::core::viewport::VisibleRegion;
use crate::elements::{Element, ElementId, TileElement};
use crate::tiles::context::{LoadOutcome, TileEvent, TileLoadingContext};
use crate::tiles::loader::TileLoader;
use fxhash::{FxHashMap, FxHashSet};

/// Rectangle of tile indices needed to cover a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_x: u32,
    pub min_y: u32,
    pub columns: u32,
    pub rows: u32,
    pub zoom: u8,
}

impl TileRange {
    /// Tiles needed for `region`: the tile under the north-west corner, then
    /// `ceil(extent / tile_size) + 1` tiles per axis, clipped to the world.
    pub fn covering(region: &VisibleRegion, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1) as f64;
        let per_axis = TileCoord::tiles_per_axis(region.zoom);
        let first = |world: f64| ((world / tile_size).floor().max(0.0) as u32).min(per_axis - 1);
        let count = |extent: f64| (extent.max(0.0) / tile_size).ceil() as u32 + 1;

        let min_x = first(region.origin.x);
        let min_y = first(region.origin.y);
        Self {
            min_x,
            min_y,
            columns: count(region.size.x).min(per_axis - min_x),
            rows: count(region.size.y).min(per_axis - min_y),
            zoom: region.zoom,
        }
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.z == self.zoom
            && coord.x >= self.min_x
            && coord.x < self.min_x + self.columns
            && coord.y >= self.min_y
            && coord.y < self.min_y + self.rows
    }

    pub fn len(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major from the north-west corner
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_y..self.min_y + self.rows).flat_map(move |y| {
            (self.min_x..self.min_x + self.columns).map(move |x| TileCoord::new(x, y, self.zoom))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug)]
struct TileSlot {
    element: ElementId,
    context: TileLoadingContext,
    status: TileStatus,
}

/// Counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileSetStats {
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl TileSetStats {
    /// Tiles still shown as placeholders
    pub fn placeholders(&self) -> usize {
        self.loading + self.failed
    }

    pub fn total(&self) -> usize {
        self.loading + self.loaded + self.failed
    }
}

pub struct TileSetManager {
    loader: TileLoader,
    config: TileSetConfig,
    events: MapCommandSender,
    tiles: FxHashMap<TileCoord, TileSlot>,
    range: Option<TileRange>,
}

impl TileSetManager {
    pub fn new(loader: TileLoader, config: TileSetConfig, events: MapCommandSender) -> Self {
        Self {
            loader,
            config,
            events,
            tiles: FxHashMap::default(),
            range: None,
        }
    }

    /// Brings the tile set in line with `region`.
    ///
    /// Returns how many tiles were requested.
    pub fn update(
        &mut self,
        region: &VisibleRegion,
        engine: &mut VisibilityEngine,
        host: &mut dyn RenderHost,
        projection: &dyn Projection,
    ) -> usize {
        let range = TileRange::covering(region, self.config.tile_size);
        self.range = Some(range);

        if self.config.evict_out_of_range {
            self.evict_outside(&range, engine, host);
        }

        let mut requested = 0;
        for coord in range.iter() {
            if self.tiles.contains_key(&coord) {
                continue;
            }
            let element = engine.add(TileElement::placeholder(coord).into(), host, projection);
            let context = self.start(coord);
            self.tiles.insert(
                coord,
                TileSlot {
                    element,
                    context,
                    status: TileStatus::Loading,
                },
            );
            requested += 1;
        }

        if requested > 0 {
            log::debug!(
                "requested {} tiles for {}x{} at {}/{}/{}",
                requested,
                range.columns,
                range.rows,
                range.zoom,
                range.min_x,
                range.min_y
            );
        }
        requested
    }

    /// Applies the completion of a loading context.
    ///
    /// Events from contexts that were evicted or superseded are ignored.
    pub fn handle_event(
        &mut self,
        event: TileEvent,
        engine: &mut VisibilityEngine,
        host: &mut dyn RenderHost,
        projection: &dyn Projection,
    ) {
        let Some(slot) = self.tiles.get_mut(&event.coord) else {
            log::debug!("dropping event for untracked tile {}", event.coord);
            return;
        };
        if slot.context.id() != event.context_id {
            log::debug!("dropping stale event for tile {}", event.coord);
            return;
        }

        match event.outcome {
            LoadOutcome::Ready(image) => {
                let loaded = Element::Tile(TileElement::loaded(event.coord, image));
                engine.replace(slot.element, loaded, host, projection);
                slot.status = TileStatus::Loaded;
            }
            LoadOutcome::Failed(e) => {
                log::warn!("tile {} stays a placeholder: {}", event.coord, e);
                slot.status = TileStatus::Failed;
            }
            LoadOutcome::Aborted => {}
        }
    }

    /// Starts a new load for every tile left in `Failed`
    pub fn retry_failed(&mut self) -> usize {
        let failed: Vec<TileCoord> = self
            .tiles
            .iter()
            .filter(|(_, slot)| slot.status == TileStatus::Failed)
            .map(|(coord, _)| *coord)
            .collect();

        for coord in &failed {
            let context = self.start(*coord);
            if let Some(slot) = self.tiles.get_mut(coord) {
                slot.context = context;
                slot.status = TileStatus::Loading;
            }
        }
        if !failed.is_empty() {
            log::info!("retrying {} failed tiles", failed.len());
        }
        failed.len()
    }

    /// Aborts every load and removes every tile element
    pub fn clear(&mut self, engine: &mut VisibilityEngine, host: &mut dyn RenderHost) {
        for (_, slot) in self.tiles.drain() {
            slot.context.abort();
            engine.remove(slot.element, host);
        }
        self.range = None;
    }

    pub fn stats(&self) -> TileSetStats {
        let mut stats = TileSetStats::default();
        for slot in self.tiles.values() {
            match slot.status {
                TileStatus::Loading => stats.loading += 1,
                TileStatus::Loaded => stats.loaded += 1,
                TileStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn status(&self, coord: &TileCoord) -> Option<TileStatus> {
        self.tiles.get(coord).map(|slot| slot.status)
    }

    pub fn element(&self, coord: &TileCoord) -> Option<ElementId> {
        self.tiles.get(coord).map(|slot| slot.element)
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.tiles.contains_key(coord)
    }

    pub fn coords(&self) -> FxHashSet<TileCoord> {
        self.tiles.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// The rectangle computed by the last [`TileSetManager::update`]
    pub fn range(&self) -> Option<TileRange> {
        self.range
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }

    fn start(&self, coord: TileCoord) -> TileLoadingContext {
        let context = self.loader.context(coord);
        let events = self.events.clone();
        // The task is detached; abort() goes through the context itself
        let _ = context.start(move |event| {
            if events.send(MapCommand::TileEvent(event)).is_err() {
                log::debug!("map dropped before tile event was delivered");
            }
        });
        context
    }

    fn evict_outside(
        &mut self,
        range: &TileRange,
        engine: &mut VisibilityEngine,
        host: &mut dyn RenderHost,
    ) {
        let outside: Vec<TileCoord> = self
            .tiles
            .keys()
            .filter(|coord| !range.contains(coord))
            .copied()
            .collect();

        for coord in &outside {
            if let Some(slot) = self.tiles.remove(coord) {
                slot.context.abort();
                engine.remove(slot.element, host);
            }
        }
        if !outside.is_empty() {
            log::debug!("evicted {} tiles outside the view", outside.len());
        }
    }
}

impl Drop for TileSetManager {
    fn drop(&mut self) {
        for slot in self.tiles.values() {
            slot.context.abort();
        }
    }
}
