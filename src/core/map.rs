use crate::{
    core::{
        config::MapViewConfig,
        geo::{LatLng, Point},
        projection::{Projection, WebMercator},
        viewport::{Viewport, VisibleRegion},
    },
    elements::{Element, ElementId},
    layers::{
        host::RenderHost,
        tile_set::{TileSetManager, TileSetStats},
        visibility::VisibilityEngine,
    },
    tiles::{context::TileEvent, loader::TileLoader},
    MapError, Result,
};
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

/// Work queued for the thread that owns a [`MapView`]
pub enum MapCommand {
    /// A tile load reached a terminal state
    TileEvent(TileEvent),
    /// An element's own state changed and its visual must be rebuilt
    Redraw(ElementId),
    /// Mutate an element, then re-test and redraw it
    Update(ElementId, Box<dyn FnOnce(&mut Element) + Send>),
}

impl std::fmt::Debug for MapCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapCommand::TileEvent(event) => f.debug_tuple("TileEvent").field(event).finish(),
            MapCommand::Redraw(id) => f.debug_tuple("Redraw").field(id).finish(),
            MapCommand::Update(id, _) => f.debug_tuple("Update").field(id).finish(),
        }
    }
}

/// Cloneable handle for queueing [`MapCommand`]s from any thread
#[derive(Debug, Clone)]
pub struct MapCommandSender {
    tx: Sender<MapCommand>,
}

impl MapCommandSender {
    pub fn send(&self, command: MapCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| MapError::Runtime("map view dropped".into()))
    }

    pub fn request_redraw(&self, id: ElementId) -> Result<()> {
        self.send(MapCommand::Redraw(id))
    }

    pub fn update<F>(&self, id: ElementId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Element) + Send + 'static,
    {
        self.send(MapCommand::Update(id, Box::new(mutate)))
    }
}

/// A pannable, zoomable map bound to one rendering host.
///
/// Every viewport mutation produces a single [`VisibleRegion`] that drives the
/// tile set and the visibility engine together. Loads finish on runtime
/// workers and come back through the command queue, so the host must call
/// [`MapView::process_pending`] regularly (typically once per frame) on the
/// thread that owns the view.
pub struct MapView<H: RenderHost> {
    viewport: Viewport,
    projection: WebMercator,
    engine: VisibilityEngine,
    tiles: TileSetManager,
    host: H,
    region: VisibleRegion,
    commands: Receiver<MapCommand>,
    sender: MapCommandSender,
}

impl<H: RenderHost> MapView<H> {
    pub fn new(config: &MapViewConfig, loader: TileLoader, host: H) -> Result<Self> {
        config.validate()?;

        let (tx, commands) = crossbeam_channel::unbounded();
        let sender = MapCommandSender { tx };
        let viewport = config.viewport.to_viewport();
        let projection = WebMercator::new(config.tiles.tile_size);
        let region = viewport.region(&projection);

        let mut view = Self {
            viewport,
            projection,
            engine: VisibilityEngine::new(),
            tiles: TileSetManager::new(loader, config.tiles.clone(), sender.clone()),
            host,
            region,
            commands,
            sender,
        };
        view.refresh();
        Ok(view)
    }

    /// Moves the content by a screen-space drag of `delta`
    pub fn pan_by(&mut self, delta: Point) {
        self.viewport.pan_by(delta, &self.projection);
        self.refresh();
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.viewport.set_center(center);
        self.refresh();
    }

    pub fn set_zoom(&mut self, zoom: u8) {
        self.viewport.set_zoom(zoom);
        self.refresh();
    }

    /// Center and zoom in one transition
    pub fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.viewport.set_center(center);
        self.viewport.set_zoom(zoom);
        self.refresh();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.refresh();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.refresh();
    }

    pub fn resize(&mut self, size: Point) {
        self.viewport.resize(size);
        self.refresh();
    }

    pub fn add_element(&mut self, element: impl Into<Element>) -> ElementId {
        self.engine
            .add(element.into(), &mut self.host, &self.projection)
    }

    pub fn remove_element(&mut self, id: ElementId) -> Option<Element> {
        self.engine.remove(id, &mut self.host)
    }

    /// Mutates an element on the owning thread and refreshes its visual
    pub fn update_element<F>(&mut self, id: ElementId, mutate: F) -> bool
    where
        F: FnOnce(&mut Element),
    {
        self.engine
            .update(id, mutate, &mut self.host, &self.projection)
    }

    /// Rebuilds the visual of an attached element in place
    pub fn redraw_element(&mut self, id: ElementId) -> bool {
        self.engine.redraw(id, &mut self.host, &self.projection)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.engine.get(id)
    }

    pub fn command_sender(&self) -> MapCommandSender {
        self.sender.clone()
    }

    /// Applies every queued command without blocking; returns how many ran
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
            processed += 1;
        }
        processed
    }

    /// Waits up to `timeout` for the first command, then drains the queue
    pub fn wait_pending(&mut self, timeout: Duration) -> usize {
        match self.commands.recv_timeout(timeout) {
            Ok(command) => {
                self.apply(command);
                1 + self.process_pending()
            }
            Err(_) => 0,
        }
    }

    /// Re-requests every tile whose load failed
    pub fn retry_failed_tiles(&mut self) -> usize {
        self.tiles.retry_failed()
    }

    /// Geographic position under a screen point
    pub fn point_at(&self, screen: Point) -> LatLng {
        let world = self.region.to_world(&screen);
        self.projection.unproject(&world, self.region.zoom)
    }

    /// Screen position of a geographic point
    pub fn screen_point(&self, lat_lng: &LatLng) -> Point {
        let world = self.projection.project(lat_lng, self.region.zoom);
        self.region.to_screen(&world)
    }

    pub fn visible_region(&self) -> VisibleRegion {
        self.region
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn projection(&self) -> &dyn Projection {
        &self.projection
    }

    pub fn engine(&self) -> &VisibilityEngine {
        &self.engine
    }

    pub fn tiles(&self) -> &TileSetManager {
        &self.tiles
    }

    pub fn tile_stats(&self) -> TileSetStats {
        self.tiles.stats()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn apply(&mut self, command: MapCommand) {
        match command {
            MapCommand::TileEvent(event) => {
                self.tiles
                    .handle_event(event, &mut self.engine, &mut self.host, &self.projection)
            }
            MapCommand::Redraw(id) => {
                self.engine.redraw(id, &mut self.host, &self.projection);
            }
            MapCommand::Update(id, mutate) => {
                if !self
                    .engine
                    .update(id, mutate, &mut self.host, &self.projection)
                {
                    log::debug!("update for unknown {}", id);
                }
            }
        }
    }

    fn refresh(&mut self) {
        self.region = self.viewport.region(&self.projection);
        self.host.set_origin(self.region.origin);
        // Diff first so new placeholders are tested against the new region
        self.engine
            .update_region(self.region, &mut self.host, &self.projection);
        self.tiles
            .update(&self.region, &mut self.engine, &mut self.host, &self.projection);
    }
}

impl<H: RenderHost> Drop for MapView<H> {
    fn drop(&mut self) {
        self.tiles.clear(&mut self.engine, &mut self.host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::PointElement;
    use crate::layers::host::RecordingHost;
    use crate::runtime::TokioSpawner;
    use crate::tiles::fetch::TileFetcher;
    use crate::tiles::image::solid_png;
    use crate::tiles::source::TemplateSource;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct PngFetcher(Vec<u8>);

    #[async_trait]
    impl TileFetcher for PngFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn view(root: &std::path::Path) -> MapView<RecordingHost> {
        let config = MapViewConfig::for_testing(root);
        let loader = TileLoader::from_config(
            &config,
            Arc::new(TemplateSource::new("test", "http://tiles.test/{z}/{x}/{y}.png")),
            Arc::new(PngFetcher(solid_png(256, 256, [0, 128, 0, 255]).unwrap())),
            TokioSpawner::current().unwrap().shared(),
        );
        MapView::new(&config, loader, RecordingHost::new()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_point_at_round_trips_screen_point() {
        let dir = tempfile::tempdir().unwrap();
        let view = view(dir.path());

        let center = view.viewport().center;
        let screen = view.screen_point(&center);
        assert!((screen.x - 400.0).abs() <= 1.0);
        assert!((screen.y - 300.0).abs() <= 1.0);

        let back = view.point_at(screen);
        assert!((back.lat - center.lat).abs() < 1e-9);
        assert!((back.lng - center.lng).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_initial_view_requests_covering_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let view = view(dir.path());

        let range = view.tiles().range().unwrap();
        assert_eq!(range.zoom, 13);
        assert_eq!((range.columns, range.rows), (5, 4));
        assert_eq!(view.tiles().len(), 20);
        assert_eq!(view.host().origin(), view.visible_region().origin);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_commands_from_other_threads_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());
        let area = view.visible_region().area;
        let id = view.add_element(PointElement::new(area.center()));
        assert!(view.engine().is_attached(id));

        let sender = view.command_sender();
        let outside = LatLng::new(area.north() + 1.0, area.east() + 1.0);
        std::thread::spawn(move || {
            sender.request_redraw(id).unwrap();
            sender
                .update(id, move |element| {
                    if let Element::Point(point) = element {
                        point.set_position(outside);
                    }
                })
                .unwrap();
        })
        .join()
        .unwrap();

        // Tile events may be interleaved; drain until the update lands
        for _ in 0..50 {
            view.wait_pending(Duration::from_millis(20));
            if !view.engine().is_attached(id) {
                break;
            }
        }
        assert!(!view.engine().is_attached(id));
        assert!(view.host().visual_of(id).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sender_fails_after_view_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sender = view(dir.path()).command_sender();
        assert!(sender.request_redraw(ElementId(1)).is_err());
    }
}
