//! Keeps the attached representations in sync with the visible region
//!
//! The engine owns every element placed on a map. For each one it remembers
//! the visual currently attached to the host, if any. A region change tests
//! every element, detaches those that left the view and attaches those that
//! entered it; a redraw swaps an attached visual for a fresh one at the same
//! rank. All of this happens on the owning thread, so operations on one
//! element never interleave.

use super::host::RenderHost;
use super::rendered::{RenderedEntry, RenderedSet};
use crate::core::projection::Projection;
use crate::core::viewport::VisibleRegion;
use crate::elements::{DrawContext, Element, ElementId, MapElement, MapVisual, VisualId};
use std::collections::BTreeMap;

#[derive(Debug)]
struct Tracked {
    element: Element,
    /// The attached representation, `None` while off screen
    visual: Option<VisualId>,
}

/// Attach/detach counts of one region change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub attached: usize,
    pub detached: usize,
    pub redrawn: usize,
}

#[derive(Debug, Default)]
pub struct VisibilityEngine {
    // Ids are handed out in increasing order, so iteration follows insertion
    elements: BTreeMap<ElementId, Tracked>,
    rendered: RenderedSet,
    region: Option<VisibleRegion>,
    next_element: u64,
    next_visual: u64,
}

impl VisibilityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `element`; it is attached right away if visible
    pub fn add(
        &mut self,
        element: Element,
        host: &mut dyn RenderHost,
        projection: &dyn Projection,
    ) -> ElementId {
        self.next_element += 1;
        let id = ElementId(self.next_element);
        self.elements.insert(
            id,
            Tracked {
                element,
                visual: None,
            },
        );

        if let Some(region) = self.region {
            if self.is_visible(id, &region) {
                self.attach(id, host, projection);
            }
        }
        id
    }

    /// Stops tracking `id`, detaching it first
    pub fn remove(&mut self, id: ElementId, host: &mut dyn RenderHost) -> Option<Element> {
        self.detach(id, host);
        self.elements.remove(&id).map(|tracked| tracked.element)
    }

    /// Diffs every element against `region`
    pub fn update_region(
        &mut self,
        region: VisibleRegion,
        host: &mut dyn RenderHost,
        projection: &dyn Projection,
    ) -> DiffStats {
        let zoom_changed = self.region.map_or(true, |old| old.zoom != region.zoom);
        self.region = Some(region);

        // Pure reads first, mutations after
        let verdicts: Vec<(ElementId, bool, bool)> = self
            .elements
            .iter()
            .map(|(id, tracked)| {
                (
                    *id,
                    tracked.element.test_visual(&region),
                    tracked.visual.is_some(),
                )
            })
            .collect();

        let mut stats = DiffStats::default();
        for (id, visible, attached) in verdicts {
            match (visible, attached) {
                (true, false) => {
                    self.attach(id, host, projection);
                    stats.attached += 1;
                }
                (false, true) => {
                    self.detach(id, host);
                    stats.detached += 1;
                }
                // Primitives are in world pixels of one zoom
                (true, true) if zoom_changed => {
                    self.redraw(id, host, projection);
                    stats.redrawn += 1;
                }
                _ => {}
            }
        }

        if stats.attached + stats.detached > 0 {
            log::debug!(
                "region diff at zoom {}: +{} -{} ({} attached)",
                region.zoom,
                stats.attached,
                stats.detached,
                self.rendered.len()
            );
        }
        stats
    }

    /// Replaces the attached visual of `id` with a fresh one at the same rank.
    ///
    /// Returns false if the element is unknown or not attached.
    pub fn redraw(
        &mut self,
        id: ElementId,
        host: &mut dyn RenderHost,
        projection: &dyn Projection,
    ) -> bool {
        let Some(region) = self.region else {
            return false;
        };
        let Some(old) = self.elements.get(&id).and_then(|tracked| tracked.visual) else {
            return false;
        };

        let visual = self.produce(id, &region, projection);
        let entry = RenderedEntry {
            visual: visual.id,
            element: id,
            z_index: visual.z_index,
        };
        let Some(position) = self.rendered.replace(old, entry) else {
            return false;
        };

        host.detach(old);
        host.attach(position, visual);
        if let Some(tracked) = self.elements.get_mut(&id) {
            tracked.visual = Some(entry.visual);
        }
        true
    }

    /// Mutates an element in place, then re-tests and redraws it.
    ///
    /// Returns false if `id` is unknown.
    pub fn update<F>(
        &mut self,
        id: ElementId,
        mutate: F,
        host: &mut dyn RenderHost,
        projection: &dyn Projection,
    ) -> bool
    where
        F: FnOnce(&mut Element),
    {
        match self.elements.get_mut(&id) {
            Some(tracked) => mutate(&mut tracked.element),
            None => return false,
        }
        self.refresh(id, host, projection);
        true
    }

    /// Swaps the element behind `id`; an attached one is redrawn in place
    pub fn replace(
        &mut self,
        id: ElementId,
        element: Element,
        host: &mut dyn RenderHost,
        projection: &dyn Projection,
    ) -> bool {
        self.update(id, move |current| *current = element, host, projection)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id).map(|tracked| &tracked.element)
    }

    pub fn is_attached(&self, id: ElementId) -> bool {
        self.elements
            .get(&id)
            .map_or(false, |tracked| tracked.visual.is_some())
    }

    /// Attached elements in paint order
    pub fn attached_ids(&self) -> Vec<ElementId> {
        self.rendered.iter().map(|entry| entry.element).collect()
    }

    pub fn element_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.keys().copied()
    }

    pub fn rendered(&self) -> &RenderedSet {
        &self.rendered
    }

    pub fn region(&self) -> Option<VisibleRegion> {
        self.region
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Re-tests one element against the current region after it changed
    fn refresh(&mut self, id: ElementId, host: &mut dyn RenderHost, projection: &dyn Projection) {
        let Some(region) = self.region else {
            return;
        };
        let visible = self.is_visible(id, &region);
        match (visible, self.is_attached(id)) {
            (true, true) => {
                self.redraw(id, host, projection);
            }
            (true, false) => self.attach(id, host, projection),
            (false, true) => self.detach(id, host),
            (false, false) => {}
        }
    }

    fn is_visible(&self, id: ElementId, region: &VisibleRegion) -> bool {
        self.elements
            .get(&id)
            .map_or(false, |tracked| tracked.element.test_visual(region))
    }

    fn attach(&mut self, id: ElementId, host: &mut dyn RenderHost, projection: &dyn Projection) {
        let Some(region) = self.region else {
            return;
        };
        if self.is_attached(id) || !self.elements.contains_key(&id) {
            return;
        }

        let visual = self.produce(id, &region, projection);
        let position = self.rendered.insert(RenderedEntry {
            visual: visual.id,
            element: id,
            z_index: visual.z_index,
        });
        if let Some(tracked) = self.elements.get_mut(&id) {
            tracked.visual = Some(visual.id);
        }
        host.attach(position, visual);
    }

    fn detach(&mut self, id: ElementId, host: &mut dyn RenderHost) {
        let Some(visual) = self
            .elements
            .get_mut(&id)
            .and_then(|tracked| tracked.visual.take())
        else {
            return;
        };
        self.rendered.remove(visual);
        host.detach(visual);
    }

    fn produce(
        &mut self,
        id: ElementId,
        region: &VisibleRegion,
        projection: &dyn Projection,
    ) -> MapVisual {
        self.next_visual += 1;
        let ctx = DrawContext::new(region.zoom, projection);
        let (z_index, primitives) = match self.elements.get(&id) {
            Some(tracked) => (tracked.element.z_index(), tracked.element.draw(&ctx)),
            None => (0, Vec::new()),
        };
        MapVisual {
            id: VisualId(self.next_visual),
            element: id,
            z_index,
            primitives,
        }
    }
}
