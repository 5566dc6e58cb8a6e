use crate::core::geo::Point;
use crate::elements::{ElementId, MapVisual, VisualId};

/// The painting surface a map drives.
///
/// All calls come from the thread that owns the map. `position` indexes the
/// host's paint order: the visual is inserted before whatever currently sits
/// there, so the host list always mirrors the engine's z-order.
pub trait RenderHost {
    fn attach(&mut self, position: usize, visual: MapVisual);

    fn detach(&mut self, visual: VisualId);

    /// World pixel shown at the top-left of the screen
    fn set_origin(&mut self, origin: Point);
}

/// One call received by a [`RecordingHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    Attach { position: usize, visual: VisualId },
    Detach(VisualId),
}

/// Host that keeps the attached visuals in paint order.
///
/// Useful for hosts that repaint from a snapshot every frame, and for tests.
#[derive(Debug, Default)]
pub struct RecordingHost {
    visuals: Vec<MapVisual>,
    origin: Point,
    ops: Vec<HostOp>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attached visuals, first painted first
    pub fn visuals(&self) -> &[MapVisual] {
        &self.visuals
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Elements in paint order
    pub fn element_ids(&self) -> Vec<ElementId> {
        self.visuals.iter().map(|visual| visual.element).collect()
    }

    pub fn z_indices(&self) -> Vec<i32> {
        self.visuals.iter().map(|visual| visual.z_index).collect()
    }

    pub fn visual_of(&self, element: ElementId) -> Option<&MapVisual> {
        self.visuals.iter().find(|visual| visual.element == element)
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }
}

impl RenderHost for RecordingHost {
    fn attach(&mut self, position: usize, visual: MapVisual) {
        self.ops.push(HostOp::Attach {
            position,
            visual: visual.id,
        });
        let position = position.min(self.visuals.len());
        self.visuals.insert(position, visual);
    }

    fn detach(&mut self, visual: VisualId) {
        self.ops.push(HostOp::Detach(visual));
        if let Some(index) = self.visuals.iter().position(|v| v.id == visual) {
            self.visuals.remove(index);
        } else {
            log::warn!("detach of unknown visual {:?}", visual);
        }
    }

    fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }
}
