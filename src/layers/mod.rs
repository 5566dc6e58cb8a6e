//! View-side bookkeeping: what is attached to the host, in which order, and
//! which tiles back the current viewport

pub mod host;
pub mod rendered;
pub mod tile_set;
pub mod visibility;

pub use host::{HostOp, RecordingHost, RenderHost};
pub use rendered::{RenderedEntry, RenderedSet};
pub use tile_set::{TileRange, TileSetManager, TileSetStats, TileStatus};
pub use visibility::{DiffStats, VisibilityEngine};
