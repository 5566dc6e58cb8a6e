//! Engine-wide constants, mostly slippy-map conventions.
//! Keeping them in a single place makes it easier to tweak magic numbers.

use std::time::Duration;

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom level a tile coordinate may carry.
pub const MAX_ZOOM: u8 = 19;

/// Z-index shared by placeholder and loaded tiles, below every overlay.
pub const TILE_Z_INDEX: i32 = -10;

/// Z-index of points and paths unless they override it.
pub const DEFAULT_Z_INDEX: i32 = 0;

/// Age after which a cached tile is refetched (40 days).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(40 * 24 * 60 * 60);

/// Parallel download slots of the dispatcher.
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 10;

/// Fill color of a tile that has not loaded yet (lemon chiffon).
pub const PLACEHOLDER_RGBA: [u8; 4] = [0xFF, 0xFA, 0xCD, 0xFF];
