//! Shared value types for the tilestream engine: tile ids and spatial bounds.

mod bounds;
mod types;

pub use bounds::Bounds;
pub use types::{MAX_LEVEL, MAX_ROOT_TILES, Quadrant, TileId, TileIdError};
