//! Tile set engine: visibility-driven quadtree tile selection and streaming.
//!
//! Each [`TileSet::update`] walks the quadtree breadth first from the root
//! tiles, replacing a tile by its four children only when the visibility port
//! says it needs more detail and all four children already have data. Data
//! requests are issued through a [`TileDataSource`] and polled, never awaited.
//! The result is diffed against the previous resident set.
//!
//! # Invariants
//! - The resident list is sorted by tile id and holds no duplicates.
//! - At most `max_tile_data` tiles are resident, preloaded tiles included.
//! - A quadtree node has zero or four children, never one to three.
//! - Requests referenced during an update are not evicted by that update.
//! - `update` never fails; missing or failed data only delays refinement.

mod builder;
mod cache;
mod diff;
mod error;
mod node;
mod options;
mod request;
mod source;
mod store;
mod tileset;
mod visibility;

#[cfg(test)]
mod testing;

pub use builder::{BuildStats, TileItem};
pub use cache::RequestCache;
pub use diff::TileSetDiff;
pub use error::TileSetError;
pub use node::{NodeId, TileNode, TileTree};
pub use options::{TileSetOptions, ValidatedOptions};
pub use request::{RequestError, RequestHandle, RequestResolver, RequestState};
pub use source::{TileDataSource, TileVisibility, Visibility};
pub use tileset::{TileSet, TileSetStats};
pub use visibility::{DistanceVisibility, Viewpoint};

pub fn crate_info() -> &'static str {
    "tilestream-tileset v0.1.0"
}
