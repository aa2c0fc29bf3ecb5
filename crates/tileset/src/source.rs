//! Collaborator interfaces: where tile data comes from and which tiles matter.

use tilestream_common::{Bounds, TileId};

use crate::node::TileNode;
use crate::request::RequestHandle;

/// Provider of tile data for one dataset.
///
/// `request_data` must return promptly; the load itself happens elsewhere and
/// completes the returned handle when done.
pub trait TileDataSource {
    type Data;

    /// Extent of the whole dataset.
    fn bounds(&self) -> Bounds;

    /// Shallowest level the source serves.
    fn min_level(&self) -> u8;

    /// Deepest level the source serves.
    fn max_level(&self) -> u8;

    fn num_root_tiles_x(&self) -> u32;

    fn num_root_tiles_y(&self) -> u32;

    /// Start loading the data for `id`.
    fn request_data(&self, id: TileId) -> RequestHandle<Self::Data>;
}

/// Result of evaluating one tile against the current viewpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visibility {
    pub is_visible: bool,
    /// The tile's resolution is too coarse for the viewpoint.
    pub exceeds_error: bool,
}

/// Per-viewpoint visibility and error metric evaluation.
pub trait TileVisibility {
    type Viewpoint;

    /// Refresh any cached state for a new viewpoint.
    fn update(&mut self, viewpoint: &Self::Viewpoint);

    fn visibility(&self, tile: &TileNode) -> Visibility;
}
