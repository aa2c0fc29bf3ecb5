use std::time::{Duration, Instant};

use tilestream_common::{Bounds, TileId};

use crate::builder::{BuildStats, TileItem, TileSetBuilder};
use crate::diff::{TileSetDiff, split_sets};
use crate::error::TileSetError;
use crate::node::{NodeId, TileNode, TileTree};
use crate::options::{TileSetOptions, ValidatedOptions};
use crate::source::{TileDataSource, TileVisibility};
use crate::store::TileDataStore;

/// Per-update statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct TileSetStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub resident: usize,
    /// View requests held by the cache after trimming.
    pub cached_requests: usize,
    /// Cached view requests still in flight.
    pub pending_requests: usize,
    /// Live quadtree nodes, roots included.
    pub nodes: usize,
    pub build: BuildStats,
    pub frame_time: Duration,
}

/// Keeps the resident tile set for one dataset in step with a moving viewpoint.
///
/// Call [`TileSet::update`] once per frame from a single thread. Nothing is
/// resident until every preload request has finished.
pub struct TileSet<S: TileDataSource, V> {
    source: S,
    visibility: V,
    opts: ValidatedOptions,
    tree: TileTree,
    store: TileDataStore<S::Data>,
    preload_ready: bool,
    tiles: Vec<TileItem<S::Data>>,
    stats: TileSetStats,
}

impl<S, V> TileSet<S, V>
where
    S: TileDataSource,
    V: TileVisibility,
{
    /// Validate `options`, build the root grid and request all preload levels.
    pub fn new(source: S, visibility: V, options: TileSetOptions) -> Result<Self, TileSetError> {
        let opts = options.validate(&source)?;
        tracing::info!(
            min_level = opts.min_level,
            max_level = opts.max_level,
            max_tile_data = opts.max_tile_data,
            preload = opts.num_preload_data,
            max_view_data = opts.max_view_data,
            "creating tile set"
        );

        let tree = TileTree::with_roots(
            source.bounds(),
            opts.num_root_tiles_x,
            opts.num_root_tiles_y,
        );

        let capacity = opts.max_view_data.max(opts.cache_size_hint);
        let mut store = TileDataStore::new(
            opts.max_level,
            usize::try_from(capacity).unwrap_or(usize::MAX),
        );
        for &level in &opts.preload_levels {
            store.preload_level(
                &source,
                level,
                opts.num_root_tiles_x,
                opts.num_root_tiles_y,
            );
        }

        Ok(Self {
            source,
            visibility,
            opts,
            tree,
            store,
            preload_ready: false,
            tiles: Vec::new(),
            stats: TileSetStats::default(),
        })
    }

    /// Recompute the resident set for `viewpoint` and report what changed.
    ///
    /// Returns an empty diff while preload requests are still in flight.
    pub fn update(&mut self, viewpoint: &V::Viewpoint) -> TileSetDiff {
        let _span = tracing::info_span!("tileset_update").entered();
        let frame_start = Instant::now();

        if !self.preload_ready {
            let pending = self.store.preload_pending();
            if pending > 0 {
                tracing::trace!(pending, "waiting for preload data");
                return TileSetDiff::default();
            }
            self.preload_ready = true;
            let failed = self.store.preload_failed();
            if failed > 0 {
                tracing::warn!(
                    failed,
                    total = self.store.preloaded_len(),
                    "preload finished with failed requests; those tiles stay empty"
                );
            }
            tracing::debug!(tiles = self.store.preloaded_len(), "preload data ready");
        }

        self.visibility.update(viewpoint);

        let (tiles, build) = TileSetBuilder {
            opts: &self.opts,
            source: &self.source,
            visibility: &self.visibility,
            tree: &mut self.tree,
            store: &mut self.store,
        }
        .build();

        let diff = split_sets(&tiles, &self.tiles);
        self.tiles = tiles;

        self.stats = TileSetStats {
            added: diff.added.len(),
            updated: diff.updated.len(),
            removed: diff.removed.len(),
            resident: self.tiles.len(),
            cached_requests: self.store.view().len(),
            pending_requests: self.store.view().pending_count(),
            nodes: self.tree.len(),
            build,
            frame_time: frame_start.elapsed(),
        };

        tracing::trace!(
            added = self.stats.added,
            updated = self.stats.updated,
            removed = self.stats.removed,
            resident = self.stats.resident,
            "tile set update complete"
        );

        diff
    }

    /// Resident tile with `id`, found by binary search.
    pub fn get_tile(&self, id: TileId) -> Option<&TileItem<S::Data>> {
        self.tiles
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|i| &self.tiles[i])
    }

    /// Resident tiles sorted by id.
    pub fn tiles(&self) -> &[TileItem<S::Data>] {
        &self.tiles
    }

    /// Node of a resident tile.
    pub fn node(&self, node: NodeId) -> Option<&TileNode> {
        self.tree.get(node)
    }

    pub fn bounds(&self) -> Bounds {
        self.source.bounds()
    }

    pub fn min_level(&self) -> u8 {
        self.opts.min_level
    }

    pub fn max_level(&self) -> u8 {
        self.opts.max_level
    }

    pub fn num_root_tiles_x(&self) -> u32 {
        self.opts.num_root_tiles_x
    }

    pub fn num_root_tiles_y(&self) -> u32 {
        self.opts.num_root_tiles_y
    }

    pub fn options(&self) -> &ValidatedOptions {
        &self.opts
    }

    /// True once every preload request has finished.
    pub fn preload_ready(&self) -> bool {
        self.preload_ready
    }

    /// Statistics from the last update that produced a tile set.
    pub fn stats(&self) -> &TileSetStats {
        &self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.store.view().len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn visibility_mut(&mut self) -> &mut V {
        &mut self.visibility
    }
}
