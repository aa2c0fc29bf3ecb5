//! Breadth-first tile set construction.
//!
//! Starting from the root tiles, each tile whose data is ready is either kept
//! as resident or replaced by its four children. Children replace a parent only
//! when all four have data, so coverage never has holes below a loaded tile,
//! and a tile is never considered before its parent has been. Shallow tiles
//! therefore gate everything beneath them.

use std::sync::Arc;

use tilestream_common::TileId;

use crate::node::{NodeId, TileTree};
use crate::options::ValidatedOptions;
use crate::request::RequestHandle;
use crate::source::{TileDataSource, TileVisibility, Visibility};
use crate::store::TileDataStore;

/// One resident tile: its id, its node and its loaded data.
#[derive(Debug)]
pub struct TileItem<D> {
    pub id: TileId,
    pub node: NodeId,
    pub data: Arc<D>,
}

impl<D> Clone for TileItem<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            node: self.node,
            data: Arc::clone(&self.data),
        }
    }
}

/// Counters gathered during one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Tiles considered, roots included.
    pub queued: usize,
    /// Queued tiles skipped because their request was still in flight.
    pub pending: usize,
    /// Queued tiles skipped because their request failed.
    pub failed: usize,
    /// Splits deferred because not every child had data yet.
    pub deferred_splits: usize,
    /// Nodes released by pruning below resident tiles.
    pub pruned_nodes: usize,
    /// Cache entries evicted by the end-of-traversal trim.
    pub evicted: usize,
}

struct QueueEntry<D> {
    node: NodeId,
    id: TileId,
    visibility: Visibility,
    request: RequestHandle<D>,
}

/// Borrowed view of the tile set state needed for one traversal.
pub(crate) struct TileSetBuilder<'a, S: TileDataSource, V> {
    pub(crate) opts: &'a ValidatedOptions,
    pub(crate) source: &'a S,
    pub(crate) visibility: &'a V,
    pub(crate) tree: &'a mut TileTree,
    pub(crate) store: &'a mut TileDataStore<S::Data>,
}

impl<S, V> TileSetBuilder<'_, S, V>
where
    S: TileDataSource,
    V: TileVisibility,
{
    /// Run the traversal and return resident tiles sorted by id.
    pub(crate) fn build(self) -> (Vec<TileItem<S::Data>>, BuildStats) {
        let Self {
            opts,
            source,
            visibility,
            tree,
            store,
        } = self;
        let cap = opts.max_tile_data;
        let mut stats = BuildStats::default();
        let mut queue: Vec<QueueEntry<S::Data>> = Vec::new();
        let mut tiles = Vec::new();

        // Requests looked up or issued from here on belong to this traversal,
        // roots included.
        store.view_mut().mark_head();

        // All roots go first so the result covers the whole grid when the cap allows.
        for &node in tree.roots() {
            if queue.len() as u64 >= cap {
                break;
            }
            let Some(tile) = tree.get(node) else {
                continue;
            };
            queue.push(QueueEntry {
                node,
                id: tile.id,
                visibility: visibility.visibility(tile),
                request: store.get_or_create(source, tile.id),
            });
        }

        let mut i = 0;
        while i < queue.len() {
            let entry = &queue[i];
            let (node, id, vis) = (entry.node, entry.id, entry.visibility);
            i += 1;

            let Some(data) = entry.request.data() else {
                if entry.request.is_failed() {
                    stats.failed += 1;
                } else {
                    stats.pending += 1;
                }
                continue;
            };

            let level = id.level();
            let wants_detail = vis.exceeds_error || level < opts.min_level;
            let has_room = cap - (queue.len() as u64).min(cap) >= 4;
            let may_request = vis.is_visible || opts.speculative_child_requests;

            if wants_detail && level < opts.max_level && has_room {
                if let Some(children) =
                    ready_children(tree, store, source, visibility, node, may_request)
                {
                    queue.extend(children);
                    continue;
                }
                stats.deferred_splits += 1;
            }

            tiles.push(TileItem { id, node, data });
            stats.pruned_nodes += tree.destroy_children(node);
        }
        stats.queued = queue.len();

        let hint = usize::try_from(opts.cache_size_hint).unwrap_or(usize::MAX);
        stats.evicted = store.view_mut().trim_against_mark(hint);
        if stats.evicted > 0 {
            tracing::debug!(
                evicted = stats.evicted,
                cached = store.view().len(),
                hint,
                "trimmed request cache"
            );
        }

        tiles.sort_unstable_by_key(|t: &TileItem<S::Data>| t.id);
        (tiles, stats)
    }
}

/// Split `node` and look up its children. Returns the children ready to be
/// queued, or `None` if any of them is still without data.
///
/// Missing child requests are only issued when `may_request` is set;
/// otherwise the split succeeds only on requests that already exist.
fn ready_children<S, V>(
    tree: &mut TileTree,
    store: &mut TileDataStore<S::Data>,
    source: &S,
    visibility: &V,
    node: NodeId,
    may_request: bool,
) -> Option<Vec<QueueEntry<S::Data>>>
where
    S: TileDataSource,
    V: TileVisibility,
{
    let children = tree.create_children(node)?;

    let mut entries = Vec::with_capacity(4);
    let mut missing = false;
    for child in children {
        let id = tree.get(child)?.id;
        let request = if may_request {
            Some(store.get_or_create(source, id))
        } else {
            store.get_existing(id)
        };
        match request {
            Some(request) => entries.push((child, id, request)),
            None => missing = true,
        }
    }
    if missing {
        return None;
    }
    if !entries.iter().all(|(_, _, request)| request.is_ready()) {
        return None;
    }

    entries
        .into_iter()
        .map(|(node, id, request)| {
            let tile = tree.get(node)?;
            Some(QueueEntry {
                node,
                id,
                visibility: visibility.visibility(tile),
                request,
            })
        })
        .collect()
}
