//! Request bookkeeping shared by the builder and the manager.
//!
//! Preload-level requests live in an unbounded map for the lifetime of the
//! tile set; every other request goes through the bounded [`RequestCache`].
//! A tile id is only ever held by one of the two.

use std::collections::BTreeMap;

use tilestream_common::TileId;

use crate::cache::RequestCache;
use crate::request::RequestHandle;
use crate::source::TileDataSource;

pub(crate) struct TileDataStore<D> {
    preloaded: BTreeMap<TileId, RequestHandle<D>>,
    level_is_preloaded: Vec<bool>,
    view: RequestCache<D>,
}

impl<D> TileDataStore<D> {
    pub(crate) fn new(max_level: u8, view_capacity: usize) -> Self {
        Self {
            preloaded: BTreeMap::new(),
            level_is_preloaded: vec![false; usize::from(max_level) + 1],
            view: RequestCache::new(view_capacity),
        }
    }

    /// Request every tile of `level` for a root grid of `roots_x` by `roots_y`.
    pub(crate) fn preload_level<S>(&mut self, source: &S, level: u8, roots_x: u32, roots_y: u32)
    where
        S: TileDataSource<Data = D>,
    {
        let Some(flag) = self.level_is_preloaded.get_mut(usize::from(level)) else {
            return;
        };
        *flag = true;

        let tiles_x = roots_x << level;
        let tiles_y = roots_y << level;
        for y in 0..tiles_y {
            for x in 0..tiles_x {
                let Ok(id) = TileId::new(level, x, y) else {
                    continue;
                };
                self.preloaded.insert(id, source.request_data(id));
            }
        }
        tracing::debug!(
            level,
            tiles = u64::from(tiles_x) * u64::from(tiles_y),
            "requested preload level"
        );
    }

    pub(crate) fn is_preload_level(&self, level: u8) -> bool {
        self.level_is_preloaded
            .get(usize::from(level))
            .copied()
            .unwrap_or(false)
    }

    /// Request for `id` if one was already issued. Cached entries are touched.
    pub(crate) fn get_existing(&mut self, id: TileId) -> Option<RequestHandle<D>> {
        if self.is_preload_level(id.level()) {
            if let Some(request) = self.preloaded.get(&id) {
                return Some(request.clone());
            }
        }
        self.view.get(id, true)
    }

    /// Existing request for `id`, or a new one from `source`.
    pub(crate) fn get_or_create<S>(&mut self, source: &S, id: TileId) -> RequestHandle<D>
    where
        S: TileDataSource<Data = D>,
    {
        if let Some(request) = self.get_existing(id) {
            return request;
        }
        let request = source.request_data(id);
        if let Some((evicted, _)) = self.view.insert(id, request.clone(), true) {
            tracing::trace!(%evicted, "evicted cached request at capacity");
        }
        request
    }

    pub(crate) fn preloaded_len(&self) -> usize {
        self.preloaded.len()
    }

    /// Preload requests still in flight.
    pub(crate) fn preload_pending(&self) -> usize {
        self.preloaded.values().filter(|r| !r.is_finished()).count()
    }

    /// Preload requests that finished without data.
    pub(crate) fn preload_failed(&self) -> usize {
        self.preloaded.values().filter(|r| r.is_failed()).count()
    }

    pub(crate) fn view(&self) -> &RequestCache<D> {
        &self.view
    }

    pub(crate) fn view_mut(&mut self) -> &mut RequestCache<D> {
        &mut self.view
    }
}
