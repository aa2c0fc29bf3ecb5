//! Bounded LRU cache of tile data requests with epoch marking.
//!
//! Every entry carries the epoch in which it was last inserted or touched.
//! [`RequestCache::mark_head`] opens a new epoch; eviction only ever considers
//! entries stamped with an older epoch. Because touching an entry also moves it
//! to the most-recently-used end, the evictable entries always form the
//! least-recently-used tail of the cache.

use lru::LruCache;
use tilestream_common::TileId;

use crate::request::RequestHandle;

struct CacheEntry<D> {
    request: RequestHandle<D>,
    epoch: u64,
}

/// LRU map of tile id to request, with mark-and-trim eviction.
pub struct RequestCache<D> {
    entries: LruCache<TileId, CacheEntry<D>>,
    capacity: usize,
    epoch: u64,
}

impl<D> RequestCache<D> {
    /// Create a cache that evicts on insert once it holds `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
            epoch: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.entries.contains(&id)
    }

    /// Look up the request for `id`.
    ///
    /// With `touch` set the entry becomes most recently used and joins the
    /// current epoch, protecting it from the next trim.
    pub fn get(&mut self, id: TileId, touch: bool) -> Option<RequestHandle<D>> {
        if touch {
            let epoch = self.epoch;
            let entry = self.entries.get_mut(&id)?;
            entry.epoch = epoch;
            Some(entry.request.clone())
        } else {
            self.entries.peek(&id).map(|e| e.request.clone())
        }
    }

    /// Insert a request, evicting the least recently used evictable entry
    /// first if the cache is full.
    ///
    /// A touched insert joins the current epoch at the most-recently-used end.
    /// An untouched insert goes to the least-recently-used end as if it
    /// predated the last mark. Returns the evicted entry, if any.
    pub fn insert(
        &mut self,
        id: TileId,
        request: RequestHandle<D>,
        touch: bool,
    ) -> Option<(TileId, RequestHandle<D>)> {
        let evicted = if !self.entries.contains(&id) && self.entries.len() >= self.capacity {
            self.pop_evictable()
        } else {
            None
        };

        let epoch = if touch { self.epoch } else { self.epoch.saturating_sub(1) };
        self.entries.put(id, CacheEntry { request, epoch });
        if !touch {
            self.entries.demote(&id);
        }
        evicted
    }

    /// Start a new epoch. Everything present now becomes evictable.
    pub fn mark_head(&mut self) {
        self.epoch += 1;
    }

    /// Evict least recently used entries from before the last mark until at
    /// most `limit` remain. Entries from the current epoch are never evicted,
    /// so the cache may stay above `limit`. Returns the number evicted.
    pub fn trim_against_mark(&mut self, limit: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > limit && self.pop_evictable().is_some() {
            evicted += 1;
        }
        evicted
    }

    /// Number of cached requests that have not finished yet.
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, e)| !e.request.is_finished())
            .count()
    }

    fn pop_evictable(&mut self) -> Option<(TileId, RequestHandle<D>)> {
        let (_, oldest) = self.entries.peek_lru()?;
        if oldest.epoch >= self.epoch {
            return None;
        }
        self.entries.pop_lru().map(|(id, e)| (id, e.request))
    }
}
