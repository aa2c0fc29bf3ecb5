//! Deterministic collaborators for unit tests.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec2;
use parking_lot::Mutex;
use tilestream_common::{Bounds, TileId};

use crate::node::TileNode;
use crate::request::{RequestError, RequestHandle, RequestResolver};
use crate::source::{TileDataSource, TileVisibility, Visibility};

/// Data source whose requests stay pending until the test resolves them.
pub(crate) struct ManualSource {
    roots_x: u32,
    roots_y: u32,
    max_level: u8,
    auto_resolve: bool,
    pending: Mutex<BTreeMap<TileId, RequestResolver<TileId>>>,
    requests: Mutex<Vec<TileId>>,
}

impl ManualSource {
    pub(crate) fn new(roots_x: u32, roots_y: u32, max_level: u8) -> Self {
        Self {
            roots_x,
            roots_y,
            max_level,
            auto_resolve: false,
            pending: Mutex::new(BTreeMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request is finished as soon as it is issued.
    pub(crate) fn instant(roots_x: u32, roots_y: u32, max_level: u8) -> Self {
        Self {
            auto_resolve: true,
            ..Self::new(roots_x, roots_y, max_level)
        }
    }

    pub(crate) fn resolve(&self, id: TileId) -> bool {
        match self.pending.lock().remove(&id) {
            Some(resolver) => resolver.resolve(id),
            None => false,
        }
    }

    pub(crate) fn fail(&self, id: TileId) -> bool {
        match self.pending.lock().remove(&id) {
            Some(resolver) => resolver.fail(RequestError::Failed(format!("no data for {id}"))),
            None => false,
        }
    }

    pub(crate) fn resolve_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.pending.lock());
        let count = drained.len();
        for (id, resolver) in drained {
            resolver.resolve(id);
        }
        count
    }

    pub(crate) fn is_pending(&self, id: TileId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn requested(&self, id: TileId) -> usize {
        self.requests.lock().iter().filter(|r| **r == id).count()
    }
}

impl TileDataSource for ManualSource {
    type Data = TileId;

    fn bounds(&self) -> Bounds {
        Bounds::new(
            DVec2::ZERO,
            DVec2::new(f64::from(self.roots_x), f64::from(self.roots_y)),
        )
    }

    fn min_level(&self) -> u8 {
        0
    }

    fn max_level(&self) -> u8 {
        self.max_level
    }

    fn num_root_tiles_x(&self) -> u32 {
        self.roots_x
    }

    fn num_root_tiles_y(&self) -> u32 {
        self.roots_y
    }

    fn request_data(&self, id: TileId) -> RequestHandle<TileId> {
        self.requests.lock().push(id);
        if self.auto_resolve {
            return RequestHandle::ready(id);
        }
        let (handle, resolver) = RequestHandle::pending();
        self.pending.lock().insert(id, resolver);
        handle
    }
}

/// Visibility port driven by explicit id sets.
///
/// Every tile is visible unless listed in `hidden`; tiles in `refine`
/// exceed their error metric.
#[derive(Default)]
pub(crate) struct ScriptedVisibility {
    pub(crate) refine: BTreeSet<TileId>,
    pub(crate) hidden: BTreeSet<TileId>,
    pub(crate) updates: usize,
}

impl ScriptedVisibility {
    pub(crate) fn refining(ids: impl IntoIterator<Item = TileId>) -> Self {
        Self {
            refine: ids.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl TileVisibility for ScriptedVisibility {
    type Viewpoint = ();

    fn update(&mut self, _viewpoint: &()) {
        self.updates += 1;
    }

    fn visibility(&self, tile: &TileNode) -> Visibility {
        Visibility {
            is_visible: !self.hidden.contains(&tile.id),
            exceeds_error: self.refine.contains(&tile.id),
        }
    }
}

pub(crate) fn tile(level: u8, x: u32, y: u32) -> TileId {
    TileId::new(level, x, y).unwrap()
}
