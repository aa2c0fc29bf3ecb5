use std::cmp::Ordering;
use std::sync::Arc;

use tilestream_common::TileId;

use crate::builder::TileItem;

/// Incremental change between two resident tile lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSetDiff {
    /// Newly resident tiles.
    pub added: Vec<TileId>,
    /// Tiles resident before and after whose data changed.
    pub updated: Vec<TileId>,
    /// Tiles no longer resident.
    pub removed: Vec<TileId>,
}

impl TileSetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Linear merge of two id-sorted lists.
pub(crate) fn split_sets<D>(new: &[TileItem<D>], old: &[TileItem<D>]) -> TileSetDiff {
    let mut diff = TileSetDiff::default();
    let (mut i, mut j) = (0, 0);
    while i < new.len() && j < old.len() {
        let (n, o) = (&new[i], &old[j]);
        match n.id.cmp(&o.id) {
            Ordering::Less => {
                diff.added.push(n.id);
                i += 1;
            }
            Ordering::Greater => {
                diff.removed.push(o.id);
                j += 1;
            }
            Ordering::Equal => {
                if !Arc::ptr_eq(&n.data, &o.data) {
                    diff.updated.push(n.id);
                }
                i += 1;
                j += 1;
            }
        }
    }
    diff.added.extend(new[i..].iter().map(|t| t.id));
    diff.removed.extend(old[j..].iter().map(|t| t.id));
    diff
}
