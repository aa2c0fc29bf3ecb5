//! Lazily split quadtree of tiles, stored in an index-addressed arena.
//!
//! # Invariants
//! - A node has either no children or exactly four, created and released together.
//! - Child bounds are the parent's bounds split in [`Quadrant::ALL`] order.
//! - Root nodes are never released.

use tilestream_common::{Bounds, Quadrant, TileId};

/// Stable index of a node inside a [`TileTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One tile of the quadtree.
#[derive(Debug, Clone)]
pub struct TileNode {
    pub id: TileId,
    pub bounds: Bounds,
    children: Option<[NodeId; 4]>,
}

impl TileNode {
    pub fn level(&self) -> u8 {
        self.id.level()
    }

    pub fn x(&self) -> u32 {
        self.id.x()
    }

    pub fn y(&self) -> u32 {
        self.id.y()
    }

    /// True when the four children currently exist.
    pub fn is_split(&self) -> bool {
        self.children.is_some()
    }

    /// Children in quadrant order, if the node is split.
    pub fn children(&self) -> Option<[NodeId; 4]> {
        self.children
    }
}

/// Arena owning every materialized tile node.
#[derive(Debug)]
pub struct TileTree {
    slots: Vec<Option<TileNode>>,
    free: Vec<NodeId>,
    roots: Vec<NodeId>,
    /// Most slots the arena may grow to.
    slot_limit: usize,
}

impl Default for TileTree {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            slot_limit: usize::try_from(u32::MAX).map_or(usize::MAX, |n| n + 1),
        }
    }
}

impl TileTree {
    /// Build the root grid by evenly subdividing `bounds` into `nx` by `ny` tiles.
    ///
    /// Roots are stored row by row, bottom row first.
    pub fn with_roots(bounds: Bounds, nx: u32, ny: u32) -> Self {
        let mut tree = Self::default();
        for y in 0..ny {
            for x in 0..nx {
                let Ok(id) = TileId::new(0, x, y) else {
                    continue;
                };
                let Some(node) = tree.alloc(TileNode {
                    id,
                    bounds: bounds.grid_cell(nx, ny, x, y),
                    children: None,
                }) else {
                    continue;
                };
                tree.roots.push(node);
            }
        }
        tree
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, node: NodeId) -> Option<&TileNode> {
        self.slots.get(node.index()).and_then(Option::as_ref)
    }

    /// Number of live nodes, roots included.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split `node` into four children, or return the existing ones.
    ///
    /// Returns `None` if the node is not live or its children would not be
    /// addressable.
    pub fn create_children(&mut self, node: NodeId) -> Option<[NodeId; 4]> {
        let parent = self.get(node)?;
        if let Some(children) = parent.children {
            return Some(children);
        }
        let ids = parent.id.children().ok()?;
        let bounds = parent.bounds;

        let mut children = [node; 4];
        for (i, (quadrant, id)) in Quadrant::ALL.into_iter().zip(ids).enumerate() {
            let allocated = self.alloc(TileNode {
                id,
                bounds: bounds.quadrant(quadrant),
                children: None,
            });
            let Some(child) = allocated else {
                for &child in &children[..i] {
                    self.release(child);
                }
                return None;
            };
            children[i] = child;
        }
        if let Some(parent) = self.slot_mut(node) {
            parent.children = Some(children);
        }
        Some(children)
    }

    /// Release the children of `node` and everything below them.
    ///
    /// Returns the number of nodes released.
    pub fn destroy_children(&mut self, node: NodeId) -> usize {
        let Some(children) = self.slot_mut(node).and_then(|n| n.children.take()) else {
            return 0;
        };

        let mut released = 0;
        let mut stack = children.to_vec();
        while let Some(next) = stack.pop() {
            if let Some(removed) = self.slots.get_mut(next.index()).and_then(Option::take) {
                if let Some(grandchildren) = removed.children {
                    stack.extend(grandchildren);
                }
                self.free.push(next);
                released += 1;
            }
        }
        released
    }

    fn slot_mut(&mut self, node: NodeId) -> Option<&mut TileNode> {
        self.slots.get_mut(node.index()).and_then(Option::as_mut)
    }

    /// Store `node` in a free slot. Returns `None` once `NodeId` space is used up.
    fn alloc(&mut self, node: TileNode) -> Option<NodeId> {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(node);
            return Some(id);
        }
        if self.slots.len() >= self.slot_limit {
            return None;
        }
        let id = NodeId(u32::try_from(self.slots.len()).ok()?);
        self.slots.push(Some(node));
        Some(id)
    }

    fn release(&mut self, node: NodeId) {
        if let Some(slot) = self.slots.get_mut(node.index()) {
            if slot.take().is_some() {
                self.free.push(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn tree() -> TileTree {
        TileTree::with_roots(
            Bounds::new(DVec2::ZERO, DVec2::new(2.0, 1.0)),
            2,
            1,
        )
    }

    fn split_count(tree: &TileTree, node: NodeId) -> usize {
        let node = tree.get(node).unwrap();
        node.children()
            .map(|c| c.iter().filter(|id| tree.get(**id).is_some()).count())
            .unwrap_or(0)
    }

    #[test]
    fn roots_cover_grid_in_row_order() {
        let tree = tree();
        assert_eq!(tree.roots().len(), 2);
        let right = tree.get(tree.roots()[1]).unwrap();
        assert_eq!((right.x(), right.y(), right.level()), (1, 0, 0));
        assert_eq!(right.bounds.min, DVec2::new(1.0, 0.0));
        assert_eq!(right.bounds.max, DVec2::new(2.0, 1.0));
    }

    #[test]
    fn create_children_is_idempotent() {
        let mut tree = tree();
        let root = tree.roots()[0];
        let first = tree.create_children(root).unwrap();
        let second = tree.create_children(root).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.len(), 6);
        assert!(tree.get(root).unwrap().is_split());
    }

    #[test]
    fn children_derive_from_parent() {
        let mut tree = tree();
        let root = tree.roots()[1];
        let children = tree.create_children(root).unwrap();
        let coords: Vec<(u32, u32)> = children
            .iter()
            .map(|c| {
                let n = tree.get(*c).unwrap();
                (n.x(), n.y())
            })
            .collect();
        assert_eq!(coords, vec![(2, 0), (3, 0), (3, 1), (2, 1)]);

        let top_left = tree.get(children[3]).unwrap();
        assert_eq!(top_left.bounds.min, DVec2::new(1.0, 0.5));
        assert_eq!(top_left.bounds.max, DVec2::new(1.5, 1.0));
    }

    #[test]
    fn destroy_children_releases_whole_subtree() {
        let mut tree = tree();
        let root = tree.roots()[0];
        let children = tree.create_children(root).unwrap();
        tree.create_children(children[2]).unwrap();
        assert_eq!(tree.len(), 10);

        assert_eq!(tree.destroy_children(root), 8);
        assert_eq!(tree.len(), 2);
        assert!(!tree.get(root).unwrap().is_split());
        assert!(tree.get(children[0]).is_none());
        assert_eq!(tree.destroy_children(root), 0);
    }

    #[test]
    fn split_is_all_or_nothing() {
        let mut tree = tree();
        let root = tree.roots()[0];
        assert_eq!(split_count(&tree, root), 0);
        tree.create_children(root);
        assert_eq!(split_count(&tree, root), 4);
        tree.destroy_children(root);
        assert_eq!(split_count(&tree, root), 0);
    }

    #[test]
    fn released_slots_are_reused() {
        let mut tree = tree();
        let root = tree.roots()[0];
        tree.create_children(root);
        tree.destroy_children(root);
        tree.create_children(tree.roots()[1]);
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.slots.len(), 6);
    }

    #[test]
    fn failed_split_rolls_back_partial_allocation() {
        let mut tree = tree();
        tree.slot_limit = 4;
        let root = tree.roots()[0];
        assert!(tree.create_children(root).is_none());
        assert_eq!(tree.len(), 2);
        assert!(!tree.get(root).unwrap().is_split());

        tree.slot_limit = 6;
        let children = tree.create_children(root).unwrap();
        assert_eq!(tree.len(), 6);
        assert!(children.iter().all(|c| tree.get(*c).is_some()));
    }
}
