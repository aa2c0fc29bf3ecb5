use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest subdivision level a [`TileId`] can address.
pub const MAX_LEVEL: u8 = 24;

/// Largest number of root tiles along either axis of a dataset.
pub const MAX_ROOT_TILES: u32 = 255;

const COORD_BITS: u32 = 28;
const COORD_MASK: u64 = (1 << COORD_BITS) - 1;
const LEVEL_SHIFT: u32 = 2 * COORD_BITS;

/// Errors from constructing tile identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileIdError {
    #[error("level {level} exceeds the deepest addressable level {}", MAX_LEVEL)]
    LevelOutOfRange { level: u8 },
    #[error("coordinate ({x}, {y}) does not fit in {} bits", COORD_BITS)]
    CoordOutOfRange { x: u32, y: u32 },
}

/// Unique identifier of a tile within one root-tile grid.
///
/// Packs `(level, x, y)` into a single `u64` so ids sort level-major, then by
/// row, then by column. Sorted resident lists rely on this ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(u64);

impl TileId {
    /// Build an id from its level and grid coordinates.
    pub fn new(level: u8, x: u32, y: u32) -> Result<Self, TileIdError> {
        if level > MAX_LEVEL {
            return Err(TileIdError::LevelOutOfRange { level });
        }
        if u64::from(x) > COORD_MASK || u64::from(y) > COORD_MASK {
            return Err(TileIdError::CoordOutOfRange { x, y });
        }
        Ok(Self::pack(level, x, y))
    }

    fn pack(level: u8, x: u32, y: u32) -> Self {
        Self((u64::from(level) << LEVEL_SHIFT) | (u64::from(y) << COORD_BITS) | u64::from(x))
    }

    pub fn level(self) -> u8 {
        (self.0 >> LEVEL_SHIFT) as u8
    }

    pub fn x(self) -> u32 {
        (self.0 & COORD_MASK) as u32
    }

    pub fn y(self) -> u32 {
        ((self.0 >> COORD_BITS) & COORD_MASK) as u32
    }

    /// Raw packed value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The tile this one was split from, or `None` for a root tile.
    pub fn parent(self) -> Option<TileId> {
        match self.level() {
            0 => None,
            level => Some(Self::pack(level - 1, self.x() / 2, self.y() / 2)),
        }
    }

    /// Ids of the four children in [`Quadrant::ALL`] order.
    pub fn children(self) -> Result<[TileId; 4], TileIdError> {
        let level = self.level() + 1;
        let (x, y) = (self.x() * 2, self.y() * 2);
        // The largest child coordinate decides whether the whole split fits.
        TileId::new(level, x + 1, y + 1)?;
        Ok(Quadrant::ALL.map(|q| {
            let (dx, dy) = q.offset();
            Self::pack(level, x + dx, y + dy)
        }))
    }
}

impl fmt::Debug for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileId({}/{}/{})", self.level(), self.x(), self.y())
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level(), self.x(), self.y())
    }
}

/// One cell of a 4-way split. `y` grows towards the top of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    BottomLeft,
    BottomRight,
    TopRight,
    TopLeft,
}

impl Quadrant {
    /// Fixed generation order for children.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
        Quadrant::TopRight,
        Quadrant::TopLeft,
    ];

    /// Offset of this quadrant from the doubled parent coordinates.
    pub fn offset(self) -> (u32, u32) {
        match self {
            Quadrant::BottomLeft => (0, 0),
            Quadrant::BottomRight => (1, 0),
            Quadrant::TopRight => (1, 1),
            Quadrant::TopLeft => (0, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_components() {
        let id = TileId::new(7, 100, 37).unwrap();
        assert_eq!(id.level(), 7);
        assert_eq!(id.x(), 100);
        assert_eq!(id.y(), 37);
        assert_eq!(id.to_string(), "7/100/37");
    }

    #[test]
    fn ids_order_by_level_then_row_then_column() {
        let a = TileId::new(0, 1, 0).unwrap();
        let b = TileId::new(0, 0, 1).unwrap();
        let c = TileId::new(1, 0, 0).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert_eq!(
            TileId::new(MAX_LEVEL + 1, 0, 0),
            Err(TileIdError::LevelOutOfRange { level: MAX_LEVEL + 1 })
        );
        assert!(matches!(
            TileId::new(3, 1 << 28, 0),
            Err(TileIdError::CoordOutOfRange { .. })
        ));
    }

    #[test]
    fn children_follow_quadrant_order() {
        let id = TileId::new(2, 3, 1).unwrap();
        let children = id.children().unwrap();
        let coords: Vec<(u32, u32)> = children.iter().map(|c| (c.x(), c.y())).collect();
        assert_eq!(coords, vec![(6, 2), (7, 2), (7, 3), (6, 3)]);
        for child in children {
            assert_eq!(child.level(), 3);
            assert_eq!(child.parent(), Some(id));
        }
    }

    #[test]
    fn root_has_no_parent() {
        assert_eq!(TileId::new(0, 4, 0).unwrap().parent(), None);
    }

    #[test]
    fn deepest_level_cannot_split() {
        let id = TileId::new(MAX_LEVEL, 0, 0).unwrap();
        assert!(id.children().is_err());
    }

    #[test]
    fn serializes_as_plain_integer() {
        let id = TileId::new(1, 1, 0).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, id.as_u64().to_string());
    }
}
