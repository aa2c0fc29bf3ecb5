//! Tile set configuration and its validation against a data source.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tilestream_common::{MAX_LEVEL, MAX_ROOT_TILES};

use crate::error::TileSetError;
use crate::source::TileDataSource;

/// Coordinates are packed into this many bits per axis by `TileId`.
const COORD_BITS: u32 = 28;

/// User-facing tile set configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSetOptions {
    /// Shallowest level that may be resident. Shallower tiles are always refined.
    pub min_level: u8,
    /// Deepest level tiles are subdivided to.
    pub max_level: u8,
    /// Hard cap on resident tile data, preloaded data included.
    pub max_tile_data: u64,
    /// Soft cap on cached view (non-preloaded) requests. May be exceeded when
    /// a single update references more tiles than this.
    pub cache_size_hint: u64,
    /// Levels whose tiles are all requested up front and never evicted.
    pub preload_levels: Vec<u8>,
    /// Consumers may upsample a parent's data for tiles still loading.
    pub upsample_hint: bool,
    /// Request children of a tile that needs refining even when the tile is
    /// not visible. When off, only visible tiles prefetch their children.
    pub speculative_child_requests: bool,
}

impl Default for TileSetOptions {
    fn default() -> Self {
        Self {
            min_level: 0,
            max_level: 18,
            max_tile_data: u64::MAX / 2,
            cache_size_hint: 128,
            preload_levels: vec![0, 1],
            upsample_hint: false,
            speculative_child_requests: true,
        }
    }
}

/// Options after validation against a concrete data source.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions {
    pub min_level: u8,
    pub max_level: u8,
    /// Resident cap, never below `num_preload_data`.
    pub max_tile_data: u64,
    pub cache_size_hint: u64,
    /// Sorted, de-duplicated, all within `0..=max_level`.
    pub preload_levels: Vec<u8>,
    pub upsample_hint: bool,
    pub speculative_child_requests: bool,
    pub num_root_tiles_x: u32,
    pub num_root_tiles_y: u32,
    /// Tiles requested eagerly across all preload levels.
    pub num_preload_data: u64,
    /// What remains of the cap for view tiles.
    pub max_view_data: u64,
}

impl ValidatedOptions {
    pub fn num_root_tiles(&self) -> u64 {
        u64::from(self.num_root_tiles_x) * u64::from(self.num_root_tiles_y)
    }

    pub fn is_preload_level(&self, level: u8) -> bool {
        self.preload_levels.binary_search(&level).is_ok()
    }
}

impl TileSetOptions {
    /// Load options from a YAML or JSON file. The format follows the extension;
    /// anything other than `.json` is read as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TileSetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TileSetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(serde_yaml::from_str(&text)?)
        }
    }

    /// Check and normalize these options for `source`.
    ///
    /// Only a resident cap of `u64::MAX` or an unusable root grid are fatal.
    /// Everything else is adjusted: the level range is ordered and clamped to
    /// what the source serves, preload levels are sorted, and the resident cap
    /// is raised to fit every preloaded tile.
    pub fn validate<S: TileDataSource>(
        &self,
        source: &S,
    ) -> Result<ValidatedOptions, TileSetError> {
        // Keeps `count == cap` comparisons free of overflow.
        if self.max_tile_data == u64::MAX {
            return Err(TileSetError::MaxTileDataOverflow);
        }

        let (roots_x, roots_y) = (source.num_root_tiles_x(), source.num_root_tiles_y());
        let valid_axis = |n: u32| (1..=MAX_ROOT_TILES).contains(&n);
        if !valid_axis(roots_x) || !valid_axis(roots_y) {
            return Err(TileSetError::InvalidRootGrid {
                x: roots_x,
                y: roots_y,
                max: MAX_ROOT_TILES,
            });
        }

        let mut min_level = self.min_level;
        let mut max_level = self.max_level;
        if min_level > max_level {
            std::mem::swap(&mut min_level, &mut max_level);
        } else if min_level == max_level {
            max_level = max_level.saturating_add(1);
        }

        let source_min = source.min_level();
        let source_max = source
            .max_level()
            .max(source_min)
            .min(deepest_addressable_level(roots_x.max(roots_y)));
        let clamp = |level: u8| level.max(source_min).min(source_max);
        let min_level = clamp(min_level);
        let max_level = clamp(max_level);
        if (min_level, max_level) != (self.min_level, self.max_level) {
            tracing::debug!(
                requested_min = self.min_level,
                requested_max = self.max_level,
                min_level,
                max_level,
                "adjusted level range"
            );
        }

        let mut preload_levels = self.preload_levels.clone();
        preload_levels.sort_unstable();
        preload_levels.dedup();
        let dropped: Vec<u8> = preload_levels
            .iter()
            .copied()
            .filter(|l| *l > max_level)
            .collect();
        if !dropped.is_empty() {
            tracing::warn!(?dropped, max_level, "ignoring preload levels deeper than max_level");
            preload_levels.retain(|l| *l <= max_level);
        }

        let num_roots = u64::from(roots_x) * u64::from(roots_y);
        let num_preload_data = preload_levels
            .iter()
            .map(|l| 4u64.saturating_pow(u32::from(*l)).saturating_mul(num_roots))
            .fold(0u64, u64::saturating_add);

        let mut max_tile_data = self.max_tile_data;
        if num_preload_data > max_tile_data {
            tracing::warn!(
                max_tile_data,
                num_preload_data,
                "raising max_tile_data to fit preloaded tiles"
            );
            max_tile_data = num_preload_data;
        }
        // Still below u64::MAX: the sum saturates there only for absurd grids.
        let max_tile_data = max_tile_data.min(u64::MAX - 1);

        if max_tile_data < num_roots {
            tracing::warn!(
                max_tile_data,
                num_roots,
                "max_tile_data is smaller than the root grid; only the first roots will be traversed"
            );
        }

        Ok(ValidatedOptions {
            min_level,
            max_level,
            max_tile_data,
            cache_size_hint: self.cache_size_hint,
            preload_levels,
            upsample_hint: self.upsample_hint,
            speculative_child_requests: self.speculative_child_requests,
            num_root_tiles_x: roots_x,
            num_root_tiles_y: roots_y,
            num_preload_data,
            max_view_data: max_tile_data - num_preload_data.min(max_tile_data),
        })
    }
}

/// Deepest level whose coordinates still fit a `TileId` for a root grid
/// `roots` tiles wide.
fn deepest_addressable_level(roots: u32) -> u8 {
    let root_bits = u32::BITS - (roots.max(1) - 1).leading_zeros();
    let level = COORD_BITS.saturating_sub(root_bits).min(u32::from(MAX_LEVEL));
    level as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestHandle;
    use glam::DVec2;
    use std::io::Write;
    use tilestream_common::{Bounds, TileId};

    struct Limits {
        min: u8,
        max: u8,
        x: u32,
        y: u32,
    }

    impl TileDataSource for Limits {
        type Data = ();

        fn bounds(&self) -> Bounds {
            Bounds::new(DVec2::ZERO, DVec2::ONE)
        }
        fn min_level(&self) -> u8 {
            self.min
        }
        fn max_level(&self) -> u8 {
            self.max
        }
        fn num_root_tiles_x(&self) -> u32 {
            self.x
        }
        fn num_root_tiles_y(&self) -> u32 {
            self.y
        }
        fn request_data(&self, _id: TileId) -> RequestHandle<()> {
            RequestHandle::ready(())
        }
    }

    fn source() -> Limits {
        Limits { min: 0, max: 18, x: 2, y: 1 }
    }

    #[test]
    fn defaults_validate_unchanged() {
        let v = TileSetOptions::default().validate(&source()).unwrap();
        assert_eq!((v.min_level, v.max_level), (0, 18));
        assert_eq!(v.preload_levels, vec![0, 1]);
        assert_eq!(v.num_preload_data, 2 + 8);
        assert_eq!(v.max_view_data, v.max_tile_data - 10);
    }

    #[test]
    fn rejects_unsafe_cap() {
        let opts = TileSetOptions {
            max_tile_data: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(
            opts.validate(&source()),
            Err(TileSetError::MaxTileDataOverflow)
        ));
    }

    #[test]
    fn rejects_empty_root_grid() {
        let src = Limits { x: 0, ..source() };
        assert!(matches!(
            TileSetOptions::default().validate(&src),
            Err(TileSetError::InvalidRootGrid { .. })
        ));
    }

    #[test]
    fn swaps_and_bumps_level_range() {
        let swapped = TileSetOptions {
            min_level: 9,
            max_level: 3,
            ..Default::default()
        };
        let v = swapped.validate(&source()).unwrap();
        assert_eq!((v.min_level, v.max_level), (3, 9));

        let equal = TileSetOptions {
            min_level: 4,
            max_level: 4,
            ..Default::default()
        };
        let v = equal.validate(&source()).unwrap();
        assert_eq!((v.min_level, v.max_level), (4, 5));
    }

    #[test]
    fn clamps_to_source_levels() {
        let src = Limits { min: 2, max: 6, ..source() };
        let opts = TileSetOptions {
            min_level: 0,
            max_level: 12,
            preload_levels: vec![],
            ..Default::default()
        };
        let v = opts.validate(&src).unwrap();
        assert_eq!((v.min_level, v.max_level), (2, 6));
    }

    #[test]
    fn raises_cap_to_fit_preload() {
        let opts = TileSetOptions {
            max_tile_data: 3,
            preload_levels: vec![2, 0],
            ..Default::default()
        };
        let v = opts.validate(&source()).unwrap();
        assert_eq!(v.preload_levels, vec![0, 2]);
        // 2 roots at level 0, 2 * 16 tiles at level 2
        assert_eq!(v.num_preload_data, 34);
        assert_eq!(v.max_tile_data, 34);
        assert_eq!(v.max_view_data, 0);

        let sum: u64 = v.preload_levels.iter().map(|l| 4u64.pow(u32::from(*l))).sum();
        assert!(v.max_tile_data >= sum);
    }

    #[test]
    fn drops_preload_levels_past_max() {
        let opts = TileSetOptions {
            max_level: 2,
            preload_levels: vec![1, 1, 5],
            ..Default::default()
        };
        let v = opts.validate(&source()).unwrap();
        assert_eq!(v.preload_levels, vec![1]);
        assert!(v.is_preload_level(1));
        assert!(!v.is_preload_level(0));
    }

    #[test]
    fn deepest_level_depends_on_root_grid() {
        assert_eq!(deepest_addressable_level(1), MAX_LEVEL);
        assert_eq!(deepest_addressable_level(2), MAX_LEVEL);
        assert_eq!(deepest_addressable_level(255), 20);
    }

    #[test]
    fn loads_yaml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "max_level: 7\ncache_size_hint: 32").unwrap();
        let opts = TileSetOptions::load(file.path()).unwrap();
        assert_eq!(opts.max_level, 7);
        assert_eq!(opts.cache_size_hint, 32);
        assert_eq!(opts.preload_levels, vec![0, 1]);
    }

    #[test]
    fn loads_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"preload_levels": [0], "upsample_hint": true}}"#).unwrap();
        let opts = TileSetOptions::load(file.path()).unwrap();
        assert_eq!(opts.preload_levels, vec![0]);
        assert!(opts.upsample_hint);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TileSetOptions::load("/nonexistent/tileset.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tileset.yaml"));
    }
}
