use glam::{DVec2, DVec4};
use serde::{Deserialize, Serialize};

use crate::types::Quadrant;

/// Axis-aligned rectangle over the dataset plane.
///
/// For geographic datasets `x` is longitude and `y` is latitude, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Whole-earth bounds in degrees of longitude and latitude.
    pub fn world_geographic() -> Self {
        Self::new(DVec2::new(-180.0, -90.0), DVec2::new(180.0, 90.0))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: DVec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Closest point of the rectangle to `point`.
    pub fn closest_point(&self, point: DVec2) -> DVec2 {
        point.clamp(self.min, self.max)
    }

    /// Cell `(x, y)` of an even `nx` by `ny` subdivision of these bounds.
    pub fn grid_cell(&self, nx: u32, ny: u32, x: u32, y: u32) -> Bounds {
        let step = self.size() / DVec2::new(f64::from(nx), f64::from(ny));
        let min = self.min + step * DVec2::new(f64::from(x), f64::from(y));
        // Snap the last row and column to the outer edge so no sliver is lost.
        let max = DVec2::new(
            if x + 1 == nx { self.max.x } else { min.x + step.x },
            if y + 1 == ny { self.max.y } else { min.y + step.y },
        );
        Bounds::new(min, max)
    }

    /// Bounds of one quadrant of a 4-way split.
    pub fn quadrant(&self, quadrant: Quadrant) -> Bounds {
        let (dx, dy) = quadrant.offset();
        self.grid_cell(2, 2, dx, dy)
    }

    /// Texture window of `to` inside `from` as `(s_start, t_start, s_delta, t_delta)`.
    ///
    /// Used to sample a coarser tile's data for a finer tile covering part of it.
    pub fn sample_region(from: &Bounds, to: &Bounds) -> DVec4 {
        let size = from.size();
        let start = (to.min - from.min) / size;
        let delta = to.size() / size;
        DVec4::new(start.x, start.y, delta.x, delta.y)
    }
}
