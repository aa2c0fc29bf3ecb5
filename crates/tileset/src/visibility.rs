//! Distance based visibility and error metric.
//!
//! A simple stand-in for frustum culling and screen-space error: tiles near
//! the eye's ground position are visible, and a visible tile needs more detail
//! while its extent is large relative to its distance from the eye.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::node::TileNode;
use crate::source::{TileVisibility, Visibility};

/// Eye position over the dataset plane. `z` is height above the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub position: DVec3,
    /// Ground distance beyond which tiles are not visible.
    pub view_radius: f64,
}

impl Viewpoint {
    pub fn new(position: DVec3, view_radius: f64) -> Self {
        Self {
            position,
            view_radius,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistanceVisibility {
    /// Largest acceptable ratio of tile extent to eye distance.
    pub max_error_ratio: f64,
    eye: Option<Viewpoint>,
}

impl DistanceVisibility {
    pub fn new(max_error_ratio: f64) -> Self {
        Self {
            max_error_ratio,
            eye: None,
        }
    }
}

impl Default for DistanceVisibility {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl TileVisibility for DistanceVisibility {
    type Viewpoint = Viewpoint;

    fn update(&mut self, viewpoint: &Viewpoint) {
        self.eye = Some(*viewpoint);
    }

    fn visibility(&self, tile: &TileNode) -> Visibility {
        let Some(eye) = self.eye else {
            return Visibility::default();
        };
        let ground = DVec2::new(eye.position.x, eye.position.y);
        let closest = tile.bounds.closest_point(ground);
        let ground_distance = ground.distance(closest);
        if ground_distance > eye.view_radius {
            return Visibility::default();
        }

        let distance = closest.extend(0.0).distance(eye.position).max(f64::EPSILON);
        let extent = tile.bounds.size().max_element();
        Visibility {
            is_visible: true,
            exceeds_error: extent / distance > self.max_error_ratio,
        }
    }
}
