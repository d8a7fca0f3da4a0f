//! Board coordinate space
//!
//! Positions on the wire and in game state are *normalized*: x and y both span
//! [0, 1] even though the board is taller than it is wide. Distances and angles
//! are only meaningful in *physical* space, where the board width is one unit
//! and y is stretched by `1 / ASPECT_RATIO`. Only the y axis is transformed.

use serde::{Deserialize, Serialize};

use crate::game::constants::board::ASPECT_RATIO;
use crate::util::vec2::Vec2;

/// Normalized y to physical y
#[inline]
pub fn to_physical(y: f64) -> f64 {
    y / ASPECT_RATIO
}

/// Physical y to normalized y
#[inline]
pub fn to_normalized(y: f64) -> f64 {
    y * ASPECT_RATIO
}

/// Board-normalized position, origin top-left
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point reflection through the board centre, so player two sees their
    /// own side at the bottom
    #[inline]
    pub fn mirror(&self) -> Self {
        Self {
            x: 1.0 - self.x,
            y: 1.0 - self.y,
        }
    }

    #[inline]
    pub fn to_physical(&self) -> Vec2 {
        Vec2::new(self.x, to_physical(self.y))
    }

    #[inline]
    pub fn from_physical(v: Vec2) -> Self {
        Self {
            x: v.x,
            y: to_normalized(v.y),
        }
    }

    /// Move by a per-tick normalized displacement
    #[inline]
    pub fn offset(&self, velocity: Vec2) -> Self {
        Self {
            x: self.x + velocity.x,
            y: self.y + velocity.y,
        }
    }

    /// Normalized displacement from `from` to `self`
    #[inline]
    pub fn delta_from(&self, from: Position) -> Vec2 {
        Vec2::new(self.x - from.x, self.y - from.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Half-extents of a circle in normalized units.
///
/// The two components describe one physical size: `y = x * ASPECT_RATIO`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Radius {
    pub x: f64,
    pub y: f64,
}

impl Radius {
    pub const fn from_width(x: f64) -> Self {
        Self {
            x,
            y: x * ASPECT_RATIO,
        }
    }

    /// Radius in physical units (board width = 1)
    #[inline]
    pub fn physical(&self) -> f64 {
        self.x
    }
}

/// Normalized per-tick velocity to physical units
#[inline]
pub fn velocity_to_physical(v: Vec2) -> Vec2 {
    Vec2::new(v.x, to_physical(v.y))
}

/// Physical per-tick velocity to normalized units
#[inline]
pub fn velocity_to_normalized(v: Vec2) -> Vec2 {
    Vec2::new(v.x, to_normalized(v.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTA: f64 = 1e-12;

    #[test]
    fn test_mirror() {
        let mirrored = Position::new(0.3, 0.7).mirror();
        assert!((mirrored.x - 0.7).abs() < DELTA);
        assert!((mirrored.y - 0.3).abs() < DELTA);
    }

    #[test]
    fn test_mirror_is_self_inverse() {
        for &(x, y) in &[(0.2, 0.8), (0.0, 1.0), (0.123, 0.456), (-1.0, -1.0)] {
            let p = Position::new(x, y);
            let back = p.mirror().mirror();
            assert!((back.x - p.x).abs() < DELTA);
            assert!((back.y - p.y).abs() < DELTA);
        }
    }

    #[test]
    fn test_mirror_center_is_identity() {
        assert_eq!(Position::new(0.5, 0.5).mirror(), Position::new(0.5, 0.5));
    }

    #[test]
    fn test_physical_round_trip_only_touches_y() {
        let p = Position::new(0.25, 0.5);
        let phys = p.to_physical();
        assert_eq!(phys.x, 0.25);
        assert!((phys.y - 0.8).abs() < DELTA);
        let back = Position::from_physical(phys);
        assert!((back.y - 0.5).abs() < DELTA);
    }

    #[test]
    fn test_radius_components_are_linked() {
        let r = Radius::from_width(0.08);
        assert!((r.y - 0.08 * ASPECT_RATIO).abs() < DELTA);
        // The same size measured in physical units is equal on both axes
        assert!((to_physical(r.y) - r.x).abs() < DELTA);
    }

    #[test]
    fn test_velocity_conversion_round_trip() {
        let v = Vec2::new(0.01, -0.02);
        let back = velocity_to_normalized(velocity_to_physical(v));
        assert!(back.approx_eq(v, DELTA));
    }
}
