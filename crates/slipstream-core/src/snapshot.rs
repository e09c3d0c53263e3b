//! Snapshot and pose types
//!
//! - `Vec3` / `Vec2` - World-space position and ground-plane velocity
//! - `EntitySnapshot` - One timestamped authoritative observation
//! - `Pose` - What the rendering layer draws for one frame

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// World-space position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// The origin
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new position
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Linear interpolation towards `other` by factor `s`
    pub fn lerp(&self, other: &Vec3, s: f64) -> Vec3 {
        Vec3 {
            x: self.x + (other.x - self.x) * s,
            y: self.y + (other.y - self.y) * s,
            z: self.z + (other.z - self.z) * s,
        }
    }

    /// Check that every component is finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// Linear velocity on the ground plane (units per second along x and y)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Zero velocity
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    /// Create a new velocity
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale both components
    pub fn scale(&self, k: f64) -> Vec2 {
        Vec2 {
            x: self.x * k,
            y: self.y * k,
        }
    }

    /// Length of the vector
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl From<(f64, f64)> for Vec2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// One authoritative observation of a moving entity
///
/// Within one entity's history, `timestamp` is strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Monotonic milliseconds
    pub timestamp: Timestamp,
    /// World-space coordinates
    pub position: Vec3,
    /// Yaw in radians, if the entity has orientation
    pub heading: Option<f64>,
    /// Ground-plane velocity (derived or server-reported)
    pub velocity: Vec2,
    /// True if generated by gap filling rather than received
    pub synthetic: bool,
}

impl EntitySnapshot {
    /// Create a received (non-synthetic) snapshot
    pub fn new(timestamp: Timestamp, position: Vec3, heading: Option<f64>, velocity: Vec2) -> Self {
        Self {
            timestamp,
            position,
            heading,
            velocity,
            synthetic: false,
        }
    }

    /// Create a gap-filling snapshot
    pub fn synthetic(
        timestamp: Timestamp,
        position: Vec3,
        heading: Option<f64>,
        velocity: Vec2,
    ) -> Self {
        Self {
            timestamp,
            position,
            heading,
            velocity,
            synthetic: true,
        }
    }

    /// The pose this snapshot describes
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            heading: self.heading,
        }
    }
}

/// Interpolated pose for one rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub heading: Option<f64>,
}

impl Pose {
    /// Create a new pose
    pub fn new(position: Vec3, heading: Option<f64>) -> Self {
        Self { position, heading }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_lerp() {
        let a = Vec3::new(0.0, 10.0, -4.0);
        let b = Vec3::new(10.0, 20.0, 4.0);

        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Vec3::new(5.0, 15.0, 0.0));
    }

    #[test]
    fn test_vec3_finite() {
        assert!(Vec3::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Vec3::new(f64::NAN, 2.0, 3.0).is_finite());
        assert!(!Vec3::new(1.0, f64::INFINITY, 3.0).is_finite());
    }

    #[test]
    fn test_snapshot_constructors() {
        let real = EntitySnapshot::new(10, Vec3::ZERO, Some(1.0), Vec2::ZERO);
        assert!(!real.synthetic);

        let filler = EntitySnapshot::synthetic(20, Vec3::ZERO, None, Vec2::new(3.0, 4.0));
        assert!(filler.synthetic);
        assert_eq!(filler.velocity.length(), 5.0);
        assert_eq!(filler.pose(), Pose::new(Vec3::ZERO, None));
    }
}
