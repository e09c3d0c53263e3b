//! Local prediction offset
//!
//! The locally controlled entity is drawn slightly ahead of its
//! authoritative pose so steering does not feel delayed by the round trip.
//! The offset is recomputed every frame from the current input and is never
//! written back into snapshot history, so it vanishes on its own once the
//! authoritative stream catches up; there is no rollback or replay step.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use slipstream_core::math::wrap_angle;
use slipstream_core::{LocalInput, Pose, Vec3};

/// Portion of latency attributed to the local entity's own round trip
pub const PREDICTION_HORIZON_MS: f64 = 100.0;
/// Ground speed at full throttle, in units per second
pub const PREDICTION_SPEED: f64 = 40.0;
/// Yaw rate at full steering lock, in radians per second
pub const PREDICTION_STEER_RATE: f64 = 1.2;

/// Tunables for `PredictionBlender`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub horizon_ms: f64,
    pub speed: f64,
    pub steer_rate: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            horizon_ms: PREDICTION_HORIZON_MS,
            speed: PREDICTION_SPEED,
            steer_rate: PREDICTION_STEER_RATE,
        }
    }
}

impl PredictionConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("prediction.horizon_ms", self.horizon_ms),
            ("prediction.speed", self.speed),
            ("prediction.steer_rate", self.steer_rate),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(Error::Config(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Overlays an input-driven offset on the local entity's resolved pose
#[derive(Debug, Clone)]
pub struct PredictionBlender {
    config: PredictionConfig,
}

impl PredictionBlender {
    /// Create a blender
    pub fn new(config: PredictionConfig) -> Self {
        Self { config }
    }

    /// Offset `(position delta, heading delta)` for the given input
    ///
    /// The heading turns by `steer * steer_rate * horizon` and the entity
    /// travels `throttle * speed * horizon` along the turned heading.
    /// Entities without a heading get no offset.
    pub fn offset(&self, heading: Option<f64>, input: &LocalInput) -> (Vec3, f64) {
        let Some(heading) = heading else {
            return (Vec3::ZERO, 0.0);
        };
        let horizon_s = self.config.horizon_ms / 1000.0;
        let turn = input.steer * self.config.steer_rate * horizon_s;
        let distance = input.throttle * self.config.speed * horizon_s;
        let facing = heading + turn;
        (
            Vec3::new(distance * facing.cos(), distance * facing.sin(), 0.0),
            turn,
        )
    }

    /// Apply the offset for `input` to an authoritative pose
    pub fn blend(&self, pose: Pose, input: &LocalInput) -> Pose {
        if input.is_idle() {
            return pose;
        }
        let (delta, turn) = self.offset(pose.heading, input);
        Pose {
            position: Vec3::new(
                pose.position.x + delta.x,
                pose.position.y + delta.y,
                pose.position.z + delta.z,
            ),
            heading: pose.heading.map(|h| wrap_angle(h + turn)),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }
}

impl Default for PredictionBlender {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_idle_input_is_identity() {
        let blender = PredictionBlender::default();
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Some(0.7));
        assert_eq!(blender.blend(pose, &LocalInput::IDLE), pose);

        // returned untouched, not re-wrapped
        let raw = Pose::new(Vec3::ZERO, Some(4.0));
        assert_eq!(blender.blend(raw, &LocalInput::IDLE).heading, Some(4.0));
    }

    #[test]
    fn test_full_throttle_moves_forward() {
        let blender = PredictionBlender::default();
        let pose = Pose::new(Vec3::ZERO, Some(0.0));
        let input = LocalInput::new(0.0, 1.0).unwrap();

        let blended = blender.blend(pose, &input);
        // 40 u/s for 100 ms along +x
        assert!((blended.position.x - 4.0).abs() < EPS);
        assert!(blended.position.y.abs() < EPS);
        assert_eq!(blended.heading, Some(0.0));
    }

    #[test]
    fn test_reverse_moves_backward() {
        let blender = PredictionBlender::default();
        let pose = Pose::new(Vec3::ZERO, Some(std::f64::consts::FRAC_PI_2));
        let input = LocalInput::new(0.0, -0.5).unwrap();

        let blended = blender.blend(pose, &input);
        assert!(blended.position.x.abs() < EPS);
        assert!((blended.position.y + 2.0).abs() < EPS);
    }

    #[test]
    fn test_steer_turns_heading() {
        let blender = PredictionBlender::default();
        let pose = Pose::new(Vec3::ZERO, Some(0.0));
        let input = LocalInput::new(1.0, 1.0).unwrap();

        let blended = blender.blend(pose, &input);
        let turn = 1.2 * 0.1;
        assert!((blended.heading.unwrap() - turn).abs() < EPS);
        assert!(blended.position.y > 0.0);
    }

    #[test]
    fn test_no_heading_no_offset() {
        let blender = PredictionBlender::default();
        let pose = Pose::new(Vec3::new(5.0, 5.0, 0.0), None);
        let input = LocalInput::new(1.0, 1.0).unwrap();
        assert_eq!(blender.blend(pose, &input), pose);
    }

    #[test]
    fn test_offset_is_not_accumulated() {
        let blender = PredictionBlender::default();
        let pose = Pose::new(Vec3::ZERO, Some(0.0));
        let input = LocalInput::new(0.0, 1.0).unwrap();

        let first = blender.blend(pose, &input);
        let second = blender.blend(pose, &input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_negative_horizon() {
        let config = PredictionConfig {
            horizon_ms: -1.0,
            ..PredictionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
