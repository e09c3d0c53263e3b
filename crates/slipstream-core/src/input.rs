//! Local control input

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Most recent control input for the locally controlled entity
///
/// Both axes are kept within `[-1, 1]`. No history is kept; each sample
/// overwrites the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalInput {
    /// Steering, negative is left
    pub steer: f64,
    /// Throttle, negative is reverse
    pub throttle: f64,
}

impl LocalInput {
    /// No steering, no throttle
    pub const IDLE: LocalInput = LocalInput {
        steer: 0.0,
        throttle: 0.0,
    };

    /// Create an input sample, clamping both axes to `[-1, 1]`
    ///
    /// Returns `Err` if either axis is not finite.
    pub fn new(steer: f64, throttle: f64) -> Result<Self> {
        if !steer.is_finite() {
            return Err(Error::InvalidInput(format!("steer is {}", steer)));
        }
        if !throttle.is_finite() {
            return Err(Error::InvalidInput(format!("throttle is {}", throttle)));
        }
        Ok(Self {
            steer: steer.clamp(-1.0, 1.0),
            throttle: throttle.clamp(-1.0, 1.0),
        })
    }

    /// Check if neither axis is engaged
    pub fn is_idle(&self) -> bool {
        self.steer == 0.0 && self.throttle == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_clamped() {
        let input = LocalInput::new(2.5, -7.0).unwrap();
        assert_eq!(input.steer, 1.0);
        assert_eq!(input.throttle, -1.0);
    }

    #[test]
    fn test_input_rejects_non_finite() {
        assert!(LocalInput::new(f64::NAN, 0.0).is_err());
        assert!(LocalInput::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_idle() {
        assert!(LocalInput::IDLE.is_idle());
        assert!(!LocalInput::new(0.1, 0.0).unwrap().is_idle());
    }
}
