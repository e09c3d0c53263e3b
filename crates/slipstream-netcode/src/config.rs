//! Engine configuration
//!
//! Every tunable lives in the config struct of the component that uses it
//! (`RecorderConfig`, `RttConfig`, `PredictionConfig`, `PollConfig`).
//! `EngineConfig` gathers them together with the session identity and can
//! be loaded from RON.
//!
//! ```ron
//! (
//!     local_player: Some("p1"),
//!     session_token: "match-42",
//!     recorder: (device_class: Constrained),
//!     poll: (min_interval_ms: 200),
//! )
//! ```

use crate::{
    Error, PollConfig, PredictionConfig, RecorderConfig, Result, RttConfig,
};
use serde::{Deserialize, Serialize};
use slipstream_core::{EntityId, Vec3};
use std::fs;
use std::path::Path;

/// Device class used to pick gap-filling density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Desktop-class client
    #[default]
    Standard,
    /// Mobile-class or otherwise constrained client
    Constrained,
}

impl DeviceClass {
    /// Spacing between gap-filling samples in milliseconds
    pub fn fill_spacing_ms(&self) -> u64 {
        match self {
            DeviceClass::Standard => 60,
            DeviceClass::Constrained => 40,
        }
    }

    /// Maximum synthetic samples inserted into one gap
    pub fn max_fill(&self) -> usize {
        match self {
            DeviceClass::Standard => 8,
            DeviceClass::Constrained => 12,
        }
    }
}

/// Root configuration for a `SyncEngine`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entity controlled by this client, if any
    pub local_player: Option<EntityId>,
    /// Opaque match/session token sent with every poll
    pub session_token: String,
    /// Position reported before the server knows the local entity
    pub spawn_position: Vec3,
    /// Heading reported before the server knows the local entity
    pub spawn_angle: Option<f64>,
    /// Snapshot recording and gap filling
    pub recorder: RecorderConfig,
    /// Round-trip estimation and interpolation delay
    pub rtt: RttConfig,
    /// Local prediction offset
    pub prediction: PredictionConfig,
    /// Poll cadence and backoff
    pub poll: PollConfig,
}

impl EngineConfig {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_ron(&content)
    }

    /// Parse and validate configuration from a RON string
    pub fn from_ron(content: &str) -> Result<Self> {
        let config: EngineConfig =
            ron::from_str(content).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every component's settings
    pub fn validate(&self) -> Result<()> {
        if !self.spawn_position.is_finite() {
            return Err(Error::Config("spawn_position must be finite".to_string()));
        }
        if self.spawn_angle.is_some_and(|a| !a.is_finite()) {
            return Err(Error::Config("spawn_angle must be finite".to_string()));
        }
        self.recorder.validate()?;
        self.rtt.validate()?;
        self.prediction.validate()?;
        self.poll.validate()?;
        Ok(())
    }

    /// Configure the locally controlled entity
    pub fn with_local_player(mut self, id: impl Into<EntityId>) -> Self {
        self.local_player = Some(id.into());
        self
    }

    /// Configure the session token
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = token.into();
        self
    }
}

/// Check that a smoothing factor lies in `(0, 1]`
pub(crate) fn check_alpha(name: &str, alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be in (0, 1], got {}", name, alpha)))
    }
}
