//! Slipstream Netcode - Client-side state synchronization
//!
//! This crate keeps a smooth, low-latency view of a server-authoritative world
//! that is only observable through periodic polling:
//!
//! - **Recording**: Smooth, deduplicate and gap-fill incoming entity samples
//! - **RTT estimation**: Derive an adaptive interpolation delay from timing echoes
//! - **Resolution**: Interpolate (or briefly extrapolate) a pose at render time
//! - **Prediction**: Nudge the local entity along the current input
//! - **Polling**: Drive the request/response cycle with cadence and backoff
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SyncEngine                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐  │
//! │  │  PollLoop    │─▶│   Recorder   │─▶│  RenderResolver   │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────┘  │
//! │         │                                      │             │
//! │         ▼                                      ▼             │
//! │  ┌──────────────┐                    ┌───────────────────┐  │
//! │  │ RttEstimator │───── delay ───────▶│ PredictionBlender │  │
//! │  └──────────────┘                    └───────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use slipstream_netcode::{EngineConfig, PollLoop, SyncEngine, TokioClock};
//!
//! let engine = SyncEngine::new(EngineConfig::load("engine.ron")?)?.into_shared();
//! let poll = PollLoop::new(engine.clone(), transport, TokioClock::new());
//! let handle = poll.handle();
//! tokio::spawn(poll.run());
//!
//! // Render loop
//! loop {
//!     engine.write().feed_input(steer, throttle)?;
//!     for id in engine.read().entity_ids() {
//!         if let Some(pose) = engine.read().resolve_pose(id, clock.now_ms()) {
//!             draw(id, pose);
//!         }
//!     }
//! }
//! ```

mod config;
mod engine;
mod error;
mod events;
mod poll;
mod prediction;
mod recorder;
mod resolver;
mod rtt;
mod transport;

pub use config::{DeviceClass, EngineConfig};
pub use engine::{IngestReport, SharedEngine, SyncEngine};
pub use error::{Error, Result};
pub use events::{EventBus, NetEvent, EVENT_CAPACITY};
pub use poll::{
    PollConfig, PollHandle, PollLoop, PollOutcome, PollState, TokioClock, BACKOFF_BASE_MS,
    BACKOFF_MAX_MS, DEFAULT_SERVER_FPS, MIN_POLL_INTERVAL_MS,
};
pub use prediction::{
    PredictionBlender, PredictionConfig, PREDICTION_HORIZON_MS, PREDICTION_SPEED,
    PREDICTION_STEER_RATE,
};
pub use recorder::{
    gap_fillers, RawSample, RecordOutcome, RecordReport, RecorderConfig, RecorderStats,
    SnapshotRecorder, GAP_THRESHOLD, MAX_DERIVED_SPEED, POSITION_ALPHA, TANGENT_SCALE,
    VELOCITY_ALPHA,
};
pub use resolver::{RenderResolver, Resolution, ResolveMode};
pub use rtt::{RttConfig, RttEstimate, RttEstimator, DELAY_CUSHION_MS, MAX_DELAY_MS, MIN_DELAY_MS, RTT_ALPHA};
pub use transport::{EntityRecord, PollRequest, PollResponse, PollTransport, TimingEcho};

// Re-export core types for convenience
pub use slipstream_buffer::SnapshotBuffer;
pub use slipstream_core::{
    Clock, EntityId, EntitySnapshot, LocalInput, Pose, SnapshotBracketing, SnapshotHistory,
    SystemClock, Timestamp, Vec2, Vec3,
};
