//! Slipstream Core - Data model for client-side state synchronization
//!
//! This crate provides the shared types used across the slipstream engine:
//! - Entity identifiers (`EntityId`)
//! - Authoritative observations (`EntitySnapshot`) and render output (`Pose`)
//! - Local control input (`LocalInput`)
//! - Millisecond time source (`Clock`, `Timestamp`)
//! - Per-entity snapshot history (`SnapshotHistory`, `SnapshotBracketing`)
//! - Angle and Hermite interpolation helpers (`math`)
//!
//! Storage lives in `slipstream-buffer`; recording, resolving and polling
//! live in `slipstream-netcode`.

mod error;
mod history;
mod identity;
mod input;
pub mod math;
mod snapshot;
mod time;

pub use error::{Error, Result};
pub use history::{SnapshotBracketing, SnapshotHistory};
pub use identity::EntityId;
pub use input::LocalInput;
pub use snapshot::{EntitySnapshot, Pose, Vec2, Vec3};
pub use time::{Clock, SystemClock, Timestamp};
