//! Snapshot history trait for per-entity authoritative observations
//!
//! This trait is used by:
//! - `slipstream-buffer` for the bounded per-entity ring
//! - `slipstream-netcode` for recording and render-time lookups
//!
//! # Example
//!
//! ```rust,ignore
//! use slipstream_core::{EntitySnapshot, SnapshotHistory};
//!
//! struct MyHistory {
//!     snapshots: Vec<EntitySnapshot>,
//! }
//!
//! impl SnapshotHistory for MyHistory {
//!     fn push(&mut self, mut snapshot: EntitySnapshot) -> u64 {
//!         if let Some(last) = self.snapshots.last() {
//!             snapshot.timestamp = snapshot.timestamp.max(last.timestamp + 1);
//!         }
//!         let ts = snapshot.timestamp;
//!         self.snapshots.push(snapshot);
//!         ts
//!     }
//!
//!     // ... other methods
//! }
//! ```

use crate::{EntitySnapshot, Timestamp};

/// Trait for storing and retrieving an entity's recorded snapshots.
///
/// Implementations must keep timestamps strictly increasing: a pushed
/// snapshot whose timestamp is not newer than the latest stored one is
/// coerced to `latest + 1`.
pub trait SnapshotHistory {
    /// Append a snapshot, coercing its timestamp if needed.
    ///
    /// Returns the timestamp the snapshot was stored under.
    fn push(&mut self, snapshot: EntitySnapshot) -> Timestamp;

    /// Get the oldest stored snapshot.
    fn earliest(&self) -> Option<&EntitySnapshot>;

    /// Get the newest stored snapshot.
    fn latest(&self) -> Option<&EntitySnapshot>;

    /// Get the newest snapshot at or before the given time.
    fn nearest_before(&self, time: Timestamp) -> Option<&EntitySnapshot>;

    /// Get the oldest snapshot at or after the given time.
    fn nearest_after(&self, time: Timestamp) -> Option<&EntitySnapshot>;

    /// Clear all stored snapshots.
    fn clear(&mut self);

    /// Maximum number of snapshots retained.
    fn capacity(&self) -> usize;

    /// Get the number of snapshots currently stored.
    fn len(&self) -> usize;

    /// Check if the history is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the time range of stored snapshots.
    ///
    /// Returns `None` if no snapshots are stored.
    fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.earliest()?.timestamp, self.latest()?.timestamp))
    }
}

/// Extension trait for finding the pair of snapshots around a render time
pub trait SnapshotBracketing: SnapshotHistory {
    /// Get the snapshots `(a, b)` with `a.timestamp <= time <= b.timestamp`.
    ///
    /// Returns `None` if `time` lies outside the stored range. When `time`
    /// hits a stored timestamp exactly, `a` and `b` may be the same entry.
    fn bracket(&self, time: Timestamp) -> Option<(&EntitySnapshot, &EntitySnapshot)> {
        let before = self.nearest_before(time)?;
        let after = self.nearest_after(time)?;
        Some((before, after))
    }

    /// Calculate the interpolation factor between two timestamps.
    ///
    /// Returns a value in [0.0, 1.0]; equal timestamps give 0.0.
    fn interpolation_factor(before: Timestamp, after: Timestamp, time: Timestamp) -> f64 {
        if before >= after {
            return 0.0;
        }
        let range = (after - before) as f64;
        let offset = time.saturating_sub(before) as f64;
        (offset / range).clamp(0.0, 1.0)
    }
}

// Blanket implementation: any SnapshotHistory can bracket
impl<T: SnapshotHistory> SnapshotBracketing for T {}
