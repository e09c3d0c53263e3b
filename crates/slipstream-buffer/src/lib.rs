//! Slipstream Buffer - Bounded per-entity snapshot history
//!
//! This crate provides the storage behind every networked entity:
//!
//! - **Bounded memory**: at most `capacity` snapshots, oldest dropped first
//! - **Strictly increasing timestamps**: late or duplicate samples are
//!   coerced to one millisecond after the newest stored sample
//! - **Fast lookup**: bracketing searches are binary searches
//!
//! # Example
//!
//! ```rust
//! use slipstream_core::{EntitySnapshot, SnapshotBracketing, SnapshotHistory, Vec2, Vec3};
//! use slipstream_buffer::SnapshotBuffer;
//!
//! let mut buffer = SnapshotBuffer::new(40);
//!
//! buffer.push(EntitySnapshot::new(1000, Vec3::ZERO, Some(0.0), Vec2::ZERO));
//! buffer.push(EntitySnapshot::new(1100, Vec3::new(5.0, 0.0, 0.0), Some(0.0), Vec2::ZERO));
//!
//! let (a, b) = buffer.bracket(1050).unwrap();
//! assert_eq!((a.timestamp, b.timestamp), (1000, 1100));
//! ```

use slipstream_core::{EntitySnapshot, SnapshotHistory, Timestamp};
use std::collections::VecDeque;

/// Default number of snapshots kept per entity
pub const DEFAULT_CAPACITY: usize = 40;

/// A bounded, time-ordered ring of snapshots for one entity
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    /// Snapshots, oldest first
    snapshots: VecDeque<EntitySnapshot>,
    /// Capacity (max snapshots)
    capacity: usize,
}

impl SnapshotBuffer {
    /// Create a new snapshot buffer with the given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Get all stored snapshots (oldest to newest)
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    /// Get the newest snapshot that was received rather than gap-filled
    pub fn latest_real(&self) -> Option<&EntitySnapshot> {
        self.snapshots.iter().rev().find(|s| !s.synthetic)
    }

    /// Get statistics about the buffer
    pub fn stats(&self) -> BufferStats {
        let (oldest, newest) = self.time_range().unwrap_or((0, 0));
        BufferStats {
            capacity: self.capacity,
            count: self.snapshots.len(),
            synthetic: self.snapshots.iter().filter(|s| s.synthetic).count(),
            oldest_timestamp: oldest,
            newest_timestamp: newest,
        }
    }

    fn trim(&mut self) {
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }
}

impl SnapshotHistory for SnapshotBuffer {
    fn push(&mut self, mut snapshot: EntitySnapshot) -> Timestamp {
        if let Some(last) = self.snapshots.back() {
            if snapshot.timestamp <= last.timestamp {
                snapshot.timestamp = last.timestamp + 1;
            }
        }
        let timestamp = snapshot.timestamp;
        self.snapshots.push_back(snapshot);
        self.trim();
        timestamp
    }

    fn earliest(&self) -> Option<&EntitySnapshot> {
        self.snapshots.front()
    }

    fn latest(&self) -> Option<&EntitySnapshot> {
        self.snapshots.back()
    }

    fn nearest_before(&self, time: Timestamp) -> Option<&EntitySnapshot> {
        let idx = self.snapshots.partition_point(|s| s.timestamp <= time);
        idx.checked_sub(1).and_then(|i| self.snapshots.get(i))
    }

    fn nearest_after(&self, time: Timestamp) -> Option<&EntitySnapshot> {
        let idx = self.snapshots.partition_point(|s| s.timestamp < time);
        self.snapshots.get(idx)
    }

    fn clear(&mut self) {
        self.snapshots.clear();
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.snapshots.len()
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Statistics about a snapshot buffer
#[derive(Debug, Clone, Copy)]
pub struct BufferStats {
    /// Maximum capacity
    pub capacity: usize,
    /// Current number of stored snapshots
    pub count: usize,
    /// How many of those were gap-filled
    pub synthetic: usize,
    /// Oldest timestamp in the buffer
    pub oldest_timestamp: Timestamp,
    /// Newest timestamp in the buffer
    pub newest_timestamp: Timestamp,
}

impl BufferStats {
    /// Get the covered time span (newest - oldest)
    pub fn span_ms(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.newest_timestamp - self.oldest_timestamp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipstream_core::{SnapshotBracketing, Vec2, Vec3};

    fn at(timestamp: Timestamp) -> EntitySnapshot {
        EntitySnapshot::new(
            timestamp,
            Vec3::new(timestamp as f64, 0.0, 0.0),
            None,
            Vec2::ZERO,
        )
    }

    #[test]
    fn test_new() {
        let buffer = SnapshotBuffer::new(40);
        assert_eq!(buffer.capacity(), 40);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_push_in_order() {
        let mut buffer = SnapshotBuffer::default();

        buffer.push(at(10));
        buffer.push(at(11));
        buffer.push(at(12));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.earliest().unwrap().timestamp, 10);
        assert_eq!(buffer.latest().unwrap().timestamp, 12);
    }

    #[test]
    fn test_duplicate_timestamp_coerced() {
        let mut buffer = SnapshotBuffer::default();

        assert_eq!(buffer.push(at(100)), 100);
        assert_eq!(buffer.push(at(100)), 101);
        assert_eq!(buffer.push(at(90)), 102);

        let stamps: Vec<_> = buffer.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![100, 101, 102]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut buffer = SnapshotBuffer::new(4);

        for t in 0..10 {
            buffer.push(at(t * 10));
        }

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.time_range(), Some((60, 90)));
    }

    #[test]
    fn test_never_exceeds_default_capacity() {
        let mut buffer = SnapshotBuffer::default();
        for t in 0..500 {
            buffer.push(at(t));
            assert!(buffer.len() <= DEFAULT_CAPACITY);
        }
        assert_eq!(buffer.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_nearest_before() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(at(10));
        buffer.push(at(20));
        buffer.push(at(30));

        assert_eq!(buffer.nearest_before(25).unwrap().timestamp, 20);
        assert_eq!(buffer.nearest_before(30).unwrap().timestamp, 30);
        assert_eq!(buffer.nearest_before(35).unwrap().timestamp, 30);
        assert!(buffer.nearest_before(5).is_none());
    }

    #[test]
    fn test_nearest_after() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(at(10));
        buffer.push(at(20));
        buffer.push(at(30));

        assert_eq!(buffer.nearest_after(15).unwrap().timestamp, 20);
        assert_eq!(buffer.nearest_after(10).unwrap().timestamp, 10);
        assert!(buffer.nearest_after(35).is_none());
    }

    #[test]
    fn test_bracket() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(at(10));
        buffer.push(at(20));

        let (a, b) = buffer.bracket(14).unwrap();
        assert_eq!((a.timestamp, b.timestamp), (10, 20));
    }

    #[test]
    fn test_latest_real_skips_synthetic() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(at(10));
        buffer.push(EntitySnapshot::synthetic(20, Vec3::ZERO, None, Vec2::ZERO));

        assert_eq!(buffer.latest().unwrap().timestamp, 20);
        assert_eq!(buffer.latest_real().unwrap().timestamp, 10);
    }

    #[test]
    fn test_stats() {
        let mut buffer = SnapshotBuffer::new(64);
        buffer.push(at(10));
        buffer.push(EntitySnapshot::synthetic(20, Vec3::ZERO, None, Vec2::ZERO));
        buffer.push(at(30));

        let stats = buffer.stats();
        assert_eq!(stats.capacity, 64);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.synthetic, 1);
        assert_eq!(stats.oldest_timestamp, 10);
        assert_eq!(stats.newest_timestamp, 30);
        assert_eq!(stats.span_ms(), 20);
    }

    #[test]
    fn test_clear() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(at(10));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.time_range().is_none());
    }
}
