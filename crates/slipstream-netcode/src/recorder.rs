//! Snapshot recording
//!
//! Turns raw authoritative entity states into per-entity snapshot
//! histories. Each incoming sample is:
//!
//! 1. deduplicated against other records for the same entity in the batch
//! 2. given a strictly increasing timestamp
//! 3. low-pass filtered against the previous position
//! 4. given a velocity (server-reported, or derived, clamped and smoothed)
//! 5. preceded by Hermite-interpolated filler samples if the gap since the
//!    previous sample is large
//! 6. appended to the entity's bounded buffer
//!
//! The recorder is the only writer of snapshot buffers.

use crate::config::{check_alpha, DeviceClass};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use slipstream_buffer::{SnapshotBuffer, DEFAULT_CAPACITY};
use slipstream_core::math::{clamp_finite, hermite, lerp_heading};
use slipstream_core::{EntityId, EntitySnapshot, SnapshotHistory, Timestamp, Vec2, Vec3};

/// Weight of the new raw position in positional smoothing
pub const POSITION_ALPHA: f64 = 0.28;
/// Weight of the new raw velocity in velocity smoothing
pub const VELOCITY_ALPHA: f64 = 0.45;
/// Per-axis limit on derived velocity, in units per second
pub const MAX_DERIVED_SPEED: f64 = 200.0;
/// A gap is filled once it exceeds this many fill spacings
pub const GAP_THRESHOLD: f64 = 1.25;
/// Scale applied to `velocity * gap_seconds` to form Hermite tangents
pub const TANGENT_SCALE: f64 = 0.6;

/// Tunables for `SnapshotRecorder`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Picks default fill spacing and max fill
    pub device_class: DeviceClass,
    /// Overrides the device class fill spacing
    pub fill_spacing_ms: Option<u64>,
    /// Overrides the device class max fill
    pub max_fill: Option<usize>,
    /// Snapshots kept per entity
    pub capacity: usize,
    pub position_alpha: f64,
    pub velocity_alpha: f64,
    pub max_speed: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            device_class: DeviceClass::Standard,
            fill_spacing_ms: None,
            max_fill: None,
            capacity: DEFAULT_CAPACITY,
            position_alpha: POSITION_ALPHA,
            velocity_alpha: VELOCITY_ALPHA,
            max_speed: MAX_DERIVED_SPEED,
        }
    }
}

impl RecorderConfig {
    /// Config for a given device class with every other value at default
    pub fn for_device(device_class: DeviceClass) -> Self {
        Self {
            device_class,
            ..Self::default()
        }
    }

    /// Effective spacing between filler samples
    pub fn fill_spacing_ms(&self) -> u64 {
        self.fill_spacing_ms
            .unwrap_or_else(|| self.device_class.fill_spacing_ms())
    }

    /// Effective cap on filler samples per gap
    pub fn max_fill(&self) -> usize {
        self.max_fill.unwrap_or_else(|| self.device_class.max_fill())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.fill_spacing_ms() == 0 {
            return Err(Error::Config("recorder.fill_spacing_ms must be positive".to_string()));
        }
        if self.capacity == 0 {
            return Err(Error::Config("recorder.capacity must be positive".to_string()));
        }
        check_alpha("recorder.position_alpha", self.position_alpha)?;
        check_alpha("recorder.velocity_alpha", self.velocity_alpha)?;
        if !(self.max_speed > 0.0 && self.max_speed.is_finite()) {
            return Err(Error::Config("recorder.max_speed must be positive".to_string()));
        }
        Ok(())
    }
}

/// One validated entity state as received from the server
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub id: EntityId,
    pub position: Vec3,
    pub heading: Option<f64>,
    /// Server-reported velocity, if any
    pub velocity: Option<Vec2>,
}

impl RawSample {
    /// Create a sample without server velocity
    pub fn new(id: impl Into<EntityId>, position: Vec3, heading: Option<f64>) -> Self {
        Self {
            id: id.into(),
            position,
            heading,
            velocity: None,
        }
    }

    /// Attach a server-reported velocity
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

/// What happened to one recorded sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Timestamp the real sample was stored under
    pub stored_at: Timestamp,
    /// Synthetic samples inserted before it
    pub synthesized: usize,
    /// True if this was the first sample for the entity
    pub discovered: bool,
}

/// Summary of one recorded batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordReport {
    /// Entities recorded
    pub recorded: usize,
    /// Records dropped because a later record had the same id
    pub duplicates: usize,
    /// Synthetic samples inserted across all entities
    pub synthesized: usize,
    /// Entities seen for the first time
    pub discovered: Vec<EntityId>,
}

/// Totals across every buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderStats {
    pub entities: usize,
    pub snapshots: usize,
    pub synthetic: usize,
}

/// Owner of every entity's snapshot buffer
#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    config: RecorderConfig,
    buffers: IndexMap<EntityId, SnapshotBuffer>,
}

impl SnapshotRecorder {
    /// Create an empty recorder
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            buffers: IndexMap::new(),
        }
    }

    /// Record one response's worth of samples at a shared timestamp
    ///
    /// When the batch holds several records for one entity, only the last
    /// is kept.
    pub fn record_batch(
        &mut self,
        samples: impl IntoIterator<Item = RawSample>,
        timestamp: Timestamp,
    ) -> RecordReport {
        let mut latest: IndexMap<EntityId, RawSample> = IndexMap::new();
        let mut report = RecordReport::default();
        for sample in samples {
            if latest.insert(sample.id.clone(), sample).is_some() {
                report.duplicates += 1;
            }
        }

        for (_, sample) in latest {
            let id = sample.id.clone();
            let outcome = self.record(sample, timestamp);
            report.recorded += 1;
            report.synthesized += outcome.synthesized;
            if outcome.discovered {
                report.discovered.push(id);
            }
        }

        if report.duplicates > 0 {
            log::debug!("dropped {} duplicate entity records", report.duplicates);
        }
        report
    }

    /// Record a single sample
    pub fn record(&mut self, sample: RawSample, timestamp: Timestamp) -> RecordOutcome {
        let capacity = self.config.capacity;
        let discovered = !self.buffers.contains_key(&sample.id);
        let buffer = self
            .buffers
            .entry(sample.id.clone())
            .or_insert_with(|| SnapshotBuffer::new(capacity));

        let Some(prev) = buffer.latest().cloned() else {
            let first = EntitySnapshot::new(
                timestamp,
                sample.position,
                sample.heading,
                sample.velocity.unwrap_or(Vec2::ZERO),
            );
            let stored_at = buffer.push(first);
            return RecordOutcome {
                stored_at,
                synthesized: 0,
                discovered,
            };
        };

        let next = smooth_against(&prev, &sample, timestamp, &self.config);
        let fillers = gap_fillers(
            &prev,
            &next,
            self.config.fill_spacing_ms(),
            self.config.max_fill(),
        );
        let synthesized = fillers.len();
        for filler in fillers {
            buffer.push(filler);
        }
        let stored_at = buffer.push(next);

        RecordOutcome {
            stored_at,
            synthesized,
            discovered,
        }
    }

    /// Get an entity's buffer
    pub fn buffer(&self, id: &EntityId) -> Option<&SnapshotBuffer> {
        self.buffers.get(id)
    }

    /// Ids of every entity with a buffer, in discovery order
    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.buffers.keys()
    }

    /// Drop an entity's buffer; returns whether it existed
    pub fn forget(&mut self, id: &EntityId) -> bool {
        self.buffers.shift_remove(id).is_some()
    }

    /// Drop every buffer
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Totals across every buffer
    pub fn stats(&self) -> RecorderStats {
        let mut stats = RecorderStats {
            entities: self.buffers.len(),
            snapshots: 0,
            synthetic: 0,
        };
        for buffer in self.buffers.values() {
            let s = buffer.stats();
            stats.snapshots += s.count;
            stats.synthetic += s.synthetic;
        }
        stats
    }

    /// Get the recorder configuration
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}

impl Default for SnapshotRecorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}

/// Build the snapshot to store for `sample`, given the previous stored one
fn smooth_against(
    prev: &EntitySnapshot,
    sample: &RawSample,
    timestamp: Timestamp,
    config: &RecorderConfig,
) -> EntitySnapshot {
    let timestamp = if timestamp <= prev.timestamp {
        prev.timestamp + 1
    } else {
        timestamp
    };
    let position = prev.position.lerp(&sample.position, config.position_alpha);

    let velocity = match sample.velocity {
        Some(reported) => reported,
        None => {
            let dt = (timestamp - prev.timestamp) as f64 / 1000.0;
            let raw = Vec2::new(
                clamp_finite((position.x - prev.position.x) / dt, config.max_speed),
                clamp_finite((position.y - prev.position.y) / dt, config.max_speed),
            );
            let keep = 1.0 - config.velocity_alpha;
            Vec2::new(
                prev.velocity.x * keep + raw.x * config.velocity_alpha,
                prev.velocity.y * keep + raw.y * config.velocity_alpha,
            )
        }
    };

    EntitySnapshot::new(
        timestamp,
        position,
        sample.heading.or(prev.heading),
        velocity,
    )
}

/// Synthesize filler samples between `prev` and `next`
///
/// Positions follow a cubic Hermite curve whose tangents come from each
/// endpoint's velocity; heading follows the shortest arc. Returns nothing
/// unless the gap exceeds `GAP_THRESHOLD` spacings, and never more than
/// `max_fill` samples.
pub fn gap_fillers(
    prev: &EntitySnapshot,
    next: &EntitySnapshot,
    spacing_ms: u64,
    max_fill: usize,
) -> Vec<EntitySnapshot> {
    if spacing_ms == 0 || next.timestamp <= prev.timestamp {
        return Vec::new();
    }
    let gap = next.timestamp - prev.timestamp;
    if gap as f64 <= GAP_THRESHOLD * spacing_ms as f64 {
        return Vec::new();
    }

    let count = ((gap / spacing_ms) as usize).saturating_sub(1).min(max_fill);
    let gap_s = gap as f64 / 1000.0;
    let m0 = prev.velocity.scale(gap_s * TANGENT_SCALE);
    let m1 = next.velocity.scale(gap_s * TANGENT_SCALE);

    (1..=count as u64)
        .map(|i| {
            let t = prev.timestamp + gap * i / (count as u64 + 1);
            let s = (t - prev.timestamp) as f64 / gap as f64;
            let position = Vec3::new(
                hermite(prev.position.x, m0.x, next.position.x, m1.x, s),
                hermite(prev.position.y, m0.y, next.position.y, m1.y, s),
                hermite(prev.position.z, 0.0, next.position.z, 0.0, s),
            );
            let velocity = Vec2::new(
                prev.velocity.x + (next.velocity.x - prev.velocity.x) * s,
                prev.velocity.y + (next.velocity.y - prev.velocity.y) * s,
            );
            EntitySnapshot::synthetic(
                t,
                position,
                lerp_heading(prev.heading, next.heading, s),
                velocity,
            )
        })
        .collect()
}
