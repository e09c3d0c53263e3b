//! Render-time resolution
//!
//! Looks up where an entity should be drawn at `now - interpolation_delay`
//! by interpolating between the two recorded snapshots around that
//! instant. Rendering runs at a much higher rate than the network, so this
//! is called once per visible entity per frame and never mutates history.

use slipstream_core::math::lerp_heading;
use slipstream_core::{EntitySnapshot, Pose, SnapshotBracketing, SnapshotHistory, Timestamp, Vec3};

/// How a pose was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Between two recorded snapshots
    Interpolated,
    /// Render time precedes the history; earliest snapshot returned
    ClampedToEarliest,
    /// Slightly past the newest snapshot; projected along its velocity
    Extrapolated,
    /// Too far past the newest snapshot; held in place
    Held,
}

/// A resolved pose and how it was obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub pose: Pose,
    pub mode: ResolveMode,
    pub render_time: Timestamp,
}

/// Interpolator from snapshot histories to per-frame poses
///
/// Forward extrapolation is limited to `extrapolation_horizon_ms` past the
/// newest snapshot; beyond that the newest position is held so a network
/// stall never turns into runaway drift.
#[derive(Debug, Clone, Copy)]
pub struct RenderResolver {
    extrapolation_horizon_ms: u64,
}

impl RenderResolver {
    /// Create a resolver with the given forward extrapolation horizon
    pub fn new(extrapolation_horizon_ms: u64) -> Self {
        Self {
            extrapolation_horizon_ms,
        }
    }

    /// Render time for `now` given an interpolation delay
    pub fn render_time(now: Timestamp, delay_ms: f64) -> Timestamp {
        now.saturating_sub(delay_ms.max(0.0).round() as u64)
    }

    /// Resolve the pose at `now - delay_ms`
    pub fn resolve_delayed<H: SnapshotHistory>(
        &self,
        history: &H,
        now: Timestamp,
        delay_ms: f64,
    ) -> Option<Pose> {
        self.resolve(history, Self::render_time(now, delay_ms))
    }

    /// Resolve the pose at exactly `render_time`
    ///
    /// Returns `None` if the history is empty.
    pub fn resolve<H: SnapshotHistory>(&self, history: &H, render_time: Timestamp) -> Option<Pose> {
        self.resolve_detailed(history, render_time).map(|r| r.pose)
    }

    /// Resolve the pose at `render_time`, reporting how it was obtained
    pub fn resolve_detailed<H: SnapshotHistory>(
        &self,
        history: &H,
        render_time: Timestamp,
    ) -> Option<Resolution> {
        let earliest = history.earliest()?;
        let latest = history.latest()?;

        let (pose, mode) = if render_time <= earliest.timestamp {
            (earliest.pose(), ResolveMode::ClampedToEarliest)
        } else if render_time >= latest.timestamp {
            self.project(latest, render_time - latest.timestamp)
        } else {
            let (a, b) = history.bracket(render_time)?;
            let s = H::interpolation_factor(a.timestamp, b.timestamp, render_time);
            (interpolate(a, b, s), ResolveMode::Interpolated)
        };

        Some(Resolution {
            pose,
            mode,
            render_time,
        })
    }

    /// Project past the newest snapshot by `ahead_ms`
    fn project(&self, latest: &EntitySnapshot, ahead_ms: u64) -> (Pose, ResolveMode) {
        if ahead_ms == 0 {
            return (latest.pose(), ResolveMode::Interpolated);
        }
        if ahead_ms > self.extrapolation_horizon_ms {
            return (latest.pose(), ResolveMode::Held);
        }
        let dt = ahead_ms as f64 / 1000.0;
        let position = Vec3::new(
            latest.position.x + latest.velocity.x * dt,
            latest.position.y + latest.velocity.y * dt,
            latest.position.z,
        );
        (Pose::new(position, latest.heading), ResolveMode::Extrapolated)
    }

    /// Get the extrapolation horizon
    pub fn extrapolation_horizon_ms(&self) -> u64 {
        self.extrapolation_horizon_ms
    }
}

/// Linearly interpolate between two snapshots at factor `s`
fn interpolate(a: &EntitySnapshot, b: &EntitySnapshot, s: f64) -> Pose {
    if a.timestamp == b.timestamp {
        return a.pose();
    }
    Pose::new(a.position.lerp(&b.position, s), lerp_heading(a.heading, b.heading, s))
}
