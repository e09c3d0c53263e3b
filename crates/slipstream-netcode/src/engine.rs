//! Sync engine façade
//!
//! `SyncEngine` owns the recorder, the RTT estimator and the local input
//! slot, and answers per-frame pose queries for the rendering layer.
//!
//! Mutation happens in two places only: `ingest` (driven by the poll loop)
//! and `feed_input` (driven by the input layer). Everything else takes
//! `&self`. When the poll loop and the render loop run on different tasks
//! or threads, share the engine as a [`SharedEngine`]: a single-writer,
//! multi-reader lock whose guards are never held across an `.await`.

use crate::events::{EventBus, NetEvent};
use crate::recorder::{RecordReport, RecorderStats, SnapshotRecorder};
use crate::resolver::{RenderResolver, Resolution};
use crate::rtt::{RttEstimate, RttEstimator};
use crate::transport::{PollRequest, PollResponse};
use crate::{EngineConfig, PredictionBlender, Result};
use parking_lot::RwLock;
use slipstream_buffer::SnapshotBuffer;
use slipstream_core::{EntityId, LocalInput, Pose, Timestamp, Vec3};
use std::sync::Arc;

/// Engine shared between the poll loop and the render loop
pub type SharedEngine = Arc<RwLock<SyncEngine>>;

/// Summary of one ingested response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// RTT measured from this response's timing echo
    pub rtt_ms: Option<f64>,
    /// Local timestamp the response's samples were recorded under
    pub sampled_at: Timestamp,
    /// Records that failed validation
    pub rejected: usize,
    /// What the recorder did with the rest
    pub recorded: RecordReport,
}

/// Client-side state synchronization engine
#[derive(Debug)]
pub struct SyncEngine {
    config: EngineConfig,
    recorder: SnapshotRecorder,
    rtt: RttEstimator,
    resolver: RenderResolver,
    blender: PredictionBlender,
    input: LocalInput,
    local_id: Option<EntityId>,
    events: EventBus,
}

impl SyncEngine {
    /// Create an engine from a validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            recorder: SnapshotRecorder::new(config.recorder.clone()),
            rtt: RttEstimator::new(config.rtt.clone()),
            resolver: RenderResolver::new(config.recorder.fill_spacing_ms()),
            blender: PredictionBlender::new(config.prediction.clone()),
            input: LocalInput::IDLE,
            local_id: config.local_player.clone(),
            events: EventBus::default(),
            config,
        })
    }

    /// Wrap the engine for sharing between tasks
    pub fn into_shared(self) -> SharedEngine {
        Arc::new(RwLock::new(self))
    }

    /// Designate the locally controlled entity
    pub fn set_local_entity(&mut self, id: Option<EntityId>) {
        self.local_id = id;
    }

    /// The locally controlled entity, if any
    pub fn local_entity(&self) -> Option<&EntityId> {
        self.local_id.as_ref()
    }

    /// Record the latest local input, replacing the previous one
    pub fn feed_input(&mut self, steer: f64, throttle: f64) -> Result<()> {
        self.input = LocalInput::new(steer, throttle)?;
        Ok(())
    }

    /// The latest local input
    pub fn input(&self) -> LocalInput {
        self.input
    }

    /// Fold one server response into RTT and snapshot state
    ///
    /// `received_at` is on the engine's local clock. A `server_time` is
    /// mapped onto that clock through the offset learned from timing echoes;
    /// until an offset is known the receive time is used instead, so every
    /// buffer stays on the timeline `resolve_pose` queries.
    pub fn ingest(&mut self, response: &PollResponse, received_at: Timestamp) -> IngestReport {
        let mut report = IngestReport::default();

        if let Some(timing) = response.timing {
            if let Some(client_time) = timing.client_time {
                report.rtt_ms = self.rtt.observe(client_time, received_at, timing.processing_ms);
            }
        }
        report.sampled_at = self.sample_time(response, received_at, report.rtt_ms.is_some());

        let mut samples = Vec::with_capacity(response.entities.len());
        for record in &response.entities {
            match record.to_sample() {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    log::warn!("rejecting record for {}: {}", record.id, e);
                    report.rejected += 1;
                    self.events.publish(NetEvent::RecordRejected {
                        id: record.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.recorded = self
            .recorder
            .record_batch(samples, report.sampled_at);
        for id in &report.recorded.discovered {
            log::debug!("discovered entity {}", id);
            self.events
                .publish(NetEvent::EntityDiscovered { id: id.clone() });
        }

        report
    }

    /// Local timestamp to record a response's samples under
    fn sample_time(
        &mut self,
        response: &PollResponse,
        received_at: Timestamp,
        fresh_rtt: bool,
    ) -> Timestamp {
        let Some(server_time) = response.server_time else {
            return received_at;
        };
        if fresh_rtt {
            self.rtt.observe_server_time(server_time, received_at);
        }
        self.rtt.to_local_time(server_time).unwrap_or(received_at)
    }

    /// Offset of the server clock from the local clock, once known
    pub fn clock_offset_ms(&self) -> Option<f64> {
        self.rtt.clock_offset_ms()
    }

    /// Pose to draw for `id` at wall-clock `now`
    ///
    /// Looks `interpolation_delay_ms` into the past; the local entity also
    /// gets the input-driven prediction offset. Returns `None` until the
    /// entity has been recorded at least once.
    pub fn resolve_pose(&self, id: &EntityId, now: Timestamp) -> Option<Pose> {
        let pose = self.resolve_authoritative(id, now)?;
        if self.local_id.as_ref() == Some(id) {
            Some(self.blender.blend(pose, &self.input))
        } else {
            Some(pose)
        }
    }

    /// Pose for `id` at `now` without local prediction
    pub fn resolve_authoritative(&self, id: &EntityId, now: Timestamp) -> Option<Pose> {
        let buffer = self.recorder.buffer(id)?;
        self.resolver
            .resolve_delayed(buffer, now, self.rtt.interpolation_delay_ms())
    }

    /// Resolve `id` at an explicit render time, without delay or prediction
    pub fn resolve_at(&self, id: &EntityId, render_time: Timestamp) -> Option<Resolution> {
        let buffer = self.recorder.buffer(id)?;
        self.resolver.resolve_detailed(buffer, render_time)
    }

    /// Current interpolation delay in milliseconds
    pub fn interpolation_delay_ms(&self) -> f64 {
        self.rtt.interpolation_delay_ms()
    }

    /// Current RTT estimate
    pub fn rtt(&self) -> RttEstimate {
        self.rtt.estimate()
    }

    /// Smoothed RTT, or `None` before any timing echo
    pub fn smoothed_rtt_ms(&self) -> Option<f64> {
        self.rtt.smoothed_rtt_ms()
    }

    /// Last received local position and heading, or the configured spawn
    pub fn local_seed(&self) -> (Vec3, Option<f64>) {
        self.local_id
            .as_ref()
            .and_then(|id| self.recorder.buffer(id))
            .and_then(|buffer| buffer.latest_real())
            .map(|s| (s.position, s.heading))
            .unwrap_or((self.config.spawn_position, self.config.spawn_angle))
    }

    /// Assemble the next poll request
    pub fn build_request(&self, now: Timestamp) -> PollRequest {
        let (position, angle) = self.local_seed();
        PollRequest {
            player_id: self.local_id.clone(),
            input: self.input,
            position,
            angle,
            client_time: now,
            session_token: self.config.session_token.clone(),
        }
    }

    /// Ids of every recorded entity
    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.recorder.entity_ids()
    }

    /// Recorded history for one entity
    pub fn snapshots(&self, id: &EntityId) -> Option<&SnapshotBuffer> {
        self.recorder.buffer(id)
    }

    /// Drop an entity's history
    pub fn forget(&mut self, id: &EntityId) -> bool {
        self.recorder.forget(id)
    }

    /// Totals across every entity
    pub fn stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    /// The engine's event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NetEvent> {
        self.events.subscribe()
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveMode;
    use crate::transport::{EntityRecord, TimingEcho};
    use crate::RttConfig;
    use slipstream_core::SnapshotHistory;

    fn engine() -> SyncEngine {
        SyncEngine::new(EngineConfig::default().with_local_player("me")).unwrap()
    }

    fn response(records: Vec<EntityRecord>) -> PollResponse {
        PollResponse {
            entities: records,
            ..PollResponse::default()
        }
    }

    #[test]
    fn test_unknown_entity_has_no_pose() {
        let engine = engine();
        assert!(engine.resolve_pose(&EntityId::new("ghost"), 10_000).is_none());
    }

    #[test]
    fn test_simple_interpolation_scenario() {
        let mut engine = engine();
        let e1 = EntityId::new("E1");
        engine.ingest(&response(vec![EntityRecord::new("E1", 0.0, 0.0, 0.0)]), 1000);
        engine.ingest(
            &response(vec![
                EntityRecord::new("E1", 20.0, 0.0, 0.0).with_velocity(100.0, 0.0)
            ]),
            1200,
        );

        let mut last = f64::NEG_INFINITY;
        for t in (1000..=1200).step_by(10) {
            let x = engine.resolve_at(&e1, t).unwrap().pose.position.x;
            assert!((0.0..=20.0).contains(&x));
            assert!(x >= last, "x went backwards at {}: {} < {}", t, x, last);
            last = x;
        }
        let mid = engine.resolve_at(&e1, 1100).unwrap().pose.position.x;
        assert!(mid > 0.0 && mid < 20.0);
    }

    #[test]
    fn test_resolve_pose_applies_delay() {
        let mut engine = engine();
        let id = EntityId::new("other");
        engine.ingest(&response(vec![EntityRecord::new("other", 0.0, 0.0, 0.0)]), 1000);
        engine.ingest(&response(vec![EntityRecord::new("other", 10.0, 0.0, 0.0)]), 1050);

        // default delay is 150ms, so now=1150 renders at 1000
        let pose = engine.resolve_pose(&id, 1150).unwrap();
        assert_eq!(pose.position.x, 0.0);
    }

    #[test]
    fn test_local_entity_is_predicted() {
        let mut engine = engine();
        let me = EntityId::new("me");
        engine.ingest(
            &response(vec![EntityRecord::new("me", 0.0, 0.0, 0.0).with_angle(0.0)]),
            1000,
        );
        engine.feed_input(0.0, 1.0).unwrap();

        let authoritative = engine.resolve_authoritative(&me, 1200).unwrap();
        let predicted = engine.resolve_pose(&me, 1200).unwrap();
        assert!(predicted.position.x > authoritative.position.x);

        // offset disappears as soon as input does
        engine.feed_input(0.0, 0.0).unwrap();
        assert_eq!(engine.resolve_pose(&me, 1200).unwrap(), authoritative);
    }

    #[test]
    fn test_remote_entity_not_predicted() {
        let mut engine = engine();
        let other = EntityId::new("other");
        engine.ingest(
            &response(vec![EntityRecord::new("other", 0.0, 0.0, 0.0).with_angle(0.0)]),
            1000,
        );
        engine.feed_input(1.0, 1.0).unwrap();
        assert_eq!(
            engine.resolve_pose(&other, 1200),
            engine.resolve_authoritative(&other, 1200)
        );
    }

    #[test]
    fn test_feed_input_rejects_nan() {
        let mut engine = engine();
        assert!(engine.feed_input(f64::NAN, 0.0).is_err());
        assert_eq!(engine.input(), LocalInput::IDLE);
    }

    #[test]
    fn test_ingest_updates_rtt() {
        let mut engine = engine();
        let mut reply = response(vec![]);
        reply.timing = Some(TimingEcho {
            client_time: Some(1000),
            processing_ms: Some(10.0),
        });

        let report = engine.ingest(&reply, 1400);
        assert_eq!(report.rtt_ms, Some(400.0));
        assert_eq!(engine.smoothed_rtt_ms(), Some(400.0));
        assert_eq!(engine.interpolation_delay_ms(), 240.0);

        // no timing block leaves the estimate alone
        engine.ingest(&response(vec![]), 2000);
        assert_eq!(engine.smoothed_rtt_ms(), Some(400.0));
    }

    #[test]
    fn test_rejected_records_published() {
        let mut engine = engine();
        let mut events = engine.subscribe();

        let report = engine.ingest(
            &response(vec![
                EntityRecord::new("bad", f64::NAN, 0.0, 0.0),
                EntityRecord::new("good", 1.0, 0.0, 0.0),
            ]),
            1000,
        );

        assert_eq!(report.rejected, 1);
        assert_eq!(report.recorded.recorded, 1);
        assert!(engine.snapshots(&EntityId::new("bad")).is_none());
        assert!(matches!(events.try_recv().unwrap(), NetEvent::RecordRejected { .. }));
        assert_eq!(
            events.try_recv().unwrap(),
            NetEvent::EntityDiscovered {
                id: EntityId::new("good")
            }
        );
    }

    #[test]
    fn test_replayed_response_is_idempotent() {
        let mut engine = engine();
        let reply = response(vec![EntityRecord::new("a", 5.0, 0.0, 0.0)]);
        engine.ingest(&reply, 1000);
        engine.ingest(&reply, 1000);

        let buffer = engine.snapshots(&EntityId::new("a")).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.time_range(), Some((1000, 1001)));
        assert_eq!(buffer.latest().unwrap().position.x, 5.0);
    }

    fn echoed(records: Vec<EntityRecord>, sent_at: Timestamp, server_time: Option<Timestamp>) -> PollResponse {
        PollResponse {
            entities: records,
            server_time,
            timing: Some(TimingEcho {
                client_time: Some(sent_at),
                processing_ms: None,
            }),
            ..PollResponse::default()
        }
    }

    #[test]
    fn test_server_time_mapped_to_local_clock() {
        let mut engine = engine();
        // sent at 4900, received at 5000: one way is 50ms
        let reply = echoed(vec![EntityRecord::new("a", 0.0, 0.0, 0.0)], 4900, Some(1_700_000_000_000));
        let report = engine.ingest(&reply, 5000);

        assert_eq!(report.sampled_at, 4950);
        assert_eq!(engine.clock_offset_ms(), Some(1_700_000_000_000.0 - 4950.0));
        let buffer = engine.snapshots(&EntityId::new("a")).unwrap();
        assert_eq!(buffer.latest().unwrap().timestamp, 4950);
    }

    #[test]
    fn test_server_time_without_offset_uses_receive_time() {
        let mut engine = engine();
        let mut reply = response(vec![EntityRecord::new("a", 0.0, 0.0, 0.0)]);
        reply.server_time = Some(1_700_000_000_000);

        let report = engine.ingest(&reply, 5000);
        assert_eq!(report.sampled_at, 5000);
        assert_eq!(engine.clock_offset_ms(), None);
    }

    #[test]
    fn test_epoch_server_clock_keeps_entities_moving() {
        let mut engine = engine();
        let car = EntityId::new("car");
        for i in 0..4u64 {
            let received_at = 1000 + i * 200;
            let reply = echoed(
                vec![EntityRecord::new("car", i as f64 * 10.0, 0.0, 0.0)],
                received_at - 100,
                Some(1_700_000_000_000 + i * 200),
            );
            engine.ingest(&reply, received_at);
        }

        // samples land at 950, 1150, 1350, 1550 on the local clock
        let buffer = engine.snapshots(&car).unwrap();
        assert_eq!(buffer.time_range(), Some((950, 1550)));

        let delay = engine.interpolation_delay_ms();
        let mut last = f64::NEG_INFINITY;
        for now in [1200, 1400, 1600, 1700] {
            let render_time = RenderResolver::render_time(now, delay);
            let resolution = engine.resolve_at(&car, render_time).unwrap();
            assert_ne!(resolution.mode, ResolveMode::ClampedToEarliest, "now {}", now);
            assert!(resolution.pose.position.x > last, "now {}", now);
            last = resolution.pose.position.x;
        }
        assert!(last > 0.0);
    }

    #[test]
    fn test_mixed_server_time_stays_on_one_timeline() {
        let mut engine = engine();
        let a = EntityId::new("a");
        engine.ingest(&echoed(vec![EntityRecord::new("a", 0.0, 0.0, 0.0)], 900, Some(50_000)), 1000);
        // next response carries no server_time
        engine.ingest(&response(vec![EntityRecord::new("a", 1.0, 0.0, 0.0)]), 1200);

        let buffer = engine.snapshots(&a).unwrap();
        assert_eq!(buffer.time_range(), Some((950, 1200)));
    }

    #[test]
    fn test_build_request_uses_seed() {
        let mut config = EngineConfig::default()
            .with_local_player("me")
            .with_session_token("tok");
        config.spawn_position = Vec3::new(3.0, 4.0, 0.0);
        config.spawn_angle = Some(1.0);
        let mut engine = SyncEngine::new(config).unwrap();

        let request = engine.build_request(50);
        assert_eq!(request.position, Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(request.angle, Some(1.0));
        assert_eq!(request.client_time, 50);
        assert_eq!(request.session_token, "tok");

        engine.ingest(
            &response(vec![EntityRecord::new("me", 9.0, 9.0, 0.0).with_angle(0.5)]),
            1000,
        );
        let request = engine.build_request(1100);
        assert_eq!(request.position, Vec3::new(9.0, 9.0, 0.0));
        assert_eq!(request.angle, Some(0.5));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            rtt: RttConfig {
                alpha: 2.0,
                ..RttConfig::default()
            },
            ..EngineConfig::default()
        };
        assert!(SyncEngine::new(config).is_err());
    }

    #[test]
    fn test_shared_engine() {
        let shared = engine().into_shared();
        shared.write().feed_input(0.5, 0.5).unwrap();
        assert_eq!(shared.read().input().steer, 0.5);
    }
}
