//! Scripted Session
//!
//! Runs a slipstream engine against an in-process simulated server (or a
//! real HTTP endpoint with `--http <url>`) and prints what a renderer would
//! draw each frame.
//! - Two bots circle the origin; the local car follows the demo's steering
//! - The simulated server drops every seventh poll to show backoff
//! - Engine events are logged as they arrive

use env_logger::Builder;
use log::LevelFilter;
use slipstream_core::{Clock, EntityId, SystemClock, Timestamp};
use slipstream_http::HttpTransport;
use slipstream_netcode::{
    EngineConfig, EntityRecord, Error, NetEvent, PollLoop, PollRequest, PollResponse,
    PollTransport, SharedEngine, SyncEngine, TimingEcho, TokioClock,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/engine.ron");

/// Render frames to draw before stopping
const FRAMES: u32 = 60;
const FRAME_INTERVAL_MS: u64 = 50;

/// Simulated network latency per poll
const LATENCY_MS: u64 = 60;
const DROP_EVERY: u32 = 7;
const SERVER_FPS: f64 = 10.0;
/// The simulated server's clock runs on its own epoch
const SERVER_EPOCH_MS: Timestamp = 1_700_000_000_000;

/// In-process stand-in for the authoritative server
struct SimulatedServer {
    clock: TokioClock,
    polls: AtomicU32,
}

impl SimulatedServer {
    fn new() -> Self {
        Self {
            clock: TokioClock::new(),
            polls: AtomicU32::new(0),
        }
    }

    fn world_at(&self, request: &PollRequest, now: Timestamp) -> Vec<EntityRecord> {
        let t = now as f64 / 1000.0;
        let mut entities: Vec<EntityRecord> = (0..2)
            .map(|i| {
                let phase = t * 0.8 + i as f64 * std::f64::consts::PI;
                let radius = 30.0 + 10.0 * i as f64;
                EntityRecord::new(format!("bot-{i}"), radius * phase.cos(), radius * phase.sin(), 0.0)
                    .with_angle(phase + std::f64::consts::FRAC_PI_2)
                    .with_velocity(-radius * 0.8 * phase.sin(), radius * 0.8 * phase.cos())
            })
            .collect();

        if let Some(id) = &request.player_id {
            // echo the client's seed, advanced by its throttle
            let angle = request.angle.unwrap_or(0.0);
            let step = request.input.throttle * 4.0;
            entities.push(
                EntityRecord::new(
                    id.clone(),
                    request.position.x + step * angle.cos(),
                    request.position.y + step * angle.sin(),
                    request.position.z,
                )
                .with_angle(angle + request.input.steer * 0.12),
            );
        }
        entities
    }
}

impl PollTransport for SimulatedServer {
    type Error = Error;

    async fn poll(&self, request: &PollRequest) -> Result<PollResponse, Error> {
        tokio::time::sleep(Duration::from_millis(LATENCY_MS / 2)).await;
        let count = self.polls.fetch_add(1, Ordering::Relaxed) + 1;
        if count % DROP_EVERY == 0 {
            tokio::time::sleep(Duration::from_millis(LATENCY_MS / 2)).await;
            return Err(Error::Transport(format!("simulated drop of poll {count}")));
        }

        let server_time = self.clock.now_ms();
        let response = PollResponse {
            entities: self.world_at(request, server_time),
            server_fps: Some(SERVER_FPS),
            server_time: Some(SERVER_EPOCH_MS + server_time),
            timing: Some(TimingEcho {
                client_time: Some(request.client_time),
                processing_ms: Some(1.0),
            }),
        };
        tokio::time::sleep(Duration::from_millis(LATENCY_MS / 2)).await;
        Ok(response)
    }
}

async fn run_session<T, C>(
    engine: SharedEngine,
    transport: T,
    clock: C,
) -> Result<(), Box<dyn std::error::Error>>
where
    T: PollTransport + 'static,
    C: Clock + Clone + 'static,
{
    let poll = PollLoop::new(engine.clone(), transport, clock.clone());
    let handle = poll.handle();
    let poller = tokio::spawn(poll.run());

    let mut events = engine.read().subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                NetEvent::EntityDiscovered { id } => log::info!("discovered {id}"),
                NetEvent::PollFailed {
                    failures,
                    retry_in_ms,
                    reason,
                } => log::warn!("poll failed x{failures}, retry in {retry_in_ms}ms: {reason}"),
                NetEvent::Stopped => break,
                other => log::debug!("{other:?}"),
            }
        }
    });

    let mut interval = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));
    for frame in 0..FRAMES {
        interval.tick().await;

        let steer = (frame as f64 / 10.0).sin();
        engine.write().feed_input(steer, 1.0)?;

        let now = clock.now_ms();
        let guard = engine.read();
        let ids: Vec<EntityId> = guard.entity_ids().cloned().collect();
        for id in &ids {
            if let Some(pose) = guard.resolve_pose(id, now) {
                println!(
                    "frame {frame:3} {id:>6}: ({:7.2}, {:7.2}) heading {:?}",
                    pose.position.x, pose.position.y, pose.heading
                );
            }
        }
        if frame % 20 == 0 {
            let rtt = guard.rtt();
            log::info!(
                "rtt {:.0}ms, interpolation delay {:.0}ms",
                rtt.smoothed_rtt_ms,
                rtt.interpolation_delay_ms
            );
        }
    }

    handle.stop();
    poller.await?;
    watcher.await?;

    let stats = engine.read().stats();
    log::info!(
        "session done: {} entities, {} snapshots ({} synthetic)",
        stats.entities,
        stats.snapshots,
        stats.synthetic
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // setup logger
    Builder::new().filter_level(LevelFilter::Info).init();

    let config = EngineConfig::load(CONFIG_PATH)?;
    let engine = SyncEngine::new(config)?.into_shared();

    let args: Vec<String> = std::env::args().collect();
    match args.iter().position(|a| a == "--http") {
        Some(i) => {
            let endpoint = args
                .get(i + 1)
                .ok_or("--http needs an endpoint url")?;
            log::info!("polling {endpoint}");
            run_session(engine, HttpTransport::new(endpoint)?, SystemClock::new()).await
        }
        None => run_session(engine, SimulatedServer::new(), TokioClock::new()).await,
    }
}
