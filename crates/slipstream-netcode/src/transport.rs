//! Poll transport and wire types
//!
//! The engine talks to the authoritative server through a single
//! request/response exchange. `PollTransport` is the seam: implement it for
//! the network stack of your choice (`slipstream-http` provides one over
//! HTTP). Wire types are plain serde structs; records are validated into
//! `RawSample`s before they reach the recorder.

use crate::recorder::RawSample;
use serde::{Deserialize, Serialize};
use slipstream_core::{EntityId, LocalInput, Timestamp, Vec2, Vec3};
use std::future::Future;

/// Request-response transport to the authoritative server
///
/// One call is one poll; the poll loop never issues a second request before
/// the first has resolved.
pub trait PollTransport: Send + Sync {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a poll request and wait for the server's response
    ///
    /// Any failure, including a non-success reply, is an `Err`.
    fn poll(
        &self,
        request: &PollRequest,
    ) -> impl Future<Output = Result<PollResponse, Self::Error>> + Send;
}

/// Client to server poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRequest {
    /// Local player identifier
    pub player_id: Option<EntityId>,
    /// Current local input
    pub input: LocalInput,
    /// Last known local position, used by the server as a spawn seed
    pub position: Vec3,
    /// Last known local heading
    pub angle: Option<f64>,
    /// Client clock when the request was sent; echoed back in `timing`
    pub client_time: Timestamp,
    /// Opaque match/session token
    pub session_token: String,
}

/// Server to client poll reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    /// Entity states, possibly containing duplicates
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    /// Server simulation rate hint
    #[serde(default)]
    pub server_fps: Option<f64>,
    /// Server clock when the response was sent, in the server's own epoch
    #[serde(default)]
    pub server_time: Option<Timestamp>,
    /// Round-trip timing echo
    #[serde(default)]
    pub timing: Option<TimingEcho>,
}

/// Timing fields echoed by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingEcho {
    /// The request's `client_time`
    #[serde(default)]
    pub client_time: Option<Timestamp>,
    /// Time the server spent handling the request
    #[serde(default)]
    pub processing_ms: Option<f64>,
}

/// One entity as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub vx: Option<f64>,
    #[serde(default)]
    pub vy: Option<f64>,
    /// Per-entity status flags, passed through uninterpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl EntityRecord {
    /// Create a record at a position
    pub fn new(id: impl Into<EntityId>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            z,
            angle: None,
            vx: None,
            vy: None,
            status: None,
        }
    }

    /// Set the heading
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = Some(angle);
        self
    }

    /// Set the velocity
    pub fn with_velocity(mut self, vx: f64, vy: f64) -> Self {
        self.vx = Some(vx);
        self.vy = Some(vy);
        self
    }

    /// Validate into a recorder sample
    ///
    /// A non-finite position is rejected. A non-finite angle is dropped and
    /// a velocity is only used when both components are present and finite.
    pub fn to_sample(&self) -> slipstream_core::Result<RawSample> {
        let position = Vec3::new(self.x, self.y, self.z);
        if !position.is_finite() {
            return Err(slipstream_core::Error::InvalidSnapshot {
                entity: self.id.to_string(),
                reason: format!("non-finite position ({}, {}, {})", self.x, self.y, self.z),
            });
        }

        let heading = self.angle.filter(|a| a.is_finite());
        let velocity = match (self.vx, self.vy) {
            (Some(vx), Some(vy)) if vx.is_finite() && vy.is_finite() => Some(Vec2::new(vx, vy)),
            _ => None,
        };

        Ok(RawSample {
            id: self.id.clone(),
            position,
            heading,
            velocity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_from_json() {
        let json = r#"{
            "entities": [
                {"id": "p1", "x": 1.0, "y": 2.0, "angle": 0.5, "vx": 3.0, "vy": 4.0, "status": {"boost": true}},
                {"id": "p2", "x": 5.0, "y": 6.0, "z": 7.0}
            ],
            "server_fps": 20,
            "timing": {"client_time": 1000, "processing_ms": 4.5}
        }"#;
        let response: PollResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.entities.len(), 2);
        assert_eq!(response.server_fps, Some(20.0));
        assert_eq!(response.timing.unwrap().client_time, Some(1000));
        assert_eq!(response.server_time, None);

        let p1 = response.entities[0].to_sample().unwrap();
        assert_eq!(p1.velocity, Some(Vec2::new(3.0, 4.0)));
        assert_eq!(p1.heading, Some(0.5));

        let p2 = response.entities[1].to_sample().unwrap();
        assert_eq!(p2.position, Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(p2.velocity, None);
    }

    #[test]
    fn test_rejects_non_finite_position() {
        let record = EntityRecord::new("bad", f64::NAN, 0.0, 0.0);
        assert!(record.to_sample().is_err());
    }

    #[test]
    fn test_drops_bad_angle_and_partial_velocity() {
        let mut record = EntityRecord::new("p", 0.0, 0.0, 0.0).with_angle(f64::INFINITY);
        record.vx = Some(1.0);
        let sample = record.to_sample().unwrap();
        assert_eq!(sample.heading, None);
        assert_eq!(sample.velocity, None);
    }

    #[test]
    fn test_request_to_json() {
        let request = PollRequest {
            player_id: Some(EntityId::new("p1")),
            input: LocalInput::new(0.5, 1.0).unwrap(),
            position: Vec3::new(1.0, 2.0, 0.0),
            angle: Some(0.25),
            client_time: 42,
            session_token: "match".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["player_id"], "p1");
        assert_eq!(value["input"]["steer"], 0.5);
        assert_eq!(value["client_time"], 42);
    }
}
