use std::time::SystemTime;

use rmserial_frame::SendPacket;
use serde::{Deserialize, Serialize};

/// Joint names published with every decoded state, in position order.
pub const JOINT_NAMES: [&str; 2] = ["pitch_joint", "yaw_joint"];

/// Gimbal joint positions decoded from one controller frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    pub stamp: SystemTime,
    pub name: [&'static str; 2],
    /// Radians, `[pitch, yaw]`.
    pub position: [f64; 2],
}

impl JointState {
    pub fn new(stamp: SystemTime, pitch: f32, yaw: f32) -> Self {
        Self {
            stamp,
            name: JOINT_NAMES,
            position: [f64::from(pitch), f64::from(yaw)],
        }
    }

    pub fn pitch(&self) -> f64 {
        self.position[0]
    }

    pub fn yaw(&self) -> f64 {
        self.position[1]
    }
}

/// Receives every decoded joint state. Must not block.
pub trait StateSink: Send + Sync {
    fn publish(&self, state: JointState);
}

impl<F: Fn(JointState) + Send + Sync> StateSink for F {
    fn publish(&self, state: JointState) {
        self(state)
    }
}

/// Receives the command-to-wire latency of every written frame, in ms.
pub trait LatencySink: Send + Sync {
    fn record(&self, latency_ms: f64);
}

impl<F: Fn(f64) + Send + Sync> LatencySink for F {
    fn record(&self, latency_ms: f64) {
        self(latency_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One aiming command to forward to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCommand {
    pub target_found: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    /// When the command's source observation was made.
    pub stamp: SystemTime,
}

impl TargetCommand {
    /// Unsealed wire packet; `task_mode` is always 0.
    pub fn to_packet(&self, target_color: bool) -> SendPacket {
        SendPacket {
            target_found: self.target_found,
            target_color,
            task_mode: 0,
            x: self.position.x as f32,
            y: self.position.y as f32,
            z: self.position.z as f32,
            vx: self.velocity.x as f32,
            vy: self.velocity.y as f32,
            vz: self.velocity.z as f32,
            checksum: 0,
        }
    }

    /// Milliseconds from `stamp` to `now`; negative if `stamp` is later.
    pub fn latency_ms(&self, now: SystemTime) -> f64 {
        match now.duration_since(self.stamp) {
            Ok(elapsed) => elapsed.as_secs_f64() * 1000.0,
            Err(err) => -err.duration().as_secs_f64() * 1000.0,
        }
    }
}
