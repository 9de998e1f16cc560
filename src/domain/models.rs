//! Controller data model
//!
//! Plain value types carried between the decoder, the service and the
//! tracker. Everything here is `Copy` so states can be replaced wholesale
//! on every notification.

use serde::{Deserialize, Serialize};
use std::ops::Mul;
use thiserror::Error;

/// Rotation as a quaternion, scalar last
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Build a unit quaternion from a rotation vector (axis scaled by angle in radians)
    ///
    /// A zero-length vector is no rotation at all.
    pub fn from_rotation_vector(v: Vec3) -> Self {
        let angle = v.length();
        if angle <= f32::EPSILON {
            return Self::IDENTITY;
        }

        let half = angle * 0.5;
        let s = half.sin() / angle;
        Self {
            x: v.x * s,
            y: v.y * s,
            z: v.z * s,
            w: half.cos(),
        }
    }

    /// Rotation of `angle` radians around the Y (up) axis
    pub fn from_yaw(angle: f32) -> Self {
        let half = angle * 0.5;
        Self {
            x: 0.0,
            y: half.sin(),
            z: 0.0,
            w: half.cos(),
        }
    }

    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Heading around the Y axis: the angle of the rotated forward (+Z)
    /// vector projected onto the horizontal plane
    pub fn yaw(&self) -> f32 {
        let fx = 2.0 * (self.x * self.z + self.w * self.y);
        let fz = 1.0 - 2.0 * (self.x * self.x + self.y * self.y);
        fx.atan2(fz)
    }
}

/// Hamilton product
impl Mul for Quat {
    type Output = Quat;

    fn mul(self, rhs: Quat) -> Quat {
        Quat {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Link state as reported by the transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Scanning = 1,
    Connecting = 2,
    Connected = 3,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown connection state: {0}")]
pub struct ConnectionStateError(pub u8);

impl TryFrom<u8> for ConnectionState {
    type Error = ConnectionStateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Disconnected),
            1 => Ok(Self::Scanning),
            2 => Ok(Self::Connecting),
            3 => Ok(Self::Connected),
            other => Err(ConnectionStateError(other)),
        }
    }
}

/// Instantaneous controller readings
///
/// `battery_level_percentage` only means something when
/// `supports_battery_status` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub connection_state: ConnectionState,
    pub orientation: Quat,
    /// m/s²
    pub accel: Vec3,
    /// rad/s
    pub gyro: Vec3,
    /// Normalized 0..=1 on both axes
    pub touch_pos: Vec2,
    pub is_touching: bool,
    pub app_button_state: bool,
    pub home_button_state: bool,
    pub click_button_state: bool,
    pub plus_button_state: bool,
    pub minus_button_state: bool,
    pub supports_battery_status: bool,
    pub battery_level_percentage: u8,

    // Frame header
    pub timestamp: u16,
    pub sequence: u8,
}

/// Coarse battery reading exposed to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryLevel {
    CriticalLow,
    Low,
    Medium,
    AlmostFull,
    Full,
}

impl BatteryLevel {
    pub fn from_percentage(percentage: u8) -> Self {
        match percentage {
            80.. => Self::Full,
            60..=79 => Self::AlmostFull,
            40..=59 => Self::Medium,
            20..=39 => Self::Low,
            _ => Self::CriticalLow,
        }
    }
}

/// Press/release edges for one input since the previous update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEdge {
    pub pressed: bool,
    pub down: bool,
    pub up: bool,
}

/// Controller state as seen by the application after axis conversion,
/// recentering and edge detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedState {
    pub connection_state: ConnectionState,
    pub orientation: Quat,
    pub accel: Vec3,
    pub gyro: Vec3,
    pub touch_pos: Vec2,
    pub touch: ButtonEdge,
    pub click: ButtonEdge,
    pub app: ButtonEdge,
    pub home: ButtonEdge,
    pub plus: ButtonEdge,
    pub minus: ButtonEdge,
    pub recentered: bool,
    pub battery_level: Option<BatteryLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_connection_state_from_raw() {
        assert_eq!(ConnectionState::try_from(3), Ok(ConnectionState::Connected));
        assert_eq!(ConnectionState::try_from(0), Ok(ConnectionState::Disconnected));
        assert_eq!(ConnectionState::try_from(4), Err(ConnectionStateError(4)));
    }

    #[test]
    fn test_zero_rotation_vector_is_identity() {
        assert_eq!(Quat::from_rotation_vector(Vec3::default()), Quat::IDENTITY);
    }

    #[test]
    fn test_rotation_vector_half_turn_about_y() {
        let q = Quat::from_rotation_vector(Vec3::new(0.0, std::f32::consts::PI, 0.0));
        assert!(approx(q.y, 1.0));
        assert!(approx(q.w, 0.0));
        assert!(approx(q.norm(), 1.0));
    }

    #[test]
    fn test_yaw_of_yaw_rotation() {
        let q = Quat::from_yaw(0.75);
        assert!(approx(q.yaw(), 0.75));
        let undone = Quat::from_yaw(-0.75) * q;
        assert!(approx(undone.yaw(), 0.0));
        assert!(approx(undone.w, 1.0));
    }

    #[test]
    fn test_battery_buckets() {
        assert_eq!(BatteryLevel::from_percentage(100), BatteryLevel::Full);
        assert_eq!(BatteryLevel::from_percentage(80), BatteryLevel::Full);
        assert_eq!(BatteryLevel::from_percentage(79), BatteryLevel::AlmostFull);
        assert_eq!(BatteryLevel::from_percentage(40), BatteryLevel::Medium);
        assert_eq!(BatteryLevel::from_percentage(20), BatteryLevel::Low);
        assert_eq!(BatteryLevel::from_percentage(19), BatteryLevel::CriticalLow);
        assert_eq!(BatteryLevel::from_percentage(0), BatteryLevel::CriticalLow);
    }
}
