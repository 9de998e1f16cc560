//! Controller State Decoder
//!
//! Turns notification frames into [`ControllerState`] values. Both entry
//! points are pure: the new state depends only on the frame and the previous
//! state, and decoding never fails.

use crate::domain::models::{ConnectionState, ControllerState, Quat, Vec2, Vec3};
use crate::infrastructure::bluetooth::protocol::{buttons, scale, Frame, RawFrame};
use tracing::debug;

/// State before any controller has been seen
pub fn initial_state() -> ControllerState {
    ControllerState {
        connection_state: ConnectionState::Disconnected,
        orientation: Quat::IDENTITY,
        accel: Vec3::default(),
        gyro: Vec3::default(),
        touch_pos: Vec2::default(),
        is_touching: false,
        app_button_state: false,
        home_button_state: false,
        click_button_state: false,
        plus_button_state: false,
        minus_button_state: false,
        supports_battery_status: false,
        battery_level_percentage: 0,
        timestamp: 0,
        sequence: 0,
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        initial_state()
    }
}

/// Decode one 20-byte notification on top of `previous`
///
/// Connection and battery fields are not part of the frame and are carried
/// over from `previous`.
pub fn next_state(buffer: &RawFrame, previous: ControllerState) -> ControllerState {
    apply_frame(&Frame::from_raw(buffer), previous)
}

/// Same as [`next_state`] for transports that hand over unsized payloads.
/// Anything that is not exactly one frame leaves `previous` untouched.
pub fn next_state_from_slice(bytes: &[u8], previous: ControllerState) -> ControllerState {
    match Frame::parse(bytes) {
        Ok(frame) => apply_frame(&frame, previous),
        Err(e) => {
            debug!("Dropping notification: {}", e);
            previous
        }
    }
}

fn apply_frame(frame: &Frame, previous: ControllerState) -> ControllerState {
    let rotation = scaled(frame.orientation, scale::ORIENTATION);

    ControllerState {
        orientation: Quat::from_rotation_vector(rotation),
        accel: scaled(frame.accel, scale::ACCEL),
        gyro: scaled(frame.gyro, scale::GYRO),
        touch_pos: Vec2 {
            x: f32::from(frame.touch_x) / scale::TOUCH_RANGE,
            y: f32::from(frame.touch_y) / scale::TOUCH_RANGE,
        },
        is_touching: frame.is_touching(),
        app_button_state: frame.button(buttons::APP),
        home_button_state: frame.button(buttons::HOME),
        click_button_state: frame.button(buttons::CLICK),
        plus_button_state: frame.button(buttons::PLUS),
        minus_button_state: frame.button(buttons::MINUS),
        timestamp: frame.timestamp,
        sequence: frame.sequence,
        ..previous
    }
}

fn scaled(raw: [i16; 3], factor: f32) -> Vec3 {
    Vec3::new(
        f32::from(raw[0]) * factor,
        f32::from(raw[1]) * factor,
        f32::from(raw[2]) * factor,
    )
}

impl ControllerState {
    /// Merge a Battery Level characteristic read
    pub fn with_battery_level(self, percentage: u8) -> Self {
        Self {
            supports_battery_status: true,
            battery_level_percentage: percentage.min(100),
            ..self
        }
    }

    pub fn with_connection_state(self, connection_state: ConnectionState) -> Self {
        Self {
            connection_state,
            ..self
        }
    }

    pub fn any_button_pressed(&self) -> bool {
        self.app_button_state
            || self.home_button_state
            || self.click_button_state
            || self.plus_button_state
            || self.minus_button_state
    }
}
