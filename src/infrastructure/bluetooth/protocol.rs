//! Daydream Controller Protocol
//!
//! This module contains the protocol definitions for the notifications sent
//! by the Daydream controller: GATT identifiers, the 20-byte frame layout and
//! the scaling applied to its raw fields.

use thiserror::Error;
use uuid::Uuid;

/// Advertised device name
pub const DEVICE_NAME: &str = "Daydream controller";

/// Daydream controller GATT service (16-bit 0xFE55)
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000fe55_0000_1000_8000_00805f9b34fb);

/// Notification characteristic carrying the 20-byte frames
pub const DATA_CHAR_UUID: Uuid = Uuid::from_u128(0x00000001_1000_1000_8000_00805f9b34fb);

/// Standard Battery Service
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard Battery Level characteristic (one byte, percent)
pub const BATTERY_LEVEL_CHAR_UUID: Uuid =
    Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Notification payload size in bytes
pub const FRAME_LEN: usize = 20;

/// Raw notification payload
pub type RawFrame = [u8; FRAME_LEN];

/// Button bits in byte 18
pub mod buttons {
    pub const CLICK: u8 = 0x01;
    pub const HOME: u8 = 0x02;
    pub const APP: u8 = 0x04;
    pub const MINUS: u8 = 0x08;
    pub const PLUS: u8 = 0x10;
}

/// Scaling from raw frame integers to physical units
pub mod scale {
    use std::f32::consts::PI;

    /// Full-scale value of the 13-bit signed IMU fields
    const FULL_SCALE: f32 = 4095.0;

    /// Rotation vector, radians
    pub const ORIENTATION: f32 = 2.0 * PI / FULL_SCALE;
    /// ±8 g expressed in m/s²
    pub const ACCEL: f32 = 8.0 * 9.8 / FULL_SCALE;
    /// ±2048 °/s expressed in rad/s
    pub const GYRO: f32 = 2048.0 / 180.0 * PI / FULL_SCALE;
    /// Divisor taking 8-bit touch coordinates to 0..=1
    pub const TOUCH_RANGE: f32 = 255.0;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame size: {actual} (expected {expected})")]
    InvalidLength { expected: usize, actual: usize },
}

/// Raw integer fields of one notification
///
/// # Frame Structure (20 bytes, read as a big-endian bit stream)
///
/// ```text
/// bits 0-8     : Timestamp (9 bits, unsigned)
/// bits 9-13    : Sequence number (5 bits, unsigned)
/// bits 14-52   : Orientation X, Y, Z (13 bits each, signed rotation vector)
/// bits 53-91   : Accel X, Y, Z (13 bits each, signed)
/// bits 92-130  : Gyro X, Y, Z (13 bits each, signed)
/// bits 131-138 : Touchpad X (8 bits, 0 = no touch)
/// bits 139-146 : Touchpad Y (8 bits, 0 = no touch)
/// bits 147-151 : Button state (low 5 bits of byte 18)
///           bit 0: Click
///           bit 1: Home
///           bit 2: App
///           bit 3: Volume Down
///           bit 4: Volume Up
/// byte 19      : Reserved
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    pub timestamp: u16,
    pub sequence: u8,
    pub orientation: [i16; 3],
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
    pub touch_x: u8,
    pub touch_y: u8,
    pub buttons: u8,
}

impl Frame {
    /// Parse a notification payload of any length, rejecting anything but 20 bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let raw: &RawFrame = bytes.try_into().map_err(|_| FrameError::InvalidLength {
            expected: FRAME_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::from_raw(raw))
    }

    /// Decode a fixed-size payload. Every bit pattern is a valid frame.
    pub fn from_raw(raw: &RawFrame) -> Self {
        let mut bits = BitReader::new(raw);
        let timestamp = bits.unsigned(9) as u16;
        let sequence = bits.unsigned(5) as u8;
        let orientation = [bits.signed(13), bits.signed(13), bits.signed(13)];
        let accel = [bits.signed(13), bits.signed(13), bits.signed(13)];
        let gyro = [bits.signed(13), bits.signed(13), bits.signed(13)];
        let touch_x = bits.unsigned(8) as u8;
        let touch_y = bits.unsigned(8) as u8;
        let buttons = bits.unsigned(5) as u8;

        Self {
            timestamp,
            sequence,
            orientation,
            accel,
            gyro,
            touch_x,
            touch_y,
            buttons,
        }
    }

    pub fn is_touching(&self) -> bool {
        self.touch_x != 0 || self.touch_y != 0
    }

    pub fn button(&self, mask: u8) -> bool {
        (self.buttons & mask) != 0
    }
}

/// MSB-first reader over a fixed frame. Reads past the end yield zero bits.
struct BitReader<'a> {
    bytes: &'a RawFrame,
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a RawFrame) -> Self {
        Self { bytes, pos: 0 }
    }

    fn unsigned(&mut self, width: usize) -> u32 {
        let mut value = 0u32;
        for _ in 0..width {
            let bit = self
                .bytes
                .get(self.pos / 8)
                .map(|&byte| (byte >> (7 - self.pos % 8)) & 1)
                .unwrap_or(0);
            value = (value << 1) | u32::from(bit);
            self.pos += 1;
        }
        value
    }

    /// Two's complement field of `width` bits, sign-extended
    fn signed(&mut self, width: usize) -> i16 {
        let raw = self.unsigned(width);
        let shift = 32 - width;
        (((raw << shift) as i32) >> shift) as i16
    }
}
