//! Decoder for Daydream VR controller notifications.
//!
//! [`initial_state`] gives the state before any controller is seen and
//! [`next_state`] folds each 20-byte notification into a new
//! [`ControllerState`]. [`ControllerService`] keeps the latest state on a
//! tokio task and [`ControllerTracker`] derives button edges, recentering
//! and battery levels from successive states.

pub mod domain;
pub mod infrastructure;

pub use domain::decoder::{initial_state, next_state, next_state_from_slice};
pub use domain::models::{
    BatteryLevel, ButtonEdge, ConnectionState, ControllerState, Quat, TrackedState, Vec2, Vec3,
};
pub use domain::tracker::{ControllerTracker, TrackerConfig};
pub use infrastructure::bluetooth::protocol::{Frame, FrameError, RawFrame, FRAME_LEN};
pub use infrastructure::bluetooth::{ControllerFeed, ControllerService, FeedSender, ServiceConfig};
