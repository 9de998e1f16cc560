//! Controller Tracker
//!
//! Turns successive [`ControllerState`] snapshots into what an application
//! consumes: axes converted to a left-handed Y-up frame, press/release
//! edges, hold-home-to-recenter and a coarse battery level.

use crate::domain::models::{BatteryLevel, ButtonEdge, ControllerState, Quat, TrackedState, Vec3};
use crate::domain::settings::Settings;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// How long home must stay pressed before a recenter fires
    pub recenter_hold: Duration,
    /// Mirror the right-handed controller frame into a left-handed one
    pub convert_to_left_handed: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            recenter_hold: Duration::from_millis(1000),
            convert_to_left_handed: true,
        }
    }
}

impl From<&Settings> for TrackerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            recenter_hold: Duration::from_millis(settings.recenter_hold_ms),
            convert_to_left_handed: settings.convert_to_left_handed,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct LastInputs {
    touch: bool,
    click: bool,
    app: bool,
    home: bool,
    plus: bool,
    minus: bool,
}

pub struct ControllerTracker {
    config: TrackerConfig,
    last: LastInputs,

    // Recentering
    yaw_offset: f32,
    home_pressed_at: Option<Instant>,
    recenter_fired: bool,
    recenter_requested: bool,

    last_battery: Option<BatteryLevel>,
}

impl ControllerTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            last: LastInputs::default(),
            yaw_offset: 0.0,
            home_pressed_at: None,
            recenter_fired: false,
            recenter_requested: false,
            last_battery: None,
        }
    }

    /// Force a recenter on the next update
    pub fn recenter(&mut self) {
        self.recenter_requested = true;
    }

    /// Current yaw offset removed from every orientation, radians
    pub fn yaw_offset(&self) -> f32 {
        self.yaw_offset
    }

    pub fn update(&mut self, state: &ControllerState, now: Instant) -> TrackedState {
        let raw_orientation = self.convert_orientation(state.orientation);

        let touch = edge(state.is_touching, &mut self.last.touch);
        let click = edge(state.click_button_state, &mut self.last.click);
        let app = edge(state.app_button_state, &mut self.last.app);
        let home = edge(state.home_button_state, &mut self.last.home);
        let plus = edge(state.plus_button_state, &mut self.last.plus);
        let minus = edge(state.minus_button_state, &mut self.last.minus);

        let recentered = self.check_recenter(&home, now);
        if recentered {
            self.yaw_offset = raw_orientation.yaw();
            info!("Recentered, yaw offset {:.4} rad", self.yaw_offset);
        }
        let orientation = Quat::from_yaw(-self.yaw_offset) * raw_orientation;

        if state.supports_battery_status {
            let level = BatteryLevel::from_percentage(state.battery_level_percentage);
            if self.last_battery != Some(level) {
                debug!("Battery level {:?} ({}%)", level, state.battery_level_percentage);
            }
            self.last_battery = Some(level);
        } else {
            self.last_battery = None;
        }

        TrackedState {
            connection_state: state.connection_state,
            orientation,
            accel: self.convert_accel(state.accel),
            gyro: self.convert_gyro(state.gyro),
            touch_pos: state.touch_pos,
            touch,
            click,
            app,
            home,
            plus,
            minus,
            recentered,
            battery_level: self.last_battery,
        }
    }

    fn check_recenter(&mut self, home: &ButtonEdge, now: Instant) -> bool {
        if home.down {
            self.home_pressed_at = Some(now);
            self.recenter_fired = false;
        }
        if !home.pressed {
            self.home_pressed_at = None;
        }

        let held_long_enough = match self.home_pressed_at {
            Some(since) if !self.recenter_fired => {
                now.saturating_duration_since(since) >= self.config.recenter_hold
            }
            _ => false,
        };
        if held_long_enough {
            self.recenter_fired = true;
        }

        std::mem::take(&mut self.recenter_requested) || held_long_enough
    }

    fn convert_orientation(&self, q: Quat) -> Quat {
        if self.config.convert_to_left_handed {
            Quat {
                x: -q.x,
                y: -q.y,
                z: q.z,
                w: q.w,
            }
        } else {
            q
        }
    }

    fn convert_accel(&self, v: Vec3) -> Vec3 {
        if self.config.convert_to_left_handed {
            Vec3::new(v.x, v.y, -v.z)
        } else {
            v
        }
    }

    fn convert_gyro(&self, v: Vec3) -> Vec3 {
        if self.config.convert_to_left_handed {
            Vec3::new(-v.x, -v.y, v.z)
        } else {
            v
        }
    }
}

fn edge(current: bool, previous: &mut bool) -> ButtonEdge {
    let result = ButtonEdge {
        pressed: current,
        down: current && !*previous,
        up: !current && *previous,
    };
    *previous = current;
    result
}
