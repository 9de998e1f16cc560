//! Controller Service Module
//!
//! Owns the current [`ControllerState`] on a background task. Whatever
//! transport talks to the controller pushes notifications, battery reads and
//! link changes into it; readers poll or watch the latest state.

use crate::domain::decoder::{initial_state, next_state_from_slice};
use crate::domain::models::{ConnectionState, ControllerState};
use crate::domain::settings::Settings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Input accepted by the service
#[derive(Debug, Clone)]
pub enum ControllerFeed {
    /// Payload of a data characteristic notification
    Frame(Vec<u8>),
    /// Battery Level characteristic value, percent
    BatteryLevel(u8),
    Connection(ConnectionState),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("controller service has stopped")]
    Stopped,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceConfig {
    /// Trace every raw notification
    pub log_raw_frames: bool,
}

impl From<&Settings> for ServiceConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            log_raw_frames: settings.debug_raw_data_logging,
        }
    }
}

#[derive(Debug)]
enum Message {
    Feed(ControllerFeed),
    Pause,
    Resume,
    Stop,
}

/// Cloneable handle for pushing input into a running service
#[derive(Debug, Clone)]
pub struct FeedSender {
    sender: mpsc::UnboundedSender<Message>,
}

impl FeedSender {
    pub fn send(&self, feed: ControllerFeed) -> Result<(), ServiceError> {
        self.sender
            .send(Message::Feed(feed))
            .map_err(|_| ServiceError::Stopped)
    }

    pub fn frame(&self, bytes: &[u8]) -> Result<(), ServiceError> {
        self.send(ControllerFeed::Frame(bytes.to_vec()))
    }

    pub fn battery_level(&self, percentage: u8) -> Result<(), ServiceError> {
        self.send(ControllerFeed::BatteryLevel(percentage))
    }

    pub fn connection(&self, state: ConnectionState) -> Result<(), ServiceError> {
        self.send(ControllerFeed::Connection(state))
    }
}

/// Main service holding the latest controller state
pub struct ControllerService {
    feed: FeedSender,
    state_rx: watch::Receiver<ControllerState>,
    paused: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ControllerService {
    /// Spawn the service task. Must be called from within a tokio runtime.
    pub fn start(config: ServiceConfig) -> Self {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial_state());
        let paused = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run(config, feed_rx, state_tx));
        info!("Controller service started");

        Self {
            feed: FeedSender { sender: feed_tx },
            state_rx,
            paused,
            task,
        }
    }

    pub fn feeder(&self) -> FeedSender {
        self.feed.clone()
    }

    /// Copy of the latest state
    pub fn state(&self) -> ControllerState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state_rx.clone()
    }

    /// Drop every notification fed after this call until [`resume`](Self::resume).
    /// Battery and link updates still apply.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            // Ordered with the feed so frames already queued still apply
            let _ = self.feed.sender.send(Message::Pause);
            info!("Controller service paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            let _ = self.feed.sender.send(Message::Resume);
            info!("Controller service resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Apply everything already fed, stop the task and return the final state.
    /// Outstanding [`FeedSender`]s fail with [`ServiceError::Stopped`] afterwards.
    pub async fn shutdown(self) -> ControllerState {
        let Self {
            feed,
            state_rx,
            task,
            ..
        } = self;
        // Already stopped if the task died, nothing to signal then
        let _ = feed.sender.send(Message::Stop);
        if let Err(e) = task.await {
            warn!("Controller service task ended abnormally: {}", e);
        }
        let state = *state_rx.borrow();
        state
    }
}

async fn run(
    config: ServiceConfig,
    mut feed_rx: mpsc::UnboundedReceiver<Message>,
    state_tx: watch::Sender<ControllerState>,
) {
    let mut state = initial_state();
    let mut paused = false;

    while let Some(message) = feed_rx.recv().await {
        let feed = match message {
            Message::Feed(feed) => feed,
            Message::Pause => {
                paused = true;
                continue;
            }
            Message::Resume => {
                paused = false;
                continue;
            }
            Message::Stop => break,
        };
        state = match feed {
            ControllerFeed::Frame(bytes) => {
                if paused {
                    continue;
                }
                if config.log_raw_frames {
                    trace!("Notification: {:02X?}", bytes);
                }
                next_state_from_slice(&bytes, state)
            }
            ControllerFeed::BatteryLevel(percentage) => {
                debug!("Battery level read: {}%", percentage);
                state.with_battery_level(percentage)
            }
            ControllerFeed::Connection(connection_state) => {
                info!("Connection state: {:?}", connection_state);
                state.with_connection_state(connection_state)
            }
        };
        state_tx.send_replace(state);
    }

    info!("Controller service stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::{buttons, FRAME_LEN};
    use std::io::Write;
    use std::sync::Mutex;

    fn click_frame() -> [u8; FRAME_LEN] {
        let mut raw = [0u8; FRAME_LEN];
        raw[18] = buttons::CLICK;
        raw
    }

    #[tokio::test]
    async fn test_feed_updates_state() {
        let service = ControllerService::start(ServiceConfig::default());
        let feeder = service.feeder();
        assert_eq!(service.state(), initial_state());

        feeder.connection(ConnectionState::Connected).unwrap();
        feeder.battery_level(42).unwrap();
        feeder.frame(&click_frame()).unwrap();

        let state = service.shutdown().await;
        assert_eq!(state.connection_state, ConnectionState::Connected);
        assert!(state.supports_battery_status);
        assert_eq!(state.battery_level_percentage, 42);
        assert!(state.click_button_state);
    }

    #[tokio::test]
    async fn test_paused_service_drops_frames() {
        let service = ControllerService::start(ServiceConfig::default());
        let feeder = service.feeder();

        service.pause();
        assert!(service.is_paused());
        feeder.frame(&click_frame()).unwrap();
        feeder.connection(ConnectionState::Connecting).unwrap();

        let mut rx = service.subscribe();
        rx.wait_for(|s| s.connection_state == ConnectionState::Connecting)
            .await
            .unwrap();
        assert!(!service.state().click_button_state);

        service.resume();
        feeder.frame(&click_frame()).unwrap();
        rx.wait_for(|s| s.click_button_state).await.unwrap();
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_frame_sent_while_paused_is_dropped_after_resume() {
        let service = ControllerService::start(ServiceConfig::default());
        let feeder = service.feeder();

        service.pause();
        feeder.frame(&click_frame()).unwrap();
        service.resume();

        let state = service.shutdown().await;
        assert!(!state.click_button_state);
    }

    #[tokio::test]
    async fn test_frame_sent_before_pause_still_applies() {
        let service = ControllerService::start(ServiceConfig::default());
        let feeder = service.feeder();

        feeder.frame(&click_frame()).unwrap();
        service.pause();

        let state = service.shutdown().await;
        assert!(state.click_button_state);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Feeds one 0xAB frame under a TRACE subscriber and returns what was logged
    async fn logs_for_frame(config: ServiceConfig) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        // current-thread runtime: the service task runs under this subscriber too
        let _guard = tracing::subscriber::set_default(subscriber);

        let service = ControllerService::start(config);
        service.feeder().frame(&[0xAB; FRAME_LEN]).unwrap();
        service.shutdown().await;
        logs.contents()
    }

    #[tokio::test]
    async fn test_raw_frames_not_logged_without_flag() {
        let logs = logs_for_frame(ServiceConfig::default()).await;
        assert!(logs.contains("Controller service stopped"));
        assert!(!logs.contains("AB, AB"), "raw frame logged: {logs}");
    }

    #[tokio::test]
    async fn test_raw_frames_logged_with_flag() {
        let logs = logs_for_frame(ServiceConfig {
            log_raw_frames: true,
        })
        .await;
        assert!(logs.contains("Notification: [AB, AB"), "missing raw frame: {logs}");
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_state() {
        let service = ControllerService::start(ServiceConfig {
            log_raw_frames: true,
        });
        let feeder = service.feeder();
        feeder.frame(&click_frame()).unwrap();
        feeder.frame(&[0x01, 0x00]).unwrap();
        let state = service.shutdown().await;
        assert!(state.click_button_state);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let service = ControllerService::start(ServiceConfig::default());
        let feeder = service.feeder();
        service.shutdown().await;
        assert_eq!(feeder.battery_level(10), Err(ServiceError::Stopped));
    }
}
