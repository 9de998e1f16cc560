//! Bluetooth Module
//!
//! Protocol knowledge for the Daydream controller and the service that
//! turns its notifications into state. No radio code lives here: a
//! transport subscribes to [`protocol::DATA_CHAR_UUID`] and forwards the
//! payloads through a [`service::FeedSender`].
//!
//! ## Architecture
//!
//! ```text
//!   transport ──Frame / BatteryLevel / Connection──▶ ControllerService
//!                                                        │
//!                                           protocol::Frame + decoder
//!                                                        │
//!                                                        ▼
//!                                           watch::Receiver<ControllerState>
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - GATT identifiers, frame layout and parsing
//! - [`service`] - Background task owning the latest state

pub mod protocol;
pub mod service;

// Re-export main service for convenience
pub use service::{ControllerFeed, ControllerService, FeedSender, ServiceConfig, ServiceError};
