/// Controller session layer: a fixed pool of controller slots polled for
/// immutable state snapshots, with hot-plug reconciliation, edge-triggered
/// button detection and Sony enhanced-feature negotiation on top of a
/// swappable input backend.

mod buttons;
mod config;
mod error;
mod haptics;
mod slot;
mod snapshot;
mod stick;

pub mod backend;
pub mod crc32;
pub mod hidbackend;
pub mod session;

pub use backend::{
    Axes, Backend, BackendError, BackendHints, Capabilities, DeviceId, ReadError, SensorReading,
    TouchFinger, TriggerEffect,
};
pub use buttons::{just_pressed, Button};
pub use config::{SessionConfig, SonyFeatures};
pub use error::SessionError;
pub use haptics::CapabilityTier;
pub use hidbackend::HidBackend;
pub use session::Session;
pub use snapshot::Snapshot;
pub use stick::polar;
