/// The narrow contract between the session layer and a native input backend.
///
/// Everything the session needs from the platform goes through this trait:
/// device enumeration, hot-plug event draining, raw axis/button reads,
/// capability queries, output commands (rumble, trigger effects, haptic
/// audio) and mapping-database loading. The session never touches hidapi,
/// SDL or anything else directly, so the whole engine is testable against a
/// scripted mock.

use std::path::Path;

use crate::config::SonyFeatures;

/// Opaque device handle. A handle is stable for the lifetime of one
/// physical connection and is never reused for a different device — slots
/// compare handles across hot-plug drains to tell "same pad, still here"
/// from "a different pad landed in this position", so positional indices
/// that shift when the device list changes are not valid handles.
pub type DeviceId = u64;

/// Capability flags for a bound device, queried once at bind time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub touchpad: bool,
    pub sensor: bool,
    pub haptics: bool,
}

/// One frame of raw axis data. Sticks are -1.0..1.0, triggers 0.0..1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Axes {
    pub left_x: f32,
    pub left_y: f32,
    pub right_x: f32,
    pub right_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

/// One touchpad finger. Coordinates are the device's native touch grid
/// (1920x1080 logical on DualSense/DS4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchFinger {
    pub id: u8,
    pub down: bool,
    pub x: u16,
    pub y: u16,
}

/// Motion sensor data: gyro in raw device units, accel likewise. Callers
/// that need physical units apply the device's own calibration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReading {
    pub gyro: [f32; 3],
    pub accel: [f32; 3],
}

/// Adaptive trigger effect for one trigger: an effect mode byte plus its
/// parameter block, exactly as the DualSense FFB protocol frames it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerEffect {
    pub mode: u8,
    pub params: [u8; 10],
}

impl TriggerEffect {
    /// Effect that releases the trigger back to its free state.
    pub const OFF: TriggerEffect = TriggerEffect { mode: 0x05, params: [0; 10] };
}

/// Platform hints applied at backend initialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendHints {
    /// Ask the platform not to use its raw-input path (some platforms
    /// double-report pads through both raw and translated input).
    pub disable_raw_input: bool,
    /// Which Sony-specific feature level the session wants; backends use
    /// this to pick report modes / driver hints before opening devices.
    pub sony_features: SonyFeatures,
}

/// Why a device read produced no data. `Gone` is the mid-read unplug — the
/// caller absorbs it into a disconnected snapshot, it is never an error to
/// the polling code. `Backend` is a transient platform failure on a device
/// that is still present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    Gone,
    Backend(String),
}

/// Backend-level failure with a platform message attached.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

pub trait Backend {
    /// Bring the platform layer up. Fatal on error — the session cannot
    /// proceed without it.
    fn initialize(&mut self, hints: &BackendHints) -> Result<(), BackendError>;

    /// Tear the platform layer down. Called once from session stop.
    fn shutdown(&mut self);

    /// Set a named platform hint. Returns false if the hint was rejected.
    fn set_hint(&mut self, name: &str, value: &str) -> bool;

    /// Try to bring up the haptics/audio subsystem, optionally forcing a
    /// specific audio driver. Returns false on failure; the caller reads
    /// `last_error` for diagnostics and moves on to the next fallback.
    fn init_haptics(&mut self, driver: Option<&str>) -> bool;

    /// Name of the currently active audio driver, if the platform reports
    /// one.
    fn audio_driver_name(&self) -> Option<String>;

    /// Most recent platform error message, for diagnostics.
    fn last_error(&self) -> String;

    /// Drain all pending connect/disconnect events since the last drain.
    /// Returns true if any occurred; the session then rebinds every slot.
    fn drain_hotplug(&mut self) -> bool;

    /// Current ordered list of gamepad handles.
    fn devices(&mut self) -> Vec<DeviceId>;

    /// Display name for a device ("DualSense", "XInput Controller", ...).
    fn device_name(&self, device: DeviceId) -> String;

    /// Capability flags for a device.
    fn capabilities(&self, device: DeviceId) -> Capabilities;

    /// Read the current axis values.
    fn read_axes(&mut self, device: DeviceId) -> Result<Axes, ReadError>;

    /// Read the current button mask (bit layout per [`crate::Button`]).
    fn read_buttons(&mut self, device: DeviceId) -> Result<u32, ReadError>;

    /// Read one touchpad finger (0 or 1).
    fn touch_finger(&mut self, device: DeviceId, finger: usize) -> Result<TouchFinger, ReadError>;

    /// Read the motion sensors.
    fn sensors(&mut self, device: DeviceId) -> Result<SensorReading, ReadError>;

    /// Start a rumble effect; replaces any in-flight rumble. Zero magnitude
    /// stops. Returns false if the device is gone or rejects the command.
    fn send_vibration(
        &mut self,
        device: DeviceId,
        left: f32,
        right: f32,
        duration_ms: u32,
    ) -> bool;

    /// Send adaptive trigger effects; replaces any in-flight effect.
    fn send_trigger_effect(
        &mut self,
        device: DeviceId,
        left: TriggerEffect,
        right: TriggerEffect,
    ) -> bool;

    /// Send haptic feedback audio (PCM, device-defined format); replaces any
    /// in-flight haptic audio.
    fn send_haptic_audio(&mut self, device: DeviceId, pcm: &[u8]) -> bool;

    /// Load a controller mapping database from an in-memory buffer.
    fn load_mappings_from_buffer(&mut self, bytes: &[u8]) -> Result<(), BackendError>;

    /// Load a controller mapping database from a file.
    fn load_mappings_from_path(&mut self, path: &Path) -> Result<(), BackendError>;
}
