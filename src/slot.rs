/// One fixed-index binding point for at most one physical controller.
///
/// A slot is created once at session start and lives until session stop; it
/// is rebound (never recreated) as devices come and go. It owns the only
/// mutable polling state in the engine: the button mask from the previous
/// poll, which the snapshot path diffs against and then overwrites. That
/// makes edge detection consumed, not idempotent — two back-to-back
/// snapshots with no backend change show no just-pressed buttons on the
/// second call.

use crate::backend::{Backend, Capabilities, DeviceId, ReadError, TriggerEffect};
use crate::buttons;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone)]
struct Binding {
    device: DeviceId,
    name: String,
    caps: Capabilities,
}

pub(crate) struct Slot {
    index: usize,
    /// Sony feature level above Off was negotiated for this session; only
    /// then are touch/sensor blocks attached to snapshots.
    enhanced: bool,
    binding: Option<Binding>,
    prev_buttons: u32,
}

impl Slot {
    pub fn new(index: usize, enhanced: bool) -> Slot {
        Slot { index, enhanced, binding: None, prev_buttons: 0 }
    }

    /// Re-synchronize with the backend's current device list: bind the
    /// device at this slot's position, or unbind if there is none. Name and
    /// capabilities are queried here, once, not per poll.
    pub fn rebind<B: Backend>(&mut self, backend: &mut B, devices: &[DeviceId]) {
        let next = devices.get(self.index).copied();
        match next {
            Some(device) => {
                let same = self.binding.as_ref().is_some_and(|b| b.device == device);
                let name = backend.device_name(device);
                let caps = backend.capabilities(device);
                if !same {
                    log::info!("slot {} bound to \"{name}\" (caps {caps:?})", self.index);
                    self.prev_buttons = 0;
                }
                self.binding = Some(Binding { device, name, caps });
            }
            None => {
                if self.binding.is_some() {
                    log::info!("slot {} unbound", self.index);
                }
                self.release();
            }
        }
    }

    /// Drop the device binding and its polling state.
    pub fn release(&mut self) {
        self.binding = None;
        self.prev_buttons = 0;
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn supports_touchpad(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.caps.touchpad)
    }

    pub fn supports_sensor(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.caps.sensor)
    }

    pub fn supports_haptics(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.caps.haptics)
    }

    /// Produce an immutable snapshot of the slot's current state.
    ///
    /// A device that vanishes mid-read is absorbed: the slot unbinds itself
    /// and the shared disconnected snapshot is returned — never an error,
    /// never partially-read data. A transient backend failure on a
    /// still-present device also yields the disconnected snapshot but keeps
    /// the binding.
    pub fn snapshot<B: Backend>(&mut self, backend: &mut B) -> Snapshot {
        let (device, name, caps) = match &self.binding {
            Some(b) => (b.device, b.name.clone(), b.caps),
            None => return Snapshot::disconnected(),
        };

        let axes = match backend.read_axes(device) {
            Ok(axes) => axes,
            Err(e) => return self.absorb_read_error(e),
        };
        let current = match backend.read_buttons(device) {
            Ok(mask) => mask,
            Err(e) => return self.absorb_read_error(e),
        };

        let just = buttons::just_pressed(self.prev_buttons, current);
        self.prev_buttons = current;

        let touch = if self.enhanced && caps.touchpad {
            [backend.touch_finger(device, 0).ok(), backend.touch_finger(device, 1).ok()]
        } else {
            [None, None]
        };
        let sensors = if self.enhanced && caps.sensor { backend.sensors(device).ok() } else { None };

        Snapshot::connected(name, axes, current, just, touch, sensors)
    }

    fn absorb_read_error(&mut self, e: ReadError) -> Snapshot {
        match e {
            ReadError::Gone => {
                log::info!("slot {} device vanished mid-read", self.index);
                self.release();
            }
            ReadError::Backend(msg) => {
                log::warn!("slot {} read failed: {msg}", self.index);
            }
        }
        Snapshot::disconnected()
    }

    /// Fire-and-forget rumble; replaces any in-flight rumble on the device.
    pub fn vibrate<B: Backend>(
        &mut self,
        backend: &mut B,
        left: f32,
        right: f32,
        duration_ms: u32,
    ) -> bool {
        match &self.binding {
            Some(b) => backend.send_vibration(b.device, left, right, duration_ms),
            None => false,
        }
    }

    pub fn send_trigger_effect<B: Backend>(
        &mut self,
        backend: &mut B,
        left: TriggerEffect,
        right: TriggerEffect,
    ) -> bool {
        match &self.binding {
            Some(b) => backend.send_trigger_effect(b.device, left, right),
            None => false,
        }
    }

    pub fn send_haptic_audio<B: Backend>(&mut self, backend: &mut B, pcm: &[u8]) -> bool {
        match &self.binding {
            Some(b) => backend.send_haptic_audio(b.device, pcm),
            None => false,
        }
    }
}
