/// Session manager: the public polling API over a fixed pool of controller
/// slots.
///
/// One session owns the backend, N slots (N fixed at start), the negotiated
/// capability tier and the mapping-database load outcome. All calls are
/// synchronous and meant for one control thread — a game loop polls
/// `poll(i)` once per frame per pad. Every poll runs one hot-plug
/// reconciliation pass first, so plug/unplug state is never stale across
/// slot indices within a frame.

use std::path::Path;

use crate::backend::{Backend, BackendHints, TriggerEffect};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::haptics::{self, CapabilityTier};
use crate::slot::Slot;
use crate::snapshot::Snapshot;

pub struct Session<B: Backend> {
    backend: B,
    config: SessionConfig,
    slots: Vec<Slot>,
    tier: CapabilityTier,
    mappings_loaded: bool,
    started: bool,
}

impl<B: Backend> Session<B> {
    /// Create a session. Nothing touches the platform until `start()`.
    pub fn new(backend: B, config: SessionConfig) -> Session<B> {
        Session {
            backend,
            config,
            slots: Vec::new(),
            tier: CapabilityTier::Disabled,
            mappings_loaded: false,
            started: false,
        }
    }

    /// Bring the session up: initialize the backend with the configured
    /// platform hints, negotiate haptics, load the mapping database
    /// (best-effort) and bind the slot pool to whatever is plugged in.
    ///
    /// Backend initialization failure is fatal to the call. A failed mapping
    /// load or haptics chain is not — both are logged and the session starts
    /// with builtin mappings / a degraded tier.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.started {
            return Err(SessionError::AlreadyStarted);
        }

        let hints = BackendHints {
            disable_raw_input: !self.config.use_raw_input,
            sony_features: self.config.sony_features,
        };
        self.backend
            .initialize(&hints)
            .map_err(|e| SessionError::BackendInit(e.0))?;
        self.started = true;

        self.tier = haptics::negotiate(&mut self.backend, self.config.sony_features);

        self.mappings_loaded = false;
        if let Some(path) = self.config.mappings_path.clone() {
            match self.load_mappings(Path::new(&path)) {
                Ok(()) => self.mappings_loaded = true,
                Err(e) => log::warn!(
                    "Failed to load mappings from \"{path}\": {e}. \
                     Falling back to builtin mappings."
                ),
            }
        }

        // Initialization leaves connection events queued for every pad that
        // was already plugged in; drain them before the first enumeration so
        // the first poll doesn't redo this bind pass.
        let _ = self.backend.drain_hotplug();

        let enhanced = self.tier != CapabilityTier::Disabled;
        self.slots = (0..self.config.max_controllers)
            .map(|i| Slot::new(i, enhanced))
            .collect();
        let devices = self.backend.devices();
        for slot in &mut self.slots {
            slot.rebind(&mut self.backend, &devices);
        }

        log::info!(
            "Session started: {} slots, {} device(s) present, tier {:?}",
            self.slots.len(),
            devices.len(),
            self.tier
        );
        Ok(())
    }

    /// Release every slot binding and shut the backend down.
    ///
    /// Idempotent: stopping a session that is not started is a no-op, so
    /// callers can stop unconditionally on the way out.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        for slot in &mut self.slots {
            slot.release();
        }
        self.slots.clear();
        self.backend.shutdown();
        self.tier = CapabilityTier::Disabled;
        self.mappings_loaded = false;
        self.started = false;
        log::info!("Session stopped");
    }

    /// Snapshot the slot at `index`, reconciling hot-plug state first.
    ///
    /// An out-of-range index yields the shared disconnected snapshot, not an
    /// error — only polling before `start()` errors. A pad that vanishes
    /// mid-read also yields the disconnected snapshot; the hot path never
    /// needs error handling for hardware transience.
    pub fn poll(&mut self, index: usize) -> Result<Snapshot, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        if index >= self.slots.len() {
            return Ok(Snapshot::disconnected());
        }
        self.reconcile()?;
        Ok(self.slots[index].snapshot(&mut self.backend))
    }

    /// Drain pending connect/disconnect events; if any occurred, rebind
    /// every slot from one fresh enumeration. Rebinding the whole pool is
    /// O(N) per event burst, which buys a guarantee: no stale binding
    /// survives a compound plug/unplug burst, whatever order the events
    /// arrived in.
    pub fn reconcile(&mut self) -> Result<bool, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        if !self.backend.drain_hotplug() {
            return Ok(false);
        }
        let devices = self.backend.devices();
        log::debug!("Hot-plug events drained; rebinding against {} device(s)", devices.len());
        for slot in &mut self.slots {
            slot.rebind(&mut self.backend, &devices);
        }
        Ok(true)
    }

    /// Live count of backend-enumerated gamepads. May disagree with the
    /// number of bound slots until the next `reconcile`/`poll`, and may
    /// exceed the slot count when more pads are plugged in than the session
    /// tracks.
    pub fn device_count(&mut self) -> Result<usize, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        Ok(self.backend.devices().len())
    }

    /// Rumble the pad at `index`. Cancels and replaces any in-flight rumble;
    /// zero magnitude stops. Returns false — not an error — when the slot is
    /// unbound, out of range, or the device rejects the command.
    pub fn vibrate(
        &mut self,
        index: usize,
        left: f32,
        right: f32,
        duration_ms: u32,
    ) -> Result<bool, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        match self.slots.get_mut(index) {
            Some(slot) => Ok(slot.vibrate(&mut self.backend, left, right, duration_ms)),
            None => Ok(false),
        }
    }

    /// Send adaptive trigger effects to the pad at `index`. Same result
    /// semantics as [`vibrate`](Session::vibrate).
    pub fn send_trigger_effect(
        &mut self,
        index: usize,
        left: TriggerEffect,
        right: TriggerEffect,
    ) -> Result<bool, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        match self.slots.get_mut(index) {
            Some(slot) => Ok(slot.send_trigger_effect(&mut self.backend, left, right)),
            None => Ok(false),
        }
    }

    /// Send haptic feedback audio to the pad at `index`. Same result
    /// semantics as [`vibrate`](Session::vibrate).
    pub fn send_haptic_audio(&mut self, index: usize, pcm: &[u8]) -> Result<bool, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        match self.slots.get_mut(index) {
            Some(slot) => Ok(slot.send_haptic_audio(&mut self.backend, pcm)),
            None => Ok(false),
        }
    }

    /// Whether the pad at `index` reports a touchpad. False when unbound or
    /// out of range. The flag is cached at bind time, not re-queried.
    pub fn supports_touchpad(&self, index: usize) -> Result<bool, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        Ok(self.slots.get(index).is_some_and(Slot::supports_touchpad))
    }

    /// Whether the pad at `index` reports motion sensors.
    pub fn supports_sensor(&self, index: usize) -> Result<bool, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        Ok(self.slots.get(index).is_some_and(Slot::supports_sensor))
    }

    /// Whether the pad at `index` reports haptic feedback support.
    pub fn supports_haptics(&self, index: usize) -> Result<bool, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        Ok(self.slots.get(index).is_some_and(Slot::supports_haptics))
    }

    /// Set a named backend hint. Usable before `start()` — some hints only
    /// take effect if set before the backend initializes.
    pub fn set_hint(&mut self, name: &str, value: &str) -> bool {
        self.backend.set_hint(name, value)
    }

    /// Load a controller mapping database. Depending on configuration the
    /// file is read into memory and handed to the backend as a buffer
    /// (needed when the database ships inside an archive) or passed through
    /// as a path.
    pub fn load_mappings(&mut self, path: &Path) -> Result<(), SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        let result = if self.config.load_mappings_in_memory {
            let bytes = std::fs::read(path)
                .map_err(|e| SessionError::MappingLoad(e.to_string()))?;
            self.backend.load_mappings_from_buffer(&bytes)
        } else {
            self.backend.load_mappings_from_path(path)
        };
        result.map_err(|e| SessionError::MappingLoad(e.0))
    }

    /// The capability tier negotiation landed on.
    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    /// Whether the configured mapping database loaded at start. False also
    /// means "running on builtin mappings", which is not an error state.
    pub fn mappings_loaded(&self) -> bool {
        self.mappings_loaded
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}
