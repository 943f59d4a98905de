/// HID implementation of the backend contract for Sony pads.
///
/// Covers DualSense, DualSense Edge and both DualShock 4 revisions over USB
/// and Bluetooth. Input report formats:
///
/// DualSense USB: report ID 0x01, 64 bytes
///   +0..+3   left stick X/Y, right stick X/Y
///   +4..+5   L2/R2 analog
///   +6       sequence counter
///   +7..+10  button bytes 0-3 (hat+face / shoulders+menu / ps+pad+mute /
///            Edge paddles)
///   +15..+20 gyro pitch/yaw/roll (i16 LE)
///   +21..+26 accel X/Y/Z (i16 LE)
///   +32..+39 touch fingers 0 and 1 (4 bytes each: id/active, 12-bit X, Y)
///   (offsets relative to the byte after the report ID)
///
/// DualSense BT extended: report ID 0x31, one pad byte, then the USB
/// payload; last 4 bytes CRC-32 (seed 0xA1).
///
/// DS4 USB: report ID 0x01, 64 bytes
///   +0..+3  sticks, +4..+6 button bytes, +7..+8 triggers,
///   +12..+17 gyro, +18..+23 accel, +34..+41 touch fingers
///
/// DS4 BT extended: report ID 0x11, two pad bytes, then the USB payload;
/// last 4 bytes CRC-32.
///
/// Output reports carry rumble and (DualSense only) adaptive trigger effect
/// blocks; Bluetooth variants get a trailing CRC-32 (seed 0xA2). Raw HID
/// rumble has no duration field — magnitudes hold until the next command,
/// and a zero-magnitude command stops.
///
/// There is no audio subsystem behind raw HID, so `init_haptics` and
/// `send_haptic_audio` always report failure; capability negotiation lands
/// on the degraded tier with this backend.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;

use hidapi::{BusType, HidApi, HidDevice};

use crate::backend::{
    Axes, Backend, BackendError, BackendHints, Capabilities, DeviceId, ReadError, SensorReading,
    TouchFinger, TriggerEffect,
};
use crate::buttons::Button;
use crate::crc32;

const SONY_VID: u16 = 0x054C;
const DUALSENSE_PID: u16 = 0x0CE6;
const DUALSENSE_EDGE_PID: u16 = 0x0DF2;
const DS4_V1_PID: u16 = 0x05C4;
const DS4_V2_PID: u16 = 0x09CC;

/// HID usage page and usage for gamepad collections.
const GAMEPAD_USAGE_PAGE: u16 = 0x01; // Generic Desktop
const GAMEPAD_USAGE: u16 = 0x05; // Game Pad

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PadModel {
    DualSense,
    DualSenseEdge,
    Ds4V1,
    Ds4V2,
}

impl PadModel {
    /// Identify a pad from VID/PID. None for devices this backend doesn't
    /// drive.
    fn identify(vid: u16, pid: u16) -> Option<PadModel> {
        if vid != SONY_VID {
            return None;
        }
        match pid {
            DUALSENSE_PID => Some(PadModel::DualSense),
            DUALSENSE_EDGE_PID => Some(PadModel::DualSenseEdge),
            DS4_V1_PID => Some(PadModel::Ds4V1),
            DS4_V2_PID => Some(PadModel::Ds4V2),
            _ => None,
        }
    }

    fn is_dualsense(self) -> bool {
        matches!(self, PadModel::DualSense | PadModel::DualSenseEdge)
    }

    fn name(self) -> &'static str {
        match self {
            PadModel::DualSense => "DualSense",
            PadModel::DualSenseEdge => "DualSense Edge",
            PadModel::Ds4V1 => "DualShock 4 v1",
            PadModel::Ds4V2 => "DualShock 4 v2",
        }
    }

    fn capabilities(self) -> Capabilities {
        Capabilities {
            touchpad: true,
            sensor: true,
            // Haptic feedback audio is a DualSense feature.
            haptics: self.is_dualsense(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Usb,
    Bluetooth,
}

/// The bus type the platform reports decides the report framing; hidapi
/// knows it on every platform, unlike device path formats. An unknown bus
/// is treated as USB, and the first parsed input report corrects a wrong
/// guess (Bluetooth extended reports announce themselves by report ID).
fn transport_from_bus(bus: BusType) -> Transport {
    match bus {
        BusType::Bluetooth => Transport::Bluetooth,
        _ => Transport::Usb,
    }
}

/// One supported pad in the platform's current device list.
struct PresentPad {
    path: String,
    model: PadModel,
    transport: Transport,
}

/// Everything parsed out of one input report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PadInput {
    axes: Axes,
    buttons: u32,
    touch: [TouchFinger; 2],
    sensors: SensorReading,
}

struct OpenPad {
    id: DeviceId,
    device: HidDevice,
    path: String,
    model: PadModel,
    transport: Transport,
    last: PadInput,
    gone: bool,
}

/// Device ids come from a monotonic counter at open time and die with the
/// pad: an id is never reused for a different physical device, which is
/// what lets slots compare ids across hot-plug drains to tell "same pad"
/// from "replacement pad".
#[derive(Default)]
pub struct HidBackend {
    api: Option<HidApi>,
    pads: Vec<OpenPad>,
    next_id: DeviceId,
    hints: HashMap<String, String>,
    last_error: String,
    mapping_count: usize,
}

impl HidBackend {
    pub fn new() -> HidBackend {
        HidBackend::default()
    }

    /// All supported pads the platform currently reports, in enumeration
    /// order.
    fn present_pads(api: &HidApi) -> Vec<PresentPad> {
        let mut found = Vec::new();
        for dev in api.device_list() {
            if dev.usage_page() != GAMEPAD_USAGE_PAGE || dev.usage() != GAMEPAD_USAGE {
                continue;
            }
            if let Some(model) = PadModel::identify(dev.vendor_id(), dev.product_id()) {
                found.push(PresentPad {
                    path: dev.path().to_string_lossy().into_owned(),
                    model,
                    transport: transport_from_bus(dev.bus_type()),
                });
            }
        }
        found
    }

    fn open_pad(api: &HidApi, found: &PresentPad, id: DeviceId) -> Result<OpenPad, String> {
        let cpath =
            CString::new(found.path.as_bytes()).map_err(|_| "invalid device path".to_string())?;
        let device = api.open_path(&cpath).map_err(|e| e.to_string())?;
        device.set_blocking_mode(false).map_err(|e| e.to_string())?;

        if found.transport == Transport::Bluetooth {
            // Reading the pairing feature report switches the pad from the
            // simplified BT report to the full extended report.
            let report_id = if found.model.is_dualsense() { 0x05 } else { 0x02 };
            let mut buf = [0u8; 64];
            buf[0] = report_id;
            if let Err(e) = device.get_feature_report(&mut buf) {
                log::warn!("BT extended mode activation failed for {}: {e}", found.model.name());
            }
        }

        log::info!("Opened {} ({:?}) at {}", found.model.name(), found.transport, found.path);
        Ok(OpenPad {
            id,
            device,
            path: found.path.clone(),
            model: found.model,
            transport: found.transport,
            last: PadInput::default(),
            gone: false,
        })
    }

    /// Rebuild the pad list from the platform's current view, carrying
    /// already-open pads (and their ids) over and opening the rest under
    /// fresh ids.
    fn rescan(&mut self) {
        let Some(api) = &self.api else {
            self.pads.clear();
            return;
        };
        let present = Self::present_pads(api);
        let open: Vec<(String, bool)> =
            self.pads.iter().map(|p| (p.path.clone(), p.gone)).collect();
        let paths: Vec<String> = present.iter().map(|p| p.path.clone()).collect();
        let plan = plan_rescan(&open, &paths);

        let mut old: Vec<Option<OpenPad>> =
            std::mem::take(&mut self.pads).into_iter().map(Some).collect();
        for (found, kept) in present.into_iter().zip(plan) {
            match kept.and_then(|i| old[i].take()) {
                Some(pad) => self.pads.push(pad),
                None => {
                    let id = self.next_id;
                    match Self::open_pad(api, &found, id) {
                        Ok(pad) => {
                            self.next_id += 1;
                            self.pads.push(pad);
                        }
                        Err(e) => {
                            log::warn!("Failed to open {} at {}: {e}", found.model.name(), found.path);
                            self.last_error = e;
                        }
                    }
                }
            }
        }
    }

    fn pad_index(&self, id: DeviceId) -> Option<usize> {
        self.pads.iter().position(|p| p.id == id)
    }

    fn pad_mut(&mut self, id: DeviceId) -> Option<&mut OpenPad> {
        let idx = self.pad_index(id)?;
        self.pads.get_mut(idx)
    }

    /// Whether the platform still lists a device at `path`. An indeterminate
    /// refresh counts as present, which keeps the failure transient.
    fn path_present(&mut self, path: &str) -> bool {
        let Some(api) = &mut self.api else {
            return false;
        };
        if api.refresh_devices().is_err() {
            return true;
        }
        Self::present_pads(api).iter().any(|p| p.path == path)
    }

    /// Drain queued input reports for one pad, keeping the newest parsed
    /// state. A read failure on a pad the platform no longer lists marks it
    /// gone.
    fn pump(&mut self, id: DeviceId) -> Result<(), ReadError> {
        let Some(idx) = self.pad_index(id) else {
            return Err(ReadError::Gone);
        };
        if self.pads[idx].gone {
            return Err(ReadError::Gone);
        }

        let mut buf = [0u8; 128];
        let mut failure = None;
        let pad = &mut self.pads[idx];
        loop {
            match pad.device.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => match parse_input(pad.model, &buf[..n]) {
                    Ok((input, transport)) => {
                        pad.last = input;
                        // The report format is ground truth for the
                        // transport; correct a wrong bus-type guess.
                        pad.transport = transport;
                    }
                    Err(e) => log::debug!("Dropped input report: {e}"),
                },
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }
        let Some(msg) = failure else {
            return Ok(());
        };

        // Read errors don't say whether the device left; a fresh device
        // list does, on every platform.
        let path = self.pads[idx].path.clone();
        match classify_read_failure(self.path_present(&path), msg) {
            ReadError::Backend(msg) => {
                self.last_error = msg.clone();
                Err(ReadError::Backend(msg))
            }
            gone => {
                self.pads[idx].gone = true;
                Err(gone)
            }
        }
    }

    fn write_report(&mut self, id: DeviceId, report: &[u8]) -> bool {
        let Some(pad) = self.pad_mut(id) else {
            return false;
        };
        match pad.device.write(report) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("HID write failed: {e}");
                self.last_error = e.to_string();
                false
            }
        }
    }
}

/// Match each present path against the already-open pads: `Some(i)` carries
/// pad `i` (and its id) over, `None` opens fresh under a new id. A pad
/// marked gone is never carried over, so its id retires with it and a
/// replacement at the same path is a different device to the session.
fn plan_rescan(open: &[(String, bool)], present: &[String]) -> Vec<Option<usize>> {
    let mut taken = vec![false; open.len()];
    present
        .iter()
        .map(|path| {
            let hit =
                (0..open.len()).find(|&i| !taken[i] && !open[i].1 && open[i].0 == *path);
            if let Some(i) = hit {
                taken[i] = true;
            }
            hit
        })
        .collect()
}

/// A failed read on a device the platform no longer lists is an unplug; on
/// a still-listed device it is a transient failure.
fn classify_read_failure(still_present: bool, msg: String) -> ReadError {
    if still_present {
        ReadError::Backend(msg)
    } else {
        ReadError::Gone
    }
}

impl Backend for HidBackend {
    fn initialize(&mut self, hints: &BackendHints) -> Result<(), BackendError> {
        // Raw-input and Sony-mode hints are already honored by driving the
        // pads directly over HID; they are recorded for diagnostics.
        log::debug!("Initializing HID backend (hints: {hints:?})");
        let api = HidApi::new().map_err(|e| {
            self.last_error = e.to_string();
            BackendError(e.to_string())
        })?;
        self.api = Some(api);
        self.rescan();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.pads.clear();
        self.api = None;
    }

    fn set_hint(&mut self, name: &str, value: &str) -> bool {
        self.hints.insert(name.to_string(), value.to_string());
        true
    }

    fn init_haptics(&mut self, driver: Option<&str>) -> bool {
        self.last_error = match driver {
            Some(d) => format!("no audio subsystem behind raw HID (driver \"{d}\" requested)"),
            None => "no audio subsystem behind raw HID".to_string(),
        };
        false
    }

    fn audio_driver_name(&self) -> Option<String> {
        None
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn drain_hotplug(&mut self) -> bool {
        let Some(api) = &mut self.api else {
            return false;
        };
        if let Err(e) = api.refresh_devices() {
            log::warn!("Device list refresh failed: {e}");
            self.last_error = e.to_string();
            return false;
        }
        let present: Vec<String> =
            Self::present_pads(api).into_iter().map(|p| p.path).collect();
        let known: Vec<&str> =
            self.pads.iter().filter(|p| !p.gone).map(|p| p.path.as_str()).collect();
        let changed = present.len() != known.len()
            || !present.iter().all(|path| known.contains(&path.as_str()));
        if changed {
            self.rescan();
        }
        changed
    }

    fn devices(&mut self) -> Vec<DeviceId> {
        self.pads.iter().filter(|p| !p.gone).map(|p| p.id).collect()
    }

    fn device_name(&self, device: DeviceId) -> String {
        self.pad_index(device)
            .map(|i| self.pads[i].model.name().to_string())
            .unwrap_or_default()
    }

    fn capabilities(&self, device: DeviceId) -> Capabilities {
        self.pad_index(device)
            .map(|i| self.pads[i].model.capabilities())
            .unwrap_or_default()
    }

    fn read_axes(&mut self, device: DeviceId) -> Result<Axes, ReadError> {
        self.pump(device)?;
        let idx = self.pad_index(device).ok_or(ReadError::Gone)?;
        Ok(self.pads[idx].last.axes)
    }

    fn read_buttons(&mut self, device: DeviceId) -> Result<u32, ReadError> {
        self.pump(device)?;
        let idx = self.pad_index(device).ok_or(ReadError::Gone)?;
        Ok(self.pads[idx].last.buttons)
    }

    fn touch_finger(&mut self, device: DeviceId, finger: usize) -> Result<TouchFinger, ReadError> {
        // Touch rides on the same input report as axes/buttons; the pump in
        // read_axes already refreshed it for this poll.
        match self.pad_index(device).map(|i| &self.pads[i]) {
            Some(pad) if !pad.gone => {
                Ok(pad.last.touch.get(finger).copied().unwrap_or_default())
            }
            _ => Err(ReadError::Gone),
        }
    }

    fn sensors(&mut self, device: DeviceId) -> Result<SensorReading, ReadError> {
        match self.pad_index(device).map(|i| &self.pads[i]) {
            Some(pad) if !pad.gone => Ok(pad.last.sensors),
            _ => Err(ReadError::Gone),
        }
    }

    fn send_vibration(
        &mut self,
        device: DeviceId,
        left: f32,
        right: f32,
        _duration_ms: u32,
    ) -> bool {
        let Some(pad) = self.pad_index(device).map(|i| &self.pads[i]) else {
            return false;
        };
        if pad.gone {
            return false;
        }
        let report = build_output_report(
            pad.model,
            pad.transport,
            &OutputState {
                rumble_left: to_byte(left),
                rumble_right: to_byte(right),
                ..OutputState::default()
            },
        );
        self.write_report(device, &report)
    }

    fn send_trigger_effect(
        &mut self,
        device: DeviceId,
        left: TriggerEffect,
        right: TriggerEffect,
    ) -> bool {
        let Some(pad) = self.pad_index(device).map(|i| &self.pads[i]) else {
            return false;
        };
        if pad.gone {
            return false;
        }
        if !pad.model.is_dualsense() {
            self.last_error = "adaptive triggers need a DualSense".to_string();
            return false;
        }
        let report = build_output_report(
            pad.model,
            pad.transport,
            &OutputState { trigger_left: Some(left), trigger_right: Some(right), ..OutputState::default() },
        );
        self.write_report(device, &report)
    }

    fn send_haptic_audio(&mut self, _device: DeviceId, _pcm: &[u8]) -> bool {
        self.last_error = "haptic audio needs an audio subsystem".to_string();
        false
    }

    fn load_mappings_from_buffer(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| BackendError("mapping database is not UTF-8".to_string()))?;
        let count = count_mapping_lines(text)?;
        self.mapping_count = count;
        log::info!("Loaded {count} controller mapping(s)");
        Ok(())
    }

    fn load_mappings_from_path(&mut self, path: &Path) -> Result<(), BackendError> {
        let bytes = std::fs::read(path).map_err(|e| BackendError(e.to_string()))?;
        self.load_mappings_from_buffer(&bytes)
    }
}

/// Validate an SDL_GameControllerDB-format buffer and count its entries.
/// Lines are `guid,name,field:value,...`; comments and blanks are skipped.
fn count_mapping_lines(text: &str) -> Result<usize, BackendError> {
    let mut count = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split(',');
        let guid = fields.next().unwrap_or_default();
        let name = fields.next();
        let has_mapping = fields.next().is_some();
        if guid.len() >= 4 && guid.chars().all(|c| c.is_ascii_hexdigit()) && name.is_some() && has_mapping
        {
            count += 1;
        }
    }
    if count == 0 {
        return Err(BackendError("no valid mapping lines in database".to_string()));
    }
    Ok(count)
}

fn to_byte(magnitude: f32) -> u8 {
    (magnitude.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Normalize a raw stick byte to -1..1. Sony reports Y with 0 at the top,
/// so Y is flipped to the y-up convention of the backend contract.
fn norm_stick(raw: u8) -> f32 {
    ((raw as f32 - 128.0) / 127.0).clamp(-1.0, 1.0)
}

fn norm_stick_y(raw: u8) -> f32 {
    ((128.0 - raw as f32) / 127.0).clamp(-1.0, 1.0)
}

fn norm_trigger(raw: u8) -> f32 {
    raw as f32 / 255.0
}

/// Map the three standard Sony button bytes (plus the DualSense Edge paddle
/// byte) onto the crate's button mask.
/// `b0`: hat (low nibble) + square/cross/circle/triangle.
/// `b1`: L1/R1/L2/R2/share/options/L3/R3.
/// `b2`: PS/touchpad click/mute.
/// `b3`: Edge back buttons.
fn map_buttons(b0: u8, b1: u8, b2: u8, b3: u8) -> u32 {
    let mut mask = 0u32;
    let mut set = |on: bool, button: Button| {
        if on {
            mask |= button.bit();
        }
    };

    // Hat: 0 = up, clockwise, 8+ = released.
    let hat = b0 & 0x0F;
    set(matches!(hat, 7 | 0 | 1), Button::DpadUp);
    set(matches!(hat, 1 | 2 | 3), Button::DpadRight);
    set(matches!(hat, 3 | 4 | 5), Button::DpadDown);
    set(matches!(hat, 5 | 6 | 7), Button::DpadLeft);

    set(b0 & 0x10 != 0, Button::X); // square
    set(b0 & 0x20 != 0, Button::A); // cross
    set(b0 & 0x40 != 0, Button::B); // circle
    set(b0 & 0x80 != 0, Button::Y); // triangle

    set(b1 & 0x01 != 0, Button::LeftBumper);
    set(b1 & 0x02 != 0, Button::RightBumper);
    // 0x04 / 0x08 are the digital trigger bits; the analog axes cover them.
    set(b1 & 0x10 != 0, Button::Back); // share / create
    set(b1 & 0x20 != 0, Button::Start); // options
    set(b1 & 0x40 != 0, Button::LeftStick);
    set(b1 & 0x80 != 0, Button::RightStick);

    set(b2 & 0x01 != 0, Button::Guide); // PS
    set(b2 & 0x02 != 0, Button::Touchpad);
    set(b2 & 0x04 != 0, Button::Misc1); // mute

    set(b3 & 0x10 != 0, Button::Paddle1);
    set(b3 & 0x20 != 0, Button::Paddle2);
    set(b3 & 0x40 != 0, Button::Paddle3);
    set(b3 & 0x80 != 0, Button::Paddle4);

    mask
}

fn parse_touch(block: &[u8]) -> TouchFinger {
    TouchFinger {
        id: block[0] & 0x7F,
        down: block[0] & 0x80 == 0,
        x: block[1] as u16 | (((block[2] & 0x0F) as u16) << 8),
        y: ((block[2] >> 4) as u16) | ((block[3] as u16) << 4),
    }
}

fn read_i16(data: &[u8], at: usize) -> f32 {
    i16::from_le_bytes([data[at], data[at + 1]]) as f32
}

/// Parse a DualSense payload, `data` starting at the byte after the report
/// ID (and any BT header pad).
fn parse_dualsense_payload(data: &[u8]) -> Result<PadInput, String> {
    if data.len() < 41 {
        return Err(format!("DualSense payload too short: {}", data.len()));
    }
    Ok(PadInput {
        axes: Axes {
            left_x: norm_stick(data[0]),
            left_y: norm_stick_y(data[1]),
            right_x: norm_stick(data[2]),
            right_y: norm_stick_y(data[3]),
            left_trigger: norm_trigger(data[4]),
            right_trigger: norm_trigger(data[5]),
        },
        buttons: map_buttons(data[7], data[8], data[9], data[10]),
        sensors: SensorReading {
            gyro: [read_i16(data, 15), read_i16(data, 17), read_i16(data, 19)],
            accel: [read_i16(data, 21), read_i16(data, 23), read_i16(data, 25)],
        },
        touch: [parse_touch(&data[32..36]), parse_touch(&data[36..40])],
    })
}

/// Parse a DS4 payload, same offset convention as the DualSense parser.
fn parse_ds4_payload(data: &[u8]) -> Result<PadInput, String> {
    if data.len() < 44 {
        return Err(format!("DS4 payload too short: {}", data.len()));
    }
    Ok(PadInput {
        axes: Axes {
            left_x: norm_stick(data[0]),
            left_y: norm_stick_y(data[1]),
            right_x: norm_stick(data[2]),
            right_y: norm_stick_y(data[3]),
            left_trigger: norm_trigger(data[7]),
            right_trigger: norm_trigger(data[8]),
        },
        buttons: map_buttons(data[4], data[5], data[6], 0),
        sensors: SensorReading {
            gyro: [read_i16(data, 12), read_i16(data, 14), read_i16(data, 16)],
            accel: [read_i16(data, 18), read_i16(data, 20), read_i16(data, 22)],
        },
        touch: [parse_touch(&data[35..39]), parse_touch(&data[39..43])],
    })
}

/// Dispatch on the report ID, which also reveals the actual transport.
fn parse_input(model: PadModel, raw: &[u8]) -> Result<(PadInput, Transport), String> {
    if raw.is_empty() {
        return Err("empty report".to_string());
    }
    let (payload_at, transport, bt) = match (model.is_dualsense(), raw[0]) {
        (true, 0x01) => (1, Transport::Usb, false),
        (true, 0x31) => (2, Transport::Bluetooth, true),
        (false, 0x01) => (1, Transport::Usb, false),
        (false, 0x11) => (3, Transport::Bluetooth, true),
        (_, id) => return Err(format!("unexpected report ID 0x{id:02X}")),
    };
    if bt && !crc32::validate(crc32::SEED_INPUT, raw) {
        return Err("input report CRC mismatch".to_string());
    }
    let end = if bt { raw.len().saturating_sub(4) } else { raw.len() };
    let payload = raw.get(payload_at..end).ok_or("report truncated")?;
    let input = if model.is_dualsense() {
        parse_dualsense_payload(payload)?
    } else {
        parse_ds4_payload(payload)?
    };
    Ok((input, transport))
}

/// Desired output state for one report.
#[derive(Debug, Clone, Copy, Default)]
struct OutputState {
    rumble_left: u8,
    rumble_right: u8,
    trigger_left: Option<TriggerEffect>,
    trigger_right: Option<TriggerEffect>,
}

fn build_output_report(model: PadModel, transport: Transport, state: &OutputState) -> Vec<u8> {
    match (model.is_dualsense(), transport) {
        (true, Transport::Usb) => build_dualsense_report(state, false),
        (true, Transport::Bluetooth) => build_dualsense_report(state, true),
        (false, Transport::Usb) => build_ds4_usb(state),
        (false, Transport::Bluetooth) => build_ds4_bt(state),
    }
}

/// DualSense output report. USB: ID 0x02, 48 bytes. BT: ID 0x31 with a tag
/// byte, 78 bytes, trailing CRC. The payload layout is shared; BT shifts it
/// by one.
fn build_dualsense_report(state: &OutputState, bt: bool) -> Vec<u8> {
    let (len, off) = if bt { (78, 2) } else { (48, 1) };
    let mut buf = vec![0u8; len];
    if bt {
        buf[0] = 0x31;
        buf[1] = 0x02; // data tag
    } else {
        buf[0] = 0x02;
    }
    // valid_flag0: 0x01 rumble, 0x02 right trigger, 0x04 left trigger
    let mut flag0 = 0x01u8;
    if state.trigger_right.is_some() {
        flag0 |= 0x02;
    }
    if state.trigger_left.is_some() {
        flag0 |= 0x04;
    }
    buf[off] = flag0;
    buf[off + 2] = state.rumble_right;
    buf[off + 3] = state.rumble_left;
    if let Some(effect) = state.trigger_right {
        buf[off + 10] = effect.mode;
        buf[off + 11..off + 21].copy_from_slice(&effect.params);
    }
    if let Some(effect) = state.trigger_left {
        buf[off + 21] = effect.mode;
        buf[off + 22..off + 32].copy_from_slice(&effect.params);
    }
    if bt {
        crc32::stamp(crc32::SEED_OUTPUT, &mut buf);
    }
    buf
}

/// DS4 USB output report: ID 0x05, 32 bytes, rumble only.
fn build_ds4_usb(state: &OutputState) -> Vec<u8> {
    let mut buf = vec![0u8; 32];
    buf[0] = 0x05;
    buf[1] = 0x01; // enable rumble
    buf[4] = state.rumble_right;
    buf[5] = state.rumble_left;
    buf
}

/// DS4 BT output report: ID 0x11, 79 bytes, trailing CRC.
fn build_ds4_bt(state: &OutputState) -> Vec<u8> {
    let mut buf = vec![0u8; 79];
    buf[0] = 0x11;
    buf[1] = 0x80; // HID output flag
    buf[3] = 0x01; // enable rumble
    buf[6] = state.rumble_right;
    buf[7] = state.rumble_left;
    crc32::stamp(crc32::SEED_OUTPUT, &mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_known_pads() {
        assert_eq!(PadModel::identify(0x054C, 0x0CE6), Some(PadModel::DualSense));
        assert_eq!(PadModel::identify(0x054C, 0x0DF2), Some(PadModel::DualSenseEdge));
        assert_eq!(PadModel::identify(0x054C, 0x05C4), Some(PadModel::Ds4V1));
        assert_eq!(PadModel::identify(0x054C, 0x09CC), Some(PadModel::Ds4V2));
        assert_eq!(PadModel::identify(0x054C, 0x0000), None);
        assert_eq!(PadModel::identify(0x045E, 0x0CE6), None);
    }

    #[test]
    fn ds4_has_no_haptic_audio() {
        assert!(PadModel::DualSense.capabilities().haptics);
        assert!(!PadModel::Ds4V2.capabilities().haptics);
        assert!(PadModel::Ds4V2.capabilities().touchpad);
    }

    #[test]
    fn bus_type_decides_transport() {
        assert_eq!(transport_from_bus(BusType::Bluetooth), Transport::Bluetooth);
        assert_eq!(transport_from_bus(BusType::Usb), Transport::Usb);
        // An unreported bus falls back to USB framing; the first parsed
        // input report corrects the guess.
        assert_eq!(transport_from_bus(BusType::Unknown), Transport::Usb);
    }

    #[test]
    fn rescan_plan_carries_open_pads_and_retires_gone_ones() {
        let open = vec![
            ("/dev/hidraw0".to_string(), false),
            ("/dev/hidraw1".to_string(), true),
        ];
        let present = vec![
            "/dev/hidraw0".to_string(),
            "/dev/hidraw1".to_string(),
            "/dev/hidraw2".to_string(),
        ];
        // hidraw0 survives with its id; hidraw1's pad was gone, so its
        // replacement opens fresh under a new id; hidraw2 is brand new.
        assert_eq!(plan_rescan(&open, &present), vec![Some(0), None, None]);
    }

    #[test]
    fn rescan_plan_consumes_each_pad_once() {
        let open = vec![("/dev/hidraw0".to_string(), false)];
        let present = vec!["/dev/hidraw0".to_string(), "/dev/hidraw0".to_string()];
        assert_eq!(plan_rescan(&open, &present), vec![Some(0), None]);
    }

    #[test]
    fn read_failure_on_absent_device_is_an_unplug() {
        assert_eq!(classify_read_failure(false, "read error".to_string()), ReadError::Gone);
        assert_eq!(
            classify_read_failure(true, "pipe busy".to_string()),
            ReadError::Backend("pipe busy".to_string())
        );
    }

    #[test]
    fn stick_normalization() {
        assert_eq!(norm_stick(128), 0.0);
        assert_eq!(norm_stick(255), 1.0);
        assert!((norm_stick(0) + 1.0).abs() < 0.02);
        // Y is flipped: raw 0 is the stick pushed up.
        assert_eq!(norm_stick_y(0), 1.0);
        assert!((norm_stick_y(255) + 1.0).abs() < 0.02);
        assert_eq!(norm_trigger(255), 1.0);
        assert_eq!(norm_trigger(0), 0.0);
    }

    #[test]
    fn button_mapping_face_and_hat() {
        // Hat 8 = released, cross bit.
        let mask = map_buttons(0x28, 0, 0, 0);
        assert_eq!(mask, Button::A.bit());
        // Hat 0 = up, circle.
        let mask = map_buttons(0x40, 0, 0, 0);
        assert_eq!(mask, Button::B.bit() | Button::DpadUp.bit());
        // Hat 1 = up-right.
        let mask = map_buttons(0x01, 0, 0, 0);
        assert_eq!(mask, Button::DpadUp.bit() | Button::DpadRight.bit());
    }

    #[test]
    fn button_mapping_system_and_paddles() {
        let mask = map_buttons(0x08, 0x30, 0x07, 0xF0);
        assert_ne!(mask & Button::Back.bit(), 0);
        assert_ne!(mask & Button::Start.bit(), 0);
        assert_ne!(mask & Button::Guide.bit(), 0);
        assert_ne!(mask & Button::Touchpad.bit(), 0);
        assert_ne!(mask & Button::Misc1.bit(), 0);
        for paddle in [Button::Paddle1, Button::Paddle2, Button::Paddle3, Button::Paddle4] {
            assert_ne!(mask & paddle.bit(), 0);
        }
    }

    fn dualsense_usb_report() -> Vec<u8> {
        let mut raw = vec![0u8; 64];
        raw[0] = 0x01; // report ID
        raw[1] = 255; // LX right
        raw[2] = 128; // LY centered
        raw[3] = 128;
        raw[4] = 0; // RY up
        raw[5] = 51; // L2 ~0.2
        raw[8] = 0x28; // hat released + cross
        raw
    }

    #[test]
    fn parse_dualsense_usb_report() {
        let raw = dualsense_usb_report();
        let (input, transport) = parse_input(PadModel::DualSense, &raw).unwrap();
        assert_eq!(transport, Transport::Usb);
        assert_eq!(input.axes.left_x, 1.0);
        assert_eq!(input.axes.left_y, 0.0);
        assert_eq!(input.axes.right_y, 1.0);
        assert!((input.axes.left_trigger - 0.2).abs() < 0.01);
        assert_eq!(input.buttons, Button::A.bit());
    }

    #[test]
    fn parse_dualsense_bt_report_checks_crc() {
        let mut raw = vec![0u8; 78];
        raw[0] = 0x31;
        raw[2] = 128; // LX (payload starts at 2)
        raw[3] = 128;
        raw[4] = 128;
        raw[5] = 128;
        raw[9] = 0x40; // hat up + circle
        // Without a valid CRC the report is rejected.
        assert!(parse_input(PadModel::DualSense, &raw).is_err());
        crc32::stamp(crc32::SEED_INPUT, &mut raw);
        let (input, transport) = parse_input(PadModel::DualSense, &raw).unwrap();
        assert_eq!(transport, Transport::Bluetooth);
        assert_eq!(input.buttons, Button::B.bit() | Button::DpadUp.bit());
    }

    #[test]
    fn parse_ds4_usb_report() {
        let mut raw = vec![0u8; 64];
        raw[0] = 0x01;
        raw[1] = 128;
        raw[2] = 128;
        raw[3] = 128;
        raw[4] = 128;
        raw[5] = 0x18; // hat released + square
        raw[8] = 255; // L2 full
        let (input, _) = parse_input(PadModel::Ds4V2, &raw).unwrap();
        assert_eq!(input.buttons, Button::X.bit());
        assert_eq!(input.axes.left_trigger, 1.0);
    }

    #[test]
    fn unexpected_report_id_is_rejected() {
        let raw = [0x77u8; 64];
        assert!(parse_input(PadModel::DualSense, &raw).is_err());
    }

    #[test]
    fn touch_block_decoding() {
        // id 3, down, x = 0x234, y = 0x456
        let block = [0x03, 0x34, 0x62, 0x45];
        let finger = parse_touch(&block);
        assert!(finger.down);
        assert_eq!(finger.id, 3);
        assert_eq!(finger.x, 0x234);
        assert_eq!(finger.y, 0x456);
        // High bit clear on byte 0 means down; set means lifted.
        let lifted = parse_touch(&[0x83, 0, 0, 0]);
        assert!(!lifted.down);
    }

    #[test]
    fn dualsense_usb_output_layout() {
        let state = OutputState { rumble_left: 200, rumble_right: 100, ..OutputState::default() };
        let report = build_output_report(PadModel::DualSense, Transport::Usb, &state);
        assert_eq!(report.len(), 48);
        assert_eq!(report[0], 0x02);
        assert_eq!(report[1], 0x01); // rumble flag only
        assert_eq!(report[3], 100); // right
        assert_eq!(report[4], 200); // left
    }

    #[test]
    fn dualsense_trigger_effect_blocks() {
        let effect = TriggerEffect { mode: 0x21, params: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10] };
        let state = OutputState {
            trigger_left: Some(effect),
            trigger_right: Some(TriggerEffect::OFF),
            ..OutputState::default()
        };
        let report = build_output_report(PadModel::DualSense, Transport::Usb, &state);
        assert_eq!(report[1], 0x01 | 0x02 | 0x04);
        assert_eq!(report[11], TriggerEffect::OFF.mode); // right mode
        assert_eq!(report[22], 0x21); // left mode
        assert_eq!(&report[23..33], &effect.params);
    }

    #[test]
    fn bluetooth_outputs_carry_valid_crc() {
        let state = OutputState { rumble_left: 40, rumble_right: 40, ..OutputState::default() };
        let ds = build_output_report(PadModel::DualSense, Transport::Bluetooth, &state);
        assert_eq!(ds.len(), 78);
        assert_eq!(ds[0], 0x31);
        assert!(crc32::validate(crc32::SEED_OUTPUT, &ds));

        let ds4 = build_output_report(PadModel::Ds4V1, Transport::Bluetooth, &state);
        assert_eq!(ds4.len(), 79);
        assert_eq!(ds4[0], 0x11);
        assert_eq!(ds4[7], 40);
        assert!(crc32::validate(crc32::SEED_OUTPUT, &ds4));
    }

    #[test]
    fn ds4_usb_output_layout() {
        let state = OutputState { rumble_left: 128, rumble_right: 64, ..OutputState::default() };
        let report = build_output_report(PadModel::Ds4V2, Transport::Usb, &state);
        assert_eq!(report.len(), 32);
        assert_eq!(report[0], 0x05);
        assert_eq!(report[4], 64);
        assert_eq!(report[5], 128);
    }

    #[test]
    fn mapping_database_validation() {
        let db = "# comment\n\n030000004c050000e60c0000,DualSense,a:b0,b:b1\n030000004c050000cc090000,DS4,a:b1\n";
        assert_eq!(count_mapping_lines(db).unwrap(), 2);
        assert!(count_mapping_lines("").is_err());
        assert!(count_mapping_lines("# only comments\n").is_err());
        assert!(count_mapping_lines("notaguid,Name,a:b0\n").is_err());
        assert!(count_mapping_lines("03000000,MissingMapping\n").is_err());
    }

    #[test]
    fn rumble_magnitude_scaling() {
        assert_eq!(to_byte(0.0), 0);
        assert_eq!(to_byte(1.0), 255);
        assert_eq!(to_byte(-0.5), 0);
        assert_eq!(to_byte(2.0), 255);
        assert_eq!(to_byte(0.5), 128);
    }
}
