/// Controller probe: opens a session over the HID backend and logs what the
/// pads report. Handy for checking hot-plug, button edges and rumble without
/// wiring the library into anything.

use std::time::Duration;

use padsession::{Button, HidBackend, Session, SessionConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = SessionConfig::load("padsession.toml");
    let slots = config.max_controllers;
    let mut session = Session::new(HidBackend::new(), config);

    if let Err(e) = session.start() {
        log::error!("Session failed to start: {e}");
        std::process::exit(1);
    }
    log::info!("Probing {slots} slot(s); Ctrl-C to quit");

    let mut was_connected = vec![false; slots];
    loop {
        for index in 0..slots {
            let snapshot = match session.poll(index) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::error!("Poll failed: {e}");
                    session.stop();
                    return;
                }
            };

            if snapshot.connected != was_connected[index] {
                if snapshot.connected {
                    log::info!("[{index}] connected: {}", snapshot.name);
                    // Short rumble blip as a connection acknowledgment.
                    let _ = session.vibrate(index, 0.5, 0.5, 150);
                } else {
                    log::info!("[{index}] disconnected");
                }
                was_connected[index] = snapshot.connected;
            }

            for button in Button::ALL {
                if snapshot.just_pressed(button) {
                    log::info!(
                        "[{index}] {button:?} pressed (left stick {:.0}\u{b0} @ {:.2})",
                        snapshot.left_stick_angle,
                        snapshot.left_stick_magnitude
                    );
                }
            }
        }
        std::thread::sleep(Duration::from_millis(16));
    }
}
