/// Capability negotiation for enhanced Sony features.
///
/// Haptic feedback audio needs an audio backend, and which one comes up
/// varies by platform. The chain is data: an ordered list of
/// (label, applicable, driver) attempts evaluated in sequence, first success
/// wins. Adding a platform variant is a new row, not a new branch. A fully
/// failed chain degrades the session one tier — it never fails start.

use crate::backend::Backend;
use crate::config::SonyFeatures;

/// Which fallback level of enhanced-feature support is active for the
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityTier {
    /// Enhanced features plus haptic feedback audio.
    Full,
    /// Enhanced features (touchpad, sensors, adaptive triggers) without
    /// haptic audio.
    Degraded,
    /// No enhanced features.
    Disabled,
}

struct Attempt {
    label: &'static str,
    applicable: bool,
    driver: Option<String>,
}

pub(crate) fn negotiate<B: Backend>(backend: &mut B, requested: SonyFeatures) -> CapabilityTier {
    negotiate_for_platform(backend, requested, cfg!(unix))
}

fn negotiate_for_platform<B: Backend>(
    backend: &mut B,
    requested: SonyFeatures,
    unix: bool,
) -> CapabilityTier {
    match requested {
        SonyFeatures::Off => CapabilityTier::Disabled,
        SonyFeatures::Features => CapabilityTier::Degraded,
        SonyFeatures::FeaturesAndHaptics => {
            // Second unix attempt reuses whatever audio driver is live;
            // "pulse" is the stand-in when the platform reports none.
            let active = backend
                .audio_driver_name()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "pulse".to_string());

            let chain = [
                Attempt { label: "pipewire", applicable: unix, driver: Some("pipewire".into()) },
                Attempt { label: "active audio driver", applicable: unix, driver: Some(active) },
                Attempt { label: "default audio driver", applicable: true, driver: None },
            ];

            for attempt in &chain {
                if !attempt.applicable {
                    continue;
                }
                if backend.init_haptics(attempt.driver.as_deref()) {
                    log::info!("Haptics audio up via {}", attempt.label);
                    return CapabilityTier::Full;
                }
                log::warn!(
                    "Haptics init failed via {}: {}",
                    attempt.label,
                    backend.last_error()
                );
            }

            log::warn!("All haptics backends failed; continuing without haptic audio");
            CapabilityTier::Degraded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    #[test]
    fn off_and_features_skip_negotiation() {
        let mut backend = MockBackend::default();
        assert_eq!(
            negotiate_for_platform(&mut backend, SonyFeatures::Off, true),
            CapabilityTier::Disabled
        );
        assert_eq!(
            negotiate_for_platform(&mut backend, SonyFeatures::Features, true),
            CapabilityTier::Degraded
        );
        assert!(backend.haptics_drivers_tried.is_empty());
    }

    #[test]
    fn unix_first_attempt_is_pipewire() {
        let mut backend = MockBackend::default();
        let tier = negotiate_for_platform(&mut backend, SonyFeatures::FeaturesAndHaptics, true);
        assert_eq!(tier, CapabilityTier::Full);
        assert_eq!(backend.haptics_drivers_tried, vec![Some("pipewire".to_string())]);
    }

    #[test]
    fn unix_falls_back_to_active_driver() {
        let mut backend = MockBackend::default();
        backend.haptics_failures = 1;
        backend.audio_driver = Some("alsa".into());
        let tier = negotiate_for_platform(&mut backend, SonyFeatures::FeaturesAndHaptics, true);
        assert_eq!(tier, CapabilityTier::Full);
        assert_eq!(
            backend.haptics_drivers_tried,
            vec![Some("pipewire".to_string()), Some("alsa".to_string())]
        );
    }

    #[test]
    fn unreported_driver_falls_back_to_pulse() {
        let mut backend = MockBackend::default();
        backend.haptics_failures = 1;
        let _ = negotiate_for_platform(&mut backend, SonyFeatures::FeaturesAndHaptics, true);
        assert_eq!(backend.haptics_drivers_tried[1], Some("pulse".to_string()));
    }

    #[test]
    fn third_attempt_is_driverless_default() {
        let mut backend = MockBackend::default();
        backend.haptics_failures = 2;
        let tier = negotiate_for_platform(&mut backend, SonyFeatures::FeaturesAndHaptics, true);
        assert_eq!(tier, CapabilityTier::Full);
        assert_eq!(backend.haptics_drivers_tried.len(), 3);
        assert_eq!(backend.haptics_drivers_tried[2], None);
    }

    #[test]
    fn full_chain_failure_degrades() {
        let mut backend = MockBackend::default();
        backend.haptics_failures = usize::MAX;
        let tier = negotiate_for_platform(&mut backend, SonyFeatures::FeaturesAndHaptics, true);
        assert_eq!(tier, CapabilityTier::Degraded);
        assert_eq!(backend.haptics_drivers_tried.len(), 3);
    }

    #[test]
    fn non_unix_goes_straight_to_default() {
        let mut backend = MockBackend::default();
        let tier = negotiate_for_platform(&mut backend, SonyFeatures::FeaturesAndHaptics, false);
        assert_eq!(tier, CapabilityTier::Full);
        assert_eq!(backend.haptics_drivers_tried, vec![None]);
    }
}
