//! Platform power and backlight/LED seams.
//!
//! The control loops only ever talk to these traits. The desktop front end
//! wires in the logging simulators below; a device build would wire in
//! sysfs/GPIO implementations behind the same seams.

/// Charge LED colors used by the charging policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedColor {
    Green,
    Red,
}

/// Backlight and charge-LED control lines.
pub trait BacklightLed {
    fn backlight_on(&self);
    fn backlight_off(&self);
    fn led_on(&self, color: LedColor);
    fn led_off(&self);
}

/// Platform suspend/shutdown/restart requests.
///
/// `power_off` and `restart` are terminal: the implementations are expected
/// not to return on real hardware. The simulator implementations just log and
/// let the loops unwind through the exit flag.
pub trait PowerControl {
    fn suspend_enable(&self);
    fn suspend_disable(&self);
    fn power_off(&self);
    fn restart(&self, reason: &str);
}

// =============================================================================
// Simulator Implementations
// =============================================================================

/// Logging backlight/LED for the desktop front end.
pub struct SimBacklight;

impl BacklightLed for SimBacklight {
    fn backlight_on(&self) {
        log::info!("backlight on");
    }

    fn backlight_off(&self) {
        log::info!("backlight off");
    }

    fn led_on(&self, color: LedColor) {
        log::info!("led on: {color:?}");
    }

    fn led_off(&self) {
        log::info!("led off");
    }
}

/// Logging power control for the desktop front end.
pub struct SimPower;

impl PowerControl for SimPower {
    fn suspend_enable(&self) {
        log::info!("autosuspend enabled");
    }

    fn suspend_disable(&self) {
        log::info!("autosuspend disabled");
    }

    fn power_off(&self) {
        log::warn!("power off requested");
    }

    fn restart(&self, reason: &str) {
        log::warn!("restart requested, reason: {reason}");
    }
}

// =============================================================================
// Counting Test Doubles
// =============================================================================
