//! Timing, layout, and policy constants for the charging screen.
//!
//! Everything time- or size-sensitive lives here so the control loops and the
//! renderer agree on one set of numbers. Threshold-style constants carry
//! compile-time ordering assertions, so a bad edit fails the build instead of
//! producing a screen that never sleeps or a power key that never times out.

use std::time::Duration;

// =============================================================================
// Progress Bar Animation
// =============================================================================

/// Number of frames in the progress bar sprite strip. Frame 0 is the empty
/// bar, frame `FRAME_COUNT - 1` the full bar.
pub const FRAME_COUNT: usize = 7;

/// Indeterminate animation rate while the battery reports Charging.
pub const ANIM_FPS: u32 = 15;

/// Sleep interval of the animation loop, derived from [`ANIM_FPS`].
pub const ANIM_TICK: Duration = Duration::from_millis(1000 / ANIM_FPS as u64);

// =============================================================================
// Poll Intervals
// =============================================================================

/// Battery snapshot poll interval (level/status/health refresh).
pub const BATTERY_POLL: Duration = Duration::from_millis(500);

/// Charger presence poll interval (AC/USB online watchdog).
pub const CHARGER_POLL: Duration = Duration::from_millis(500);

// =============================================================================
// Input / Key Timing
// =============================================================================

/// Bounded wait used while idle, between input events. Long enough to avoid
/// busy polling, short enough to observe the exit flag promptly.
pub const IDLE_POLL_MS: u64 = 2_000;

/// How long the power key must be held before the UI is considered stuck and
/// a restart is requested.
pub const POWER_KEY_TIMEOUT_MS: u64 = 6_000;

/// How long the screen stays on after the power key is released.
pub const BACKLIGHT_ON_MS: u64 = 15_000;

/// Awake-window deadline re-armed after the screen has been turned off.
pub const WAKEUP_ON_MS: u64 = 5_000;

/// Settle delay after a power key release, before the backlight is driven.
/// Absorbs the contact bounce burst that follows the release event.
pub const KEY_RELEASE_SETTLE: Duration = Duration::from_millis(500);

const _: () = assert!(WAKEUP_ON_MS < BACKLIGHT_ON_MS);
const _: () = assert!(POWER_KEY_TIMEOUT_MS < BACKLIGHT_ON_MS);

/// Key-timeout configuration consumed by the input loop. Production code uses
/// [`KeyTimings::default`]; tests shrink the values to keep runtimes sane.
#[derive(Clone, Copy, Debug)]
pub struct KeyTimings {
    /// Idle bounded-wait interval, milliseconds.
    pub idle_poll_ms: u64,
    /// Power key held-past-this means stuck, milliseconds.
    pub power_key_timeout_ms: u64,
    /// Screen-on window after a key release, milliseconds.
    pub backlight_on_ms: u64,
    /// Awake-window deadline after the screen goes dark, milliseconds.
    pub wakeup_on_ms: u64,
    /// Post-release settle delay.
    pub release_settle: Duration,
}

impl Default for KeyTimings {
    fn default() -> Self {
        Self {
            idle_poll_ms: IDLE_POLL_MS,
            power_key_timeout_ms: POWER_KEY_TIMEOUT_MS,
            backlight_on_ms: BACKLIGHT_ON_MS,
            wakeup_on_ms: WAKEUP_ON_MS,
            release_settle: KEY_RELEASE_SETTLE,
        }
    }
}

// =============================================================================
// LED Policy
// =============================================================================

/// Battery level at and above which the charge LED turns green. Below it the
/// LED is red. The LED is only re-commanded on a color transition.
pub const LED_GREEN_THRESHOLD: u8 = 90;

const _: () = assert!(LED_GREEN_THRESHOLD <= 100);

// =============================================================================
// Alarm Wake Window
// =============================================================================

/// Grace period for an alarm whose scheduled time has just passed, seconds.
/// Exclusive bound: an alarm exactly 20 s gone no longer counts.
pub const ALARM_RECENT_GRACE_S: i64 = 20;

/// Lookahead for an alarm about to fire, seconds. Inclusive bound: an alarm
/// exactly 180 s away still counts — cheaper to reboot into the alarm now
/// than to race it from the charging screen.
pub const ALARM_LOOKAHEAD_S: i64 = 180;

const _: () = assert!(ALARM_RECENT_GRACE_S > 0);
const _: () = assert!(ALARM_LOOKAHEAD_S > ALARM_RECENT_GRACE_S);

// =============================================================================
// Text Overlay / Menu Grid
// =============================================================================

/// Maximum text columns kept per overlay or menu line.
pub const MAX_COLS: usize = 64;

/// Maximum rows in the overlay ring buffer and the menu.
pub const MAX_ROWS: usize = 32;

/// Character cell width of the overlay/menu font, pixels.
pub const CHAR_WIDTH: u32 = 10;

/// Character cell height of the overlay/menu font, pixels.
pub const CHAR_HEIGHT: u32 = 20;

// =============================================================================
// Boot Gating
// =============================================================================

/// Boot-mode value that enables this controller. Any other boot mode means a
/// normal boot is in progress and the process exits immediately.
pub const BOOT_MODE_CHARGE: &str = "charge";

/// Hardware revision prefix whose display must never be put to sleep.
pub const NO_SLEEP_CHIP_PREFIX: &str = "UD710-AA";
