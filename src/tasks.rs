//! The control loops: animation, charge poll, charger watchdog, and input.
//!
//! Each loop runs on its own thread and observes a shared exit flag. They
//! touch shared state only through the [`Ui`] handle (render lock) and the
//! [`ScreenPower`] controller (charge lock), one at a time and never nested,
//! so the two locks cannot deadlock against each other.
//!
//! The watchdog and input loops own the terminal transitions: charger removal
//! powers the device off, a long power-key hold or an imminent wake alarm
//! restarts it. Every terminal path raises the exit flag before invoking the
//! platform, so on the simulator (where `power_off`/`restart` return) the
//! remaining loops wind down cleanly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use crate::alarm::{AlarmFlags, now_epoch_secs};
use crate::battery::{BatterySource, BatteryStatus, fault_severity};
use crate::config::{ANIM_TICK, KeyTimings, LED_GREEN_THRESHOLD};
use crate::input::{InputSource, KEY_POWER, KEY_WAKE_ALARM};
use crate::platform::{BacklightLed, LedColor, PowerControl};
use crate::screen::ScreenPower;
use crate::ui::{PageFlip, Ui};

// =============================================================================
// Animation Loop
// =============================================================================

/// Drives the indeterminate bar animation at the configured frame rate.
pub fn animation_loop<D>(exit: &AtomicBool, ui: &Ui<D>)
where
    D: DrawTarget<Color = Rgb565> + PageFlip,
{
    log::debug!("animation loop started");
    while !exit.load(Ordering::SeqCst) {
        thread::sleep(ANIM_TICK);
        ui.tick_animation();
    }
    log::debug!("animation loop exiting");
}

// =============================================================================
// Charge LED
// =============================================================================

/// Charge LED driver with transition-only commands: red below the green
/// threshold, green at and above it. The LED line is only re-driven when the
/// target color actually changes.
pub struct LedState {
    current: Option<LedColor>,
}

impl LedState {
    pub const fn new() -> Self {
        Self { current: None }
    }

    pub fn update(&mut self, level: u8, backlight: &dyn BacklightLed) {
        let target = if level < LED_GREEN_THRESHOLD {
            LedColor::Red
        } else {
            LedColor::Green
        };
        if self.current != Some(target) {
            log::info!("charge led -> {target:?} at {level}%");
            backlight.led_on(target);
            self.current = Some(target);
        }
    }
}

impl Default for LedState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Charge Loop
// =============================================================================

/// Polls the battery and pushes level, bar mode, LED, and fault state to the
/// renderer and the screen controller.
///
/// The render and charge locks are taken strictly sequentially here, never
/// one inside the other.
pub fn charge_loop<D>(
    exit: &AtomicBool,
    battery: &dyn BatterySource,
    ui: &Ui<D>,
    screen: &ScreenPower,
    backlight: &dyn BacklightLed,
    poll: Duration,
) where
    D: DrawTarget<Color = Rgb565> + PageFlip,
{
    log::debug!("charge loop started");
    let mut led = LedState::new();
    let mut last_status = None;
    while !exit.load(Ordering::SeqCst) {
        let snap = battery.snapshot();
        log::trace!("battery: {snap:?}");

        // Bar mode switches on status transitions only, so a scoped progress
        // display started elsewhere is not clobbered every poll
        if last_status != Some(snap.status) {
            if snap.status == BatteryStatus::Charging {
                ui.show_indeterminate_progress();
            } else {
                ui.show_normal_progress();
            }
            last_status = Some(snap.status);
        }

        led.update(snap.level_percent, backlight);

        let severity = fault_severity(snap.health);
        screen.set_fault_override(severity.is_fault(), backlight);
        ui.set_fault(severity);

        // No point repainting the level behind a dark panel
        if screen.is_on() {
            ui.update_level(snap.level_percent);
        }

        thread::sleep(poll);
    }
    log::debug!("charge loop exiting");
}

// =============================================================================
// Charger Watchdog
// =============================================================================

/// Powers the device off the moment no external supply is present. Runs the
/// shutdown sequence exactly once, then returns.
pub fn watchdog_loop(
    exit: &AtomicBool,
    battery: &dyn BatterySource,
    backlight: &dyn BacklightLed,
    power: &dyn PowerControl,
    poll: Duration,
) {
    log::debug!("charger watchdog started");
    while !exit.load(Ordering::SeqCst) {
        if battery.snapshot().unpowered() {
            log::error!("charger removed, powering off");
            backlight.backlight_off();
            backlight.led_off();
            exit.store(true, Ordering::SeqCst);
            power.power_off();
            return;
        }
        thread::sleep(poll);
    }
    log::debug!("charger watchdog exiting");
}

// =============================================================================
// Input Loop
// =============================================================================

enum KeyPhase {
    /// Screen dark, waiting for a wake key with a long bounded poll.
    Idle,
    /// Screen lit; the remaining on-time counts down in `deadline_ms`.
    AwakeWindow,
}

/// Key handling state machine.
///
/// The screen boots lit and stays so for the backlight window. A power-key
/// press lights the screen and arms the stuck-UI countdown: held past the
/// timeout, the device restarts back into charge mode. The wake-alarm key
/// checks the vendor alarm flags and restarts into the alarm path when one is
/// imminent. Any other key press lights the screen for the short wake window.
pub fn input_loop(
    exit: &AtomicBool,
    input: &dyn InputSource,
    screen: &ScreenPower,
    backlight: &dyn BacklightLed,
    power: &dyn PowerControl,
    alarm: &AlarmFlags,
    timings: KeyTimings,
) {
    log::debug!("input loop started");
    let mut phase = KeyPhase::AwakeWindow;
    let mut deadline_ms = timings.backlight_on_ms as i64;

    while !exit.load(Ordering::SeqCst) {
        let event = match phase {
            KeyPhase::Idle => input.next_event(Duration::from_millis(timings.idle_poll_ms)),
            KeyPhase::AwakeWindow => {
                let wait_started = Instant::now();
                let event = input.next_event(Duration::from_millis(deadline_ms.max(0) as u64));
                // Charge the wait against the on-time even when an event
                // arrived early; a spurious instant wakeup still burns 1 ms
                // so the window cannot stall forever
                deadline_ms -= (wait_started.elapsed().as_millis() as i64).max(1);
                if event.is_none() || deadline_ms <= 0 {
                    log::info!("backlight window expired, screen off");
                    backlight.backlight_off();
                    screen.set_screen_state(false);
                    // The next wake gets the short window unless a key press
                    // re-arms the full one
                    deadline_ms = timings.wakeup_on_ms as i64;
                    phase = KeyPhase::Idle;
                }
                event
            }
        };

        let Some(event) = event else {
            continue;
        };

        match (event.code, event.pressed()) {
            (KEY_POWER, true) => {
                log::info!("power key down");
                screen.set_screen_state(true);
                backlight.backlight_on();
                if hold_power_key(exit, input, power, &timings) {
                    return;
                }
                backlight.backlight_on();
                deadline_ms = timings.backlight_on_ms as i64;
                phase = KeyPhase::AwakeWindow;
            }
            (KEY_WAKE_ALARM, true) => {
                screen.set_screen_state(true);
                if alarm.alarm_active(now_epoch_secs()) {
                    log::warn!("wake alarm imminent, restarting into alarm");
                    exit.store(true, Ordering::SeqCst);
                    power.restart("alarm");
                    return;
                }
                log::info!("wake alarm key outside the alarm window, back to sleep");
                backlight.backlight_off();
                screen.set_screen_state(false);
                phase = KeyPhase::Idle;
            }
            (_, true) => {
                // Any other key lights the screen for the short wake window
                screen.set_screen_state(true);
                backlight.backlight_on();
                deadline_ms = timings.wakeup_on_ms as i64;
                phase = KeyPhase::AwakeWindow;
            }
            (_, false) => {}
        }
    }
    log::debug!("input loop exiting");
}

/// Countdown while the power key is held. Returns true when the hold ran past
/// the stuck-UI timeout and a restart was requested; false on release.
fn hold_power_key(
    exit: &AtomicBool,
    input: &dyn InputSource,
    power: &dyn PowerControl,
    timings: &KeyTimings,
) -> bool {
    let mut remaining_ms = timings.power_key_timeout_ms as i64;
    loop {
        if remaining_ms <= 0 {
            log::warn!("power key held past timeout, restarting into charge mode");
            exit.store(true, Ordering::SeqCst);
            power.restart("charger");
            return true;
        }
        let wait_started = Instant::now();
        let event = input.next_event(Duration::from_millis(remaining_ms as u64));
        remaining_ms -= (wait_started.elapsed().as_millis() as i64).max(1);

        if let Some(event) = event
            && event.code == KEY_POWER
            && !event.pressed()
        {
            log::info!("power key released");
            // Let the release contact bounce settle before re-driving
            thread::sleep(timings.release_settle);
            return false;
        }
    }
}
