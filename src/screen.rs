//! Screen power controller — the charge lock domain.
//!
//! Serializes screen on/off transitions against page flips and enforces the
//! two override policies:
//!
//! - `sleep_disabled` hardware revisions never blank the screen, full stop.
//! - An active battery-health fault refuses screen-off requests until it
//!   clears. Hardware no-sleep is the stronger rule of the two: on those
//!   revisions the screen never turns off anyway, so the fault override has
//!   nothing left to do.
//!
//! The renderer flips pages under the render lock; this controller must not
//! blank the panel mid-flip. [`FlipGate`] is the handshake: the renderer
//! holds a guard across each flip, and screen transitions block on the gate's
//! condvar until the flip completes (a blocking wait, not a spin).

use std::sync::{Arc, Condvar, Mutex};

use crate::platform::{BacklightLed, PowerControl};

// =============================================================================
// Flip Gate
// =============================================================================

/// Tracks whether a page flip is in flight. Shared between the renderer
/// (which marks flips) and [`ScreenPower`] (which waits for them).
pub struct FlipGate {
    busy: Mutex<bool>,
    done: Condvar,
}

impl FlipGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            busy: Mutex::new(false),
            done: Condvar::new(),
        })
    }

    /// Mark a flip as in progress. The returned guard releases the gate on
    /// drop and wakes any waiting screen transition.
    pub fn begin(&self) -> FlipGuard<'_> {
        let mut busy = self.busy.lock().unwrap();
        while *busy {
            busy = self.done.wait(busy).unwrap();
        }
        *busy = true;
        FlipGuard { gate: self }
    }

    /// Block until no flip is in progress.
    pub fn wait_idle(&self) {
        let mut busy = self.busy.lock().unwrap();
        while *busy {
            busy = self.done.wait(busy).unwrap();
        }
    }

    fn end(&self) {
        *self.busy.lock().unwrap() = false;
        self.done.notify_all();
    }
}

/// RAII marker for an in-flight page flip.
pub struct FlipGuard<'a> {
    gate: &'a FlipGate,
}

impl Drop for FlipGuard<'_> {
    fn drop(&mut self) {
        self.gate.end();
    }
}

// =============================================================================
// Screen Power Controller
// =============================================================================

struct ScreenState {
    screen_on: bool,
    fault_override: bool,
}

/// Screen on/off state machine. All transitions from every loop funnel
/// through here; the internal mutex is the charge lock of the system.
pub struct ScreenPower {
    state: Mutex<ScreenState>,
    /// Fixed at startup from the hardware revision. When set, the screen is
    /// never turned off by this controller.
    sleep_disabled: bool,
    gate: Arc<FlipGate>,
    power: Arc<dyn PowerControl + Send + Sync>,
}

impl ScreenPower {
    /// The device boots with the panel lit, so the controller starts on.
    pub fn new(
        sleep_disabled: bool,
        gate: Arc<FlipGate>,
        power: Arc<dyn PowerControl + Send + Sync>,
    ) -> Self {
        Self {
            state: Mutex::new(ScreenState {
                screen_on: true,
                fault_override: false,
            }),
            sleep_disabled,
            gate,
            power,
        }
    }

    /// Request the screen on or off.
    ///
    /// No-ops entirely on no-sleep hardware; refuses to turn off while a
    /// fault override is active; waits out any in-flight page flip before
    /// changing state. Re-requesting the current state is bookkeeping only,
    /// though the suspend request is re-issued either way (the platform side
    /// is idempotent).
    pub fn set_screen_state(&self, on: bool) {
        if self.sleep_disabled {
            log::info!("hardware revision does not sleep, screen state unchanged");
            return;
        }

        // Wait out an in-flight flip before touching state, so observers are
        // not blocked on the charge lock for the duration of the wait.
        self.gate.wait_idle();

        let mut state = self.state.lock().unwrap();
        if !on && state.fault_override {
            log::warn!("fault override active, refusing screen off");
            return;
        }

        if state.screen_on != on {
            log::info!("set_screen_state {on}");
            state.screen_on = on;
        }

        if on {
            self.power.suspend_disable();
        } else {
            self.power.suspend_enable();
        }
    }

    /// Engage or clear the battery-fault override. While active, every call
    /// forces the screen on and lights the backlight, not just the engaging
    /// edge: the input loop may have darkened the panel since the last poll.
    pub fn set_fault_override(&self, active: bool, backlight: &dyn BacklightLed) {
        {
            let mut state = self.state.lock().unwrap();
            if state.fault_override != active {
                log::warn!("fault override {}", if active { "engaged" } else { "cleared" });
                state.fault_override = active;
            }
            if !active {
                return;
            }
        }
        backlight.backlight_on();
        self.set_screen_state(true);
    }

    pub fn is_on(&self) -> bool {
        self.state.lock().unwrap().screen_on
    }

    #[cfg(test)]
    fn fault_override(&self) -> bool {
        self.state.lock().unwrap().fault_override
    }
}
