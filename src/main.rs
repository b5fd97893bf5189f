// Crate-level lints: Allow common graphics patterns that pedantic lints flag
#![allow(clippy::cast_possible_truncation)] // Intentional f32->i32, u32->i32 casts for pixel math
#![allow(clippy::cast_precision_loss)] // u32/i32->f32 in graphics calculations
#![allow(clippy::cast_possible_wrap)] // u32->i32 wrapping is acceptable for our value ranges
#![allow(clippy::cast_sign_loss)] // i32->u32 where we know sign is positive
#![allow(clippy::too_many_lines)] // main() is long but well-structured

//! Off-mode charging screen controller, simulator build.
//!
//! When the device is powered off and a charger is attached, the bootloader
//! starts this process instead of a full boot. It renders the battery charge
//! animation, drives the charge LED, blanks the screen after a timeout, and
//! owns three terminal transitions: charger removal powers the device off, a
//! long power-key hold restarts into charge mode, and an imminent RTC wake
//! alarm restarts into the alarm path.
//!
//! Three worker loops plus the watchdog run on their own threads (see
//! [`tasks`]); the main thread pumps the simulator window and feeds key
//! events into the input loop's queue.
//!
//! # Simulator Key Bindings
//!
//! - `P` — power key (press and release are both forwarded)
//! - `A` — RTC wake-alarm key
//! - `U` — toggle the charger plugged/unplugged (simulated battery only)
//! - `H` / `G` — inject an overheat fault / restore good health (simulated
//!   battery only)
//! - `T` — toggle the text overlay, logging a battery line each time
//! - `M` — open/close the menu; `Up`/`Down` move, `Return` activates
//! - `N` / `V` / `R` — start a scoped progress segment / advance it / reset
//!   back to the charge animation
//!
//! # Environment
//!
//! - `CHARGE_BOOT_MODE` — boot mode string; anything not starting with
//!   `charge` exits immediately (a normal boot is in progress)
//! - `CHARGE_CHIP_ID` — hardware revision; `UD710-AA` parts never sleep the
//!   screen
//! - `CHARGE_BATTERY_SYSFS` — power-supply sysfs root to read a real battery
//!   from; set but empty means the standard `/sys/class/power_supply` tree,
//!   unset means the scripted simulator battery
//! - `RUST_LOG` — standard `env_logger` filter

mod alarm;
mod assets;
mod battery;
mod colors;
mod config;
mod input;
mod platform;
mod screen;
mod tasks;
mod ui;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::sdl2::Keycode;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window,
};

use alarm::{AlarmFlags, RTC_TIME_PATH, validate_rtc_time};
use assets::SimAssets;
use battery::{BatteryHealth, BatterySource, POWER_SUPPLY_ROOT, SimBattery, SysfsBattery};
use config::{
    BATTERY_POLL, BOOT_MODE_CHARGE, CHARGER_POLL, KeyTimings, NO_SLEEP_CHIP_PREFIX,
};
use input::{InputEvent, KEY_POWER, KEY_WAKE_ALARM, KeyQueue};
use platform::{BacklightLed, PowerControl, SimBacklight, SimPower};
use screen::{FlipGate, ScreenPower};
use tasks::{animation_loop, charge_loop, input_loop, watchdog_loop};
use ui::{BackgroundIcon, PageFlip, Ui};

/// Simulated panel dimensions. Picks the 480x800 asset bucket.
const PANEL_SIZE: Size = Size::new(480, 800);

/// Window pump interval.
const PUMP_TICK: Duration = Duration::from_millis(30);

// =============================================================================
// Boot Configuration
// =============================================================================

/// Boot parameters the device reads from the kernel command line; the
/// simulator reads them from the environment instead.
struct BootConfig {
    mode: String,
    chip: String,
}

impl BootConfig {
    fn new(mode: String, chip: String) -> Self {
        Self { mode, chip }
    }

    fn from_env() -> Self {
        Self::new(
            std::env::var("CHARGE_BOOT_MODE").unwrap_or_else(|_| BOOT_MODE_CHARGE.to_owned()),
            std::env::var("CHARGE_CHIP_ID").unwrap_or_default(),
        )
    }

    /// True when the bootloader selected off-mode charging.
    fn is_charge_mode(&self) -> bool {
        self.mode.starts_with(BOOT_MODE_CHARGE)
    }

    /// True for hardware revisions whose display must never sleep.
    fn sleep_disabled(&self) -> bool {
        self.chip.starts_with(NO_SLEEP_CHIP_PREFIX)
    }
}

/// Resolve the sysfs root from the `CHARGE_BATTERY_SYSFS` value: an empty
/// setting means the standard power-supply tree, anything else is an
/// explicit root.
fn battery_sysfs_root(value: &str) -> &str {
    if value.is_empty() {
        POWER_SUPPLY_ROOT
    } else {
        value
    }
}

// =============================================================================
// Simulator Surface
// =============================================================================

/// Render surface over the simulator display. `flip` only marks the frame
/// dirty; the window pump on the main thread picks it up and pushes it to
/// the host window (SDL is not thread-safe, so the pump owns the window).
struct SimSurface {
    display: SimulatorDisplay<Rgb565>,
    dirty: Arc<AtomicBool>,
}

impl SimSurface {
    fn new(size: Size, dirty: Arc<AtomicBool>) -> Self {
        Self {
            display: SimulatorDisplay::new(size),
            dirty,
        }
    }

    fn display(&self) -> &SimulatorDisplay<Rgb565> {
        &self.display
    }
}

impl OriginDimensions for SimSurface {
    fn size(&self) -> Size {
        self.display.size()
    }
}

impl DrawTarget for SimSurface {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.display.draw_iter(pixels)
    }

    fn fill_contiguous<I>(
        &mut self,
        area: &embedded_graphics::primitives::Rectangle,
        colors: I,
    ) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        self.display.fill_contiguous(area, colors)
    }

    fn fill_solid(
        &mut self,
        area: &embedded_graphics::primitives::Rectangle,
        color: Self::Color,
    ) -> Result<(), Self::Error> {
        self.display.fill_solid(area, color)
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.display.clear(color)
    }
}

impl PageFlip for SimSurface {
    fn flip(&mut self) {
        self.dirty.store(true, Ordering::Release);
    }
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() {
    env_logger::init();

    let boot = BootConfig::from_env();
    if !boot.is_charge_mode() {
        log::info!("boot mode {:?} is not charge mode, exiting", boot.mode);
        return;
    }
    if boot.sleep_disabled() {
        log::info!("chip {:?}: screen sleep disabled", boot.chip);
    }

    // Battery init is the one fatal startup step: without it there is
    // nothing to display and nothing to watch. A sysfs root in the
    // environment selects a real battery; otherwise the scripted simulator
    // battery runs, and the U/H/G keys drive it.
    let (battery, sim_battery): (Arc<dyn BatterySource + Send + Sync>, Option<Arc<SimBattery>>) =
        match std::env::var("CHARGE_BATTERY_SYSFS") {
            Ok(root) => match SysfsBattery::new(battery_sysfs_root(&root)) {
                Ok(battery) => (Arc::new(battery), None),
                Err(err) => {
                    log::error!("{err}");
                    std::process::exit(1);
                }
            },
            Err(_) => match SimBattery::new(35) {
                Ok(battery) => {
                    let battery = Arc::new(battery);
                    (battery.clone(), Some(battery))
                }
                Err(err) => {
                    log::error!("{err}");
                    std::process::exit(1);
                }
            },
        };

    if !validate_rtc_time(Path::new(RTC_TIME_PATH)) {
        log::warn!("rtc unavailable, alarm wake stays inactive until the clock is set");
    }

    let exit = Arc::new(AtomicBool::new(false));
    let gate = FlipGate::new();
    let power = Arc::new(SimPower);
    let backlight = Arc::new(SimBacklight);
    let screen = Arc::new(ScreenPower::new(
        boot.sleep_disabled(),
        gate.clone(),
        power.clone(),
    ));

    let dirty = Arc::new(AtomicBool::new(false));
    let surface = SimSurface::new(PANEL_SIZE, dirty.clone());
    let ui = Arc::new(Ui::new(surface, &SimAssets, gate));

    ui.set_background(Some(BackgroundIcon::Charging));
    ui.show_indeterminate_progress();
    backlight.backlight_on();

    let keys = Arc::new(KeyQueue::new());
    let alarm = AlarmFlags::system();

    // ==========================================================================
    // Worker Threads
    // ==========================================================================

    let animation = thread::spawn({
        let exit = exit.clone();
        let ui = ui.clone();
        move || animation_loop(&exit, &ui)
    });

    let charge = thread::spawn({
        let exit = exit.clone();
        let battery = battery.clone();
        let ui = ui.clone();
        let screen = screen.clone();
        let backlight = backlight.clone();
        move || charge_loop(&exit, &*battery, &ui, &screen, &*backlight, BATTERY_POLL)
    });

    let watchdog = thread::spawn({
        let exit = exit.clone();
        let battery = battery.clone();
        let backlight = backlight.clone();
        let power = power.clone();
        move || watchdog_loop(&exit, &*battery, &*backlight, &*power, CHARGER_POLL)
    });

    let input = thread::spawn({
        let exit = exit.clone();
        let keys = keys.clone();
        let screen = screen.clone();
        let backlight = backlight.clone();
        let power = power.clone();
        move || {
            input_loop(
                &exit,
                &*keys,
                &screen,
                &*backlight,
                &*power,
                &alarm,
                KeyTimings::default(),
            );
        }
    });

    // ==========================================================================
    // Window Pump (main thread)
    // ==========================================================================

    let output_settings = OutputSettingsBuilder::new().build();
    let mut window = Window::new("Charging", &output_settings);
    ui.present(|surface| window.update(surface.display()));

    let mut plugged = true;
    let mut overlay_on = false;
    let mut menu_open = false;
    let mut menu_sel = 0i32;
    let mut demo_fraction = 0.0f32;
    const MENU_HEADERS: [&str; 1] = ["Charge mode"];
    const MENU_ITEMS: [&str; 3] = ["Continue", "Reboot", "Power off"];

    while !exit.load(Ordering::SeqCst) {
        if dirty.swap(false, Ordering::Acquire) {
            ui.present(|surface| window.update(surface.display()));
        }

        for event in window.events() {
            match event {
                SimulatorEvent::Quit => {
                    log::info!("window closed");
                    exit.store(true, Ordering::SeqCst);
                }
                SimulatorEvent::KeyDown { keycode, repeat, .. } => {
                    if repeat {
                        continue;
                    }
                    match keycode {
                        Keycode::P => keys.push(InputEvent::down(KEY_POWER)),
                        Keycode::A => keys.push(InputEvent::down(KEY_WAKE_ALARM)),
                        Keycode::U => {
                            if let Some(sim) = &sim_battery {
                                plugged = !plugged;
                                log::info!(
                                    "charger {}",
                                    if plugged { "attached" } else { "removed" }
                                );
                                sim.set_plugged(plugged);
                            }
                        }
                        Keycode::H => {
                            if let Some(sim) = &sim_battery {
                                sim.set_health(BatteryHealth::Overheat);
                            }
                        }
                        Keycode::G => {
                            if let Some(sim) = &sim_battery {
                                sim.set_health(BatteryHealth::Good);
                            }
                        }
                        Keycode::T => {
                            let snap = battery.snapshot();
                            ui.print_line(&format!(
                                "battery {}% {:?} {:?}",
                                snap.level_percent, snap.status, snap.health
                            ));
                            overlay_on = !overlay_on;
                            ui.set_overlay_visible(overlay_on);
                        }
                        Keycode::M => {
                            if menu_open {
                                ui.end_menu();
                            } else {
                                // The menu replaces the log overlay
                                if ui.text_visible() {
                                    overlay_on = false;
                                    ui.set_overlay_visible(false);
                                }
                                // Drop queued keys so the input loop does not
                                // act on presses meant for the menu
                                keys.clear();
                                ui.start_menu(&MENU_HEADERS, &MENU_ITEMS);
                                menu_sel = 0;
                            }
                            menu_open = !menu_open;
                        }
                        Keycode::Up if menu_open => {
                            menu_sel = ui.menu_select(menu_sel - 1);
                        }
                        Keycode::Down if menu_open => {
                            menu_sel = ui.menu_select(menu_sel + 1);
                        }
                        Keycode::Return if menu_open => {
                            menu_open = false;
                            ui.end_menu();
                            match menu_sel {
                                1 => {
                                    exit.store(true, Ordering::SeqCst);
                                    power.restart("charger");
                                }
                                2 => {
                                    exit.store(true, Ordering::SeqCst);
                                    power.power_off();
                                }
                                _ => {}
                            }
                        }
                        Keycode::N => {
                            demo_fraction = 0.0;
                            ui.show_progress(0.25, 10);
                        }
                        Keycode::V => {
                            demo_fraction = (demo_fraction + 0.1).min(1.0);
                            ui.set_progress(demo_fraction);
                        }
                        Keycode::R => {
                            demo_fraction = 0.0;
                            ui.reset_progress();
                            ui.show_indeterminate_progress();
                        }
                        _ => {}
                    }
                }
                SimulatorEvent::KeyUp { keycode, .. } => match keycode {
                    Keycode::P => keys.push(InputEvent::up(KEY_POWER)),
                    Keycode::A => keys.push(InputEvent::up(KEY_WAKE_ALARM)),
                    _ => {}
                },
                _ => {}
            }
        }

        thread::sleep(PUMP_TICK);
    }

    for handle in [animation, charge, watchdog, input] {
        handle.join().ok();
    }
    log::info!("charge screen controller exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_boot_modes_accepted() {
        assert!(BootConfig::new("charge".into(), String::new()).is_charge_mode());
        // Kernel command lines spell it "charger" on some revisions
        assert!(BootConfig::new("charger".into(), String::new()).is_charge_mode());
    }

    #[test]
    fn test_normal_boot_mode_rejected() {
        assert!(!BootConfig::new("normal".into(), String::new()).is_charge_mode());
        assert!(!BootConfig::new(String::new(), String::new()).is_charge_mode());
    }

    #[test]
    fn test_empty_sysfs_setting_selects_system_root() {
        assert_eq!(battery_sysfs_root(""), POWER_SUPPLY_ROOT);
        assert_eq!(battery_sysfs_root("/tmp/fake-supply"), "/tmp/fake-supply");
    }

    #[test]
    fn test_no_sleep_chip_prefix_match() {
        assert!(BootConfig::new("charge".into(), "UD710-AA123".into()).sleep_disabled());
        assert!(!BootConfig::new("charge".into(), "UD710-AB".into()).sleep_disabled());
        assert!(!BootConfig::new("charge".into(), String::new()).sleep_disabled());
    }
}
