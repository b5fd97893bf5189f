//! Battery snapshot types and the battery source seam.
//!
//! The controller never touches the platform battery interface directly; it
//! consumes immutable [`BatterySnapshot`] values from a [`BatterySource`]
//! once per poll. Health conditions map to a [`FaultSeverity`] which selects
//! the fault sprite and forces the screen on (see the charge loop in
//! [`crate::tasks`]).

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

/// Charge status as reported by the platform battery driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatteryStatus {
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

impl BatteryStatus {
    /// Parse a power-supply sysfs status string. Unrecognized values map to
    /// `Unknown` rather than failing the poll.
    pub fn from_sysfs(s: &str) -> Self {
        match s.trim() {
            "Charging" => Self::Charging,
            "Discharging" => Self::Discharging,
            "Not charging" => Self::NotCharging,
            "Full" => Self::Full,
            _ => Self::Unknown,
        }
    }
}

/// Battery health as reported by the platform battery driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatteryHealth {
    Unknown,
    Good,
    Overheat,
    Dead,
    OverVoltage,
    UnspecifiedFailure,
    Cold,
}

impl BatteryHealth {
    /// Parse a power-supply sysfs health string.
    pub fn from_sysfs(s: &str) -> Self {
        match s.trim() {
            "Good" => Self::Good,
            "Overheat" => Self::Overheat,
            "Dead" => Self::Dead,
            "Over voltage" => Self::OverVoltage,
            "Unspecified failure" => Self::UnspecifiedFailure,
            "Cold" => Self::Cold,
            _ => Self::Unknown,
        }
    }
}

/// Fault severity derived from [`BatteryHealth`]. A nonzero severity replaces
/// the percentage/bar display with the matching fault sprite and blocks
/// screen sleep until the condition clears.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultSeverity {
    None,
    /// Battery too hot to charge.
    Overheat,
    /// Battery too cold to charge.
    Cold,
    /// Charger delivering excessive voltage.
    OverVoltage,
}

impl FaultSeverity {
    /// Sprite index for this fault (`error_1..error_3`), or `None`.
    pub const fn sprite_index(self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Overheat => Some(0),
            Self::Cold => Some(1),
            Self::OverVoltage => Some(2),
        }
    }

    /// True when a fault is active.
    pub const fn is_fault(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Map a health reading to its display/policy severity. Dead and unspecified
/// failures do not stop the charging display; only thermal and over-voltage
/// conditions do.
pub const fn fault_severity(health: BatteryHealth) -> FaultSeverity {
    match health {
        BatteryHealth::Overheat => FaultSeverity::Overheat,
        BatteryHealth::Cold => FaultSeverity::Cold,
        BatteryHealth::OverVoltage => FaultSeverity::OverVoltage,
        _ => FaultSeverity::None,
    }
}

/// One poll's worth of battery state. Produced by a [`BatterySource`],
/// consumed by the charge and watchdog loops, then discarded.
#[derive(Clone, Copy, Debug)]
pub struct BatterySnapshot {
    /// Charge level, clamped to 0..=100 by the source.
    pub level_percent: u8,
    pub status: BatteryStatus,
    pub health: BatteryHealth,
    pub ac_online: bool,
    pub usb_online: bool,
}

impl BatterySnapshot {
    /// True when no external power source is present. This is the charger
    /// watchdog's shutdown trigger.
    pub const fn unpowered(&self) -> bool {
        !self.ac_online && !self.usb_online
    }
}

/// Instantaneous battery state provider.
///
/// Construction is the `init` step of the platform interface: a source that
/// cannot reach the battery driver fails its constructor with
/// [`InitError::BatterySource`], which is fatal before any thread starts.
pub trait BatterySource {
    fn snapshot(&self) -> BatterySnapshot;
}

/// Fatal startup failures. Anything here aborts the process before the
/// control loops are spawned; transient runtime failures are logged and
/// skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The platform battery interface could not be opened.
    #[error("battery source unavailable: {0}")]
    BatterySource(String),
}

// =============================================================================
// Sysfs Battery Source
// =============================================================================

/// Battery source over the Linux power-supply sysfs tree
/// (`battery/capacity`, `battery/status`, `battery/health`, `ac/online`,
/// `usb/online` under the given root).
///
/// Construction fails if the capacity file cannot be read; after that,
/// individual read failures are logged and the affected field degrades for
/// that poll only.
pub struct SysfsBattery {
    root: PathBuf,
}

/// Standard location of the power-supply class tree.
pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

impl SysfsBattery {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, InitError> {
        let root = root.into();
        std::fs::read_to_string(root.join("battery/capacity"))
            .map_err(|err| InitError::BatterySource(format!("{}: {err}", root.display())))?;
        Ok(Self { root })
    }

    fn read(&self, rel: &str) -> Option<String> {
        match std::fs::read_to_string(self.root.join(rel)) {
            Ok(contents) => Some(contents),
            Err(err) => {
                log::warn!("read {rel}: {err}");
                None
            }
        }
    }

    fn read_flag(&self, rel: &str) -> bool {
        self.read(rel).is_some_and(|s| s.trim() == "1")
    }
}

impl BatterySource for SysfsBattery {
    fn snapshot(&self) -> BatterySnapshot {
        let level = self
            .read("battery/capacity")
            .and_then(|s| s.trim().parse::<u8>().ok())
            .map_or(0, |v| v.min(100));
        BatterySnapshot {
            level_percent: level,
            status: self
                .read("battery/status")
                .map_or(BatteryStatus::Unknown, |s| BatteryStatus::from_sysfs(&s)),
            health: self
                .read("battery/health")
                .map_or(BatteryHealth::Unknown, |s| BatteryHealth::from_sysfs(&s)),
            ac_online: self.read_flag("ac/online"),
            usb_online: self.read_flag("usb/online"),
        }
    }
}

// =============================================================================
// Simulated Battery Source
// =============================================================================

/// Scripted battery for the desktop front end.
///
/// Charges roughly one percent per second while plugged in. The simulator
/// window toggles `ac_online`/`usb_online` and the health condition to
/// exercise the watchdog and fault paths.
pub struct SimBattery {
    inner: Mutex<SimBatteryState>,
}

struct SimBatteryState {
    started: Instant,
    base_level: u8,
    plugged: bool,
    health: BatteryHealth,
}

impl SimBattery {
    pub fn new(start_level: u8) -> Result<Self, InitError> {
        if start_level > 100 {
            return Err(InitError::BatterySource(format!(
                "start level {start_level} out of range"
            )));
        }
        Ok(Self {
            inner: Mutex::new(SimBatteryState {
                started: Instant::now(),
                base_level: start_level,
                plugged: true,
                health: BatteryHealth::Good,
            }),
        })
    }

    /// Simulate charger removal or re-insertion.
    pub fn set_plugged(&self, plugged: bool) {
        self.inner.lock().unwrap().plugged = plugged;
    }

    /// Inject a health condition (fault display demo).
    pub fn set_health(&self, health: BatteryHealth) {
        self.inner.lock().unwrap().health = health;
    }
}

impl BatterySource for SimBattery {
    fn snapshot(&self) -> BatterySnapshot {
        let state = self.inner.lock().unwrap();
        let gained = state.started.elapsed().as_secs().min(100);
        let level = (u64::from(state.base_level) + gained).min(100) as u8;
        let status = if !state.plugged {
            BatteryStatus::Discharging
        } else if level >= 100 {
            BatteryStatus::Full
        } else {
            BatteryStatus::Charging
        };
        BatterySnapshot {
            level_percent: level,
            status,
            health: state.health,
            ac_online: state.plugged,
            usb_online: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_severity_mapping() {
        // Only thermal and over-voltage conditions interrupt the display
        assert_eq!(fault_severity(BatteryHealth::Overheat), FaultSeverity::Overheat);
        assert_eq!(fault_severity(BatteryHealth::Cold), FaultSeverity::Cold);
        assert_eq!(fault_severity(BatteryHealth::OverVoltage), FaultSeverity::OverVoltage);
        assert_eq!(fault_severity(BatteryHealth::Good), FaultSeverity::None);
        assert_eq!(fault_severity(BatteryHealth::Unknown), FaultSeverity::None);
        assert_eq!(fault_severity(BatteryHealth::Dead), FaultSeverity::None);
        assert_eq!(
            fault_severity(BatteryHealth::UnspecifiedFailure),
            FaultSeverity::None
        );
    }

    #[test]
    fn test_fault_sprite_indices() {
        assert_eq!(FaultSeverity::None.sprite_index(), None);
        assert_eq!(FaultSeverity::Overheat.sprite_index(), Some(0));
        assert_eq!(FaultSeverity::Cold.sprite_index(), Some(1));
        assert_eq!(FaultSeverity::OverVoltage.sprite_index(), Some(2));
    }

    #[test]
    fn test_unpowered_requires_both_sources_absent() {
        let mut snap = BatterySnapshot {
            level_percent: 50,
            status: BatteryStatus::Charging,
            health: BatteryHealth::Good,
            ac_online: true,
            usb_online: false,
        };
        assert!(!snap.unpowered(), "AC alone keeps the device powered");

        snap.ac_online = false;
        snap.usb_online = true;
        assert!(!snap.unpowered(), "USB alone keeps the device powered");

        snap.usb_online = false;
        assert!(snap.unpowered(), "Neither source online means unpowered");
    }

    #[test]
    fn test_sysfs_status_and_health_parsing() {
        assert_eq!(BatteryStatus::from_sysfs("Charging\n"), BatteryStatus::Charging);
        assert_eq!(BatteryStatus::from_sysfs("Not charging"), BatteryStatus::NotCharging);
        assert_eq!(BatteryStatus::from_sysfs("garbage"), BatteryStatus::Unknown);

        assert_eq!(BatteryHealth::from_sysfs("Over voltage\n"), BatteryHealth::OverVoltage);
        assert_eq!(
            BatteryHealth::from_sysfs("Unspecified failure"),
            BatteryHealth::UnspecifiedFailure
        );
        assert_eq!(BatteryHealth::from_sysfs(""), BatteryHealth::Unknown);
    }

    #[test]
    fn test_sysfs_battery_missing_tree_fails_init() {
        assert!(
            SysfsBattery::new("/nonexistent/power_supply").is_err(),
            "An unreadable capacity file is a fatal init error"
        );
    }

    #[test]
    fn test_sysfs_battery_degrades_missing_fields() {
        let root = std::env::temp_dir().join(format!(
            "charge-screen-test-{}-power-supply",
            std::process::id()
        ));
        std::fs::create_dir_all(root.join("battery")).unwrap();
        std::fs::write(root.join("battery/capacity"), "57\n").unwrap();

        let battery = SysfsBattery::new(&root).unwrap();
        let snap = battery.snapshot();
        assert_eq!(snap.level_percent, 57);
        assert_eq!(snap.status, BatteryStatus::Unknown, "Missing status degrades");
        assert_eq!(snap.health, BatteryHealth::Unknown, "Missing health degrades");
        assert!(snap.unpowered(), "Missing online flags read as offline");

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_sim_battery_rejects_bad_start_level() {
        assert!(SimBattery::new(101).is_err(), "Levels above 100 are invalid");
        assert!(SimBattery::new(100).is_ok());
    }

    #[test]
    fn test_sim_battery_unplug_reports_discharging() {
        let battery = SimBattery::new(40).unwrap();
        assert_eq!(battery.snapshot().status, BatteryStatus::Charging);

        battery.set_plugged(false);
        let snap = battery.snapshot();
        assert_eq!(snap.status, BatteryStatus::Discharging);
        assert!(snap.unpowered());
    }
}
