//! RTC validity probe and wake-alarm flag files.
//!
//! Two small vendor files persist wake timestamps across the powered-off
//! state: an alarm flag and a scheduled-power-on flag. Each holds a marker
//! line followed by a decimal epoch-seconds timestamp. When the wake-alarm
//! key fires, the input loop asks whether either timestamp is imminent or
//! recently due; if so the device restarts into the alarm path instead of
//! staying on the charging screen.
//!
//! The wake window is half-open: an alarm that passed exactly 20 s ago is
//! outside, one firing exactly 180 s from now is inside.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{ALARM_LOOKAHEAD_S, ALARM_RECENT_GRACE_S};

/// Vendor alarm flag file.
pub const ALARM_FLAG_PATH: &str = "/mnt/vendor/alarm_flag";

/// Vendor scheduled-power-on file.
pub const POWERON_FLAG_PATH: &str = "/mnt/vendor/poweron_timeinmillis";

/// Sysfs RTC readout used for the one-shot validity probe.
pub const RTC_TIME_PATH: &str = "/sys/class/rtc/rtc0/time";

// =============================================================================
// Wake Window
// =============================================================================

/// True when a schedule delta (`scheduled - now`, seconds) counts as an
/// active wake: up to [`ALARM_RECENT_GRACE_S`] in the past (exclusive) or up
/// to [`ALARM_LOOKAHEAD_S`] ahead (inclusive).
pub const fn in_wake_window(delta_s: i64) -> bool {
    delta_s > -ALARM_RECENT_GRACE_S && delta_s <= ALARM_LOOKAHEAD_S
}

/// Seconds since the Unix epoch.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

// =============================================================================
// Flag File Parsing
// =============================================================================

/// Extract the timestamp from a flag file body: a marker line, then a decimal
/// seconds value. An erased-flash body (leading `0xff`) or a missing second
/// line yields `None`.
pub fn parse_flag_file(contents: &[u8]) -> Option<i64> {
    if contents.first() == Some(&0xff) {
        return None;
    }
    let newline = contents.iter().position(|&b| b == b'\n')?;
    let rest = &contents[newline + 1..];
    let digits: &[u8] = match rest.iter().position(|b| !b.is_ascii_digit()) {
        Some(0) => return None,
        Some(end) => &rest[..end],
        None if rest.is_empty() => return None,
        None => rest,
    };
    std::str::from_utf8(digits).ok()?.parse().ok()
}

// =============================================================================
// Alarm Flags
// =============================================================================

/// Reader for the two wake-timestamp files.
pub struct AlarmFlags {
    alarm_path: PathBuf,
    poweron_path: PathBuf,
}

impl AlarmFlags {
    pub fn new(alarm_path: impl Into<PathBuf>, poweron_path: impl Into<PathBuf>) -> Self {
        Self {
            alarm_path: alarm_path.into(),
            poweron_path: poweron_path.into(),
        }
    }

    /// The production vendor-partition paths.
    pub fn system() -> Self {
        Self::new(ALARM_FLAG_PATH, POWERON_FLAG_PATH)
    }

    fn read_timestamp(path: &Path) -> Option<i64> {
        match std::fs::read(path) {
            Ok(contents) => {
                let ts = parse_flag_file(&contents);
                if let Some(ts) = ts {
                    log::debug!("{}: wake timestamp {ts}", path.display());
                }
                ts
            }
            Err(err) => {
                // Absent flag files are the normal no-alarm case
                log::debug!("{}: {err}", path.display());
                None
            }
        }
    }

    /// True when either file's timestamp falls in the wake window around
    /// `now_s`.
    pub fn alarm_active(&self, now_s: i64) -> bool {
        [&self.alarm_path, &self.poweron_path]
            .into_iter()
            .filter_map(|path| Self::read_timestamp(path))
            .any(|ts| in_wake_window(ts - now_s))
    }
}

// =============================================================================
// RTC Probe
// =============================================================================

/// One-shot RTC validity check before UI init. A readable, non-empty time
/// file means the clock is running; anything else is logged and tolerated —
/// the alarm path simply won't match until the clock is set.
pub fn validate_rtc_time(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(contents) if !contents.trim().is_empty() => {
            log::debug!("rtc time: {}", contents.trim());
            true
        }
        Ok(_) => {
            log::error!("rtc time file {} is empty", path.display());
            false
        }
        Err(err) => {
            log::error!("open rtc time file {} failed: {err}", path.display());
            false
        }
    }
}
