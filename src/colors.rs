//! Color constants for the charging screen.
//!
//! Rgb565 is the native format of the simulated panel (5 bits red, 6 bits
//! green, 5 bits blue). Standard colors come from the `RgbColor` trait
//! constants; the rest are application-specific.

use embedded_graphics::pixelcolor::{Rgb565, RgbColor};

// =============================================================================
// Standard Colors
// =============================================================================

/// Pure black. Screen background.
pub const BLACK: Rgb565 = Rgb565::BLACK;

/// Pure white. Percentage digits and menu highlight text.
pub const WHITE: Rgb565 = Rgb565::WHITE;

/// Pure yellow. Text-overlay lines.
pub const YELLOW: Rgb565 = Rgb565::YELLOW;

// =============================================================================
// Application Colors
// =============================================================================

/// Accent blue used for the menu selection bar and separators.
/// RGB565 approximation of the classic (64, 96, 255) recovery blue.
pub const ACCENT_BLUE: Rgb565 = Rgb565::new(8, 24, 31);

/// Progress bar fill.
pub const BAR_FILL: Rgb565 = ACCENT_BLUE;

/// Progress bar empty track, slightly above black so the bar outline reads.
pub const BAR_TRACK: Rgb565 = Rgb565::new(4, 8, 4);

/// Overheat fault block.
pub const FAULT_RED: Rgb565 = Rgb565::RED;

/// Cold fault block.
pub const COLD_BLUE: Rgb565 = Rgb565::new(10, 30, 31);

/// Over-voltage fault block.
pub const OVERVOLT_ORANGE: Rgb565 = Rgb565::new(31, 32, 0);
