//! Renderer and UI state machine — the render lock domain.
//!
//! All drawing funnels through a single [`Ui`] handle whose internal mutex is
//! the render lock of the system: the animation, charge, and input loops all
//! mutate display state through it, one at a time. Every mutator follows the
//! same shape: lock, update state, redraw if anything visible changed, flip.
//!
//! The redraw policy has three tiers:
//!
//! - An active battery fault replaces the bar with the fault sprite and pins
//!   `pages_identical` false, so clearing the fault forces a full repaint.
//! - A visible text overlay or menu repaints the whole screen (background
//!   plus text, no bar) and marks the two pages identical.
//! - Otherwise only the bar and percentage regions are repainted, the cheap
//!   steady-state path while the animation runs.
//!
//! Page flips happen under a [`FlipGate`] guard so the screen power
//! controller never blanks the panel mid-flip.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::{Baseline, Text};
use profont::PROFONT_24_POINT;

use crate::assets::{AssetSet, AssetStore};
use crate::battery::FaultSeverity;
use crate::colors::{ACCENT_BLUE, BLACK, WHITE, YELLOW};
use crate::config::{CHAR_HEIGHT, CHAR_WIDTH, FRAME_COUNT, MAX_COLS, MAX_ROWS};
use crate::screen::FlipGate;

// =============================================================================
// Page Flip Seam
// =============================================================================

/// Double-buffered surface hook. `flip` publishes the drawn frame; `sync`
/// copies the front page to the back page once at init so partial redraws
/// start from identical pages.
pub trait PageFlip {
    fn sync(&mut self) {}
    fn flip(&mut self);
}

// =============================================================================
// Progress Bar State
// =============================================================================

/// What the bar region is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressBarType {
    /// No bar drawn.
    None,
    /// Looping frame animation while charging.
    Indeterminate,
    /// Level- or scope-driven fill.
    Normal,
}

/// Background artwork selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundIcon {
    Charging,
}

/// Bar frame for a battery level: 0 maps to the empty frame, 100 to the full
/// one, linearly in between. Levels above 100 clamp.
pub const fn level_frame(level: u8) -> usize {
    let level = if level > 100 { 100 } else { level };
    level as usize * (FRAME_COUNT - 1) / 100
}

/// Scoped determinate progress: `set_progress` fractions apply within a
/// `[start, start + size]` slice of the whole bar, optionally advanced by
/// wall-clock time instead.
#[derive(Clone, Copy, Debug)]
struct ProgressScope {
    start: f32,
    size: f32,
    started_at: Option<Instant>,
    duration_s: u64,
}

impl ProgressScope {
    const fn idle() -> Self {
        Self {
            start: 0.0,
            size: 0.0,
            started_at: None,
            duration_s: 0,
        }
    }
}

// =============================================================================
// Text Overlay / Menu State
// =============================================================================

struct TextState {
    lines: [heapless::String<MAX_COLS>; MAX_ROWS],
    /// Ring index of the line currently being appended to.
    row: usize,
    col: usize,
    visible: bool,
}

struct MenuState {
    show: bool,
    lines: [heapless::String<MAX_COLS>; MAX_ROWS],
    header_count: usize,
    item_count: usize,
    /// Index within the items (headers are not selectable).
    selected: usize,
}

// =============================================================================
// Core (everything behind the render lock)
// =============================================================================

struct UiCore<D> {
    display: D,
    assets: AssetSet,
    width: u32,
    height: u32,
    /// Text grid geometry, derived from the framebuffer and font cell size.
    rows: usize,
    cols: usize,
    gate: Arc<FlipGate>,

    icon: Option<BackgroundIcon>,
    bar: ProgressBarType,
    /// Fraction within the current scope, 0..=1.
    progress: f32,
    scope: ProgressScope,
    /// Current indeterminate animation frame.
    frame: usize,
    level: u8,
    fault: FaultSeverity,
    /// True when both pages hold the same full-screen content, enabling the
    /// bar-only partial redraw.
    pages_identical: bool,
    text: TextState,
    menu: MenuState,
}

impl<D: DrawTarget<Color = Rgb565> + PageFlip> UiCore<D> {
    fn flip(&mut self) {
        let gate = Arc::clone(&self.gate);
        let _flip = gate.begin();
        self.display.flip();
    }

    fn redraw(&mut self) {
        if self.fault.is_fault() {
            self.draw_fault_screen();
            // Fault cleared means the next redraw must repaint everything
            self.pages_identical = false;
        } else if self.text.visible || self.menu.show || !self.pages_identical {
            self.draw_full_screen();
            self.pages_identical = true;
        } else {
            self.draw_bar_region();
        }
        self.flip();
    }

    // -- full repaints --------------------------------------------------------

    fn draw_full_screen(&mut self) {
        self.display.clear(BLACK).ok();
        if self.icon.is_some()
            && let Some(bg) = &self.assets.background
        {
            let p = Point::new(
                (self.width.saturating_sub(bg.width()) / 2) as i32,
                (self.height.saturating_sub(bg.height()) / 2) as i32,
            );
            bg.draw(&mut self.display, p).ok();
        }
        if self.text.visible || self.menu.show {
            self.draw_text_grid();
        } else {
            self.draw_bar();
            self.draw_percentage();
        }
    }

    fn draw_fault_screen(&mut self) {
        self.display.clear(BLACK).ok();
        let origin = self.bar_origin();
        if let Some(idx) = self.fault.sprite_index()
            && let Some(sprite) = &self.assets.fault[idx]
        {
            sprite.draw(&mut self.display, origin).ok();
        }
        self.draw_percentage();
    }

    // -- bar + percentage -----------------------------------------------------

    /// Top-left corner of the bar slot: centered horizontally, two thirds of
    /// the way down the panel.
    fn bar_origin(&self) -> Point {
        let bar_w = self.assets.bar_width();
        let bar_h = self.assets.bar_height();
        Point::new(
            (self.width.saturating_sub(bar_w) / 2) as i32,
            (self.height.saturating_sub(bar_h) * 2 / 3) as i32,
        )
    }

    /// Digits sit two digit-heights above the bar slot.
    fn percentage_top(&self) -> i32 {
        let digit_h = self.assets.bucket.digit_size().height as i32;
        (self.bar_origin().y - 2 * digit_h).max(0)
    }

    /// Partial repaint of just the bar and percentage regions, used when both
    /// pages already hold the same full-screen content.
    fn draw_bar_region(&mut self) {
        let top = self.percentage_top();
        let bottom = self.bar_origin().y + self.assets.bar_height() as i32;
        self.display
            .fill_solid(
                &Rectangle::new(
                    Point::new(0, top),
                    Size::new(self.width, (bottom - top).max(0) as u32),
                ),
                BLACK,
            )
            .ok();
        self.draw_bar();
        self.draw_percentage();
    }

    fn draw_bar(&mut self) {
        let frame = match self.bar {
            ProgressBarType::None => return,
            ProgressBarType::Indeterminate => self.frame,
            ProgressBarType::Normal => self.normal_frame(),
        };
        let origin = self.bar_origin();
        if let Some(sprite) = &self.assets.bar_frames[frame.min(FRAME_COUNT - 1)] {
            sprite.draw(&mut self.display, origin).ok();
        }
    }

    /// Frame index for the determinate bar: the scope fraction when a scope
    /// is active, the battery level otherwise.
    fn normal_frame(&self) -> usize {
        if self.scope.size > 0.0 {
            let overall = (self.scope.start + self.progress * self.scope.size).clamp(0.0, 1.0);
            (overall * (FRAME_COUNT - 1) as f32) as usize
        } else {
            level_frame(self.level)
        }
    }

    fn draw_percentage(&mut self) {
        let level = self.level.min(100);

        // Decimal digits, most significant first
        let mut digits = [0u8; 3];
        let mut count = 0;
        let mut v = level;
        loop {
            digits[count] = v % 10;
            count += 1;
            v /= 10;
            if v == 0 {
                break;
            }
        }
        digits[..count].reverse();

        let have_sprites = self.assets.percent.is_some()
            && digits[..count]
                .iter()
                .all(|&d| self.assets.digits[d as usize].is_some());
        if !have_sprites {
            // Device bitmaps absent: fall back to a rasterized font
            let style = MonoTextStyle::new(&PROFONT_24_POINT, WHITE);
            let mut label = heapless::String::<8>::new();
            let _ = core::fmt::Write::write_fmt(&mut label, format_args!("{level}%"));
            Text::with_baseline(
                label.as_str(),
                Point::new((self.width / 2) as i32 - 24, self.percentage_top()),
                style,
                Baseline::Top,
            )
            .draw(&mut self.display)
            .ok();
            return;
        }

        let digit_size = self.assets.bucket.digit_size();
        let total_w = digit_size.width * (count as u32 + 1);
        let mut x = (self.width.saturating_sub(total_w) / 2) as i32;
        let y = self.percentage_top();
        for &d in &digits[..count] {
            if let Some(sprite) = &self.assets.digits[d as usize] {
                sprite.draw(&mut self.display, Point::new(x, y)).ok();
            }
            x += digit_size.width as i32;
        }
        if let Some(percent) = &self.assets.percent {
            percent.draw(&mut self.display, Point::new(x, y)).ok();
        }
    }

    // -- text overlay + menu --------------------------------------------------

    fn draw_text_grid(&mut self) {
        let mut row = 0usize;

        if self.menu.show {
            let total = self.menu.header_count + self.menu.item_count;
            for i in 0..total.min(self.rows) {
                let y = (row as u32 * CHAR_HEIGHT) as i32;
                let is_selected =
                    i >= self.menu.header_count && i - self.menu.header_count == self.menu.selected;
                if is_selected {
                    self.display
                        .fill_solid(
                            &Rectangle::new(Point::new(0, y), Size::new(self.width, CHAR_HEIGHT)),
                            ACCENT_BLUE,
                        )
                        .ok();
                }
                let color = if is_selected { WHITE } else { ACCENT_BLUE };
                Text::with_baseline(
                    self.menu.lines[i].as_str(),
                    Point::new(0, y),
                    MonoTextStyle::new(&FONT_10X20, color),
                    Baseline::Top,
                )
                .draw(&mut self.display)
                .ok();
                row += 1;
            }
            // Separator between the menu and the scrolling log
            let y = (row as u32 * CHAR_HEIGHT + CHAR_HEIGHT / 2) as i32;
            self.display
                .fill_solid(
                    &Rectangle::new(Point::new(0, y), Size::new(self.width, 2)),
                    ACCENT_BLUE,
                )
                .ok();
            row += 1;
        }

        // Log lines fill the remaining rows bottom-up, newest at the bottom
        let style = MonoTextStyle::new(&FONT_10X20, YELLOW);
        let mut src = self.text.row;
        for screen_row in (row..self.rows).rev() {
            let line = &self.text.lines[src];
            if !line.is_empty() {
                Text::with_baseline(
                    line.as_str(),
                    Point::new(0, (screen_row as u32 * CHAR_HEIGHT) as i32),
                    style,
                    Baseline::Top,
                )
                .draw(&mut self.display)
                .ok();
            }
            src = (src + self.rows - 1) % self.rows;
        }
    }

    fn append_char(&mut self, ch: char) {
        if ch == '\n' || self.text.col >= self.cols {
            self.text.row = (self.text.row + 1) % self.rows;
            self.text.col = 0;
            self.text.lines[self.text.row].clear();
        }
        if ch != '\n' {
            let _ = self.text.lines[self.text.row].push(ch);
            self.text.col += 1;
        }
    }
}

// =============================================================================
// Public Handle
// =============================================================================

/// Thread-shared UI handle. Cheap to share via `Arc`; every method takes the
/// render lock for its full duration.
pub struct Ui<D> {
    core: Mutex<UiCore<D>>,
}

impl<D: DrawTarget<Color = Rgb565> + PageFlip> Ui<D> {
    /// Build the renderer around a surface: pick the asset bucket from the
    /// surface dimensions, load the sprite set, derive the text grid.
    pub fn new(mut display: D, store: &dyn AssetStore, gate: Arc<FlipGate>) -> Self {
        let size = display.bounding_box().size;
        let assets = AssetSet::load(store, size.width, size.height);
        display.sync();

        let rows = ((size.height / CHAR_HEIGHT) as usize).clamp(1, MAX_ROWS);
        let cols = ((size.width / CHAR_WIDTH) as usize).clamp(1, MAX_COLS - 1);
        log::info!(
            "renderer init: {}x{}, bucket {:?}, text grid {cols}x{rows}",
            size.width,
            size.height,
            assets.bucket
        );

        Self {
            core: Mutex::new(UiCore {
                display,
                assets,
                width: size.width,
                height: size.height,
                rows,
                cols,
                gate,
                icon: None,
                bar: ProgressBarType::None,
                progress: 0.0,
                scope: ProgressScope::idle(),
                frame: 0,
                level: 0,
                fault: FaultSeverity::None,
                pages_identical: false,
                text: TextState {
                    lines: core::array::from_fn(|_| heapless::String::new()),
                    row: 0,
                    col: 0,
                    visible: false,
                },
                menu: MenuState {
                    show: false,
                    lines: core::array::from_fn(|_| heapless::String::new()),
                    header_count: 0,
                    item_count: 0,
                    selected: 0,
                },
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, UiCore<D>> {
        self.core.lock().unwrap()
    }

    // -- background + bar mode ------------------------------------------------

    /// Select the background artwork and force a full repaint.
    pub fn set_background(&self, icon: Option<BackgroundIcon>) {
        let mut core = self.lock();
        core.icon = icon;
        core.pages_identical = false;
        core.redraw();
    }

    /// Switch the bar to the looping charge animation. No-op if already
    /// indeterminate, so the charge loop can call this every poll.
    pub fn show_indeterminate_progress(&self) {
        let mut core = self.lock();
        if core.bar != ProgressBarType::Indeterminate {
            core.bar = ProgressBarType::Indeterminate;
            core.frame = 0;
            core.redraw();
        }
    }

    /// Switch the bar to the level-driven fill. No-op if already normal.
    pub fn show_normal_progress(&self) {
        let mut core = self.lock();
        if core.bar != ProgressBarType::Normal {
            core.bar = ProgressBarType::Normal;
            core.redraw();
        }
    }

    /// Open a determinate progress scope covering `portion` of the bar,
    /// optionally auto-advancing over `seconds`. Consecutive scopes stack:
    /// each new scope starts where the previous one ended.
    pub fn show_progress(&self, portion: f32, seconds: u64) {
        let mut core = self.lock();
        core.scope.start += core.scope.size;
        core.scope.size = portion.clamp(0.0, 1.0 - core.scope.start);
        core.scope.duration_s = seconds;
        core.scope.started_at = (seconds > 0).then(Instant::now);
        core.progress = 0.0;
        core.bar = ProgressBarType::Normal;
        core.redraw();
    }

    /// Advance the scoped progress fraction. Regressions are ignored, and a
    /// redraw only happens when the bar moves by at least one pixel.
    pub fn set_progress(&self, fraction: f32) {
        let mut core = self.lock();
        if core.bar != ProgressBarType::Normal {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction <= core.progress {
            return;
        }
        let scale = core.assets.bar_width() as f32 * core.scope.size;
        let moved = (fraction * scale) as i32 != (core.progress * scale) as i32;
        core.progress = fraction;
        if moved {
            core.redraw();
        }
    }

    /// Clear the bar entirely and reset the scope chain.
    pub fn reset_progress(&self) {
        let mut core = self.lock();
        core.bar = ProgressBarType::None;
        core.scope = ProgressScope::idle();
        core.progress = 0.0;
        core.redraw();
    }

    // -- battery state --------------------------------------------------------

    /// Record a new battery level. Repaints only when the level changed.
    pub fn update_level(&self, level: u8) {
        let mut core = self.lock();
        if core.level != level {
            core.level = level;
            core.redraw();
        }
    }

    /// Record the battery fault severity. A displayed fault repaints on
    /// every report so the icon outlives whatever was drawn in between;
    /// clearing one repaints once, and repeated clears do nothing.
    pub fn set_fault(&self, fault: FaultSeverity) {
        let mut core = self.lock();
        if core.fault == fault && !fault.is_fault() {
            return;
        }
        core.fault = fault;
        core.redraw();
    }

    // -- animation ------------------------------------------------------------

    /// One animation-loop tick: advance the indeterminate frame, or the
    /// time-driven scope fraction. Does nothing while the text overlay is up
    /// or a fault is displayed.
    pub fn tick_animation(&self) {
        let mut core = self.lock();
        if core.text.visible || core.menu.show || core.fault.is_fault() {
            return;
        }
        match core.bar {
            ProgressBarType::Indeterminate => {
                core.frame = (core.frame + 1) % FRAME_COUNT;
                core.redraw();
            }
            ProgressBarType::Normal => {
                let (Some(started), duration) = (core.scope.started_at, core.scope.duration_s)
                else {
                    return;
                };
                if duration == 0 {
                    return;
                }
                let fraction =
                    (started.elapsed().as_secs_f32() / duration as f32).clamp(0.0, 1.0);
                if fraction > core.progress {
                    let before = core.normal_frame();
                    core.progress = fraction;
                    if core.normal_frame() != before {
                        core.redraw();
                    }
                }
            }
            ProgressBarType::None => {}
        }
    }

    // -- text overlay ---------------------------------------------------------

    /// Append a line to the scrolling log, wrapping at the column limit.
    /// Repaints only while the overlay is visible.
    pub fn print_line(&self, text: &str) {
        let mut core = self.lock();
        for ch in text.chars() {
            core.append_char(ch);
        }
        core.append_char('\n');
        if core.text.visible {
            core.redraw();
        }
    }

    /// Show or hide the text overlay.
    pub fn set_overlay_visible(&self, visible: bool) {
        let mut core = self.lock();
        if core.text.visible != visible {
            core.text.visible = visible;
            core.pages_identical = false;
            core.redraw();
        }
    }

    pub fn text_visible(&self) -> bool {
        let core = self.lock();
        core.text.visible || core.menu.show
    }

    // -- menu -----------------------------------------------------------------

    /// Display a menu with non-selectable header lines above the items.
    /// Lines are truncated to the column limit.
    pub fn start_menu(&self, headers: &[&str], items: &[&str]) {
        let mut core = self.lock();
        let cols = core.cols;
        let mut row = 0;
        for &line in headers.iter().chain(items).take(MAX_ROWS) {
            core.menu.lines[row].clear();
            for ch in line.chars().take(cols) {
                let _ = core.menu.lines[row].push(ch);
            }
            row += 1;
        }
        core.menu.header_count = headers.len().min(row);
        core.menu.item_count = row - core.menu.header_count;
        core.menu.selected = 0;
        core.menu.show = true;
        core.pages_identical = false;
        core.redraw();
    }

    /// Move the menu selection. The input is clamped into the valid item
    /// range before anything else, so an out-of-range request can never
    /// escape as a selection index.
    pub fn menu_select(&self, sel: i32) -> i32 {
        let mut core = self.lock();
        let clamped = sel.clamp(0, core.menu.item_count.max(1) as i32 - 1);
        if !core.menu.show {
            return clamped;
        }
        if core.menu.selected != clamped as usize {
            core.menu.selected = clamped as usize;
            core.redraw();
        }
        clamped
    }

    /// Dismiss the menu and repaint.
    pub fn end_menu(&self) {
        let mut core = self.lock();
        if core.menu.show {
            core.menu.show = false;
            core.menu.item_count = 0;
            core.menu.header_count = 0;
            core.pages_identical = false;
            core.redraw();
        }
    }

    // -- surface access -------------------------------------------------------

    /// Run a closure against the surface under the render lock. The window
    /// pump uses this to push the framebuffer to the host window.
    pub fn present<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        let core = self.lock();
        f(&core.display)
    }

    #[cfg(test)]
    fn frame(&self) -> usize {
        self.lock().frame
    }

    #[cfg(test)]
    fn last_log_line(&self) -> String {
        let core = self.lock();
        core.text.lines[core.text.row].as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;
    use crate::assets::SimAssets;

    /// Discards all pixels, counts flips. 480x800 picks the mid bucket.
    struct TestSurface {
        size: Size,
        flips: usize,
    }

    impl TestSurface {
        fn new() -> Self {
            Self {
                size: Size::new(480, 800),
                flips: 0,
            }
        }
    }

    impl OriginDimensions for TestSurface {
        fn size(&self) -> Size {
            self.size
        }
    }

    impl DrawTarget for TestSurface {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Ok(())
        }
    }

    impl PageFlip for TestSurface {
        fn flip(&mut self) {
            self.flips += 1;
        }
    }

    fn ui() -> Ui<TestSurface> {
        Ui::new(TestSurface::new(), &SimAssets, FlipGate::new())
    }

    fn flips(ui: &Ui<TestSurface>) -> usize {
        ui.present(|d| d.flips)
    }

    // -------------------------------------------------------------------------
    // Frame Mapping
    // -------------------------------------------------------------------------

    #[test]
    fn test_level_frame_endpoints_and_midpoint() {
        assert_eq!(level_frame(0), 0, "Empty battery shows the empty frame");
        assert_eq!(
            level_frame(100),
            FRAME_COUNT - 1,
            "Full battery shows the full frame"
        );
        assert_eq!(level_frame(50), (FRAME_COUNT - 1) / 2);
    }

    #[test]
    fn test_level_frame_clamps_above_100() {
        assert_eq!(level_frame(255), FRAME_COUNT - 1);
    }

    #[test]
    fn test_level_frame_monotonic() {
        let mut prev = 0;
        for level in 0..=100 {
            let frame = level_frame(level);
            assert!(frame >= prev, "Frame index must not regress as level rises");
            assert!(frame < FRAME_COUNT);
            prev = frame;
        }
    }

    // -------------------------------------------------------------------------
    // Indeterminate Animation
    // -------------------------------------------------------------------------

    #[test]
    fn test_indeterminate_frame_wraps_modulo() {
        let ui = ui();
        ui.show_indeterminate_progress();
        assert_eq!(ui.frame(), 0);

        for _ in 0..FRAME_COUNT {
            ui.tick_animation();
        }
        assert_eq!(
            ui.frame(),
            0,
            "A full cycle of ticks must wrap back to frame 0"
        );
        ui.tick_animation();
        assert_eq!(ui.frame(), 1);
    }

    #[test]
    fn test_show_indeterminate_is_edge_triggered() {
        let ui = ui();
        ui.show_indeterminate_progress();
        let after_first = flips(&ui);
        ui.show_indeterminate_progress();
        ui.show_indeterminate_progress();
        assert_eq!(
            flips(&ui),
            after_first,
            "Re-requesting the current bar type must not repaint"
        );
    }

    #[test]
    fn test_overlay_suppresses_animation() {
        let ui = ui();
        ui.show_indeterminate_progress();
        ui.set_overlay_visible(true);

        let before = flips(&ui);
        ui.tick_animation();
        ui.tick_animation();
        assert_eq!(flips(&ui), before, "No animation repaints behind the overlay");
        assert_eq!(ui.frame(), 0, "Frame counter holds while the overlay is up");
    }

    #[test]
    fn test_fault_suppresses_animation() {
        let ui = ui();
        ui.show_indeterminate_progress();
        ui.set_fault(FaultSeverity::Overheat);

        let before = flips(&ui);
        ui.tick_animation();
        assert_eq!(flips(&ui), before);
    }

    // -------------------------------------------------------------------------
    // Determinate Progress
    // -------------------------------------------------------------------------

    #[test]
    fn test_set_progress_ignores_regression() {
        let ui = ui();
        ui.show_progress(1.0, 0);
        ui.set_progress(0.5);
        let after_advance = flips(&ui);

        ui.set_progress(0.3);
        ui.set_progress(0.5);
        assert_eq!(
            flips(&ui),
            after_advance,
            "Backwards or equal fractions must not repaint"
        );
    }

    #[test]
    fn test_set_progress_subpixel_advance_records_without_repaint() {
        let ui = ui();
        ui.show_progress(1.0, 0);
        ui.set_progress(0.5);
        let after_advance = flips(&ui);

        // On the 320px bar 0.5 and 0.501 land in the same pixel column
        ui.set_progress(0.501);
        assert_eq!(
            flips(&ui),
            after_advance,
            "A forward move smaller than one pixel must not repaint"
        );
        let core = ui.lock();
        assert!(
            (core.progress - 0.501).abs() < f32::EPSILON,
            "The fraction itself still advances"
        );
    }

    #[test]
    fn test_set_progress_without_normal_bar_is_ignored() {
        let ui = ui();
        ui.show_indeterminate_progress();
        let before = flips(&ui);
        ui.set_progress(0.9);
        assert_eq!(flips(&ui), before);
    }

    #[test]
    fn test_progress_scopes_stack() {
        let ui = ui();
        ui.show_progress(0.5, 0);
        ui.set_progress(1.0);
        // Second scope starts at the midpoint left by the first
        ui.show_progress(0.5, 0);
        let core = ui.lock();
        assert!((core.scope.start - 0.5).abs() < f32::EPSILON);
        assert!((core.scope.size - 0.5).abs() < f32::EPSILON);
    }

    // -------------------------------------------------------------------------
    // Level + Fault
    // -------------------------------------------------------------------------

    #[test]
    fn test_update_level_repaints_on_change_only() {
        let ui = ui();
        ui.show_normal_progress();
        ui.update_level(42);
        let after_change = flips(&ui);
        ui.update_level(42);
        assert_eq!(flips(&ui), after_change, "Same level, no repaint");
        ui.update_level(43);
        assert_eq!(flips(&ui), after_change + 1);
    }

    #[test]
    fn test_fault_repaints_every_report_until_cleared() {
        let ui = ui();
        let base = flips(&ui);
        ui.set_fault(FaultSeverity::Cold);
        ui.set_fault(FaultSeverity::Cold);
        assert_eq!(
            flips(&ui),
            base + 2,
            "A displayed fault repaints on every report"
        );
        ui.set_fault(FaultSeverity::None);
        assert_eq!(flips(&ui), base + 3, "Clearing it repaints once more");
        ui.set_fault(FaultSeverity::None);
        assert_eq!(flips(&ui), base + 3, "Repeated clears do not repaint");
    }

    // -------------------------------------------------------------------------
    // Text Overlay
    // -------------------------------------------------------------------------

    #[test]
    fn test_print_line_hidden_overlay_does_not_repaint() {
        let ui = ui();
        let before = flips(&ui);
        ui.print_line("charging at 42%");
        assert_eq!(flips(&ui), before, "Hidden overlay buffers without painting");
    }

    #[test]
    fn test_print_line_wraps_at_column_limit() {
        let ui = ui();
        let cols = ui.lock().cols;
        let long: String = "x".repeat(cols + 5);
        ui.print_line(&long);
        // The wrapped tail landed on a fresh ring line; print_line's own
        // trailing newline then opened the next (empty) one
        assert!(ui.last_log_line().is_empty());
        let core = ui.lock();
        let prev = (core.text.row + core.rows - 1) % core.rows;
        assert_eq!(core.text.lines[prev].as_str(), "xxxxx");
    }

    #[test]
    fn test_overlay_visibility_round_trip() {
        let ui = ui();
        assert!(!ui.text_visible());
        ui.set_overlay_visible(true);
        assert!(ui.text_visible());
        ui.set_overlay_visible(false);
        assert!(!ui.text_visible());
    }

    // -------------------------------------------------------------------------
    // Menu
    // -------------------------------------------------------------------------

    #[test]
    fn test_menu_select_clamps_both_ends() {
        let ui = ui();
        ui.start_menu(&["Charge options:"], &["Continue", "Reboot", "Power off"]);

        assert_eq!(ui.menu_select(-5), 0, "Below range clamps to the first item");
        assert_eq!(ui.menu_select(99), 2, "Above range clamps to the last item");
        assert_eq!(ui.menu_select(1), 1);
    }

    #[test]
    fn test_menu_select_without_menu_still_clamps() {
        let ui = ui();
        assert_eq!(ui.menu_select(-3), 0);
        assert_eq!(ui.menu_select(7), 0, "No items, so everything clamps to 0");
    }

    #[test]
    fn test_menu_makes_text_grid_visible_and_end_restores() {
        let ui = ui();
        ui.start_menu(&[], &["Only item"]);
        assert!(ui.text_visible());
        ui.end_menu();
        assert!(!ui.text_visible());
    }
}
