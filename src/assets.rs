//! Resolution-bucketed sprite assets for the charging screen.
//!
//! Percentage digits, the progress bar frames, and the fault icons are
//! pre-scaled bitmaps, one set per resolution bucket. The bucket is chosen
//! once at initialization from the framebuffer dimensions; after that every
//! lookup is by plain name (`indeterminate3_480X800`, `number_7_480X800`,
//! ...). A store miss degrades the element to absent, it never aborts
//! rendering.
//!
//! # Bucket Quirks
//!
//! - 480×854 panels reuse the 480×800 asset set (the extra rows stay black).
//! - Anything above 1440×2560 clamps to the largest bucket rather than
//!   failing init.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::config::FRAME_COUNT;

// =============================================================================
// Resolution Buckets
// =============================================================================

/// Discrete asset-size tiers. Selected once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResBucket {
    R360x640,
    R480x800,
    R720x1280,
    R1080x1920,
    R1440x2560,
}

impl ResBucket {
    /// Pick the bucket for a framebuffer size.
    pub fn for_size(width: u32, height: u32) -> Self {
        if width <= 360 && height <= 640 {
            Self::R360x640
        } else if width <= 480 && height <= 800 {
            Self::R480x800
        } else if width <= 480 && height <= 854 {
            // 480x854 panels use the 480x800 asset set
            Self::R480x800
        } else if width <= 720 && height <= 1280 {
            Self::R720x1280
        } else if width <= 1080 && height <= 1920 {
            Self::R1080x1920
        } else if width <= 1440 && height <= 2560 {
            Self::R1440x2560
        } else {
            log::error!("framebuffer {width}x{height} is not a standard size, clamping");
            Self::R1440x2560
        }
    }

    /// Asset name suffix for this bucket.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::R360x640 => "_360X640",
            Self::R480x800 => "_480X800",
            Self::R720x1280 => "_720X1280",
            Self::R1080x1920 => "_1080X1920",
            Self::R1440x2560 => "_1440X2560",
        }
    }

    /// Progress bar sprite size in this bucket.
    pub const fn bar_size(self) -> Size {
        match self {
            Self::R360x640 => Size::new(240, 28),
            Self::R480x800 => Size::new(320, 36),
            Self::R720x1280 => Size::new(480, 54),
            Self::R1080x1920 => Size::new(720, 80),
            Self::R1440x2560 => Size::new(960, 108),
        }
    }

    /// Percentage digit sprite size in this bucket.
    pub const fn digit_size(self) -> Size {
        match self {
            Self::R360x640 => Size::new(18, 30),
            Self::R480x800 => Size::new(24, 40),
            Self::R720x1280 => Size::new(36, 60),
            Self::R1080x1920 => Size::new(54, 90),
            Self::R1440x2560 => Size::new(72, 120),
        }
    }
}

// =============================================================================
// Sprite
// =============================================================================

/// An owned RGB565 bitmap, blittable onto any compatible draw target.
#[derive(Clone)]
pub struct Sprite {
    size: Size,
    pixels: Vec<Rgb565>,
}

impl Sprite {
    /// Solid-color sprite.
    pub fn solid(size: Size, color: Rgb565) -> Self {
        Self {
            size,
            pixels: vec![color; (size.width * size.height) as usize],
        }
    }

    pub const fn width(&self) -> u32 {
        self.size.width
    }

    pub const fn height(&self) -> u32 {
        self.size.height
    }

    /// Blit the sprite with its top-left corner at `top_left`.
    pub fn draw<D>(&self, display: &mut D, top_left: Point) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        display.fill_contiguous(
            &Rectangle::new(top_left, self.size),
            self.pixels.iter().copied(),
        )
    }
}

/// Draw target over a [`Sprite`]'s pixel buffer, used to rasterize generated
/// assets with embedded-graphics primitives and fonts.
pub struct SpriteCanvas {
    sprite: Sprite,
}

impl SpriteCanvas {
    pub fn new(size: Size, background: Rgb565) -> Self {
        Self {
            sprite: Sprite::solid(size, background),
        }
    }

    pub fn into_sprite(self) -> Sprite {
        self.sprite
    }
}

impl OriginDimensions for SpriteCanvas {
    fn size(&self) -> Size {
        self.sprite.size
    }
}

impl DrawTarget for SpriteCanvas {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let width = self.sprite.size.width as i32;
        let height = self.sprite.size.height as i32;
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.x < width && point.y >= 0 && point.y < height {
                let idx = (point.y * width + point.x) as usize;
                self.sprite.pixels[idx] = color;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Asset Store + Loaded Set
// =============================================================================

/// Named-asset lookup. `None` means the asset is missing from the store.
pub trait AssetStore {
    fn lookup(&self, name: &str) -> Option<Sprite>;
}

/// All sprites the renderer needs, resolved once at init time. Missing
/// entries are logged and stay `None`; the renderer skips them.
pub struct AssetSet {
    pub bucket: ResBucket,
    /// Bar animation frames, empty (0) through full (`FRAME_COUNT - 1`).
    pub bar_frames: [Option<Sprite>; FRAME_COUNT],
    /// Percentage digits 0-9.
    pub digits: [Option<Sprite>; 10],
    /// The percent sign, drawn after the digits.
    pub percent: Option<Sprite>,
    /// Fault icons: overheat, cold, over-voltage.
    pub fault: [Option<Sprite>; 3],
    /// Charging background icon, centered behind everything.
    pub background: Option<Sprite>,
}

impl AssetSet {
    /// Resolve the bucket for `width`×`height` and load every named sprite.
    pub fn load(store: &dyn AssetStore, width: u32, height: u32) -> Self {
        let bucket = ResBucket::for_size(width, height);
        let suffix = bucket.suffix();

        let fetch = |name: String| -> Option<Sprite> {
            let sprite = store.lookup(&name);
            if sprite.is_none() {
                log::warn!("missing bitmap {name}");
            }
            sprite
        };

        Self {
            bucket,
            bar_frames: core::array::from_fn(|i| fetch(format!("indeterminate{i}{suffix}"))),
            digits: core::array::from_fn(|d| fetch(format!("number_{d}{suffix}"))),
            percent: fetch(format!("number_percent{suffix}")),
            fault: core::array::from_fn(|k| fetch(format!("error_{}{suffix}", k + 1))),
            background: fetch(format!("background_charging{suffix}")),
        }
    }

    /// Width of the progress bar region, from the first available frame.
    pub fn bar_width(&self) -> u32 {
        self.bar_frames
            .iter()
            .flatten()
            .next()
            .map_or(0, Sprite::width)
    }

    /// Height of the progress bar region, from the first available frame.
    pub fn bar_height(&self) -> u32 {
        self.bar_frames
            .iter()
            .flatten()
            .next()
            .map_or(0, Sprite::height)
    }
}

// =============================================================================
// Generated Simulator Assets
// =============================================================================

/// Procedural asset store for the desktop front end. Bar frames are partial
/// fills, digits are rasterized from ProFont, fault icons are solid warning
/// blocks. Real devices ship pre-rendered bitmaps under the same names.
pub struct SimAssets;

impl SimAssets {
    fn bar_frame(bucket: ResBucket, index: usize) -> Sprite {
        use crate::colors::{BAR_FILL, BAR_TRACK};

        let size = bucket.bar_size();
        let mut canvas = SpriteCanvas::new(size, BAR_TRACK);
        let filled = size.width * index as u32 / (FRAME_COUNT as u32 - 1);
        if filled > 0 {
            Rectangle::new(Point::zero(), Size::new(filled, size.height))
                .into_styled(embedded_graphics::primitives::PrimitiveStyle::with_fill(
                    BAR_FILL,
                ))
                .draw(&mut canvas)
                .ok();
        }
        canvas.into_sprite()
    }

    fn glyph(bucket: ResBucket, ch: char) -> Sprite {
        use embedded_graphics::mono_font::MonoTextStyle;
        use embedded_graphics::text::Text;
        use profont::PROFONT_24_POINT;

        use crate::colors::WHITE;

        let size = bucket.digit_size();
        let mut canvas = SpriteCanvas::new(size, Rgb565::BLACK);
        let mut buf = [0u8; 4];
        let baseline = size.height as i32 - size.height as i32 / 5;
        Text::new(
            ch.encode_utf8(&mut buf),
            Point::new(2, baseline),
            MonoTextStyle::new(&PROFONT_24_POINT, WHITE),
        )
        .draw(&mut canvas)
        .ok();
        canvas.into_sprite()
    }

    fn fault_block(bucket: ResBucket, index: usize) -> Sprite {
        use crate::colors::{COLD_BLUE, FAULT_RED, OVERVOLT_ORANGE};

        let color = match index {
            0 => FAULT_RED,
            1 => COLD_BLUE,
            _ => OVERVOLT_ORANGE,
        };
        Sprite::solid(bucket.bar_size(), color)
    }
}

impl AssetStore for SimAssets {
    fn lookup(&self, name: &str) -> Option<Sprite> {
        // Recover the bucket from the name suffix, then the asset kind from
        // the stem. Unknown names (e.g. the background icon, which the
        // simulator does not provide) miss and degrade to absent.
        let bucket = [
            ResBucket::R360x640,
            ResBucket::R480x800,
            ResBucket::R720x1280,
            ResBucket::R1080x1920,
            ResBucket::R1440x2560,
        ]
        .into_iter()
        .find(|b| name.ends_with(b.suffix()))?;
        let stem = name.strip_suffix(bucket.suffix())?;

        if let Some(idx) = stem.strip_prefix("indeterminate") {
            let idx: usize = idx.parse().ok()?;
            (idx < FRAME_COUNT).then(|| Self::bar_frame(bucket, idx))
        } else if let Some(digit) = stem.strip_prefix("number_") {
            if digit == "percent" {
                return Some(Self::glyph(bucket, '%'));
            }
            let digit: u32 = digit.parse().ok()?;
            (digit < 10).then(|| Self::glyph(bucket, char::from_digit(digit, 10).unwrap()))
        } else if let Some(idx) = stem.strip_prefix("error_") {
            let idx: usize = idx.parse().ok()?;
            (1..=3).contains(&idx).then(|| Self::fault_block(bucket, idx - 1))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Bucket Selection Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_bucket_exact_sizes() {
        assert_eq!(ResBucket::for_size(360, 640), ResBucket::R360x640);
        assert_eq!(ResBucket::for_size(480, 800), ResBucket::R480x800);
        assert_eq!(ResBucket::for_size(720, 1280), ResBucket::R720x1280);
        assert_eq!(ResBucket::for_size(1080, 1920), ResBucket::R1080x1920);
        assert_eq!(ResBucket::for_size(1440, 2560), ResBucket::R1440x2560);
    }

    #[test]
    fn test_bucket_480x854_uses_480x800_assets() {
        assert_eq!(
            ResBucket::for_size(480, 854),
            ResBucket::R480x800,
            "480x854 panels must reuse the 480x800 asset set"
        );
        assert_eq!(
            ResBucket::for_size(480, 854).suffix(),
            ResBucket::for_size(480, 800).suffix()
        );
    }

    #[test]
    fn test_bucket_oversize_clamps_to_largest() {
        assert_eq!(
            ResBucket::for_size(2160, 3840),
            ResBucket::R1440x2560,
            "Nonstandard large panels clamp to the largest bucket"
        );
        assert_eq!(ResBucket::for_size(1441, 2560), ResBucket::R1440x2560);
    }

    #[test]
    fn test_bucket_small_sizes_round_up() {
        // A 320x480 panel fits inside the smallest bucket
        assert_eq!(ResBucket::for_size(320, 480), ResBucket::R360x640);
        // 400 wide no longer fits 360x640, falls through to 480x800
        assert_eq!(ResBucket::for_size(400, 640), ResBucket::R480x800);
    }

    // -------------------------------------------------------------------------
    // Sprite Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_solid_sprite_dimensions() {
        let sprite = Sprite::solid(Size::new(8, 4), Rgb565::RED);
        assert_eq!(sprite.width(), 8);
        assert_eq!(sprite.height(), 4);
        assert_eq!(sprite.pixels.len(), 32);
    }

    #[test]
    fn test_sprite_canvas_clips_out_of_bounds() {
        let mut canvas = SpriteCanvas::new(Size::new(4, 4), Rgb565::BLACK);
        // One pixel inside, several outside; none may panic
        canvas
            .draw_iter([
                Pixel(Point::new(1, 1), Rgb565::WHITE),
                Pixel(Point::new(-1, 0), Rgb565::WHITE),
                Pixel(Point::new(4, 0), Rgb565::WHITE),
                Pixel(Point::new(0, 4), Rgb565::WHITE),
            ])
            .unwrap();
        let sprite = canvas.into_sprite();
        assert_eq!(sprite.pixels[5], Rgb565::WHITE, "In-bounds pixel written");
        assert_eq!(sprite.pixels[0], Rgb565::BLACK, "Out-of-bounds pixels dropped");
    }

    // -------------------------------------------------------------------------
    // Asset Loading Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_sim_assets_provide_full_bar_and_digit_sets() {
        let set = AssetSet::load(&SimAssets, 480, 800);
        assert_eq!(set.bucket, ResBucket::R480x800);
        assert!(
            set.bar_frames.iter().all(Option::is_some),
            "All bar frames present"
        );
        assert!(set.digits.iter().all(Option::is_some), "All digits present");
        assert!(set.percent.is_some(), "Percent sign present");
        assert!(set.fault.iter().all(Option::is_some), "All fault icons present");
    }

    #[test]
    fn test_missing_asset_degrades_to_none() {
        let set = AssetSet::load(&SimAssets, 480, 800);
        assert!(
            set.background.is_none(),
            "Simulator store has no background icon; load must degrade, not fail"
        );
    }

    #[test]
    fn test_bar_width_comes_from_bucket() {
        let set = AssetSet::load(&SimAssets, 480, 800);
        assert_eq!(set.bar_width(), ResBucket::R480x800.bar_size().width);
        assert_eq!(set.bar_height(), ResBucket::R480x800.bar_size().height);
    }

    #[test]
    fn test_lookup_rejects_malformed_names() {
        assert!(SimAssets.lookup("indeterminate9_480X800").is_none());
        assert!(SimAssets.lookup("number_x_480X800").is_none());
        assert!(SimAssets.lookup("error_0_480X800").is_none());
        assert!(SimAssets.lookup("indeterminate0").is_none(), "No bucket suffix");
    }
}
