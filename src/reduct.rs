//! Resize and color-reduce a bitmap in a single pass.
//!
//! [`reduce`] picks a palette and a [`ColorFinder`] from the color mode, then
//! runs one of two drivers over the destination:
//!
//! - **simple**: one source pixel per destination pixel, no diffusion
//! - **high quality**: box-filter average of the covered source area, with
//!   2-D error diffusion of the quantization residual

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::bitmap::{create_bitmap, Bitmap, PixelFormat, ALPHA_BIT};
use crate::diffuse::{Diffuse, ErrorBuffer, Rgb32};
use crate::finder::{AdaptiveFinder, ColorFinder};
use crate::octree::adaptive_palette;
use crate::palette::{
    fixed256_palette, gray_palette, xterm256_palette, ColorRgb, PALETTE_FIXED8, PALETTE_VGA16,
};
use crate::rational::Rational;
use crate::{Result, SixelError};

/// Target palette.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// `n` gray levels, 2..=256
    Gray(usize),
    /// RGB corners
    Fixed8,
    /// VGA 16 colors
    Vga16,
    /// RGB332
    #[default]
    Fixed256,
    /// xterm-compatible 256 colors
    Xterm256,
    /// Up to `n` colors chosen per image, 2..=256
    Adaptive(usize),
}

impl ColorMode {
    fn validate(self) -> Result<()> {
        match self {
            ColorMode::Gray(n) | ColorMode::Adaptive(n) if !(2..=256).contains(&n) => {
                Err(SixelError::UnsupportedColor(self.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Gray(n) => write!(f, "Gray{n}"),
            ColorMode::Fixed8 => f.write_str("8(RGB)"),
            ColorMode::Vga16 => f.write_str("16(ANSI VGA)"),
            ColorMode::Fixed256 => f.write_str("256(RGB332)"),
            ColorMode::Xterm256 => f.write_str("256(xterm)"),
            ColorMode::Adaptive(n) => write!(f, "Adaptive{n}"),
        }
    }
}

impl FromStr for ColorMode {
    type Err = SixelError;

    /// Accepts `gray`, `grayN`, `mono`, `8`, `16`, `256`, `xterm256`,
    /// `adaptive` and `adaptiveN`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let unsupported = || SixelError::UnsupportedColor(s.to_string());
        let count = |digits: &str, default: usize| -> Result<usize> {
            if digits.is_empty() {
                Ok(default)
            } else {
                digits.parse().map_err(|_| unsupported())
            }
        };

        let mode = match lower.as_str() {
            "mono" => ColorMode::Gray(2),
            "8" => ColorMode::Fixed8,
            "16" | "vga" => ColorMode::Vga16,
            "256" => ColorMode::Fixed256,
            "xterm" | "xterm256" => ColorMode::Xterm256,
            other => {
                if let Some(n) = other.strip_prefix("gray") {
                    ColorMode::Gray(count(n, 256)?)
                } else if let Some(n) = other.strip_prefix("adaptive") {
                    ColorMode::Adaptive(count(n, 256)?)
                } else {
                    return Err(unsupported());
                }
            }
        };
        mode.validate().map_err(|_| unsupported())?;
        Ok(mode)
    }
}

/// How source pixels are combined into a destination pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReductMethod {
    /// Nearest sample, no diffusion
    Simple,
    /// Area average with error diffusion
    #[default]
    HighQuality,
}

impl fmt::Display for ReductMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductMethod::Simple => f.write_str("simple"),
            ReductMethod::HighQuality => f.write_str("high"),
        }
    }
}

impl FromStr for ReductMethod {
    type Err = SixelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "simple" | "fast" => Ok(ReductMethod::Simple),
            "high" | "hq" | "highquality" => Ok(ReductMethod::HighQuality),
            _ => Err(SixelError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Largest accepted gain, 16x brightness.
pub const MAX_GAIN: i32 = 4096;

/// Parameters of one [`reduce`] call and of the SIXEL output that follows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReductOptions {
    pub color: ColorMode,
    pub method: ReductMethod,
    /// Kernel for the high-quality method
    pub diffuse: Diffuse,
    /// Brightness as a fraction of 256, at most [`MAX_GAIN`]; negative leaves colors untouched.
    pub gain: i32,
    /// Color depth modulation floor; 0 disables it.
    ///
    /// Attenuates the propagated error where the image is nearly flat.
    pub cdm: u32,
    /// Emit SIXEL in OR mode (one bit plane per register bit)
    pub output_ormode: bool,
    /// Leave transparent pixels unpainted
    pub output_transbg: bool,
    /// Do not emit the palette definitions
    pub suppress_palette: bool,
}

impl ReductOptions {
    /// Rejects options no reduction can honor.
    pub fn validate(&self) -> Result<()> {
        self.color.validate()?;
        if self.gain > MAX_GAIN {
            return Err(SixelError::UnsupportedGain(self.gain));
        }
        Ok(())
    }
}

impl Default for ReductOptions {
    fn default() -> Self {
        Self {
            color: ColorMode::Fixed256,
            method: ReductMethod::HighQuality,
            diffuse: Diffuse::Sfl,
            cdm: 0,
            gain: -1,
            output_ormode: false,
            output_transbg: false,
            suppress_palette: false,
        }
    }
}

/// Resizes `src` to `dst_width` x `dst_height` and reduces it to the palette of `opts.color`.
///
/// Returns a new [`PixelFormat::Aidx16`] bitmap that owns its palette. The
/// transparency bit is set on pixels that were transparent in the source.
/// On error nothing is returned and all scratch memory is released.
pub fn reduce(src: &Bitmap, dst_width: usize, dst_height: usize, opts: &ReductOptions) -> Result<Bitmap> {
    opts.validate()?;
    src.validate_source()?;
    if dst_width == 0 || dst_height == 0 {
        return Err(SixelError::InvalidDimensions {
            width: dst_width,
            height: dst_height,
        });
    }
    debug!(
        color = %opts.color,
        method = %opts.method,
        diffuse = %opts.diffuse,
        gain = opts.gain,
        cdm = opts.cdm,
        src = ?(src.width, src.height),
        dst = ?(dst_width, dst_height),
        "reduce"
    );

    let mut dst = create_bitmap(dst_width, dst_height, PixelFormat::Aidx16)?;
    dst.has_alpha = src.has_alpha;

    let mut reductor = Reductor::new(src, opts)?;
    match opts.method {
        ReductMethod::Simple => reductor.simple(&mut dst),
        ReductMethod::HighQuality => reductor.high_quality(&mut dst, opts)?,
    }

    debug!(palette = reductor.palette.len(), "reduced");
    dst.palette = reductor.palette;
    Ok(dst)
}

#[inline]
fn saturate_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// In-place conversion to gray, `(5R + 9G + 2B) / 16` on every channel.
#[inline]
fn colorcvt_gray(c: &mut Rgb32) {
    let i = (c.r * 5 + c.g * 9 + c.b * 2) / 16;
    c.r = i;
    c.g = i;
    c.b = i;
}

struct Reductor<'a> {
    src: &'a Bitmap,
    finder: ColorFinder,
    palette: Vec<ColorRgb>,
    is_gray: bool,
    gain: i32,
}

impl<'a> Reductor<'a> {
    fn new(src: &'a Bitmap, opts: &ReductOptions) -> Result<Self> {
        let (finder, palette) = match opts.color {
            ColorMode::Gray(n) => (ColorFinder::Gray { count: n as u32 }, gray_palette(n)),
            ColorMode::Fixed8 => (ColorFinder::Fixed8, PALETTE_FIXED8.to_vec()),
            ColorMode::Vga16 => (ColorFinder::Vga16, PALETTE_VGA16.to_vec()),
            ColorMode::Fixed256 => (ColorFinder::Fixed256, fixed256_palette()),
            ColorMode::Xterm256 => (ColorFinder::Xterm256, xterm256_palette()),
            ColorMode::Adaptive(n) => {
                let finder = AdaptiveFinder::new(adaptive_palette(src, opts.gain, n)?)?;
                let palette = finder.palette().to_vec();
                (ColorFinder::Adaptive(finder), palette)
            }
        };
        Ok(Self {
            src,
            finder,
            palette,
            is_gray: matches!(opts.color, ColorMode::Gray(_)),
            gain: opts.gain,
        })
    }

    /// One source pixel per destination pixel.
    fn simple(&mut self, dst: &mut Bitmap) {
        let src = self.src;
        let (dw, dh) = (dst.width, dst.height);
        let ystep = Rational::new(0, src.height as i32, dh as i32);
        let xstep = Rational::new(0, src.width as i32, dw as i32);
        let mut ry = Rational::new(0, 0, dh as i32);
        let mut rx = Rational::new(0, 0, dw as i32);

        let mut d = 0;
        for _ in 0..dh {
            rx.reset();
            let row = ry.i as usize * src.width;
            for _ in 0..dw {
                let s = src.sample(row + rx.i as usize);
                let mut col = Rgb32 {
                    r: s.r,
                    g: s.g,
                    b: s.b,
                };
                if self.gain >= 0 {
                    col.r = saturate_u8(col.r * self.gain / 256) as i32;
                    col.g = saturate_u8(col.g * self.gain / 256) as i32;
                    col.b = saturate_u8(col.b * self.gain / 256) as i32;
                }
                if self.is_gray {
                    colorcvt_gray(&mut col);
                }
                let c8 = ColorRgb::new(saturate_u8(col.r), saturate_u8(col.g), saturate_u8(col.b));
                let mut v = self.finder.find(c8);
                if s.transparent {
                    v |= ALPHA_BIT;
                }
                dst.set_word(d, v);
                d += 1;
                rx.add(&xstep);
            }
            ry.add(&ystep);
        }
    }

    /// Area average plus error diffusion.
    fn high_quality(&mut self, dst: &mut Bitmap, opts: &ReductOptions) -> Result<()> {
        let src = self.src;
        let (dw, dh) = (dst.width, dst.height);
        let ystep = Rational::new(0, src.height as i32, dh as i32);
        let xstep = Rational::new(0, src.width as i32, dw as i32);
        let mut ry = Rational::new(0, 0, dh as i32);
        let mut rx = Rational::new(0, 0, dw as i32);

        let mut eb = ErrorBuffer::new(dw)?;
        let mut cdm: i32 = 256;
        let mut prev = Rgb32::default();

        let mut d = 0;
        for _ in 0..dh {
            let (sy0, sy1) = ry.span(&ystep);
            rx.reset();
            for x in 0..dw {
                let (sx0, sx1) = rx.span(&xstep);

                let (mut sr, mut sg, mut sb) = (0u64, 0u64, 0u64);
                let mut transparent = 0;
                for sy in sy0..sy1 {
                    let row = sy * src.width;
                    for sx in sx0..sx1 {
                        let s = src.sample(row + sx);
                        sr += s.r as u64;
                        sg += s.g as u64;
                        sb += s.b as u64;
                        transparent += s.transparent as usize;
                    }
                }
                let area = (sy1 - sy0) * (sx1 - sx0);
                // Channel means fit in 0..=255.
                let mut col = Rgb32 {
                    r: (sr / area as u64) as i32,
                    g: (sg / area as u64) as i32,
                    b: (sb / area as u64) as i32,
                };

                if self.gain >= 0 {
                    col.r = col.r * self.gain / 256;
                    col.g = col.g * self.gain / 256;
                    col.b = col.b * self.gain / 256;
                }

                if opts.cdm != 0 {
                    cdm /= 2;
                    cdm = cdm.max((col.r - prev.r).abs());
                    cdm = cdm.max((col.g - prev.g).abs());
                    cdm = cdm.max((col.b - prev.b).abs());
                    cdm = (cdm + opts.cdm.min(256) as i32).min(256);
                    prev = col;
                }

                let err = eb.get(x);
                col.r += err.r as i32;
                col.g += err.g as i32;
                col.b += err.b as i32;

                if self.is_gray {
                    colorcvt_gray(&mut col);
                }

                let c8 = ColorRgb::new(saturate_u8(col.r), saturate_u8(col.g), saturate_u8(col.b));
                let idx = self.finder.find(c8);
                let mut v = idx;
                // Transparent when more than half of the area is.
                if transparent > area / 2 {
                    v |= ALPHA_BIT;
                }
                dst.set_word(d, v);
                d += 1;

                let p = self.palette[idx as usize];
                col.r -= p.r as i32;
                col.g -= p.g as i32;
                col.b -= p.b as i32;

                if cdm != 256 {
                    col.r = col.r * cdm / 256;
                    col.g = col.g * cdm / 256;
                    col.b = col.b * cdm / 256;
                }

                opts.diffuse.spread(&mut eb, x, col);
            }
            eb.rotate();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(width: usize, height: usize, c: [u8; 3]) -> Bitmap {
        let buf = c.iter().copied().cycle().take(width * height * 3).collect();
        Bitmap::from_raw(width, height, PixelFormat::Rgb24, buf).unwrap()
    }

    #[test]
    fn test_default_options() {
        let opts = ReductOptions::default();
        assert_eq!(opts.method, ReductMethod::HighQuality);
        assert_eq!(opts.diffuse, Diffuse::Sfl);
        assert_eq!(opts.color, ColorMode::Fixed256);
        assert_eq!(opts.gain, -1);
        assert_eq!(opts.cdm, 0);
        assert!(!opts.output_ormode && !opts.output_transbg && !opts.suppress_palette);
    }

    #[test]
    fn test_color_mode_parse() {
        assert_eq!("gray".parse::<ColorMode>().unwrap(), ColorMode::Gray(256));
        assert_eq!("Gray4".parse::<ColorMode>().unwrap(), ColorMode::Gray(4));
        assert_eq!("mono".parse::<ColorMode>().unwrap(), ColorMode::Gray(2));
        assert_eq!("8".parse::<ColorMode>().unwrap(), ColorMode::Fixed8);
        assert_eq!("16".parse::<ColorMode>().unwrap(), ColorMode::Vga16);
        assert_eq!("256".parse::<ColorMode>().unwrap(), ColorMode::Fixed256);
        assert_eq!("xterm256".parse::<ColorMode>().unwrap(), ColorMode::Xterm256);
        assert_eq!("adaptive".parse::<ColorMode>().unwrap(), ColorMode::Adaptive(256));
        assert_eq!("adaptive64".parse::<ColorMode>().unwrap(), ColorMode::Adaptive(64));
        for bad in ["gray1", "gray257", "adaptive0", "grayx", "32", ""] {
            assert!(
                matches!(bad.parse::<ColorMode>(), Err(SixelError::UnsupportedColor(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_color_mode_display() {
        assert_eq!(ColorMode::Gray(16).to_string(), "Gray16");
        assert_eq!(ColorMode::Vga16.to_string(), "16(ANSI VGA)");
        assert_eq!(ColorMode::Adaptive(256).to_string(), "Adaptive256");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("simple".parse::<ReductMethod>().unwrap(), ReductMethod::Simple);
        assert_eq!("HQ".parse::<ReductMethod>().unwrap(), ReductMethod::HighQuality);
        assert_eq!(
            ReductMethod::HighQuality.to_string().parse::<ReductMethod>().unwrap(),
            ReductMethod::HighQuality
        );
        assert!(matches!(
            "bilinear".parse::<ReductMethod>(),
            Err(SixelError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_unsupported_gray_count() {
        let src = solid(2, 2, [0, 0, 0]);
        let opts = ReductOptions {
            color: ColorMode::Gray(1),
            ..Default::default()
        };
        assert!(matches!(
            reduce(&src, 2, 2, &opts),
            Err(SixelError::UnsupportedColor(_))
        ));
    }

    #[test]
    fn test_zero_destination() {
        let src = solid(2, 2, [0, 0, 0]);
        assert!(matches!(
            reduce(&src, 0, 2, &ReductOptions::default()),
            Err(SixelError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_gain_darkens() {
        let src = solid(4, 4, [255, 255, 255]);
        let opts = ReductOptions {
            color: ColorMode::Gray(256),
            diffuse: Diffuse::None,
            gain: 128,
            ..Default::default()
        };
        let dst = reduce(&src, 2, 2, &opts).unwrap();
        assert_eq!(dst.palette[dst.index_at(0, 0) as usize].r, 127);
    }

    #[test]
    fn test_cdm_attenuates_flat_error() {
        // A flat mid gray on a 2-level palette: without cdm the error dithers,
        // with a small floor the residual is damped and output stays flatter.
        let src = solid(32, 1, [100, 100, 100]);
        let base = ReductOptions {
            color: ColorMode::Gray(2),
            diffuse: Diffuse::Fs,
            ..Default::default()
        };
        let plain = reduce(&src, 32, 1, &base).unwrap();
        let damped = reduce(&src, 32, 1, &ReductOptions { cdm: 1, ..base }).unwrap();
        let ones = |b: &Bitmap| (0..32).filter(|&x| b.index_at(x, 0) == 1).count();
        assert!(ones(&plain) > 0);
        assert!(ones(&damped) <= ones(&plain));
    }

    #[test]
    fn test_large_area_average() {
        // 255 * area exceeds i32 for a single destination pixel.
        let mut src = create_bitmap(4096, 2100, PixelFormat::Rgb24).unwrap();
        src.buf.fill(255);
        let opts = ReductOptions {
            color: ColorMode::Gray(256),
            diffuse: Diffuse::None,
            ..Default::default()
        };
        let dst = reduce(&src, 1, 1, &opts).unwrap();
        assert_eq!(dst.palette[dst.index_at(0, 0) as usize], ColorRgb::new(255, 255, 255));
    }

    #[test]
    fn test_gain_limit() {
        let src = solid(1, 1, [255, 255, 255]);
        for gain in [MAX_GAIN + 1, 10_000_000, i32::MAX] {
            let opts = ReductOptions {
                color: ColorMode::Fixed8,
                method: ReductMethod::Simple,
                gain,
                ..Default::default()
            };
            assert!(matches!(
                reduce(&src, 1, 1, &opts),
                Err(SixelError::UnsupportedGain(g)) if g == gain
            ));
        }
        assert!(ReductOptions {
            gain: i32::MIN,
            ..Default::default()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_max_gain_every_driver() {
        let buf = (0..24 * 12 * 3).map(|i| (i * 37 % 256) as u8).collect();
        let src = Bitmap::from_raw(24, 12, PixelFormat::Rgb24, buf).unwrap();
        for color in [ColorMode::Gray(2), ColorMode::Fixed8, ColorMode::Adaptive(16)] {
            for method in [ReductMethod::Simple, ReductMethod::HighQuality] {
                for diffuse in [Diffuse::Jajuni, Diffuse::Rgb] {
                    let opts = ReductOptions {
                        color,
                        method,
                        diffuse,
                        gain: MAX_GAIN,
                        cdm: 1,
                        ..Default::default()
                    };
                    let dst = reduce(&src, 12, 7, &opts).unwrap();
                    let count = dst.palette_count();
                    assert!((0..7).all(|y| (0..12).all(|x| (dst.index_at(x, y) as usize) < count)));
                }
            }
        }
    }

    #[test]
    fn test_gray_conversion() {
        let src = solid(1, 1, [255, 0, 0]);
        let opts = ReductOptions {
            color: ColorMode::Gray(256),
            method: ReductMethod::Simple,
            ..Default::default()
        };
        let dst = reduce(&src, 1, 1, &opts).unwrap();
        assert_eq!(dst.index_at(0, 0), 5 * 255 / 16);
    }
}
