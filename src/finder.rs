//! Nearest palette entry lookup, one strategy per color mode.

use crate::octree::{rgb555, COLORMAP_SIZE};
use crate::palette::ColorRgb;
use crate::{try_alloc, Result};

/// Luma octants used to narrow the adaptive search.
const OCTANTS: usize = 8;
/// Palette entries this far outside an octant are still searched.
const LUMA_MARGIN: u32 = 20;
/// Colormap slot not looked up yet.
const UNSET: u16 = u16::MAX;

/// Maps a color to its palette index for the active color mode.
#[derive(Debug)]
pub enum ColorFinder {
    /// `count` gray levels; reads the red channel, which already holds luma
    Gray { count: u32 },
    Fixed8,
    Vga16,
    Fixed256,
    Xterm256,
    Adaptive(AdaptiveFinder),
}

impl ColorFinder {
    #[inline]
    pub fn find(&mut self, c: ColorRgb) -> u16 {
        match self {
            ColorFinder::Gray { count } => find_gray(c, *count),
            ColorFinder::Fixed8 => find_fixed8(c),
            ColorFinder::Vga16 => find_vga16(c),
            ColorFinder::Fixed256 => find_fixed256(c),
            ColorFinder::Xterm256 => find_xterm256(c),
            ColorFinder::Adaptive(f) => f.find(c),
        }
    }
}

/// Nearest of `count` evenly spaced gray levels, ties rounded up.
#[inline]
pub fn find_gray(c: ColorRgb, count: u32) -> u16 {
    let i = (c.r as u32 * (count - 1) + 127) / 255;
    i.min(count - 1) as u16
}

/// Thresholds each channel at 128.
#[inline]
pub fn find_fixed8(c: ColorRgb) -> u16 {
    let r = (c.r >= 128) as u16;
    let g = (c.g >= 128) as u16;
    let b = (c.b >= 128) as u16;
    r | (g << 1) | (b << 2)
}

pub fn find_vga16(c: ColorRgb) -> u16 {
    let sum = c.r as u32 + c.g as u32 + c.b as u32;

    if c.r >= 213 || c.g >= 213 || c.b >= 213 {
        let r = (c.r >= 213) as u16;
        let g = (c.g >= 213) as u16;
        let b = (c.b >= 213) as u16;
        if r == g && g == b {
            return if sum >= 224 * 3 { 15 } else { 7 };
        }
        (r | (g << 1) | (b << 2)) | 8
    } else {
        let r = (c.r >= 85) as u16;
        let g = (c.g >= 85) as u16;
        let b = (c.b >= 85) as u16;
        if r == g && g == b {
            return if sum >= 128 * 3 {
                7
            } else if sum >= 42 * 3 {
                8
            } else {
                0
            };
        }
        r | (g << 1) | (b << 2)
    }
}

/// RGB332 by truncation.
#[inline]
pub fn find_fixed256(c: ColorRgb) -> u16 {
    let r = (c.r >> 5) as u16;
    let g = (c.g >> 5) as u16;
    let b = (c.b >> 6) as u16;
    (r << 5) | (g << 2) | b
}

/// Level 0..=5 of one channel on the xterm cube.
#[inline]
fn xterm_channel(c: u8) -> u16 {
    // levels 00 5f 87 af d7 ff
    if c < 0x73 {
        (c >= 0x2f) as u16
    } else {
        2 + (c - 0x73) as u16 / 0x28
    }
}

/// Nearest entry of the xterm 6x6x6 color cube.
#[inline]
pub fn find_xterm256(c: ColorRgb) -> u16 {
    16 + xterm_channel(c.r) * 36 + xterm_channel(c.g) * 6 + xterm_channel(c.b)
}

/// Nearest-color search over an image-specific palette.
///
/// The palette is kept sorted by luma, and for each luma octant only the
/// entries within [`LUMA_MARGIN`] of it are searched. Results are memoized
/// per 15-bit color.
#[derive(Debug)]
pub struct AdaptiveFinder {
    palette: Vec<ColorRgb>,
    ranges: [(usize, usize); OCTANTS],
    hash: Vec<u16>,
}

impl AdaptiveFinder {
    /// Takes ownership of `palette` and reorders it by luma.
    pub fn new(mut palette: Vec<ColorRgb>) -> Result<Self> {
        palette.sort_by_key(|c| c.luma());

        let mut ranges = [(0, palette.len()); OCTANTS];
        for (k, range) in ranges.iter_mut().enumerate() {
            let lo_luma = (k as u32 * 32).saturating_sub(LUMA_MARGIN);
            let hi_luma = (k as u32 + 1) * 32 + LUMA_MARGIN;
            let lo = palette.partition_point(|c| (c.luma() as u32) < lo_luma);
            let hi = palette.partition_point(|c| (c.luma() as u32) < hi_luma);
            if lo < hi {
                *range = (lo, hi);
            }
        }

        let mut hash = try_alloc(COLORMAP_SIZE, "color hash")?;
        hash.fill(UNSET);
        Ok(Self {
            palette,
            ranges,
            hash,
        })
    }

    /// The luma-sorted palette that returned indices refer to.
    pub fn palette(&self) -> &[ColorRgb] {
        &self.palette
    }

    pub fn find(&mut self, c: ColorRgb) -> u16 {
        let r5 = (c.r >> 3) as u32;
        let g5 = (c.g >> 3) as u32;
        let b5 = (c.b >> 3) as u32;
        let n = rgb555(r5, g5, b5);
        if self.hash[n] == UNSET {
            // Search with the center of the 5-bit cell.
            let center = ColorRgb::new((r5 * 8 + 4) as u8, (g5 * 8 + 4) as u8, (b5 * 8 + 4) as u8);
            self.hash[n] = self.search(center);
        }
        self.hash[n]
    }

    fn search(&self, c: ColorRgb) -> u16 {
        let (lo, hi) = self.ranges[(c.luma() >> 5) as usize];
        let mut min_dist = u32::MAX;
        let mut min_idx = lo;
        for (i, p) in self.palette[lo..hi].iter().enumerate() {
            let dr = c.r as i32 - p.r as i32;
            let dg = c.g as i32 - p.g as i32;
            let db = c.b as i32 - p.b as i32;
            let dist = (dr * dr + dg * dg + db * db) as u32;
            if dist < min_dist {
                min_idx = lo + i;
                if dist < 8 {
                    break;
                }
                min_dist = dist;
            }
        }
        min_idx as u16
    }
}
