//! Error-diffusion kernels and the rolling error buffer.

use std::fmt;
use std::str::FromStr;

use crate::{try_alloc, Result, SixelError};

/// Error-diffusion kernel applied by the high-quality reducer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Diffuse {
    /// No diffusion, plain quantization
    None,
    /// Sierra Filter Lite
    #[default]
    Sfl,
    /// Floyd-Steinberg
    Fs,
    Atkinson,
    /// Jarvis, Judice, Ninke
    Jajuni,
    Stucki,
    Burkes,
    /// Half right, half down
    Two,
    /// Right, down and down-right
    Three,
    /// Each channel pushed in a different direction
    Rgb,
}

/// One kernel weight: `row` lines below, `dx` columns aside, `weight / 256`.
#[derive(Clone, Copy, Debug)]
struct Tap {
    row: usize,
    dx: isize,
    weight: i32,
}

const fn tap(row: usize, dx: isize, weight: i32) -> Tap {
    Tap { row, dx, weight }
}

const FS: &[Tap] = &[tap(0, 1, 112), tap(1, -1, 48), tap(1, 0, 80), tap(1, 1, 16)];

const ATKINSON: &[Tap] = &[
    tap(0, 1, 32),
    tap(0, 2, 32),
    tap(1, -1, 32),
    tap(1, 0, 32),
    tap(1, 1, 32),
    tap(2, 0, 32),
];

const JAJUNI: &[Tap] = &[
    tap(0, 1, 37),
    tap(0, 2, 27),
    tap(1, -2, 16),
    tap(1, -1, 27),
    tap(1, 0, 37),
    tap(1, 1, 27),
    tap(1, 2, 16),
    tap(2, -2, 5),
    tap(2, -1, 16),
    tap(2, 0, 27),
    tap(2, 1, 16),
    tap(2, 2, 5),
];

const STUCKI: &[Tap] = &[
    tap(0, 1, 43),
    tap(0, 2, 21),
    tap(1, -2, 11),
    tap(1, -1, 21),
    tap(1, 0, 43),
    tap(1, 1, 21),
    tap(1, 2, 11),
    tap(2, -2, 5),
    tap(2, -1, 11),
    tap(2, 0, 21),
    tap(2, 1, 11),
    tap(2, 2, 5),
];

const BURKES: &[Tap] = &[
    tap(0, 1, 64),
    tap(0, 2, 32),
    tap(1, -2, 16),
    tap(1, -1, 32),
    tap(1, 0, 64),
    tap(1, 1, 32),
    tap(1, 2, 16),
];

const TWO: &[Tap] = &[tap(0, 1, 128), tap(1, 0, 128)];

const THREE: &[Tap] = &[tap(0, 1, 102), tap(1, 0, 102), tap(1, 1, 51)];

const NAMES: &[(Diffuse, &str)] = &[
    (Diffuse::None, "none"),
    (Diffuse::Sfl, "sfl"),
    (Diffuse::Fs, "fs"),
    (Diffuse::Atkinson, "atkinson"),
    (Diffuse::Jajuni, "jajuni"),
    (Diffuse::Stucki, "stucki"),
    (Diffuse::Burkes, "burkes"),
    (Diffuse::Two, "2"),
    (Diffuse::Three, "3"),
    (Diffuse::Rgb, "rgb"),
];

impl Diffuse {
    /// Pushes the quantization residual `col` of pixel `x` onto its neighbors.
    pub(crate) fn spread(self, eb: &mut ErrorBuffer, x: usize, col: Rgb32) {
        let taps = match self {
            Diffuse::None => return,
            Diffuse::Sfl => {
                eb.add_shifted(0, x, 1, col, 1);
                eb.add_shifted(1, x, -1, col, 2);
                eb.add_shifted(1, x, 0, col, 2);
                return;
            }
            Diffuse::Rgb => {
                let e = eb.cell(0, x, 0);
                e.r = saturate_adderr(e.r, col.r);
                let e = eb.cell(1, x, 0);
                e.b = saturate_adderr(e.b, col.b);
                let e = eb.cell(1, x, 1);
                e.g = saturate_adderr(e.g, col.g);
                return;
            }
            Diffuse::Fs => FS,
            Diffuse::Atkinson => ATKINSON,
            Diffuse::Jajuni => JAJUNI,
            Diffuse::Stucki => STUCKI,
            Diffuse::Burkes => BURKES,
            Diffuse::Two => TWO,
            Diffuse::Three => THREE,
        };
        for t in taps {
            eb.add_ratio(t.row, x, t.dx, col, t.weight);
        }
    }
}

impl fmt::Display for Diffuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = NAMES
            .iter()
            .find(|(d, _)| d == self)
            .map_or("?", |(_, n)| n);
        f.write_str(name)
    }
}

impl FromStr for Diffuse {
    type Err = SixelError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        NAMES
            .iter()
            .find(|(_, n)| *n == lower)
            .map(|(d, _)| *d)
            .ok_or_else(|| SixelError::UnsupportedDiffuse(s.to_string()))
    }
}

/// Per-channel working color, wide enough for averaged sums and residuals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Rgb32 {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

/// Accumulated error of one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrRgb {
    pub r: i16,
    pub g: i16,
    pub b: i16,
}

/// Lowest accumulated error per channel.
pub const ERR_MIN: i16 = -512;
/// Highest accumulated error per channel.
pub const ERR_MAX: i16 = 511;

/// Adds `b` to `a`, clamped to `[ERR_MIN, ERR_MAX]`.
#[inline]
pub fn saturate_adderr(a: i16, b: i32) -> i16 {
    (a as i32 + b).clamp(ERR_MIN as i32, ERR_MAX as i32) as i16
}

const ROWS: usize = 3;
const MARGIN: usize = 2;

/// Three scanlines of diffusion error with a two-cell margin on each side.
///
/// Row 0 is the line being quantized. [`ErrorBuffer::rotate`] moves to the
/// next line without reallocating.
#[derive(Debug)]
pub struct ErrorBuffer {
    cells: Vec<ErrRgb>,
    stride: usize,
    head: usize,
}

impl ErrorBuffer {
    pub fn new(width: usize) -> Result<Self> {
        let stride = width
            .checked_add(MARGIN * 2)
            .ok_or(SixelError::IntegerOverflow)?;
        let len = stride
            .checked_mul(ROWS)
            .ok_or(SixelError::IntegerOverflow)?;
        Ok(Self {
            cells: try_alloc(len, "error buffer")?,
            stride,
            head: 0,
        })
    }

    #[inline]
    fn offset(&self, row: usize, x: usize, dx: isize) -> usize {
        let line = (self.head + row) % ROWS;
        line * self.stride + (x + MARGIN).wrapping_add_signed(dx)
    }

    #[inline]
    fn cell(&mut self, row: usize, x: usize, dx: isize) -> &mut ErrRgb {
        let i = self.offset(row, x, dx);
        &mut self.cells[i]
    }

    /// Error accumulated so far for pixel `x` of the current line.
    #[inline]
    pub fn get(&self, x: usize) -> ErrRgb {
        self.cells[self.offset(0, x, 0)]
    }

    /// `cell += col * ratio / 256`
    #[inline]
    pub(crate) fn add_ratio(&mut self, row: usize, x: usize, dx: isize, col: Rgb32, ratio: i32) {
        let e = self.cell(row, x, dx);
        e.r = saturate_adderr(e.r, col.r * ratio / 256);
        e.g = saturate_adderr(e.g, col.g * ratio / 256);
        e.b = saturate_adderr(e.b, col.b * ratio / 256);
    }

    /// `cell += col >> shift`
    #[inline]
    pub(crate) fn add_shifted(&mut self, row: usize, x: usize, dx: isize, col: Rgb32, shift: u32) {
        let e = self.cell(row, x, dx);
        e.r = saturate_adderr(e.r, col.r >> shift);
        e.g = saturate_adderr(e.g, col.g >> shift);
        e.b = saturate_adderr(e.b, col.b >> shift);
    }

    /// Advances one line; the line that falls off becomes the cleared bottom line.
    pub fn rotate(&mut self) {
        let old = self.head * self.stride;
        self.cells[old..old + self.stride].fill(ErrRgb::default());
        self.head = (self.head + 1) % ROWS;
    }

    /// Every cell, margins included.
    #[cfg(test)]
    fn cells(&self) -> &[ErrRgb] {
        &self.cells
    }
}
