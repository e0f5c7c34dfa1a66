//! In-memory bitmaps consumed and produced by the reduction engine.

use crate::palette::ColorRgb;
use crate::{try_alloc, Result, SixelError};

/// Transparent flag in the 16-bit pixel formats.
pub const ALPHA_BIT: u16 = 0x8000;
/// Palette index (or RGB555 color) bits in the 16-bit pixel formats.
pub const INDEX_MASK: u16 = 0x7fff;

/// Pixel layout of a [`Bitmap`] buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel: R, G, B
    Rgb24,
    /// 4 bytes per pixel in memory order R, G, B, A.
    /// A pixel is transparent when A < 0x80.
    Argb32,
    /// Little-endian `u16`: bit 15 transparent, then 5 bits each of R, G, B
    Argb16,
    /// Little-endian `u16`: bit 15 transparent, bits 0..15 palette index
    Aidx16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Argb16 | PixelFormat::Aidx16 => 2,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Argb32 => 4,
        }
    }
}

/// A width x height raster with an owned pixel buffer.
///
/// Indexed bitmaps ([`PixelFormat::Aidx16`]) carry their palette; every
/// stored index is below `palette.len()`.
#[derive(Clone, Debug)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub buf: Vec<u8>,
    /// Whether transparent pixels may be present
    pub has_alpha: bool,
    pub palette: Vec<ColorRgb>,
}

/// One decoded source pixel, channels on the 8-bit scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Sample {
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub transparent: bool,
}

/// Creates a zero-filled bitmap.
pub fn create_bitmap(width: usize, height: usize, format: PixelFormat) -> Result<Bitmap> {
    let len = buffer_len(width, height, format)?;
    Ok(Bitmap {
        width,
        height,
        format,
        buf: try_alloc(len, "bitmap")?,
        has_alpha: false,
        palette: Vec::new(),
    })
}

fn buffer_len(width: usize, height: usize, format: PixelFormat) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(SixelError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
        .ok_or(SixelError::IntegerOverflow)
}

impl Bitmap {
    /// Wraps an existing buffer, checking that its length fits the geometry.
    pub fn from_raw(width: usize, height: usize, format: PixelFormat, buf: Vec<u8>) -> Result<Self> {
        let expected = buffer_len(width, height, format)?;
        if buf.len() != expected {
            return Err(SixelError::BufferSizeMismatch {
                expected,
                actual: buf.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            buf,
            has_alpha: format == PixelFormat::Argb32,
            palette: Vec::new(),
        })
    }

    #[inline]
    pub fn palette_count(&self) -> usize {
        self.palette.len()
    }

    /// Raw 16-bit word of pixel `i` in the 16-bit formats.
    #[inline]
    pub fn word(&self, i: usize) -> u16 {
        u16::from_le_bytes([self.buf[i * 2], self.buf[i * 2 + 1]])
    }

    #[inline]
    pub(crate) fn set_word(&mut self, i: usize, v: u16) {
        self.buf[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
    }

    /// Palette index at `(x, y)` of an indexed bitmap, transparency bit stripped.
    #[inline]
    pub fn index_at(&self, x: usize, y: usize) -> u16 {
        self.word(y * self.width + x) & INDEX_MASK
    }

    /// Whether the pixel at `(x, y)` of a 16-bit bitmap is transparent.
    #[inline]
    pub fn is_transparent(&self, x: usize, y: usize) -> bool {
        self.word(y * self.width + x) & ALPHA_BIT != 0
    }

    /// Checks the buffer against the geometry and that indexed data has a palette.
    pub(crate) fn validate_source(&self) -> Result<()> {
        let expected = buffer_len(self.width, self.height, self.format)?;
        if self.buf.len() != expected {
            return Err(SixelError::BufferSizeMismatch {
                expected,
                actual: self.buf.len(),
            });
        }
        if self.format == PixelFormat::Aidx16 && self.palette.is_empty() {
            return Err(SixelError::UnsupportedFormat(
                "indexed source without palette".to_string(),
            ));
        }
        Ok(())
    }

    /// Decodes pixel number `i`.
    #[inline]
    pub(crate) fn sample(&self, i: usize) -> Sample {
        match self.format {
            PixelFormat::Rgb24 => {
                let p = &self.buf[i * 3..i * 3 + 3];
                Sample {
                    r: p[0] as i32,
                    g: p[1] as i32,
                    b: p[2] as i32,
                    transparent: false,
                }
            }
            PixelFormat::Argb32 => {
                let p = &self.buf[i * 4..i * 4 + 4];
                Sample {
                    r: p[0] as i32,
                    g: p[1] as i32,
                    b: p[2] as i32,
                    transparent: p[3] < 0x80,
                }
            }
            PixelFormat::Argb16 => {
                let v = self.word(i);
                Sample {
                    r: (((v >> 10) & 0x1f) << 3) as i32,
                    g: (((v >> 5) & 0x1f) << 3) as i32,
                    b: ((v & 0x1f) << 3) as i32,
                    transparent: v & ALPHA_BIT != 0,
                }
            }
            PixelFormat::Aidx16 => {
                let v = self.word(i);
                let c = self
                    .palette
                    .get((v & INDEX_MASK) as usize)
                    .copied()
                    .unwrap_or_default();
                Sample {
                    r: c.r as i32,
                    g: c.g as i32,
                    b: c.b as i32,
                    transparent: v & ALPHA_BIT != 0,
                }
            }
        }
    }

    /// Converts to the packed [`PixelFormat::Argb16`] form, 5 bits per channel.
    ///
    /// Pixels whose alpha is below half become transparent.
    pub fn to_argb16(&self) -> Result<Bitmap> {
        self.validate_source()?;
        let mut dst = create_bitmap(self.width, self.height, PixelFormat::Argb16)?;
        dst.has_alpha = self.has_alpha || self.format == PixelFormat::Argb32;
        for i in 0..self.width * self.height {
            let s = self.sample(i);
            let mut v = (((s.r as u16) >> 3) << 10) | (((s.g as u16) >> 3) << 5) | ((s.b as u16) >> 3);
            if s.transparent {
                v |= ALPHA_BIT;
            }
            dst.set_word(i, v);
        }
        Ok(dst)
    }

    /// Expands an indexed bitmap back to [`PixelFormat::Rgb24`] through its palette.
    ///
    /// Indices outside the palette become black.
    pub fn colorize(&self) -> Result<Bitmap> {
        if self.format != PixelFormat::Aidx16 {
            return Err(SixelError::UnsupportedFormat(format!(
                "colorize needs an indexed bitmap, got {:?}",
                self.format
            )));
        }
        let mut dst = create_bitmap(self.width, self.height, PixelFormat::Rgb24)?;
        for (i, out) in dst.buf.chunks_exact_mut(3).enumerate() {
            let idx = (self.word(i) & INDEX_MASK) as usize;
            let c = self.palette.get(idx).copied().unwrap_or_default();
            out.copy_from_slice(&[c.r, c.g, c.b]);
        }
        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_bitmap_sizes() {
        let img = create_bitmap(3, 2, PixelFormat::Rgb24).unwrap();
        assert_eq!(img.buf.len(), 18);
        let img = create_bitmap(3, 2, PixelFormat::Aidx16).unwrap();
        assert_eq!(img.buf.len(), 12);
    }

    #[test]
    fn test_create_bitmap_zero() {
        assert!(matches!(
            create_bitmap(0, 2, PixelFormat::Rgb24),
            Err(SixelError::InvalidDimensions { width: 0, height: 2 })
        ));
        assert!(create_bitmap(2, 0, PixelFormat::Argb32).is_err());
    }

    #[test]
    fn test_create_bitmap_overflow() {
        assert!(matches!(
            create_bitmap(usize::MAX, 2, PixelFormat::Rgb24),
            Err(SixelError::IntegerOverflow)
        ));
    }

    #[test]
    fn test_from_raw_mismatch() {
        let err = Bitmap::from_raw(2, 2, PixelFormat::Rgb24, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            SixelError::BufferSizeMismatch { expected: 12, actual: 11 }
        ));
    }

    #[test]
    fn test_to_argb16() {
        let src = Bitmap::from_raw(2, 1, PixelFormat::Argb32, vec![255, 128, 7, 255, 8, 16, 24, 0x7f]).unwrap();
        let dst = src.to_argb16().unwrap();
        assert_eq!(dst.format, PixelFormat::Argb16);
        assert!(dst.has_alpha);
        assert_eq!(dst.word(0), (31 << 10) | (16 << 5));
        assert_eq!(dst.word(1), ALPHA_BIT | (1 << 10) | (2 << 5) | 3);
        // Source untouched.
        assert_eq!(src.format, PixelFormat::Argb32);
    }

    #[test]
    fn test_colorize() {
        let mut img = create_bitmap(2, 1, PixelFormat::Aidx16).unwrap();
        img.palette = vec![ColorRgb::new(1, 2, 3), ColorRgb::new(4, 5, 6)];
        img.set_word(0, 1 | ALPHA_BIT);
        img.set_word(1, 9);
        let rgb = img.colorize().unwrap();
        assert_eq!(rgb.buf, vec![4, 5, 6, 0, 0, 0]);
    }

    #[test]
    fn test_sample_formats() {
        let img = Bitmap::from_raw(1, 1, PixelFormat::Rgb24, vec![10, 20, 30]).unwrap();
        assert_eq!(
            img.sample(0),
            Sample { r: 10, g: 20, b: 30, transparent: false }
        );
        let img = Bitmap::from_raw(1, 1, PixelFormat::Argb16, ((1u16 << 10) | ALPHA_BIT).to_le_bytes().to_vec()).unwrap();
        assert_eq!(
            img.sample(0),
            Sample { r: 8, g: 0, b: 0, transparent: true }
        );
    }
}
