//! SIXEL serializer for reduced (indexed) bitmaps.
//!
//! Output is a complete DCS string: raster attributes, palette registers,
//! then the image in bands of six rows, terminated by ST.

use tracing::debug;

use crate::bitmap::{Bitmap, PixelFormat, ALPHA_BIT, INDEX_MASK};
use crate::palette::ColorRgb;
use crate::reduct::ReductOptions;
use crate::{Result, SixelError};

const BAND: usize = 6;

/// Encodes an [`PixelFormat::Aidx16`] bitmap, as returned by
/// [`reduce`](crate::reduce), into a SIXEL string.
///
/// Only `output_ormode`, `output_transbg` and `suppress_palette` of `opts`
/// are consulted. Pixels carrying the transparency bit are never painted.
///
/// # Example
/// ```ignore
/// let dst = sixelv::reduce(&src, 80, 60, &opts)?;
/// print!("{}", sixelv::sixel_encode(&dst, &opts)?);
/// ```
pub fn sixel_encode(img: &Bitmap, opts: &ReductOptions) -> Result<String> {
    if img.format != PixelFormat::Aidx16 {
        return Err(SixelError::UnsupportedFormat(format!(
            "{:?} cannot be encoded, reduce it to an indexed bitmap first",
            img.format
        )));
    }
    img.validate_source()?;

    let mut out = String::with_capacity(img.width * img.height / 2 + 64);
    let mut cols = vec![0u8; img.width];

    let bits = plane_count(img.palette.len());
    let mode = if opts.output_ormode {
        5
    } else if opts.output_transbg || img.has_alpha {
        1
    } else {
        0
    };

    // DCS P1 ; P2 ; q " Pan ; Pad ; Ph ; Pv
    out.push_str("\x1bP7;");
    write_number(&mut out, mode);
    out.push_str(";q\"1;1;");
    write_number(&mut out, img.width);
    out.push(';');
    write_number(&mut out, img.height);

    if !opts.suppress_palette {
        let registers = if opts.output_ormode {
            img.palette.len().max(1 << bits)
        } else {
            img.palette.len()
        };
        for i in 0..registers {
            let c = img.palette.get(i).copied().unwrap_or_default();
            write_register(&mut out, i, c);
        }
    }

    if opts.output_ormode {
        encode_planes(img, bits, &mut cols, &mut out);
    } else {
        encode_colors(img, &mut cols, &mut out);
    }

    out.push_str("\x1b\\");
    debug!(
        width = img.width,
        height = img.height,
        ormode = opts.output_ormode,
        bytes = out.len(),
        "sixel encoded"
    );
    Ok(out)
}

/// Bits needed to address `count` registers.
fn plane_count(count: usize) -> u32 {
    (0..8).find(|&i| count <= 1 << i).unwrap_or(8)
}

fn write_register(out: &mut String, i: usize, c: ColorRgb) {
    out.push('#');
    write_number(out, i);
    out.push_str(";2;");
    write_number(out, c.r as usize * 100 / 255);
    out.push(';');
    write_number(out, c.g as usize * 100 / 255);
    out.push(';');
    write_number(out, c.b as usize * 100 / 255);
}

/// One `#n` pass per color used in the band.
fn encode_colors(img: &Bitmap, cols: &mut [u8], out: &mut String) {
    let mut used = vec![false; img.palette.len()];

    for y0 in (0..img.height).step_by(BAND) {
        let y1 = (y0 + BAND).min(img.height);
        if y0 > 0 {
            out.push('-');
        }

        used.fill(false);
        for i in y0 * img.width..y1 * img.width {
            let w = img.word(i);
            if w & ALPHA_BIT == 0 {
                if let Some(u) = used.get_mut((w & INDEX_MASK) as usize) {
                    *u = true;
                }
            }
        }

        let mut first = true;
        for (color, _) in used.iter().enumerate().filter(|(_, u)| **u) {
            if !first {
                out.push('$');
            }
            first = false;

            out.push('#');
            write_number(out, color);
            fill_columns(img, y0, y1, cols, |w| {
                w & ALPHA_BIT == 0 && (w & INDEX_MASK) as usize == color
            });
            write_sixels(out, cols);
        }
    }
}

/// One pass per index bit; the terminal ORs the selected registers.
fn encode_planes(img: &Bitmap, bits: u32, cols: &mut [u8], out: &mut String) {
    for y0 in (0..img.height).step_by(BAND) {
        let y1 = (y0 + BAND).min(img.height);
        if y0 > 0 {
            out.push('-');
        }

        for b in 0..bits {
            if b > 0 {
                out.push('$');
            }
            out.push('#');
            write_number(out, 1 << b);
            fill_columns(img, y0, y1, cols, |w| {
                w & ALPHA_BIT == 0 && ((w & INDEX_MASK) >> b) & 1 != 0
            });
            write_sixels(out, cols);
        }
    }
}

/// Sets bit `dy` of `cols[x]` for every pixel of the band that `paint` accepts.
fn fill_columns(img: &Bitmap, y0: usize, y1: usize, cols: &mut [u8], paint: impl Fn(u16) -> bool) {
    cols.fill(0);
    for (dy, y) in (y0..y1).enumerate() {
        let row = y * img.width;
        for (x, c) in cols.iter_mut().enumerate() {
            if paint(img.word(row + x)) {
                *c |= 1 << dy;
            }
        }
    }
}

/// Run-length encodes one band row; trailing empty columns are dropped.
fn write_sixels(out: &mut String, cols: &[u8]) {
    let end = cols.iter().rposition(|&c| c != 0).map_or(0, |p| p + 1);
    let mut x = 0;
    while x < end {
        let bits = cols[x];
        let run = cols[x..end].iter().take_while(|&&c| c == bits).count();
        let ch = (0x3f + bits) as char;
        if run >= 4 {
            out.push('!');
            write_number(out, run);
            out.push(ch);
        } else {
            for _ in 0..run {
                out.push(ch);
            }
        }
        x += run;
    }
}

/// Decimal formatting straight into the output buffer.
#[inline]
fn write_number(out: &mut String, mut n: usize) {
    let mut buf = [0u8; 20];
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    out.extend(buf[i..].iter().map(|&d| d as char));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::create_bitmap;
    use pretty_assertions::assert_eq;

    fn indexed(width: usize, height: usize, words: &[u16], palette: &[ColorRgb]) -> Bitmap {
        let mut img = create_bitmap(width, height, PixelFormat::Aidx16).unwrap();
        for (i, &w) in words.iter().enumerate() {
            img.set_word(i, w);
        }
        img.palette = palette.to_vec();
        img
    }

    const BLACK: ColorRgb = ColorRgb::new(0, 0, 0);
    const WHITE: ColorRgb = ColorRgb::new(255, 255, 255);

    #[test]
    fn test_single_pixel() {
        let img = indexed(1, 1, &[0], &[ColorRgb::new(255, 0, 0)]);
        let s = sixel_encode(&img, &ReductOptions::default()).unwrap();
        assert_eq!(s, "\x1bP7;0;q\"1;1;1;1#0;2;100;0;0#0@\x1b\\");
    }

    #[test]
    fn test_repeat_unit() {
        let img = indexed(5, 1, &[1; 5], &[BLACK, WHITE]);
        let s = sixel_encode(&img, &ReductOptions::default()).unwrap();
        assert_eq!(
            s,
            "\x1bP7;0;q\"1;1;5;1#0;2;0;0;0#1;2;100;100;100#1!5@\x1b\\"
        );

        let img = indexed(3, 1, &[1; 3], &[BLACK, WHITE]);
        let s = sixel_encode(&img, &ReductOptions::default()).unwrap();
        assert!(s.contains("#1@@@"));
    }

    #[test]
    fn test_colors_and_bands() {
        // 1x7: six rows of color 0, then one row of color 1.
        let img = indexed(1, 7, &[0, 0, 0, 0, 0, 0, 1], &[BLACK, WHITE]);
        let opts = ReductOptions {
            suppress_palette: true,
            ..Default::default()
        };
        let s = sixel_encode(&img, &opts).unwrap();
        assert_eq!(s, "\x1bP7;0;q\"1;1;1;7#0~-#1@\x1b\\");

        let img = indexed(2, 1, &[0, 1], &[BLACK, WHITE]);
        let s = sixel_encode(&img, &opts).unwrap();
        assert_eq!(s, "\x1bP7;0;q\"1;1;2;1#0@$#1?@\x1b\\");
    }

    #[test]
    fn test_transparent_not_painted() {
        let mut img = indexed(2, 1, &[ALPHA_BIT, 0], &[WHITE]);
        img.has_alpha = true;
        let s = sixel_encode(&img, &ReductOptions::default()).unwrap();
        assert_eq!(s, "\x1bP7;1;q\"1;1;2;1#0;2;100;100;100#0?@\x1b\\");
    }

    #[test]
    fn test_transbg_sets_p2() {
        let img = indexed(1, 1, &[0], &[WHITE]);
        let opts = ReductOptions {
            output_transbg: true,
            ..Default::default()
        };
        assert!(sixel_encode(&img, &opts).unwrap().starts_with("\x1bP7;1;q"));
    }

    #[test]
    fn test_ormode_planes() {
        let pal = [BLACK, WHITE, ColorRgb::new(255, 0, 0)];
        let img = indexed(1, 1, &[2], &pal);
        let opts = ReductOptions {
            output_ormode: true,
            ..Default::default()
        };
        let s = sixel_encode(&img, &opts).unwrap();
        assert_eq!(
            s,
            "\x1bP7;5;q\"1;1;1;1\
             #0;2;0;0;0#1;2;100;100;100#2;2;100;0;0#3;2;0;0;0\
             #1$#2@\x1b\\"
        );
    }

    #[test]
    fn test_plane_count() {
        assert_eq!(plane_count(1), 0);
        assert_eq!(plane_count(2), 1);
        assert_eq!(plane_count(3), 2);
        assert_eq!(plane_count(16), 4);
        assert_eq!(plane_count(17), 5);
        assert_eq!(plane_count(256), 8);
    }

    #[test]
    fn test_rejects_unindexed() {
        let img = create_bitmap(1, 1, PixelFormat::Rgb24).unwrap();
        assert!(matches!(
            sixel_encode(&img, &ReductOptions::default()),
            Err(SixelError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_write_number() {
        let mut s = String::new();
        for n in [0, 7, 10, 255, 1_000_000] {
            write_number(&mut s, n);
            s.push(',');
        }
        assert_eq!(s, "0,7,10,255,1000000,");
    }
}
