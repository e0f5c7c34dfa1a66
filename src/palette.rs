//! Palette entries and the fixed palettes.

/// Color type for palette entries (RGB).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColorRgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorRgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Integer luma approximation `(5R + 9G + 2B) / 16`.
    #[inline]
    pub fn luma(self) -> u8 {
        ((self.r as u32 * 5 + self.g as u32 * 9 + self.b as u32 * 2) / 16) as u8
    }
}

/// RGB corners, indexed `R | G << 1 | B << 2`.
pub const PALETTE_FIXED8: [ColorRgb; 8] = [
    ColorRgb::new(0, 0, 0),
    ColorRgb::new(255, 0, 0),
    ColorRgb::new(0, 255, 0),
    ColorRgb::new(255, 255, 0),
    ColorRgb::new(0, 0, 255),
    ColorRgb::new(255, 0, 255),
    ColorRgb::new(0, 255, 255),
    ColorRgb::new(255, 255, 255),
];

/// Standard VGA colors, except that slot 3 is yellow instead of brown.
pub const PALETTE_VGA16: [ColorRgb; 16] = [
    ColorRgb::new(0, 0, 0),
    ColorRgb::new(170, 0, 0),
    ColorRgb::new(0, 170, 0),
    ColorRgb::new(170, 170, 0),
    ColorRgb::new(0, 0, 170),
    ColorRgb::new(170, 0, 170),
    ColorRgb::new(0, 170, 170),
    ColorRgb::new(170, 170, 170),
    ColorRgb::new(85, 85, 85),
    ColorRgb::new(255, 85, 85),
    ColorRgb::new(85, 255, 85),
    ColorRgb::new(255, 255, 85),
    ColorRgb::new(85, 85, 255),
    ColorRgb::new(255, 85, 255),
    ColorRgb::new(85, 255, 255),
    ColorRgb::new(255, 255, 255),
];

/// Channel levels of the xterm 6x6x6 cube.
pub const XTERM_LEVELS: [u8; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

/// `count` evenly spaced gray levels from black to white.
///
/// `count` must be in `2..=256`.
pub fn gray_palette(count: usize) -> Vec<ColorRgb> {
    (0..count)
        .map(|i| {
            let v = (i * 255 / (count - 1)) as u8;
            ColorRgb::new(v, v, v)
        })
        .collect()
}

/// 3 bits red, 3 bits green, 2 bits blue.
pub fn fixed256_palette() -> Vec<ColorRgb> {
    (0..256u32)
        .map(|i| {
            ColorRgb::new(
                (((i >> 5) & 0x07) * 255 / 7) as u8,
                (((i >> 2) & 0x07) * 255 / 7) as u8,
                ((i & 0x03) * 255 / 3) as u8,
            )
        })
        .collect()
}

/// The xterm-compatible 256 colors: VGA16, a 6x6x6 cube and 24 grays.
pub fn xterm256_palette() -> Vec<ColorRgb> {
    let mut pal = Vec::with_capacity(256);
    pal.extend_from_slice(&PALETTE_VGA16);
    for i in 0..216 {
        pal.push(ColorRgb::new(
            XTERM_LEVELS[i / 36],
            XTERM_LEVELS[(i / 6) % 6],
            XTERM_LEVELS[i % 6],
        ));
    }
    for i in 0..24u8 {
        let v = 8 + i * 10;
        pal.push(ColorRgb::new(v, v, v));
    }
    pal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_palette_endpoints() {
        let pal = gray_palette(2);
        assert_eq!(pal, vec![ColorRgb::new(0, 0, 0), ColorRgb::new(255, 255, 255)]);

        let pal = gray_palette(256);
        assert_eq!(pal.len(), 256);
        for (i, c) in pal.iter().enumerate() {
            assert_eq!(c.r as usize, i);
        }
    }

    #[test]
    fn test_fixed256_corners() {
        let pal = fixed256_palette();
        assert_eq!(pal[0], ColorRgb::new(0, 0, 0));
        assert_eq!(pal[255], ColorRgb::new(255, 255, 255));
        assert_eq!(pal[0b111_000_00], ColorRgb::new(255, 0, 0));
        assert_eq!(pal[0b000_111_00], ColorRgb::new(0, 255, 0));
        assert_eq!(pal[0b000_000_11], ColorRgb::new(0, 0, 255));
    }

    #[test]
    fn test_xterm256_layout() {
        let pal = xterm256_palette();
        assert_eq!(pal.len(), 256);
        assert_eq!(&pal[..16], &PALETTE_VGA16[..]);
        assert_eq!(pal[16], ColorRgb::new(0, 0, 0));
        assert_eq!(pal[16 + 215], ColorRgb::new(255, 255, 255));
        assert_eq!(pal[16 + 36 + 6 + 1], ColorRgb::new(0x5f, 0x5f, 0x5f));
        assert_eq!(pal[232], ColorRgb::new(8, 8, 8));
        assert_eq!(pal[255], ColorRgb::new(238, 238, 238));
    }

    #[test]
    fn test_luma() {
        assert_eq!(ColorRgb::new(0, 0, 0).luma(), 0);
        assert_eq!(ColorRgb::new(255, 255, 255).luma(), 255);
        assert!(ColorRgb::new(0, 255, 0).luma() > ColorRgb::new(255, 0, 0).luma());
    }
}
