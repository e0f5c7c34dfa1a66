#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sixelv::{reduce, Bitmap, ColorMode, Diffuse, PixelFormat, ReductMethod, ReductOptions};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    dst_width: u8,
    dst_height: u8,
    argb: bool,
    color: u8,
    count: u16,
    diffuse: u8,
    simple: bool,
    gain: i16,
    cdm: u16,
    pixels: Vec<u8>,
}

const DIFFUSE: [Diffuse; 10] = [
    Diffuse::None,
    Diffuse::Sfl,
    Diffuse::Fs,
    Diffuse::Atkinson,
    Diffuse::Jajuni,
    Diffuse::Stucki,
    Diffuse::Burkes,
    Diffuse::Two,
    Diffuse::Three,
    Diffuse::Rgb,
];

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 64);
    let height = (input.height as usize).clamp(1, 64);
    let format = if input.argb {
        PixelFormat::Argb32
    } else {
        PixelFormat::Rgb24
    };

    let expected = width * height * format.bytes_per_pixel();
    if input.pixels.len() < expected {
        return;
    }
    let Ok(src) = Bitmap::from_raw(width, height, format, input.pixels[..expected].to_vec()) else {
        return;
    };

    // Out-of-range counts must come back as errors.
    let count = input.count as usize;
    let color = match input.color % 6 {
        0 => ColorMode::Gray(count),
        1 => ColorMode::Fixed8,
        2 => ColorMode::Vga16,
        3 => ColorMode::Fixed256,
        4 => ColorMode::Xterm256,
        _ => ColorMode::Adaptive(count),
    };
    let opts = ReductOptions {
        color,
        method: if input.simple {
            ReductMethod::Simple
        } else {
            ReductMethod::HighQuality
        },
        diffuse: DIFFUSE[input.diffuse as usize % DIFFUSE.len()],
        gain: input.gain as i32,
        cdm: input.cdm as u32,
        ..Default::default()
    };

    let dst_width = (input.dst_width as usize).min(96);
    let dst_height = (input.dst_height as usize).min(96);
    if let Ok(dst) = reduce(&src, dst_width, dst_height, &opts) {
        let count = dst.palette_count();
        for y in 0..dst.height {
            for x in 0..dst.width {
                assert!((dst.index_at(x, y) as usize) < count);
            }
        }
    }
});
