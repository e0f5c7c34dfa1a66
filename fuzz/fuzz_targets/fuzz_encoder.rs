#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sixelv::{create_bitmap, sixel_encode, ColorRgb, PixelFormat, ReductOptions};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    palette: Vec<(u8, u8, u8)>,
    words: Vec<u16>,
    ormode: bool,
    transbg: bool,
    suppress_palette: bool,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 128);
    let height = (input.height as usize).clamp(1, 128);
    if input.palette.is_empty() || input.words.len() < width * height {
        return;
    }
    let Ok(mut img) = create_bitmap(width, height, PixelFormat::Aidx16) else {
        return;
    };
    img.palette = input
        .palette
        .iter()
        .take(256)
        .map(|&(r, g, b)| ColorRgb::new(r, g, b))
        .collect();
    for (chunk, w) in img.buf.chunks_exact_mut(2).zip(&input.words) {
        chunk.copy_from_slice(&w.to_le_bytes());
    }

    let opts = ReductOptions {
        output_ormode: input.ormode,
        output_transbg: input.transbg,
        suppress_palette: input.suppress_palette,
        ..Default::default()
    };
    let sixel = sixel_encode(&img, &opts).expect("indexed bitmap with palette");
    assert!(sixel.starts_with("\x1bP"));
    assert!(sixel.ends_with("\x1b\\"));
});
