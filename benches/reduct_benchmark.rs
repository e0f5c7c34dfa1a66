use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sixelv::{
    reduce, sixel_encode, Bitmap, ColorMode, Diffuse, PixelFormat, ReductMethod, ReductOptions,
};
use std::hint::black_box;

fn generate_colorful(width: usize, height: usize) -> Bitmap {
    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            pixels.push(((x * 255) / width) as u8);
            pixels.push(((y * 255) / height) as u8);
            pixels.push((((x + y) * 255) / (width + height)) as u8);
        }
    }
    Bitmap::from_raw(width, height, PixelFormat::Rgb24, pixels).unwrap()
}

fn bench_color_modes(c: &mut Criterion) {
    let src = generate_colorful(640, 480);
    let mut group = c.benchmark_group("reduce_640x480_to_320x240");

    for color in [
        ColorMode::Gray(16),
        ColorMode::Fixed8,
        ColorMode::Vga16,
        ColorMode::Fixed256,
        ColorMode::Xterm256,
        ColorMode::Adaptive(256),
    ] {
        let opts = ReductOptions {
            color,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(color), &opts, |b, opts| {
            b.iter(|| reduce(black_box(&src), 320, 240, opts).unwrap())
        });
    }
    group.finish();
}

fn bench_diffusion(c: &mut Criterion) {
    let src = generate_colorful(320, 240);
    let mut group = c.benchmark_group("diffuse_320x240");

    for diffuse in [Diffuse::None, Diffuse::Sfl, Diffuse::Fs, Diffuse::Jajuni, Diffuse::Rgb] {
        let opts = ReductOptions {
            diffuse,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(diffuse), &opts, |b, opts| {
            b.iter(|| reduce(black_box(&src), 320, 240, opts).unwrap())
        });
    }

    let simple = ReductOptions {
        method: ReductMethod::Simple,
        ..Default::default()
    };
    group.bench_function("simple", |b| {
        b.iter(|| reduce(black_box(&src), 320, 240, &simple).unwrap())
    });
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let src = generate_colorful(320, 240);
    let mut group = c.benchmark_group("encode_320x240");

    for ormode in [false, true] {
        let opts = ReductOptions {
            color: ColorMode::Adaptive(256),
            output_ormode: ormode,
            ..Default::default()
        };
        let dst = reduce(&src, 320, 240, &opts).unwrap();
        let name = if ormode { "ormode" } else { "normal" };
        group.bench_function(name, |b| {
            b.iter(|| sixel_encode(black_box(&dst), &opts).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_color_modes, bench_diffusion, bench_encode);
criterion_main!(benches);
