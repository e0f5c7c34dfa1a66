//! sixelv - show images in the terminal as SIXEL graphics
//!
//! Each input is resized, reduced to a palette and written as one SIXEL
//! image, in order, to stdout or `--output`.

use clap::{ArgAction, Parser};
use sixelv::reduct::MAX_GAIN;
use sixelv::{
    get_preferred_size, reduce, sixel_encode, Bitmap, ColorMode, Diffuse, PixelFormat,
    ReductMethod, ReductOptions, ResizeAxis,
};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sixelv")]
#[command(version)]
#[command(about = "Show images as SIXEL graphics", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Input image files (PNG, JPEG, GIF, WebP)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Palette: gray<N>, 8, 16, 256, xterm256, adaptive<N>
    #[arg(short, long, default_value = "256")]
    color: ColorMode,

    /// Reduction method: simple, high
    #[arg(short, long, default_value = "high")]
    method: ReductMethod,

    /// Error diffusion: none, sfl, fs, atkinson, jajuni, stucki, burkes, 2, 3, rgb
    #[arg(short, long, default_value = "sfl")]
    diffuse: Diffuse,

    /// Brightness as a fraction of 256 (256 = unchanged, at most 4096)
    #[arg(
        long,
        allow_negative_numbers = true,
        default_value_t = -1,
        value_parser = clap::value_parser!(i32).range(..=MAX_GAIN as i64)
    )]
    gain: i32,

    /// Color depth modulation floor (0 = off)
    #[arg(long, default_value_t = 0)]
    cdm: u32,

    /// Requested width in pixels (default: original)
    #[arg(short, long)]
    width: Option<usize>,

    /// Requested height in pixels (default: original)
    #[arg(short, long)]
    height: Option<usize>,

    /// Which requested dimension drives the resize
    #[arg(long, default_value = "scaledown-long")]
    resize_axis: ResizeAxis,

    /// Emit SIXEL in OR mode
    #[arg(long)]
    ormode: bool,

    /// Leave transparent pixels unpainted
    #[arg(long)]
    transbg: bool,

    /// Do not emit palette definitions
    #[arg(long)]
    suppress_palette: bool,

    /// Output SIXEL file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also save the reduced image as PNG (single input only)
    #[arg(long)]
    output_png: Option<PathBuf>,

    /// More logging on stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn reduct_options(&self) -> ReductOptions {
        ReductOptions {
            color: self.color,
            method: self.method,
            diffuse: self.diffuse,
            gain: self.gain,
            cdm: self.cdm,
            output_ormode: self.ormode,
            output_transbg: self.transbg,
            suppress_palette: self.suppress_palette,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "sixelv=warn",
        1 => "sixelv=debug",
        _ => "sixelv=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .init();
}

/// Loads `path` as RGB24, or ARGB32 when the image carries alpha.
fn load(path: &Path) -> Result<Bitmap, Box<dyn Error>> {
    let img = image::open(path)?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let bitmap = if img.color().has_alpha() {
        Bitmap::from_raw(width, height, PixelFormat::Argb32, img.to_rgba8().into_raw())?
    } else {
        Bitmap::from_raw(width, height, PixelFormat::Rgb24, img.to_rgb8().into_raw())?
    };
    Ok(bitmap)
}

fn convert(path: &Path, cli: &Cli, opts: &ReductOptions) -> Result<String, Box<dyn Error>> {
    let src = load(path)?;
    let (width, height) = get_preferred_size(
        src.width,
        src.height,
        cli.resize_axis,
        cli.width.unwrap_or(0),
        cli.height.unwrap_or(0),
    )?;
    debug!(
        file = %path.display(),
        src = ?(src.width, src.height),
        dst = ?(width, height),
        has_alpha = src.has_alpha,
        "loaded"
    );

    let dst = reduce(&src, width, height, opts)?;

    if let Some(png) = &cli.output_png {
        let preview = dst.colorize()?;
        image::RgbImage::from_raw(width as u32, height as u32, preview.buf)
            .ok_or("Failed to create preview image")?
            .save(png)?;
        eprintln!("Preview written to '{}'", png.display());
    }

    Ok(sixel_encode(&dst, opts)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.output_png.is_some() && cli.files.len() > 1 {
        return Err("--output-png needs exactly one input file".into());
    }

    let opts = cli.reduct_options();
    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    let mut failed = 0;
    for file in &cli.files {
        match convert(file, &cli, &opts) {
            Ok(sixel) => {
                out.write_all(sixel.as_bytes())?;
                out.flush()?;
            }
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} files failed", failed, cli.files.len()).into());
    }
    Ok(())
}
