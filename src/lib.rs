//! # sixelv
//!
//! Image reduction engine for SIXEL terminals.
//!
//! ## Features
//!
//! - **Reduction**: resize an RGB(A) bitmap and map every pixel onto a palette of
//!   2 to 256 colors in a single pass, with optional error-diffusion dithering
//! - **Palettes**: grayscale, fixed 8 / 16 (VGA) / 256 (RGB332) / xterm-256, and an
//!   adaptive palette built per image with octree quantization
//! - **Encoder**: serializes the indexed result to SIXEL, in normal or OR mode
//!
//! ## Quick Start
//!
//! ```ignore
//! use sixelv::{create_bitmap, reduce, sixel_encode, PixelFormat, ReductOptions};
//!
//! let mut src = create_bitmap(2, 1, PixelFormat::Rgb24)?;
//! src.buf.copy_from_slice(&[255, 0, 0, 0, 255, 0]);
//! let opts = ReductOptions::default();
//! let dst = reduce(&src, 2, 1, &opts)?;
//! print!("{}", sixel_encode(&dst, &opts)?);
//! ```

use thiserror::Error;

pub mod bitmap;
pub mod diffuse;
pub mod encoder;
pub mod finder;
pub mod geometry;
pub mod octree;
pub mod palette;
pub mod rational;
pub mod reduct;

pub use bitmap::{create_bitmap, Bitmap, PixelFormat};
pub use diffuse::Diffuse;
pub use encoder::sixel_encode;
pub use geometry::{get_preferred_size, ResizeAxis};
pub use palette::ColorRgb;
pub use reduct::{reduce, ColorMode, ReductMethod, ReductOptions};

/// Errors that can occur while reducing or encoding an image.
#[derive(Debug, Error)]
pub enum SixelError {
    /// Invalid image dimensions (width or height is zero)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Buffer size doesn't match expected size for dimensions
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Color strategy that cannot be honored
    #[error("unsupported color: {0}")]
    UnsupportedColor(String),

    /// Gain above [`reduct::MAX_GAIN`]
    #[error("unsupported gain: {0}")]
    UnsupportedGain(i32),

    /// Unknown diffusion kernel name
    #[error("unsupported diffusion method: {0}")]
    UnsupportedDiffuse(String),

    /// Unknown reduction method name
    #[error("unsupported reduction method: {0}")]
    UnsupportedMethod(String),

    /// Unknown resize axis name
    #[error("unsupported resize axis: {0}")]
    UnsupportedAxis(String),

    /// Pixel format the operation cannot work with
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Memory allocation failed
    #[error("allocation failed: {0}")]
    Allocation(&'static str),

    /// Color quantization failed
    #[error("quantization error: {0}")]
    Quantization(String),

    /// Integer overflow during processing
    #[error("integer overflow")]
    IntegerOverflow,
}

/// Result type for reduction and SIXEL operations.
pub type Result<T> = core::result::Result<T, SixelError>;

/// Allocates a zero-filled vector, reporting failure instead of aborting.
pub(crate) fn try_alloc<T: Clone + Default>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| SixelError::Allocation(what))?;
    v.resize(len, T::default());
    Ok(v)
}
