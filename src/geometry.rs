//! Target size computation for resizing.

use std::fmt;
use std::str::FromStr;

use crate::{Result, SixelError};

/// Which requested dimension drives the resize.
///
/// The `ScaleDown*` variants never enlarge the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResizeAxis {
    /// Both requested dimensions, aspect ratio ignored when both are given
    Both,
    Width,
    Height,
    /// Whichever side of the source is longer
    Long,
    /// Whichever side of the source is shorter
    Short,
    ScaleDownBoth,
    ScaleDownWidth,
    ScaleDownHeight,
    #[default]
    ScaleDownLong,
    ScaleDownShort,
}

const NAMES: &[(ResizeAxis, &str)] = &[
    (ResizeAxis::Both, "both"),
    (ResizeAxis::Width, "width"),
    (ResizeAxis::Height, "height"),
    (ResizeAxis::Long, "long"),
    (ResizeAxis::Short, "short"),
    (ResizeAxis::ScaleDownBoth, "scaledown-both"),
    (ResizeAxis::ScaleDownWidth, "scaledown-width"),
    (ResizeAxis::ScaleDownHeight, "scaledown-height"),
    (ResizeAxis::ScaleDownLong, "scaledown-long"),
    (ResizeAxis::ScaleDownShort, "scaledown-short"),
];

impl ResizeAxis {
    pub fn is_scaledown(self) -> bool {
        matches!(
            self,
            ResizeAxis::ScaleDownBoth
                | ResizeAxis::ScaleDownWidth
                | ResizeAxis::ScaleDownHeight
                | ResizeAxis::ScaleDownLong
                | ResizeAxis::ScaleDownShort
        )
    }
}

impl fmt::Display for ResizeAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = NAMES
            .iter()
            .find(|(a, _)| a == self)
            .map_or("?", |(_, n)| n);
        f.write_str(name)
    }
}

impl FromStr for ResizeAxis {
    type Err = SixelError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase().replace('_', "-");
        NAMES
            .iter()
            .find(|(_, n)| *n == lower)
            .map(|(a, _)| *a)
            .ok_or_else(|| SixelError::UnsupportedAxis(s.to_string()))
    }
}

/// The axis the computation finally follows.
enum Resolved {
    Width,
    Height,
    Both,
}

/// Computes the size to resize a `current_width` x `current_height` image to.
///
/// A zero request means "keep the current size" on that axis. When only one
/// dimension drives the resize the other follows the source aspect ratio.
/// Neither result dimension is ever zero.
pub fn get_preferred_size(
    current_width: usize,
    current_height: usize,
    axis: ResizeAxis,
    request_width: usize,
    request_height: usize,
) -> Result<(usize, usize)> {
    if current_width == 0 || current_height == 0 {
        return Err(SixelError::InvalidDimensions {
            width: current_width,
            height: current_height,
        });
    }

    let resolved = match axis {
        ResizeAxis::Both | ResizeAxis::ScaleDownBoth => {
            if request_width == 0 {
                Resolved::Height
            } else if request_height == 0 {
                Resolved::Width
            } else {
                Resolved::Both
            }
        }
        ResizeAxis::Width | ResizeAxis::ScaleDownWidth => Resolved::Width,
        ResizeAxis::Height | ResizeAxis::ScaleDownHeight => Resolved::Height,
        ResizeAxis::Long | ResizeAxis::ScaleDownLong => {
            if current_width >= current_height {
                Resolved::Width
            } else {
                Resolved::Height
            }
        }
        ResizeAxis::Short | ResizeAxis::ScaleDownShort => {
            if current_width <= current_height {
                Resolved::Width
            } else {
                Resolved::Height
            }
        }
    };

    let mut rw = if request_width == 0 { current_width } else { request_width };
    let mut rh = if request_height == 0 { current_height } else { request_height };
    if axis.is_scaledown() {
        rw = rw.min(current_width);
        rh = rh.min(current_height);
    }

    let scale = |n: usize, num: usize, den: usize| -> Result<usize> {
        let v = (n as u128 * num as u128) / den as u128;
        usize::try_from(v).map_err(|_| SixelError::IntegerOverflow)
    };

    let (width, height) = match resolved {
        Resolved::Width => (rw, scale(current_height, rw, current_width)?),
        Resolved::Height => (scale(current_width, rh, current_height)?, rh),
        Resolved::Both => (rw, rh),
    };
    Ok((width.max(1), height.max(1)))
}
