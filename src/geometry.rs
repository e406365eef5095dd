//! Working-size resolution for two-phase (highres-fix) generation.
//!
//! The engine renders at a working size derived from a base size and a maximum
//! size, then results are resized back to the caller's dimensions. The working
//! size keeps the original aspect ratio:
//!
//! - the short side starts at `min(base_size, max_size)`
//! - the long side is `round(short × ratio)`
//! - if the long side exceeds `max_size`, it is pinned to `max_size` and the
//!   short side becomes `round(max_size / ratio)`
//!
//! Both sides are at least 1 pixel. The derived side is within half a pixel of
//! the exact aspect-preserving value.

use serde::Serialize;

/// Working width and height passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationGeometry {
    pub width: u32,
    pub height: u32,
}

impl GenerationGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square geometry, used verbatim as a tile size by tiled upscaling.
    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }
}

/// Compute the working geometry for an image of `orig_width × orig_height`.
///
/// Zero-sized originals are treated as square.
pub fn resolve(base_size: u32, max_size: u32, orig_width: u32, orig_height: u32) -> GenerationGeometry {
    let max_size = max_size.max(1);
    let short = base_size.clamp(1, max_size);

    if orig_width == 0 || orig_height == 0 {
        return GenerationGeometry::square(short);
    }

    let landscape = orig_width >= orig_height;
    let (long_orig, short_orig) = if landscape {
        (orig_width as f64, orig_height as f64)
    } else {
        (orig_height as f64, orig_width as f64)
    };
    let ratio = long_orig / short_orig;

    let mut short_side = short;
    let mut long_side = round_dim(short as f64 * ratio);
    if long_side > max_size {
        long_side = max_size;
        short_side = round_dim(max_size as f64 / ratio).min(max_size);
    }

    if landscape {
        GenerationGeometry::new(long_side, short_side)
    } else {
        GenerationGeometry::new(short_side, long_side)
    }
}

fn round_dim(value: f64) -> u32 {
    (value.round() as u32).max(1)
}
