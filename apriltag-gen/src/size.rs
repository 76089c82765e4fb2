// Size resolution
// Converts pixel or physical (cm + DPI) requests into a pixel count and back

use apriltag_common::{SizeSpec, CM_PER_INCH};

use crate::error::{Result, TagError};
use crate::tag36h11::PATTERN_CELLS;

/// Smallest tag that still gives every pattern cell one pixel
pub const MIN_TAG_PIXELS: u32 = PATTERN_CELLS as u32;

/// Cells across the pattern without its outer white ring
const INNER_CELLS: f64 = 8.0;
const FULL_CELLS: f64 = PATTERN_CELLS as f64;

/// Physical length of a pixel span at some DPI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalSize {
    pub cm: f64,
    pub inches: f64,
}

impl PhysicalSize {
    pub fn mm(&self) -> f64 {
        self.cm * 10.0
    }
}

/// Resolve a size request into a pixel count
pub fn resolve(spec: &SizeSpec) -> Result<u32> {
    let pixels = match *spec {
        SizeSpec::Pixels { value } => value,
        SizeSpec::Physical { length_cm, dpi } => {
            if !length_cm.is_finite() || length_cm <= 0.0 {
                return Err(TagError::invalid_size(format!("physical length must be positive, got {}cm", length_cm)));
            }
            if dpi == 0 {
                return Err(TagError::invalid_size("DPI must be positive"));
            }
            let pixels = (length_cm / CM_PER_INCH * f64::from(dpi)).round();
            if pixels > f64::from(u32::MAX) {
                return Err(TagError::invalid_size(format!("{}cm at {} DPI is too large", length_cm, dpi)));
            }
            pixels as u32
        }
    };

    if pixels < MIN_TAG_PIXELS {
        return Err(TagError::invalid_size(format!(
            "{} resolves to {}px, need at least {}px",
            spec, pixels, MIN_TAG_PIXELS
        )));
    }

    tracing::trace!(%spec, pixels, "resolved size");
    Ok(pixels)
}

/// Convert a pixel count at a DPI back to centimetres and inches
pub fn pixels_to_physical(pixels: u32, dpi: u32) -> Result<PhysicalSize> {
    if dpi == 0 {
        return Err(TagError::invalid_size("DPI must be positive"));
    }
    let inches = f64::from(pixels) / f64::from(dpi);
    Ok(PhysicalSize { cm: inches * CM_PER_INCH, inches })
}

/// Size of the full 10-cell pattern given the size of its black square (8 cells)
pub fn full_size_from_inner(inner: f64) -> f64 {
    inner * FULL_CELLS / INNER_CELLS
}

/// Size of the black square (8 cells) given the full 10-cell pattern size
pub fn inner_size_from_full(full: f64) -> f64 {
    full * INNER_CELLS / FULL_CELLS
}
