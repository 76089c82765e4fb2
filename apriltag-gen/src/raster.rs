//! Tag rasterizer
//!
//! Renders one tag into a `size_px x size_px` grayscale bitmap:
//! - `border_cells` rings of white quiet zone surround the 10x10 pattern
//! - every cell boundary is rounded on its own from the exact real position,
//!   so no boundary drifts by more than half a pixel anywhere in the grid
//! - circular style forces everything outside the inscribed circle to white

use apriltag_common::RenderStyle;
use image::{GrayImage, Luma};

use crate::error::{Result, TagError};
use crate::label::{self, LabelFont};
use crate::tag36h11::{self, TagPattern, PATTERN_CELLS};

const BLACK: Luma<u8> = Luma([0u8]);
pub(crate) const WHITE: Luma<u8> = Luma([255u8]);

/// A rendered bitmap plus the DPI it should be printed at
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTag {
    pub image: GrayImage,
    pub dpi: u32,
}

impl RasterTag {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode as PNG with a pHYs chunk so printing at 100% keeps the size
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let encode_err = |e: png::EncodingError| TagError::Encode {
            format: "PNG",
            message: e.to_string(),
        };

        // pHYs stores pixels per metre
        let ppm = (f64::from(self.dpi) / 0.0254).round() as u32;

        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, self.image.width(), self.image.height());
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));
            let mut writer = encoder.write_header().map_err(encode_err)?;
            writer.write_image_data(self.image.as_raw()).map_err(encode_err)?;
            writer.finish().map_err(encode_err)?;
        }
        Ok(buf)
    }
}

/// Cell grid geometry for one tag, shared by every renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGrid {
    /// Side length of the whole tag in output units
    pub size: f64,
    /// Quiet-zone rings on each side
    pub border_cells: u32,
}

impl CellGrid {
    pub fn new(size: f64, border_cells: u32) -> Result<Self> {
        if border_cells == 0 {
            return Err(TagError::invalid_size("border must be at least one cell"));
        }
        Ok(Self { size, border_cells })
    }

    /// Cells across the full tag, quiet zone included
    pub fn total_cells(&self) -> u32 {
        PATTERN_CELLS as u32 + 2 * self.border_cells
    }

    pub fn cell_size(&self) -> f64 {
        self.size / f64::from(self.total_cells())
    }

    /// Real-valued origin of pattern cell `(row, col)`
    pub fn cell_origin(&self, row: usize, col: usize) -> (f64, f64) {
        let cell = self.cell_size();
        let b = f64::from(self.border_cells);
        ((col as f64 + b) * cell, (row as f64 + b) * cell)
    }

    /// Top of the quiet-zone band below the pattern
    pub fn label_band_top(&self) -> f64 {
        f64::from(self.border_cells + PATTERN_CELLS as u32) * self.cell_size()
    }
}

/// Pixel position of grid line `i` in a `size_px` bitmap split into `total`
/// cells: `round(i * size_px / total)`, computed in integers (half rounds up).
pub fn grid_line(i: u32, size_px: u32, total: u32) -> u32 {
    let num = 2 * u64::from(i) * u64::from(size_px) + u64::from(total);
    (num / (2 * u64::from(total))) as u32
}

/// Render a single tag into a bitmap
pub fn render(
    tag_id: u32,
    size_px: u32,
    border_cells: u32,
    style: RenderStyle,
    label: Option<&LabelFont>,
) -> Result<GrayImage> {
    let pattern = tag36h11::lookup(tag_id)?;
    let grid = CellGrid::new(f64::from(size_px), border_cells)?;
    let total = grid.total_cells();
    if size_px < total {
        return Err(TagError::invalid_size(format!(
            "{}px cannot fit {} cells at one pixel per cell",
            size_px, total
        )));
    }

    tracing::debug!(tag_id, size_px, border_cells, %style, "rasterizing tag");

    let mut img = GrayImage::from_pixel(size_px, size_px, WHITE);
    paint_cells(&mut img, pattern, border_cells, total);

    if let Some(font) = label {
        let top = grid_line(border_cells + PATTERN_CELLS as u32, size_px, total);
        let band = label::render_band(tag_id, size_px, size_px - top, font)?;
        image::imageops::replace(&mut img, &band, 0, i64::from(top));
    }

    if style == RenderStyle::Circular {
        apply_circular_mask(&mut img);
    }

    Ok(img)
}

fn paint_cells(img: &mut GrayImage, pattern: &TagPattern, border_cells: u32, total: u32) {
    let size_px = img.width();
    for (row, col) in pattern.black_cells() {
        let gx = col as u32 + border_cells;
        let gy = row as u32 + border_cells;
        let (x0, x1) = (grid_line(gx, size_px, total), grid_line(gx + 1, size_px, total));
        let (y0, y1) = (grid_line(gy, size_px, total), grid_line(gy + 1, size_px, total));

        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, BLACK);
            }
        }
    }
}

/// Force every pixel whose centre lies outside the inscribed circle to white.
/// The circle is centred on `(w / 2, h / 2)` in real coordinates, so odd and
/// even sizes are both centred exactly.
pub fn apply_circular_mask(img: &mut GrayImage) {
    let size = f64::from(img.width().min(img.height()));
    let cx = f64::from(img.width()) / 2.0;
    let cy = f64::from(img.height()) / 2.0;
    let r2 = (size / 2.0) * (size / 2.0);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        if dx * dx + dy * dy > r2 {
            *pixel = WHITE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag36h11::tests::GOLDEN_TAG_0;
    use proptest::prelude::*;

    fn is_black(img: &GrayImage, x: u32, y: u32) -> bool {
        img.get_pixel(x, y)[0] == 0
    }

    #[test]
    fn test_exact_dimensions() {
        for size in [12, 120, 123, 1181] {
            let img = render(0, size, 1, RenderStyle::Rectangular, None).unwrap();
            assert_eq!(img.dimensions(), (size, size));
        }
    }

    #[test]
    fn test_pattern_matches_golden() {
        // 12 cells at 10px each, cell (r, c) starts at ((c + 1) * 10, (r + 1) * 10)
        let img = render(0, 120, 1, RenderStyle::Rectangular, None).unwrap();
        for (r, row) in GOLDEN_TAG_0.iter().enumerate() {
            for (c, ch) in row.chars().enumerate() {
                let x = (c as u32 + 1) * 10 + 5;
                let y = (r as u32 + 1) * 10 + 5;
                assert_eq!(is_black(&img, x, y), ch == '#', "cell ({}, {})", r, c);
            }
        }
    }

    #[test]
    fn test_corners_are_white() {
        let img = render(0, 120, 1, RenderStyle::Rectangular, None).unwrap();
        for (x, y) in [(0, 0), (119, 0), (0, 119), (119, 119)] {
            assert!(!is_black(&img, x, y));
        }
    }

    #[test]
    fn test_deterministic() {
        let a = render(123, 317, 2, RenderStyle::Circular, None).unwrap();
        let b = render(123, 317, 2, RenderStyle::Circular, None).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_quiet_zone_scales_with_border() {
        // 1680 is divisible by 12, 14 and 16 total cells, so every boundary is exact.
        // The quiet zone is the frame outside the pattern square; its area in
        // cells is total^2 - 100 and each cell is (1680 / total)^2 pixels.
        let size = 1680u32;
        for border in 1..=3u32 {
            let img = render(0, size, border, RenderStyle::Rectangular, None).unwrap();
            let total = 10 + 2 * border;
            let start = grid_line(border, size, total);
            let end = grid_line(border + 10, size, total);

            let frame = img
                .enumerate_pixels()
                .filter(|(x, y, _)| !((start..end).contains(x) && (start..end).contains(y)))
                .inspect(|(_, _, p)| assert_eq!(p[0], 255))
                .count() as u32;

            assert_eq!(size % total, 0);
            let cell = size / total;
            // Quiet zone width is linear in the ring count
            assert_eq!(u64::from(start) * u64::from(total), u64::from(border) * u64::from(size));
            assert_eq!(end - start, 10 * cell);
            assert_eq!(frame, size * size - (10 * cell) * (10 * cell));
            // Width of the frame on each side is exactly border * cell pixels
            assert_eq!(start, border * cell);
        }
    }

    #[test]
    fn test_circular_mask_clears_outside() {
        for size in [101u32, 240] {
            let img = render(7, size, 1, RenderStyle::Circular, None).unwrap();
            let c = f64::from(size) / 2.0;
            for (x, y, p) in img.enumerate_pixels() {
                let dx = f64::from(x) + 0.5 - c;
                let dy = f64::from(y) + 0.5 - c;
                if (dx * dx + dy * dy).sqrt() > c {
                    assert_eq!(p[0], 255, "pixel ({}, {}) outside circle", x, y);
                }
            }
        }
    }

    #[test]
    fn test_circular_keeps_pattern_inside() {
        let square = render(7, 240, 1, RenderStyle::Rectangular, None).unwrap();
        let round = render(7, 240, 1, RenderStyle::Circular, None).unwrap();
        let c = 120.0;
        for (x, y, p) in round.enumerate_pixels() {
            let dx = f64::from(x) + 0.5 - c;
            let dy = f64::from(y) + 0.5 - c;
            if (dx * dx + dy * dy).sqrt() <= c {
                assert_eq!(p, square.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_label_leaves_pattern_untouched() {
        let plain = render(42, 280, 2, RenderStyle::Rectangular, None).unwrap();
        let labelled = render(42, 280, 2, RenderStyle::Rectangular, Some(&LabelFont::Embedded)).unwrap();
        let band_top = grid_line(12, 280, 14);

        let mut ink = 0;
        for (x, y, p) in labelled.enumerate_pixels() {
            if y < band_top {
                assert_eq!(p, plain.get_pixel(x, y));
            } else if p[0] < 128 {
                ink += 1;
            }
        }
        assert!(ink > 0);
    }

    #[test]
    fn test_too_small() {
        assert!(matches!(
            render(0, 11, 1, RenderStyle::Rectangular, None),
            Err(TagError::InvalidSize { .. })
        ));
        assert!(matches!(
            render(0, 100, 0, RenderStyle::Rectangular, None),
            Err(TagError::InvalidSize { .. })
        ));
        assert!(render(0, 12, 1, RenderStyle::Rectangular, None).is_ok());
    }

    #[test]
    fn test_unknown_id() {
        assert!(matches!(
            render(9999, 100, 1, RenderStyle::Rectangular, None),
            Err(TagError::UnknownTagId { id: 9999, .. })
        ));
    }

    #[test]
    fn test_png_carries_dpi() {
        let img = render(0, 120, 1, RenderStyle::Rectangular, None).unwrap();
        let bytes = RasterTag { image: img, dpi: 300 }.encode_png().unwrap();

        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.yppu, 11811);
        assert_eq!(reader.info().width, 120);
    }

    proptest! {
        #[test]
        fn prop_boundaries_never_drift(size in 12u32..2000, border in 1u32..4) {
            let total = 10 + 2 * border;
            prop_assume!(size >= total);
            // |line - i * size / total| <= 1/2, kept in integers
            for i in 0..=total {
                let line = i64::from(grid_line(i, size, total));
                let drift = 2 * line * i64::from(total) - 2 * i64::from(i) * i64::from(size);
                prop_assert!(drift.abs() <= i64::from(total), "line {} drifts for size {}", i, size);
            }
            prop_assert_eq!(grid_line(total, size, total), size);
        }
    }
}
