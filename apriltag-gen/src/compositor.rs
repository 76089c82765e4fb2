// Array compositor
// Lays out many single-tag renders on one canvas for calibration boards

use std::fmt::{self, Write};

use apriltag_common::{OutputFormat, RenderStyle, SizeSpec, CM_PER_INCH};
use image::GrayImage;
use rayon::prelude::*;

use crate::error::{Result, TagError};
use crate::label::LabelFont;
use crate::pdf_generator::PdfGenerator;
use crate::raster::{self, CellGrid, RasterTag, WHITE};
use crate::size;
use crate::svg::{self, length_cm, svg_err, SvgDocument, Units};
use crate::tag36h11::{self, TagPattern, MAX_TAG_ID};
use crate::{RenderedArtifact, DEFAULT_DPI};

/// Grid of tags rendered into one artifact.
///
/// Cell `(r, c)` holds `tag_ids[r * cols + c]`; cells past the end of
/// `tag_ids` stay blank.
#[derive(Debug, Clone)]
pub struct ArrayLayout {
    pub tag_ids: Vec<u32>,
    pub rows: u32,
    pub cols: u32,
    pub tag_size_px: u32,
    pub spacing_px: u32,
    /// Quiet-zone rings per tag; `None` uses the style default
    pub border_cells: Option<u32>,
    pub style: RenderStyle,
    pub format: OutputFormat,
    pub dpi: u32,
    pub show_labels: bool,
    pub label_font: LabelFont,
}

impl ArrayLayout {
    pub fn new(tag_ids: Vec<u32>, rows: u32, cols: u32, tag_size_px: u32) -> Self {
        Self {
            tag_ids,
            rows,
            cols,
            tag_size_px,
            spacing_px: 0,
            border_cells: None,
            style: RenderStyle::default(),
            format: OutputFormat::default(),
            dpi: DEFAULT_DPI,
            show_labels: false,
            label_font: LabelFont::default(),
        }
    }

    /// Fill the grid with consecutive ids from `start_id`, stopping after the
    /// last id of the family
    pub fn sequential(start_id: u32, rows: u32, cols: u32, tag_size_px: u32) -> Result<Self> {
        if start_id > MAX_TAG_ID {
            return Err(TagError::UnknownTagId { id: start_id, max: MAX_TAG_ID });
        }
        let capacity = u64::from(rows) * u64::from(cols);
        let end = (u64::from(start_id) + capacity).min(u64::from(MAX_TAG_ID) + 1) as u32;
        Ok(Self::new((start_id..end).collect(), rows, cols, tag_size_px))
    }

    pub fn with_spacing(mut self, spacing_px: u32) -> Self {
        self.spacing_px = spacing_px;
        self
    }

    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_border(mut self, border_cells: u32) -> Self {
        self.border_cells = Some(border_cells);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_labels(mut self, show_labels: bool) -> Self {
        self.show_labels = show_labels;
        self
    }

    pub fn with_label_font(mut self, font: LabelFont) -> Self {
        self.label_font = font;
        self
    }

    pub fn border(&self) -> u32 {
        self.border_cells.unwrap_or_else(|| self.style.default_border_cells())
    }

    /// Canvas size in pixels: no margin around the outer tags.
    ///
    /// Saturates at `u32::MAX`; [`ArrayLayout::validate`] rejects such layouts.
    pub fn dimensions(&self) -> (u32, u32) {
        let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
        (clamp(self.extent(self.cols)), clamp(self.extent(self.rows)))
    }

    fn extent(&self, n: u32) -> u64 {
        let n = u64::from(n);
        n * u64::from(self.tag_size_px) + n.saturating_sub(1) * u64::from(self.spacing_px)
    }

    /// Top-left pixel of the cell holding `tag_ids[index]`.
    ///
    /// Exact for every layout that passes [`ArrayLayout::validate`].
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let cols = self.cols.max(1) as usize;
        let pitch = u64::from(self.tag_size_px) + u64::from(self.spacing_px);
        let (r, c) = ((index / cols) as u64, (index % cols) as u64);
        let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
        (clamp(c * pitch), clamp(r * pitch))
    }

    /// Page size of the PDF rendering in millimetres
    pub fn page_size_mm(&self) -> (f64, f64) {
        let (width, height) = self.dimensions();
        let mm_per_px = self.mm_per_px();
        (f64::from(width) * mm_per_px, f64::from(height) * mm_per_px)
    }

    fn mm_per_px(&self) -> f64 {
        CM_PER_INCH * 10.0 / f64::from(self.dpi)
    }

    /// Check the whole layout before anything is rendered: grid shape first,
    /// then ids, then sizes
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(TagError::invalid_layout(format!("{}x{} grid has no cells", self.rows, self.cols)));
        }
        let capacity = u64::from(self.rows) * u64::from(self.cols);
        if capacity < self.tag_ids.len() as u64 {
            return Err(TagError::invalid_layout(format!(
                "{}x{} grid holds {} tags, {} requested",
                self.rows,
                self.cols,
                capacity,
                self.tag_ids.len()
            )));
        }

        for &id in &self.tag_ids {
            tag36h11::lookup(id)?;
        }

        size::resolve(&SizeSpec::pixels(self.tag_size_px))?;
        let grid = CellGrid::new(f64::from(self.tag_size_px), self.border())?;
        if self.tag_size_px < grid.total_cells() {
            return Err(TagError::invalid_size(format!(
                "{}px cannot fit {} cells at one pixel per cell",
                self.tag_size_px,
                grid.total_cells()
            )));
        }
        if self.dpi == 0 {
            return Err(TagError::invalid_size("DPI must be positive"));
        }

        let max = u64::from(u32::MAX);
        if self.extent(self.cols) > max || self.extent(self.rows) > max {
            return Err(TagError::invalid_layout("array is too large"));
        }
        Ok(())
    }
}

/// Render every tag of the layout into one artifact
pub fn composite(layout: &ArrayLayout) -> Result<RenderedArtifact> {
    layout.validate()?;

    let (width, height) = layout.dimensions();
    tracing::debug!(
        rows = layout.rows,
        cols = layout.cols,
        tags = layout.tag_ids.len(),
        width,
        height,
        format = %layout.format,
        "compositing array"
    );

    match layout.format {
        OutputFormat::Raster => composite_raster(layout).map(RenderedArtifact::Raster),
        OutputFormat::Vector => composite_svg(layout).map(RenderedArtifact::Vector),
        OutputFormat::Pdf => composite_pdf(layout).map(RenderedArtifact::Pdf),
    }
}

fn composite_raster(layout: &ArrayLayout) -> Result<RasterTag> {
    let label = layout.show_labels.then_some(&layout.label_font);
    let border = layout.border();

    let tiles = layout
        .tag_ids
        .par_iter()
        .enumerate()
        .map(|(i, &id)| {
            raster::render(id, layout.tag_size_px, border, layout.style, label).map(|tile| (i, tile))
        })
        .collect::<Result<Vec<_>>>()?;

    let (width, height) = layout.dimensions();
    let mut canvas = GrayImage::from_pixel(width, height, WHITE);
    for (i, tile) in &tiles {
        let (x, y) = layout.cell_origin(*i);
        image::imageops::replace(&mut canvas, tile, i64::from(x), i64::from(y));
    }

    Ok(RasterTag { image: canvas, dpi: layout.dpi })
}

fn composite_svg(layout: &ArrayLayout) -> Result<SvgDocument> {
    let (width, height) = layout.dimensions();
    let width_cm = size::pixels_to_physical(width, layout.dpi)?.cm;
    let height_cm = size::pixels_to_physical(height, layout.dpi)?.cm;
    let grid = CellGrid::new(f64::from(layout.tag_size_px), layout.border())?;

    let patterns = layout
        .tag_ids
        .iter()
        .map(|&id| tag36h11::lookup(id))
        .collect::<Result<Vec<_>>>()?;

    let mut out = String::new();
    write_svg_array(&mut out, layout, &patterns, &grid, (width_cm, height_cm)).map_err(svg_err)?;

    Ok(SvgDocument {
        markup: out,
        width_cm,
        height_cm,
        units: Units::Pixels,
    })
}

fn write_svg_array(
    out: &mut impl Write,
    layout: &ArrayLayout,
    patterns: &[&TagPattern],
    grid: &CellGrid,
    size_cm: (f64, f64),
) -> fmt::Result {
    let (width, height) = layout.dimensions();
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        "<!-- AprilTag array {}x{} (tag36h11, {} DPI) -->",
        layout.rows, layout.cols, layout.dpi
    )?;
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{}cm" height="{}cm" viewBox="0 0 {} {}">"#,
        length_cm(size_cm.0),
        length_cm(size_cm.1),
        width,
        height
    )?;
    writeln!(out, r#"  <rect x="0" y="0" width="{}" height="{}" fill="white"/>"#, width, height)?;

    for (i, pattern) in patterns.iter().enumerate() {
        let id = pattern.id();
        let (x, y) = layout.cell_origin(i);
        writeln!(out, r#"  <g transform="translate({} {})">"#, x, y)?;
        // Same id may appear twice, so clip ids are keyed by cell
        let clip_id = format!("cell-{}-tag-{}-clip", i, id);
        svg::write_tag_body(out, pattern, grid, layout.style, layout.show_labels, &clip_id, "    ")?;
        writeln!(out, "  </g>")?;
    }
    writeln!(out, "</svg>")
}

fn composite_pdf(layout: &ArrayLayout) -> Result<Vec<u8>> {
    let mm_per_px = layout.mm_per_px();
    let (page_w, page_h) = layout.page_size_mm();

    let mut generator = PdfGenerator::new(&format!("AprilTag array {}x{}", layout.rows, layout.cols), page_w, page_h);
    let tag_mm = f64::from(layout.tag_size_px) * mm_per_px;

    for (i, &id) in layout.tag_ids.iter().enumerate() {
        let pattern = tag36h11::lookup(id)?;
        let (x, y) = layout.cell_origin(i);
        generator.draw_tag(
            pattern,
            f64::from(x) * mm_per_px,
            f64::from(y) * mm_per_px,
            tag_mm,
            layout.border(),
            layout.style,
            layout.show_labels,
        )?;
    }

    generator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_generator::tests::{media_box_pt, mm_to_pt};

    fn raster(layout: &ArrayLayout) -> GrayImage {
        match composite(layout).unwrap() {
            RenderedArtifact::Raster(r) => r.image,
            other => panic!("expected raster, got {:?}", other.extension()),
        }
    }

    fn vector(layout: &ArrayLayout) -> SvgDocument {
        match composite(layout).unwrap() {
            RenderedArtifact::Vector(doc) => doc,
            other => panic!("expected vector, got {:?}", other.extension()),
        }
    }

    #[test]
    fn test_dimensions_without_margin() {
        let layout = ArrayLayout::new(vec![0, 1, 2, 3, 4, 5], 2, 3, 100).with_spacing(20);
        assert_eq!(layout.dimensions(), (340, 220));
        assert_eq!(raster(&layout).dimensions(), (340, 220));

        let single = ArrayLayout::new(vec![0], 1, 1, 100).with_spacing(50);
        assert_eq!(single.dimensions(), (100, 100));
    }

    #[test]
    fn test_undersized_grid_is_invalid_layout() {
        let layout = ArrayLayout::new(vec![0, 1, 2, 3, 4], 2, 2, 100);
        assert!(matches!(composite(&layout), Err(TagError::InvalidLayout { .. })));

        let empty = ArrayLayout::new(vec![], 0, 3, 100);
        assert!(matches!(composite(&empty), Err(TagError::InvalidLayout { .. })));
    }

    #[test]
    fn test_validation_order() {
        // Layout errors win over id errors, id errors over size errors
        let layout = ArrayLayout::new(vec![0, 9999], 1, 1, 5);
        assert!(matches!(layout.validate(), Err(TagError::InvalidLayout { .. })));

        let layout = ArrayLayout::new(vec![0, 9999], 1, 2, 5);
        assert!(matches!(layout.validate(), Err(TagError::UnknownTagId { id: 9999, .. })));

        let layout = ArrayLayout::new(vec![0, 1], 1, 2, 5);
        assert!(matches!(layout.validate(), Err(TagError::InvalidSize { .. })));

        let layout = ArrayLayout::new(vec![0, 1], 1, 2, 100).with_dpi(0);
        assert!(matches!(layout.validate(), Err(TagError::InvalidSize { .. })));
    }

    #[test]
    fn test_tiles_match_single_renders() {
        let layout = ArrayLayout::new(vec![42, 7, 586], 2, 2, 140)
            .with_spacing(10)
            .with_style(RenderStyle::Circular)
            .with_labels(true);
        let canvas = raster(&layout);

        for (i, &id) in layout.tag_ids.iter().enumerate() {
            let tile = raster::render(id, 140, 2, RenderStyle::Circular, Some(&LabelFont::Embedded)).unwrap();
            let (ox, oy) = layout.cell_origin(i);
            for (x, y, p) in tile.enumerate_pixels() {
                assert_eq!(canvas.get_pixel(ox + x, oy + y), p, "tag {} at ({}, {})", id, x, y);
            }
        }
    }

    #[test]
    fn test_blank_cells_and_spacing_are_white() {
        let layout = ArrayLayout::new(vec![3, 4, 5], 2, 2, 100).with_spacing(16);
        let canvas = raster(&layout);

        // Fourth cell is unfilled
        let (ox, oy) = layout.cell_origin(3);
        assert_eq!((ox, oy), (116, 116));
        for y in oy..oy + 100 {
            for x in ox..ox + 100 {
                assert_eq!(canvas.get_pixel(x, y)[0], 255);
            }
        }

        // Vertical gutter between the columns
        for y in 0..canvas.height() {
            for x in 100..116 {
                assert_eq!(canvas.get_pixel(x, y)[0], 255);
            }
        }
    }

    #[test]
    fn test_sequential_stops_at_last_id() {
        let layout = ArrayLayout::sequential(585, 2, 2, 100).unwrap();
        assert_eq!(layout.tag_ids, vec![585, 586]);

        let layout = ArrayLayout::sequential(10, 2, 3, 100).unwrap();
        assert_eq!(layout.tag_ids, vec![10, 11, 12, 13, 14, 15]);

        assert!(matches!(
            ArrayLayout::sequential(587, 1, 1, 100),
            Err(TagError::UnknownTagId { id: 587, .. })
        ));
    }

    #[test]
    fn test_vector_translates_children() {
        let layout = ArrayLayout::new(vec![5, 5, 9], 2, 2, 100)
            .with_spacing(20)
            .with_style(RenderStyle::Circular)
            .with_format(OutputFormat::Vector)
            .with_dpi(300);
        let doc = vector(&layout);

        assert_eq!(doc.markup.matches("<g transform=").count(), 3);
        assert!(doc.markup.contains(r#"<g transform="translate(0 0)">"#));
        assert!(doc.markup.contains(r#"<g transform="translate(120 0)">"#));
        assert!(doc.markup.contains(r#"<g transform="translate(0 120)">"#));
        assert!(doc.markup.contains(r#"viewBox="0 0 220 220""#));

        // Repeated id still gets distinct clip paths
        assert!(doc.markup.contains(r#"id="cell-0-tag-5-clip""#));
        assert!(doc.markup.contains(r#"id="cell-1-tag-5-clip""#));

        // 220px at 300 DPI
        let expected_cm = 220.0 / 300.0 * CM_PER_INCH;
        assert!((doc.width_cm - expected_cm).abs() < 1e-9);
    }

    #[test]
    fn test_vector_labels_use_actual_ids() {
        let layout = ArrayLayout::new(vec![17, 250], 1, 2, 140)
            .with_format(OutputFormat::Vector)
            .with_labels(true);
        let doc = vector(&layout);
        assert!(doc.markup.contains(">ID: 17</text>"));
        assert!(doc.markup.contains(">ID: 250</text>"));
        assert!(!doc.markup.contains(">ID: 0</text>"));
    }

    #[test]
    fn test_pdf_array() {
        let layout = ArrayLayout::sequential(0, 2, 2, 300)
            .unwrap()
            .with_spacing(30)
            .with_format(OutputFormat::Pdf)
            .with_dpi(300)
            .with_labels(true);
        let bytes = match composite(&layout).unwrap() {
            RenderedArtifact::Pdf(bytes) => bytes,
            other => panic!("expected pdf, got {:?}", other.extension()),
        };
        assert!(bytes.starts_with(b"%PDF"));

        // 630px at 300 DPI is 53.34 mm
        let (page_w, page_h) = layout.page_size_mm();
        assert!((page_w - 53.34).abs() < 1e-9 && (page_h - 53.34).abs() < 1e-9);
        let (w, h) = media_box_pt(&bytes);
        assert!((w - mm_to_pt(53.34)).abs() < 0.01, "width {}pt", w);
        assert!((h - mm_to_pt(53.34)).abs() < 0.01, "height {}pt", h);
    }

    #[test]
    fn test_pdf_cells_land_at_layout_positions() {
        let layout = ArrayLayout::sequential(0, 2, 2, 300).unwrap().with_spacing(30).with_dpi(300);
        let (page_w, page_h) = layout.page_size_mm();
        let generator = PdfGenerator::new("t", page_w, page_h);

        // Cell (1, 1) starts 330px from the top-left, so its tag reaches
        // the bottom edge of the page
        let (x, y) = layout.cell_origin(3);
        let mm = |px: u32| f64::from(px) * 25.4 / 300.0;
        let tag_mm = mm(300);
        let corners = generator.page_rect(mm(x), mm(y), tag_mm, tag_mm);
        assert!((corners[0].0 - 27.94).abs() < 1e-9);
        assert!(corners[0].1.abs() < 1e-9);
        assert!((corners[2].1 - 25.4).abs() < 1e-9);

        // Cell (0, 0) touches the top edge
        let corners = generator.page_rect(0.0, 0.0, tag_mm, tag_mm);
        assert!((corners[3].1 - page_h).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_layout_never_wraps() {
        // 3 columns of 2^31 px overflow u32; the width must not wrap to a small value
        let layout = ArrayLayout::new(vec![0, 1, 2], 1, 3, 1 << 31);
        assert!(matches!(layout.validate(), Err(TagError::InvalidLayout { .. })));
        assert_eq!(layout.dimensions().0, u32::MAX);
    }

    #[test]
    fn test_huge_spacing_single_cell() {
        // Spacing only appears between cells, so a 1x1 grid ignores it
        let layout = ArrayLayout::new(vec![4], 1, 1, 100).with_spacing(u32::MAX);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.cell_origin(0), (0, 0));
        assert_eq!(layout.dimensions(), (100, 100));
        assert_eq!(raster(&layout).dimensions(), (100, 100));

        // Two columns overflow and are rejected before rendering
        let wide = ArrayLayout::new(vec![4, 5], 1, 2, 100).with_spacing(u32::MAX);
        assert!(matches!(wide.validate(), Err(TagError::InvalidLayout { .. })));
    }
}
