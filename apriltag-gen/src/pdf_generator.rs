use apriltag_common::RenderStyle;
use printpdf::*;
use printpdf::path::{PaintMode, WindingOrder};

use crate::error::{Result, TagError};
use crate::label::label_text;
use crate::raster::CellGrid;
use crate::tag36h11::TagPattern;

const MM_PER_PT: f64 = 25.4 / 72.0;

/// Segments used to approximate the white circle behind circular tags
const CIRCLE_SEGMENTS: usize = 96;

fn pdf_err(e: printpdf::Error) -> TagError {
    TagError::Encode {
        format: "PDF",
        message: e.to_string(),
    }
}

/// Single-page vector PDF. Positions passed in are measured from the
/// top-left corner of the page, like SVG; the y-flip happens here.
pub struct PdfGenerator {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: Option<IndirectFontRef>,
    width_mm: f64,
    height_mm: f64,
}

impl PdfGenerator {
    pub fn new(title: &str, width_mm: f64, height_mm: f64) -> Self {
        let (doc, page1, layer1) = PdfDocument::new(
            title,
            Mm(width_mm as f32),
            Mm(height_mm as f32),
            "Layer 1",
        );
        let layer = doc.get_page(page1).get_layer(layer1);

        Self {
            doc,
            layer,
            font: None,
            width_mm,
            height_mm,
        }
    }

    /// Page width and height in millimetres
    pub fn page_size_mm(&self) -> (f64, f64) {
        (self.width_mm, self.height_mm)
    }

    /// Draw one tag with its top-left corner at `(x_mm, y_mm)`
    pub fn draw_tag(
        &mut self,
        pattern: &TagPattern,
        x_mm: f64,
        y_mm: f64,
        size_mm: f64,
        border_cells: u32,
        style: RenderStyle,
        show_label: bool,
    ) -> Result<()> {
        let grid = CellGrid::new(size_mm, border_cells)?;

        // White tag background
        self.layer.set_fill_color(Color::Greyscale(Greyscale::new(1.0, None)));
        match style {
            RenderStyle::Rectangular => self.fill_rect(x_mm, y_mm, size_mm, size_mm),
            RenderStyle::Circular => {
                let r = size_mm / 2.0;
                self.fill_circle(x_mm + r, y_mm + r, r);
            }
        }

        // The inscribed circle always contains the black ring, so black
        // cells need no clipping
        self.layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));
        let cell = grid.cell_size();
        for (row, col) in pattern.black_cells() {
            let (cx, cy) = grid.cell_origin(row, col);
            self.fill_rect(x_mm + cx, y_mm + cy, cell, cell);
        }

        if show_label {
            let band_top = grid.label_band_top();
            let band_h = size_mm - band_top;
            self.draw_label(&label_text(pattern.id()), x_mm + size_mm / 2.0, y_mm + band_top + band_h / 2.0, band_h * 0.6)?;
        }

        Ok(())
    }

    fn draw_label(&mut self, text: &str, centre_x_mm: f64, centre_y_mm: f64, text_h_mm: f64) -> Result<()> {
        let font = match &self.font {
            Some(font) => font.clone(),
            None => {
                let font = self.doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
                self.font = Some(font.clone());
                font
            }
        };

        // Helvetica digits are about half an em wide; cap height about 0.7 em
        let font_size_pt = text_h_mm / MM_PER_PT;
        let text_w_mm = text.len() as f64 * 0.5 * text_h_mm;
        let x = centre_x_mm - text_w_mm / 2.0;
        let baseline = centre_y_mm + 0.35 * text_h_mm;

        self.layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));
        self.layer.use_text(
            text,
            font_size_pt as f32,
            Mm(x as f32),
            Mm((self.height_mm - baseline) as f32),
            &font,
        );
        Ok(())
    }

    /// Corners of a top-left anchored rectangle in PDF page space
    /// (origin bottom-left), counter-clockwise from the bottom-left corner
    pub(crate) fn page_rect(&self, x_mm: f64, y_mm: f64, w_mm: f64, h_mm: f64) -> [(f64, f64); 4] {
        let top = self.height_mm - y_mm;
        let bottom = top - h_mm;
        [
            (x_mm, bottom),
            (x_mm + w_mm, bottom),
            (x_mm + w_mm, top),
            (x_mm, top),
        ]
    }

    fn fill_rect(&self, x_mm: f64, y_mm: f64, w_mm: f64, h_mm: f64) {
        let corners = self.page_rect(x_mm, y_mm, w_mm, h_mm);
        self.fill_polygon(corners.into_iter());
    }

    fn fill_circle(&self, cx_mm: f64, cy_mm: f64, r_mm: f64) {
        let cy = self.height_mm - cy_mm;
        let points = (0..CIRCLE_SEGMENTS).map(|i| {
            let a = i as f64 / CIRCLE_SEGMENTS as f64 * std::f64::consts::TAU;
            (cx_mm + r_mm * a.cos(), cy + r_mm * a.sin())
        });
        self.fill_polygon(points);
    }

    fn fill_polygon(&self, points: impl Iterator<Item = (f64, f64)>) {
        let ring = points
            .map(|(x, y)| (Point::new(Mm(x as f32), Mm(y as f32)), false))
            .collect();
        self.layer.add_polygon(Polygon {
            rings: vec![ring],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }

    /// Serialize the document
    pub fn finish(self) -> Result<Vec<u8>> {
        self.doc.save_to_bytes().map_err(pdf_err)
    }
}

/// Render a single tag onto a page exactly `size_mm` square
pub fn render_tag(
    pattern: &TagPattern,
    size_mm: f64,
    border_cells: u32,
    style: RenderStyle,
    show_label: bool,
) -> Result<Vec<u8>> {
    tracing::debug!(tag_id = pattern.id(), size_mm, %style, "writing PDF tag");

    let mut generator = PdfGenerator::new(&format!("AprilTag {}", pattern.id()), size_mm, size_mm);
    generator.draw_tag(pattern, 0.0, 0.0, size_mm, border_cells, style, show_label)?;
    generator.finish()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tag36h11;

    /// Width and height in points from the first /MediaBox of a PDF
    pub(crate) fn media_box_pt(bytes: &[u8]) -> (f64, f64) {
        let key = b"/MediaBox";
        let start = bytes.windows(key.len()).position(|w| w == key).unwrap() + key.len();
        let rest = &bytes[start..];
        let end = rest.iter().position(|&b| b == b']').unwrap();
        let text = String::from_utf8_lossy(&rest[..end]);
        let values: Vec<f64> = text
            .trim_start_matches(|c: char| c == '[' || c.is_whitespace())
            .split_whitespace()
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(values.len(), 4, "{}", text);
        (values[2] - values[0], values[3] - values[1])
    }

    pub(crate) fn mm_to_pt(mm: f64) -> f64 {
        mm / MM_PER_PT
    }

    #[test]
    fn test_single_tag_pdf() {
        let pattern = tag36h11::lookup(3).unwrap();
        let bytes = render_tag(pattern, 100.0, 1, RenderStyle::Rectangular, true).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        // 10 cm square page
        let (w, h) = media_box_pt(&bytes);
        assert!((w - 283.4646).abs() < 0.01, "width {}pt", w);
        assert!((h - 283.4646).abs() < 0.01, "height {}pt", h);
    }

    #[test]
    fn test_rects_flip_to_page_space() {
        let generator = PdfGenerator::new("t", 50.0, 80.0);
        assert_eq!(generator.page_size_mm(), (50.0, 80.0));

        // A 5 mm square 20 mm below the top edge
        let corners = generator.page_rect(10.0, 20.0, 5.0, 5.0);
        assert_eq!(corners, [(10.0, 55.0), (15.0, 55.0), (15.0, 60.0), (10.0, 60.0)]);

        // Top-left of the page maps to the top of page space
        assert_eq!(generator.page_rect(0.0, 0.0, 50.0, 80.0)[3], (0.0, 80.0));
    }

    #[test]
    fn test_circular_pdf() {
        let pattern = tag36h11::lookup(3).unwrap();
        let bytes = render_tag(pattern, 50.0, 2, RenderStyle::Circular, false).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_zero_border_rejected() {
        let pattern = tag36h11::lookup(3).unwrap();
        assert!(matches!(
            render_tag(pattern, 50.0, 0, RenderStyle::Rectangular, false),
            Err(TagError::InvalidSize { .. })
        ));
    }
}
