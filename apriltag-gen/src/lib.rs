//! tag36h11 AprilTag rendering engine.
//!
//! Turns tag ids into print-ready artifacts: PNG bitmaps with DPI metadata,
//! SVG documents with physical dimensions, or vector PDF pages. Single tags
//! and grid arrays share one geometry, so every encoding of the same request
//! agrees on where each cell lies.
//!
//! The library never touches the filesystem. Callers persist
//! [`RenderedArtifact::to_bytes`] wherever they like.

mod codes;
pub mod compositor;
pub mod config;
pub mod error;
pub mod label;
pub mod pdf_generator;
pub mod raster;
pub mod size;
pub mod svg;
pub mod tag36h11;

pub use apriltag_common::{DpiPreset, OutputFormat, RenderStyle, SizeSpec, TagFamily};
pub use compositor::ArrayLayout;
pub use config::GeneratorConfig;
pub use error::{Result, TagError};
pub use label::LabelFont;
pub use raster::RasterTag;
pub use size::PhysicalSize;
pub use svg::SvgDocument;
pub use tag36h11::{TagPattern, MAX_TAG_ID};

/// DPI embedded in artifacts of pixel-sized requests
pub const DEFAULT_DPI: u32 = 72;

/// One tag to render
#[derive(Debug, Clone)]
pub struct TagRenderRequest {
    pub tag_id: u32,
    pub size: SizeSpec,
    /// Quiet-zone rings; `None` uses the style default
    pub border_cells: Option<u32>,
    pub style: RenderStyle,
    pub format: OutputFormat,
    /// DPI for pixel-sized requests. Physical sizes carry their own.
    pub dpi: u32,
    pub show_label: bool,
    pub label_font: LabelFont,
}

impl TagRenderRequest {
    pub fn new(tag_id: u32, size: SizeSpec) -> Self {
        Self {
            tag_id,
            size,
            border_cells: None,
            style: RenderStyle::default(),
            format: OutputFormat::default(),
            dpi: DEFAULT_DPI,
            show_label: false,
            label_font: LabelFont::default(),
        }
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

    pub fn with_label(mut self, show_label: bool) -> Self {
        self.show_label = show_label;
        self
    }

    pub fn with_label_font(mut self, font: LabelFont) -> Self {
        self.label_font = font;
        self
    }

    pub fn border(&self) -> u32 {
        self.border_cells.unwrap_or_else(|| self.style.default_border_cells())
    }

    /// DPI the artifact will declare
    pub fn effective_dpi(&self) -> u32 {
        self.size.dpi_or(self.dpi)
    }
}

/// Output of a render, ready to be written out
#[derive(Debug, Clone)]
pub enum RenderedArtifact {
    Raster(RasterTag),
    Vector(SvgDocument),
    Pdf(Vec<u8>),
}

impl RenderedArtifact {
    /// Encoded file contents
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            RenderedArtifact::Raster(tag) => tag.encode_png(),
            RenderedArtifact::Vector(doc) => Ok(doc.markup.clone().into_bytes()),
            RenderedArtifact::Pdf(bytes) => Ok(bytes.clone()),
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            RenderedArtifact::Raster(_) => OutputFormat::Raster,
            RenderedArtifact::Vector(_) => OutputFormat::Vector,
            RenderedArtifact::Pdf(_) => OutputFormat::Pdf,
        }
    }

    pub fn extension(&self) -> &'static str {
        self.format().extension()
    }
}

/// Resolve a size request into pixels
pub fn resolve_size(spec: &SizeSpec) -> Result<u32> {
    size::resolve(spec)
}

/// Physical length of `pixels` printed at `dpi`
pub fn pixels_to_physical(pixels: u32, dpi: u32) -> Result<PhysicalSize> {
    size::pixels_to_physical(pixels, dpi)
}

/// Render a single tag
pub fn render_tag(request: &TagRenderRequest) -> Result<RenderedArtifact> {
    let border = request.border();
    let dpi = request.effective_dpi();
    if dpi == 0 {
        return Err(TagError::invalid_size("DPI must be positive"));
    }

    match request.format {
        OutputFormat::Raster => {
            let size_px = size::resolve(&request.size)?;
            let label = request.show_label.then_some(&request.label_font);
            let image = raster::render(request.tag_id, size_px, border, request.style, label)?;
            Ok(RenderedArtifact::Raster(RasterTag { image, dpi }))
        }
        OutputFormat::Vector => svg::render(
            request.tag_id,
            &request.size,
            border,
            request.style,
            request.show_label,
            request.dpi,
        )
        .map(RenderedArtifact::Vector),
        OutputFormat::Pdf => {
            let pattern = tag36h11::lookup(request.tag_id)?;
            let size_px = size::resolve(&request.size)?;
            let size_mm = match request.size {
                SizeSpec::Physical { length_cm, .. } => length_cm * 10.0,
                SizeSpec::Pixels { .. } => size::pixels_to_physical(size_px, dpi)?.mm(),
            };
            let grid = raster::CellGrid::new(size_mm, border)?;
            if size_px < grid.total_cells() {
                return Err(TagError::invalid_size(format!(
                    "{}px cannot fit {} cells at one pixel per cell",
                    size_px,
                    grid.total_cells()
                )));
            }
            pdf_generator::render_tag(pattern, size_mm, border, request.style, request.show_label)
                .map(RenderedArtifact::Pdf)
        }
    }
}

/// Render a grid of tags into one artifact
pub fn render_array(layout: &ArrayLayout) -> Result<RenderedArtifact> {
    compositor::composite(layout)
}

/// File name for a single tag: `apriltag_{id}.{ext}`
pub fn tag_file_name(tag_id: u32, format: OutputFormat) -> String {
    format!("apriltag_{}.{}", tag_id, format.extension())
}

/// File name for an array: `apriltag_array_{rows}x{cols}.{ext}`
pub fn array_file_name(rows: u32, cols: u32, format: OutputFormat) -> String {
    format!("apriltag_array_{}x{}.{}", rows, cols, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = TagRenderRequest::new(3, SizeSpec::pixels(200));
        assert_eq!(req.border(), 1);
        assert_eq!(req.effective_dpi(), DEFAULT_DPI);

        let req = req.with_style(RenderStyle::Circular);
        assert_eq!(req.border(), 2);
        assert_eq!(req.with_border(4).border(), 4);

        let req = TagRenderRequest::new(3, SizeSpec::physical(5.0, 300)).with_dpi(96);
        assert_eq!(req.effective_dpi(), 300);
    }

    #[test]
    fn test_raster_artifact_declares_dpi() {
        let req = TagRenderRequest::new(0, SizeSpec::physical(10.0, 300));
        match render_tag(&req).unwrap() {
            RenderedArtifact::Raster(tag) => {
                assert_eq!(tag.dpi, 300);
                assert_eq!((tag.width(), tag.height()), (1181, 1181));
            }
            other => panic!("expected raster, got {}", other.extension()),
        }
    }

    #[test]
    fn test_pdf_request() {
        let req = TagRenderRequest::new(9, SizeSpec::physical(4.0, 300))
            .with_format(OutputFormat::Pdf)
            .with_label(true);
        let artifact = render_tag(&req).unwrap();
        assert_eq!(artifact.extension(), "pdf");
        assert!(artifact.to_bytes().unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_zero_default_dpi_rejected_for_pixels() {
        let req = TagRenderRequest::new(0, SizeSpec::pixels(100)).with_dpi(0);
        assert!(matches!(render_tag(&req), Err(TagError::InvalidSize { .. })));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(tag_file_name(12, OutputFormat::Raster), "apriltag_12.png");
        assert_eq!(tag_file_name(0, OutputFormat::Vector), "apriltag_0.svg");
        assert_eq!(array_file_name(3, 4, OutputFormat::Pdf), "apriltag_array_3x4.pdf");
    }
}
