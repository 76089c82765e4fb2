// SVG export module
// Renders tags as scalable markup with physical width/height

use std::fmt::{self, Write};

use apriltag_common::{RenderStyle, SizeSpec};

use crate::error::{Result, TagError};
use crate::label::label_text;
use crate::raster::CellGrid;
use crate::size;
use crate::tag36h11::{self, TagPattern};

/// Coordinate system of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    /// 1 unit = 1 mm, used for physical size requests
    Millimeters,
    /// 1 unit = 1 px at the document DPI
    Pixels,
}

/// A complete SVG document
#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    pub markup: String,
    /// Declared physical width in centimetres
    pub width_cm: f64,
    /// Declared physical height in centimetres
    pub height_cm: f64,
    pub units: Units,
}

impl SvgDocument {
    pub fn as_str(&self) -> &str {
        &self.markup
    }
}

pub(crate) fn svg_err(e: fmt::Error) -> TagError {
    TagError::Encode {
        format: "SVG",
        message: e.to_string(),
    }
}

fn trimmed(v: f64, decimals: usize) -> String {
    let s = format!("{:.*}", decimals, v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Format a coordinate with at most four decimals and no trailing zeros
pub(crate) fn num(v: f64) -> String {
    trimmed(v, 4)
}

/// Format a declared physical length in cm. Ten decimals keep the printed
/// size exact well below a nanometre.
pub(crate) fn length_cm(v: f64) -> String {
    trimmed(v, 10)
}

/// Resolved extent of a tag document: internal size plus declared size in cm
#[derive(Debug, Clone, Copy)]
pub(crate) struct Extent {
    pub size: f64,
    pub size_cm: f64,
    pub units: Units,
    pub dpi: u32,
}

impl Extent {
    pub fn from_spec(spec: &SizeSpec, default_dpi: u32) -> Result<Self> {
        // Validates with the same rules as the rasterizer
        let pixels = size::resolve(spec)?;
        match *spec {
            SizeSpec::Physical { length_cm, dpi } => Ok(Self {
                size: length_cm * 10.0,
                size_cm: length_cm,
                units: Units::Millimeters,
                dpi,
            }),
            SizeSpec::Pixels { .. } => Ok(Self {
                size: f64::from(pixels),
                size_cm: size::pixels_to_physical(pixels, default_dpi)?.cm,
                units: Units::Pixels,
                dpi: default_dpi,
            }),
        }
    }
}

/// Render a single tag as an SVG document
pub fn render(
    tag_id: u32,
    spec: &SizeSpec,
    border_cells: u32,
    style: RenderStyle,
    show_label: bool,
    default_dpi: u32,
) -> Result<SvgDocument> {
    let pattern = tag36h11::lookup(tag_id)?;
    let extent = Extent::from_spec(spec, default_dpi)?;
    let grid = CellGrid::new(extent.size, border_cells)?;
    check_raster_equivalent(spec, &grid)?;

    tracing::debug!(tag_id, %spec, border_cells, %style, "vectorizing tag");

    let mut out = String::new();
    write_document(&mut out, tag_id, pattern, &grid, &extent, style, show_label).map_err(svg_err)?;

    Ok(SvgDocument {
        markup: out,
        width_cm: extent.size_cm,
        height_cm: extent.size_cm,
        units: extent.units,
    })
}

fn write_document(
    out: &mut impl Write,
    tag_id: u32,
    pattern: &TagPattern,
    grid: &CellGrid,
    extent: &Extent,
    style: RenderStyle,
    show_label: bool,
) -> fmt::Result {
    let size = num(extent.size);
    let style_name = match style {
        RenderStyle::Rectangular => "Rectangular",
        RenderStyle::Circular => "Circular",
    };

    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, "<!-- {} AprilTag {} (tag36h11, {} DPI) -->", style_name, tag_id, extent.dpi)?;
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{}cm" height="{}cm" viewBox="0 0 {} {}">"#,
        length_cm(extent.size_cm),
        length_cm(extent.size_cm),
        size,
        size
    )?;
    writeln!(out, "  <title>AprilTag tag36h11 #{}</title>", tag_id)?;
    write_tag_body(out, pattern, grid, style, show_label, &format!("tag-{}-clip", tag_id), "  ")?;
    writeln!(out, "</svg>")
}

/// The rasterizer needs one pixel per cell; reject the same requests here
fn check_raster_equivalent(spec: &SizeSpec, grid: &CellGrid) -> Result<()> {
    let pixels = size::resolve(spec)?;
    if pixels < grid.total_cells() {
        return Err(TagError::invalid_size(format!(
            "{}px cannot fit {} cells at one pixel per cell",
            pixels,
            grid.total_cells()
        )));
    }
    Ok(())
}

/// Write the elements of one tag with its top-left corner at the origin.
/// Callers position the result with a translate-only transform.
pub(crate) fn write_tag_body(
    out: &mut impl Write,
    pattern: &TagPattern,
    grid: &CellGrid,
    style: RenderStyle,
    show_label: bool,
    clip_id: &str,
    indent: &str,
) -> fmt::Result {
    let size = grid.size;
    let half = num(size / 2.0);
    let cell = num(grid.cell_size());

    match style {
        RenderStyle::Rectangular => {
            writeln!(out, r#"{}<rect x="0" y="0" width="{}" height="{}" fill="white"/>"#, indent, num(size), num(size))?;
            writeln!(out, r#"{}<g fill="black" shape-rendering="crispEdges">"#, indent)?;
        }
        RenderStyle::Circular => {
            writeln!(out, "{}<defs>", indent)?;
            writeln!(out, r#"{}  <clipPath id="{}"><circle cx="{}" cy="{}" r="{}"/></clipPath>"#, indent, clip_id, half, half, half)?;
            writeln!(out, "{}</defs>", indent)?;
            writeln!(out, r#"{}<circle cx="{}" cy="{}" r="{}" fill="white"/>"#, indent, half, half, half)?;
            writeln!(out, r#"{}<g fill="black" shape-rendering="crispEdges" clip-path="url(#{})">"#, indent, clip_id)?;
        }
    }

    for (row, col) in pattern.black_cells() {
        let (x, y) = grid.cell_origin(row, col);
        writeln!(out, r#"{}  <rect x="{}" y="{}" width="{}" height="{}"/>"#, indent, num(x), num(y), cell, cell)?;
    }
    writeln!(out, "{}</g>", indent)?;

    if show_label {
        let band_top = grid.label_band_top();
        let band_h = size - band_top;
        writeln!(
            out,
            r#"{}<text x="{}" y="{}" font-family="sans-serif" font-size="{}" text-anchor="middle" dominant-baseline="central" fill="black">{}</text>"#,
            indent,
            half,
            num(band_top + band_h / 2.0),
            num(band_h * 0.6),
            label_text(pattern.id())
        )?;
    }
    Ok(())
}
