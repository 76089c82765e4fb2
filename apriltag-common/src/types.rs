use serde::{Deserialize, Serialize};
use std::fmt;

/// Centimetres per inch
pub const CM_PER_INCH: f64 = 2.54;

/// Rendering style of a single tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    /// Standard square tag, every cell an axis-aligned square
    #[default]
    Rectangular,
    /// Square tag clipped to its inscribed circle
    Circular,
}

impl RenderStyle {
    /// Quiet-zone width, in cells, used when the caller does not pick one.
    ///
    /// The circular mask cuts into the quiet zone at the corners, so the
    /// circular style gets one extra ring of cells.
    pub fn default_border_cells(&self) -> u32 {
        match self {
            RenderStyle::Rectangular => 1,
            RenderStyle::Circular => 2,
        }
    }
}

impl fmt::Display for RenderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStyle::Rectangular => write!(f, "rectangular"),
            RenderStyle::Circular => write!(f, "circular"),
        }
    }
}

/// Output encoding of a rendered artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG bitmap with DPI metadata
    #[default]
    Raster,
    /// SVG document with physical dimensions
    Vector,
    /// Single-page vector PDF
    Pdf,
}

impl OutputFormat {
    /// File extension used when the artifact is written to disk
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Raster => "png",
            OutputFormat::Vector => "svg",
            OutputFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// Requested tag size: either a raw pixel count or a physical length at a DPI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SizeSpec {
    Pixels { value: u32 },
    Physical { length_cm: f64, dpi: u32 },
}

impl SizeSpec {
    pub fn pixels(value: u32) -> Self {
        SizeSpec::Pixels { value }
    }

    pub fn physical(length_cm: f64, dpi: u32) -> Self {
        SizeSpec::Physical { length_cm, dpi }
    }

    /// DPI to embed in the artifact. Pixel requests carry no DPI of their own
    /// and fall back to `default_dpi`.
    pub fn dpi_or(&self, default_dpi: u32) -> u32 {
        match self {
            SizeSpec::Pixels { .. } => default_dpi,
            SizeSpec::Physical { dpi, .. } => *dpi,
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpec::Pixels { value } => write!(f, "{}px", value),
            SizeSpec::Physical { length_cm, dpi } => write!(f, "{}cm @ {} DPI", length_cm, dpi),
        }
    }
}

/// Common DPI choices. Any positive DPI is accepted; these are suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DpiPreset {
    Screen,
    Web,
    Photo,
    Print,
    HighRes,
}

impl DpiPreset {
    pub const ALL: [DpiPreset; 5] = [
        DpiPreset::Screen,
        DpiPreset::Web,
        DpiPreset::Photo,
        DpiPreset::Print,
        DpiPreset::HighRes,
    ];

    pub fn dpi(&self) -> u32 {
        match self {
            DpiPreset::Screen => 72,
            DpiPreset::Web => 96,
            DpiPreset::Photo => 150,
            DpiPreset::Print => 300,
            DpiPreset::HighRes => 600,
        }
    }

    /// Preset matching an exact DPI value, if there is one
    pub fn from_dpi(dpi: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.dpi() == dpi)
    }
}

impl fmt::Display for DpiPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpiPreset::Screen => write!(f, "72 (Screen)"),
            DpiPreset::Web => write!(f, "96 (Web)"),
            DpiPreset::Photo => write!(f, "150 (Photo)"),
            DpiPreset::Print => write!(f, "300 (Print)"),
            DpiPreset::HighRes => write!(f, "600 (High)"),
        }
    }
}

/// AprilTag family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFamily {
    Tag36h11,
}

impl TagFamily {
    /// Number of codes in the family
    pub fn len(&self) -> usize {
        match self {
            TagFamily::Tag36h11 => 587,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Minimum Hamming distance between any two codes, rotations included
    pub fn min_hamming(&self) -> u32 {
        match self {
            TagFamily::Tag36h11 => 11,
        }
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFamily::Tag36h11 => write!(f, "36h11"),
        }
    }
}
