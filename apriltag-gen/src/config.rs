// Generator defaults, loadable from TOML
// Reading the file is left to the caller; this module only parses

use std::path::PathBuf;

use apriltag_common::{OutputFormat, RenderStyle};
use serde::{Deserialize, Serialize};

use crate::DEFAULT_DPI;

/// Defaults applied when a command-line flag is absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// DPI declared by pixel-sized renders
    pub default_dpi: u32,
    pub style: RenderStyle,
    pub format: OutputFormat,
    /// Quiet-zone rings for rectangular tags
    pub rectangular_border: u32,
    /// Quiet-zone rings for circular tags
    pub circular_border: u32,
    /// TrueType font for raster labels; the embedded DejaVu Sans is used when unset
    pub label_font: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_dpi: DEFAULT_DPI,
            style: RenderStyle::Rectangular,
            format: OutputFormat::Raster,
            rectangular_border: RenderStyle::Rectangular.default_border_cells(),
            circular_border: RenderStyle::Circular.default_border_cells(),
            label_font: None,
            output_dir: PathBuf::from("."),
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn border_for(&self, style: RenderStyle) -> u32 {
        match style {
            RenderStyle::Rectangular => self.rectangular_border,
            RenderStyle::Circular => self.circular_border,
        }
    }
}
