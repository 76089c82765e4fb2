// Tag id labels for raster output
// Labels live in the bottom quiet-zone band and never touch pattern cells

use std::fmt;

use ab_glyph::{Font, FontArc, FontRef, PxScale};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::error::{Result, TagError};

const BLACK: Luma<u8> = Luma([0u8]);
const WHITE: Luma<u8> = Luma([255u8]);

/// DejaVu Sans, see assets/DejaVuSans-LICENSE
static EMBEDDED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Bands shorter than this are left blank
const MIN_BAND_PX: u32 = 5;

/// Font used for raster labels
#[derive(Clone, Default)]
pub enum LabelFont {
    /// DejaVu Sans, compiled into the binary
    #[default]
    Embedded,
    /// Any TrueType/OpenType font supplied by the caller
    Custom(FontArc),
}

impl LabelFont {
    /// Load a font from raw TTF/OTF bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(data).map_err(font_err)?;
        Ok(LabelFont::Custom(font))
    }
}

impl fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelFont::Embedded => write!(f, "LabelFont::Embedded"),
            LabelFont::Custom(_) => write!(f, "LabelFont::Custom"),
        }
    }
}

fn font_err(e: ab_glyph::InvalidFont) -> TagError {
    TagError::Encode {
        format: "label font",
        message: e.to_string(),
    }
}

/// Text shown under a tag
pub fn label_text(tag_id: u32) -> String {
    format!("ID: {}", tag_id)
}

/// Render a label into a white band of the given size
pub(crate) fn render_band(tag_id: u32, width: u32, height: u32, font: &LabelFont) -> Result<GrayImage> {
    let mut band = GrayImage::from_pixel(width, height, WHITE);
    if height < MIN_BAND_PX || width < MIN_BAND_PX {
        tracing::debug!(tag_id, width, height, "label band too small, skipping label");
        return Ok(band);
    }

    let text = label_text(tag_id);
    match font {
        LabelFont::Embedded => {
            let font = FontRef::try_from_slice(EMBEDDED_FONT).map_err(font_err)?;
            draw_centered(&mut band, &font, &text);
        }
        LabelFont::Custom(font) => draw_centered(&mut band, font, &text),
    }

    Ok(band)
}

fn draw_centered(band: &mut GrayImage, font: &impl Font, text: &str) {
    let (width, height) = band.dimensions();

    // Text takes three fifths of the band height, shrunk further if the
    // label would not fit across the tag
    let mut px = (height * 3 / 5).max(3) as f32;
    let (text_w, _) = text_size(PxScale::from(px), font, text);
    let max_w = width * 9 / 10;
    if text_w > max_w {
        px *= max_w as f32 / text_w as f32;
    }

    let scale = PxScale::from(px);
    let (text_w, text_h) = text_size(scale, font, text);
    let x = width.saturating_sub(text_w) / 2;
    let y = height.saturating_sub(text_h) / 2;
    draw_text_mut(band, BLACK, x as i32, y as i32, scale, font, text);
}
