use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use apriltag_gen::{
    array_file_name, render_array, render_tag, resolve_size, tag_file_name, ArrayLayout, DpiPreset, GeneratorConfig,
    LabelFont, OutputFormat, RenderStyle, RenderedArtifact, SizeSpec, TagRenderRequest,
};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Generate tag36h11 AprilTags and calibration arrays
#[derive(Parser, Debug)]
#[command(name = "apriltag-gen")]
#[command(about = "Generate tag36h11 AprilTags as PNG, SVG or PDF", long_about = None)]
struct Cli {
    /// TOML file with generator defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one tag
    Single {
        /// Tag id (0-586)
        #[arg(long)]
        id: u32,

        #[command(flatten)]
        size: SizeArgs,

        #[command(flatten)]
        render: RenderArgs,
    },
    /// Render every tag in an id range, one file each
    Batch {
        /// First tag id
        #[arg(long, default_value_t = 0)]
        start: u32,

        /// Last tag id, inclusive
        #[arg(long)]
        end: u32,

        #[command(flatten)]
        size: SizeArgs,

        #[command(flatten)]
        render: RenderArgs,
    },
    /// Render consecutive tags into one grid
    Array {
        /// First tag id
        #[arg(long, default_value_t = 0)]
        start: u32,

        #[arg(long)]
        rows: u32,

        #[arg(long)]
        cols: u32,

        /// Side length of each tag in pixels
        #[arg(long)]
        tag_size: u32,

        /// Gap between tags in pixels
        #[arg(long, default_value_t = 0)]
        spacing: u32,

        /// DPI declared by the artifact
        #[arg(long)]
        dpi: Option<u32>,

        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct SizeArgs {
    /// Tag size in pixels
    #[arg(long, conflicts_with = "cm")]
    pixels: Option<u32>,

    /// Tag size in centimetres
    #[arg(long)]
    cm: Option<f64>,

    /// Print resolution; also declared by pixel-sized output
    #[arg(long)]
    dpi: Option<u32>,
}

#[derive(Args, Debug, Clone)]
struct RenderArgs {
    #[arg(long, value_enum)]
    style: Option<StyleArg>,

    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Quiet-zone width in cells
    #[arg(long)]
    border: Option<u32>,

    /// Draw the tag id under each tag
    #[arg(long, visible_alias = "labels")]
    label: bool,

    /// TrueType font for raster labels
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum StyleArg {
    Rectangular,
    Circular,
}

impl From<StyleArg> for RenderStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Rectangular => RenderStyle::Rectangular,
            StyleArg::Circular => RenderStyle::Circular,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Png,
    Svg,
    Pdf,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => OutputFormat::Raster,
            FormatArg::Svg => OutputFormat::Vector,
            FormatArg::Pdf => OutputFormat::Pdf,
        }
    }
}

/// Render options after merging flags over the config file
struct Options {
    style: RenderStyle,
    format: OutputFormat,
    border: u32,
    label: bool,
    font: LabelFont,
}

impl Options {
    fn resolve(args: &RenderArgs, config: &GeneratorConfig) -> Result<Self> {
        let style = args.style.map(RenderStyle::from).unwrap_or(config.style);
        let font_path = args.font.as_ref().or(config.label_font.as_ref());
        let font = match font_path {
            Some(path) => {
                let data = fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
                LabelFont::from_bytes(data).with_context(|| format!("Failed to load font {}", path.display()))?
            }
            None => LabelFont::Embedded,
        };

        Ok(Self {
            style,
            format: args.format.map(OutputFormat::from).unwrap_or(config.format),
            border: args.border.unwrap_or_else(|| config.border_for(style)),
            label: args.label,
            font,
        })
    }

    fn request(&self, tag_id: u32, size: SizeSpec, dpi: u32) -> TagRenderRequest {
        TagRenderRequest::new(tag_id, size)
            .with_style(self.style)
            .with_format(self.format)
            .with_border(self.border)
            .with_dpi(dpi)
            .with_label(self.label)
            .with_label_font(self.font.clone())
    }
}

fn size_spec(args: &SizeArgs, default_dpi: u32) -> Result<SizeSpec> {
    match (args.pixels, args.cm) {
        (Some(px), _) => Ok(SizeSpec::pixels(px)),
        (None, Some(cm)) => Ok(SizeSpec::physical(cm, args.dpi.unwrap_or(default_dpi))),
        (None, None) => bail!("Pass a tag size with --pixels or --cm"),
    }
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig> {
    let Some(path) = path else {
        return Ok(GeneratorConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = GeneratorConfig::from_toml_str(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    tracing::debug!(?config, "loaded config");
    Ok(config)
}

fn write_artifact(dir: &Path, name: &str, artifact: &RenderedArtifact) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    let bytes = artifact.to_bytes()?;
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let out_dir = cli.output.clone().unwrap_or_else(|| config.output_dir.clone());

    match cli.command {
        Commands::Single { id, size, render } => {
            let opts = Options::resolve(&render, &config)?;
            let dpi = size.dpi.unwrap_or(config.default_dpi);
            let spec = size_spec(&size, dpi)?;
            let request = opts.request(id, spec, dpi);

            println!("Generating AprilTag {}:", id);
            println!("  Size: {} ({}px)", spec, resolve_size(&spec)?);
            let effective_dpi = request.effective_dpi();
            match DpiPreset::from_dpi(effective_dpi) {
                Some(preset) => println!("  DPI: {}", preset),
                None => println!("  DPI: {}", effective_dpi),
            }
            println!("  Style: {} (border {} cells)", opts.style, opts.border);
            println!("  Format: {}", opts.format);

            let artifact = render_tag(&request).with_context(|| format!("Failed to render tag {}", id))?;
            let path = write_artifact(&out_dir, &tag_file_name(id, opts.format), &artifact)?;
            println!("✓ Saved {}", path.display());
        }
        Commands::Batch { start, end, size, render } => {
            if start > end {
                bail!("--start {} is after --end {}", start, end);
            }
            let opts = Options::resolve(&render, &config)?;
            let dpi = size.dpi.unwrap_or(config.default_dpi);
            let spec = size_spec(&size, dpi)?;

            println!("Generating tags {}-{} at {} as {}", start, end, spec, opts.format);

            let failed = (start..=end)
                .into_par_iter()
                .filter_map(|id| {
                    let result = render_tag(&opts.request(id, spec, dpi))
                        .map_err(anyhow::Error::from)
                        .and_then(|artifact| write_artifact(&out_dir, &tag_file_name(id, opts.format), &artifact));
                    match result {
                        Ok(path) => {
                            tracing::info!(tag_id = id, path = %path.display(), "saved");
                            None
                        }
                        Err(e) => {
                            tracing::error!(tag_id = id, "{:#}", e);
                            Some(id)
                        }
                    }
                })
                .count();

            let total = (end - start) as usize + 1;
            println!("✓ Generated {} of {} tags in {}", total - failed, total, out_dir.display());
            if failed > 0 {
                bail!("{} tags failed", failed);
            }
        }
        Commands::Array { start, rows, cols, tag_size, spacing, dpi, render } => {
            let opts = Options::resolve(&render, &config)?;
            let layout = ArrayLayout::sequential(start, rows, cols, tag_size)?
                .with_spacing(spacing)
                .with_style(opts.style)
                .with_border(opts.border)
                .with_format(opts.format)
                .with_dpi(dpi.unwrap_or(config.default_dpi))
                .with_labels(opts.label)
                .with_label_font(opts.font.clone());

            // Reject bad grids before printing sizes that would not fit a u32
            layout.validate().context("Invalid array layout")?;
            let (width, height) = layout.dimensions();
            println!("Generating {}x{} array of {} tags:", rows, cols, layout.tag_ids.len());
            println!("  Canvas: {}x{}px at {} DPI", width, height, layout.dpi);

            let artifact = render_array(&layout).context("Failed to render array")?;
            let path = write_artifact(&out_dir, &array_file_name(rows, cols, opts.format), &artifact)?;
            println!("✓ Saved {}", path.display());
        }
    }

    Ok(())
}
