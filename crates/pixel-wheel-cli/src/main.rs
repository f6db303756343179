//! pixel-wheel: apply the circular pixel stretch to an image file.
//!
//! Besides rendering, the tool can dump the operation's parameter schema
//! or show which nodes are on the active path for a given configuration.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin pixel-wheel -- [OPTIONS] [INPUT]
//! ```
//!
//! Set `RUST_LOG=pixel_wheel=debug` to watch attach and rewiring.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use image::{DynamicImage, ImageFormat};
use pixel_wheel::{MetaNode, MetaOperation, PixelWheel, PixelWheelConfig, RgbaImage, Variant};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Circular pixel stretch for raster images.
///
/// Smears every row of the input into streaks and rolls them into a
/// wheel around the image center.
#[derive(Parser)]
#[command(name = "pixel-wheel", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: Option<PathBuf>,

    /// Where to write the result. Defaults to `<input>-wheel.png`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Zoom in [-100, 100]. Positive values zoom in.
    #[arg(long, default_value_t = PixelWheelConfig::DEFAULT_ZOOM, allow_hyphen_values = true)]
    zoom: f64,

    /// Bypass the polar warp for a plain horizontal stretch.
    #[arg(long)]
    linear: bool,

    /// Square (0) to circle (100) blend.
    #[arg(long, default_value_t = PixelWheelConfig::DEFAULT_DEPTH)]
    depth: f64,

    /// Median radius in [0, 6] that hides the warp's seam.
    #[arg(long, default_value_t = PixelWheelConfig::DEFAULT_RADIUS)]
    radius: i32,

    /// Which published form of the operation to run.
    #[arg(long, value_enum, default_value_t = VariantArg::Full)]
    variant: VariantArg,

    /// Replace the stretch sub-pipeline descriptor.
    #[arg(long)]
    descriptor: Option<String>,

    /// Full config as a JSON string.
    ///
    /// When provided, all other parameter flags are ignored. The JSON
    /// must be a valid `PixelWheelConfig` serialization; missing fields
    /// take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Print the operation's keys and parameter schema as JSON and exit.
    #[arg(long)]
    schema: bool,

    /// Print the active path after applying the configuration.
    #[arg(long)]
    print_graph: bool,
}

/// Operation variant selection.
#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    /// Zoom, circular toggle, depth, and seam smoothing.
    Full,
    /// Zoom and circular toggle only.
    Simple,
}

/// Build a [`PixelWheelConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PixelWheelConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let defaults = PixelWheelConfig::default();
    Ok(PixelWheelConfig {
        variant: match cli.variant {
            VariantArg::Full => Variant::Full,
            VariantArg::Simple => Variant::Simple,
        },
        zoom: cli.zoom,
        circular: !cli.linear,
        depth: cli.depth,
        radius: cli.radius,
        descriptor: cli.descriptor.clone().unwrap_or(defaults.descriptor),
    })
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_schema(config: &PixelWheelConfig) -> Result<(), String> {
    let operation = config.operation();
    let doc = serde_json::json!({
        "keys": operation.keys(),
        "params": operation.schema(),
    });
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| format!("Error serializing schema: {e}"))?;
    println!("{json}");
    Ok(())
}

fn print_graph(node: &MetaNode<PixelWheel>) -> Result<(), String> {
    let graph = node.graph();
    let path = graph
        .active_path()
        .map_err(|e| format!("Graph error: {e}"))?;
    let names = path
        .iter()
        .map(|&n| graph.node_name(n).map(|name| format!("{name} ({n})")))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Graph error: {e}"))?;

    let topology = node
        .state()
        .and_then(|state| state.topology(graph))
        .map_or_else(|| "unknown".to_owned(), |t| t.to_string());
    println!("topology: {topology}");
    println!("{}", names.join(" -> "));
    for &detached in &graph.detached_nodes() {
        let name = graph
            .node_name(detached)
            .map_err(|e| format!("Graph error: {e}"))?;
        println!("detached: {name} ({detached})");
    }
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}-wheel.png"))
}

fn save(image: RgbaImage, path: &Path) -> Result<(), String> {
    let format =
        ImageFormat::from_path(path).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    // JPEG has no alpha channel.
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8()),
        _ => DynamicImage::ImageRgba8(image),
    };
    image
        .save_with_format(path, format)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;

    if cli.schema {
        return print_schema(&config);
    }

    let node = config.build().map_err(|e| format!("Attach error: {e}"))?;
    if cli.print_graph {
        print_graph(&node)?;
    }

    let Some(ref input) = cli.input else {
        if cli.print_graph {
            return Ok(());
        }
        return Err("No input image given (see --help)".to_owned());
    };

    let image_bytes =
        std::fs::read(input).map_err(|e| format!("Error reading {}: {e}", input.display()))?;
    tracing::info!(
        input = %input.display(),
        bytes = image_bytes.len(),
        variant = %config.variant,
        "processing"
    );
    let image = pixel_wheel::decode::decode_rgba(&image_bytes)
        .map_err(|e| format!("Error decoding {}: {e}", input.display()))?;
    let output = node
        .process(&image)
        .map_err(|e| format!("Pipeline error: {e}"))?;

    let path = cli.output.clone().unwrap_or_else(|| default_output(input));
    save(output, &path)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
