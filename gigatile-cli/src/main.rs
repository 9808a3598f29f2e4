//! gigatile CLI - build and inspect tiled image pyramids.
//!
//! Three commands:
//! - `build`: run a full pyramid build from an image file and print
//!   the per-level geometry and build statistics.
//! - `info`: decode only the header and print the geometry the
//!   pyramid would have, without building anything.
//! - `extract`: build, then write one tile out as a PNG.
//!
//! The pyramid lives in unlinked temp files, so `build` is chiefly a
//! measurement and validation tool; a real viewer embeds the library
//! and keeps the `Pyramid` value alive.

mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use error::CliError;
use gigatile::layout::LevelLayout;
use gigatile::{BuildConfig, DecoderKind, DownsampleMode, Pyramid};

// ============================================================================
// CLI Argument Definitions
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Default)]
enum DecoderArg {
    /// One-shot decode, format detected from the file contents
    #[default]
    OneShot,
    /// One-shot decode pinned to the JPEG codec
    Jpeg,
    /// Incremental scanline decoding (binary PPM)
    Scanline,
}

impl From<DecoderArg> for DecoderKind {
    fn from(arg: DecoderArg) -> Self {
        match arg {
            DecoderArg::OneShot => DecoderKind::OneShot,
            DecoderArg::Jpeg => DecoderKind::OneShotJpeg,
            DecoderArg::Scanline => DecoderKind::Scanline,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Default)]
enum DownsamplerArg {
    /// Nearest-pixel decimation (fast)
    #[default]
    Decimate,
    /// 2x2 box filter (smoother small levels)
    HighQuality,
}

impl From<DownsamplerArg> for DownsampleMode {
    fn from(arg: DownsamplerArg) -> Self {
        match arg {
            DownsamplerArg::Decimate => DownsampleMode::Decimate,
            DownsamplerArg::HighQuality => DownsampleMode::HighQuality,
        }
    }
}

#[derive(Parser)]
#[command(name = "gigatile", version = gigatile::VERSION, about = "Tiled image pyramid builder")]
struct Cli {
    /// Log more (repeat for debug output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pyramid from an image file and report statistics
    Build {
        /// Source image file
        input: PathBuf,

        /// Number of zoom levels to produce
        #[arg(short, long, default_value_t = 3)]
        levels: usize,

        /// Decoder adapter to use
        #[arg(long, value_enum, default_value_t)]
        decoder: DecoderArg,

        /// Downsampling strategy
        #[arg(long, value_enum, default_value_t)]
        downsampler: DownsamplerArg,

        /// Always flush finished levels to media in the background
        #[arg(long)]
        flush: bool,
    },

    /// Print the geometry a pyramid would have, without building it
    Info {
        /// Source image file
        input: PathBuf,

        /// Number of zoom levels to plan for
        #[arg(short, long, default_value_t = 3)]
        levels: usize,
    },

    /// Build a pyramid and write one tile out as PNG
    Extract {
        /// Source image file
        input: PathBuf,

        /// Output PNG path
        output: PathBuf,

        /// Scale fraction selecting the level (1.0 = level 0, 0.5 = level 1, ...)
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Tile row
        #[arg(long, default_value_t = 0)]
        row: u32,

        /// Tile column
        #[arg(long, default_value_t = 0)]
        col: u32,

        /// Number of zoom levels to produce
        #[arg(short, long, default_value_t = 3)]
        levels: usize,

        /// Decoder adapter to use
        #[arg(long, value_enum, default_value_t)]
        decoder: DecoderArg,
    },
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_build(
    input: PathBuf,
    levels: usize,
    decoder: DecoderArg,
    downsampler: DownsamplerArg,
    flush: bool,
) -> Result<(), CliError> {
    let config = BuildConfig::new()
        .with_levels(levels)
        .with_downsampler(downsampler.into())
        .with_flush_disk_cache(flush);

    info!("building pyramid from {}", input.display());
    let pyramid = Pyramid::from_path(&input, decoder.into(), config)?;
    info!(
        "build finished: {} levels, {} tile rows",
        pyramid.level_count(),
        pyramid.stats().tile_rows_emitted
    );

    let (width, height) = pyramid
        .image_size()
        .ok_or_else(|| CliError::Usage("build produced no image dimensions".to_string()))?;
    println!("{}: {}x{} pixels, {} levels", input.display(), width, height, pyramid.level_count());
    print_levels(&pyramid);

    let stats = pyramid.stats();
    println!(
        "scanlines {}  tile rows {}  flushed {} MB",
        stats.scanlines_written,
        stats.tile_rows_emitted,
        stats.bytes_flushed / (1024 * 1024)
    );
    Ok(())
}

fn cmd_info(input: PathBuf, levels: usize) -> Result<(), CliError> {
    use gigatile::decode::{OneShotDecoder, SniffingOneShot};

    let data = std::fs::read(&input)?;
    let (width, height) = SniffingOneShot.dimensions(&data)?;
    let usable = LevelLayout::usable_levels(width, height, levels);

    println!("{}: {}x{} pixels", input.display(), width, height);
    println!("{:>5} {:>11} {:>7} {:>7} {:>12}", "level", "size", "cols", "rows", "tile bytes");
    for k in 0..usable {
        let l = LevelLayout::for_level(k, width, height).expect("usable level");
        println!(
            "{:>5} {:>11} {:>7} {:>7} {:>12}",
            k,
            format!("{}x{}", l.width, l.height),
            l.cols,
            l.rows,
            l.tiled_payload_bytes()
        );
    }
    if usable < levels.max(1) {
        println!("({} of {} requested levels; deeper ones would be empty)", usable, levels);
    }
    Ok(())
}

fn cmd_extract(
    input: PathBuf,
    output: PathBuf,
    scale: f64,
    row: u32,
    col: u32,
    levels: usize,
    decoder: DecoderArg,
) -> Result<(), CliError> {
    let config = BuildConfig::new().with_levels(levels);
    let pyramid = Pyramid::from_path(&input, decoder.into(), config)?;

    let tile = pyramid.tile_at(scale, row, col)?;
    let bytes = tile.bytes()?;
    let (w, h) = tile.size();

    let img = image::RgbaImage::from_raw(w, h, bytes.to_vec()).ok_or_else(|| {
        CliError::Image(format!(
            "tile returned {} bytes, expected {}",
            bytes.len(),
            tile.byte_len()
        ))
    })?;
    img.save(&output).map_err(|e| CliError::Image(e.to_string()))?;

    println!(
        "wrote level {} tile ({}, {}) to {}",
        tile.level(),
        tile.row(),
        tile.col(),
        output.display()
    );
    Ok(())
}

fn print_levels(pyramid: &Pyramid) {
    println!("{:>5} {:>11} {:>7} {:>7} {:>12}", "level", "size", "cols", "rows", "file bytes");
    for k in 0..pyramid.level_count() {
        if let Some(info) = pyramid.level_info(k) {
            println!(
                "{:>5} {:>11} {:>7} {:>7} {:>12}",
                info.level,
                format!("{}x{}", info.width, info.height),
                info.cols,
                info.rows,
                info.file_bytes
            );
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            input,
            levels,
            decoder,
            downsampler,
            flush,
        } => cmd_build(input, levels, decoder, downsampler, flush),
        Commands::Info { input, levels } => cmd_info(input, levels),
        Commands::Extract {
            input,
            output,
            scale,
            row,
            col,
            levels,
            decoder,
        } => cmd_extract(input, output, scale, row, col, levels, decoder),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
