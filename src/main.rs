//! Eozin - command-line access to whole slide images.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eozin::{
    config::{Cli, Command, CommonOptions, InfoConfig, RegionConfig, TileConfig},
    tile::ImageEncoder,
    Eozin, SlideError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.options.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Command::Info(config) => run_info(config, &cli.options).await,
        Command::Region(config) => run_region(config, &cli.options).await,
        Command::Tile(config) => run_tile(config, &cli.options).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "eozin=debug" } else { "eozin=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_slide(
    path: &std::path::Path,
    options: &CommonOptions,
) -> Result<Eozin, SlideError> {
    let slide = Eozin::open_with_options(path, options.slide_options()).await?;
    for warning in slide.warnings() {
        warn!("{}", warning);
    }
    Ok(slide)
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: &InfoConfig, options: &CommonOptions) -> Result<(), SlideError> {
    let slide = open_slide(&config.path, options).await?;

    if config.json {
        let levels: Vec<_> = (0..slide.level_count())
            .filter_map(|level| slide.level_info(level).ok())
            .map(|info| {
                serde_json::json!({
                    "width": info.width,
                    "height": info.height,
                    "tile_width": info.tile_width,
                    "tile_height": info.tile_height,
                    "downsample": info.downsample,
                })
            })
            .collect();

        let json = serde_json::json!({
            "path": slide.identifier(),
            "format": slide.format().name(),
            "level_count": slide.level_count(),
            "dimensions": slide.dimensions(),
            "level_dimensions": slide.level_dimensions(),
            "levels": levels,
            "properties": slide.properties(),
        });
        let text = serde_json::to_string_pretty(&json).map_err(|e| SlideError::Encode {
            message: e.to_string(),
        })?;
        println!("{}", text);
        return Ok(());
    }

    let (width, height) = slide.dimensions();
    println!("File:        {}", slide.identifier());
    println!("Format:      {}", slide.format());
    println!("Dimensions:  {} x {}", width, height);
    println!("Levels:      {}", slide.level_count());
    for level in 0..slide.level_count() {
        let info = slide.level_info(level)?;
        println!(
            "  [{}] {} x {}  tiles {}x{}  downsample {:.3}",
            level, info.width, info.height, info.tile_width, info.tile_height, info.downsample
        );
    }
    if let Some((mpp_x, mpp_y)) = slide.properties().mpp() {
        println!("MPP:         {} x {}", mpp_x, mpp_y);
    }
    if let Some(power) = slide.properties().objective_power() {
        println!("Objective:   {}x", power);
    }

    println!();
    println!("Properties:");
    for (key, value) in slide.properties().iter() {
        println!("  {} = {}", key, value.replace('\n', " "));
    }

    Ok(())
}

// =============================================================================
// Region Command
// =============================================================================

async fn run_region(config: &RegionConfig, options: &CommonOptions) -> Result<(), SlideError> {
    let slide = open_slide(&config.path, options).await?;

    let region = slide
        .read_region(
            (config.x, config.y),
            config.level,
            (config.width, config.height),
        )
        .await?;
    region
        .save_with_quality(&config.output, options.jpeg_quality)
        .await?;

    info!(
        output = %config.output.display(),
        width = region.width(),
        height = region.height(),
        "wrote region"
    );
    Ok(())
}

// =============================================================================
// Tile Command
// =============================================================================

async fn run_tile(config: &TileConfig, options: &CommonOptions) -> Result<(), SlideError> {
    let slide = open_slide(&config.path, options).await?;

    let tile = slide.read_tile(config.level, config.col, config.row).await?;
    debug!(
        width = tile.width(),
        height = tile.height(),
        "decoded tile"
    );

    ImageEncoder::with_quality(options.jpeg_quality)
        .save(&tile, &config.output)
        .await?;

    info!(output = %config.output.display(), "wrote tile");
    Ok(())
}
