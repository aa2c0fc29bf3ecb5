mod synthetic;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use glam::DVec3;
use tilestream_tileset::{DistanceVisibility, TileSet, TileSetOptions, Viewpoint};
use tracing_subscriber::EnvFilter;

use synthetic::SyntheticSource;

#[derive(Parser)]
#[command(name = "tilestream-cli", about = "CLI tool for tilestream operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Print options after validation against the synthetic source
    Options {
        /// YAML or JSON options file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Stream tiles for an eye sweeping across the globe
    Simulate {
        /// YAML or JSON options file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u32,
        /// Simulated load latency per tile
        #[arg(long, default_value = "20")]
        latency_ms: u64,
        /// Fail every n-th tile request
        #[arg(long)]
        fail_every: Option<u64>,
        /// Frame interval
        #[arg(long, default_value = "16")]
        frame_ms: u64,
    },
}

/// Deepest level the synthetic source serves.
const SOURCE_MAX_LEVEL: u8 = 16;

/// Frames without preload data before the stall is reported.
const PRELOAD_STALL_FRAMES: u32 = 120;

fn load_options(config: Option<PathBuf>) -> anyhow::Result<TileSetOptions> {
    match config {
        Some(path) => Ok(TileSetOptions::load(path)?),
        None => Ok(TileSetOptions {
            max_level: 10,
            max_tile_data: 512,
            cache_size_hint: 256,
            ..TileSetOptions::default()
        }),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()?;

    match cli.command {
        Commands::Info => {
            println!("tilestream-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("tileset: {}", tilestream_tileset::crate_info());
        }
        Commands::Options { config } => {
            let options = load_options(config)?;
            let source = SyntheticSource::new(
                runtime.handle().clone(),
                SOURCE_MAX_LEVEL,
                Duration::ZERO,
                None,
            );
            let validated = options.validate(&source)?;
            println!("{validated:#?}");
        }
        Commands::Simulate {
            config,
            frames,
            latency_ms,
            fail_every,
            frame_ms,
        } => {
            let options = load_options(config)?;
            let source = SyntheticSource::new(
                runtime.handle().clone(),
                SOURCE_MAX_LEVEL,
                Duration::from_millis(latency_ms),
                fail_every,
            );
            let mut tileset = TileSet::new(source, DistanceVisibility::new(1.5), options)?;
            println!(
                "Simulating {frames} frames: levels {}..={}, roots {}x{}",
                tileset.min_level(),
                tileset.max_level(),
                tileset.num_root_tiles_x(),
                tileset.num_root_tiles_y()
            );

            let started = Instant::now();
            for frame in 0..frames {
                // Low pass sweeping east along 30N
                let lon = -150.0 + f64::from(frame) * 2.5;
                let eye = Viewpoint::new(DVec3::new(lon, 30.0, 2.0), 40.0);
                let diff = tileset.update(&eye);

                if !tileset.preload_ready() && frame + 1 == PRELOAD_STALL_FRAMES {
                    tracing::warn!(
                        elapsed = ?started.elapsed(),
                        "preload data still not ready; tile set is stalled"
                    );
                }
                if !diff.is_empty() {
                    let stats = tileset.stats();
                    println!(
                        "frame {frame:>4}: +{} ~{} -{} resident={} cached={} pending={} nodes={} ({:?})",
                        diff.added.len(),
                        diff.updated.len(),
                        diff.removed.len(),
                        stats.resident,
                        stats.cached_requests,
                        stats.pending_requests,
                        stats.nodes,
                        stats.frame_time
                    );
                }
                std::thread::sleep(Duration::from_millis(frame_ms));
            }

            let deepest = tileset
                .tiles()
                .iter()
                .map(|t| t.id.level())
                .max()
                .unwrap_or(0);
            let mismatched = tileset.tiles().iter().filter(|t| t.data.id != t.id).count();
            if mismatched > 0 {
                tracing::warn!(mismatched, "resident tiles carry data for another id");
            }
            let checksum = tileset
                .tiles()
                .iter()
                .fold(0u64, |acc, t| acc ^ t.data.checksum);
            println!(
                "Done: resident={}, deepest level={}, checksum={checksum:016x}, requests issued={}, cache={}",
                tileset.tiles().len(),
                deepest,
                tileset.source().issued(),
                tileset.cache_len()
            );
        }
    }

    Ok(())
}
