//! LoopDraw CLI: command-line interface for scripted looping-canvas sessions.
//!
//! Usage:
//!   loopdraw play <SCRIPT>       Run a session over a JSONL input script
//!   loopdraw snapshot <SCRIPT>   Export the cumulative drawing as PNG
//!   loopdraw check               Check export capabilities
//!   loopdraw config              Show (or write) the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loopdraw_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "loopdraw",
    about = "A looping drawing canvas that replays every stroke each cycle",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session over an input script
    Play {
        /// Path to the JSONL input script
        script: PathBuf,

        /// Cycle duration in seconds
        #[arg(long)]
        duration_secs: Option<f64>,

        /// Canvas width
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height
        #[arg(long)]
        height: Option<u32>,

        /// Display frame rate driving the loop
        #[arg(long, default_value = "60")]
        fps: u32,

        /// Directory for exported artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tick on the wall clock instead of simulated time
        #[arg(long)]
        realtime: bool,

        /// Extra cycles to run once the script and all exports are done
        #[arg(long, default_value = "0")]
        linger_cycles: u32,

        /// Seed for the cycle color palette
        #[arg(long)]
        seed: Option<u64>,

        /// Write the final composited display frame to this PNG
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// Apply a script and export the cumulative drawing as PNG
    Snapshot {
        /// Path to the JSONL input script
        script: PathBuf,

        /// Output PNG path (defaults to the export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Canvas width
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height
        #[arg(long)]
        height: Option<u32>,
    },

    /// Check export capabilities
    Check,

    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    loopdraw_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Play {
            script,
            duration_secs,
            width,
            height,
            fps,
            output,
            realtime,
            linger_cycles,
            seed,
            preview,
        } => {
            let options = commands::play::PlayOptions {
                script,
                duration_secs,
                width,
                height,
                fps,
                output,
                realtime,
                linger_cycles,
                seed,
                preview,
            };
            commands::play::run(options, config).await
        }
        Commands::Snapshot {
            script,
            output,
            width,
            height,
        } => commands::snapshot::run(script, output, width, height, config),
        Commands::Check => commands::check::run(&config),
        Commands::Config { write } => commands::config::run(&config, write),
    }
}
