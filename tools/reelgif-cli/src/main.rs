//! Reelgif CLI: export editor compositions as animated GIFs.
//!
//! Usage:
//!   reelgif export <COMPOSITION>   Render a composition to a GIF
//!   reelgif validate <COMPOSITION> Check a composition for problems
//!   reelgif info <COMPOSITION>     Show clips, overlays and frame counts
//!   reelgif init <PATH>            Write an example composition
//!   reelgif check                  Check system capabilities

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelgif",
    about = "Timeline-to-GIF exporter with server rendering and local fallback",
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
    /// Render a composition to an animated GIF
    Export(ExportArgs),

    /// Validate a composition file
    Validate {
        /// Path to the composition JSON
        path: PathBuf,
    },

    /// Show composition information
    Info {
        /// Path to the composition JSON
        path: PathBuf,
    },

    /// Write an example composition
    Init {
        /// Where to write the composition JSON
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check system capabilities
    Check,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Path to the composition JSON
    pub path: PathBuf,

    /// Directory the GIF is delivered to
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Output width
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height
    #[arg(long)]
    pub height: Option<u32>,

    /// Playback speed multiplier (overrides the composition)
    #[arg(long)]
    pub speed: Option<f64>,

    /// Quantiser speed, 1 (best) to 30 (fastest)
    #[arg(long)]
    pub quality: Option<u32>,

    /// Render endpoint to try before rendering locally
    #[arg(long, conflicts_with = "no_server")]
    pub server: Option<String>,

    /// Always render locally
    #[arg(long)]
    pub no_server: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = reelgif_common::config::AppConfig::load();

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelgif_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Export(args) => commands::export::run(args, config).await,
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path } => commands::info::run(path, &config),
        Commands::Init { path, force } => commands::init::run(path, force),
        Commands::Check => commands::check::run(&config),
    }
}
