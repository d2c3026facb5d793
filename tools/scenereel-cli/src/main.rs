//! SceneReel CLI: render scene projects into a single subtitled video.
//!
//! Usage:
//!   scenereel render <ASSETS> [OPTIONS]    Render a project to video
//!   scenereel inspect <ASSETS> [OPTIONS]   Show bindings, durations and sync decisions
//!   scenereel check [--init-config]        Check for ffmpeg and ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::project::ProjectArgs;

#[derive(Parser)]
#[command(
    name = "scenereel",
    about = "Assemble scene clips, narration and subtitles into one video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project to a single video file
    Render {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output file (defaults to output.<ext> in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve and probe a project and print the render plan
    Inspect {
        #[command(flatten)]
        project: ProjectArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check system capabilities
    Check {
        /// Write a default config file if none exists
        #[arg(long)]
        init_config: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = scenereel_common::config::AppConfig::load().logging;
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.log_json;
    scenereel_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render { project, output } => commands::render::run(project, output).await,
        Commands::Inspect { project, json } => commands::inspect::run(project, json).await,
        Commands::Check { init_config } => commands::check::run(init_config).await,
    }
}
