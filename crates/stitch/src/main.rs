//! stitch CLI - builds and previews combined reference and narrative docs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::ConfigFile;

#[derive(Parser)]
#[command(name = "stitch")]
#[command(about = "Build and preview combined reference and narrative documentation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to stitch.toml config file, relative to the project root
    #[arg(short, long, default_value = "stitch.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate reference docs, then build the narrative site
    Build {
        /// Regenerate reference docs even if they are up to date
        #[arg(short, long)]
        force: bool,
    },

    /// Preview built documentation with live reload
    Serve {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (defaults to the build output)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,

        /// Serve files without watching for changes
        #[arg(long)]
        no_reload: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let project_root = std::env::current_dir().context("Failed to read current directory")?;
    let file_config = ConfigFile::load(&project_root.join(&cli.config))?;

    // Execute command
    match cli.command {
        Commands::Build { force } => {
            commands::build::run(&project_root, &file_config, force).await?;
        }
        Commands::Serve {
            port,
            dir,
            no_open,
            no_reload,
        } => {
            let args = commands::serve::ServeArgs {
                port,
                dir,
                open: !no_open,
                live_reload: !no_reload,
            };
            commands::serve::run(&project_root, &file_config, args).await?;
        }
    }

    Ok(())
}
