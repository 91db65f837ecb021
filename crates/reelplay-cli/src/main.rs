//! Reelplay CLI - Episode inspection and headless playback
//!
//! Features:
//! - Episode field resolution
//! - Catalogue browsing (single video, category pages)
//! - Reachability probing
//! - Headless playback simulation

use clap::{Parser, Subcommand};
use reelplay_core::PlayerConfig;
use std::path::PathBuf;

mod commands;
mod output;
mod simulate;

use output::OutputFormat;

/// Reelplay CLI - Multi-episode video toolkit
#[derive(Parser)]
#[command(name = "reelplay")]
#[command(version)]
#[command(about = "Episode inspection and headless playback toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalogue API base URL (overrides the config file)
    #[arg(long)]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an episode field (name$url#name$url)
    Episodes {
        /// Raw episode field
        field: String,
    },

    /// Show one video and its episodes
    Video {
        /// Video ID
        id: i64,
    },

    /// List videos in a category
    List {
        /// Category name
        category: String,

        /// Page size
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Page offset
        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// Check network reachability
    Probe {
        /// URL to probe (overrides the config file)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Play an episode field on a scripted engine
    Simulate {
        /// Raw episode field
        field: String,

        /// Make the Nth load fail with a not-found error
        #[arg(long)]
        fail_episode: Option<usize>,

        /// Stop at the end of each episode instead of advancing
        #[arg(long)]
        no_advance: bool,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<PlayerConfig> {
    let mut config = match cli.config {
        Some(ref path) => PlayerConfig::from_file(path)?,
        None => PlayerConfig::default(),
    };
    if let Some(ref api) = cli.api {
        config.api_base_url = api.clone();
    }
    if let Commands::Probe { url: Some(ref url) } = cli.command {
        config.probe_url = url.clone();
    }
    if let Commands::Simulate { no_advance: true, .. } = cli.command {
        config.auto_advance = false;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    reelplay_core::init();

    let config = load_config(&cli)?;
    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Episodes { field } => {
            commands::episodes(&field, format)?;
        }
        Commands::Video { id } => {
            commands::video(&config, id, format).await?;
        }
        Commands::List { category, limit, offset } => {
            commands::list(&config, &category, limit, offset, format).await?;
        }
        Commands::Probe { .. } => {
            commands::probe(&config, format).await?;
        }
        Commands::Simulate { field, fail_episode, .. } => {
            simulate::run(config, &field, fail_episode).await?;
        }
    }

    Ok(())
}
