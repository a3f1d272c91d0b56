use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tessera_validator::ValidatorState;
use tracing::info;

mod config;
mod logging;
mod node;

const DEFAULT_CONFIG_FILE: &str = "./tessera-config.toml";

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera - decentralized inference validator", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the validator loop
    Start {
        /// Data directory for persisted scores and frontier
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// JSON registry snapshot to sample peers from
        #[arg(short, long)]
        peers_file: Option<PathBuf>,

        /// Peers queried per cycle
        #[arg(short = 'k', long)]
        sample_size: Option<usize>,
    },

    /// Write a default configuration file
    Init {
        /// Output directory for configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print the persisted score vector, highest first
    Scores {
        /// Data directory holding the validator state
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Only print the best N peers
        #[arg(short, long)]
        top: Option<usize>,
    },
}

fn load_config(path: Option<&Path>) -> Result<config::NodeConfig> {
    let mut config = match path {
        Some(path) => config::NodeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            config::NodeConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("failed to load config {}", DEFAULT_CONFIG_FILE))?
        }
        None => config::NodeConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority order: CLI args > ENV vars > Config file > Defaults
    let mut config = load_config(cli.config.as_deref())?;

    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    match cli.command {
        Commands::Start {
            data_dir,
            peers_file,
            sample_size,
        } => {
            if let Some(data_dir) = data_dir {
                config.node.data_dir = data_dir;
            }
            if let Some(peers_file) = peers_file {
                config.registry.peers_file = peers_file;
            }
            if let Some(k) = sample_size {
                config.validator.sample_size = k;
            }

            info!(
                version = env!("CARGO_PKG_VERSION"),
                data_dir = ?config.node.data_dir,
                peers_file = ?config.registry.peers_file,
                sample_size = config.validator.sample_size,
                datasets = config.datasets.paths.len(),
                "🧬 Starting Tessera validator"
            );

            let node = node::ValidatorNode::new(config).await?;
            info!(name = node.name(), "✅ Validator initialized");

            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            let node_handle = tokio::spawn(node.run(shutdown_rx));

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            info!("🛑 Shutting down gracefully");

            // The current cycle finishes before the loop observes the flag
            let _ = shutdown_tx.send(true);
            node_handle.await.context("validator task panicked")?;
            Ok(())
        }

        Commands::Init { output } => {
            std::fs::create_dir_all(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            let path = output.join("tessera-config.toml");
            config::NodeConfig::default().save_to_file(&path)?;
            info!(path = %path.display(), "✨ Wrote default configuration");
            Ok(())
        }

        Commands::Scores { data_dir, top } => {
            let data_dir = data_dir.unwrap_or(config.node.data_dir);
            let path = ValidatorState::path_in(&data_dir);
            let state = ValidatorState::load(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let snapshot = state.scores.snapshot();

            println!(
                "version {} | {} peers | saved {}",
                snapshot.version,
                snapshot.scores.len(),
                state.saved_at.to_rfc3339()
            );
            let ranked = snapshot.ranked();
            let shown = top.unwrap_or(ranked.len());
            for (rank, (peer, score)) in ranked.into_iter().take(shown).enumerate() {
                println!("{:>4}. peer {:>5}  {:.6}", rank + 1, peer, score);
            }
            Ok(())
        }
    }
}
