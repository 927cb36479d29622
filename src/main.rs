use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use service_config::{ConfigManager, ServiceConfig};
use upscaler::{fetch_weights, load_upscaler, UpscaleServer};

/// Tiled super-resolution image upscaling service
///
/// Examples:
///   upscaler serve --port 8000
///   upscaler upscale photo.jpg photo_x4.png --tile 256
///   upscaler fetch-weights
///   upscaler init-config upscaler.toml
#[derive(Parser)]
#[command(name = "upscaler", version, about, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Upscale a single image file
    Upscale {
        /// Image to read
        input: PathBuf,

        /// Where to write the result; the extension selects the format
        output: PathBuf,

        /// Tile size, 0 processes the whole image at once
        #[arg(long)]
        tile: Option<u32>,

        /// Context padding around each tile
        #[arg(long)]
        tile_pad: Option<u32>,
    },

    /// Download the configured weight artifact if it is missing
    FetchWeights,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        ConfigManager::write_default(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    let _log_guard = logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let server = UpscaleServer::new(config).await?;
            server.serve().await?;
        }
        Commands::Upscale {
            input,
            output,
            tile,
            tile_pad,
        } => {
            // One-shot runs process the whole image unless asked to tile
            config.model.tile_size = tile.unwrap_or(0);
            if let Some(pad) = tile_pad {
                config.model.tile_pad = pad;
            }

            let upscaler = load_upscaler(&config.model).await?;
            let saved = tokio::task::spawn_blocking(move || upscaler.upscale_and_save(&input, &output))
                .await
                .context("Upscale task panicked")??;
            info!("Saved {}", saved.display());
            println!("{}", saved.display());
        }
        Commands::FetchWeights => {
            let path = fetch_weights(&config.model).await?;
            println!("{}", path.display());
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<ServiceConfig> {
    let manager = ConfigManager::load(path).context("Failed to load configuration")?;
    let config = manager.service_config().context("Invalid configuration")?;
    Ok(config)
}
