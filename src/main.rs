use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use llm_panel::api::{self, SecurityConfig};
use llm_panel::config::PanelSettings;
use llm_panel::models::ApiConfig;
use llm_panel::panel::Panel;
use llm_panel::patch::{IconCatalog, IconCdn, IconFormat, IconPatchConfig};
use llm_panel::storage::FileStore;
use llm_panel::transfer;

const DEFAULT_PORT: u16 = 17020;

#[derive(Parser)]
#[command(name = "llmp")]
#[command(about = "Curate the model catalog of an OpenWebUI instance")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the local panel API
    Serve {
        /// Port for the HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Connect to a catalog and remember the credentials
    Connect {
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: String,
    },
    /// Forget the stored credentials
    Disconnect,
    /// Show the stored connection
    Status,
    /// Fetch the catalog and write the patched list to a JSON file
    Export {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        #[command(flatten)]
        icons: IconArgs,
    },
    /// Save the patched list back to the catalog
    Save {
        /// Save models from this file instead of the fetched catalog
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        icons: IconArgs,
    },
    /// Create the base models the full listing lacks
    CreateMissing,
}

#[derive(Args)]
struct IconArgs {
    /// Assign lobehub icons by model name
    #[arg(long)]
    icons: bool,
    /// Use the png package instead of svg
    #[arg(long, requires = "icons")]
    png: bool,
    /// Load icons from unpkg instead of npmmirror
    #[arg(long, requires = "icons")]
    unpkg: bool,
    /// Prefer colour variants
    #[arg(long, requires = "icons")]
    color: bool,
}

impl IconArgs {
    fn config(&self) -> Option<IconPatchConfig> {
        self.icons.then(|| IconPatchConfig {
            cdn: if self.unpkg {
                IconCdn::Unpkg
            } else {
                IconCdn::Npmmirror
            },
            format: if self.png {
                IconFormat::Png
            } else {
                IconFormat::Svg
            },
            use_color: self.color,
            ..IconPatchConfig::default()
        })
    }
}

/// Initialize tracing with output to stderr so command output stays clean
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "llm_panel=info,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Connect with stored credentials, falling back to the environment.
async fn connect_stored(panel: &Panel) -> anyhow::Result<()> {
    let config = panel
        .stored_config()
        .or_else(ApiConfig::from_env)
        .context("Not connected: run `llmp connect` or set LLM_PANEL_URL and LLM_PANEL_TOKEN")?;
    let summary = panel.connect(config).await?;
    println!("Fetched {} models", summary.models);
    if !summary.missing.is_empty() {
        println!(
            "{} base models are missing from the catalog (run `llmp create-missing`)",
            summary.missing.len()
        );
    }
    Ok(())
}

async fn serve(panel: Panel, port: u16) -> anyhow::Result<()> {
    let app = api::create_router_with_security(panel, SecurityConfig::from_env());
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Panel API listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let storage = Arc::new(FileStore::open_default()?);
    tracing::debug!("Using state file {}", storage.path().display());
    let panel = Panel::new(storage, PanelSettings::from_env());

    match cli.command {
        Some(Commands::Serve { port }) => serve(panel, port).await?,
        None => serve(panel, DEFAULT_PORT).await?,
        Some(Commands::Connect { url, token }) => {
            let summary = panel.connect(ApiConfig::new(url, token)).await?;
            println!("Connected: {} models", summary.models);
            for model in &summary.missing {
                println!("  missing: {} ({})", model.id, model.name);
            }
        }
        Some(Commands::Disconnect) => {
            panel.disconnect();
            println!("Disconnected");
        }
        Some(Commands::Status) => match panel.stored_config() {
            Some(config) => println!("Connected to {}", config.base_url),
            None => println!("Not connected"),
        },
        Some(Commands::Export { out, icons }) => {
            connect_stored(&panel).await?;
            if let Some(config) = icons.config() {
                panel.apply_icon_config(config, IconCatalog::builtin());
            }
            let path = transfer::export_models(&panel.effective_models(), &out)?;
            println!("Wrote {}", path.display());
        }
        Some(Commands::Save { file, icons }) => {
            connect_stored(&panel).await?;
            if let Some(file) = file {
                panel.import_models(transfer::import_models(&file)?);
            }
            if let Some(config) = icons.config() {
                panel.apply_icon_config(config, IconCatalog::builtin());
            }
            let report = panel.save().await?;
            println!("Saved {} models, {} failed", report.success, report.failed);
            for (id, reason) in &report.errors {
                println!("  {}: {}", id, reason);
            }
        }
        Some(Commands::CreateMissing) => {
            connect_stored(&panel).await?;
            let report = panel.create_missing().await?;
            println!(
                "Created {} models, {} failed",
                report.created.len(),
                report.failed
            );
            for (id, reason) in &report.errors {
                println!("  {}: {}", id, reason);
            }
        }
    }

    Ok(())
}
