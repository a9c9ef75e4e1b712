mod commands;

use anyhow::Result;
use calbridge_core::backend::BackendRegistry;
use calbridge_core::config::BridgeConfig;
use calbridge_core::engine::SyncEngine;
use calbridge_core::privacy::PrivacyMapper;
use calbridge_core::state::StateStore;
use calbridge_core::window::SyncWindow;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calbridge")]
#[command(about = "Reconcile events across calendar backends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling loop: sync, sleep, repeat
    Run,
    /// Run a single reconciliation pass and exit
    Sync {
        /// Sync events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Sync events until this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// List calendars available on every configured backend
    Discover,
    /// Print the configured calendar pairs
    Pairs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig::load()?;

    match cli.command {
        Commands::Run => {
            let engine = build_engine(&config, None);
            commands::run::run(engine, &config).await
        }
        Commands::Sync { from, to } => {
            let window = match (&from, &to) {
                (None, None) => None,
                _ => Some(
                    SyncWindow::from_args(from.as_deref(), to.as_deref())
                        .map_err(|e| anyhow::anyhow!(e))?,
                ),
            };
            let engine = build_engine(&config, window);
            commands::sync::run(engine).await
        }
        Commands::Discover => {
            let registry = BackendRegistry::from_configs(&config.backends);
            commands::discover::run(&registry).await
        }
        Commands::Pairs => commands::pairs::run(&config),
    }
}

fn build_engine(config: &BridgeConfig, window: Option<SyncWindow>) -> SyncEngine {
    let registry = BackendRegistry::from_configs(&config.backends);
    let privacy = PrivacyMapper::new(
        config.privacy_event_prefix.as_str(),
        config.privacy_event_title.as_str(),
    );
    let store = StateStore::new(&config.state_path);

    let engine = SyncEngine::new(registry, config.pairs.clone(), privacy, store);
    match window {
        Some(window) => engine.with_window(window),
        None => engine,
    }
}
