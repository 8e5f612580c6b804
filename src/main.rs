use clap::{Parser, Subcommand};
use dhs_ethiopia_map::{config, data, render::MapStyle, server, AppState};
use std::path::PathBuf;
use dhs_ethiopia_map::types::CombinedTable;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, join and serve the dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Fetch, join and write the combined table as CSV
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "CSV", default_value = "combined.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // Blocks startup until both sources are in
            let table = load_or_report(&app_config).await?;
            let state = AppState::new(table, MapStyle::from_config(&app_config.map));

            server::start_server(&app_config, state).await?;
        }
        Commands::Export { config, output } => {
            info!("Exporting combined table with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let table = load_or_report(&app_config).await?;
            data::export_csv(&table, output)?;

            info!("Export complete!");
        }
    }

    Ok(())
}

async fn load_or_report(app_config: &config::AppConfig) -> anyhow::Result<CombinedTable> {
    match data::load_data(app_config).await {
        Ok(table) => Ok(table),
        Err(e) => {
            if e.is_fetch_failure() {
                error!("Data source unreachable: {}", e);
            } else {
                error!("Data source returned unusable data: {}", e);
            }
            Err(e.into())
        }
    }
}
