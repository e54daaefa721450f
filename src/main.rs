use anyhow::{Context, Result};
use clap::Parser;
use field_imagery::{logging, read_field_locations, Cli, FieldMonitor, MonitorConfig, S3Store};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match MonitorConfig::resolve(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init_logging(&config.log_file) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("During get_images: {:#}", e);
    }
}

async fn run(config: MonitorConfig) -> Result<()> {
    let locations = read_field_locations(&config.input)
        .with_context(|| format!("Failed to read field locations from {:?}", config.input))?;
    info!(
        count = locations.len(),
        input = ?config.input,
        date = %config.date,
        "Loaded field locations"
    );

    let store = S3Store::from_config(&config.storage).await;
    let monitor =
        FieldMonitor::from_config(&config, store).context("Failed to build imagery client")?;

    let Some(run) = monitor.run(config.date, &locations).await else {
        return Ok(());
    };

    if let Some(path) = &config.summary_file {
        run.summary
            .write(path)
            .with_context(|| format!("Failed to write batch summary to {:?}", path))?;
        info!(path = ?path, "Wrote batch summary");
    }

    Ok(())
}
