use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::config::PlatformConfig;
use common::{Config, Error, Result, ShutdownSignal, TradingVenue};
use engine::{AlpacaVenue, Report, TradingAgent};
use paper::PaperVenue;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("CONFIG")
        .map_err(|_| Error::InvalidConfig("CONFIG environment variable is not set".into()))?;
    let cfg = Config::read_from_file(&config_path)?;

    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.trigger();
            }
        });
    }

    let venue: Arc<dyn TradingVenue> = match &cfg.platform {
        PlatformConfig::Emulator(emulator) => {
            Arc::new(PaperVenue::new(emulator.clone(), shutdown.clone()))
        }
        PlatformConfig::Alpaca(alpaca) => {
            Arc::new(AlpacaVenue::connect(alpaca.clone(), shutdown.clone()).await?)
        }
    };

    info!(config = %config_path, report = %cfg.report.display(), "talonbot starting");
    let agent = TradingAgent::new(cfg, venue, Arc::new(Report::new()), shutdown);
    agent.run().await
}
