use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use common::aggregator::Aggregator;
use common::config::StrategyConfig;
use common::{Asset, Config, Error, Result, ShutdownSignal, TradingVenue};
use strategy::TradingStrategy;

use crate::dump::BarsDump;
use crate::report::Report;

/// Runs one independent worker per configured symbol and joins their
/// outcomes.
///
/// Workers share nothing but the venue and the report. The first worker
/// failure trips the shutdown signal so the rest wind down; all failures
/// are joined into one aggregate error. The report is flushed only when no
/// worker failed; a run cancelled from the outside still flushes.
pub struct TradingAgent {
    cfg: Config,
    venue: Arc<dyn TradingVenue>,
    report: Arc<Report>,
    shutdown: ShutdownSignal,
}

impl TradingAgent {
    pub fn new(
        cfg: Config,
        venue: Arc<dyn TradingVenue>,
        report: Arc<Report>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            cfg,
            venue,
            report,
            shutdown,
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!(symbols = self.cfg.strategies.len(), "starting agent");

        let mut workers = JoinSet::new();
        for (symbol, cfg) in &self.cfg.strategies {
            workers.spawn(run_worker(
                symbol.clone(),
                cfg.clone(),
                self.venue.clone(),
                self.report.clone(),
                self.shutdown.clone(),
            ));
        }

        let mut failures = Vec::new();
        while let Some(joined) = workers.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                // Caller-initiated cancellation is a clean outcome; a
                // failure elsewhere is already recorded by its worker.
                Ok(Err(Error::Cancelled)) => continue,
                Ok(Err(e)) => e,
                Err(join_err) => Error::Io(std::io::Error::other(join_err)),
            };
            warn!(error = %failure, "worker failed");
            self.shutdown.trigger();
            failures.push(failure);
        }

        if !failures.is_empty() {
            return Err(Error::aggregate(failures));
        }

        self.report
            .write_to_file(&self.cfg.report)
            .map_err(|e| e.context("failed to save report"))?;
        Ok(())
    }
}

async fn run_worker(
    symbol: String,
    cfg: StrategyConfig,
    venue: Arc<dyn TradingVenue>,
    report: Arc<Report>,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let mut asset = Asset::new(&symbol, cfg.market_buffer);
    let mut dump = BarsDump::create(cfg.data_dump.as_deref())
        .map_err(|e| e.context(format!("failed to create bars dump for {symbol}")))?;
    let mut aggregator = Aggregator::for_bar_count(cfg.aggregate_bars);

    let mut strategy = TradingStrategy::new(cfg.clone(), venue.clone(), report);
    strategy
        .init()
        .map_err(|e| e.context(format!("failed to initialize strategy for {symbol}")))?;

    if cfg.prefetch > 0 {
        let history = venue
            .prefetch(&symbol, cfg.prefetch)
            .await
            .map_err(|e| e.context(format!("failed to prefetch bars for {symbol}")))?;
        for bar in history {
            if shutdown.is_triggered() {
                return Err(Error::Cancelled);
            }
            if let Some(bar) = aggregator.push(bar) {
                asset.receive(bar);
            }
        }
        info!(%symbol, bars = asset.len(), "prefetch complete");
    }

    let mut stream = venue
        .subscribe(&symbol)
        .await
        .map_err(|e| e.context(format!("failed to subscribe to bars for {symbol}")))?;

    let mut errors_open = true;
    loop {
        tokio::select! {
            // Cancellation and stream failures take precedence over data.
            biased;

            _ = shutdown.cancelled() => return Err(Error::Cancelled),

            err = stream.errors.recv(), if errors_open => {
                match err {
                    Some(e) => return Err(e.context(format!("error reading bars for {symbol}"))),
                    None => errors_open = false,
                }
            }

            bar = stream.bars.recv() => {
                let Some(bar) = bar else { return Ok(()) };
                let Some(bar) = aggregator.push(bar) else { continue };

                dump.dump(&bar)
                    .map_err(|e| e.context(format!("failed to dump bar for {symbol}")))?;
                asset.receive(bar);
                strategy
                    .run(&asset)
                    .await
                    .map_err(|e| e.context(format!("failed to run strategy for {symbol}")))?;
            }
        }
    }
}
