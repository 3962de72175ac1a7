pub mod debug;
pub mod indicators;
pub mod validator;

pub use indicators::Indicator;
pub use validator::{PositionValidator, ThresholdValidator};

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info};

use common::config::StrategyConfig;
use common::scaler::{LinearScaler, PositionScaler};
use common::{Action, Asset, Deal, Position, Result, Signal, TradingVenue};

use debug::DebugWriter;

/// Receives every completed deal. Implemented by the run report.
pub trait DealSink: Send + Sync {
    fn submit_deal(&self, deal: Deal);
}

/// Per-symbol trading state machine.
///
/// Flat or long, never short, never more than one position. Each `run` tick
/// first lets the validator force an exit, then consults the indicator and
/// acts when its confidence clears the configured gate. Venue failures
/// propagate to the agent; the strategy itself never retries.
pub struct TradingStrategy {
    cfg: StrategyConfig,
    indicator: Box<dyn Indicator>,
    validator: Box<dyn PositionValidator>,
    scaler: Box<dyn PositionScaler>,
    venue: Arc<dyn TradingVenue>,
    report: Arc<dyn DealSink>,
    debug: Option<DebugWriter>,
    position: Option<Position>,
}

impl TradingStrategy {
    pub fn new(cfg: StrategyConfig, venue: Arc<dyn TradingVenue>, report: Arc<dyn DealSink>) -> Self {
        let indicator = indicators::build(&cfg.indicator);
        let validator = Box::new(ThresholdValidator {
            take_profit: cfg.take_profit,
            stop_loss: cfg.stop_loss,
        });
        let scaler = Box::new(LinearScaler {
            max_scale: cfg.position_scale,
        });
        Self::with_parts(cfg, indicator, validator, scaler, venue, report)
    }

    pub fn with_parts(
        cfg: StrategyConfig,
        indicator: Box<dyn Indicator>,
        validator: Box<dyn PositionValidator>,
        scaler: Box<dyn PositionScaler>,
        venue: Arc<dyn TradingVenue>,
        report: Arc<dyn DealSink>,
    ) -> Self {
        let debug = cfg.debug_dir.clone().map(DebugWriter::new);
        Self {
            cfg,
            indicator,
            validator,
            scaler,
            venue,
            report,
            debug,
            position: None,
        }
    }

    /// One-time setup before the first tick.
    pub fn init(&self) -> Result<()> {
        if let Some(debug) = &self.debug {
            debug
                .init()
                .map_err(|e| e.context("failed to prepare debug directory"))?;
        }
        Ok(())
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Process the asset's freshest bar.
    pub async fn run(&mut self, asset: &Asset) -> Result<()> {
        if let Some(position) = &self.position {
            let force_close = self
                .validator
                .needs_close(asset, position)
                .map_err(|e| e.context("failed to validate position"))?;
            if force_close {
                self.sell(asset).await?;
            }
        }

        let signal = self
            .indicator
            .signal(asset)
            .map_err(|e| e.context("failed to get signal from indicator"))?;

        if signal.action == Action::Hold {
            return Ok(());
        }

        if self.position.is_none()
            && signal.action == Action::Buy
            && signal.confidence >= self.cfg.buy_confidence
        {
            self.buy(asset, signal.confidence).await?;
            self.write_debug(asset, signal);
        }

        if self.position.is_some()
            && signal.action == Action::Sell
            && signal.confidence >= self.cfg.sell_confidence
        {
            self.sell(asset).await?;
            self.write_debug(asset, signal);
        }

        Ok(())
    }

    async fn buy(&mut self, asset: &Asset, confidence: f64) -> Result<()> {
        let funds = self.available_funds().await?;
        let size = self.scaler.size(funds, confidence);
        let position = self
            .venue
            .open(asset, size)
            .await
            .map_err(|e| e.context("failed to open position"))?;

        info!(
            symbol = asset.symbol(),
            size = %size,
            qty = %position.qty,
            entry = %position.entry_price,
            "position opened"
        );
        self.position = Some(position);
        Ok(())
    }

    async fn sell(&mut self, asset: &Asset) -> Result<()> {
        let Some(position) = self.position.take() else {
            return Ok(());
        };

        let deal = match self.venue.close(asset, &position).await {
            Ok(deal) => deal,
            Err(e) => {
                self.position = Some(position);
                return Err(e.context("failed to close position"));
            }
        };

        info!(
            symbol = asset.symbol(),
            gain = %deal.gain,
            spend = %deal.spend,
            "position closed"
        );
        self.report.submit_deal(deal);
        Ok(())
    }

    async fn available_funds(&self) -> Result<Decimal> {
        let mut available = Decimal::from(self.cfg.budget);
        if let Some(position) = &self.position {
            available = (available - position.entry_price).max(Decimal::ZERO);
        }

        let balance = self
            .venue
            .balance()
            .await
            .map_err(|e| e.context("failed to get current balance"))?;
        Ok(balance.min(available))
    }

    fn write_debug(&self, asset: &Asset, signal: Signal) {
        let Some(debug) = &self.debug else { return };
        if let Err(e) = debug.write(asset, signal) {
            error!(symbol = asset.symbol(), error = %e, "failed to write debug artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::config::{IndicatorConfig, RsiConfig};
    use common::{BarStream, Error};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    use crate::indicators::testutil::asset_with_closes;

    struct FixedIndicator(Signal);

    impl Indicator for FixedIndicator {
        fn signal(&self, _asset: &Asset) -> Result<Signal> {
            Ok(self.0)
        }
    }

    struct FixedValidator(bool);

    impl PositionValidator for FixedValidator {
        fn needs_close(&self, _asset: &Asset, _position: &Position) -> Result<bool> {
            Ok(self.0)
        }
    }

    /// Returns the whole budget regardless of confidence.
    struct BudgetScaler;

    impl PositionScaler for BudgetScaler {
        fn size(&self, budget: Decimal, _confidence: f64) -> Decimal {
            budget
        }
    }

    #[derive(Default)]
    struct MockVenue {
        balance: Decimal,
        open_positions: Mutex<usize>,
        last_open_size: Mutex<Option<Decimal>>,
    }

    #[async_trait]
    impl TradingVenue for MockVenue {
        async fn prefetch(&self, _symbol: &str, _count: usize) -> Result<Vec<common::Bar>> {
            Err(Error::InvalidArgument("prefetch is not supported".into()))
        }

        async fn subscribe(&self, _symbol: &str) -> Result<BarStream> {
            Err(Error::InvalidArgument("subscribe is not supported".into()))
        }

        async fn open(&self, asset: &Asset, size: Decimal) -> Result<Position> {
            *self.open_positions.lock().unwrap() += 1;
            *self.last_open_size.lock().unwrap() = Some(size);
            Ok(Position {
                symbol: asset.symbol().to_string(),
                entry_price: size,
                qty: size,
                spend: size,
                open_time: Default::default(),
            })
        }

        async fn close(&self, _asset: &Asset, position: &Position) -> Result<Deal> {
            *self.open_positions.lock().unwrap() -= 1;
            Ok(Deal {
                symbol: position.symbol.clone(),
                spend: position.spend,
                ..Default::default()
            })
        }

        async fn balance(&self) -> Result<Decimal> {
            Ok(self.balance)
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<Deal>>);

    impl DealSink for RecordingSink {
        fn submit_deal(&self, deal: Deal) {
            self.0.lock().unwrap().push(deal);
        }
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            budget: 1000,
            buy_confidence: 0.5,
            sell_confidence: 0.5,
            take_profit: 1.1,
            stop_loss: 0.9,
            position_scale: 1.0,
            market_buffer: 8,
            prefetch: 0,
            aggregate_bars: 1,
            data_dump: None,
            debug_dir: None,
            indicator: IndicatorConfig::Rsi(RsiConfig {
                period: 14,
                overbought: 0.7,
            }),
        }
    }

    fn strategy(
        venue: Arc<MockVenue>,
        sink: Arc<RecordingSink>,
        signal: Signal,
        needs_close: bool,
    ) -> TradingStrategy {
        TradingStrategy::with_parts(
            config(),
            Box::new(FixedIndicator(signal)),
            Box::new(FixedValidator(needs_close)),
            Box::new(BudgetScaler),
            venue,
            sink,
        )
    }

    fn open_position() -> Position {
        Position {
            symbol: "sym".into(),
            entry_price: dec!(100),
            qty: dec!(1),
            spend: dec!(100),
            open_time: Default::default(),
        }
    }

    #[tokio::test]
    async fn confidence_gates_and_state_transitions() {
        use Action::*;

        // (action, confidence, starts long, expected open positions after)
        let cases = [
            (Hold, 1.0, false, 0),
            (Buy, 0.4, false, 0),
            (Buy, 0.6, false, 1),
            (Sell, 0.4, false, 0),
            (Sell, 0.6, false, 0),
            (Sell, 0.6, true, 0),
            (Sell, 0.4, true, 1),
        ];

        for (action, confidence, starts_long, expected) in cases {
            let venue = Arc::new(MockVenue {
                balance: dec!(1000),
                ..Default::default()
            });
            let sink = Arc::new(RecordingSink::default());
            let mut s = strategy(
                venue.clone(),
                sink.clone(),
                Signal::new(action, confidence),
                false,
            );
            if starts_long {
                *venue.open_positions.lock().unwrap() = 1;
                s.position = Some(open_position());
            }

            let asset = asset_with_closes(&[100.0]);
            s.run(&asset).await.unwrap();

            assert_eq!(
                *venue.open_positions.lock().unwrap(),
                expected,
                "{action:?} @ {confidence}, long={starts_long}"
            );
        }
    }

    #[tokio::test]
    async fn validator_forces_close_before_signal() {
        let venue = Arc::new(MockVenue {
            balance: dec!(1000),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let mut s = strategy(venue.clone(), sink.clone(), Signal::hold(), true);
        *venue.open_positions.lock().unwrap() = 1;
        s.position = Some(open_position());

        let asset = asset_with_closes(&[100.0]);
        s.run(&asset).await.unwrap();

        assert_eq!(*venue.open_positions.lock().unwrap(), 0);
        assert!(s.position().is_none());
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn buy_sizes_order_from_available_funds() {
        let venue = Arc::new(MockVenue {
            balance: dec!(10000),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let mut s = strategy(
            venue.clone(),
            sink,
            Signal::new(Action::Buy, 0.6),
            false,
        );

        let asset = asset_with_closes(&[100.0]);
        s.run(&asset).await.unwrap();

        // BudgetScaler passes the available funds through: min(10000, 1000).
        assert_eq!(venue.last_open_size.lock().unwrap().unwrap(), dec!(1000));
        assert!(s.position().is_some());
    }

    #[tokio::test]
    async fn available_funds_table() {
        // (budget, balance, entry price of open position, expected)
        let cases = [
            (1000, 10000, Some(100), 900),
            (1000, 10000, None, 1000),
            (1000, 500, Some(200), 500),
            (1000, 10000, Some(2000), 0),
            (10000, 0, Some(2000), 0),
            (10000, 0, None, 0),
        ];

        for (budget, balance, entry, expected) in cases {
            let venue = Arc::new(MockVenue {
                balance: Decimal::from(balance),
                ..Default::default()
            });
            let sink = Arc::new(RecordingSink::default());
            let mut cfg = config();
            cfg.budget = budget;
            let mut s = TradingStrategy::with_parts(
                cfg,
                Box::new(FixedIndicator(Signal::hold())),
                Box::new(FixedValidator(false)),
                Box::new(BudgetScaler),
                venue,
                sink,
            );
            if let Some(entry) = entry {
                let mut p = open_position();
                p.entry_price = Decimal::from(entry);
                s.position = Some(p);
            }

            assert_eq!(
                s.available_funds().await.unwrap(),
                Decimal::from(expected),
                "budget={budget} balance={balance} entry={entry:?}"
            );
        }
    }

    #[tokio::test]
    async fn deal_reaches_sink_on_sell() {
        let venue = Arc::new(MockVenue {
            balance: dec!(1000),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let mut s = strategy(
            venue.clone(),
            sink.clone(),
            Signal::new(Action::Sell, 0.9),
            false,
        );
        *venue.open_positions.lock().unwrap() = 1;
        s.position = Some(open_position());

        let asset = asset_with_closes(&[100.0]);
        s.run(&asset).await.unwrap();

        let deals = sink.0.lock().unwrap();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].spend, dec!(100));
        assert!(s.position.is_none());
    }
}
