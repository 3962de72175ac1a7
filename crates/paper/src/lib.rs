mod account;
mod commission;
mod reader;

pub use account::CashAccount;
pub use commission::Commission;

use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use async_trait::async_trait;
use common::config::EmulatorConfig;
use common::{
    Asset, Bar, BarStream, Deal, Error, Position, Result, ShutdownSignal, TradingVenue,
};

use reader::BarReader;

/// Historical-data venue: replays per-symbol CSV files through the shared
/// venue interface against a commissioned cash account.
///
/// Fills are priced off the asset's most recent close, so no real orders and
/// no price lookups ever leave the process.
pub struct PaperVenue {
    cfg: EmulatorConfig,
    account: CashAccount,
    commission: Commission,
    positions: Mutex<HashMap<String, Position>>,
    shutdown: ShutdownSignal,
}

impl PaperVenue {
    pub fn new(cfg: EmulatorConfig, shutdown: ShutdownSignal) -> Self {
        let account = CashAccount::new(Decimal::try_from(cfg.balance).unwrap_or_default());
        let commission = if cfg.buy_commission == 0.0 && cfg.sell_commission == 0.0 {
            Commission::None
        } else {
            Commission::fixed_rate(cfg.buy_commission, cfg.sell_commission)
        };

        info!(
            balance = cfg.balance,
            buy_commission = cfg.buy_commission,
            sell_commission = cfg.sell_commission,
            symbols = cfg.data.len(),
            "emulator venue ready"
        );

        Self {
            cfg,
            account,
            commission,
            positions: Mutex::new(HashMap::new()),
            shutdown,
        }
    }
}

#[async_trait]
impl TradingVenue for PaperVenue {
    async fn prefetch(&self, _symbol: &str, _count: usize) -> Result<Vec<Bar>> {
        Err(Error::InvalidArgument(
            "prefetch is not supported by the emulator".into(),
        ))
    }

    async fn subscribe(&self, symbol: &str) -> Result<BarStream> {
        let path = self
            .cfg
            .data
            .get(symbol)
            .ok_or_else(|| Error::UnknownSymbol(symbol.to_string()))?;

        let reader = BarReader::new(path.clone(), self.cfg.start, self.cfg.end);
        Ok(reader.stream(self.shutdown.clone()))
    }

    async fn open(&self, asset: &Asset, size: Decimal) -> Result<Position> {
        let mut positions = self.positions.lock().await;
        let symbol = asset.symbol();
        if positions.contains_key(symbol) {
            return Err(Error::VenueRejected(format!(
                "position for {symbol} is already open"
            )));
        }

        let bar = asset
            .last_bar()
            .map_err(|e| e.context(format!("cannot find buy price for {symbol}")))?;

        self.account
            .withdraw(size)
            .await
            .map_err(|e| e.context("failed to withdraw funds"))?;

        let net = self.commission.on_buy(size);
        let qty = net
            .checked_div(bar.close)
            .ok_or_else(|| Error::MarketData(format!("zero close price for {symbol}")))?;

        let position = Position {
            symbol: symbol.to_string(),
            entry_price: bar.close,
            qty,
            spend: size,
            open_time: bar.time,
        };
        positions.insert(symbol.to_string(), position.clone());

        debug!(symbol, size = %size, qty = %qty, close = %bar.close, "paper position opened");
        Ok(position)
    }

    async fn close(&self, asset: &Asset, position: &Position) -> Result<Deal> {
        let mut positions = self.positions.lock().await;
        let symbol = position.symbol.as_str();
        let held = positions
            .get(symbol)
            .cloned()
            .ok_or_else(|| Error::VenueRejected(format!("no open position for {symbol}")))?;

        let bar = asset
            .last_bar()
            .map_err(|e| e.context(format!("cannot find sell price for {symbol}")))?;

        let before = held.qty * held.entry_price;
        let after = self.commission.on_sell(held.qty * bar.close);
        self.account
            .deposit(after)
            .await
            .map_err(|e| e.context("failed to deposit funds"))?;
        positions.remove(symbol);

        debug!(symbol, proceeds = %after, close = %bar.close, "paper position closed");
        Ok(Deal {
            symbol: symbol.to_string(),
            buy_time: Some(held.open_time),
            sell_time: Some(bar.time),
            buy_price: held.entry_price,
            sell_price: bar.close,
            qty: held.qty,
            spend: held.spend,
            gain: after - before,
        })
    }

    async fn balance(&self) -> Result<Decimal> {
        Ok(self.account.balance().await)
    }
}
