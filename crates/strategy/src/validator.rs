use common::{Asset, Error, Position, Result};
use rust_decimal::prelude::ToPrimitive;

/// Decides whether an open position must be force-closed.
pub trait PositionValidator: Send + Sync {
    fn needs_close(&self, asset: &Asset, position: &Position) -> Result<bool>;
}

/// Closes once the price ratio to entry crosses either threshold, e.g.
/// `take_profit: 1.05, stop_loss: 0.95`.
pub struct ThresholdValidator {
    pub take_profit: f64,
    pub stop_loss: f64,
}

impl PositionValidator for ThresholdValidator {
    fn needs_close(&self, asset: &Asset, position: &Position) -> Result<bool> {
        let bar = asset
            .last_bar()
            .map_err(|e| e.context(format!("no price for {}", asset.symbol())))?;

        let pct = bar
            .close
            .checked_div(position.entry_price)
            .ok_or_else(|| Error::InvalidArgument("position entry price is zero".into()))?
            .to_f64()
            .unwrap_or_default();

        Ok(pct >= self.take_profit || pct <= self.stop_loss)
    }
}
