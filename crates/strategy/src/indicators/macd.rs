use common::config::MacdConfig;
use common::{Action, Asset, Bar, Result, Signal};
use rust_decimal::prelude::ToPrimitive;

use super::{ema, has_crossover, Indicator};

/// Moving Average Convergence/Divergence.
///
/// The traded series is `(fast EMA − slow EMA) − signal EMA` over the close
/// prices of the last `ema_warmup · max(fast, slow, signal)` bars. A buy
/// needs the last value above `buy_threshold` plus a zero crossing within
/// `cross_lookback` samples; sells mirror it below `sell_threshold`.
/// Confidence interpolates between threshold and cap, clamped to [0, 1].
pub struct Macd {
    cfg: MacdConfig,
}

impl Macd {
    pub fn new(cfg: MacdConfig) -> Self {
        Self { cfg }
    }

    fn window(&self) -> usize {
        self.cfg.ema_warmup * self.cfg.fast.max(self.cfg.slow).max(self.cfg.signal)
    }
}

impl Indicator for Macd {
    fn signal(&self, asset: &Asset) -> Result<Signal> {
        let count = self.window();
        if count == 0 || !asset.has_bars(count) {
            return Ok(Signal::hold());
        }

        let bars = asset.bars(count)?;
        let macd = macd_series(&bars, self.cfg.fast, self.cfg.slow, self.cfg.signal);
        let last = macd[count - 1];

        if last > self.cfg.buy_threshold && has_crossover(&macd, self.cfg.cross_lookback) {
            let confidence =
                (last - self.cfg.buy_threshold) / (self.cfg.buy_cap - self.cfg.buy_threshold);
            return Ok(Signal::new(Action::Buy, confidence.clamp(0.0, 1.0)));
        }

        if last < self.cfg.sell_threshold && has_crossover(&macd, self.cfg.cross_lookback) {
            let confidence =
                (last - self.cfg.sell_threshold) / (self.cfg.sell_cap - self.cfg.sell_threshold);
            return Ok(Signal::new(Action::Sell, confidence.clamp(0.0, 1.0)));
        }

        Ok(Signal::hold())
    }
}

fn macd_series(bars: &[Bar], fast: usize, slow: usize, signal: usize) -> Vec<f64> {
    let prices: Vec<f64> = bars
        .iter()
        .map(|b| b.close.to_f64().unwrap_or_default())
        .collect();

    let fast_ema = ema(&prices, fast);
    let slow_ema = ema(&prices, slow);
    let diff: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();

    let signal_ema = ema(&diff, signal);
    diff.iter().zip(&signal_ema).map(|(d, s)| d - s).collect()
}
