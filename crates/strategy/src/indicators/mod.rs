pub mod ensemble;
pub mod macd;
pub mod rsi;

pub use ensemble::Ensemble;
pub use macd::Macd;
pub use rsi::Rsi;

use common::config::IndicatorConfig;
use common::{Asset, Result, Signal};

/// A pure signal source over the asset's bar window.
///
/// Indicators never mutate state and never fail on underfilled windows:
/// they answer `{Hold, 1.0}` until enough bars have arrived.
pub trait Indicator: Send + Sync {
    fn signal(&self, asset: &Asset) -> Result<Signal>;
}

/// Build the indicator tree described by the configuration.
pub fn build(cfg: &IndicatorConfig) -> Box<dyn Indicator> {
    match cfg {
        IndicatorConfig::Macd(c) => Box::new(Macd::new(c.clone())),
        IndicatorConfig::Rsi(c) => Box::new(Rsi::new(c.clone())),
        IndicatorConfig::Ensemble(c) => Box::new(Ensemble::new(
            c.indicators
                .iter()
                .map(|w| (w.weight, build(&w.indicator)))
                .collect(),
        )),
    }
}

/// Exponential moving average with seed `data[0]` and alpha `2 / (p + 1)`.
/// Requires at least `period` samples.
pub(crate) fn ema(data: &[f64], period: usize) -> Vec<f64> {
    assert!(
        data.len() >= period && period > 0,
        "not enough data to compute ema"
    );

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(data.len());
    out.push(data[0]);
    for (i, value) in data.iter().enumerate().skip(1) {
        out.push(value * alpha + out[i - 1] * (1.0 - alpha));
    }
    out
}

/// True when any of the last `lookback` adjacent pairs crosses zero with a
/// strict sign change.
pub(crate) fn has_crossover(series: &[f64], lookback: usize) -> bool {
    let len = series.len();
    if len < 2 {
        return false;
    }

    let n = lookback.min(len - 1);
    (1..=n).any(|i| {
        let next = series[len - i];
        let prev = series[len - i - 1];
        (prev < 0.0 && next > 0.0) || (prev > 0.0 && next < 0.0)
    })
}
