use common::config::RsiConfig;
use common::{Action, Asset, Result, Signal};
use rust_decimal::prelude::ToPrimitive;

use super::Indicator;

/// Relative Strength Index on Wilder's smoothing, mapped into [0, 1].
///
/// Needs `period + 1` bars before it stops holding. The initial averages
/// cover the first `period` close-to-close changes; older history in the
/// window is folded in with `(avg·(n−1) + x)/n`. A window with no movement
/// at all reads as 0.5.
pub struct Rsi {
    cfg: RsiConfig,
}

impl Rsi {
    pub fn new(cfg: RsiConfig) -> Self {
        Self { cfg }
    }
}

impl Indicator for Rsi {
    fn signal(&self, asset: &Asset) -> Result<Signal> {
        if self.cfg.period == 0 || !asset.has_bars(self.cfg.period + 1) {
            return Ok(Signal::hold());
        }

        let bars = asset.bars(asset.len())?;
        let closes: Vec<f64> = bars
            .iter()
            .map(|b| b.close.to_f64().unwrap_or_default())
            .collect();

        let last = last_rsi(&closes, self.cfg.period);
        if last >= self.cfg.overbought {
            return Ok(Signal::new(Action::Sell, last));
        }
        if last <= 1.0 - self.cfg.overbought {
            return Ok(Signal::new(Action::Buy, 1.0 - last));
        }

        Ok(Signal::hold())
    }
}

fn last_rsi(closes: &[f64], period: usize) -> f64 {
    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let n = period as f64;

    let initial = &changes[..period];
    let mut avg_gain = initial.iter().filter(|c| **c > 0.0).sum::<f64>() / n;
    let mut avg_loss = initial.iter().filter(|c| **c < 0.0).map(|c| -c).sum::<f64>() / n;

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
    }

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return 0.5;
        }
        return 1.0;
    }

    let rs = avg_gain / avg_loss;
    rs / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::asset_with_closes;
    use super::*;

    fn rsi(period: usize, overbought: f64) -> Rsi {
        Rsi::new(RsiConfig { period, overbought })
    }

    #[test]
    fn signal_table() {
        let cases: &[(&[f64], usize, f64, Action, f64)] = &[
            // Not enough bars yet.
            (&[10.0, 10.5, 10.2], 5, 0.7, Action::Hold, 1.0),
            // No movement reads as the midpoint.
            (&[5.0, 5.0, 5.0, 5.0, 5.0], 4, 0.7, Action::Hold, 1.0),
            // Straight run-ups pin the index to 1.
            (&[1.0, 2.0, 3.0, 4.0, 5.0], 4, 0.8, Action::Sell, 1.0),
            (&[5.0, 4.0, 3.0, 2.0, 1.0], 4, 0.8, Action::Buy, 1.0),
            (&[1.0, 2.0, 3.0, 2.0, 1.0, 2.0], 5, 0.59, Action::Sell, 0.6),
            (&[1.0, 2.0, 3.0, 2.0, 1.0, 2.0], 5, 0.7, Action::Hold, 1.0),
            // History beyond the initial window goes through smoothing.
            (
                &[1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 4.0],
                3,
                0.8,
                Action::Sell,
                0.8353909465020577,
            ),
        ];

        for (closes, period, overbought, action, confidence) in cases {
            let asset = asset_with_closes(closes);
            let s = rsi(*period, *overbought).signal(&asset).unwrap();
            assert_eq!(s.action, *action, "closes {closes:?}");
            assert!(
                (s.confidence - confidence).abs() < 1e-9,
                "closes {closes:?}: expected {confidence}, got {}",
                s.confidence
            );
        }
    }

    #[test]
    fn wilder_smoothing_reference_value() {
        let closes = [44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15];
        let value = last_rsi(&closes, 3);
        assert!((value - 0.8127684787438895).abs() < 1e-9, "got {value}");
    }
}
