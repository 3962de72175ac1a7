use common::{Action, Asset, Result, Signal};

use super::Indicator;

/// Weighted linear combination of child indicator signals.
///
/// Each child contributes `action · confidence · weight`; a positive total
/// buys, a negative one sells, zero holds. The first child failure is
/// propagated unchanged.
pub struct Ensemble {
    children: Vec<(f64, Box<dyn Indicator>)>,
}

impl Ensemble {
    pub fn new(children: Vec<(f64, Box<dyn Indicator>)>) -> Self {
        Self { children }
    }
}

impl Indicator for Ensemble {
    fn signal(&self, asset: &Asset) -> Result<Signal> {
        let mut score = 0.0;
        let mut total_weight = 0.0;
        for (weight, child) in &self.children {
            let signal = child
                .signal(asset)
                .map_err(|e| e.context("ensemble child failed"))?;
            score += signal.action.weight() * signal.confidence * weight;
            total_weight += weight;
        }

        if score > 0.0 {
            return Ok(Signal::new(Action::Buy, score / total_weight));
        }
        if score < 0.0 {
            return Ok(Signal::new(Action::Sell, -score / total_weight));
        }
        Ok(Signal::hold())
    }
}
