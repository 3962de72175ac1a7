use rust_decimal::Decimal;

/// Trading fee model applied by the emulator.
#[derive(Debug, Clone)]
pub enum Commission {
    /// No fees; sums pass through unchanged.
    None,
    /// Percentage fee per side, stored as the retained factor `1 − pct`.
    FixedRate { buy: Decimal, sell: Decimal },
}

impl Commission {
    pub fn fixed_rate(buy_pct: f64, sell_pct: f64) -> Self {
        Commission::FixedRate {
            buy: Decimal::try_from(1.0 - buy_pct).unwrap_or(Decimal::ONE),
            sell: Decimal::try_from(1.0 - sell_pct).unwrap_or(Decimal::ONE),
        }
    }

    pub fn on_buy(&self, sum: Decimal) -> Decimal {
        match self {
            Commission::None => sum,
            Commission::FixedRate { buy, .. } => sum * buy,
        }
    }

    pub fn on_sell(&self, sum: Decimal) -> Decimal {
        match self {
            Commission::None => sum,
            Commission::FixedRate { sell, .. } => sum * sell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fixed_rate_retains_remainder() {
        let c = Commission::fixed_rate(0.002, 0.0015);
        assert_eq!(c.on_buy(dec!(1000)), dec!(998));
        assert_eq!(c.on_sell(dec!(1000)), dec!(998.5));
    }

    #[test]
    fn none_passes_through() {
        let c = Commission::None;
        assert_eq!(c.on_buy(dec!(123.45)), dec!(123.45));
        assert_eq!(c.on_sell(dec!(123.45)), dec!(123.45));
    }
}
