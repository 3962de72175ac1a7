use rust_decimal::Decimal;

/// Maps available budget and signal confidence to an order notional.
pub trait PositionScaler: Send + Sync {
    fn size(&self, budget: Decimal, confidence: f64) -> Decimal;
}

/// Fixed order size, capped by the available budget.
pub struct ConstScaler {
    pub size: Decimal,
}

impl PositionScaler for ConstScaler {
    fn size(&self, budget: Decimal, _confidence: f64) -> Decimal {
        budget.min(self.size)
    }
}

/// Scales the budget linearly with confidence.
pub struct LinearScaler {
    pub max_scale: f64,
}

impl PositionScaler for LinearScaler {
    fn size(&self, budget: Decimal, confidence: f64) -> Decimal {
        budget * Decimal::try_from(confidence * self.max_scale).unwrap_or_default()
    }
}
