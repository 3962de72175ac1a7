use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV candle. Immutable once emitted by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// An open long commitment on one symbol. At most one exists per symbol
/// at any time; created by `TradingVenue::open`, consumed by `close`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    /// Fill price per unit.
    pub entry_price: Decimal,
    pub qty: Decimal,
    /// Gross cash committed when the position was opened.
    pub spend: Decimal,
    pub open_time: DateTime<Utc>,
}

/// A completed open-then-close cycle with realized gain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deal {
    pub symbol: String,
    pub buy_time: Option<DateTime<Utc>>,
    pub sell_time: Option<DateTime<Utc>>,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub qty: Decimal,
    pub spend: Decimal,
    pub gain: Decimal,
}

/// Trading instruction emitted by an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Hold,
    Sell,
}

impl Action {
    /// Numeric encoding used by the ensemble score: +1 / 0 / -1.
    pub fn weight(self) -> f64 {
        match self {
            Action::Buy => 1.0,
            Action::Hold => 0.0,
            Action::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Hold => write!(f, "hold"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

/// An action paired with a confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub action: Action,
    pub confidence: f64,
}

impl Signal {
    pub fn new(action: Action, confidence: f64) -> Self {
        Self { action, confidence }
    }

    /// Hold always carries full confidence.
    pub fn hold() -> Self {
        Self::new(Action::Hold, 1.0)
    }
}
