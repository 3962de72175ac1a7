mod rest;
mod stream;

pub use rest::AlpacaVenue;

use common::{Error, Result};
use rust_decimal::Decimal;

pub(crate) fn decimal(value: f64) -> Result<Decimal> {
    Decimal::try_from(value).map_err(|e| Error::MarketData(format!("bad price value {value}: {e}")))
}
