use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::{Asset, Bar, Deal, Error, Position, Result};

/// A live feed of bars for one symbol.
///
/// The producer closes `bars` when the feed ends; stream-level failures
/// arrive on `errors`. Both channels honor the run's cancellation.
pub struct BarStream {
    pub bars: mpsc::Receiver<Bar>,
    pub errors: mpsc::Receiver<Error>,
}

/// Abstraction over the trading venue.
///
/// `AlpacaVenue` implements this against the live broker; `PaperVenue`
/// replays historical data against a synthetic account. The agent is the
/// only component that drives bar subscriptions; the strategy drives
/// `open`/`close`/`balance`.
#[async_trait]
pub trait TradingVenue: Send + Sync {
    /// The last `count` historical 1-minute bars, oldest first. Used to warm
    /// up indicator windows before the live feed starts.
    async fn prefetch(&self, symbol: &str, count: usize) -> Result<Vec<Bar>>;

    /// Subscribe to the live bar feed for `symbol`.
    async fn subscribe(&self, symbol: &str) -> Result<BarStream>;

    /// Open a long position worth `size`, priced off the asset's last bar.
    /// Fails with `VenueRejected` if a position is already open for the
    /// symbol or funds are insufficient.
    async fn open(&self, asset: &Asset, size: Decimal) -> Result<Position>;

    /// Close the position in full and report the completed deal.
    async fn close(&self, asset: &Asset, position: &Position) -> Result<Deal>;

    /// Cash currently available for opening positions.
    async fn balance(&self) -> Result<Decimal>;
}
