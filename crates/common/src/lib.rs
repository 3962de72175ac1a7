pub mod aggregator;
pub mod asset;
pub mod config;
pub mod error;
pub mod scaler;
pub mod shutdown;
pub mod types;
pub mod venue;

pub use asset::Asset;
pub use config::Config;
pub use error::{Error, Result};
pub use shutdown::ShutdownSignal;
pub use types::*;
pub use venue::{BarStream, TradingVenue};
