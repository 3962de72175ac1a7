pub mod agent;
pub mod alpaca;
pub mod dump;
pub mod report;

pub use agent::TradingAgent;
pub use alpaca::AlpacaVenue;
pub use dump::BarsDump;
pub use report::Report;
