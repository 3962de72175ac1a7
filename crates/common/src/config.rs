use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level run configuration, loaded from a YAML file.
///
/// ```yaml
/// strategies:
///     BTC/USD:
///         budget: 1000
///         buy_confidence: 0.8
///         sell_confidence: 0.7
///         take_profit: 1.05
///         stop_loss: 0.95
///         position_scale: 1
///         market_buffer: 1024
///         aggregate_bars: 15
///         indicator:
///             macd:
///                 fast: 8
///                 slow: 12
///                 signal: 10
///                 buy_threshold: 0.3
///                 buy_cap: 0.7
///                 sell_threshold: -0.3
///                 sell_cap: -0.7
///                 cross_lookback: 3
///                 ema_warmup: 2
/// report: report.json
/// platform:
///     emulator:
///         data:
///             BTC/USD: data/btcusd.csv
///         start: 2021-01-01T00:00:00Z
///         end: 2022-01-01T00:00:00Z
///         balance: 100000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub strategies: BTreeMap<String, StrategyConfig>,
    pub report: PathBuf,
    pub platform: PlatformConfig,
}

impl Config {
    pub fn read(r: impl Read) -> Result<Self> {
        serde_yaml::from_reader(r).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())
            .map_err(|e| Error::InvalidConfig(format!("unable to read config file: {e}")))?;
        Self::read(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Cash cap for this symbol, in account currency units.
    pub budget: i64,
    pub buy_confidence: f64,
    pub sell_confidence: f64,
    /// Forced-close threshold as a ratio of entry price, e.g. 1.05.
    #[serde(default)]
    pub take_profit: f64,
    /// Forced-close threshold as a ratio of entry price, e.g. 0.95.
    #[serde(default)]
    pub stop_loss: f64,
    pub position_scale: f64,
    /// Ring buffer capacity in bars.
    pub market_buffer: usize,
    /// Historical bars to feed through the indicator before going live.
    #[serde(default)]
    pub prefetch: usize,
    /// Collapse this many 1-minute bars into one strategy tick.
    #[serde(default = "default_aggregate_bars")]
    pub aggregate_bars: usize,
    /// When set, every consumed bar is appended to this CSV file.
    #[serde(default)]
    pub data_dump: Option<PathBuf>,
    /// When set, buy/sell decisions drop a debug artifact here.
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
    pub indicator: IndicatorConfig,
}

fn default_aggregate_bars() -> usize {
    1
}

/// Indicator selection. Externally tagged: the YAML key under `indicator`
/// names the variant, and an unknown key fails parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorConfig {
    Macd(MacdConfig),
    Ensemble(EnsembleConfig),
    Rsi(RsiConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub buy_threshold: f64,
    pub buy_cap: f64,
    pub sell_threshold: f64,
    pub sell_cap: f64,
    pub cross_lookback: usize,
    #[serde(default = "default_ema_warmup")]
    pub ema_warmup: usize,
}

fn default_ema_warmup() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub indicators: Vec<WeightedIndicatorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedIndicatorConfig {
    pub weight: f64,
    pub indicator: IndicatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiConfig {
    pub period: usize,
    /// Sell threshold in [0, 1]; the buy threshold is its mirror.
    pub overbought: f64,
}

/// Venue selection, externally tagged like [`IndicatorConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformConfig {
    Emulator(EmulatorConfig),
    Alpaca(AlpacaConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Symbol to CSV path.
    pub data: BTreeMap<String, PathBuf>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub buy_commission: f64,
    #[serde(default)]
    pub sell_commission: f64,
    #[serde(default)]
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret: String,
}
