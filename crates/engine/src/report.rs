use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use common::{Deal, Error, Result};
use strategy::DealSink;

/// Thread-safe accumulator of closed deals, serialized to JSON at the end
/// of a run.
///
/// `total_gain` only appears when the cumulative figure is positive; losses
/// surface through the per-deal `gain` strings and the percent fields. An
/// empty report serializes as `{}`.
#[derive(Default)]
pub struct Report {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    deals: BTreeMap<String, Vec<JsonDeal>>,
    spent: Decimal,
    gained: Decimal,
}

#[derive(Debug, Clone, Serialize)]
struct JsonDeal {
    #[serde(skip_serializing_if = "Option::is_none")]
    buy_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sell_time: Option<DateTime<Utc>>,
    spend: String,
    gain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gain_pct: Option<f64>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    total_gain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_gain_pct: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    deals: &'a BTreeMap<String, Vec<JsonDeal>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, mut w: impl Write) -> Result<()> {
        let inner = self.inner.lock().unwrap();

        let total_pct = ratio(inner.gained, inner.spent);
        let report = JsonReport {
            total_gain: (inner.gained > Decimal::ZERO).then(|| inner.gained.to_string()),
            total_gain_pct: (total_pct != 0.0).then_some(total_pct),
            deals: &inner.deals,
        };

        serde_json::to_writer(&mut w, &report)
            .map_err(|e| Error::Io(std::io::Error::other(e)))
            .map_err(|e| e.context("failed to write trading report"))?;
        w.write_all(b"\n")?;
        Ok(())
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let f = std::fs::File::create(path)
            .map_err(|e| Error::Io(e).context("failed to create report file"))?;
        self.write(f)
    }
}

impl DealSink for Report {
    fn submit_deal(&self, deal: Deal) {
        let mut inner = self.inner.lock().unwrap();

        let deal_pct = ratio(deal.gain, deal.spend);
        inner.spent += deal.spend;
        inner.gained += deal.gain;
        let total_pct = ratio(inner.gained, inner.spent);

        inner
            .deals
            .entry(deal.symbol.clone())
            .or_default()
            .push(JsonDeal {
                buy_time: deal.buy_time,
                sell_time: deal.sell_time,
                spend: deal.spend.to_string(),
                gain: deal.gain.to_string(),
                gain_pct: (deal_pct != 0.0).then_some(deal_pct),
            });

        info!(
            symbol = %deal.symbol,
            gain_pct = deal_pct,
            total_gain_pct = total_pct,
            buy_time = ?deal.buy_time,
            sell_time = ?deal.sell_time,
            "deal closed"
        );
    }
}

/// `gain / spend` as a float, 0.0 when nothing was spent.
fn ratio(gain: Decimal, spend: Decimal) -> f64 {
    if spend.is_zero() {
        return 0.0;
    }
    (gain / spend).to_f64().unwrap_or_default()
}
