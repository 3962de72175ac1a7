use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::config::AlpacaConfig;
use common::{
    Asset, Bar, BarStream, Deal, Error, Position, Result, ShutdownSignal, TradingVenue,
};

use super::decimal;
use super::stream::MarketStream;

const DATA_URL: &str = "https://data.alpaca.markets";

const FILL_POLL_PERIOD: Duration = Duration::from_secs(1);
const FILL_WAIT_CAP: Duration = Duration::from_secs(5);

/// Live venue backed by the Alpaca trading and market-data APIs.
pub struct AlpacaVenue {
    cfg: AlpacaConfig,
    http: Client,
    shutdown: ShutdownSignal,
}

impl AlpacaVenue {
    /// Connect and reset broker state: outstanding orders are cancelled and
    /// pre-existing positions closed before any strategy runs.
    pub async fn connect(cfg: AlpacaConfig, shutdown: ShutdownSignal) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let venue = Self {
            cfg,
            http,
            shutdown,
        };
        venue
            .close_all_positions()
            .await
            .map_err(|e| e.context("failed to close active positions"))?;
        Ok(venue)
    }

    async fn close_all_positions(&self) -> Result<()> {
        let url = format!("{}/v2/positions", self.cfg.base_url);
        self.send(self.http.delete(&url).query(&[("cancel_orders", "true")]))
            .await?;
        Ok(())
    }

    async fn get_order(&self, id: &str) -> Result<Order> {
        let url = format!("{}/v2/orders/{id}", self.cfg.base_url);
        let body = self.send(self.http.get(&url)).await?;
        parse(&body)
    }

    /// Poll until the broker reports a fill time, once per second with a
    /// five-second cap, honoring cancellation.
    async fn wait_fill(&self, order: Order) -> Result<Order> {
        if order.filled_at.is_some() {
            return Ok(order);
        }

        let poll = async {
            let start = tokio::time::Instant::now() + FILL_POLL_PERIOD;
            let mut ticker = tokio::time::interval_at(start, FILL_POLL_PERIOD);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Err(Error::Cancelled),
                    _ = ticker.tick() => {
                        let order = self
                            .get_order(&order.id)
                            .await
                            .map_err(|e| e.context("failed to update order state"))?;
                        if order.filled_at.is_some() {
                            return Ok(order);
                        }
                    }
                }
            }
        };

        tokio::time::timeout(FILL_WAIT_CAP, poll)
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<String> {
        let resp = req
            .header("APCA-API-KEY-ID", &self.cfg.api_key)
            .header("APCA-API-SECRET-KEY", &self.cfg.secret)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(Error::VenueRejected(body));
        }
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl TradingVenue for AlpacaVenue {
    async fn prefetch(&self, symbol: &str, count: usize) -> Result<Vec<Bar>> {
        let start = Utc::now() - chrono::Duration::minutes(count as i64 + 1);
        let url = format!("{DATA_URL}/v1beta3/crypto/us/bars");
        let body = self
            .send(self.http.get(&url).query(&[
                ("symbols", symbol),
                ("timeframe", "1Min"),
                ("start", &start.to_rfc3339()),
                ("limit", &(count + 1).to_string()),
            ]))
            .await
            .map_err(|e| e.context(format!("failed to fetch historical data for {symbol}")))?;

        let resp: CryptoBarsResponse = parse(&body)?;
        let bars = resp.bars.get(symbol).cloned().unwrap_or_default();
        if bars.len() < count {
            return Err(Error::MarketData(format!(
                "received {} of {count} requested bars for {symbol}",
                bars.len()
            )));
        }

        bars[bars.len() - count..]
            .iter()
            .map(ApiBar::to_bar)
            .collect()
    }

    async fn subscribe(&self, symbol: &str) -> Result<BarStream> {
        Ok(MarketStream::new(
            symbol,
            &self.cfg.api_key,
            &self.cfg.secret,
            self.shutdown.clone(),
        )
        .open())
    }

    async fn open(&self, asset: &Asset, size: Decimal) -> Result<Position> {
        let bar = asset
            .last_bar()
            .map_err(|e| e.context("failed to get symbol price"))?;
        let qty = size
            .checked_div(bar.close)
            .ok_or_else(|| Error::MarketData(format!("zero close price for {}", asset.symbol())))?;

        info!(symbol = asset.symbol(), qty = %qty, size = %size, "placing buy order");
        let url = format!("{}/v2/orders", self.cfg.base_url);
        let body = self
            .send(self.http.post(&url).json(&OrderRequest {
                symbol: asset.symbol(),
                qty: qty.to_string(),
                side: "buy",
                order_type: "market",
                time_in_force: "ioc",
            }))
            .await
            .map_err(|e| e.context("failed to place order"))?;

        let order = self
            .wait_fill(parse(&body)?)
            .await
            .map_err(|e| e.context("failed to fill order"))?;
        let fill = order.fill()?;

        Ok(Position {
            symbol: asset.symbol().to_string(),
            entry_price: fill.price,
            qty: fill.qty,
            spend: fill.qty * fill.price,
            open_time: fill.time,
        })
    }

    async fn close(&self, _asset: &Asset, position: &Position) -> Result<Deal> {
        // The close endpoint wants the symbol without punctuation even
        // though orders are placed with it (BTC/USD buys, BTCUSD sells).
        let broker_symbol = position.symbol.replace('/', "");
        debug!(symbol = %position.symbol, %broker_symbol, "closing position");

        let url = format!("{}/v2/positions/{broker_symbol}", self.cfg.base_url);
        let body = self
            .send(self.http.delete(&url).query(&[("percentage", "100")]))
            .await
            .map_err(|e| e.context("failed to close position"))?;

        let order = self
            .wait_fill(parse(&body)?)
            .await
            .map_err(|e| e.context("failed to fill order"))?;
        let fill = order.fill()?;

        Ok(Deal {
            symbol: position.symbol.clone(),
            buy_time: Some(position.open_time),
            sell_time: Some(fill.time),
            buy_price: position.entry_price,
            sell_price: fill.price,
            qty: fill.qty,
            spend: position.spend,
            gain: fill.qty * fill.price - position.spend,
        })
    }

    async fn balance(&self) -> Result<Decimal> {
        let url = format!("{}/v2/account", self.cfg.base_url);
        let body = self
            .send(self.http.get(&url))
            .await
            .map_err(|e| e.context("failed to get account"))?;
        let account: AccountResponse = parse(&body)?;
        Ok(account.buying_power)
    }
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::Http(format!("bad response payload: {e}")))
}

// ─── Request/response types ──────────────────────────────────────────────────

#[derive(Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    time_in_force: &'a str,
}

#[derive(Debug, Deserialize)]
struct Order {
    id: String,
    #[serde(default)]
    filled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    filled_avg_price: Option<Decimal>,
    #[serde(default)]
    filled_qty: Option<Decimal>,
}

struct Fill {
    time: DateTime<Utc>,
    price: Decimal,
    qty: Decimal,
}

impl Order {
    fn fill(&self) -> Result<Fill> {
        let (Some(time), Some(price), Some(qty)) =
            (self.filled_at, self.filled_avg_price, self.filled_qty)
        else {
            return Err(Error::Http(format!(
                "order {} reported filled without fill details",
                self.id
            )));
        };
        Ok(Fill { time, price, qty })
    }
}

#[derive(Deserialize)]
struct AccountResponse {
    buying_power: Decimal,
}

#[derive(Deserialize)]
struct CryptoBarsResponse {
    #[serde(default)]
    bars: HashMap<String, Vec<ApiBar>>,
}

#[derive(Clone, Deserialize)]
struct ApiBar {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl ApiBar {
    fn to_bar(&self) -> Result<Bar> {
        Ok(Bar {
            time: self.t,
            open: decimal(self.o)?,
            high: decimal(self.h)?,
            low: decimal(self.l)?,
            close: decimal(self.c)?,
            volume: decimal(self.v)?,
        })
    }
}
