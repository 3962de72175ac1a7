use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use common::{Bar, BarStream, Error, Result, ShutdownSignal};

use super::decimal;

const STREAM_URL: &str = "wss://stream.data.alpaca.markets/v1beta3/crypto/us";

/// WebSocket subscription to Alpaca's 1-minute crypto bar feed for one
/// symbol.
///
/// The task authenticates, subscribes, and forwards every bar event into
/// the stream's channel. It ends on cancellation or when the socket
/// closes; failures surface on the error channel and terminate the worker.
pub(crate) struct MarketStream {
    symbol: String,
    key: String,
    secret: String,
    shutdown: ShutdownSignal,
}

impl MarketStream {
    pub(crate) fn new(symbol: &str, key: &str, secret: &str, shutdown: ShutdownSignal) -> Self {
        Self {
            symbol: symbol.to_string(),
            key: key.to_string(),
            secret: secret.to_string(),
            shutdown,
        }
    }

    pub(crate) fn open(self) -> BarStream {
        let (bar_tx, bars) = mpsc::channel(64);
        let (err_tx, errors) = mpsc::channel(1);

        tokio::spawn(async move {
            if let Err(e) = self.run(&bar_tx).await {
                let _ = err_tx.send(e).await;
            }
        });

        BarStream { bars, errors }
    }

    async fn run(&self, bars: &mpsc::Sender<Bar>) -> Result<()> {
        info!(symbol = %self.symbol, "connecting to market data stream");
        let (ws, _) = connect_async(STREAM_URL)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let auth = json!({"action": "auth", "key": self.key, "secret": self.secret});
        write
            .send(Message::Text(auth.to_string()))
            .await
            .map_err(|e| Error::WebSocket(format!("auth failed: {e}")))?;

        let subscribe = json!({"action": "subscribe", "bars": [self.symbol]});
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| Error::WebSocket(format!("subscribe failed: {e}")))?;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),

                msg = read.next() => {
                    let Some(msg) = msg else {
                        warn!(symbol = %self.symbol, "market data stream closed by server");
                        return Ok(());
                    };
                    let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

                    if let Message::Text(text) = msg {
                        for bar in parse_bar_events(&self.symbol, &text)? {
                            if bars.send(bar).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Extract this symbol's bar events from one stream payload. Control and
/// foreign-symbol messages pass through silently.
fn parse_bar_events(symbol: &str, text: &str) -> Result<Vec<Bar>> {
    let events: Vec<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| Error::WebSocket(format!("bad stream payload: {e}")))?;

    let mut out = Vec::new();
    for event in events {
        if event.get("T").and_then(|v| v.as_str()) != Some("b") {
            continue;
        }
        if event.get("S").and_then(|v| v.as_str()) != Some(symbol) {
            continue;
        }

        let bar: BarEvent = serde_json::from_value(event)
            .map_err(|e| Error::WebSocket(format!("bad bar event: {e}")))?;
        out.push(bar.into_bar()?);
    }

    Ok(out)
}

#[derive(Deserialize)]
struct BarEvent {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl BarEvent {
    fn into_bar(self) -> Result<Bar> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bar_events_for_the_subscribed_symbol() {
        let payload = r#"[
            {"T": "b", "S": "BTC/USD", "o": 100.0, "h": 105.5, "l": 99.0, "c": 101.25, "v": 3.5,
             "t": "2024-05-01T10:01:00Z"},
            {"T": "b", "S": "ETH/USD", "o": 10.0, "h": 10.0, "l": 10.0, "c": 10.0, "v": 1.0,
             "t": "2024-05-01T10:01:00Z"}
        ]"#;

        let bars = parse_bar_events("BTC/USD", payload).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close.to_string(), "101.25");
        assert_eq!(bars[0].time.timestamp(), 1714557660);
    }

    #[test]
    fn control_messages_are_ignored() {
        let payload = r#"[{"T": "success", "msg": "authenticated"}]"#;
        assert!(parse_bar_events("BTC/USD", payload).unwrap().is_empty());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_bar_events("BTC/USD", "{}").is_err());
        assert!(parse_bar_events("BTC/USD", "not json").is_err());
    }
}
