use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;

use common::{Bar, BarStream, Error, Result, ShutdownSignal};

/// One CSV row: `timestamp,open,high,low,close,volume`. The timestamp is
/// epoch seconds; fractional values are tolerated and truncated.
#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: f64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl CsvBar {
    fn into_bar(self) -> Result<Bar> {
        let time = Utc
            .timestamp_opt(self.timestamp as i64, 0)
            .single()
            .ok_or_else(|| Error::Csv(format!("bad bar timestamp: {}", self.timestamp)))?;

        Ok(Bar {
            time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// Streams one symbol's CSV history, restricted to the configured window.
pub(crate) struct BarReader {
    path: PathBuf,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BarReader {
    pub(crate) fn new(path: PathBuf, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { path, start, end }
    }

    /// Spawn the reader and hand back its channels. Parsing runs on the
    /// blocking pool; the feed stops at end of file, on the first bad row,
    /// when the consumer hangs up, or when `shutdown` fires.
    pub(crate) fn stream(self, shutdown: ShutdownSignal) -> BarStream {
        let (bar_tx, bar_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(1);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = self.read_into(&bar_tx, &shutdown) {
                let _ = err_tx.blocking_send(e);
            }
        });

        BarStream {
            bars: bar_rx,
            errors: err_rx,
        }
    }

    fn read_into(&self, tx: &mpsc::Sender<Bar>, shutdown: &ShutdownSignal) -> Result<()> {
        let file = File::open(&self.path)
            .map_err(|e| Error::Io(e).context(format!("unable to open {}", self.path.display())))?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        for row in reader.deserialize::<CsvBar>() {
            let bar = row
                .map_err(|e| Error::Csv(format!("failed to read bar data: {e}")))?
                .into_bar()?;

            if !(bar.time > self.start && bar.time < self.end) {
                continue;
            }

            if shutdown.is_triggered() || tx.blocking_send(bar).is_err() {
                return Ok(());
            }
        }

        Ok(())
    }
}
