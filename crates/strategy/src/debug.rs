use std::path::PathBuf;

use common::{Asset, Error, Result, Signal};

/// Drops a CSV snapshot of the asset window next to every acted-on signal.
///
/// Purely diagnostic: callers log failures and keep trading.
pub struct DebugWriter {
    dir: PathBuf,
}

impl DebugWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Clear leftovers from previous runs and make sure the directory exists.
    pub fn init(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn write(&self, asset: &Asset, signal: Signal) -> Result<()> {
        let last = asset.last_bar()?;
        let name = format!(
            "{}_{}_{:.2}.csv",
            last.time.timestamp(),
            signal.action,
            signal.confidence
        );

        let mut w = csv::Writer::from_path(self.dir.join(name))
            .map_err(|e| Error::Csv(e.to_string()))?;
        w.write_record(["timestamp", "open", "high", "low", "close", "volume"])
            .map_err(|e| Error::Csv(e.to_string()))?;
        for bar in asset.bars(asset.len())? {
            w.write_record([
                bar.time.timestamp().to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])
            .map_err(|e| Error::Csv(e.to_string()))?;
        }
        w.flush()?;
        Ok(())
    }
}
