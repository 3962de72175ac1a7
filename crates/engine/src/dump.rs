use std::io::Write;
use std::path::Path;

use common::{Bar, Error, Result};

/// CSV sink recording every bar a worker consumes, in the same schema the
/// emulator reads back. The header goes out with the first bar; every row
/// is flushed so a crash loses at most one bar.
pub struct BarsDump<W: Write> {
    writer: csv::Writer<W>,
    needs_header: bool,
}

impl BarsDump<Box<dyn Write + Send>> {
    /// Dump into `path`, creating parent directories; a `None` path yields
    /// a no-op sink.
    pub fn create(path: Option<&Path>) -> Result<Self> {
        let w: Box<dyn Write + Send> = match path {
            None => Box::new(std::io::sink()),
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)
                        .map_err(|e| Error::Io(e).context("failed to create dump directory"))?;
                }
                let f = std::fs::File::create(path)
                    .map_err(|e| Error::Io(e).context("failed to open bars dump file"))?;
                Box::new(f)
            }
        };
        Ok(Self::new(w))
    }
}

impl<W: Write> BarsDump<W> {
    pub fn new(w: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(w),
            needs_header: true,
        }
    }

    pub fn dump(&mut self, bar: &Bar) -> Result<()> {
        if self.needs_header {
            self.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
            self.needs_header = false;
        }

        self.write_record([
            bar.time.timestamp().to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;

        self.writer.flush()?;
        Ok(())
    }

    fn write_record<I, F>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        self.writer
            .write_record(record)
            .map_err(|e| Error::Csv(e.to_string()).context("failed to dump bar"))
    }
}
