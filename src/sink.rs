use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::Error;
use crate::speed::SpeedTable;

pub const CSV_HEADER: &str = "Vehicle ID,Speed (km/h)";

/// Destination for the per-track speed table. Every call replaces what the
/// previous call wrote.
pub trait SpeedSink {
    fn rewrite(&mut self, records: &SpeedTable) -> Result<(), Error>;
}

/// Writes the header and one `id,speed` row per track, speed with two decimals.
pub fn write_csv<W: Write>(mut w: W, records: &SpeedTable) -> Result<(), Error> {
    writeln!(w, "{}", CSV_HEADER)?;

    for (id, record) in records {
        writeln!(w, "{},{:.2}", id, record.value())?;
    }

    w.flush()?;

    Ok(())
}

/// Rewrites a CSV file on every call. The new table is written next to the
/// target and renamed over it, so readers see either the old or the new file.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replace_with<F>(&self, fill: F) -> Result<(), Error>
    where
        F: FnOnce(&mut dyn Write) -> Result<(), Error>,
    {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        // dropped, and so removed, on any early return
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            fill(&mut w)?;
            w.flush()?;
        }

        tmp.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }
}

impl SpeedSink for CsvFileSink {
    fn rewrite(&mut self, records: &SpeedTable) -> Result<(), Error> {
        self.replace_with(|w| write_csv(w, records))
    }
}
