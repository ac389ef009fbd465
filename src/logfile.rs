
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::error::Result;

/// CSV log for one characterization run.
///
/// The file is created fresh (creation fails if the name is already taken, so a run can
/// never clobber an earlier one), the header goes out first, and every appended row is
/// flushed so a killed run keeps everything measured up to that point.
pub struct RunLog {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl RunLog {
    /// Create a timestamped `YYYYmmdd-HHMMSS.csv` log under `dir`
    pub fn create(dir: &Path, header: &[&str]) -> Result<Self> {
        let name = format!("{}.csv", Local::now().format("%Y%m%d-%H%M%S"));
        Self::create_named(&dir.join(name), header)
    }

    /// Create the log at an explicit path; fails if the file already exists
    pub fn create_named(path: &Path, header: &[&str]) -> Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        info!("selected logfile: {}", path.display());

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header)?;
        writer.flush()?;

        Ok(Self { writer, path: path.to_owned() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one measurement row and flush it to disk
    pub fn append(&mut self, row: &[f64]) -> Result<()> {
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        self.writer.write_record(&fields)?;
        self.writer.flush()?;
        Ok(())
    }
}
