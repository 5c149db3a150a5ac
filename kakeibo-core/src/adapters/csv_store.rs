//! CSV file table store
//!
//! Writes go to a temporary file in the target directory which is then
//! renamed over the table, so a crash never leaves a half-written file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::domain::result::{Error, Result};
use crate::domain::TableSnapshot;
use crate::ports::TableStore;

pub struct CsvTableStore {
    path: PathBuf,
}

impl CsvTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store beside `path` named `<stem>_<suffix>.csv`
    pub fn sibling(path: &Path, suffix: &str) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "table".to_string());
        Self::new(path.with_file_name(format!("{}_{}.csv", stem, suffix)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(tmp.as_file_mut());
            writer.write_record(header)?;
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        debug!("wrote {} rows to {}", rows.len(), self.path.display());
        Ok(())
    }
}

impl TableStore for CsvTableStore {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read_all(&self) -> Result<Option<TableSnapshot>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut records = reader.records();

        let header: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(str::to_string).collect(),
            None => return Ok(None),
        };
        let rows = records
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, _>>()?;

        Ok(Some(TableSnapshot::new(header, rows)))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        self.write_atomically(header, rows)
    }

    /// Rename-over-target replaces the file in one step
    fn replace_all(&self, snapshot: &TableSnapshot) -> Result<()> {
        self.write_atomically(&snapshot.header, &snapshot.rows)
    }
}
