//! Replay source - monthly history pages saved to disk

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::result::{Error, Result};
use crate::domain::Window;
use crate::ports::{LoginOutcome, RecordSource};

/// Reads `<dir>/<YYYY-MM>.html` for each window. Needs no login.
pub struct ReplaySource {
    dir: PathBuf,
    name: String,
}

impl ReplaySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = format!("replay:{}", dir.display());
        Self { dir, name }
    }

    pub fn page_path(&self, window: &Window) -> PathBuf {
        self.dir.join(format!("{}.html", window.label()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn authenticate(&mut self) -> LoginOutcome {
        LoginOutcome::Authenticated
    }

    fn fetch_window(&mut self, window: &Window) -> Result<String> {
        let path = self.page_path(window);
        debug!("{}: reading {}", window.label(), path.display());
        fs::read_to_string(&path)
            .map_err(|e| Error::fetch(format!("no saved page at {}: {}", path.display(), e)))
    }
}
