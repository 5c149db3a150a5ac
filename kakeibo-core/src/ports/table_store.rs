//! Table store port - the wholesale-replaced persisted table

use crate::domain::result::Result;
use crate::domain::TableSnapshot;

/// Persisted tabular store abstraction
///
/// Spreadsheet-like: the table is read in full and rewritten in full. There
/// is no partial update, transaction or versioning at this boundary.
pub trait TableStore {
    /// Human readable location, e.g. a file path or sheet name
    fn name(&self) -> String;

    /// Read header and rows, or None when the store holds no table yet
    fn read_all(&self) -> Result<Option<TableSnapshot>>;

    /// Remove all content
    fn clear(&self) -> Result<()>;

    /// Write header and rows into a cleared store
    fn write_all(&self, header: &[String], rows: &[Vec<String>]) -> Result<()>;

    /// Replace the store's contents with the given table
    ///
    /// Backends that can swap contents atomically override this.
    fn replace_all(&self, snapshot: &TableSnapshot) -> Result<()> {
        self.clear()?;
        self.write_all(&snapshot.header, &snapshot.rows)
    }
}
