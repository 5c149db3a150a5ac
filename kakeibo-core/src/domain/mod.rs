//! Core domain entities
//!
//! Pure data structures shared by every stage of the pipeline - no I/O.

pub mod insight;
mod period;
mod record;
pub mod result;
mod table;

pub use insight::{InsightReport, InsightRow, Verdict};
pub use period::{Window, YearMonth};
pub use record::{CanonicalRecord, Direction, RawRecord};
pub use table::{normalize_id, PersistedTable, TableSnapshot, HEADER};
