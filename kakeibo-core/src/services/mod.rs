//! Service layer - the synchronization pipeline and the reports built on it
//!
//! Pipeline stages (planner, extractor, normalizer, merge) are pure and
//! individually testable; `SyncService` wires them to a record source and a
//! table store.

pub mod extractor;
mod insight;
pub mod logging;
mod login;
pub mod merge;
pub mod normalizer;
pub mod planner;
mod status;
mod sync;

pub use extractor::{ExtractOutcome, RecordExtractor};
pub use insight::{InsightService, OVERSPEND_AMOUNT, OVERSPEND_RATE};
pub use logging::{LogEntry, LogEvent, LogStats, LoggingService};
pub use login::LoginFlow;
pub use merge::{merge, MergeOutcome, MergeStats};
pub use normalizer::{normalize_all, NormalizeOutcome};
pub use planner::plan_windows;
pub use status::{DateRange, StatusService, StatusSummary};
pub use sync::{NormalizeStats, RunStatus, SyncOptions, SyncReport, SyncService, WindowReport};
