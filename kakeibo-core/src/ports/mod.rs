//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators: the rendering
//! browser, the per-window record source and the persisted table store. The
//! pipeline depends only on these traits, not on concrete implementations.

mod browser;
mod record_source;
mod table_store;

pub use browser::{Browser, BrowserSession, WaitCondition};
pub use record_source::{LoginOutcome, RecordSource};
pub use table_store::TableStore;
