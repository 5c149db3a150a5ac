//! Record source port - where a window's raw content comes from

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::Window;

/// Typed result of establishing a session with the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum LoginOutcome {
    Authenticated,
    /// A hard failure: the login form could not be driven at all
    Failed(String),
    /// No success indicator appeared in time; extraction proceeds anyway
    TimedOutProceeding,
}

/// Record source trait
///
/// One implementation per way of obtaining rendered content (live web
/// session, saved pages, ...). The extraction contract - optional fields,
/// required id - lives in the extractor and does not depend on which source
/// produced the content.
pub trait RecordSource {
    /// Source name for logs and reports
    fn name(&self) -> &str;

    /// Establish whatever session the source needs before fetching
    fn authenticate(&mut self) -> LoginOutcome;

    /// Raw rendered content for one window
    fn fetch_window(&mut self, window: &Window) -> Result<String>;
}
