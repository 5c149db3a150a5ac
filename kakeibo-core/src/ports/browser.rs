//! Browser port - page rendering and form interaction

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use log::{debug, warn};

use crate::domain::result::Result;

/// Condition a wait blocks on, expressed as a CSS selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// An element matching the selector exists in the document
    Present(String),
    /// An element matching the selector exists and is not hidden
    Visible(String),
}

impl WaitCondition {
    pub fn selector(&self) -> &str {
        match self {
            WaitCondition::Present(s) | WaitCondition::Visible(s) => s,
        }
    }
}

/// Browser automation abstraction
///
/// Implementations render pages and let the caller interact with forms. The
/// pipeline treats a browser as an opaque content provider; retry policy, if
/// any, belongs to the implementation.
pub trait Browser {
    /// Load a URL, following redirects
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Location after the last navigation or form submission
    fn current_url(&self) -> Option<String>;

    /// Snapshot of the current document
    fn page_source(&self) -> Result<String>;

    /// Block until the condition holds, or fail with a fetch error once
    /// `timeout` has elapsed
    fn wait_until(&mut self, condition: &WaitCondition, timeout: Duration) -> Result<()>;

    /// Type a value into the first element matching `selector`
    ///
    /// Fails with `Error::ElementNotFound` when nothing matches.
    fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    /// Activate the control matching `selector`, submitting its form
    fn submit(&mut self, selector: &str) -> Result<()>;

    /// Best-effort scroll to trigger lazily rendered rows
    fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Release the underlying resources
    fn close(&mut self) -> Result<()>;
}

/// Scoped ownership of a browser: closed exactly once when dropped, on every
/// exit path.
pub struct BrowserSession<B: Browser> {
    browser: B,
}

impl<B: Browser> BrowserSession<B> {
    pub fn new(browser: B) -> Self {
        debug!("browser session opened");
        Self { browser }
    }
}

impl<B: Browser> Deref for BrowserSession<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.browser
    }
}

impl<B: Browser> DerefMut for BrowserSession<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.browser
    }
}

impl<B: Browser> Drop for BrowserSession<B> {
    fn drop(&mut self) {
        match self.browser.close() {
            Ok(()) => debug!("browser session closed"),
            Err(e) => warn!("failed to close browser cleanly: {}", e),
        }
    }
}
