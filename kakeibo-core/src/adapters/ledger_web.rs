//! Live ledger source - logs in and pulls one month of history per window

use log::{debug, warn};
use url::Url;

use crate::config::{Config, Credentials, SiteSettings, SyncSettings};
use crate::domain::result::{Error, Result};
use crate::domain::Window;
use crate::ports::{Browser, BrowserSession, LoginOutcome, RecordSource, WaitCondition};
use crate::services::LoginFlow;

/// Record source reading the ledger's monthly history pages through a browser
pub struct LedgerWebSource<B: Browser> {
    session: BrowserSession<B>,
    credentials: Credentials,
    site: SiteSettings,
    sync: SyncSettings,
}

impl<B: Browser> LedgerWebSource<B> {
    pub fn new(browser: B, config: &Config) -> Self {
        Self {
            session: BrowserSession::new(browser),
            credentials: config.credentials.clone(),
            site: config.site.clone(),
            sync: config.sync.clone(),
        }
    }

    /// History page for one month, e.g. `https://zaim.net/money?month=202403`
    pub fn month_url(&self, window: &Window) -> Result<String> {
        let mut url = Url::parse(&self.site.history_url)
            .map_err(|e| Error::config(format!("invalid history URL: {}", e)))?;
        url.query_pairs_mut().append_pair("month", &window.period.compact());
        Ok(url.to_string())
    }
}

impl<B: Browser> RecordSource for LedgerWebSource<B> {
    fn name(&self) -> &str {
        "ledger-web"
    }

    fn authenticate(&mut self) -> LoginOutcome {
        LoginFlow::new(
            &self.credentials,
            &self.site,
            self.sync.wait_timeout,
            self.sync.login_wait,
        )
        .run(&mut *self.session)
    }

    fn fetch_window(&mut self, window: &Window) -> Result<String> {
        let url = self.month_url(window)?;
        debug!("{}: fetching {}", window.label(), url);
        self.session.navigate(&url)?;

        let rows = WaitCondition::Present(self.site.rows.row.clone());
        self.session.wait_until(&rows, self.sync.wait_timeout)?;

        if let Err(e) = self.session.scroll_to_bottom() {
            warn!("{}: scroll failed, continuing with what rendered: {}", window.label(), e);
        }
        self.session.page_source()
    }
}
