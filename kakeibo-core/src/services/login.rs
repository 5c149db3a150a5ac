//! Login state machine
//!
//! ```text
//! Unauthenticated -> PrimaryLoginForm -> [DelegatedLoginForm] -> Verifying
//!        |                 |                     |                  |
//!        +----> Failed <---+---------------------+     Authenticated | TimedOutProceeding
//! ```
//!
//! Transitions are driven by where the browser lands after a submission:
//! arriving on the delegated identity provider's host triggers exactly one
//! resubmission of the same credentials into that provider's form.

use std::time::Duration;

use log::{debug, info, warn};
use url::Url;

use crate::config::{Credentials, SiteSettings};
use crate::domain::result::Error;
use crate::ports::{Browser, LoginOutcome, WaitCondition};

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoginState {
    Unauthenticated,
    PrimaryLoginForm,
    DelegatedLoginForm,
    Verifying,
    Done(LoginOutcome),
}

/// Drives a browser through the ledger's login forms
pub struct LoginFlow<'a> {
    credentials: &'a Credentials,
    site: &'a SiteSettings,
    /// Bound on waiting for a form to render
    form_wait: Duration,
    /// Bound on waiting for the success indicator
    success_wait: Duration,
}

impl<'a> LoginFlow<'a> {
    pub fn new(
        credentials: &'a Credentials,
        site: &'a SiteSettings,
        form_wait: Duration,
        success_wait: Duration,
    ) -> Self {
        Self {
            credentials,
            site,
            form_wait,
            success_wait,
        }
    }

    pub fn run<B: Browser + ?Sized>(&self, browser: &mut B) -> LoginOutcome {
        let mut state = LoginState::Unauthenticated;
        loop {
            debug!("login state: {:?}", state);
            state = match state {
                LoginState::Unauthenticated => self.open_login_page(browser),
                LoginState::PrimaryLoginForm => self.submit_primary(browser),
                LoginState::DelegatedLoginForm => self.submit_delegated(browser),
                LoginState::Verifying => self.verify(browser),
                LoginState::Done(outcome) => return outcome,
            };
        }
    }

    fn open_login_page<B: Browser + ?Sized>(&self, browser: &mut B) -> LoginState {
        match browser.navigate(&self.site.login_url) {
            Ok(()) => LoginState::PrimaryLoginForm,
            Err(e) => failed(format!("cannot open login page: {}", e)),
        }
    }

    fn submit_primary<B: Browser + ?Sized>(&self, browser: &mut B) -> LoginState {
        let selectors = &self.site.login;
        let email_visible = WaitCondition::Visible(selectors.email.clone());
        if let Err(e) = browser.wait_until(&email_visible, self.form_wait) {
            return failed(format!("login form did not appear: {}", e));
        }

        let submitted = browser
            .fill(&selectors.email, &self.credentials.email)
            .and_then(|_| browser.fill(&selectors.password, &self.credentials.password))
            .and_then(|_| browser.submit(&selectors.submit));
        if let Err(e) = submitted {
            return failed(format!("cannot submit login form: {}", e));
        }

        if self.on_delegated_host(browser) {
            info!("redirected to delegated login provider");
            LoginState::DelegatedLoginForm
        } else {
            LoginState::Verifying
        }
    }

    /// The only resubmission the flow ever makes
    fn submit_delegated<B: Browser + ?Sized>(&self, browser: &mut B) -> LoginState {
        let selectors = &self.site.login;
        // Delegated provider's form may already be rendering; not fatal if not
        let password_visible = WaitCondition::Visible(selectors.delegated_password.clone());
        if let Err(e) = browser.wait_until(&password_visible, self.form_wait) {
            debug!("delegated password field not confirmed visible: {}", e);
        }

        match browser.fill(&selectors.delegated_email, &self.credentials.email) {
            Ok(()) => {}
            Err(Error::ElementNotFound(_)) => {
                debug!("delegated form has no email field, assuming prefilled");
            }
            Err(e) => return failed(format!("cannot fill delegated email: {}", e)),
        }

        let submitted = browser
            .fill(&selectors.delegated_password, &self.credentials.password)
            .and_then(|_| browser.submit(&selectors.delegated_submit));
        match submitted {
            Ok(()) => LoginState::Verifying,
            Err(e) => failed(format!("cannot submit delegated login form: {}", e)),
        }
    }

    fn verify<B: Browser + ?Sized>(&self, browser: &mut B) -> LoginState {
        let success = WaitCondition::Present(self.site.login.success.clone());
        match browser.wait_until(&success, self.success_wait) {
            Ok(()) => {
                info!("login confirmed");
                LoginState::Done(LoginOutcome::Authenticated)
            }
            Err(e) => {
                warn!(
                    "no login success indicator within {:?} ({}); proceeding anyway",
                    self.success_wait, e
                );
                LoginState::Done(LoginOutcome::TimedOutProceeding)
            }
        }
    }

    fn on_delegated_host<B: Browser + ?Sized>(&self, browser: &B) -> bool {
        let suffix = self.site.delegated_login_host.trim();
        if suffix.is_empty() {
            return false;
        }
        browser
            .current_url()
            .and_then(|u| Url::parse(&u).ok())
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .map(|host| host == suffix || host.ends_with(&format!(".{}", suffix)))
            .unwrap_or(false)
    }
}

fn failed(reason: String) -> LoginState {
    warn!("login failed: {}", reason);
    LoginState::Done(LoginOutcome::Failed(reason))
}
