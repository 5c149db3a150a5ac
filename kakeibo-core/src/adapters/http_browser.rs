//! HTTP browser - the browser port over a cookie-keeping HTTP client
//!
//! Pages are fetched with `reqwest` and inspected with `scraper`. Forms are
//! driven the way a browser would submit them: every named field of the
//! enclosing form is collected (hidden tokens round-trip untouched), typed
//! values are overlaid, and the clicked control contributes its own
//! name/value. No script runs, so "waiting" means polling the location.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::result::{Error, Result};
use crate::ports::{Browser, WaitCondition};

const USER_AGENT: &str = concat!("kakeibo/", env!("CARGO_PKG_VERSION"));

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::parse(format!("invalid selector: {}", css)))
}

/// Browser implementation backed by plain HTTP requests
pub struct HttpBrowser {
    client: Client,
    current: Option<Url>,
    document: String,
    /// Values typed into fields of the current page, by field name
    pending: Vec<(String, String)>,
    poll_interval: Duration,
}

impl HttpBrowser {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            current: None,
            document: String::new(),
            pending: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn resolve(&self, target: &str) -> Result<Url> {
        let parsed = match &self.current {
            Some(base) => base.join(target),
            None => Url::parse(target),
        };
        parsed.map_err(|e| Error::fetch(format!("invalid URL '{}': {}", target, e)))
    }

    /// Send a request and make its final (post-redirect) response the current page
    fn load(&mut self, request: RequestBuilder) -> Result<()> {
        let response = request.send()?;
        let status = response.status();
        let final_url = response.url().clone();
        let body = response.text()?;

        if !status.is_success() {
            return Err(Error::fetch(format!("HTTP {} from {}", status.as_u16(), final_url)));
        }

        debug!("loaded {} ({} bytes)", final_url, body.len());
        self.current = Some(final_url);
        self.document = body;
        self.pending.clear();
        Ok(())
    }

    fn condition_holds(&self, condition: &WaitCondition) -> Result<bool> {
        let sel = selector(condition.selector())?;
        let html = Html::parse_document(&self.document);
        let holds = match condition {
            WaitCondition::Present(_) => html.select(&sel).next().is_some(),
            WaitCondition::Visible(_) => html.select(&sel).any(is_visible),
        };
        Ok(holds)
    }

    /// Method, target and encoded fields for submitting via `control`
    fn build_submission(&self, control_css: &str) -> Result<(Method, Url, Vec<(String, String)>)> {
        let sel = selector(control_css)?;
        let html = Html::parse_document(&self.document);
        let control = html
            .select(&sel)
            .next()
            .ok_or_else(|| Error::ElementNotFound(control_css.to_string()))?;
        let form = control
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "form")
            .ok_or_else(|| Error::parse(format!("'{}' is not inside a form", control_css)))?;

        let mut fields = form_fields(form)?;
        for (name, value) in &self.pending {
            match fields.iter_mut().find(|(n, _)| n == name) {
                Some(field) => field.1 = value.clone(),
                None => fields.push((name.clone(), value.clone())),
            }
        }
        if let Some(name) = control.value().attr("name") {
            let value = control.value().attr("value").unwrap_or_default();
            fields.push((name.to_string(), value.to_string()));
        }

        let action = form.value().attr("action").unwrap_or("").trim();
        let target = if action.is_empty() {
            self.current
                .clone()
                .ok_or_else(|| Error::fetch("no page loaded"))?
        } else {
            self.resolve(action)?
        };
        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("post") => Method::POST,
            _ => Method::GET,
        };

        Ok((method, target, fields))
    }
}

impl Browser for HttpBrowser {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let target = self.resolve(url)?;
        debug!("navigate {}", target);
        let request = self.client.get(target);
        self.load(request)
    }

    fn current_url(&self) -> Option<String> {
        self.current.as_ref().map(|u| u.to_string())
    }

    fn page_source(&self) -> Result<String> {
        if self.current.is_none() {
            return Err(Error::fetch("no page loaded"));
        }
        Ok(self.document.clone())
    }

    fn wait_until(&mut self, condition: &WaitCondition, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.condition_holds(condition)? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::fetch(format!(
                    "timed out after {:?} waiting for '{}'",
                    timeout,
                    condition.selector()
                )));
            }
            thread::sleep(self.poll_interval.min(deadline - now));

            let Some(url) = self.current.clone() else {
                continue;
            };
            trace!("polling {}", url);
            let request = self.client.get(url);
            if let Err(e) = self.load(request) {
                debug!("reload while waiting failed: {}", e);
            }
        }
    }

    fn fill(&mut self, css: &str, value: &str) -> Result<()> {
        let sel = selector(css)?;
        let html = Html::parse_document(&self.document);
        let field = html
            .select(&sel)
            .next()
            .ok_or_else(|| Error::ElementNotFound(css.to_string()))?;
        let name = field
            .value()
            .attr("name")
            .ok_or_else(|| Error::parse(format!("field '{}' has no name", css)))?
            .to_string();

        self.pending.retain(|(n, _)| *n != name);
        self.pending.push((name, value.to_string()));
        Ok(())
    }

    fn submit(&mut self, css: &str) -> Result<()> {
        let (method, target, fields) = self.build_submission(css)?;
        debug!("submit {} {} ({} fields)", method, target, fields.len());

        let request = if method == Method::POST {
            self.client.post(target).form(&fields)
        } else {
            let mut target = target;
            target.query_pairs_mut().extend_pairs(fields.iter());
            self.client.get(target)
        };
        self.load(request)
    }

    fn scroll_to_bottom(&mut self) -> Result<()> {
        // Without script execution the fetched document is already complete
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        self.document.clear();
        self.pending.clear();
        Ok(())
    }
}

/// Named, successful controls of a form in document order
fn form_fields(form: ElementRef<'_>) -> Result<Vec<(String, String)>> {
    let controls = selector("input, textarea, select")?;
    let options = selector("option")?;
    let mut fields = Vec::new();

    for control in form.select(&controls) {
        let el = control.value();
        let Some(name) = el.attr("name") else { continue };
        if el.attr("disabled").is_some() {
            continue;
        }

        let value = match el.name() {
            "textarea" => control.text().collect::<String>(),
            "select" => {
                let chosen = control
                    .select(&options)
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| control.select(&options).next());
                match chosen {
                    Some(o) => o
                        .value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| o.text().collect::<String>().trim().to_string()),
                    None => continue,
                }
            }
            _ => {
                let input_type = el.attr("type").unwrap_or("text").to_ascii_lowercase();
                // Buttons only count when they are the one clicked
                if matches!(input_type.as_str(), "submit" | "image" | "button" | "reset") {
                    continue;
                }
                if (input_type == "radio" || input_type == "checkbox") && el.attr("checked").is_none() {
                    continue;
                }
                let default = if input_type == "checkbox" { "on" } else { "" };
                el.attr("value").unwrap_or(default).to_string()
            }
        };
        fields.push((name.to_string(), value));
    }

    Ok(fields)
}

/// Present and not hidden by itself or any ancestor
fn is_visible(el: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .all(|e| {
            let v = e.value();
            if v.attr("hidden").is_some() {
                return false;
            }
            if v.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")) {
                return false;
            }
            let style: String = v
                .attr("style")
                .unwrap_or("")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            !style.contains("display:none")
        })
}
