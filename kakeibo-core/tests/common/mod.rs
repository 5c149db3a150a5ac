//! Shared helpers for integration tests
//!
//! `MockServer` is a tiny HTTP/1.1 server on a random local port. Each test
//! supplies a handler closure that plays the ledger site or the Sheets API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kakeibo_core::config::Config;

// ============================================================================
// Mock HTTP server
// ============================================================================

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: String,
    /// Header names lowercased
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn has_cookie(&self, pair: &str) -> bool {
        self.header("cookie")
            .map(|c| c.split(';').any(|p| p.trim() == pair))
            .unwrap_or(false)
    }
}

pub struct Response {
    status: u16,
    content_type: &'static str,
    headers: Vec<(String, String)>,
    body: String,
}

impl Response {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            headers: Vec::new(),
            body: value.to_string(),
        }
    }

    pub fn status(code: u16) -> Self {
        Self {
            status: code,
            content_type: "application/json",
            headers: Vec::new(),
            body: format!(r#"{{"error": {{"code": {}}}}}"#, code),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

pub struct MockServer {
    port: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    /// Start on a random available port
    pub fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let handler: Handler = Arc::new(handler);

        // Non-blocking so the loop notices shutdown
        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let handler = handler.clone();
                        thread::spawn(move || handle_connection(stream, handler.as_ref()));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A local URL nothing is listening on
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn handle_connection(mut stream: TcpStream, handler: &(dyn Fn(&Request) -> Response + Send + Sync)) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let response = handler(&request);
    let _ = write_response(&mut stream, &response);
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.lines();
    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }
    let body_end = (header_end + content_length).min(data.len());
    let body = String::from_utf8_lossy(&data[header_end..body_end]).to_string();

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target, String::new()),
    };

    Some(Request {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn write_response(stream: &mut TcpStream, response: &Response) -> std::io::Result<()> {
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()
}

// ============================================================================
// Ledger pages
// ============================================================================

/// One history row as the ledger renders it
pub struct PageRow<'a> {
    pub id: &'a str,
    pub date: &'a str,
    pub category: &'a str,
    pub amount: &'a str,
    pub to_account: &'a str,
}

impl<'a> PageRow<'a> {
    pub fn spend(id: &'a str, date: &'a str, category: &'a str, amount: &'a str) -> Self {
        Self {
            id,
            date,
            category,
            amount,
            to_account: "",
        }
    }

    pub fn income(id: &'a str, date: &'a str, amount: &'a str, to_account: &'a str) -> Self {
        Self {
            id,
            date,
            category: "給与",
            amount,
            to_account,
        }
    }
}

pub fn history_page(rows: &[PageRow<'_>]) -> String {
    let rows: String = rows
        .iter()
        .map(|r| {
            format!(
                r#"<div class="SearchResult-module__list___q1" data-url="/money/{id}/edit">
                     <div class="SearchResult-module__date___a1">{date}</div>
                     <div class="SearchResult-module__category___b2"><img alt="icon-category">{category}</div>
                     <div class="SearchResult-module__price___c3">{amount}</div>
                     <div class="SearchResult-module__fromAccount___d4">財布</div>
                     <div class="SearchResult-module__toAccount___e5">{to}</div>
                     <div class="SearchResult-module__place___f6">近所の店</div>
                     <div class="SearchResult-module__name___g7">買い物</div>
                   </div>"#,
                id = r.id,
                date = r.date,
                category = r.category,
                amount = r.amount,
                to = r.to_account,
            )
        })
        .collect();
    format!(
        r#"<html><body><a href="/logout">ログアウト</a><div class="SearchResult-module__table___z0">{}</div></body></html>"#,
        rows
    )
}

/// Save a page where `ReplaySource` looks for `label` (YYYY-MM)
pub fn write_page(dir: &Path, label: &str, rows: &[PageRow<'_>]) {
    fs::write(dir.join(format!("{}.html", label)), history_page(rows)).unwrap();
}

// ============================================================================
// Configuration
// ============================================================================

pub fn config_with(pairs: &[(&str, &str)]) -> Config {
    let mut vars: Vec<(String, String)> = vec![
        ("ZAIM_EMAIL".into(), "me@example.com".into()),
        ("ZAIM_PASS".into(), "secret".into()),
        ("SPREADSHEET_KEY".into(), "ledger.duckdb".into()),
        ("WINDOW_DELAY_SECS".into(), "0".into()),
    ];
    for (k, v) in pairs {
        vars.retain(|(name, _)| name != k);
        vars.push((k.to_string(), v.to_string()));
    }
    Config::from_vars(vars).unwrap()
}
