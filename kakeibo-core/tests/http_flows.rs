//! HTTP-level tests against an in-process mock server
//!
//! The mock plays the ledger site (login form, session cookie, monthly
//! history pages) and the Sheets values API, so `HttpBrowser` and
//! `SheetsTableStore` run unmodified over real sockets.
//!
//! Run with: cargo test --test http_flows -- --nocapture

mod common;

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tempfile::TempDir;

use kakeibo_core::adapters::http_browser::HttpBrowser;
use kakeibo_core::adapters::ledger_web::LedgerWebSource;
use kakeibo_core::adapters::memory::MemoryTableStore;
use kakeibo_core::adapters::open_table_store;
use kakeibo_core::adapters::sheets::SheetsTableStore;
use kakeibo_core::config::{Config, RowSelectors, StoreBackend};
use kakeibo_core::ports::{LoginOutcome, RecordSource, TableStore};
use kakeibo_core::services::{RecordExtractor, RunStatus, SyncOptions, SyncService};
use kakeibo_core::{Error, PersistedTable, TableKind, TableSnapshot, Window, YearMonth};

use common::{closed_port_url, config_with, history_page, MockServer, PageRow, Request, Response};

// ============================================================================
// Mock ledger site
// ============================================================================

const CSRF: &str = "tok-1";
const SESSION: &str = "session=ok";

fn login_form() -> String {
    format!(
        r#"<html><body>
             <form method="post" action="/login">
               <input type="hidden" name="csrf" value="{}">
               <input id="email" type="email" name="email">
               <input id="password" type="password" name="password">
               <button type="submit" name="action" value="default">ログイン</button>
             </form>
           </body></html>"#,
        CSRF
    )
}

/// Ledger site serving `pages` (keyed by `YYYYMM`) to a logged-in session
fn ledger_site(pages: HashMap<&'static str, String>, log: Arc<Mutex<Vec<String>>>) -> MockServer {
    MockServer::start(move |req: &Request| {
        log.lock()
            .unwrap()
            .push(format!("{} {}?{}", req.method, req.path, req.query));

        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/login") => Response::html(login_form()),
            ("POST", "/login") => {
                let form = req.form();
                let ok = form.get("email").map(String::as_str) == Some("me@example.com")
                    && form.get("password").map(String::as_str) == Some("secret")
                    && form.get("csrf").map(String::as_str) == Some(CSRF)
                    && form.get("action").map(String::as_str) == Some("default");
                if ok {
                    Response::html(r#"<html><body><a href="/logout">ログアウト</a></body></html>"#)
                        .with_header("Set-Cookie", &format!("{}; Path=/", SESSION))
                } else {
                    Response::html(login_form())
                }
            }
            ("GET", "/money") => {
                if !req.has_cookie(SESSION) {
                    return Response::html(login_form());
                }
                match req.query_param("month").and_then(|m| pages.get(m.as_str()).cloned()) {
                    Some(page) => Response::html(page),
                    None => Response::status(404),
                }
            }
            _ => Response::status(404),
        }
    })
    .unwrap()
}

fn site_config(base: &str, extra: &[(&str, &str)]) -> Config {
    let login = format!("{}/login", base);
    let history = format!("{}/money", base);
    let mut pairs = vec![
        ("LOGIN_URL", login.as_str()),
        ("HISTORY_URL", history.as_str()),
        ("WAIT_TIMEOUT_SECS", "1"),
        ("LOGIN_WAIT_SECS", "1"),
    ];
    pairs.extend_from_slice(extra);
    config_with(&pairs)
}

fn web_source(config: &Config) -> LedgerWebSource<HttpBrowser> {
    let browser = HttpBrowser::new(Duration::from_secs(5))
        .unwrap()
        .with_poll_interval(Duration::from_millis(100));
    LedgerWebSource::new(browser, config)
}

fn sync_service() -> SyncService {
    SyncService::new(RecordExtractor::new(&RowSelectors::default()).unwrap())
}

fn options(months: u32) -> SyncOptions {
    SyncOptions {
        months,
        window_delay: Duration::ZERO,
        dry_run: false,
    }
}

fn two_month_pages() -> HashMap<&'static str, String> {
    HashMap::from([
        (
            "202403",
            history_page(&[
                PageRow::spend("3002", "03月20日(水)", "食費", "¥1,200"),
                PageRow::spend("3001", "03月05日", "日用品", "¥450"),
            ]),
        ),
        (
            "202402",
            history_page(&[PageRow::income("2001", "02月25日", "¥250,000", "銀行")]),
        ),
    ])
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 25).unwrap()
}

// ============================================================================
// Login + fetch
// ============================================================================

#[test]
fn test_login_and_month_fetch_over_http() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let server = ledger_site(two_month_pages(), log.clone());
    let config = site_config(&server.base_url(), &[]);
    let mut source = web_source(&config);
    let store = MemoryTableStore::new();

    let report = sync_service()
        .run(&mut source, &store, today(), &options(2))
        .unwrap();

    assert_eq!(report.login, LoginOutcome::Authenticated);
    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.source, "ledger-web");

    let table = PersistedTable::from_snapshot(&store.snapshot().unwrap());
    let ids: Vec<_> = table.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["3002", "3001", "2001"]);

    let requests = log.lock().unwrap().clone();
    assert!(requests.iter().any(|r| r == "POST /login?"));
    assert!(requests.iter().any(|r| r == "GET /money?month=202403"));
    assert!(requests.iter().any(|r| r == "GET /money?month=202402"));
}

#[test]
fn test_month_not_served_is_partial() {
    let mut pages = two_month_pages();
    pages.remove("202402");
    let server = ledger_site(pages, Arc::new(Mutex::new(Vec::new())));
    let config = site_config(&server.base_url(), &[]);
    let mut source = web_source(&config);
    let store = MemoryTableStore::new();

    let report = sync_service()
        .run(&mut source, &store, today(), &options(2))
        .unwrap();

    assert_eq!(report.status(), RunStatus::Partial);
    assert!(report.windows[0].error.is_none());
    assert!(report.windows[1].error.as_deref().unwrap_or("").contains("404"));
    assert_eq!(report.merge.final_rows, 2);
}

#[test]
fn test_rejected_credentials_proceed_after_timeout() {
    let server = ledger_site(two_month_pages(), Arc::new(Mutex::new(Vec::new())));
    let config = site_config(&server.base_url(), &[("ZAIM_PASS", "wrong")]);
    let mut source = web_source(&config);

    assert_eq!(source.authenticate(), LoginOutcome::TimedOutProceeding);

    // Without a session the history page is the login form: no rows appear
    let window = Window {
        index: 0,
        period: YearMonth::new(2024, 3).unwrap(),
    };
    assert!(matches!(source.fetch_window(&window), Err(Error::Fetch(_))));
}

#[test]
fn test_unreachable_login_page_is_fatal_and_store_untouched() {
    let base = closed_port_url();
    let config = site_config(&base, &[]);
    let mut source = web_source(&config);

    let before = TableSnapshot::new(vec!["id".into()], vec![vec!["1".into()]]);
    let store = MemoryTableStore::with_snapshot(before.clone());

    let result = sync_service().run(&mut source, &store, today(), &options(1));

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("login failed"));
    assert_eq!(store.snapshot(), Some(before));
}

// ============================================================================
// Mock Sheets API
// ============================================================================

const TOKEN: &str = "test-token";
const VALUES_PREFIX: &str = "/v4/spreadsheets/key123/values/";

type Sheets = Arc<Mutex<HashMap<String, Vec<Vec<Value>>>>>;

fn sheets_api(sheets: Sheets) -> MockServer {
    MockServer::start(move |req: &Request| {
        let expected = format!("Bearer {}", TOKEN);
        if req.header("authorization") != Some(expected.as_str()) {
            return Response::status(401);
        }
        let Some(target) = req.path.strip_prefix(VALUES_PREFIX) else {
            return Response::status(404);
        };
        let mut sheets = sheets.lock().unwrap();

        match req.method.as_str() {
            "GET" => {
                let mut body = json!({ "range": format!("{}!A1:Z1000", target), "majorDimension": "ROWS" });
                if let Some(values) = sheets.get(target).filter(|v| !v.is_empty()) {
                    body["values"] = json!(values);
                }
                Response::json(body)
            }
            "POST" => match target.strip_suffix(":clear") {
                Some(sheet) => {
                    sheets.remove(sheet);
                    Response::json(json!({ "clearedRange": sheet }))
                }
                None => Response::status(400),
            },
            "PUT" => {
                if req.query_param("valueInputOption").as_deref() != Some("RAW") {
                    return Response::status(400);
                }
                let body: Value = match serde_json::from_str(&req.body) {
                    Ok(v) => v,
                    Err(_) => return Response::status(400),
                };
                let values: Vec<Vec<Value>> = serde_json::from_value(body["values"].clone()).unwrap_or_default();
                let rows = values.len();
                sheets.insert(target.to_string(), values);
                Response::json(json!({ "updatedRange": target, "updatedRows": rows }))
            }
            _ => Response::status(400),
        }
    })
    .unwrap()
}

fn sheets_store(server: &MockServer, sheet: &str, token: &str) -> SheetsTableStore {
    let base = format!("{}/v4/spreadsheets", server.base_url());
    SheetsTableStore::new(&base, "key123", sheet, token.to_string()).unwrap()
}

#[test]
fn test_sheets_store_round_trip() {
    let sheets: Sheets = Arc::new(Mutex::new(HashMap::new()));
    let server = sheets_api(sheets.clone());
    let store = sheets_store(&server, "Sheet1", TOKEN);

    assert_eq!(store.read_all().unwrap(), None);

    let snapshot = TableSnapshot::new(
        vec!["id".into(), "item".into()],
        vec![vec!["1".into(), "コーヒー".into()], vec!["2".into(), "".into()]],
    );
    store.replace_all(&snapshot).unwrap();
    assert_eq!(store.read_all().unwrap(), Some(snapshot));

    store.clear().unwrap();
    assert_eq!(store.read_all().unwrap(), None);
    assert!(sheets.lock().unwrap().is_empty());
}

#[test]
fn test_sheets_numeric_cells_decode_to_same_ids() {
    let sheets: Sheets = Arc::new(Mutex::new(HashMap::new()));
    sheets.lock().unwrap().insert(
        "Sheet1".to_string(),
        vec![
            vec![json!("id"), json!("date"), json!("amount")],
            vec![json!(12345.0), json!("2024-03-05"), json!(450)],
        ],
    );
    let server = sheets_api(sheets);
    let store = sheets_store(&server, "Sheet1", TOKEN);

    let table = PersistedTable::from_snapshot(&store.read_all().unwrap().unwrap());
    assert_eq!(table.records()[0].id, "12345");
    assert_eq!(table.records()[0].amount, 450);
}

#[test]
fn test_sheets_rejected_token_maps_to_store_and_upload_errors() {
    let server = sheets_api(Arc::new(Mutex::new(HashMap::new())));
    let store = sheets_store(&server, "Sheet1", "expired");

    match store.read_all() {
        Err(Error::Store(msg)) => assert!(msg.contains("401")),
        other => panic!("expected store error, got {:?}", other),
    }
    let snapshot = TableSnapshot::new(vec!["id".into()], vec![]);
    assert!(matches!(store.replace_all(&snapshot), Err(Error::Upload(_))));
}

#[test]
fn test_sheets_factory_uses_token_file_and_insight_sheet() {
    let sheets: Sheets = Arc::new(Mutex::new(HashMap::new()));
    let server = sheets_api(sheets.clone());
    let dir = TempDir::new().unwrap();
    let token_file = dir.path().join("token.json");
    fs::write(&token_file, format!(r#"{{"access_token": "{}"}}"#, TOKEN)).unwrap();

    let api_base = format!("{}/v4/spreadsheets", server.base_url());
    let config = config_with(&[
        ("STORE_BACKEND", "sheets"),
        ("SPREADSHEET_KEY", "key123"),
        ("JSON_KEYFILE", token_file.to_str().unwrap()),
        ("SHEETS_API_BASE", api_base.as_str()),
        ("INSIGHT_SHEET_NAME", "分析"),
    ]);
    assert_eq!(config.store.backend, StoreBackend::Sheets);

    let insight = open_table_store(&config.store, TableKind::Insight).unwrap();
    insight
        .replace_all(&TableSnapshot::new(vec!["category".into()], vec![vec!["食費".into()]]))
        .unwrap();

    // The server sees the percent-encoded sheet name
    let stored = sheets.lock().unwrap();
    let key = stored.keys().next().unwrap();
    assert_eq!(key, "%E5%88%86%E6%9E%90");
    assert_eq!(stored[key].len(), 2);
}
