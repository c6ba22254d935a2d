//! JSON-over-HTTP transport for the request/response protocol.
//!
//! One file is served per process. `POST /api/request` takes a single
//! [`Request`] body and answers with the matching [`Response`]; requests are
//! handled one at a time so a deletion never overlaps a read.
//!
//! Requests must be `application/json` and must not come from a foreign
//! browser origin or name a foreign `Host`.

use crate::cli::ServeArgs;
use crate::config::Settings;
use crate::protocol::{self, Request, Response as ProtocolResponse};
use crate::reader::LineScanner;
use crate::signal::setup_shutdown_handlers;
use serde::Serialize;
use std::io::Read;
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiny_http::{Header, Method, Response, Server, StatusCode};

const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;
const TICK_INTERVAL_MS: u64 = 150;

#[derive(Serialize)]
struct BasicResponse {
    ok: bool,
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse<'a> {
    ok: bool,
    file_name: String,
    requests_served: u64,
    version: &'a str,
}

enum BodyReadError {
    TooLarge,
    Invalid(String),
}

/// Why a request was refused before its body was read.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
enum Rejection {
    #[error("Cross-origin request from {0} refused")]
    ForeignOrigin(String),
    #[error("Host {0} is not served here")]
    ForeignHost(String),
    #[error("Content-Type must be application/json")]
    NotJson,
}

impl Rejection {
    fn status(&self) -> u16 {
        match self {
            Rejection::ForeignOrigin(_) | Rejection::ForeignHost(_) => 403,
            Rejection::NotJson => 415,
        }
    }
}

fn header_value<'a>(headers: &'a [Header], name: &'static str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str())
}

/// Host part of an `authority` (`host[:port]` or `[v6]:port`), lower-cased.
fn authority_host(authority: &str) -> String {
    let host = match authority.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => authority.split(':').next().unwrap_or(authority),
    };
    host.to_ascii_lowercase()
}

fn is_served_host(host: &str, bind_host: &str) -> bool {
    host == "localhost"
        || host == bind_host.to_ascii_lowercase()
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// Gate for `POST /api/request`.
///
/// Clients without an `Origin` header (curl, scripts) are accepted; a browser
/// page may only call in from the served host itself.
fn check_request(headers: &[Header], bind_host: &str) -> Result<(), Rejection> {
    if let Some(origin) = header_value(headers, "Origin") {
        let authority = origin
            .strip_prefix("http://")
            .or_else(|| origin.strip_prefix("https://"))
            .map(|rest| rest.split('/').next().unwrap_or(rest));
        let allowed = authority.is_some_and(|a| is_served_host(&authority_host(a), bind_host));
        if !allowed {
            return Err(Rejection::ForeignOrigin(origin.to_string()));
        }
    }
    if let Some(host) = header_value(headers, "Host") {
        if !is_served_host(&authority_host(host), bind_host) {
            return Err(Rejection::ForeignHost(host.to_string()));
        }
    }
    let media_type = header_value(headers, "Content-Type")
        .and_then(|v| v.split(';').next())
        .map(str::trim);
    if !media_type.is_some_and(|t| t.eq_ignore_ascii_case("application/json")) {
        return Err(Rejection::NotJson);
    }
    Ok(())
}

struct WebState {
    scanner: LineScanner,
    settings: Settings,
    requests_served: u64,
}

impl WebState {
    fn new(scanner: LineScanner, settings: Settings) -> Self {
        Self {
            scanner,
            settings,
            requests_served: 0,
        }
    }

    /// Run one protocol request and produce the HTTP status and JSON body.
    fn process(&mut self, body: &str) -> (u16, String) {
        let request: Request = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(err) => {
                return (
                    400,
                    to_json_string(&BasicResponse {
                        ok: false,
                        message: Some(format!("Invalid request: {}", err)),
                    }),
                )
            }
        };

        self.requests_served += 1;
        match protocol::dispatch(&self.scanner, request, &self.settings) {
            Ok(response) => (200, to_json_string(&response)),
            Err(err) => {
                log::debug!("request failed: {}", err);
                let status = if err.is_client_error() { 400 } else { 500 };
                (status, to_json_string(&ProtocolResponse::error(&err)))
            }
        }
    }

    fn health(&self) -> HealthResponse<'static> {
        HealthResponse {
            ok: true,
            file_name: self.scanner.file_name(),
            requests_served: self.requests_served,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

pub fn run(args: ServeArgs, settings: Settings) -> Result<(), i32> {
    let scanner = match LineScanner::open(&args.file) {
        Ok(scanner) => scanner,
        Err(err) => {
            eprintln!("error: {}", err);
            return Err(1);
        }
    };
    let shared = Arc::new(Mutex::new(WebState::new(scanner, settings)));

    let bind_addr = format!("{}:{}", args.host, args.port);
    let server = match Server::http(&bind_addr) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("error: Failed to bind web server on {}: {}", bind_addr, err);
            return Err(1);
        }
    };

    println!(
        "Serving {} at http://{}/api/request",
        args.file.display(),
        bind_addr
    );
    println!("Press Ctrl+C to stop.");

    let shutdown_flag = match setup_shutdown_handlers() {
        Ok(flag) => flag,
        Err(err) => {
            eprintln!("warning: Failed to set signal handlers: {}", err);
            return Err(1);
        }
    };

    while !shutdown_flag.load(Ordering::SeqCst) {
        match server.recv_timeout(Duration::from_millis(TICK_INTERVAL_MS)) {
            Ok(Some(request)) => handle_request(request, &shared, &args.host),
            Ok(None) => {}
            Err(err) => {
                eprintln!("error: Web server receive error: {}", err);
                return Err(1);
            }
        }
    }

    log::info!("shutting down web server");
    Ok(())
}

fn handle_request(request: tiny_http::Request, shared: &Arc<Mutex<WebState>>, bind_host: &str) {
    let mut request = request;
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("");

    match (request.method(), path) {
        (&Method::Get, "/api/health") => {
            let body = to_json_string(&lock_state(shared).health());
            respond_json(request, 200, body);
        }
        (&Method::Post, "/api/request") => {
            if let Err(rejection) = check_request(request.headers(), bind_host) {
                log::warn!("refused request: {}", rejection);
                respond_json_error(request, rejection.status(), rejection.to_string());
                return;
            }
            let body = match read_body(&mut request) {
                Ok(body) => body,
                Err(BodyReadError::TooLarge) => {
                    respond_json_error(request, 413, "Request body too large");
                    return;
                }
                Err(BodyReadError::Invalid(err)) => {
                    respond_json_error(request, 400, format!("Invalid request body: {}", err));
                    return;
                }
            };
            let (status, response) = lock_state(shared).process(&body);
            respond_json(request, status, response);
        }
        (_, "/api/request") | (_, "/api/health") => {
            respond_json_error(request, 405, "Method not allowed");
        }
        _ => respond_json_error(request, 404, "Not found"),
    }
}

fn lock_state<'a>(shared: &'a Arc<Mutex<WebState>>) -> std::sync::MutexGuard<'a, WebState> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read_body(request: &mut tiny_http::Request) -> std::result::Result<String, BodyReadError> {
    if let Some(content_length) = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Length"))
        .and_then(|h| h.value.as_str().parse::<u64>().ok())
    {
        if content_length > MAX_REQUEST_BODY_SIZE as u64 {
            return Err(BodyReadError::TooLarge);
        }
    }

    let mut body = String::new();
    let mut reader = request.as_reader().take((MAX_REQUEST_BODY_SIZE as u64) + 1);
    reader
        .read_to_string(&mut body)
        .map_err(|err| BodyReadError::Invalid(err.to_string()))?;

    if body.len() > MAX_REQUEST_BODY_SIZE {
        return Err(BodyReadError::TooLarge);
    }

    Ok(body)
}

fn respond_json(request: tiny_http::Request, status: u16, body: String) {
    let response = make_response(status, "application/json; charset=utf-8", body);
    let _ = request.respond(response);
}

fn respond_json_error(request: tiny_http::Request, status: u16, message: impl Into<String>) {
    let body = to_json_string(&BasicResponse {
        ok: false,
        message: Some(message.into()),
    });
    respond_json(request, status, body);
}

fn make_response(
    status: u16,
    content_type: &str,
    body: String,
) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(body).with_status_code(StatusCode(status));
    match Header::from_bytes("Content-Type", content_type) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

fn to_json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
