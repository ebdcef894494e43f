//! Bucket lifecycle RPC surface of the Garage COSI driver.
//!
//! JSON over HTTP, one route per lifecycle operation:
//!
//! | Route | Operation |
//! |---|---|
//! | `GET /v1/driver` | driver identity |
//! | `POST /v1/buckets` | create bucket |
//! | `DELETE /v1/buckets/{id}` | delete bucket |
//! | `POST /v1/access` | grant bucket access |
//! | `DELETE /v1/access/{account_id}` | revoke bucket access |
//! | `GET /health` | liveness |
//!
//! A fixed pool of worker threads serves requests from one listener. The
//! [`TestServer`] helper starts a server on a random port for integration
//! testing.

use garage_cosi_admin::CallContext;
use garage_cosi_core::{
    EngineContext, ErrorKind, GrantAccessRequest, ProvisionError, ProvisioningEngine,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

/// Optional per-request deadline, in milliseconds.
pub const TIMEOUT_HEADER: &str = "X-Request-Timeout-Ms";

/// How often idle workers look at the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Identity plus the provisioning engine behind every route.
pub struct Driver {
    name: String,
    engine: ProvisioningEngine,
}

impl Driver {
    pub fn new(name: &str, context: EngineContext) -> Self {
        Self {
            name: name.to_owned(),
            engine: ProvisioningEngine::new(context),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Driver,
    Health,
    Buckets,
    Bucket(&'a str),
    Access,
    Account(&'a str),
}

/// Map a request path (query string ignored) to a route.
pub fn parse_route(url: &str) -> Option<Route<'_>> {
    let path = url.split_once('?').map_or(url, |(p, _)| p);
    match path {
        "/v1/driver" => return Some(Route::Driver),
        "/health" => return Some(Route::Health),
        "/v1/buckets" => return Some(Route::Buckets),
        "/v1/access" => return Some(Route::Access),
        _ => {}
    }
    if let Some(id) = path.strip_prefix("/v1/buckets/") {
        if !id.is_empty() && !id.contains('/') {
            return Some(Route::Bucket(id));
        }
    }
    if let Some(id) = path.strip_prefix("/v1/access/") {
        if !id.is_empty() && !id.contains('/') {
            return Some(Route::Account(id));
        }
    }
    None
}

/// HTTP status reported for each error kind.
pub fn http_status(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidArgument => 400,
        ErrorKind::Internal => 500,
        ErrorKind::Unsupported => 501,
        ErrorKind::Cancelled => 499,
        ErrorKind::DeadlineExceeded => 504,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverInfo {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBucketBody {
    pub name: String,
}

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("valid header")
}

fn respond_json(req: tiny_http::Request, code: u16, value: &impl Serialize) {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    let _ = req.respond(
        Response::from_data(body)
            .with_status_code(StatusCode(code))
            .with_header(json_header()),
    );
}

fn respond_err(req: tiny_http::Request, code: u16, kind: &str, message: &str) {
    respond_json(
        req,
        code,
        &ErrorBody {
            code: kind.to_owned(),
            message: message.to_owned(),
        },
    );
}

fn respond_provision_err(req: tiny_http::Request, err: &ProvisionError) {
    let kind = err.kind();
    respond_err(req, http_status(kind), kind.as_str(), err.message());
}

fn read_json<T: serde::de::DeserializeOwned>(req: &mut tiny_http::Request) -> Result<T, String> {
    let mut body = Vec::new();
    req.as_reader()
        .read_to_end(&mut body)
        .map_err(|e| format!("failed to read request body: {e}"))?;
    serde_json::from_slice(&body).map_err(|e| format!("malformed request body: {e}"))
}

/// Derive the call context for one request from the server root.
fn call_context(root: &CallContext, req: &tiny_http::Request) -> Result<CallContext, String> {
    let Some(header) = req
        .headers()
        .iter()
        .find(|h| h.field.equiv(TIMEOUT_HEADER))
    else {
        return Ok(root.clone());
    };
    let millis: u64 = header
        .value
        .as_str()
        .trim()
        .parse()
        .map_err(|_| format!("invalid {TIMEOUT_HEADER} header"))?;
    Ok(root.with_timeout(Duration::from_millis(millis)))
}

/// Handle a single HTTP request, dispatching to the matching lifecycle operation.
pub fn handle_request(driver: &Driver, root: &CallContext, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let Some(route) = parse_route(&url) else {
        respond_err(req, 404, "NotFound", "not found");
        return;
    };

    let call = match call_context(root, &req) {
        Ok(c) => c,
        Err(msg) => {
            respond_err(req, 400, ErrorKind::InvalidArgument.as_str(), &msg);
            return;
        }
    };

    match (route, &method) {
        (Route::Health, Method::Get) => {
            respond_json(req, 200, &serde_json::json!({"status": "ok"}));
        }
        (Route::Driver, Method::Get) => {
            respond_json(
                req,
                200,
                &DriverInfo {
                    name: driver.name.clone(),
                },
            );
        }
        (Route::Buckets, Method::Post) => {
            let body: CreateBucketBody = match read_json(&mut req) {
                Ok(b) => b,
                Err(msg) => {
                    return respond_err(req, 400, ErrorKind::InvalidArgument.as_str(), &msg);
                }
            };
            match driver.engine.create_bucket(&call, &body.name) {
                Ok(resp) => respond_json(req, 200, &resp),
                Err(e) => respond_provision_err(req, &e),
            }
        }
        (Route::Bucket(id), Method::Delete) => match driver.engine.delete_bucket(&call, id) {
            Ok(()) => respond_json(req, 200, &serde_json::json!({})),
            Err(e) => respond_provision_err(req, &e),
        },
        (Route::Access, Method::Post) => {
            let body: GrantAccessRequest = match read_json(&mut req) {
                Ok(b) => b,
                Err(msg) => {
                    return respond_err(req, 400, ErrorKind::InvalidArgument.as_str(), &msg);
                }
            };
            match driver.engine.grant_access(&call, &body) {
                Ok(resp) => respond_json(req, 200, &resp),
                Err(e) => respond_provision_err(req, &e),
            }
        }
        (Route::Account(id), Method::Delete) => match driver.engine.revoke_access(&call, id) {
            Ok(()) => respond_json(req, 200, &serde_json::json!({})),
            Err(e) => respond_provision_err(req, &e),
        },
        _ => respond_err(req, 405, "MethodNotAllowed", "method not allowed"),
    }
}

fn worker_loop(driver: &Driver, server: &Server, root: &CallContext) {
    while !root.is_cancelled() {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => handle_request(driver, root, request),
            Ok(None) => {}
            Err(e) => {
                error!("failed to receive request: {e}");
                break;
            }
        }
    }
}

/// Start `workers` threads serving `server` until `root` is cancelled.
pub fn spawn_workers(
    driver: &Arc<Driver>,
    server: &Arc<Server>,
    root: &CallContext,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    (0..workers.max(1))
        .map(|_| {
            let driver = Arc::clone(driver);
            let server = Arc::clone(server);
            let root = root.clone();
            std::thread::spawn(move || worker_loop(&driver, &server, &root))
        })
        .collect()
}

/// Serve on `addr`, blocking until `root` is cancelled and every worker
/// has finished its current request.
pub fn run_server(
    driver: &Arc<Driver>,
    addr: &str,
    workers: usize,
    root: &CallContext,
) -> Result<(), ServerError> {
    let server = Server::http(addr).map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })?;
    info!("serving bucket lifecycle API for {} on {addr}", driver.name());

    let server = Arc::new(server);
    for handle in spawn_workers(driver, &server, root, workers) {
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }
    info!("server stopped");
    Ok(())
}

/// A test helper that serves a driver on a random port in background threads.
///
/// Dropping the `TestServer` cancels its root context, which stops the workers.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    root: CallContext,
    _server: Arc<Server>,
    _handles: Vec<JoinHandle<()>>,
}

impl TestServer {
    /// Bind `127.0.0.1:0` and serve `context` with two workers.
    pub fn start(driver_name: &str, context: EngineContext) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let driver = Arc::new(Driver::new(driver_name, context));
        let root = CallContext::background();
        let handles = spawn_workers(&driver, &server, &root, 2);

        Self {
            url,
            port,
            root,
            _server: server,
            _handles: handles,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fixed_routes() {
        assert_eq!(parse_route("/v1/driver"), Some(Route::Driver));
        assert_eq!(parse_route("/health"), Some(Route::Health));
        assert_eq!(parse_route("/v1/buckets"), Some(Route::Buckets));
        assert_eq!(parse_route("/v1/access"), Some(Route::Access));
    }

    #[test]
    fn parse_id_routes() {
        assert_eq!(parse_route("/v1/buckets/abc123"), Some(Route::Bucket("abc123")));
        assert_eq!(parse_route("/v1/access/GK42"), Some(Route::Account("GK42")));
        assert_eq!(
            parse_route("/v1/buckets/abc123?trace=1"),
            Some(Route::Bucket("abc123"))
        );
    }

    #[test]
    fn parse_rejects_unknown_and_nested() {
        assert!(parse_route("/v1/buckets/").is_none());
        assert!(parse_route("/v1/buckets/a/b").is_none());
        assert!(parse_route("/v2/driver").is_none());
        assert!(parse_route("/").is_none());
    }

    #[test]
    fn error_kind_statuses() {
        assert_eq!(http_status(ErrorKind::InvalidArgument), 400);
        assert_eq!(http_status(ErrorKind::Unsupported), 501);
        assert_eq!(http_status(ErrorKind::Internal), 500);
        assert_eq!(http_status(ErrorKind::DeadlineExceeded), 504);
    }
}
