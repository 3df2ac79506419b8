//! Dev HTTP server: version long-poll endpoint plus static file root.

mod bus;
mod response;

pub use bus::VersionBus;

use crate::log;
use anyhow::{Context, Result};
use crossbeam::channel::RecvTimeoutError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Method, Request, Server};

/// How long a long-poll request waits before asking the client to
/// reconnect with 205 Reset Content.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(50);

const POLL_VERSION_URL: &str = "/api/v1/poll/version";

#[derive(Serialize)]
struct VersionPayload {
    #[serde(rename = "Version")]
    version: String,
}

/// The HTTP surface of the dev server.
pub struct HttpServer {
    host: String,
    port: u16,
    /// Merged build output served as the static root.
    dir: PathBuf,
    bus: Arc<VersionBus>,
}

impl HttpServer {
    pub fn new(host: &str, port: u16, dir: PathBuf, bus: Arc<VersionBus>) -> Self {
        Self {
            host: host.to_owned(),
            port,
            dir,
            bus,
        }
    }

    /// Bind and run the accept loop until SIGINT/SIGTERM.
    ///
    /// Each request gets its own thread; long-polls park one thread
    /// for up to 50 seconds. In-flight handlers finish after the
    /// accept loop has been unblocked.
    pub fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let server = Server::http(&addr)
            .map_err(|e| anyhow::anyhow!("unable to bind {addr}: {e}"))?;
        let server = Arc::new(server);

        {
            let server = Arc::clone(&server);
            ctrlc::set_handler(move || {
                log!("serve"; "shutting down...");
                server.unblock();
            })
            .context("failed to set shutdown handler")?;
        }

        log!("serve"; "http://{addr}");

        for request in server.incoming_requests() {
            let bus = Arc::clone(&self.bus);
            let dir = self.dir.clone();
            thread::spawn(move || {
                if let Err(e) = route(request, &dir, &bus) {
                    log!("serve"; "request error: {e:#}");
                }
            });
        }

        log!("serve"; "stopped");
        Ok(())
    }
}

fn route(request: Request, dir: &std::path::Path, bus: &VersionBus) -> Result<()> {
    if request.method() != &Method::Get {
        return response::respond_status(request, 405);
    }

    let path = request.url().split(['?', '#']).next().unwrap_or_default();
    if path == POLL_VERSION_URL {
        return poll_version(request, bus);
    }

    response::respond_static(request, dir)
}

/// Long-poll: answer with the next build version, or 205 on timeout
/// so the client reconnects.
fn poll_version(request: Request, bus: &VersionBus) -> Result<()> {
    let subscription = match bus.subscribe() {
        Ok(subscription) => subscription,
        Err(_) => return response::respond_retry_later(request),
    };

    match subscription.recv_timeout(LONG_POLL_TIMEOUT) {
        Ok(version) => response::respond_json(request, &VersionPayload { version }),
        Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
            response::respond_status(request, 205)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpStream;
    use tempfile::TempDir;

    struct TestServer {
        addr: std::net::SocketAddr,
        bus: Arc<VersionBus>,
        _dir: TempDir,
    }

    fn spawn_server() -> TestServer {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>hello</p>").unwrap();

        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = match server.server_addr() {
            tiny_http::ListenAddr::IP(addr) => addr,
            other => panic!("unexpected listen addr: {other:?}"),
        };

        let bus = Arc::new(VersionBus::new());
        let handler_bus = Arc::clone(&bus);
        let root = dir.path().to_owned();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let bus = Arc::clone(&handler_bus);
                let root = root.clone();
                thread::spawn(move || {
                    let _ = route(request, &root, &bus);
                });
            }
        });

        TestServer {
            addr,
            bus,
            _dir: dir,
        }
    }

    fn get(addr: std::net::SocketAddr, path: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();

        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).unwrap();
        let status: u16 = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        let body = rest
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_owned())
            .unwrap_or_default();
        (status, body)
    }

    #[test]
    fn test_static_root_serves_index() {
        let server = spawn_server();
        let (status, body) = get(server.addr, "/");
        assert_eq!(status, 200);
        assert_eq!(body, "<p>hello</p>");
    }

    #[test]
    fn test_unknown_path_is_404() {
        let server = spawn_server();
        let (status, _) = get(server.addr, "/missing.css");
        assert_eq!(status, 404);
    }

    #[test]
    fn test_poll_version_wakes_concurrent_clients() {
        let server = spawn_server();
        let addr = server.addr;

        let clients: Vec<_> = (0..2)
            .map(|_| thread::spawn(move || get(addr, POLL_VERSION_URL)))
            .collect();

        // give both clients time to subscribe before notifying
        thread::sleep(Duration::from_millis(300));
        server.bus.notify("abc123");

        for client in clients {
            let (status, body) = client.join().unwrap();
            assert_eq!(status, 200);
            assert!(body.contains("{\"Version\":\"abc123\"}"), "body: {body}");
        }
    }
}
