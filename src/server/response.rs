//! HTTP response helpers for the dev server.

use crate::utils::mime;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Request, Response, StatusCode};

/// Serialize `payload` as the JSON response body.
pub fn respond_json<T: Serialize>(request: Request, payload: &T) -> Result<()> {
    let body = match serde_json::to_vec(payload) {
        Ok(body) => body,
        Err(e) => {
            // broken payloads are a server bug, surface a 500 and log
            crate::log!("serve"; "failed to marshal json response: {e}");
            return respond_status(request, 500);
        }
    };

    let response = Response::from_data(body)
        .with_header(make_header("Content-Type", mime::types::JSON));
    request.respond(response).context("failed to write response")
}

/// Empty response with the given status code.
pub fn respond_status(request: Request, status: u16) -> Result<()> {
    request
        .respond(Response::empty(StatusCode(status)))
        .context("failed to write response")
}

/// 503 with a Retry-After hint, for subscription saturation.
pub fn respond_retry_later(request: Request) -> Result<()> {
    let response =
        Response::empty(StatusCode(503)).with_header(make_header("Retry-After", "1"));
    request.respond(response).context("failed to write response")
}

/// Serve the file under `root` the request URL points at.
///
/// Directory URLs fall back to their `index.html`; anything else that
/// does not resolve to a file is a 404.
pub fn respond_static(request: Request, root: &Path) -> Result<()> {
    let Some(path) = resolve_path(request.url(), root) else {
        let response = Response::from_string("404 Not Found")
            .with_status_code(StatusCode(404))
            .with_header(make_header("Content-Type", mime::types::PLAIN));
        return request.respond(response).context("failed to write response");
    };

    let content_type = mime::from_path(&path);
    let body =
        fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let response =
        Response::from_data(body).with_header(make_header("Content-Type", content_type));
    request.respond(response).context("failed to write response")
}

/// Map a request URL to a file below `root`, or `None` when the path
/// escapes the root or does not exist.
fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let relative = path.trim_start_matches('/');

    // refuse anything trying to climb out of the root
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let mut target = root.join(relative);
    if target.is_dir() {
        target = target.join("index.html");
    }

    target.is_file().then_some(target)
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("index.html"), "<html/>").unwrap();
        fs::write(dir.path().join("css/app.css"), "body{}").unwrap();
        fs::write(dir.path().join("secret.txt"), "s").unwrap();
        dir
    }

    #[test]
    fn test_resolve_plain_file() {
        let dir = root();
        assert_eq!(
            resolve_path("/css/app.css", dir.path()),
            Some(dir.path().join("css/app.css"))
        );
    }

    #[test]
    fn test_resolve_directory_falls_back_to_index() {
        let dir = root();
        assert_eq!(
            resolve_path("/", dir.path()),
            Some(dir.path().join("index.html"))
        );
    }

    #[test]
    fn test_resolve_strips_query() {
        let dir = root();
        assert_eq!(
            resolve_path("/index.html?v=abc123", dir.path()),
            Some(dir.path().join("index.html"))
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = root();
        assert_eq!(resolve_path("/../secret.txt", dir.path()), None);
        assert_eq!(resolve_path("/css/../../etc/passwd", dir.path()), None);
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let dir = root();
        assert_eq!(resolve_path("/nope.html", dir.path()), None);
    }
}
