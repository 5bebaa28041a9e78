//! Connection dispatch: classify each accepted socket as a WebSocket upgrade
//! or a plain HTTP request and hand it to the matching handler.
//!
//! The request head is peeked, not read, until it is complete, so nothing is
//! consumed from a socket whose request turns out to be malformed.

use std::fs;
use std::io::{self, Read};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::inject::inject_script;
use super::path::resolve_path;
use super::request::{RequestHead, head_len};
use super::response::{self, Response};
use crate::config::Config;
use crate::core::Running;
use crate::utils::mime;
use crate::ws::{self, ClientRegistry, handshake};
use crate::{debug, log};

/// Upper bound on a request head.
const MAX_HEAD: usize = 8 * 1024;
/// Request paths that accept a WebSocket upgrade.
pub const WS_PATHS: &[&str] = &["/ws", "/socket"];

/// Shared state for connection handlers.
pub struct ServeContext {
    pub config: Arc<Config>,
    pub registry: Arc<ClientRegistry>,
    pub running: Running,
    /// Canonical HTML directory.
    pub root: PathBuf,
    /// Rendered live-reload `<script>` tag.
    pub script: String,
}

#[derive(Debug)]
enum HeadError {
    Closed,
    TooLarge,
    Io(io::Error),
}

/// What an incoming request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    WebSocket,
    Http,
}

pub fn classify(head: &RequestHead) -> RequestKind {
    if WS_PATHS.contains(&head.path()) || head.is_websocket_upgrade() {
        RequestKind::WebSocket
    } else {
        RequestKind::Http
    }
}

/// Handle one accepted connection to completion (or registration).
pub fn handle_connection(stream: TcpStream, ctx: &ServeContext) {
    let timeout = ctx.config.serve.read_timeout();
    if let Err(e) = stream
        .set_read_timeout(Some(timeout))
        .and_then(|()| stream.set_write_timeout(Some(timeout)))
    {
        debug!("serve"; "socket setup failed: {}", e);
        return;
    }

    let raw = match read_head(&stream, timeout) {
        Ok(raw) => raw,
        Err(HeadError::Closed) => return,
        Err(HeadError::TooLarge) => {
            respond(&stream, &response::header_too_large(), false);
            return;
        }
        Err(HeadError::Io(e)) => {
            debug!("serve"; "failed to read request: {}", e);
            return;
        }
    };

    let head = match RequestHead::parse(&raw) {
        Ok(head) => head,
        Err(e) => {
            debug!("serve"; "bad request: {}", e);
            respond(&stream, &response::bad_request(&e.to_string()), false);
            return;
        }
    };

    if !ctx.running.is_running() {
        respond(&stream, &response::unavailable(), head.method == "HEAD");
        return;
    }

    match classify(&head) {
        RequestKind::WebSocket => handle_upgrade(stream, &head, ctx),
        RequestKind::Http => handle_http(&stream, &head, ctx),
    }
}

fn handle_upgrade(stream: TcpStream, head: &RequestHead, ctx: &ServeContext) {
    if !WS_PATHS.contains(&head.path()) {
        respond(&stream, &response::not_found(), false);
        return;
    }

    if let Err(e) = handshake::client_key(head) {
        log!("ws"; "rejected upgrade: {}", e);
        respond(&stream, &response::bad_request(&e.to_string()), false);
        return;
    }

    ws::upgrade(stream, head, &ctx.registry, ctx.config.ws.handshake_timeout());
}

fn handle_http(stream: &TcpStream, head: &RequestHead, ctx: &ServeContext) {
    let head_only = match head.method.as_str() {
        "GET" => false,
        "HEAD" => true,
        _ => {
            respond(stream, &response::method_not_allowed(), false);
            return;
        }
    };

    let response = serve_path(head.path(), ctx);
    debug!("serve"; "{} {} -> {}", head.method, head.target, response.status);
    respond(stream, &response, head_only);
}

/// Build the response for a GET of `url`.
pub fn serve_path(url: &str, ctx: &ServeContext) -> Response {
    let Some(path) = resolve_path(url, &ctx.root, &ctx.config.serve.index) else {
        return response::not_found();
    };

    let body = match fs::read(&path) {
        Ok(body) => body,
        Err(e) => {
            log!("serve"; "failed to read {}: {}", path.display(), e);
            return response::internal_error();
        }
    };

    let content_type = mime::from_path(&path);
    if !mime::is_html(&path) {
        return Response::new(200, content_type, body);
    }

    Response::new(200, content_type, render_html(body, ctx))
}

/// Apply templates (if enabled and the page is UTF-8) and inject the script.
fn render_html(body: Vec<u8>, ctx: &ServeContext) -> Vec<u8> {
    let template = &ctx.config.template;
    let body = match String::from_utf8(body) {
        Ok(text) if template.enable => {
            crate::template::render(&text, template).into_owned().into_bytes()
        }
        Ok(text) => text.into_bytes(),
        Err(e) => e.into_bytes(),
    };
    inject_script(&body, &ctx.script)
}

fn respond(stream: &TcpStream, response: &Response, head_only: bool) {
    let mut writer = stream;
    if let Err(e) = response.write_to(&mut writer, head_only) {
        debug!("serve"; "failed to write response: {}", e);
    }
}

/// Peek until the head terminator arrives, then consume exactly the head.
fn read_head(stream: &TcpStream, timeout: Duration) -> Result<Vec<u8>, HeadError> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; MAX_HEAD];
    let mut last_seen = 0;

    loop {
        let n = match stream.peek(&mut buf) {
            Ok(0) => return Err(HeadError::Closed),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HeadError::Io(e)),
        };

        if let Some(len) = head_len(&buf[..n]) {
            let mut head = vec![0u8; len];
            let mut reader = stream;
            reader.read_exact(&mut head).map_err(HeadError::Io)?;
            return Ok(head);
        }
        if n == buf.len() {
            return Err(HeadError::TooLarge);
        }
        if Instant::now() >= deadline {
            return Err(HeadError::Io(io::ErrorKind::TimedOut.into()));
        }
        // Peek returns at once while data is buffered; wait for more.
        if n == last_seen {
            thread::sleep(Duration::from_millis(5));
        }
        last_seen = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(raw: &str) -> RequestHead {
        RequestHead::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_classify() {
        let upgrade = head("GET /ws HTTP/1.1\r\nUpgrade: websocket\r\n\r\n");
        assert_eq!(classify(&upgrade), RequestKind::WebSocket);

        let socket = head("GET /socket HTTP/1.1\r\n\r\n");
        assert_eq!(classify(&socket), RequestKind::WebSocket);

        let page = head("GET /index.html HTTP/1.1\r\n\r\n");
        assert_eq!(classify(&page), RequestKind::Http);

        let stray = head("GET /other HTTP/1.1\r\nUpgrade: websocket\r\n\r\n");
        assert_eq!(classify(&stray), RequestKind::WebSocket);
    }
}
