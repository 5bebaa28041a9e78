//! HTTP responses written straight to the socket.
//!
//! Every response closes the connection and forbids caching, so a browser
//! never shows a stale page between reloads.

use std::io::{self, Write};

use crate::utils::mime::types::{HTML, PLAIN};

/// Headers sent with every response.
const NO_CACHE_HEADERS: &[(&str, &str)] = &[
    ("Cache-Control", "no-store, no-cache, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
    ("Connection", "close"),
];

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    headers: Vec<(&'static str, String)>,
}

impl Response {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Serialize the status line and headers.
    fn head(&self) -> String {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n",
            self.status,
            reason(self.status),
            self.content_type,
            self.body.len()
        );
        for (name, value) in NO_CACHE_HEADERS {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");
        head
    }

    /// Write the response; `head_only` omits the body (HEAD requests).
    pub fn write_to<W: Write>(&self, writer: &mut W, head_only: bool) -> io::Result<()> {
        writer.write_all(self.head().as_bytes())?;
        if !head_only {
            writer.write_all(&self.body)?;
        }
        writer.flush()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn error_page(status: u16, detail: &str) -> Response {
    let title = format!("{} {}", status, reason(status));
    let body = format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{detail}</p></body></html>\n"
    );
    Response::new(status, HTML, body)
}

pub fn not_found() -> Response {
    error_page(404, "The requested file was not found on this server.")
}

pub fn method_not_allowed() -> Response {
    error_page(405, "Only GET and HEAD are supported.").with_header("Allow", "GET, HEAD")
}

pub fn internal_error() -> Response {
    error_page(500, "The file could not be read.")
}

pub fn bad_request(detail: &str) -> Response {
    Response::new(400, PLAIN, format!("400 Bad Request: {detail}\n"))
}

pub fn header_too_large() -> Response {
    Response::new(431, PLAIN, "431 Request Header Fields Too Large\n")
}

pub fn unavailable() -> Response {
    Response::new(503, PLAIN, "503 Service Unavailable\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(response: &Response, head_only: bool) -> String {
        let mut out = Vec::new();
        response.write_to(&mut out, head_only).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_headers_present() {
        let text = render(&Response::new(200, HTML, "<p>hi</p>"), false);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.contains("Cache-Control: no-store, no-cache, must-revalidate\r\n"));
        assert!(text.contains("Pragma: no-cache\r\n"));
        assert!(text.contains("Expires: 0\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[test]
    fn test_head_only_keeps_length() {
        let text = render(&Response::new(200, PLAIN, "abc"), true);
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_method_not_allowed_has_allow() {
        let text = render(&method_not_allowed(), false);
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(text.contains("Allow: GET, HEAD\r\n"));
    }

    #[test]
    fn test_not_found_body() {
        let response = not_found();
        assert_eq!(response.status, 404);
        assert!(String::from_utf8_lossy(&response.body).contains("404 Not Found"));
    }
}
