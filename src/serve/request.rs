//! Minimal HTTP/1.x request head parsing.

use thiserror::Error;

/// End of the request head.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("empty request")]
    Empty,

    #[error("malformed request line: {0:?}")]
    RequestLine(String),

    #[error("request head is not valid UTF-8")]
    Encoding,
}

/// Parsed request line and headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Parse the head from raw bytes.
    ///
    /// Bytes after the blank line (if any) are ignored; a head without a
    /// terminator is parsed as far as it goes.
    pub fn parse(raw: &[u8]) -> Result<Self, RequestError> {
        let end = head_len(raw).unwrap_or(raw.len());
        let text = std::str::from_utf8(&raw[..end]).map_err(|_| RequestError::Encoding)?;

        let mut lines = text.split("\r\n");
        let request_line = lines
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(RequestError::Empty)?;

        let mut parts = request_line.split_ascii_whitespace();
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(RequestError::RequestLine(request_line.to_string()));
        };
        if !version.starts_with("HTTP/") {
            return Err(RequestError::RequestLine(request_line.to_string()));
        }

        let headers = lines
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers,
        })
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a comma-separated header contains `token` (case-insensitive).
    pub fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header(name)
            .is_some_and(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
    }

    /// Request path without query string or fragment.
    pub fn path(&self) -> &str {
        let end = self.target.find(['?', '#']).unwrap_or(self.target.len());
        &self.target[..end]
    }

    /// `Upgrade: websocket` is present.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.header_has_token("Upgrade", "websocket")
    }
}

/// Length of the head including the blank line, if complete.
pub fn head_len(raw: &[u8]) -> Option<usize> {
    raw.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}
