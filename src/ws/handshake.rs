//! Opening handshake (RFC 6455 section 4.2).

use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;

use base64::Engine;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::serve::RequestHead;

/// Fixed GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Handshake failures, one per missing requirement.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("missing `Upgrade: websocket` header")]
    MissingUpgrade,

    #[error("missing `Connection: Upgrade` header")]
    MissingConnection,

    #[error("missing `Sec-WebSocket-Key` header")]
    MissingKey,

    #[error("failed to write handshake response")]
    Io(#[from] io::Error),
}

/// Validate an upgrade request and return its client key.
pub fn client_key(head: &RequestHead) -> Result<&str, HandshakeError> {
    if !head.is_websocket_upgrade() {
        return Err(HandshakeError::MissingUpgrade);
    }
    if !head.header_has_token("Connection", "upgrade") {
        return Err(HandshakeError::MissingConnection);
    }
    head.header("Sec-WebSocket-Key")
        .filter(|k| !k.is_empty())
        .ok_or(HandshakeError::MissingKey)
}

/// `base64(SHA-1(key + GUID))`
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// The `101 Switching Protocols` response for an accept key.
pub fn response(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    )
}

/// Write the handshake response for `head` to `writer`.
pub fn respond<W: Write>(writer: &mut W, head: &RequestHead) -> Result<(), HandshakeError> {
    let key = client_key(head)?;
    writer.write_all(response(&accept_key(key)).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Complete the handshake on a socket, bounded by `timeout`.
///
/// Registration of the upgraded socket is left to the caller.
pub fn accept(
    stream: &TcpStream,
    head: &RequestHead,
    timeout: Duration,
) -> Result<(), HandshakeError> {
    stream.set_write_timeout(Some(timeout))?;
    let mut writer = stream;
    respond(&mut writer, head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(raw: &str) -> RequestHead {
        RequestHead::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_rfc_accept_key() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_response_format() {
        let text = response("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("\r\nUpgrade: websocket\r\n"));
        assert!(text.contains("\r\nConnection: Upgrade\r\n"));
        assert!(text.contains("\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_respond_writes_accept() {
        let request = head(
            "GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        );
        let mut out = Vec::new();
        respond(&mut out, &request).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[test]
    fn test_distinct_failure_reasons() {
        let no_upgrade =
            head("GET /ws HTTP/1.1\r\nConnection: Upgrade\r\nSec-WebSocket-Key: a\r\n\r\n");
        assert!(matches!(client_key(&no_upgrade), Err(HandshakeError::MissingUpgrade)));

        let no_connection =
            head("GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nSec-WebSocket-Key: a\r\n\r\n");
        assert!(matches!(client_key(&no_connection), Err(HandshakeError::MissingConnection)));

        let no_key = head("GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n");
        assert!(matches!(client_key(&no_key), Err(HandshakeError::MissingKey)));
    }

    #[test]
    fn test_failed_handshake_writes_nothing() {
        let no_key = head("GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n");
        let mut out = Vec::new();
        assert!(respond(&mut out, &no_key).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_connection_header_token_list() {
        let firefox = head(
            "GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: keep-alive, Upgrade\r\n\
             Sec-WebSocket-Key: x3JJHMbDL1EzLkh9GBhXDw==\r\n\r\n",
        );
        assert_eq!(client_key(&firefox).unwrap(), "x3JJHMbDL1EzLkh9GBhXDw==");
        assert_eq!(accept_key("x3JJHMbDL1EzLkh9GBhXDw=="), "HSmrc0sMlYUkAGmm5OPpG2HaGWk=");
    }
}
