//! WebSocket protocol support built directly on `TcpStream`.
//!
//! - `frame`: RFC 6455 frame codec
//! - `handshake`: opening handshake and accept key
//! - `registry`: bounded set of live clients with broadcast

pub mod frame;
pub mod handshake;
pub mod registry;

use std::net::TcpStream;
use std::time::Duration;

pub use registry::{ClientRegistry, RegistryLimits};

use registry::Added;

use crate::serve::RequestHead;
use crate::{debug, log};

/// Complete the handshake and hand the socket to the registry.
///
/// Failures are logged and the connection dropped; nothing propagates to the
/// caller beyond the returned flag.
pub fn upgrade(
    stream: TcpStream,
    head: &RequestHead,
    registry: &ClientRegistry,
    timeout: Duration,
) -> bool {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |a| a.to_string());

    if let Err(e) = handshake::accept(&stream, head, timeout) {
        log!("ws"; "handshake with {} failed: {}", peer, e);
        return false;
    }
    debug!("ws"; "handshake complete: {}", peer);

    match registry.add(stream) {
        Ok(Added::New(id)) => {
            debug!("ws"; "registered {}", id);
            true
        }
        Ok(Added::AlreadyPresent(id)) => {
            debug!("ws"; "{} already registered", id);
            true
        }
        Err(e) => {
            debug!("ws"; "could not register {}: {}", peer, e);
            false
        }
    }
}
