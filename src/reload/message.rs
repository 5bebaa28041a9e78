//! Application messages carried in text frames.
//!
//! The server sends `reload` and `ping`; a browser may send `ping`, which is
//! answered with `pong`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMessage {
    /// Refresh the page.
    Reload,
    /// Keep-alive, in either direction.
    Ping,
    /// Reply to a client `ping`.
    Pong,
}

impl ReloadMessage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Exact, case-sensitive match on the payload.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "reload" => Some(Self::Reload),
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }
}

impl fmt::Display for ReloadMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
