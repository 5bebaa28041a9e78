//! Server lifecycle management.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;

use crate::core::Running;
use crate::{debug, log};

const LISTEN_BACKLOG: i32 = 128;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr} after {attempts} attempt(s)")]
    Bind {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("shutdown requested while waiting for {0}")]
    Interrupted(SocketAddr),
}

/// Bind `addr`, retrying while the port is in use.
///
/// Makes up to `attempts` tries, `delay` apart. Errors other than
/// `AddrInUse` fail immediately.
pub fn bind_with_retry(
    addr: SocketAddr,
    attempts: u32,
    delay: Duration,
    running: &Running,
) -> Result<TcpListener, ServeError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match bind_reusable(addr) {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && attempt < attempts => {
                log!(
                    "serve";
                    "port {} in use, retrying in {}ms ({}/{})",
                    addr.port(),
                    delay.as_millis(),
                    attempt,
                    attempts
                );
                if !running.sleep(delay) {
                    return Err(ServeError::Interrupted(addr));
                }
                attempt += 1;
            }
            Err(source) => {
                return Err(ServeError::Bind {
                    addr,
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

/// Listening socket with SO_REUSEADDR, plus SO_REUSEPORT where supported.
///
/// Windows keeps its default: SO_REUSEADDR there lets a second process take
/// a port that is already bound.
fn bind_reusable(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;
    #[cfg(all(
        unix,
        not(any(target_os = "solaris", target_os = "illumos", target_os = "cygwin"))
    ))]
    socket.set_reuse_port(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

/// Spawn a named background thread.
pub fn spawn_named<F>(name: &str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .with_context(|| format!("failed to spawn {name} thread"))
}

/// Join background threads, giving up after `timeout` in total.
pub fn wait_for_shutdown(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    let deadline = Instant::now() + timeout;

    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                log!("serve"; "{} thread did not stop in time", name);
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
        let _ = handle.join();
        debug!("serve"; "{} thread stopped", name);
    }
}
