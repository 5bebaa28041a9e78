//! Bounded registry of upgraded WebSocket connections.
//!
//! All mutation happens under a single lock. The registry owns every socket
//! it stores: sockets are switched to non-blocking on insertion and are only
//! written through `broadcast`, `service` and `close_all`.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use super::frame::{self, Frame, FrameError, Opcode};
use crate::config::WsConfig;
use crate::reload::message::ReloadMessage;
use crate::{debug, log};

/// Total time one client may spend in a `service` pass, however its bytes
/// trickle in.
const CLIENT_READ_BUDGET: Duration = Duration::from_millis(250);
/// Bound on the close frame written during shutdown.
const CLOSE_SEND_TIMEOUT: Duration = Duration::from_millis(100);
/// Inbound frames handled per client per `service` pass.
const MAX_FRAMES_PER_PASS: usize = 16;
/// Close status "going away".
const CLOSE_GOING_AWAY: u16 = 1001;

/// Identity of a registered connection (its peer address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(SocketAddr);

impl ClientId {
    pub fn of(stream: &TcpStream) -> io::Result<Self> {
        stream.peer_addr().map(Self)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("client limit of {0} reached")]
    Full(usize),

    #[error("failed to prepare client socket")]
    Io(#[from] io::Error),
}

/// Result of a successful `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    New(ClientId),
    AlreadyPresent(ClientId),
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that received the message.
    pub delivered: usize,
    /// Clients removed by the liveness sweep.
    pub pruned: usize,
    /// Clients removed after a failed send.
    pub failed: usize,
}

/// Registry sizing and socket timeouts.
#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    pub capacity: usize,
    pub send_timeout: Duration,
    pub max_payload: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        WsConfig::default().limits()
    }
}

struct Slot {
    id: ClientId,
    stream: TcpStream,
}

struct Slots {
    entries: Vec<Option<Slot>>,
    count: usize,
}

impl Slots {
    fn position(&self, id: ClientId) -> Option<usize> {
        self.entries
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.id == id))
    }

    /// Empty slot `index` and return its socket.
    fn take(&mut self, index: usize) -> Option<Slot> {
        let slot = self.entries.get_mut(index)?.take()?;
        self.count -= 1;
        Some(slot)
    }
}

/// Thread-safe, fixed-capacity set of live clients.
pub struct ClientRegistry {
    slots: Mutex<Slots>,
    limits: RegistryLimits,
}

impl ClientRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        let entries = std::iter::repeat_with(|| None).take(limits.capacity).collect();
        Self {
            slots: Mutex::new(Slots { entries, count: 0 }),
            limits,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.lock().count
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn contains(&self, id: ClientId) -> bool {
        self.slots.lock().position(id).is_some()
    }

    /// Register an upgraded connection.
    ///
    /// A full registry closes the new connection. Adding a connection that is
    /// already registered is a no-op.
    pub fn add(&self, stream: TcpStream) -> Result<Added, RegistryError> {
        let id = match ClientId::of(&stream) {
            Ok(id) => id,
            Err(e) => {
                close_stream(&stream);
                return Err(e.into());
            }
        };

        if let Err(e) = stream.set_nonblocking(true) {
            log!("ws"; "failed to make client {} non-blocking: {}", id, e);
            close_stream(&stream);
            return Err(e.into());
        }

        let mut slots = self.slots.lock();
        if slots.position(id).is_some() {
            return Ok(Added::AlreadyPresent(id));
        }

        if slots.count >= self.limits.capacity {
            drop(slots);
            log!("ws"; "client limit reached ({}), rejecting {}", self.limits.capacity, id);
            close_stream(&stream);
            return Err(RegistryError::Full(self.limits.capacity));
        }

        let Some(free) = slots.entries.iter().position(Option::is_none) else {
            return Err(RegistryError::Full(self.limits.capacity));
        };
        slots.entries[free] = Some(Slot { id, stream });
        slots.count += 1;
        log!("ws"; "client connected: {} (total: {})", id, slots.count);
        Ok(Added::New(id))
    }

    /// Remove and close a client. Returns `false` if it was not registered.
    pub fn remove(&self, id: ClientId) -> bool {
        let slot = {
            let mut slots = self.slots.lock();
            let Some(index) = slots.position(id) else {
                return false;
            };
            let slot = slots.take(index);
            if slot.is_some() {
                debug!("ws"; "client removed: {} (total: {})", id, slots.count);
            }
            slot
        };

        match slot {
            Some(slot) => {
                close_stream(&slot.stream);
                true
            }
            None => false,
        }
    }

    /// Non-destructive liveness check of a registered client.
    #[cfg(test)]
    pub fn is_alive(&self, id: ClientId) -> bool {
        let slots = self.slots.lock();
        slots
            .position(id)
            .and_then(|i| slots.entries[i].as_ref())
            .is_some_and(|slot| is_alive(&slot.stream))
    }

    /// Send `message` as a text frame to every live client.
    ///
    /// The lock is held for the whole operation: dead peers are swept first,
    /// then each survivor gets the frame within the send timeout or is
    /// dropped.
    pub fn broadcast(&self, message: &str) -> BroadcastReport {
        let bytes = frame::encode(message.as_bytes(), Opcode::Text);
        let mut report = BroadcastReport::default();
        let mut slots = self.slots.lock();

        for index in 0..slots.entries.len() {
            let dead = slots.entries[index]
                .as_ref()
                .is_some_and(|slot| !is_alive(&slot.stream));
            if dead && let Some(slot) = slots.take(index) {
                debug!("ws"; "client {} disconnected, removing", slot.id);
                close_stream(&slot.stream);
                report.pruned += 1;
            }
        }

        for index in 0..slots.entries.len() {
            let Some(slot) = slots.entries[index].as_ref() else {
                continue;
            };
            match send_bytes(&slot.stream, &bytes, self.limits.send_timeout) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    if let Some(slot) = slots.take(index) {
                        debug!("ws"; "send to {} failed ({}), removing", slot.id, e);
                        close_stream(&slot.stream);
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }

    /// Handle pending inbound frames from every client.
    ///
    /// Protocol pings get a pong with the same payload, the text `ping` gets
    /// a text `pong`, and close frames are echoed before the client is
    /// removed. Read errors and malformed frames drop the client. Returns the
    /// number of frames handled.
    pub fn service(&self) -> usize {
        let mut handled = 0;
        let mut dropped = Vec::new();
        {
            let slots = self.slots.lock();
            for slot in slots.entries.iter().flatten() {
                if let Err(reason) = self.service_client(slot, &mut handled) {
                    dropped.push((slot.id, reason));
                }
            }
        }

        for (id, reason) in dropped {
            debug!("ws"; "client {} dropped: {}", id, reason);
            self.remove(id);
        }
        handled
    }

    /// Drain up to `MAX_FRAMES_PER_PASS` frames from one client within
    /// `CLIENT_READ_BUDGET`. `Err` carries the reason the client must be
    /// dropped.
    fn service_client(&self, slot: &Slot, handled: &mut usize) -> Result<(), String> {
        let deadline = Instant::now() + CLIENT_READ_BUDGET;
        for _ in 0..MAX_FRAMES_PER_PASS {
            let frame = match next_frame(&slot.stream, self.limits.max_payload, deadline) {
                Ok(Inbound::Idle) => return Ok(()),
                Ok(Inbound::Closed) => return Err("peer closed".into()),
                Ok(Inbound::Frame(frame)) => frame,
                Err(e) => return Err(e.to_string()),
            };
            *handled += 1;
            if frame.is_truncated() {
                return Err(format!(
                    "{:?} frame of {} bytes exceeds limit",
                    frame.opcode, frame.len
                ));
            }

            let is_ping =
                frame.as_text().and_then(ReloadMessage::parse) == Some(ReloadMessage::Ping);
            let reply = match frame.opcode {
                Opcode::Ping => Some(Frame::pong(&frame.payload)),
                Opcode::Text if is_ping => Some(Frame::text(ReloadMessage::Pong.as_str())),
                Opcode::Close => {
                    let echo = Frame::close(frame.close_code());
                    let _ = send_bytes(&slot.stream, &echo.to_bytes(), CLOSE_SEND_TIMEOUT);
                    return Err("close frame received".into());
                }
                _ => {
                    debug!("ws"; "ignoring {:?} frame from {}", frame.opcode, slot.id);
                    None
                }
            };

            if let Some(reply) = reply {
                send_bytes(&slot.stream, &reply.to_bytes(), self.limits.send_timeout)
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }

    /// Send a close frame to every client and empty the registry.
    pub fn close_all(&self) {
        let mut slots = self.slots.lock();
        let close = Frame::close(Some(CLOSE_GOING_AWAY)).to_bytes();
        let mut closed = 0;

        for index in 0..slots.entries.len() {
            if let Some(slot) = slots.take(index) {
                let _ = send_bytes(&slot.stream, &close, CLOSE_SEND_TIMEOUT);
                close_stream(&slot.stream);
                closed += 1;
            }
        }

        if closed > 0 {
            debug!("ws"; "closed {} client(s)", closed);
        }
    }
}

impl Drop for ClientRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

// =============================================================================
// Socket helpers
// =============================================================================

/// Liveness check on a non-blocking socket.
///
/// A non-blocking peek doubles as a zero-timeout readiness poll: `0` bytes
/// means the peer closed, would-block means alive with nothing pending.
pub fn is_alive(stream: &TcpStream) -> bool {
    let mut peek = [0u8; 1];
    match stream.peek(&mut peek) {
        Ok(0) => false,
        Ok(_) => true,
        Err(e) => matches!(
            e.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        ),
    }
}

/// Write all of `bytes` to a non-blocking socket before `timeout` elapses.
fn send_bytes(stream: &TcpStream, bytes: &[u8], timeout: Duration) -> io::Result<()> {
    let deadline = Instant::now() + timeout;
    let mut writer = stream;
    let mut sent = 0;

    while sent < bytes.len() {
        match writer.write(&bytes[sent..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out"));
                }
                thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

enum Inbound {
    Idle,
    Closed,
    Frame(Frame),
}

/// Read the next frame if any bytes are pending.
///
/// The socket is briefly switched to blocking so a frame split across
/// segments is read whole, but never past `deadline`.
fn next_frame(
    stream: &TcpStream,
    max_payload: usize,
    deadline: Instant,
) -> Result<Inbound, FrameError> {
    if !has_pending(stream)? {
        return Ok(if is_alive(stream) { Inbound::Idle } else { Inbound::Closed });
    }

    stream.set_nonblocking(false)?;
    let mut reader = DeadlineReader { stream, deadline };
    let result = frame::read_frame(&mut reader, max_payload);
    stream.set_nonblocking(true)?;

    result.map(Inbound::Frame)
}

/// Blocking reader that fails with `TimedOut` once `deadline` passes.
struct DeadlineReader<'a> {
    stream: &'a TcpStream,
    deadline: Instant,
}

impl Read for DeadlineReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "frame read budget exhausted"));
        }
        self.stream.set_read_timeout(Some(left))?;
        let mut stream = self.stream;
        stream.read(buf)
    }
}

fn has_pending(stream: &TcpStream) -> io::Result<bool> {
    let mut peek = [0u8; 1];
    match stream.peek(&mut peek) {
        Ok(n) => Ok(n > 0),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

fn close_stream(stream: &TcpStream) {
    let _ = stream.shutdown(Shutdown::Both);
}
