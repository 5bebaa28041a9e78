//! WebSocket frame codec (RFC 6455 section 5).
//!
//! Server frames are always sent with FIN set and without a mask. Client
//! frames are unmasked on read. Fragmentation is not supported.

use std::io::{self, Read};

use thiserror::Error;

/// Largest payload that fits in the 7-bit length field.
const MAX_SHORT_LEN: usize = 125;
/// Marker for a 16-bit extended length.
const LEN_U16: u8 = 126;
/// Marker for a 64-bit extended length.
const LEN_U64: u8 = 127;

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const MASK_BIT: u8 = 0x80;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Result<Self, FrameError> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }

    /// Close, ping and pong are control frames.
    pub const fn is_control(self) -> bool {
        (self as u8) & 0x8 != 0
    }
}

/// Frame decoding errors. Every variant is fatal for the connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame read failed")]
    Io(#[from] io::Error),

    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),

    #[error("reserved bits set without a negotiated extension")]
    ReservedBits,

    #[error("control frame payload of {0} bytes exceeds 125")]
    ControlTooLong(u64),

    #[error("fragmented control frame")]
    FragmentedControl,

    #[error("64-bit length has the most significant bit set")]
    LengthOverflow,
}

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    /// Payload length as declared on the wire.
    pub len: u64,
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload, possibly shorter than `len` if truncated on read.
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        Self {
            fin: true,
            opcode,
            len: payload.len() as u64,
            mask: None,
            payload,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(Opcode::Text, text.as_bytes())
    }

    pub fn pong(payload: &[u8]) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Close frame, optionally carrying a status code.
    pub fn close(code: Option<u16>) -> Self {
        let payload = code.map(|c| c.to_be_bytes().to_vec()).unwrap_or_default();
        Self::new(Opcode::Close, payload)
    }

    /// Attach a masking key (client-to-server frames).
    pub fn masked(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Payload as UTF-8 text, if valid.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Status code of a close frame, if present.
    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_slice()) {
            (Opcode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Whether the payload was cut short by the read ceiling.
    pub fn is_truncated(&self) -> bool {
        (self.payload.len() as u64) < self.len
    }

    /// Serialize to wire bytes, masking the payload if a key is set.
    pub fn to_bytes(&self) -> Vec<u8> {
        let masked = self.mask.is_some();
        let len = self.payload.len();
        let mut out = Vec::with_capacity(header_len(len, masked) + len);
        let fin = if self.fin { FIN_BIT } else { 0 };
        out.push(fin | (self.opcode as u8));

        let mask_bit = if masked { MASK_BIT } else { 0 };
        push_length(&mut out, self.payload.len(), mask_bit);

        match self.mask {
            Some(key) => {
                out.extend_from_slice(&key);
                let start = out.len();
                out.extend_from_slice(&self.payload);
                apply_mask(&mut out[start..], key);
            }
            None => out.extend_from_slice(&self.payload),
        }
        out
    }
}

/// Encode a server-to-client frame: FIN set, never masked.
pub fn encode(payload: &[u8], opcode: Opcode) -> Vec<u8> {
    let mut out = Vec::with_capacity(header_len(payload.len(), false) + payload.len());
    out.push(FIN_BIT | (opcode as u8));
    push_length(&mut out, payload.len(), 0);
    out.extend_from_slice(payload);
    out
}

/// Header size (without payload) for a payload of `len` bytes.
pub const fn header_len(len: usize, masked: bool) -> usize {
    let base = if len <= MAX_SHORT_LEN {
        2
    } else if len <= u16::MAX as usize {
        4
    } else {
        10
    };
    if masked { base + 4 } else { base }
}

fn push_length(out: &mut Vec<u8>, len: usize, mask_bit: u8) {
    if len <= MAX_SHORT_LEN {
        out.push(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(mask_bit | LEN_U16);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | LEN_U64);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

/// XOR `payload` with the 4-byte key, cycling from the first byte.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Read one frame from `reader`.
///
/// Payload bytes beyond `max_payload` are read and discarded so the stream
/// stays aligned on the next frame; the returned frame keeps the declared
/// length in `len`. A short header read is an error, never retried.
pub fn read_frame<R: Read>(reader: &mut R, max_payload: usize) -> Result<Frame, FrameError> {
    let mut head = [0u8; 2];
    reader.read_exact(&mut head)?;

    if head[0] & RSV_BITS != 0 {
        return Err(FrameError::ReservedBits);
    }
    let fin = head[0] & FIN_BIT != 0;
    let opcode = Opcode::from_u8(head[0] & 0x0F)?;
    let masked = head[1] & MASK_BIT != 0;

    let len = match head[1] & 0x7F {
        LEN_U16 => {
            let mut ext = [0u8; 2];
            reader.read_exact(&mut ext)?;
            u64::from(u16::from_be_bytes(ext))
        }
        LEN_U64 => {
            let mut ext = [0u8; 8];
            reader.read_exact(&mut ext)?;
            let len = u64::from_be_bytes(ext);
            if len >> 63 != 0 {
                return Err(FrameError::LengthOverflow);
            }
            len
        }
        short => u64::from(short),
    };

    if opcode.is_control() {
        if len > MAX_SHORT_LEN as u64 {
            return Err(FrameError::ControlTooLong(len));
        }
        if !fin {
            return Err(FrameError::FragmentedControl);
        }
    }

    let mask = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key)?;
        Some(key)
    } else {
        None
    };

    let keep = len.min(max_payload as u64);
    let mut payload = vec![0u8; keep as usize];
    reader.read_exact(&mut payload)?;

    let excess = len - keep;
    if excess > 0 {
        let skipped = io::copy(&mut reader.by_ref().take(excess), &mut io::sink())?;
        if skipped < excess {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        crate::debug!("ws"; "frame truncated: {} of {} bytes kept", keep, len);
    }

    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Ok(Frame {
        fin,
        opcode,
        len,
        mask,
        payload,
    })
}

/// Decode one frame from an in-memory buffer.
#[cfg(test)]
pub fn decode(bytes: &[u8], max_payload: usize) -> Result<Frame, FrameError> {
    read_frame(&mut io::Cursor::new(bytes), max_payload)
}

// ============================================================================
// Tests
// ============================================================================
