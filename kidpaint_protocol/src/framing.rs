// Kind-tagged, length-delimited framing over TCP.
//
// Wire format of one frame, all integers big-endian:
//
//   kind: i32 | length: i32 | payload: [u8; length]
//
// `kind` selects the payload encoding (see `MessageKind`); the payload
// itself is opaque at this layer. `write_frame` and `read_frame` work on any
// `Write`/`Read`, so the same code serves blocking `TcpStream`s, buffered
// wrappers, and in-memory cursors in tests.
//
// The header is validated before the payload is read: an unknown kind or an
// impossible length means the stream is no longer aligned on frame
// boundaries, and reading on would only turn garbage into more garbage.
// `MAX_PAYLOAD_SIZE` bounds the allocation a bogus length can cause.

use std::io::{self, Read, Write};

use crate::error::ProtocolError;

/// Maximum accepted payload size (64 KB). Pixel edits are a few dozen bytes
/// and chat lines are short; anything near this is a desynchronized stream.
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024;

/// Frame kinds. Other negative values are reserved for future message kinds;
/// every value not listed here is rejected on read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    PixelEdit,
    Chat,
}

impl MessageKind {
    pub fn code(self) -> i32 {
        match self {
            MessageKind::PixelEdit => 0,
            MessageKind::Chat => -1,
        }
    }
}

impl TryFrom<i32> for MessageKind {
    type Error = ProtocolError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(MessageKind::PixelEdit),
            -1 => Ok(MessageKind::Chat),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// Write one frame: kind, payload length, payload. Flushes the writer.
pub fn write_frame<W: Write>(writer: &mut W, kind: MessageKind, payload: &[u8]) -> io::Result<()> {
    let len = payload.len();
    if len > MAX_PAYLOAD_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload too large: {len} bytes (max {MAX_PAYLOAD_SIZE})"),
        ));
    }
    let len = i32::try_from(len).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut header = [0u8; 8];
    header[..4].copy_from_slice(&kind.code().to_be_bytes());
    header[4..].copy_from_slice(&len.to_be_bytes());
    writer.write_all(&header)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame and return its kind and payload.
///
/// A stream that closes before or inside a frame yields an `Io` error with
/// `UnexpectedEof`. Unknown kinds and negative or oversized lengths yield
/// decode errors without consuming the payload.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(MessageKind, Vec<u8>), ProtocolError> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    let kind = i32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let length = i32::from_be_bytes([header[4], header[5], header[6], header[7]]);

    let kind = MessageKind::try_from(kind)?;
    let len = u32::try_from(length).map_err(|_| ProtocolError::BadLength {
        length,
        max: MAX_PAYLOAD_SIZE,
    })?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::BadLength {
            length,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok((kind, payload))
}
