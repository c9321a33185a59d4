// MIT License

//! Length-prefix frame accumulation over a byte stream.
//!
//! Socket reads deliver arbitrary chunks; [`FrameBuffer`] reassembles
//! whole `[type][length:u16 BE][payload]` frames across read boundaries.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{CipError, Result};

const HEADER_LEN: usize = 3;

/// Upper bound on a declared payload length. The longest legal CIP frame
/// is a 255-byte serial send (263-byte payload); anything declaring more
/// than this can never be a real frame, so the connection is dropped
/// instead of waiting for bytes that will not come.
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// One whole frame sliced off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: u8,
    pub payload: Bytes,
}

/// Growable accumulator that turns a chunked byte stream into frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Append a chunk as it arrived from the socket.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next whole frame, or `Ok(None)` if more bytes are needed.
    ///
    /// An impossible declared length is a framing error; the caller drops
    /// the connection.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let frame_type = self.buf[0];
        let len = u16::from_be_bytes([self.buf[1], self.buf[2]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(CipError::Framing {
                details: format!(
                    "frame type 0x{frame_type:02X} declares impossible payload length {len}"
                ),
            });
        }
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }
        let mut frame = self.buf.split_to(HEADER_LEN + len);
        frame.advance(HEADER_LEN);
        Ok(Some(Frame {
            frame_type,
            payload: frame.freeze(),
        }))
    }

    /// Bytes buffered but not yet emitted as frames.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
