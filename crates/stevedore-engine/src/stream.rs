//! Decoder for the engine's multiplexed exec output.
//!
//! Without a TTY the engine interleaves stdout and stderr on one connection.
//! Every frame starts with an 8-byte header:
//!
//! ```text
//! [stream type, 0, 0, 0, size (u32, big endian)]
//! ```
//!
//! followed by `size` bytes of payload. Frames do not line up with the chunks
//! handed out by the transport, so the decoder buffers across pushes.

use bytes::{Buf, Bytes, BytesMut};

/// Length of the frame header that precedes every payload.
pub const FRAME_HEADER_LEN: usize = 8;

/// Which output stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Standard input (echoed)
    Stdin,
    /// Standard output
    Stdout,
    /// Standard error (also used for engine system errors)
    Stderr,
}

impl StreamKind {
    fn from_header_byte(byte: u8) -> Self {
        match byte {
            0 => StreamKind::Stdin,
            2 | 3 => StreamKind::Stderr,
            _ => StreamKind::Stdout,
        }
    }

    /// Short lowercase name, used as a log field.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdin => "stdin",
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded frame with its header stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stream the payload was written to
    pub stream: StreamKind,
    /// Raw payload bytes
    pub payload: Bytes,
}

/// Incremental frame decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while self.buf.len() >= FRAME_HEADER_LEN {
            let size = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]])
                as usize;
            if self.buf.len() < FRAME_HEADER_LEN + size {
                break;
            }
            let stream = StreamKind::from_header_byte(self.buf[0]);
            self.buf.advance(FRAME_HEADER_LEN);
            let payload = self.buf.split_to(size).freeze();
            frames.push(Frame { stream, payload });
        }
        frames
    }

    /// Number of buffered bytes that do not yet form a complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Encode a single frame. Handy for fakes and tests.
pub fn encode_frame(stream: StreamKind, payload: &[u8]) -> Bytes {
    let kind = match stream {
        StreamKind::Stdin => 0u8,
        StreamKind::Stdout => 1,
        StreamKind::Stderr => 2,
    };
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.extend_from_slice(&[kind, 0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out.freeze()
}
