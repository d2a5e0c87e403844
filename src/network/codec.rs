//! Frame codec
//!
//! Encoding and decoding of the TCP adapter's frames.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────────────────┐
//! │ Code (4) │ Len (4)  │ CRC (4)  │         Payload             │
//! └──────────┴──────────┴──────────┴─────────────────────────────┘
//! ```
//! - Request frames carry a message type in `Code` (see [`MessageType`])
//! - Reply frames carry an `ErrorCode` in `Code`
//! - All integers are big-endian; CRC32 covers the payload only

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Header size: code (4) + payload length (4) + checksum (4)
pub const HEADER_SIZE: usize = 12;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Message types of request frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MessageType {
    Operation = 0x01,
    QueryConfig = 0x02,
}

/// Errors produced while framing
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// One frame on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: i32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(code: i32, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }
}

// =============================================================================
// Frame Encoding/Decoding
// =============================================================================

/// Encode a frame to bytes
pub fn encode_frame(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + frame.payload.len());
    buf.put_i32(frame.code);
    buf.put_u32(frame.payload.len() as u32);
    buf.put_u32(crc32fast::hash(&frame.payload));
    buf.put_slice(&frame.payload);
    buf.freeze()
}

/// Decode a frame from a complete buffer
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let code = header.get_i32();
    let payload_len = header.get_u32();
    let checksum = header.get_u32();

    validate_payload_len(payload_len)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(CodecError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let payload = &bytes[HEADER_SIZE..total_len];
    verify_checksum(payload, checksum)?;

    Ok(Frame {
        code,
        payload: Bytes::copy_from_slice(payload),
    })
}

fn validate_payload_len(payload_len: u32) -> Result<(), CodecError> {
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(CodecError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn verify_checksum(payload: &[u8], expected: u32) -> Result<(), CodecError> {
    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(CodecError::Protocol(format!(
            "Checksum mismatch: expected 0x{:08x}, got 0x{:08x}",
            expected, actual
        )));
    }
    Ok(())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, CodecError> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let mut cursor = &header[..];
    let code = cursor.get_i32();
    let payload_len = cursor.get_u32();
    let checksum = cursor.get_u32();

    validate_payload_len(payload_len)?;

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }
    verify_checksum(&payload, checksum)?;

    Ok(Frame {
        code,
        payload: Bytes::from(payload),
    })
}

/// Write a frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<(), CodecError> {
    let bytes = encode_frame(frame);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
