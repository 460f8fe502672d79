//! Binary framing for hardware and app connections
//!
//! Command messages are framed as:
//! ```text
//! [ 1 byte: command ][ 2 bytes: message id (u16, BE) ][ 2 bytes: body length (u16, BE) ][ N bytes: UTF-8 body ]
//! ```
//!
//! Responses reuse the same 5-byte header, with command `0` and the status
//! code in place of the length. They carry no body.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::{Command, Frame, Message, Response, ResponseCode};

/// Size of the fixed frame header
pub const HEADER_SIZE: usize = 5;

/// Largest body a frame can carry
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Body too large: {0} bytes (max: {MAX_BODY_SIZE})")]
    BodyTooLarge(usize),
}

/// Encode a frame into a standalone buffer
pub fn encode(frame: &Frame) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    encode_into(frame, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a frame directly into a provided buffer
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) -> Result<(), CodecError> {
    match frame {
        Frame::Response(response) => {
            buf.reserve(HEADER_SIZE);
            buf.put_u8(Command::Response.code());
            buf.put_u16(response.id);
            buf.put_u16(response.code.code());
        }
        Frame::Message(message) => {
            let body = message.body.as_bytes();
            if body.len() > MAX_BODY_SIZE {
                return Err(CodecError::BodyTooLarge(body.len()));
            }

            buf.reserve(HEADER_SIZE + body.len());
            buf.put_u8(message.command.code());
            buf.put_u16(message.id);
            buf.put_u16(body.len() as u16);
            buf.put_slice(body);
        }
    }
    Ok(())
}

/// Try to decode one frame from the front of a buffer
///
/// Returns:
/// - `Ok(Some(frame))` if a complete frame was decoded and consumed
/// - `Ok(None)` if more data is needed; nothing is consumed
pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }

    // Peek at the header without consuming
    let command = Command::from(buf[0]);
    let id = u16::from_be_bytes([buf[1], buf[2]]);
    let length_or_code = u16::from_be_bytes([buf[3], buf[4]]);

    if command == Command::Response {
        buf.advance(HEADER_SIZE);
        return Ok(Some(Frame::Response(Response::new(
            id,
            ResponseCode::from(length_or_code),
        ))));
    }

    let total_len = HEADER_SIZE + length_or_code as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(HEADER_SIZE);
    let body_bytes = buf.split_to(length_or_code as usize);
    // Invalid sequences become U+FFFD; the command handler judges the body
    let body = String::from_utf8_lossy(&body_bytes).into_owned();

    Ok(Some(Frame::Message(Message { command, id, body })))
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<Frame>, CodecError> {
        decode(&mut self.buffer)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Encoder for building frames
#[derive(Debug, Default)]
pub struct FrameEncoder {
    buffer: BytesMut,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Encode a frame and add it to the output buffer
    pub fn encode(&mut self, frame: &Frame) -> Result<(), CodecError> {
        encode_into(frame, &mut self.buffer)
    }

    /// Take the encoded bytes, leaving an empty buffer
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
