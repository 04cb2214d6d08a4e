//! RFC 6455 frame encoding and incremental decoding.

use bytes::{Buf, BytesMut};

use crate::websocket::frame::{Frame, OpCode};

/// Largest payload accepted by default (1 MiB)
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

const MIN_HEADER_SIZE: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Reserved bits must be zero")]
    ReservedBitsNotZero,
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpCode(u8),
    #[error("Frame payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: u64, max: usize },
}

/// Turns byte chunks into frames, buffering incomplete frames between calls.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload: usize,
}

impl FrameDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_payload,
        }
    }

    /// Appends `data` without decoding it yet.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends `data` and decodes every frame now complete, in order.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Frame>, FrameError> {
        self.push(data);
        self.decode_buffered()
    }

    /// Decodes complete frames from bytes already buffered.
    pub fn decode_buffered(&mut self) -> Result<Vec<Frame>, FrameError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Decodes the next complete buffered frame, if there is one.
    ///
    /// Frames before a malformed one are returned by earlier calls; the
    /// error surfaces only once the malformed frame is reached.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let src = &self.buffer;

        if src.len() < MIN_HEADER_SIZE {
            return Ok(None);
        }

        let fin = src[0] & 0b1000_0000 != 0;
        if src[0] & 0b0111_0000 != 0 {
            return Err(FrameError::ReservedBitsNotZero);
        }

        let opcode = OpCode::try_from(src[0] & 0b0000_1111)?;
        let masked = src[1] & 0b1000_0000 != 0;

        let (payload_len, mut offset) = match src[1] & 0x7F {
            126 => {
                if src.len() < 4 {
                    return Ok(None);
                }
                (u16::from_be_bytes([src[2], src[3]]) as u64, 4)
            }
            127 => {
                if src.len() < 10 {
                    return Ok(None);
                }
                let len = u64::from_be_bytes([
                    src[2], src[3], src[4], src[5], src[6], src[7], src[8], src[9],
                ]);
                (len, 10)
            }
            len => (len as u64, 2),
        };

        if payload_len > self.max_payload as u64 {
            return Err(FrameError::PayloadTooLarge {
                len: payload_len,
                max: self.max_payload,
            });
        }
        let payload_len = payload_len as usize;

        let mask = if masked {
            if src.len() < offset + 4 {
                return Ok(None);
            }
            let key = [src[offset], src[offset + 1], src[offset + 2], src[offset + 3]];
            offset += 4;
            Some(key)
        } else {
            None
        };

        if src.len() < offset + payload_len {
            return Ok(None);
        }

        self.buffer.advance(offset);
        let mut payload = self.buffer.split_to(payload_len);

        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        Ok(Some(Frame::new(fin, opcode, mask, payload.freeze())))
    }
}

/// Serializes a frame. The payload is masked when the frame carries a key.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let payload = frame.payload();
    let len = payload.len();
    let mut dst = Vec::with_capacity(14 + len);

    dst.push((frame.is_final() as u8) << 7 | frame.opcode() as u8);

    let mask_bit = if frame.mask().is_some() { 0b1000_0000 } else { 0 };

    if len < 126 {
        dst.push(mask_bit | len as u8);
    } else if len < 65536 {
        dst.push(mask_bit | 126);
        dst.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        dst.push(mask_bit | 127);
        dst.extend_from_slice(&(len as u64).to_be_bytes());
    }

    match frame.mask() {
        Some(key) => {
            dst.extend_from_slice(&key);
            let start = dst.len();
            dst.extend_from_slice(payload);
            apply_mask(&mut dst[start..], key);
        }
        None => dst.extend_from_slice(payload),
    }

    dst
}

fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
