use bytes::{BufMut, Bytes, BytesMut};

use crate::websocket::codec::FrameError;

/// Normal closure status code
pub const CLOSE_NORMAL: u16 = 1000;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(FrameError::InvalidOpCode(other)),
        }
    }
}

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Indicates if this is the final frame in a message.
    fin: bool,
    /// The opcode of the frame.
    opcode: OpCode,
    /// The masking key. Only frames sent by a client carry one.
    mask: Option<[u8; 4]>,
    /// The unmasked payload of the frame.
    payload: Bytes,
}

impl Frame {
    /// Creates a new `Frame` instance.
    pub fn new(
        fin: bool,
        opcode: OpCode,
        mask: Option<[u8; 4]>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            fin,
            opcode,
            mask,
            payload: payload.into(),
        }
    }

    /// A final, unmasked text frame.
    pub fn text(text: &str) -> Self {
        Self::new(true, OpCode::Text, None, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// A pong answering a ping with `payload`.
    pub fn pong(payload: Bytes) -> Self {
        Self::new(true, OpCode::Pong, None, payload)
    }

    /// A close frame carrying a big-endian status code and a UTF-8 reason.
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        payload.put_u16(code);
        payload.put_slice(reason.as_bytes());

        Self::new(true, OpCode::Close, None, payload.freeze())
    }

    /// Returns the same frame with a masking key set.
    pub fn masked(self, mask: [u8; 4]) -> Self {
        Self {
            mask: Some(mask),
            ..self
        }
    }

    /// Returns whether this is the final frame in a message.
    pub fn is_final(&self) -> bool {
        self.fin
    }

    /// Returns the opcode of the frame.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn mask(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Returns the payload of the frame.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}
