use bytes::{Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Splits an incoming byte stream into CRLF-terminated lines.
///
/// Only complete lines are returned. A trailing partial line stays buffered
/// until a later call completes it.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: BytesMut,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Appends `data` and returns every line completed so far, without the
    /// terminating CRLF. May return an empty list.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(end) = find_crlf(&self.buffer) {
            let line = self.buffer.split_to(end + CRLF.len());
            lines.push(line.freeze().slice(..end));
        }

        lines
    }

    /// Bytes received after the last complete line.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}
