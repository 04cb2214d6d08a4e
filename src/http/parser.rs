use crate::http::request::Request;
use crate::http::splitter::LineSplitter;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid request line: {0:?}")]
    InvalidRequestLine(String),
    #[error("Invalid header: {0:?}")]
    InvalidHeader(String),
    #[error("Request head is not valid UTF-8")]
    InvalidEncoding,
}

#[derive(Debug)]
struct RequestLine {
    method: String,
    url: String,
    protocol: String,
    protocol_version: String,
}

#[derive(Debug)]
enum ParserState {
    RequestLine,
    Headers(RequestLine),
    Done,
}

/// Incremental HTTP request head parser.
///
/// Bytes are fed in arbitrary chunks; the finished [`Request`] is returned
/// from the call whose data completes the blank line ending the headers.
/// Anything received after that line is kept aside untouched, see
/// [`RequestParser::remainder`].
#[derive(Debug)]
pub struct RequestParser {
    splitter: LineSplitter,
    lines: Vec<Bytes>,
    state: ParserState,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            splitter: LineSplitter::new(),
            lines: Vec::new(),
            state: ParserState::RequestLine,
        }
    }

    /// Feeds more bytes. Returns `Ok(Some(_))` exactly once, when the head is
    /// complete; every call after that returns `Ok(None)`.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<Request>, ParseError> {
        self.lines.extend(self.splitter.feed(data));

        if let ParserState::RequestLine = self.state {
            let Some(first) = self.lines.first() else {
                return Ok(None);
            };
            let line = parse_request_line(first)?;
            self.state = ParserState::Headers(line);
        }

        if !matches!(self.state, ParserState::Headers(_)) {
            return Ok(None);
        }

        // Line 0 is the request line; the terminator is the first empty line after it.
        let Some(end) = self.lines.iter().skip(1).position(|l| l.is_empty()) else {
            return Ok(None);
        };
        let end = end + 1;

        let mut headers = HashMap::new();
        for line in &self.lines[1..end] {
            let (name, value) = parse_header(line)?;
            headers.insert(name, value);
        }

        self.lines.drain(..=end);

        let ParserState::Headers(line) = std::mem::replace(&mut self.state, ParserState::Done)
        else {
            unreachable!("state checked above");
        };

        Ok(Some(Request {
            method: line.method,
            url: line.url,
            protocol: line.protocol,
            protocol_version: line.protocol_version,
            headers,
        }))
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ParserState::Done)
    }

    /// Bytes that arrived after the header terminator, in arrival order.
    ///
    /// Empty until the request has been emitted.
    pub fn remainder(&self) -> Bytes {
        if !self.is_done() {
            return Bytes::new();
        }

        let mut buf = BytesMut::new();
        for line in &self.lines {
            buf.put_slice(line);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(self.splitter.buffered());
        buf.freeze()
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_request_line(line: &[u8]) -> Result<RequestLine, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidEncoding)?;
    let invalid = || ParseError::InvalidRequestLine(line.to_string());

    let parts: Vec<&str> = line.split(' ').collect();
    let [method, url, protocol_str] = parts.as_slice() else {
        return Err(invalid());
    };

    let (protocol, protocol_version) = protocol_str.split_once('/').ok_or_else(invalid)?;
    if protocol_version.contains('/') {
        return Err(invalid());
    }

    Ok(RequestLine {
        method: method.to_uppercase(),
        url: url.to_lowercase(),
        protocol: protocol.to_uppercase(),
        protocol_version: protocol_version.to_lowercase(),
    })
}

fn parse_header(line: &[u8]) -> Result<(String, String), ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidEncoding)?;

    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;

    Ok((key.trim().to_lowercase(), value.trim().to_string()))
}
