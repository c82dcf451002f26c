//! The memcache protocol: a line-oriented text protocol and a fixed-header
//! binary protocol which share a connection. The first byte received on a
//! connection selects the protocol: the binary request magic latches the
//! connection to the binary protocol, anything else latches it to text. The
//! latch is permanent for the lifetime of the connection.

mod binary;
mod request;
mod response;
mod util;

pub(crate) use util::*;

pub use binary::{Opcode, MAGIC_REQUEST, MAGIC_RESPONSE};
pub use request::*;
pub use response::*;

use metriken::{metric, Counter};
use protocol_common::{Parse, ParseOk};

use core::cell::Cell;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 1024;
pub const DEFAULT_MAX_KEY_LEN: usize = 250;
pub const DEFAULT_MAX_VALUE_SIZE: usize = 512 * 1024 * 1024;

// a command line which grows beyond this without a line ending is treated as
// an attack or a framing error and the connection is closed
pub(crate) const MAX_COMMAND_LINE: usize = 8 * 1024;

#[metric(name = "request_parse", description = "requests parsed")]
pub static REQUEST_PARSE: Counter = Counter::new();

#[metric(
    name = "request_parse_ex",
    description = "requests which failed to parse"
)]
pub static REQUEST_PARSE_EX: Counter = Counter::new();

/// Which wire protocol a connection has latched to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wire {
    Text,
    Binary,
}

/// The framing of a request, carried through to the response so that a
/// single reply writer can serve both protocols.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text {
        noreply: bool,
    },
    Binary {
        /// The raw opcode from the request header, echoed in responses.
        opcode: u8,
        opaque: u32,
        quiet: bool,
    },
}

impl Frame {
    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary { .. })
    }

    /// Whether successful responses are suppressed.
    pub fn noreply(&self) -> bool {
        match self {
            Frame::Text { noreply } => *noreply,
            Frame::Binary { quiet, .. } => *quiet,
        }
    }
}

/// Parses requests from a session buffer. One parser clone is held per
/// session; the protocol latch lives in the clone.
#[derive(Clone)]
pub struct RequestParser {
    max_value_size: usize,
    max_batch_size: usize,
    max_key_len: usize,
    wire: Cell<Option<Wire>>,
}

impl RequestParser {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn max_value_size(mut self, bytes: usize) -> Self {
        self.max_value_size = bytes;
        self
    }

    pub fn max_key_len(mut self, bytes: usize) -> Self {
        self.max_key_len = bytes;
        self
    }

    pub fn max_batch_size(mut self, count: usize) -> Self {
        self.max_batch_size = count;
        self
    }

    /// The protocol this parser's connection has latched to, if any bytes
    /// have been seen.
    pub fn wire(&self) -> Option<Wire> {
        self.wire.get()
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self {
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_key_len: DEFAULT_MAX_KEY_LEN,
            wire: Cell::new(None),
        }
    }
}

impl Parse<Request> for RequestParser {
    fn parse(&self, buffer: &[u8]) -> Result<ParseOk<Request>, std::io::Error> {
        if buffer.is_empty() {
            return Err(std::io::Error::from(std::io::ErrorKind::WouldBlock));
        }

        let wire = self.wire.get().unwrap_or({
            if buffer[0] == MAGIC_REQUEST {
                Wire::Binary
            } else {
                Wire::Text
            }
        });
        self.wire.set(Some(wire));

        let result = match wire {
            Wire::Text => self.parse_text(buffer),
            Wire::Binary => self.parse_binary(buffer),
        };

        match &result {
            Ok(res) => {
                REQUEST_PARSE.increment();
                if matches!(res.request().command(), Command::Invalid(_)) {
                    REQUEST_PARSE_EX.increment();
                }
            }
            Err(e) if e.kind() != std::io::ErrorKind::WouldBlock => {
                REQUEST_PARSE_EX.increment();
            }
            _ => {}
        }

        result.map(|res| {
            let consumed = res.consumed;
            ParseOk::new(res.request, consumed)
        })
    }
}

/// Internal parse result, before conversion into the generic `ParseOk`.
pub(crate) struct Parsed {
    request: Request,
    consumed: usize,
}

impl Parsed {
    pub(crate) fn new(request: Request, consumed: usize) -> Self {
        Self { request, consumed }
    }

    pub(crate) fn request(&self) -> &Request {
        &self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latches_text_on_first_byte() {
        let parser = RequestParser::new();
        assert_eq!(parser.wire(), None);
        // incomplete text command still latches the protocol
        assert!(Parse::parse(&parser, b"get ").is_err());
        assert_eq!(parser.wire(), Some(Wire::Text));
    }

    #[test]
    fn latches_binary_on_magic() {
        let parser = RequestParser::new();
        assert!(Parse::parse(&parser, &[0x80]).is_err());
        assert_eq!(parser.wire(), Some(Wire::Binary));
    }

    #[test]
    fn clones_inherit_latch() {
        let parser = RequestParser::new();
        let _ = Parse::parse(&parser, &[0x80]);
        assert_eq!(parser.wire(), Some(Wire::Binary));
        let clone = parser.clone();
        assert_eq!(clone.wire(), Some(Wire::Binary));
    }

    #[test]
    fn binary_latch_rejects_text() {
        let parser = RequestParser::new();
        let _ = Parse::parse(&parser, &[0x80]);
        // a latched binary connection which receives a different magic byte
        // is a framing error and the connection must be closed
        let err = Parse::parse(&parser, b"get key\r\n").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
