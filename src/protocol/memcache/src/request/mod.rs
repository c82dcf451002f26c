use crate::*;

use core::fmt::{Display, Formatter};

mod append;
mod cas;
mod delete;
mod flush_all;
mod get;
mod incr;
mod set;
mod stats;

pub use append::Append;
pub use cas::Cas;
pub use delete::Delete;
pub use flush_all::FlushAll;
pub use get::Get;
pub use incr::{Create, Decr, Incr};
pub use set::{Add, Replace, Set};
pub use stats::{Stats, StatsCommand};

/// A complete request: the command together with the framing it arrived in.
/// The framing is carried through to the response so that one reply writer
/// serves both protocols.
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    pub(crate) frame: Frame,
    pub(crate) command: Command,
}

impl Request {
    pub(crate) fn new(frame: Frame, command: Command) -> Self {
        Self { frame, command }
    }

    pub(crate) fn text(noreply: bool, command: Command) -> Self {
        Self::new(Frame::Text { noreply }, command)
    }

    pub(crate) fn invalid(frame: Frame, reason: InvalidReason) -> Self {
        Self::new(frame, Command::Invalid(Invalid { reason }))
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match &self.command {
            Command::Get(r) => {
                if r.cas() {
                    write!(f, "gets")
                } else {
                    write!(f, "get")
                }
            }
            Command::Set(_) => write!(f, "set"),
            Command::Add(_) => write!(f, "add"),
            Command::Replace(_) => write!(f, "replace"),
            Command::Append(r) => {
                if r.prepend() {
                    write!(f, "prepend")
                } else {
                    write!(f, "append")
                }
            }
            Command::Cas(_) => write!(f, "cas"),
            Command::Delete(_) => write!(f, "delete"),
            Command::Incr(_) => write!(f, "incr"),
            Command::Decr(_) => write!(f, "decr"),
            Command::FlushAll(_) => write!(f, "flush_all"),
            Command::Stats(_) => write!(f, "stats"),
            Command::Version => write!(f, "version"),
            Command::Verbosity(_) => write!(f, "verbosity"),
            Command::SlabsReassign => write!(f, "slabs reassign"),
            Command::Quit => write!(f, "quit"),
            Command::Noop => write!(f, "noop"),
            Command::Invalid(_) => write!(f, "invalid"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Get(Get),
    Set(Set),
    Add(Add),
    Replace(Replace),
    Append(Append),
    Cas(Cas),
    Delete(Delete),
    Incr(Incr),
    Decr(Decr),
    FlushAll(FlushAll),
    Stats(Stats),
    Version,
    Verbosity(Verbosity),
    SlabsReassign,
    Quit,
    Noop,
    Invalid(Invalid),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Verbosity {
    pub(crate) level: u32,
}

impl Verbosity {
    pub fn level(&self) -> u32 {
        self.level
    }
}

/// A request which could be framed but not understood. It still produces a
/// reply; the reason selects which one.
#[derive(Debug, PartialEq, Eq)]
pub struct Invalid {
    pub(crate) reason: InvalidReason,
}

impl Invalid {
    pub fn reason(&self) -> InvalidReason {
        self.reason
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    /// The command verb is not recognized.
    UnknownCommand,
    /// The command line is malformed: bad argument count, a key over the
    /// length limit, or a non-numeric field.
    BadCommandLine,
    /// A storage payload was not terminated with CRLF.
    BadDataChunk,
    /// The declared payload length exceeds the maximum value size. The
    /// payload is not buffered; the connection closes after the error is
    /// sent.
    ValueTooLarge,
    /// A binary request header failed its per-opcode schema validation. The
    /// connection closes after the error is sent.
    BadFraming,
    /// A binary request carried an opcode we do not implement.
    UnknownOpcode,
}

#[derive(Debug, PartialEq, Eq)]
enum Verb {
    Get,
    Gets,
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    Cas,
    Delete,
    Incr,
    Decr,
    FlushAll,
    Stats,
    Version,
    Verbosity,
    Quit,
    Slabs,
}

fn parse_verb(input: &[u8]) -> IResult<&[u8], Verb> {
    let (remaining, command_bytes) = token(input)?;
    let verb = match command_bytes {
        b"get" | b"GET" => Verb::Get,
        b"gets" | b"GETS" => Verb::Gets,
        b"set" | b"SET" => Verb::Set,
        b"add" | b"ADD" => Verb::Add,
        b"replace" | b"REPLACE" => Verb::Replace,
        b"append" | b"APPEND" => Verb::Append,
        b"prepend" | b"PREPEND" => Verb::Prepend,
        b"cas" | b"CAS" => Verb::Cas,
        b"delete" | b"DELETE" => Verb::Delete,
        b"incr" | b"INCR" => Verb::Incr,
        b"decr" | b"DECR" => Verb::Decr,
        b"flush_all" | b"FLUSH_ALL" => Verb::FlushAll,
        b"stats" | b"STATS" => Verb::Stats,
        b"version" | b"VERSION" => Verb::Version,
        b"verbosity" | b"VERBOSITY" => Verb::Verbosity,
        b"quit" | b"QUIT" => Verb::Quit,
        b"slabs" | b"SLABS" => Verb::Slabs,
        _ => {
            return Err(Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
    };
    Ok((remaining, verb))
}

impl RequestParser {
    pub(crate) fn parse_text(&self, buffer: &[u8]) -> Result<Parsed, std::io::Error> {
        match self.parse_text_request(buffer) {
            Ok((remaining, request)) => {
                Ok(Parsed::new(request, buffer.len() - remaining.len()))
            }
            Err(Err::Incomplete(_)) => {
                // a command line which never ends is a framing error, but an
                // incomplete storage payload is expected while bytes arrive
                if !buffer.contains(&b'\n') && buffer.len() > MAX_COMMAND_LINE {
                    Err(std::io::Error::from(std::io::ErrorKind::InvalidData))
                } else {
                    Err(std::io::Error::from(std::io::ErrorKind::WouldBlock))
                }
            }
            Err(_) => {
                // the line is malformed: consume through the line ending and
                // reply with an error, keeping the connection open
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line = &buffer[..pos];
                    let reason = if parse_verb(line).is_ok() {
                        InvalidReason::BadCommandLine
                    } else {
                        InvalidReason::UnknownCommand
                    };
                    Ok(Parsed::new(
                        Request::invalid(Frame::Text { noreply: false }, reason),
                        pos + 1,
                    ))
                } else if buffer.len() > MAX_COMMAND_LINE {
                    Err(std::io::Error::from(std::io::ErrorKind::InvalidData))
                } else {
                    Err(std::io::Error::from(std::io::ErrorKind::WouldBlock))
                }
            }
        }
    }

    fn parse_text_request<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        match parse_verb(input)? {
            (input, Verb::Get) => self.parse_get(input, false),
            (input, Verb::Gets) => self.parse_get(input, true),
            (input, Verb::Set) => self.parse_set(input),
            (input, Verb::Add) => self.parse_add(input),
            (input, Verb::Replace) => self.parse_replace(input),
            (input, Verb::Append) => self.parse_append(input, false),
            (input, Verb::Prepend) => self.parse_append(input, true),
            (input, Verb::Cas) => self.parse_cas(input),
            (input, Verb::Delete) => self.parse_delete(input),
            (input, Verb::Incr) => self.parse_incr(input, false),
            (input, Verb::Decr) => self.parse_incr(input, true),
            (input, Verb::FlushAll) => self.parse_flush_all(input),
            (input, Verb::Stats) => self.parse_stats(input),
            (input, Verb::Version) => parse_simple(input, Command::Version),
            (input, Verb::Verbosity) => parse_verbosity(input),
            (input, Verb::Quit) => parse_simple(input, Command::Quit),
            (input, Verb::Slabs) => parse_slabs(input),
        }
    }
}

/// Parse a command which takes no arguments.
fn parse_simple(input: &[u8], command: Command) -> IResult<&[u8], Request> {
    let (input, _) = space0(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, Request::text(false, command)))
}

fn parse_verbosity(input: &[u8]) -> IResult<&[u8], Request> {
    let (input, _) = space1(input)?;
    let (input, level) = parse_u32(input)?;
    let (input, noreply) = parse_noreply(input)?;
    Ok((
        input,
        Request::text(noreply, Command::Verbosity(Verbosity { level })),
    ))
}

fn parse_slabs(input: &[u8]) -> IResult<&[u8], Request> {
    let (input, _) = space1(input)?;
    let (input, subcommand) = token(input)?;
    if subcommand != b"reassign" {
        return Err(Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (input, _) = space1(input)?;
    let (input, _src) = parse_i64(input)?;
    let (input, _) = space1(input)?;
    let (input, _dst) = parse_i64(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, Request::text(false, Command::SlabsReassign)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_common::Parse;

    fn parse(buffer: &[u8]) -> Result<(Request, usize), std::io::Error> {
        let parser = RequestParser::new();
        Parse::parse(&parser, buffer).map(|ok| {
            let consumed = ok.consumed();
            (ok.into_inner(), consumed)
        })
    }

    #[test]
    fn incomplete_line_would_block() {
        for buffer in [&b"get"[..], &b"get key"[..], &b"set key 0 0 1\r\nx"[..]] {
            let err = parse(buffer).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock, "{:?}", buffer);
        }
    }

    #[test]
    fn unknown_command_is_an_error_reply() {
        let (request, consumed) = parse(b"mystery key\r\nget").unwrap();
        assert_eq!(consumed, 13);
        assert!(matches!(
            request.command(),
            Command::Invalid(i) if i.reason() == InvalidReason::UnknownCommand
        ));
    }

    #[test]
    fn empty_line_is_an_error_reply() {
        let (request, consumed) = parse(b"\r\n").unwrap();
        assert_eq!(consumed, 2);
        assert!(matches!(request.command(), Command::Invalid(_)));
    }

    #[test]
    fn malformed_arguments_are_a_client_error() {
        let (request, _) = parse(b"set key zero 0 1\r\n").unwrap();
        assert!(matches!(
            request.command(),
            Command::Invalid(i) if i.reason() == InvalidReason::BadCommandLine
        ));
    }

    #[test]
    fn oversized_key_is_a_client_error() {
        let mut line = b"get ".to_vec();
        line.extend_from_slice(&[b'x'; 251]);
        line.extend_from_slice(b"\r\n");
        let (request, _) = parse(&line).unwrap();
        assert!(matches!(
            request.command(),
            Command::Invalid(i) if i.reason() == InvalidReason::BadCommandLine
        ));
    }

    #[test]
    fn quit() {
        let (request, _) = parse(b"quit\r\n").unwrap();
        assert_eq!(*request.command(), Command::Quit);
    }

    #[test]
    fn version() {
        let (request, _) = parse(b"version\r\n").unwrap();
        assert_eq!(*request.command(), Command::Version);
    }

    #[test]
    fn verbosity() {
        let (request, _) = parse(b"verbosity 1\r\n").unwrap();
        assert!(matches!(
            request.command(),
            Command::Verbosity(v) if v.level() == 1
        ));
    }

    #[test]
    fn slabs_reassign() {
        let (request, _) = parse(b"slabs reassign 1 2\r\n").unwrap();
        assert_eq!(*request.command(), Command::SlabsReassign);

        let (request, _) = parse(b"slabs automove\r\n").unwrap();
        assert!(matches!(request.command(), Command::Invalid(_)));
    }

    #[test]
    fn runaway_line_closes_the_connection() {
        let buffer = vec![b'x'; MAX_COMMAND_LINE + 1];
        let err = parse(&buffer).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
