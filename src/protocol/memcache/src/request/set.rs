use super::*;

#[derive(Debug, PartialEq, Eq)]
pub struct Set {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) flags: u32,
    pub(crate) exptime: i64,
}

impl Set {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn exptime(&self) -> i64 {
        self.exptime
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Add {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) flags: u32,
    pub(crate) exptime: i64,
}

impl Add {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn exptime(&self) -> i64 {
        self.exptime
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Replace {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) flags: u32,
    pub(crate) exptime: i64,
}

impl Replace {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn exptime(&self) -> i64 {
        self.exptime
    }
}

/// The parsed header of a text storage command, before the payload.
pub(crate) struct StoreHeader {
    pub(crate) key: Box<[u8]>,
    pub(crate) flags: u32,
    pub(crate) exptime: i64,
    pub(crate) bytes: usize,
}

/// The payload of a storage command, or the invalid request to reply with.
pub(crate) enum Payload {
    Value(Box<[u8]>),
    Invalid(InvalidReason),
}

impl RequestParser {
    /// Parse `<key> <flags> <exptime> <bytes>`, the header shared by the
    /// `set`, `add`, and `replace` commands (and `cas`, which carries one
    /// extra field).
    pub(crate) fn parse_store_header<'a>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], StoreHeader> {
        let (input, _) = space1(input)?;
        let (input, key) = key(input, self.max_key_len)?;
        let (input, _) = space1(input)?;
        let (input, flags) = parse_u32(input)?;
        let (input, _) = space1(input)?;
        let (input, exptime) = parse_i64(input)?;
        let (input, _) = space1(input)?;
        let (input, bytes) = parse_usize(input)?;

        Ok((
            input,
            StoreHeader {
                key: key.to_owned().into_boxed_slice(),
                flags,
                exptime,
                bytes,
            },
        ))
    }

    /// Read a `<bytes>`-long payload and validate the CRLF trailer. An
    /// oversized declared length does not wait for the payload: the
    /// remainder of the line is consumed and the connection will close
    /// after the error reply.
    pub(crate) fn parse_store_payload<'a>(
        &self,
        input: &'a [u8],
        bytes: usize,
    ) -> IResult<&'a [u8], Payload> {
        // the command line, including its ending, has already been consumed;
        // the payload is left unread and the connection will close
        if bytes > self.max_value_size {
            return Ok((input, Payload::Invalid(InvalidReason::ValueTooLarge)));
        }

        let (input, value) = take(bytes)(input)?;
        let (input, trailer) = take(2usize)(input)?;

        if trailer != b"\r\n" {
            return Ok((input, Payload::Invalid(InvalidReason::BadDataChunk)));
        }

        Ok((input, Payload::Value(value.to_owned().into_boxed_slice())))
    }

    pub(crate) fn parse_set<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        let (input, header) = self.parse_store_header(input)?;
        let (input, noreply) = parse_noreply(input)?;
        let (input, payload) = self.parse_store_payload(input, header.bytes)?;

        let command = match payload {
            Payload::Value(value) => Command::Set(Set {
                key: header.key,
                value,
                flags: header.flags,
                exptime: header.exptime,
            }),
            Payload::Invalid(reason) => {
                return Ok((input, Request::invalid(Frame::Text { noreply }, reason)));
            }
        };

        Ok((input, Request::text(noreply, command)))
    }

    pub(crate) fn parse_add<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        let (input, header) = self.parse_store_header(input)?;
        let (input, noreply) = parse_noreply(input)?;
        let (input, payload) = self.parse_store_payload(input, header.bytes)?;

        let command = match payload {
            Payload::Value(value) => Command::Add(Add {
                key: header.key,
                value,
                flags: header.flags,
                exptime: header.exptime,
            }),
            Payload::Invalid(reason) => {
                return Ok((input, Request::invalid(Frame::Text { noreply }, reason)));
            }
        };

        Ok((input, Request::text(noreply, command)))
    }

    pub(crate) fn parse_replace<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        let (input, header) = self.parse_store_header(input)?;
        let (input, noreply) = parse_noreply(input)?;
        let (input, payload) = self.parse_store_payload(input, header.bytes)?;

        let command = match payload {
            Payload::Value(value) => Command::Replace(Replace {
                key: header.key,
                value,
                flags: header.flags,
                exptime: header.exptime,
            }),
            Payload::Invalid(reason) => {
                return Ok((input, Request::invalid(Frame::Text { noreply }, reason)));
            }
        };

        Ok((input, Request::text(noreply, command)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_common::Parse;

    fn parse(buffer: &[u8]) -> Request {
        let parser = RequestParser::new();
        Parse::parse(&parser, buffer).unwrap().into_inner()
    }

    #[test]
    fn basic_set() {
        let request = parse(b"set foo 42 0 6\r\nfooval\r\n");
        match request.command() {
            Command::Set(set) => {
                assert_eq!(set.key(), b"foo");
                assert_eq!(set.value(), b"fooval");
                assert_eq!(set.flags(), 42);
                assert_eq!(set.exptime(), 0);
            }
            _ => panic!("wrong command"),
        }
        assert_eq!(request.frame(), Frame::Text { noreply: false });
    }

    #[test]
    fn noreply_set() {
        let request = parse(b"set foo 0 0 1 noreply\r\nx\r\n");
        assert_eq!(request.frame(), Frame::Text { noreply: true });
    }

    #[test]
    fn value_may_contain_line_endings() {
        let request = parse(b"set foo 0 0 6\r\na\r\nb\r\r\n");
        match request.command() {
            Command::Set(set) => assert_eq!(set.value(), b"a\r\nb\r"),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn incomplete_payload_would_block() {
        let parser = RequestParser::new();
        let err = Parse::parse(&parser, b"set foo 0 0 10\r\nabc").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    }

    #[test]
    fn bad_trailer_is_a_bad_data_chunk() {
        let request = parse(b"set foo 0 0 3\r\nabcXY");
        assert!(matches!(
            request.command(),
            Command::Invalid(i) if i.reason() == InvalidReason::BadDataChunk
        ));
    }

    #[test]
    fn add_and_replace() {
        let request = parse(b"add foo 0 0 3\r\nbar\r\n");
        assert!(matches!(request.command(), Command::Add(_)));

        let request = parse(b"replace foo 0 0 3\r\nbar\r\n");
        assert!(matches!(request.command(), Command::Replace(_)));
    }

    #[test]
    fn oversized_value_is_rejected_without_buffering() {
        let parser = RequestParser::new().max_value_size(1024);
        let request = Parse::parse(&parser, b"set foo 0 0 1048576\r\n")
            .unwrap()
            .into_inner();
        assert!(matches!(
            request.command(),
            Command::Invalid(i) if i.reason() == InvalidReason::ValueTooLarge
        ));
    }

    #[test]
    fn negative_exptime_is_accepted() {
        let request = parse(b"set foo 0 -1 1\r\nx\r\n");
        match request.command() {
            Command::Set(set) => assert_eq!(set.exptime(), -1),
            _ => panic!("wrong command"),
        }
    }
}
