use super::*;

/// Auto-create parameters carried by the binary protocol arithmetic
/// opcodes. Text requests never auto-create.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Create {
    pub(crate) initial: u64,
    pub(crate) exptime: u32,
}

impl Create {
    pub fn initial(&self) -> u64 {
        self.initial
    }

    pub fn exptime(&self) -> u32 {
        self.exptime
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Incr {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: u64,
    pub(crate) cas: u64,
    pub(crate) create: Option<Create>,
}

impl Incr {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Nonzero when the binary request demands a CAS match.
    pub fn cas(&self) -> u64 {
        self.cas
    }

    pub fn create(&self) -> Option<Create> {
        self.create
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Decr {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: u64,
    pub(crate) cas: u64,
    pub(crate) create: Option<Create>,
}

impl Decr {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn cas(&self) -> u64 {
        self.cas
    }

    pub fn create(&self) -> Option<Create> {
        self.create
    }
}

impl RequestParser {
    pub(crate) fn parse_incr<'a>(
        &self,
        input: &'a [u8],
        decr: bool,
    ) -> IResult<&'a [u8], Request> {
        let (input, _) = space1(input)?;
        let (input, key) = key(input, self.max_key_len)?;
        let (input, _) = space1(input)?;
        let (input, value) = parse_u64(input)?;
        let (input, noreply) = parse_noreply(input)?;

        let key = key.to_owned().into_boxed_slice();
        let command = if decr {
            Command::Decr(Decr {
                key,
                value,
                cas: 0,
                create: None,
            })
        } else {
            Command::Incr(Incr {
                key,
                value,
                cas: 0,
                create: None,
            })
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
    fn incr() {
        let request = parse(b"incr counter 3\r\n");
        match request.command() {
            Command::Incr(incr) => {
                assert_eq!(incr.key(), b"counter");
                assert_eq!(incr.value(), 3);
                assert_eq!(incr.create(), None);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn decr() {
        let request = parse(b"decr counter 1\r\n");
        assert!(matches!(request.command(), Command::Decr(_)));
    }

    #[test]
    fn non_numeric_delta_is_a_client_error() {
        let request = parse(b"incr counter one\r\n");
        assert!(matches!(
            request.command(),
            Command::Invalid(i) if i.reason() == InvalidReason::BadCommandLine
        ));
    }
}
