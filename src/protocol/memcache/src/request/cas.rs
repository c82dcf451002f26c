use super::*;

/// A compare-and-swap store. The binary protocol has no distinct opcode for
/// this: a `SET`/`ADD`/`REPLACE` request with a nonzero CAS field parses to
/// this command instead.
#[derive(Debug, PartialEq, Eq)]
pub struct Cas {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) flags: u32,
    pub(crate) exptime: i64,
    pub(crate) cas: u64,
}

impl Cas {
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

    pub fn cas(&self) -> u64 {
        self.cas
    }
}

impl RequestParser {
    pub(crate) fn parse_cas<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        let (input, header) = self.parse_store_header(input)?;
        let (input, _) = space1(input)?;
        let (input, cas) = parse_u64(input)?;
        let (input, noreply) = parse_noreply(input)?;
        let (input, payload) = self.parse_store_payload(input, header.bytes)?;

        let command = match payload {
            super::set::Payload::Value(value) => Command::Cas(Cas {
                key: header.key,
                value,
                flags: header.flags,
                exptime: header.exptime,
                cas,
            }),
            super::set::Payload::Invalid(reason) => {
                return Ok((input, Request::invalid(Frame::Text { noreply }, reason)));
            }
        };

        Ok((input, Request::text(noreply, command)))
    }
}
