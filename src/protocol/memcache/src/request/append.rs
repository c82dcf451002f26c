use super::*;

/// `append` and `prepend`. The flags and exptime fields are parsed from the
/// command line but ignored when storing: the concatenated item keeps the
/// attributes of the existing one.
#[derive(Debug, PartialEq, Eq)]
pub struct Append {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) prepend: bool,
}

impl Append {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn prepend(&self) -> bool {
        self.prepend
    }
}

impl RequestParser {
    pub(crate) fn parse_append<'a>(
        &self,
        input: &'a [u8],
        prepend: bool,
    ) -> IResult<&'a [u8], Request> {
        let (input, header) = self.parse_store_header(input)?;
        let (input, noreply) = parse_noreply(input)?;
        let (input, payload) = self.parse_store_payload(input, header.bytes)?;

        let command = match payload {
            super::set::Payload::Value(value) => Command::Append(Append {
                key: header.key,
                value,
                prepend,
            }),
            super::set::Payload::Invalid(reason) => {
                return Ok((input, Request::invalid(Frame::Text { noreply }, reason)));
            }
        };

        Ok((input, Request::text(noreply, command)))
    }
}
