use super::*;

/// `get` and `gets`. The binary protocol `GET`/`GETK` opcodes parse to the
/// single-key form with `cas` set, since binary response headers always
/// carry the CAS value.
#[derive(Debug, PartialEq, Eq)]
pub struct Get {
    pub(crate) keys: Box<[Box<[u8]>]>,
    pub(crate) cas: bool,
}

impl Get {
    pub(crate) fn new(keys: Box<[Box<[u8]>]>, cas: bool) -> Self {
        Self { keys, cas }
    }

    pub fn keys(&self) -> &[Box<[u8]>] {
        &self.keys
    }

    /// Whether the reply should include CAS values (`gets`).
    pub fn cas(&self) -> bool {
        self.cas
    }
}

impl RequestParser {
    pub(crate) fn parse_get<'a>(
        &self,
        input: &'a [u8],
        cas: bool,
    ) -> IResult<&'a [u8], Request> {
        let mut keys = Vec::new();
        let mut input = input;

        loop {
            let (i, _) = space1(input)?;

            // trailing whitespace before the line ending ends the key list
            if let Some(b'\r') | Some(b'\n') = i.first() {
                input = i;
                break;
            }

            let (i, key) = key(i, self.max_key_len)?;
            keys.push(key.to_owned().into_boxed_slice());
            input = i;

            if keys.len() > self.max_batch_size {
                return Err(Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::ManyMN,
                )));
            }

            if input.first() != Some(&b' ') {
                break;
            }
        }

        if keys.is_empty() {
            return Err(Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::ManyMN,
            )));
        }

        let (input, _) = crlf(input)?;

        Ok((
            input,
            Request::text(
                false,
                Command::Get(Get::new(keys.into_boxed_slice(), cas)),
            ),
        ))
    }
}
