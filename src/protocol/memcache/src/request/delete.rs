use super::*;

#[derive(Debug, PartialEq, Eq)]
pub struct Delete {
    pub(crate) key: Box<[u8]>,
}

impl Delete {
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl RequestParser {
    pub(crate) fn parse_delete<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        let (input, _) = space1(input)?;
        let (input, key) = key(input, self.max_key_len)?;
        let (input, noreply) = parse_noreply(input)?;

        Ok((
            input,
            Request::text(
                noreply,
                Command::Delete(Delete {
                    key: key.to_owned().into_boxed_slice(),
                }),
            ),
        ))
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
    fn basic_delete() {
        let request = parse(b"delete foo\r\n");
        match request.command() {
            Command::Delete(delete) => assert_eq!(delete.key(), b"foo"),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn delete_noreply() {
        let request = parse(b"delete foo noreply\r\n");
        assert_eq!(request.frame(), Frame::Text { noreply: true });
    }
}
