use super::*;

#[derive(Debug, PartialEq, Eq)]
pub struct FlushAll {
    pub(crate) delay: Option<i64>,
}

impl FlushAll {
    pub fn delay(&self) -> Option<i64> {
        self.delay
    }
}

impl RequestParser {
    pub(crate) fn parse_flush_all<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        // no delay argument
        if let Ok((input, noreply)) = parse_noreply(input) {
            return Ok((
                input,
                Request::text(noreply, Command::FlushAll(FlushAll { delay: None })),
            ));
        }

        let (input, _) = space1(input)?;
        let (input, delay) = parse_i64(input)?;
        let (input, noreply) = parse_noreply(input)?;

        Ok((
            input,
            Request::text(
                noreply,
                Command::FlushAll(FlushAll { delay: Some(delay) }),
            ),
        ))
    }
}
