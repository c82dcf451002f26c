//! nom helpers shared by the text protocol parsers.

pub(crate) use nom::bytes::streaming::{take, take_till1};
pub(crate) use nom::character::streaming::{crlf, space0, space1};
pub(crate) use nom::{Err, IResult};

use nom::error::{Error, ErrorKind};

fn is_key_byte(b: u8) -> bool {
    b != b' ' && b != b'\r' && b != b'\n'
}

/// Parse a single key, enforcing the maximum key length.
pub(crate) fn key(input: &[u8], max_len: usize) -> IResult<&[u8], &[u8]> {
    let (remaining, key) = take_till1(|b| !is_key_byte(b))(input)?;
    if key.len() > max_len {
        Err(Err::Failure(Error::new(input, ErrorKind::TakeTill1)))
    } else {
        Ok((remaining, key))
    }
}

/// Parse a whitespace-delimited token.
pub(crate) fn token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_till1(|b: u8| !is_key_byte(b))(input)
}

fn parse_digits<T: std::str::FromStr>(input: &[u8]) -> IResult<&[u8], T> {
    let (remaining, digits) = token(input)?;
    let parsed = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<T>().ok());
    match parsed {
        Some(value) => Ok((remaining, value)),
        None => Err(Err::Failure(Error::new(input, ErrorKind::Digit))),
    }
}

pub(crate) fn parse_u32(input: &[u8]) -> IResult<&[u8], u32> {
    parse_digits::<u32>(input)
}

pub(crate) fn parse_u64(input: &[u8]) -> IResult<&[u8], u64> {
    parse_digits::<u64>(input)
}

pub(crate) fn parse_usize(input: &[u8]) -> IResult<&[u8], usize> {
    parse_digits::<usize>(input)
}

pub(crate) fn parse_i64(input: &[u8]) -> IResult<&[u8], i64> {
    parse_digits::<i64>(input)
}

/// Parse an optional trailing ` noreply` token, followed by the end of the
/// command line.
pub(crate) fn parse_noreply(input: &[u8]) -> IResult<&[u8], bool> {
    let mut noreply = false;
    let mut input = input;
    if let Ok((i, _)) = space1::<_, Error<&[u8]>>(input) {
        if i.len() >= 7 && &i[0..7] == b"noreply" {
            input = &i[7..];
            noreply = true;
        }
    }
    let (input, _) = space0(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, noreply))
}
