//! The binary protocol: a fixed 24-byte big-endian request header followed
//! by extras, key, and value. Each opcode fixes the lengths of the extras
//! and key sections; a request which violates its opcode's schema receives
//! an EINVAL response and the connection is closed.

use crate::*;

use nom::number::streaming::{be_u16, be_u32, be_u64, be_u8};

pub const MAGIC_REQUEST: u8 = 0x80;
pub const MAGIC_RESPONSE: u8 = 0x81;

pub(crate) const HEADER_LEN: usize = 24;

// response status codes
pub(crate) const STATUS_SUCCESS: u16 = 0x0000;
pub(crate) const STATUS_KEY_ENOENT: u16 = 0x0001;
pub(crate) const STATUS_KEY_EEXISTS: u16 = 0x0002;
pub(crate) const STATUS_E2BIG: u16 = 0x0003;
pub(crate) const STATUS_EINVAL: u16 = 0x0004;
pub(crate) const STATUS_NOT_STORED: u16 = 0x0005;
pub(crate) const STATUS_UNKNOWN_COMMAND: u16 = 0x0081;
pub(crate) const STATUS_ENOMEM: u16 = 0x0082;

// the expiration which tells the arithmetic opcodes not to create a missing
// item
const NO_CREATE: u32 = 0xffff_ffff;

/// The base operations of the binary protocol. Quiet variants decode to the
/// base opcode with the quiet flag set on the frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    Get,
    Set,
    Add,
    Replace,
    Delete,
    Increment,
    Decrement,
    Quit,
    Flush,
    Noop,
    Version,
    GetK,
    Append,
    Prepend,
    Stat,
}

impl Opcode {
    /// Decode a wire opcode into the base operation and its quiet flag.
    pub fn decode(opcode: u8) -> Option<(Self, bool)> {
        match opcode {
            0x00 => Some((Self::Get, false)),
            0x01 => Some((Self::Set, false)),
            0x02 => Some((Self::Add, false)),
            0x03 => Some((Self::Replace, false)),
            0x04 => Some((Self::Delete, false)),
            0x05 => Some((Self::Increment, false)),
            0x06 => Some((Self::Decrement, false)),
            0x07 => Some((Self::Quit, false)),
            0x08 => Some((Self::Flush, false)),
            0x09 => Some((Self::Get, true)),
            0x0a => Some((Self::Noop, false)),
            0x0b => Some((Self::Version, false)),
            0x0c => Some((Self::GetK, false)),
            0x0d => Some((Self::GetK, true)),
            0x0e => Some((Self::Append, false)),
            0x0f => Some((Self::Prepend, false)),
            0x10 => Some((Self::Stat, false)),
            0x11 => Some((Self::Set, true)),
            0x12 => Some((Self::Add, true)),
            0x13 => Some((Self::Replace, true)),
            0x14 => Some((Self::Delete, true)),
            0x15 => Some((Self::Increment, true)),
            0x16 => Some((Self::Decrement, true)),
            0x17 => Some((Self::Quit, true)),
            0x18 => Some((Self::Flush, true)),
            0x19 => Some((Self::Append, true)),
            0x1a => Some((Self::Prepend, true)),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RequestHeader {
    pub(crate) magic: u8,
    pub(crate) opcode: u8,
    pub(crate) keylen: u16,
    pub(crate) extlen: u8,
    pub(crate) bodylen: u32,
    pub(crate) opaque: u32,
    pub(crate) cas: u64,
}

fn parse_header(input: &[u8]) -> IResult<&[u8], RequestHeader> {
    let (input, magic) = be_u8(input)?;
    let (input, opcode) = be_u8(input)?;
    let (input, keylen) = be_u16(input)?;
    let (input, extlen) = be_u8(input)?;
    let (input, _datatype) = be_u8(input)?;
    let (input, _reserved) = be_u16(input)?;
    let (input, bodylen) = be_u32(input)?;
    let (input, opaque) = be_u32(input)?;
    let (input, cas) = be_u64(input)?;

    Ok((
        input,
        RequestHeader {
            magic,
            opcode,
            keylen,
            extlen,
            bodylen,
            opaque,
            cas,
        },
    ))
}

/// Write a binary response header onto the buffer.
pub(crate) fn compose_header(
    dst: &mut dyn protocol_common::BufMut,
    opcode: u8,
    status: u16,
    extlen: u8,
    keylen: u16,
    bodylen: u32,
    opaque: u32,
    cas: u64,
) -> usize {
    dst.put_slice(&[MAGIC_RESPONSE, opcode]);
    dst.put_slice(&keylen.to_be_bytes());
    dst.put_slice(&[extlen, 0]);
    dst.put_slice(&status.to_be_bytes());
    dst.put_slice(&bodylen.to_be_bytes());
    dst.put_slice(&opaque.to_be_bytes());
    dst.put_slice(&cas.to_be_bytes());
    HEADER_LEN
}

impl RequestParser {
    pub(crate) fn parse_binary(&self, buffer: &[u8]) -> Result<Parsed, std::io::Error> {
        match self.parse_binary_request(buffer) {
            Ok((remaining, request)) => {
                Ok(Parsed::new(request, buffer.len() - remaining.len()))
            }
            Err(Err::Incomplete(_)) => {
                Err(std::io::Error::from(std::io::ErrorKind::WouldBlock))
            }
            Err(_) => Err(std::io::Error::from(std::io::ErrorKind::InvalidData)),
        }
    }

    fn parse_binary_request<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        let (input, header) = parse_header(input)?;

        if header.magic != MAGIC_REQUEST {
            return Err(Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }

        // refuse to buffer a body which could never be stored; the
        // connection closes after the error reply
        if header.bodylen as usize
            > self.max_value_size + header.keylen as usize + header.extlen as usize
        {
            let frame = frame(&header, false);
            return Ok((input, Request::invalid(frame, InvalidReason::ValueTooLarge)));
        }

        let (opcode, quiet) = match Opcode::decode(header.opcode) {
            Some(decoded) => decoded,
            None => {
                // consume the body so the next request can be parsed
                let (input, _) = take(header.bodylen as usize)(input)?;
                let frame = frame(&header, false);
                return Ok((input, Request::invalid(frame, InvalidReason::UnknownOpcode)));
            }
        };

        let frame = frame(&header, quiet);

        let keylen = header.keylen as usize;
        let extlen = header.extlen as usize;
        let bodylen = header.bodylen as usize;

        if keylen + extlen > bodylen || keylen > self.max_key_len {
            let (input, _) = take(bodylen)(input)?;
            return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
        }

        let (input, body) = take(bodylen)(input)?;
        let extras = &body[0..extlen];
        let key = &body[extlen..extlen + keylen];
        let value = &body[extlen + keylen..];

        let command = match opcode {
            Opcode::Get | Opcode::GetK => {
                if extlen != 0 || keylen == 0 || bodylen != keylen {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                Command::Get(Get::new(
                    vec![key.to_owned().into_boxed_slice()].into_boxed_slice(),
                    true,
                ))
            }
            Opcode::Set | Opcode::Add | Opcode::Replace => {
                if extlen != 8 || keylen == 0 || bodylen < keylen + 8 {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                let flags = u32::from_be_bytes([extras[0], extras[1], extras[2], extras[3]]);
                let exptime =
                    u32::from_be_bytes([extras[4], extras[5], extras[6], extras[7]]) as i64;
                let key = key.to_owned().into_boxed_slice();
                let value = value.to_owned().into_boxed_slice();

                // a store with a nonzero cas field is a compare-and-swap
                if header.cas != 0 {
                    Command::Cas(Cas {
                        key,
                        value,
                        flags,
                        exptime,
                        cas: header.cas,
                    })
                } else {
                    match opcode {
                        Opcode::Set => Command::Set(Set {
                            key,
                            value,
                            flags,
                            exptime,
                        }),
                        Opcode::Add => Command::Add(Add {
                            key,
                            value,
                            flags,
                            exptime,
                        }),
                        _ => Command::Replace(Replace {
                            key,
                            value,
                            flags,
                            exptime,
                        }),
                    }
                }
            }
            Opcode::Delete => {
                if extlen != 0 || keylen == 0 || bodylen != keylen {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                Command::Delete(Delete {
                    key: key.to_owned().into_boxed_slice(),
                })
            }
            Opcode::Increment | Opcode::Decrement => {
                if extlen != 20 || keylen == 0 || bodylen != keylen + 20 {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                let delta = u64::from_be_bytes(extras[0..8].try_into().unwrap());
                let initial = u64::from_be_bytes(extras[8..16].try_into().unwrap());
                let exptime = u32::from_be_bytes(extras[16..20].try_into().unwrap());

                let create = if exptime == NO_CREATE {
                    None
                } else {
                    Some(Create { initial, exptime })
                };

                let key = key.to_owned().into_boxed_slice();
                if opcode == Opcode::Increment {
                    Command::Incr(Incr {
                        key,
                        value: delta,
                        cas: header.cas,
                        create,
                    })
                } else {
                    Command::Decr(Decr {
                        key,
                        value: delta,
                        cas: header.cas,
                        create,
                    })
                }
            }
            Opcode::Append | Opcode::Prepend => {
                if extlen != 0 || keylen == 0 {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                Command::Append(Append {
                    key: key.to_owned().into_boxed_slice(),
                    value: value.to_owned().into_boxed_slice(),
                    prepend: opcode == Opcode::Prepend,
                })
            }
            Opcode::Flush => {
                if keylen != 0 || bodylen != extlen || !(extlen == 0 || extlen == 4) {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                let delay = if extlen == 4 {
                    Some(u32::from_be_bytes(extras[0..4].try_into().unwrap()) as i64)
                } else {
                    None
                };
                Command::FlushAll(FlushAll { delay })
            }
            Opcode::Quit | Opcode::Noop | Opcode::Version => {
                if extlen != 0 || keylen != 0 || bodylen != 0 {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                match opcode {
                    Opcode::Quit => Command::Quit,
                    Opcode::Noop => Command::Noop,
                    _ => Command::Version,
                }
            }
            Opcode::Stat => {
                if extlen != 0 || bodylen != keylen {
                    return Ok((input, Request::invalid(frame, InvalidReason::BadFraming)));
                }
                let command = match key {
                    b"" => StatsCommand::Server,
                    b"reset" => StatsCommand::Reset,
                    b"detail" => StatsCommand::Detail,
                    _ => StatsCommand::Unknown,
                };
                Command::Stats(Stats::new(command))
            }
        };

        Ok((input, Request::new(frame, command)))
    }
}

fn frame(header: &RequestHeader, quiet: bool) -> Frame {
    Frame::Binary {
        opcode: header.opcode,
        opaque: header.opaque,
        quiet,
    }
}
