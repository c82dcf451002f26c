//! Renders responses in the binary protocol. Every response is a 24-byte
//! header whose body length equals the total of the extras, key, and value
//! sections which follow. Quiet requests suppress successful responses;
//! errors are always sent, except for quiet get misses which are silent.

use super::*;

use crate::binary::*;

/// GETK opcodes echo the key in miss responses.
fn wants_key(opcode: u8) -> bool {
    matches!(opcode, 0x0c | 0x0d)
}

pub(crate) fn compose(
    body: &ResponseBody,
    opcode: u8,
    opaque: u32,
    quiet: bool,
    dst: &mut dyn BufMut,
) -> usize {
    match body {
        ResponseBody::Stored { cas } => {
            if quiet {
                0
            } else {
                compose_header(dst, opcode, STATUS_SUCCESS, 0, 0, 0, opaque, *cas)
            }
        }
        ResponseBody::NotStored => error(dst, opcode, opaque, STATUS_NOT_STORED, b"Not stored."),
        ResponseBody::Exists => error(
            dst,
            opcode,
            opaque,
            STATUS_KEY_EEXISTS,
            b"Data exists for key.",
        ),
        ResponseBody::NotFound => error(dst, opcode, opaque, STATUS_KEY_ENOENT, b"Not found"),
        ResponseBody::Deleted | ResponseBody::Ok | ResponseBody::Reset => {
            if quiet {
                0
            } else {
                compose_header(dst, opcode, STATUS_SUCCESS, 0, 0, 0, opaque, 0)
            }
        }
        ResponseBody::Values { values } => {
            let mut size = 0;
            for value in values.iter() {
                size += compose_value(value, opcode, opaque, quiet, dst);
            }
            size
        }
        ResponseBody::Numeric { value, cas } => {
            if quiet {
                0
            } else {
                let size = compose_header(dst, opcode, STATUS_SUCCESS, 0, 0, 8, opaque, *cas);
                dst.put_slice(&value.to_be_bytes());
                size + 8
            }
        }
        ResponseBody::Stats { entries } => {
            let mut size = 0;
            for (name, value) in entries.iter() {
                let klen = name.len();
                let vlen = value.len();
                size += compose_header(
                    dst,
                    opcode,
                    STATUS_SUCCESS,
                    0,
                    klen as u16,
                    (klen + vlen) as u32,
                    opaque,
                    0,
                );
                dst.put_slice(name.as_bytes());
                dst.put_slice(value.as_bytes());
                size += klen + vlen;
            }
            // an empty key and value terminates the stats response
            size + compose_header(dst, opcode, STATUS_SUCCESS, 0, 0, 0, opaque, 0)
        }
        ResponseBody::Version { version } => {
            let size = compose_header(
                dst,
                opcode,
                STATUS_SUCCESS,
                0,
                0,
                version.len() as u32,
                opaque,
                0,
            );
            dst.put_slice(version.as_bytes());
            size + version.len()
        }
        ResponseBody::Error | ResponseBody::Cant => error(
            dst,
            opcode,
            opaque,
            STATUS_UNKNOWN_COMMAND,
            b"Unknown command",
        ),
        ResponseBody::ClientError { .. } => {
            error(dst, opcode, opaque, STATUS_EINVAL, b"Invalid arguments")
        }
        ResponseBody::ServerError { .. } | ResponseBody::OutOfMemory => {
            error(dst, opcode, opaque, STATUS_ENOMEM, b"Out of memory")
        }
        ResponseBody::TooLarge { .. } => error(dst, opcode, opaque, STATUS_E2BIG, b"Too large."),
        ResponseBody::BadFraming => {
            error(dst, opcode, opaque, STATUS_EINVAL, b"Invalid arguments")
        }
        // `Items` is only produced for the text protocol cachedump command
        ResponseBody::Items { .. } => error(dst, opcode, opaque, STATUS_KEY_ENOENT, b"Not found"),
        ResponseBody::Hangup => {
            if quiet {
                0
            } else {
                compose_header(dst, opcode, STATUS_SUCCESS, 0, 0, 0, opaque, 0)
            }
        }
    }
}

fn compose_value(value: &Value, opcode: u8, opaque: u32, quiet: bool, dst: &mut dyn BufMut) -> usize {
    match value.data() {
        Some(data) => {
            let keylen = if wants_key(opcode) {
                value.key().len()
            } else {
                0
            };
            let bodylen = 4 + keylen + data.len();
            let size = compose_header(
                dst,
                opcode,
                STATUS_SUCCESS,
                4,
                keylen as u16,
                bodylen as u32,
                opaque,
                value.cas().unwrap_or(0),
            );
            dst.put_slice(&value.flags().to_be_bytes());
            if keylen > 0 {
                dst.put_slice(value.key());
            }
            dst.put_slice(data);
            size + bodylen
        }
        None => {
            // quiet get misses are silent
            if quiet {
                return 0;
            }
            if wants_key(opcode) {
                let keylen = value.key().len();
                let size = compose_header(
                    dst,
                    opcode,
                    STATUS_KEY_ENOENT,
                    0,
                    keylen as u16,
                    keylen as u32,
                    opaque,
                    0,
                );
                dst.put_slice(value.key());
                size + keylen
            } else {
                error(dst, opcode, opaque, STATUS_KEY_ENOENT, b"Not found")
            }
        }
    }
}

fn error(dst: &mut dyn BufMut, opcode: u8, opaque: u32, status: u16, msg: &[u8]) -> usize {
    let size = compose_header(dst, opcode, status, 0, 0, msg.len() as u32, opaque, 0);
    dst.put_slice(msg);
    size + msg.len()
}
