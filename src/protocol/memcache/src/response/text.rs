//! Renders responses in the text protocol. Every reply is a token line
//! terminated by CRLF; values carry their payload between the `VALUE` line
//! and the terminating `END`.

use super::*;

pub(crate) fn compose(body: &ResponseBody, noreply: bool, dst: &mut dyn BufMut) -> usize {
    // `noreply` suppresses the reply entirely. Commands which produce
    // multi-line replies have no noreply form.
    if noreply {
        return 0;
    }

    match body {
        ResponseBody::Stored { .. } => put(dst, b"STORED\r\n"),
        ResponseBody::NotStored => put(dst, b"NOT_STORED\r\n"),
        ResponseBody::Exists => put(dst, b"EXISTS\r\n"),
        ResponseBody::NotFound => put(dst, b"NOT_FOUND\r\n"),
        ResponseBody::Deleted => put(dst, b"DELETED\r\n"),
        ResponseBody::Ok => put(dst, b"OK\r\n"),
        ResponseBody::Reset => put(dst, b"RESET\r\n"),
        ResponseBody::Cant => put(dst, b"CANT\r\n"),
        ResponseBody::Values { values } => {
            let mut size = 0;
            for value in values.iter() {
                let data = match value.data() {
                    Some(data) => data,
                    None => continue, // misses are silently skipped
                };
                let header = match value.cas() {
                    Some(cas) => format!(" {} {} {}\r\n", value.flags(), data.len(), cas),
                    None => format!(" {} {}\r\n", value.flags(), data.len()),
                };
                size += put(dst, b"VALUE ");
                size += put(dst, value.key());
                size += put(dst, header.as_bytes());
                size += put(dst, data);
                size += put(dst, b"\r\n");
            }
            size += put(dst, b"END\r\n");
            size
        }
        ResponseBody::Numeric { value, .. } => put(dst, format!("{}\r\n", value).as_bytes()),
        ResponseBody::Stats { entries } => {
            let mut size = 0;
            for (name, value) in entries.iter() {
                size += put(dst, format!("STAT {} {}\r\n", name, value).as_bytes());
            }
            size += put(dst, b"END\r\n");
            size
        }
        ResponseBody::Items { items } => {
            let mut size = 0;
            for item in items.iter() {
                size += put(dst, b"ITEM ");
                size += put(dst, &item.key);
                size += put(
                    dst,
                    format!(" [{} b; {} s]\r\n", item.size, item.exptime).as_bytes(),
                );
            }
            size += put(dst, b"END\r\n");
            size
        }
        ResponseBody::Version { version } => {
            put(dst, format!("VERSION {}\r\n", version).as_bytes())
        }
        ResponseBody::Error | ResponseBody::BadFraming => put(dst, b"ERROR\r\n"),
        ResponseBody::ClientError { reason } => {
            put(dst, format!("CLIENT_ERROR {}\r\n", reason).as_bytes())
        }
        ResponseBody::ServerError { reason } => {
            put(dst, format!("SERVER_ERROR {}\r\n", reason).as_bytes())
        }
        ResponseBody::TooLarge { .. } => put(dst, b"SERVER_ERROR object too large for cache\r\n"),
        ResponseBody::OutOfMemory => put(dst, b"SERVER_ERROR out of memory storing object\r\n"),
        ResponseBody::Hangup => 0,
    }
}

fn put(dst: &mut dyn BufMut, src: &[u8]) -> usize {
    dst.put_slice(src);
    src.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_common::Compose;

    fn request(noreply: bool) -> Request {
        Request::text(noreply, Command::Version)
    }

    fn render(response: &Response) -> Vec<u8> {
        let mut buf = Vec::new();
        response.compose(&mut buf);
        buf
    }

    #[test]
    fn simple_tokens() {
        let req = request(false);
        assert_eq!(render(&Response::stored(&req, 1)), b"STORED\r\n");
        assert_eq!(render(&Response::not_stored(&req)), b"NOT_STORED\r\n");
        assert_eq!(render(&Response::exists(&req)), b"EXISTS\r\n");
        assert_eq!(render(&Response::not_found(&req)), b"NOT_FOUND\r\n");
        assert_eq!(render(&Response::deleted(&req)), b"DELETED\r\n");
        assert_eq!(render(&Response::ok(&req)), b"OK\r\n");
        assert_eq!(render(&Response::reset(&req)), b"RESET\r\n");
        assert_eq!(render(&Response::cant(&req)), b"CANT\r\n");
        assert_eq!(render(&Response::error(&req)), b"ERROR\r\n");
    }

    #[test]
    fn noreply_suppresses_reply() {
        let req = request(true);
        assert_eq!(render(&Response::stored(&req, 1)), b"");
        assert_eq!(render(&Response::not_found(&req)), b"");
    }

    #[test]
    fn values_with_and_without_cas() {
        let req = request(false);

        let response = Response::values(
            &req,
            vec![Value::new(b"foo", 0, None, b"fooval")].into_boxed_slice(),
        );
        assert_eq!(render(&response), b"VALUE foo 0 6\r\nfooval\r\nEND\r\n");

        let response = Response::values(
            &req,
            vec![Value::new(b"a", 5, Some(9), b"bar")].into_boxed_slice(),
        );
        assert_eq!(render(&response), b"VALUE a 5 3 9\r\nbar\r\nEND\r\n");
    }

    #[test]
    fn misses_are_skipped() {
        let req = request(false);
        let response = Response::values(
            &req,
            vec![
                Value::none(b"gone"),
                Value::new(b"here", 0, None, b"x"),
                Value::none(b"also_gone"),
            ]
            .into_boxed_slice(),
        );
        assert_eq!(render(&response), b"VALUE here 0 1\r\nx\r\nEND\r\n");
    }

    #[test]
    fn empty_values_is_just_end() {
        let req = request(false);
        let response = Response::values(&req, Vec::new().into_boxed_slice());
        assert_eq!(render(&response), b"END\r\n");
    }

    #[test]
    fn numeric() {
        let req = request(false);
        assert_eq!(render(&Response::numeric(&req, 3, 1)), b"3\r\n");
    }

    #[test]
    fn stats_and_version() {
        let req = request(false);
        let response = Response::stats(
            &req,
            vec![("pid".to_string(), "1".to_string())],
        );
        assert_eq!(render(&response), b"STAT pid 1\r\nEND\r\n");

        let response = Response::version(&req, "1.2.3");
        assert_eq!(render(&response), b"VERSION 1.2.3\r\n");
    }

    #[test]
    fn errors() {
        let req = request(false);
        assert_eq!(
            render(&Response::client_error(&req, "bad data chunk")),
            b"CLIENT_ERROR bad data chunk\r\n"
        );
        assert_eq!(
            render(&Response::server_error(&req, "backend failure")),
            b"SERVER_ERROR backend failure\r\n"
        );
        assert_eq!(
            render(&Response::too_large(&req)),
            b"SERVER_ERROR object too large for cache\r\n"
        );
        assert_eq!(
            render(&Response::out_of_memory(&req)),
            b"SERVER_ERROR out of memory storing object\r\n"
        );
    }

    #[test]
    fn hangup_is_silent() {
        let req = request(false);
        let response = Response::hangup(&req);
        assert_eq!(render(&response), b"");
        assert!(response.should_hangup());
    }

    #[test]
    fn cachedump_items() {
        let req = request(false);
        let response = Response::items(
            &req,
            vec![ItemDump {
                key: b"foo".to_vec().into_boxed_slice(),
                size: 6,
                exptime: 0,
            }],
        );
        assert_eq!(render(&response), b"ITEM foo [6 b; 0 s]\r\nEND\r\n");
    }
}
