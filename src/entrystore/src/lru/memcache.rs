//! Executes memcache commands against the `Lru` store.

use super::*;

use common::time::{realtime, refresh};
use log::LevelFilter;
use metriken::{metric, Counter};
use protocol_common::Execute;
use protocol_memcache::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[metric(name = "cmd_get", description = "keys requested by get commands")]
pub static CMD_GET: Counter = Counter::new();

#[metric(name = "cmd_set", description = "storage commands processed")]
pub static CMD_SET: Counter = Counter::new();

#[metric(name = "get_hits", description = "get requests which found the key")]
pub static GET_HITS: Counter = Counter::new();

#[metric(name = "get_misses", description = "get requests which missed")]
pub static GET_MISSES: Counter = Counter::new();

#[metric(name = "delete_hits", description = "delete requests which found the key")]
pub static DELETE_HITS: Counter = Counter::new();

#[metric(name = "delete_misses", description = "delete requests which missed")]
pub static DELETE_MISSES: Counter = Counter::new();

#[metric(name = "incr_hits", description = "incr requests which found the key")]
pub static INCR_HITS: Counter = Counter::new();

#[metric(name = "incr_misses", description = "incr requests which missed")]
pub static INCR_MISSES: Counter = Counter::new();

#[metric(name = "decr_hits", description = "decr requests which found the key")]
pub static DECR_HITS: Counter = Counter::new();

#[metric(name = "decr_misses", description = "decr requests which missed")]
pub static DECR_MISSES: Counter = Counter::new();

impl Execute<Request, Response> for Lru {
    fn execute(&mut self, request: &Request) -> Response {
        match request.command() {
            Command::Get(get) => self.get(request, get),
            Command::Set(set) => self.set(request, set),
            Command::Add(add) => self.add(request, add),
            Command::Replace(replace) => self.replace(request, replace),
            Command::Append(append) => self.append(request, append),
            Command::Cas(cas) => self.cas(request, cas),
            Command::Delete(delete) => self.delete(request, delete),
            Command::Incr(incr) => {
                self.arithmetic(request, incr.key(), incr.value(), incr.cas(), incr.create(), false)
            }
            Command::Decr(decr) => {
                self.arithmetic(request, decr.key(), decr.value(), decr.cas(), decr.create(), true)
            }
            Command::FlushAll(flush) => self.flush_all(request, flush),
            Command::Stats(stats) => self.stats(request, stats),
            Command::Version => Response::version(request, VERSION),
            Command::Verbosity(verbosity) => {
                let level = match verbosity.level() {
                    0 => LevelFilter::Info,
                    1 => LevelFilter::Debug,
                    _ => LevelFilter::Trace,
                };
                log::set_max_level(level);
                Response::ok(request)
            }
            Command::SlabsReassign => Response::cant(request),
            Command::Quit => Response::hangup(request),
            Command::Noop => Response::ok(request),
            Command::Invalid(invalid) => Response::from_invalid(request, invalid),
        }
    }
}

impl Lru {
    fn get(&mut self, request: &Request, get: &Get) -> Response {
        let mut values = Vec::with_capacity(get.keys().len());
        for key in get.keys() {
            CMD_GET.increment();
            match self.locate(key) {
                Some(index) => {
                    GET_HITS.increment();
                    self.touch(index);
                    let (value, flags, cas, _) = self.entry(index);
                    let cas = get.cas().then_some(cas);
                    values.push(Value::new(key, flags, cas, value));
                }
                None => {
                    GET_MISSES.increment();
                    values.push(Value::none(key));
                }
            }
        }
        Response::values(request, values.into_boxed_slice())
    }

    fn store_reply(&mut self, request: &Request, result: Result<u64, StoreError>) -> Response {
        match result {
            Ok(cas) => Response::stored(request, cas),
            Err(StoreError::TooLarge) => Response::too_large(request),
            Err(StoreError::OutOfMemory) => Response::out_of_memory(request),
        }
    }

    fn set(&mut self, request: &Request, set: &Set) -> Response {
        CMD_SET.increment();
        let exptime = realtime(set.exptime(), self.time_type());
        let result = self.insert(set.key(), set.value(), set.flags(), exptime);
        self.store_reply(request, result)
    }

    fn add(&mut self, request: &Request, add: &Add) -> Response {
        CMD_SET.increment();
        if let Some(index) = self.locate(add.key()) {
            // the existing item is promoted, matching the behavior of a
            // fetch, and the store is refused
            self.touch(index);
            return Response::not_stored(request);
        }
        let exptime = realtime(add.exptime(), self.time_type());
        let result = self.insert(add.key(), add.value(), add.flags(), exptime);
        self.store_reply(request, result)
    }

    fn replace(&mut self, request: &Request, replace: &Replace) -> Response {
        CMD_SET.increment();
        if self.locate(replace.key()).is_none() {
            return Response::not_found(request);
        }
        let exptime = realtime(replace.exptime(), self.time_type());
        let result = self.insert(replace.key(), replace.value(), replace.flags(), exptime);
        self.store_reply(request, result)
    }

    fn append(&mut self, request: &Request, append: &Append) -> Response {
        CMD_SET.increment();
        let index = match self.locate(append.key()) {
            Some(index) => index,
            None => {
                return Response::not_found(request);
            }
        };

        // the concatenated item keeps the flags and expiration of the
        // existing one
        let (old, _, _, _) = self.entry(index);
        let mut value = Vec::with_capacity(old.len() + append.value().len());
        if append.prepend() {
            value.extend_from_slice(append.value());
            value.extend_from_slice(old);
        } else {
            value.extend_from_slice(old);
            value.extend_from_slice(append.value());
        }

        self.touch(index);
        let result = self.replace_value(index, value.into_boxed_slice());
        self.store_reply(request, result)
    }

    fn cas(&mut self, request: &Request, cas: &Cas) -> Response {
        CMD_SET.increment();
        let index = match self.locate(cas.key()) {
            Some(index) => index,
            None => {
                return Response::not_found(request);
            }
        };

        let (_, _, current, _) = self.entry(index);
        if current != cas.cas() {
            return Response::exists(request);
        }

        let exptime = realtime(cas.exptime(), self.time_type());
        let result = self.insert(cas.key(), cas.value(), cas.flags(), exptime);
        self.store_reply(request, result)
    }

    fn delete(&mut self, request: &Request, delete: &Delete) -> Response {
        if self.remove(delete.key()) {
            DELETE_HITS.increment();
            Response::deleted(request)
        } else {
            DELETE_MISSES.increment();
            Response::not_found(request)
        }
    }

    fn arithmetic(
        &mut self,
        request: &Request,
        key: &[u8],
        delta: u64,
        cas: u64,
        create: Option<Create>,
        decr: bool,
    ) -> Response {
        let index = match self.locate(key) {
            Some(index) => index,
            None => {
                // the binary protocol can create the missing item
                if let Some(create) = create {
                    let exptime = realtime(create.exptime() as i64, self.time_type());
                    let initial = format!("{}", create.initial());
                    let result = self.insert(key, initial.as_bytes(), 0, exptime);
                    return match result {
                        Ok(new_cas) => Response::numeric(request, create.initial(), new_cas),
                        Err(StoreError::TooLarge) => Response::too_large(request),
                        Err(StoreError::OutOfMemory) => Response::out_of_memory(request),
                    };
                }
                if decr {
                    DECR_MISSES.increment();
                } else {
                    INCR_MISSES.increment();
                }
                return Response::not_found(request);
            }
        };

        let (value, _, current_cas, _) = self.entry(index);

        if cas != 0 && cas != current_cas {
            return Response::exists(request);
        }

        let current = match parse_decimal(value) {
            Some(current) => current,
            None => {
                return Response::client_error(
                    request,
                    "cannot increment or decrement non-numeric value",
                );
            }
        };

        let new = if decr {
            current.saturating_sub(delta)
        } else {
            current.wrapping_add(delta)
        };

        if decr {
            DECR_HITS.increment();
        } else {
            INCR_HITS.increment();
        }

        self.touch(index);
        let value = format!("{}", new).into_bytes().into_boxed_slice();
        match self.replace_value(index, value) {
            Ok(new_cas) => Response::numeric(request, new, new_cas),
            Err(StoreError::TooLarge) => Response::too_large(request),
            Err(StoreError::OutOfMemory) => Response::out_of_memory(request),
        }
    }

    fn flush_all(&mut self, request: &Request, flush: &FlushAll) -> Response {
        // take a fresh reading of the clock so the cutoff is exact
        refresh();
        let oldest_live = match flush.delay() {
            Some(delay) if delay > 0 => realtime(delay, self.time_type()).wrapping_sub(1),
            _ => current_time() - 1,
        };
        self.flush(oldest_live);
        Response::ok(request)
    }

    fn stats(&mut self, request: &Request, stats: &Stats) -> Response {
        match stats.command() {
            StatsCommand::Server => Response::stats(request, metrics::snapshot(VERSION)),
            StatsCommand::Reset => {
                metrics::reset();
                Response::reset(request)
            }
            StatsCommand::Detail => {
                Response::client_error(request, "detailed stats are not enabled")
            }
            StatsCommand::Cachedump { id: _, limit } => {
                let items = self
                    .dump(*limit)
                    .into_iter()
                    .map(|(key, size, exptime)| ItemDump { key, size, exptime })
                    .collect();
                Response::items(request, items)
            }
            StatsCommand::Unknown => {
                if request.frame().is_binary() {
                    Response::not_found(request)
                } else {
                    Response::error(request)
                }
            }
        }
    }
}

/// A strict unsigned decimal parser: the whole value must be ASCII digits
/// and fit in 64 bits.
fn parse_decimal(value: &[u8]) -> Option<u64> {
    if value.is_empty() || value.len() > 20 {
        return None;
    }
    let mut result: u64 = 0;
    for byte in value {
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as u64)?;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::LrucacheConfig;
    use protocol_common::Parse;

    fn store() -> Lru {
        common::time::initialize();
        Lru::new(&LrucacheConfig::default())
    }

    fn small_store(heap_size: usize, evictions: bool) -> Lru {
        common::time::initialize();
        let config: LrucacheConfig = toml::from_str(&format!(
            "[cache]\nheap_size = {}\nevictions = {}",
            heap_size, evictions
        ))
        .unwrap();
        Lru::new(&config)
    }

    fn req(line: &[u8]) -> Request {
        let parser = RequestParser::new();
        Parse::parse(&parser, line).unwrap().into_inner()
    }

    fn execute(lru: &mut Lru, line: &[u8]) -> Response {
        let request = req(line);
        lru.execute(&request)
    }

    #[test]
    fn set_then_get_roundtrip() {
        let mut lru = store();
        let response = execute(&mut lru, b"set foo 42 0 6\r\nfooval\r\n");
        assert!(matches!(response.body(), ResponseBody::Stored { .. }));

        let response = execute(&mut lru, b"get foo\r\n");
        match response.body() {
            ResponseBody::Values { values } => {
                assert_eq!(values.len(), 1);
                assert_eq!(values[0].data(), Some(&b"fooval"[..]));
                assert_eq!(values[0].flags(), 42);
                assert_eq!(values[0].cas(), None);
            }
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn get_miss() {
        let mut lru = store();
        let response = execute(&mut lru, b"get nope\r\n");
        match response.body() {
            ResponseBody::Values { values } => {
                assert_eq!(values[0].data(), None);
            }
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn add_only_when_absent() {
        let mut lru = store();
        let response = execute(&mut lru, b"add foo 0 0 1\r\na\r\n");
        assert!(matches!(response.body(), ResponseBody::Stored { .. }));

        let response = execute(&mut lru, b"add foo 0 0 1\r\nb\r\n");
        assert!(matches!(response.body(), ResponseBody::NotStored));
    }

    #[test]
    fn replace_only_when_present() {
        let mut lru = store();
        let response = execute(&mut lru, b"replace foo 0 0 1\r\na\r\n");
        assert!(matches!(response.body(), ResponseBody::NotFound));

        execute(&mut lru, b"set foo 0 0 1\r\na\r\n");
        let response = execute(&mut lru, b"replace foo 0 0 1\r\nb\r\n");
        assert!(matches!(response.body(), ResponseBody::Stored { .. }));
    }

    #[test]
    fn append_inherits_flags() {
        let mut lru = store();
        execute(&mut lru, b"set x 7 0 3\r\nabc\r\n");
        let response = execute(&mut lru, b"append x 0 0 3\r\ndef\r\n");
        assert!(matches!(response.body(), ResponseBody::Stored { .. }));

        let response = execute(&mut lru, b"get x\r\n");
        match response.body() {
            ResponseBody::Values { values } => {
                assert_eq!(values[0].data(), Some(&b"abcdef"[..]));
                assert_eq!(values[0].flags(), 7);
            }
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn prepend() {
        let mut lru = store();
        execute(&mut lru, b"set x 0 0 3\r\ndef\r\n");
        execute(&mut lru, b"prepend x 0 0 3\r\nabc\r\n");
        let response = execute(&mut lru, b"get x\r\n");
        match response.body() {
            ResponseBody::Values { values } => {
                assert_eq!(values[0].data(), Some(&b"abcdef"[..]));
            }
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn append_missing_is_not_found() {
        let mut lru = store();
        let response = execute(&mut lru, b"append x 0 0 1\r\na\r\n");
        assert!(matches!(response.body(), ResponseBody::NotFound));
    }

    #[test]
    fn cas_semantics() {
        let mut lru = store();
        execute(&mut lru, b"set a 5 0 3\r\nbar\r\n");

        let response = execute(&mut lru, b"gets a\r\n");
        let cas = match response.body() {
            ResponseBody::Values { values } => values[0].cas().unwrap(),
            _ => panic!("wrong response"),
        };

        let stale = format!("cas a 5 0 3 {}\r\nbaz\r\n", cas + 1);
        let response = execute(&mut lru, stale.as_bytes());
        assert!(matches!(response.body(), ResponseBody::Exists));

        let current = format!("cas a 5 0 3 {}\r\nbaz\r\n", cas);
        let response = execute(&mut lru, current.as_bytes());
        assert!(matches!(response.body(), ResponseBody::Stored { .. }));

        let response = execute(&mut lru, b"cas missing 0 0 1 1\r\nx\r\n");
        assert!(matches!(response.body(), ResponseBody::NotFound));
    }

    #[test]
    fn incr_decr() {
        let mut lru = store();
        let response = execute(&mut lru, b"incr i 1\r\n");
        assert!(matches!(response.body(), ResponseBody::NotFound));

        execute(&mut lru, b"set n 0 0 1\r\n0\r\n");
        let response = execute(&mut lru, b"incr n 3\r\n");
        assert!(matches!(
            response.body(),
            ResponseBody::Numeric { value: 3, .. }
        ));

        let response = execute(&mut lru, b"decr n 1\r\n");
        assert!(matches!(
            response.body(),
            ResponseBody::Numeric { value: 2, .. }
        ));
    }

    #[test]
    fn decr_saturates_at_zero() {
        let mut lru = store();
        execute(&mut lru, b"set n 0 0 1\r\n5\r\n");
        let response = execute(&mut lru, b"decr n 100\r\n");
        assert!(matches!(
            response.body(),
            ResponseBody::Numeric { value: 0, .. }
        ));
    }

    #[test]
    fn incr_wraps() {
        let mut lru = store();
        execute(&mut lru, b"set n 0 0 20\r\n18446744073709551615\r\n");
        let response = execute(&mut lru, b"incr n 1\r\n");
        assert!(matches!(
            response.body(),
            ResponseBody::Numeric { value: 0, .. }
        ));
    }

    #[test]
    fn incr_non_numeric() {
        let mut lru = store();
        execute(&mut lru, b"set n 0 0 3\r\nabc\r\n");
        let response = execute(&mut lru, b"incr n 1\r\n");
        assert!(matches!(response.body(), ResponseBody::ClientError { .. }));
    }

    #[test]
    fn delete_hit_and_miss() {
        let mut lru = store();
        execute(&mut lru, b"set foo 0 0 1\r\nx\r\n");
        let response = execute(&mut lru, b"delete foo\r\n");
        assert!(matches!(response.body(), ResponseBody::Deleted));
        let response = execute(&mut lru, b"delete foo\r\n");
        assert!(matches!(response.body(), ResponseBody::NotFound));
    }

    #[test]
    fn flush_all_hides_existing_items() {
        let mut lru = store();
        execute(&mut lru, b"set foo 0 0 1\r\nx\r\n");
        let response = execute(&mut lru, b"flush_all\r\n");
        assert!(matches!(response.body(), ResponseBody::Ok));

        let response = execute(&mut lru, b"get foo\r\n");
        match response.body() {
            ResponseBody::Values { values } => assert_eq!(values[0].data(), None),
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn set_after_flush_is_visible() {
        let mut lru = store();
        execute(&mut lru, b"flush_all\r\n");
        // an item stored in the same second as the flush is newer than the
        // cutoff and stays visible
        execute(&mut lru, b"set foo 0 0 1\r\nx\r\n");
        let response = execute(&mut lru, b"get foo\r\n");
        match response.body() {
            ResponseBody::Values { values } => {
                assert_eq!(values[0].data(), Some(&b"x"[..]))
            }
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn eviction_is_lru_ordered() {
        let mut lru = small_store(200, true);
        execute(&mut lru, b"set a 0 0 10\r\nxxxxxxxxxx\r\n");
        execute(&mut lru, b"set b 0 0 10\r\nxxxxxxxxxx\r\n");
        // touch `a` so that `b` is the least recently used
        execute(&mut lru, b"get a\r\n");
        // storing a third item must evict `b`
        execute(&mut lru, b"set c 0 0 10\r\nxxxxxxxxxx\r\n");

        let response = execute(&mut lru, b"get b\r\n");
        match response.body() {
            ResponseBody::Values { values } => assert_eq!(values[0].data(), None),
            _ => panic!("wrong response"),
        }
        let response = execute(&mut lru, b"get a\r\n");
        match response.body() {
            ResponseBody::Values { values } => {
                assert!(values[0].data().is_some())
            }
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn disabled_evictions_fail_the_store() {
        let mut lru = small_store(160, false);
        execute(&mut lru, b"set a 0 0 10\r\nxxxxxxxxxx\r\n");
        execute(&mut lru, b"set b 0 0 10\r\nxxxxxxxxxx\r\n");
        let response = execute(&mut lru, b"set c 0 0 10\r\nxxxxxxxxxx\r\n");
        assert!(matches!(response.body(), ResponseBody::OutOfMemory));
    }

    #[test]
    fn version_and_quit() {
        let mut lru = store();
        let response = execute(&mut lru, b"version\r\n");
        assert!(matches!(response.body(), ResponseBody::Version { .. }));

        let response = execute(&mut lru, b"quit\r\n");
        assert!(protocol_common::Compose::should_hangup(&response));
    }

    #[test]
    fn stats_reports_required_keys() {
        let mut lru = store();
        execute(&mut lru, b"set foo 0 0 1\r\nx\r\n");
        execute(&mut lru, b"get foo\r\n");
        let response = execute(&mut lru, b"stats\r\n");
        match response.body() {
            ResponseBody::Stats { entries } => {
                for key in [
                    "pid",
                    "uptime",
                    "cmd_get",
                    "cmd_set",
                    "get_hits",
                    "get_misses",
                    "curr_items",
                    "total_items",
                ] {
                    assert!(
                        entries.iter().any(|(k, _)| k == key),
                        "missing stat {}",
                        key
                    );
                }
            }
            _ => panic!("wrong response"),
        }
    }

    #[test]
    fn slabs_reassign_cant() {
        let mut lru = store();
        let response = execute(&mut lru, b"slabs reassign 1 2\r\n");
        assert!(matches!(response.body(), ResponseBody::Cant));
    }

    #[test]
    fn parse_decimal_rejects_garbage() {
        assert_eq!(parse_decimal(b"0"), Some(0));
        assert_eq!(parse_decimal(b"18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_decimal(b""), None);
        assert_eq!(parse_decimal(b"12a"), None);
        assert_eq!(parse_decimal(b"-1"), None);
        assert_eq!(parse_decimal(b"18446744073709551616"), None);
    }
}
