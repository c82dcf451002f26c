//! Glue around the `metriken` registry. Crates declare their own counters
//! and gauges with the `#[metric]` attribute; this crate assembles the
//! `stats` command report from the registry and implements `stats reset`.

pub use metriken::{metric, Counter, Gauge};

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::OnceLock;

#[metric(name = "pid", description = "the process id")]
pub static PID: Gauge = Gauge::new();

#[metric(
    name = "limit_maxbytes",
    description = "the memory budget for cached items in bytes"
)]
pub static LIMIT_MAXBYTES: Gauge = Gauge::new();

#[metric(name = "threads", description = "the number of worker threads")]
pub static THREADS: Gauge = Gauge::new();

/// The server-scope stats which are reported first and in this order. Any
/// other registered metric is appended to the report in sorted order.
const ORDERED_STATS: &[&str] = &[
    "pid",
    "uptime",
    "time",
    "version",
    "pointer_size",
    "rusage_user",
    "rusage_system",
    "curr_connections",
    "total_connections",
    "connection_structures",
    "cmd_get",
    "cmd_set",
    "get_hits",
    "get_misses",
    "delete_misses",
    "delete_hits",
    "incr_misses",
    "incr_hits",
    "decr_misses",
    "decr_hits",
    "bytes_read",
    "bytes_written",
    "limit_maxbytes",
    "threads",
];

fn baselines() -> &'static Mutex<HashMap<String, u64>> {
    static BASELINES: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();
    BASELINES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Set the process-constant gauges.
pub fn init(limit_maxbytes: usize, threads: usize) {
    PID.set(std::process::id() as i64);
    LIMIT_MAXBYTES.set(limit_maxbytes as i64);
    THREADS.set(threads as i64);
}

fn getrusage() -> (String, String) {
    let mut rusage = unsafe { std::mem::zeroed::<libc::rusage>() };
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut rusage) } == 0 {
        (
            format!(
                "{}.{:06}",
                rusage.ru_utime.tv_sec, rusage.ru_utime.tv_usec
            ),
            format!(
                "{}.{:06}",
                rusage.ru_stime.tv_sec, rusage.ru_stime.tv_usec
            ),
        )
    } else {
        ("0.000000".to_string(), "0.000000".to_string())
    }
}

/// Collect every registered metric by name. Counter values have their reset
/// baseline subtracted.
fn registry_values() -> HashMap<String, String> {
    let baselines = baselines().lock().unwrap_or_else(|e| e.into_inner());
    let mut values = HashMap::new();
    for metric in metriken::metrics().iter() {
        let name = metric.name();
        if name.is_empty() {
            continue;
        }
        match metric.value() {
            Some(metriken::Value::Counter(v)) => {
                let v = v.saturating_sub(baselines.get(name).copied().unwrap_or(0));
                values.insert(name.to_string(), format!("{}", v));
            }
            Some(metriken::Value::Gauge(v)) => {
                values.insert(name.to_string(), format!("{}", v));
            }
            _ => {}
        }
    }
    values
}

/// Produce the `stats` report: the server-scope keys in their fixed order,
/// then every other registered metric sorted by name.
pub fn snapshot(version: &str) -> Vec<(String, String)> {
    let mut values = registry_values();

    let (rusage_user, rusage_system) = getrusage();
    values.insert(
        "uptime".to_string(),
        format!("{}", common::time::current_time()),
    );
    values.insert("time".to_string(), format!("{}", common::time::unix_time()));
    values.insert("version".to_string(), version.to_string());
    values.insert(
        "pointer_size".to_string(),
        format!("{}", 8 * std::mem::size_of::<*const u8>()),
    );
    values.insert("rusage_user".to_string(), rusage_user);
    values.insert("rusage_system".to_string(), rusage_system);

    let mut stats = Vec::with_capacity(values.len());
    for name in ORDERED_STATS {
        if let Some(value) = values.remove(*name) {
            stats.push((name.to_string(), value));
        }
    }

    let mut remaining: Vec<(String, String)> = values.into_iter().collect();
    remaining.sort();
    stats.extend(remaining);

    stats
}

/// Implements `stats reset`: record the current value of every counter so
/// later reports show the delta. Gauges are unaffected.
pub fn reset() {
    let mut baselines = baselines().lock().unwrap_or_else(|e| e.into_inner());
    for metric in metriken::metrics().iter() {
        if let Some(metriken::Value::Counter(v)) = metric.value() {
            baselines.insert(metric.name().to_string(), v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[metric(name = "test_counter", description = "test only")]
    static TEST_COUNTER: Counter = Counter::new();

    #[test]
    fn snapshot_contains_required_keys() {
        common::time::initialize();
        init(1024 * 1024, 4);
        let stats = snapshot("0.1.0");
        for key in [
            "pid",
            "uptime",
            "time",
            "version",
            "pointer_size",
            "rusage_user",
            "rusage_system",
            "limit_maxbytes",
            "threads",
        ] {
            assert!(
                stats.iter().any(|(k, _)| k == key),
                "missing stat: {}",
                key
            );
        }
    }

    #[test]
    fn ordered_keys_come_first() {
        common::time::initialize();
        init(1024 * 1024, 4);
        let stats = snapshot("0.1.0");
        assert_eq!(stats[0].0, "pid");
        assert_eq!(stats[1].0, "uptime");
        assert_eq!(stats[2].0, "time");
        assert_eq!(stats[3].0, "version");
        assert_eq!(stats[3].1, "0.1.0");
    }

    #[test]
    fn reset_zeroes_counters() {
        common::time::initialize();
        TEST_COUNTER.add(5);
        reset();
        let stats = snapshot("0.1.0");
        let value = stats
            .iter()
            .find(|(k, _)| k == "test_counter")
            .map(|(_, v)| v.clone());
        assert_eq!(value.as_deref(), Some("0"));

        TEST_COUNTER.add(3);
        let stats = snapshot("0.1.0");
        let value = stats
            .iter()
            .find(|(k, _)| k == "test_counter")
            .map(|(_, v)| v.clone());
        assert_eq!(value.as_deref(), Some("3"));
    }
}
