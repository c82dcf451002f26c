//! The process-wide coarse clock.
//!
//! Cache items carry 32-bit expiration times which are relative to the moment
//! the process started. The current relative time is held in an atomic which
//! is refreshed once per second by the maintenance thread and on-demand by
//! commands which act on time (eg: `flush_all`). This keeps the hot paths
//! free of syscalls.
//!
//! The start time is anchored two seconds in the past so that the relative
//! time is never zero while the process runs. This lets zero serve as the
//! "never" / "unset" value for both item expiration and `oldest_live`.

use serde::{Deserialize, Serialize};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Expiration times further in the future than this are treated as absolute
/// unix timestamps rather than relative offsets. (30 days, in seconds)
pub const MAX_DELTA: u32 = 60 * 60 * 24 * 30;

/// How expiration time arguments on the wire should be interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeType {
    /// Always a number of seconds from now.
    Delta,
    /// Always an absolute unix timestamp.
    Unix,
    /// Memcache rules: a delta when thirty days or less, otherwise an
    /// absolute unix timestamp.
    Memcache,
}

struct Anchor {
    instant: Instant,
    /// Unix time of process start, offset two seconds into the past.
    started: u64,
}

static ANCHOR: OnceLock<Anchor> = OnceLock::new();
static CURRENT_TIME: AtomicU32 = AtomicU32::new(2);

fn anchor() -> &'static Anchor {
    ANCHOR.get_or_init(|| {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Anchor {
            instant: Instant::now(),
            started: wall.saturating_sub(2),
        }
    })
}

/// Anchor the clock and set the initial relative time. Calling this more than
/// once has no additional effect.
pub fn initialize() {
    let _ = anchor();
    refresh();
}

/// Recompute the current relative time from the monotonic clock.
pub fn refresh() {
    let elapsed = anchor().instant.elapsed().as_secs().saturating_add(2);
    CURRENT_TIME.store(elapsed.min(u32::MAX as u64) as u32, Ordering::Relaxed);
}

/// Seconds since the process start anchor. Never zero while running.
pub fn current_time() -> u32 {
    CURRENT_TIME.load(Ordering::Relaxed)
}

/// Unix time of the process start anchor.
pub fn process_started() -> u64 {
    anchor().started
}

/// The current unix time, at one second granularity.
pub fn unix_time() -> u64 {
    process_started() + current_time() as u64
}

/// Convert a wire expiration time into a relative expiration.
///
/// Zero always means "never expires" and maps to zero. Negative values mean
/// immediate expiration. Absolute timestamps that are already in the past
/// clamp to one second after process start, which is itself always in the
/// past.
pub fn realtime(exptime: i64, time_type: TimeType) -> u32 {
    if exptime == 0 {
        return 0;
    }

    if exptime < 0 {
        return 1;
    }

    let absolute = match time_type {
        TimeType::Unix => true,
        TimeType::Delta => false,
        TimeType::Memcache => exptime > MAX_DELTA as i64,
    };

    if absolute {
        let started = process_started() as i64;
        if exptime <= started {
            1
        } else {
            (exptime - started).min(u32::MAX as i64) as u32
        }
    } else {
        current_time().saturating_add(exptime.min(u32::MAX as i64) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_never_zero() {
        initialize();
        assert!(current_time() >= 2);
        refresh();
        assert!(current_time() >= 2);
    }

    #[test]
    fn realtime_zero_is_never() {
        initialize();
        assert_eq!(realtime(0, TimeType::Memcache), 0);
        assert_eq!(realtime(0, TimeType::Unix), 0);
        assert_eq!(realtime(0, TimeType::Delta), 0);
    }

    #[test]
    fn realtime_negative_is_immediate() {
        initialize();
        let t = realtime(-1, TimeType::Memcache);
        assert!(t != 0 && t <= current_time());
    }

    #[test]
    fn realtime_small_delta() {
        initialize();
        let t = realtime(60, TimeType::Memcache);
        assert_eq!(t, current_time() + 60);
    }

    #[test]
    fn realtime_thirty_day_boundary() {
        initialize();
        // exactly thirty days is still a delta
        let t = realtime(MAX_DELTA as i64, TimeType::Memcache);
        assert_eq!(t, current_time() + MAX_DELTA);
    }

    #[test]
    fn realtime_absolute_future() {
        initialize();
        let future = (process_started() + 1000) as i64;
        assert_eq!(realtime(future, TimeType::Unix), 1000);
    }

    #[test]
    fn realtime_absolute_past_clamps() {
        initialize();
        // an absolute time from before the process started expires one
        // second after start
        assert_eq!(realtime(100, TimeType::Unix), 1);
        let past = process_started() as i64;
        assert_eq!(realtime(past, TimeType::Unix), 1);
    }
}
