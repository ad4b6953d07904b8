// src/ingest/window.rs
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Default lookback. Jobs poll every minute, so consecutive windows overlap
/// by several cycles even when the scheduler fires late.
pub const DEFAULT_LOOKBACK_MINS: u64 = 5;

/// Lookback used when ingesting the full history (backfill).
pub const FULL_HISTORY_LOOKBACK_MINS: u64 = 10_000_000;

/// Inclusive `[start, end]` range of instants a cycle considers recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.start <= date && date <= self.end
    }
}

pub fn window_from_lookback(now: DateTime<Utc>, lookback_mins: u64) -> TimeWindow {
    let mins = i64::try_from(lookback_mins).unwrap_or(i64::MAX);
    let lookback = Duration::try_minutes(mins).unwrap_or(Duration::MAX);
    let start = now.checked_sub_signed(lookback).unwrap_or(DateTime::<Utc>::MIN_UTC);
    TimeWindow { start, end: now }
}

/// Source of "now" for windows and the future-date check.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.at.lock() = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock()
    }
}
