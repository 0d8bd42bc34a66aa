use std::sync::Mutex;

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

/// `YYYYMMDD_HHMMSS_mmm`. Lexical order of formatted values equals
/// chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    format_timestamp(Local::now().naive_local())
}

/// Job identifier. Doubles as the primary sort key: ids compare in creation
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Hands out millisecond timestamp ids.
///
/// Ids from one generator are strictly increasing: when the clock has not
/// moved past the previous id, the next id is the previous one plus 1ms.
/// Collisions with ids from other processes are still possible and are
/// detected when the descriptor is written.
#[derive(Debug, Default)]
pub struct JobIdGenerator {
    last: Mutex<Option<NaiveDateTime>>,
}

impl JobIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> JobId {
        self.next_at(Local::now().naive_local())
    }

    /// Id for a given wall-clock reading.
    pub fn next_at(&self, now: NaiveDateTime) -> JobId {
        let now = truncate_to_millis(now);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let issued = match *last {
            Some(prev) if now <= prev => prev + TimeDelta::milliseconds(1),
            _ => now,
        };
        *last = Some(issued);
        JobId(format_timestamp(issued))
    }
}

fn truncate_to_millis(at: NaiveDateTime) -> NaiveDateTime {
    let nanos = (at.nanosecond() / 1_000_000) * 1_000_000;
    at.with_nanosecond(nanos).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn format_is_millisecond_timestamp() {
        assert_eq!(format_timestamp(at(9, 5, 7, 42)), "20230102_090507_042");
    }

    #[test]
    fn ids_follow_the_clock() {
        let ids = JobIdGenerator::new();
        let a = ids.next_at(at(10, 0, 0, 1));
        let b = ids.next_at(at(10, 0, 0, 5));
        assert_eq!(a.as_str(), "20230102_100000_001");
        assert_eq!(b.as_str(), "20230102_100000_005");
        assert!(a < b);
    }

    #[test]
    fn same_millisecond_is_bumped() {
        let ids = JobIdGenerator::new();
        let a = ids.next_at(at(10, 0, 0, 1));
        let b = ids.next_at(at(10, 0, 0, 1));
        let c = ids.next_at(at(10, 0, 0, 0));
        assert_eq!(b.as_str(), "20230102_100000_002");
        assert_eq!(c.as_str(), "20230102_100000_003");
        assert!(a < b && b < c);
    }

    #[test]
    fn bump_carries_into_seconds() {
        let ids = JobIdGenerator::new();
        ids.next_at(at(10, 0, 0, 999));
        let next = ids.next_at(at(10, 0, 0, 999));
        assert_eq!(next.as_str(), "20230102_100001_000");
    }

    #[test]
    fn sub_millisecond_precision_is_dropped() {
        let ids = JobIdGenerator::new();
        let t = at(10, 0, 0, 7).with_nanosecond(7_654_321).unwrap();
        assert_eq!(ids.next_at(t).as_str(), "20230102_100000_007");
    }

    #[test]
    fn lexical_order_matches_chronological_order() {
        let ids = JobIdGenerator::new();
        let generated: Vec<JobId> = (0..50).map(|_| ids.next_id()).collect();
        let mut sorted = generated.clone();
        sorted.sort();
        assert_eq!(generated, sorted);
        sorted.dedup();
        assert_eq!(sorted.len(), 50);
    }
}
