use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Clock time a session ends at, and whether it runs past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnd {
    pub end: NaiveTime,
    /// A session ending exactly at 00:00 does not count as crossing.
    pub crosses_midnight: bool,
}

/// `start + duration_minutes`, wrapped onto the 24h clock.
pub fn end_time(start: NaiveTime, duration_minutes: i32) -> SessionEnd {
    let (end, overflow_secs) =
        start.overflowing_add_signed(Duration::minutes(i64::from(duration_minutes)));
    SessionEnd {
        end,
        crosses_midnight: overflow_secs != 0 && end.num_seconds_from_midnight() != 0,
    }
}

/// Consecutive-day attendance runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    /// Run ending at the most recent session date.
    pub current: i32,
    pub longest: i32,
}

/// Streaks over a set of session dates (order and duplicates don't matter).
pub fn streaks(dates: &[NaiveDate]) -> Streaks {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = Streaks::default();
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for date in sorted {
        run = match prev.and_then(|p| p.succ_opt()) {
            Some(next) if next == date => run + 1,
            _ => 1,
        };
        out.longest = out.longest.max(run);
        prev = Some(date);
    }
    out.current = run;
    out
}
