//! Daily scheduler for capybot.
//!
//! The scheduler is checked, not awaited: the sync loop polls it once per
//! iteration with the current local time. A job has two states per calendar
//! day, idle (not run today) and done (run today). Midnight rollover is not
//! a timer; it falls out of comparing dates.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing a trigger time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// Not a 24-hour `HH:MM` time.
    #[error("invalid time of day {0:?}: expected 24-hour HH:MM")]
    InvalidTime(String),
}

/// A wall-clock trigger time (`HH:MM`, 24-hour, local time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Create a trigger time from hours and minutes.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// The trigger as a `NaiveTime` (seconds are always zero).
    pub fn as_time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // chrono accepts single-digit fields; require the exact HH:MM shape.
        if trimmed.len() != 5 {
            return Err(ScheduleError::InvalidTime(s.to_string()));
        }
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(Self)
            .map_err(|_| ScheduleError::InvalidTime(s.to_string()))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// Whether a job has run on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Not yet run today.
    Idle,
    /// Already run today.
    Done,
}

/// A job that runs at most once per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    time_of_day: TimeOfDay,
    last_run_date: Option<NaiveDate>,
}

impl ScheduledJob {
    /// Create a job that has never run.
    pub fn new(time_of_day: TimeOfDay) -> Self {
        Self {
            time_of_day,
            last_run_date: None,
        }
    }

    /// Create a job resuming from the last day it fired.
    ///
    /// Seeded from the persisted run date so a restart later the same day
    /// does not fire again.
    pub fn resume(time_of_day: TimeOfDay, last_run_date: Option<NaiveDate>) -> Self {
        Self {
            time_of_day,
            last_run_date,
        }
    }

    /// Create a job for a process starting at `now`.
    ///
    /// Like [`resume`](Self::resume), except that a start after today's
    /// trigger time does not catch up: today counts as handled and the
    /// first run is tomorrow.
    pub fn arm(
        time_of_day: TimeOfDay,
        last_run_date: Option<NaiveDate>,
        now: NaiveDateTime,
    ) -> Self {
        let job = Self::resume(time_of_day, last_run_date);
        if job.state_at(now) == JobState::Idle && now.time() >= time_of_day.as_time() {
            return Self::resume(time_of_day, Some(now.date()));
        }
        job
    }

    /// The configured trigger time.
    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
    }

    /// The last day the job fired or was skipped, if any.
    pub fn last_run_date(&self) -> Option<NaiveDate> {
        self.last_run_date
    }

    /// State of the job on the day of `now`.
    pub fn state_at(&self, now: NaiveDateTime) -> JobState {
        match self.last_run_date {
            Some(last) if last >= now.date() => JobState::Done,
            _ => JobState::Idle,
        }
    }

    /// Decide whether the job fires at `now`.
    ///
    /// This is a pure function of `(now, self)`. Returns `true` and a job
    /// marked done for today when the job is idle and the trigger time has
    /// been crossed; otherwise returns `false` and the job unchanged.
    /// `last_run_date` never moves backwards, even if the clock does.
    pub fn poll(self, now: NaiveDateTime) -> (bool, Self) {
        let due = self.state_at(now) == JobState::Idle && now.time() >= self.time_of_day.as_time();
        if !due {
            return (false, self);
        }

        (
            true,
            Self {
                time_of_day: self.time_of_day,
                last_run_date: Some(now.date()),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap()
    }

    fn nine() -> TimeOfDay {
        "09:00".parse().unwrap()
    }

    #[test]
    fn parses_hh_mm() {
        let t: TimeOfDay = "09:30".parse().unwrap();
        assert_eq!(t, TimeOfDay::new(9, 30).unwrap());
        assert_eq!(t.to_string(), "09:30");

        let t: TimeOfDay = " 23:59 ".parse().unwrap();
        assert_eq!(t.to_string(), "23:59");
    }

    #[test]
    fn rejects_bad_times() {
        for bad in ["", "9:00", "24:00", "12:60", "noon", "09:00:00", "0900"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn fires_just_after_trigger() {
        // time_of_day = 09:00, now = 09:00:05, idle => fires once.
        let job = ScheduledJob::new(nine());
        let now = at(2024, 5, 1, 9, 0, 5);
        assert_eq!(job.state_at(now), JobState::Idle);

        let (fire, job) = job.poll(now);
        assert!(fire);
        assert_eq!(job.state_at(now), JobState::Done);
        assert_eq!(job.last_run_date(), Some(now.date()));
    }

    #[test]
    fn does_not_fire_before_trigger() {
        let job = ScheduledJob::new(nine());
        let (fire, job) = job.poll(at(2024, 5, 1, 8, 59, 59));
        assert!(!fire);
        assert_eq!(job.last_run_date(), None);
    }

    #[test]
    fn fires_at_most_once_per_day() {
        let mut job = ScheduledJob::new(nine());
        let mut fired = 0;

        // Poll every 30 seconds from 08:00 to 23:59.
        for minute in (8 * 60)..(24 * 60) {
            for second in [0, 30] {
                let (fire, next) = job.poll(at(2024, 5, 1, minute / 60, minute % 60, second));
                job = next;
                if fire {
                    fired += 1;
                }
            }
        }

        assert_eq!(fired, 1);
    }

    #[test]
    fn midnight_rollover_rearms() {
        let job = ScheduledJob::new(nine());
        let (fire, job) = job.poll(at(2024, 5, 1, 9, 0, 0));
        assert!(fire);

        // Still done later that day.
        let (fire, job) = job.poll(at(2024, 5, 1, 23, 59, 59));
        assert!(!fire);

        // Idle after midnight but not yet due.
        let next_morning = at(2024, 5, 2, 0, 0, 1);
        assert_eq!(job.state_at(next_morning), JobState::Idle);
        let (fire, job) = job.poll(next_morning);
        assert!(!fire);

        let (fire, _) = job.poll(at(2024, 5, 2, 9, 1, 0));
        assert!(fire);
    }

    #[test]
    fn fires_late_when_polled_late() {
        // A long sync step: the trigger was crossed a while ago.
        let job = ScheduledJob::new(nine());
        let (fire, _) = job.poll(at(2024, 5, 1, 14, 30, 0));
        assert!(fire);
    }

    #[test]
    fn resume_after_publish_today_does_not_fire() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let job = ScheduledJob::resume(nine(), Some(today));
        let (fire, _) = job.poll(at(2024, 5, 1, 10, 0, 0));
        assert!(!fire);
    }

    #[test]
    fn resume_after_publish_yesterday_fires() {
        let yesterday = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        let job = ScheduledJob::resume(nine(), Some(yesterday));
        let (fire, job) = job.poll(at(2024, 5, 1, 10, 0, 0));
        assert!(fire);
        assert_eq!(job.last_run_date(), NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn arm_before_trigger_fires_today() {
        let job = ScheduledJob::arm(nine(), None, at(2024, 5, 1, 8, 0, 0));
        assert_eq!(job.last_run_date(), None);

        let (fire, _) = job.poll(at(2024, 5, 1, 9, 0, 5));
        assert!(fire);
    }

    #[test]
    fn arm_after_trigger_waits_for_tomorrow() {
        let yesterday = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        let job = ScheduledJob::arm(nine(), Some(yesterday), at(2024, 5, 1, 17, 0, 0));
        assert_eq!(job.state_at(at(2024, 5, 1, 17, 0, 0)), JobState::Done);

        let (fire, job) = job.poll(at(2024, 5, 1, 23, 0, 0));
        assert!(!fire);
        let (fire, _) = job.poll(at(2024, 5, 2, 9, 0, 1));
        assert!(fire);
    }

    #[test]
    fn arm_keeps_run_recorded_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let job = ScheduledJob::arm(nine(), Some(today), at(2024, 5, 1, 8, 0, 0));
        assert_eq!(job, ScheduledJob::resume(nine(), Some(today)));

        let (fire, _) = job.poll(at(2024, 5, 1, 9, 30, 0));
        assert!(!fire);
    }

    #[test]
    fn clock_going_backwards_does_not_refire() {
        let job = ScheduledJob::new(nine());
        let (fire, job) = job.poll(at(2024, 5, 2, 9, 0, 0));
        assert!(fire);

        // Clock jumps back a day: the job stays done and the date is kept.
        let (fire, job) = job.poll(at(2024, 5, 1, 12, 0, 0));
        assert!(!fire);
        assert_eq!(job.last_run_date(), NaiveDate::from_ymd_opt(2024, 5, 2));
    }
}
