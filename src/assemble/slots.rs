use std::collections::BTreeMap;

use crate::assemble::RelativeDays;
use crate::program::{RawProgram, WallTime};

/// A closed wall-clock window, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: WallTime,
    pub end: WallTime,
}

impl TimeWindow {
    pub fn new(start: WallTime, end: WallTime) -> Self {
        Self { start, end }
    }

    /// `[00:00, day_start)`; `None` when the broadcast day starts at midnight.
    pub fn late_night(day_start: WallTime) -> Option<Self> {
        day_start
            .previous_minute()
            .map(|end| Self::new(WallTime::MIDNIGHT, end))
    }

    /// `[day_start, 23:59]`.
    pub fn day_proper(day_start: WallTime) -> Self {
        Self::new(day_start, WallTime::END_OF_DAY)
    }

    pub fn contains(&self, time: WallTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Merge repeated point-in-time polls into one list ordered by start time.
/// When several polls report the same start time, the later poll wins.
pub fn merge_polls(polls: Vec<Vec<RawProgram>>) -> Vec<RawProgram> {
    let mut by_start = BTreeMap::new();
    for program in polls.into_iter().flatten().filter(RawProgram::is_valid) {
        by_start.insert(program.start_time, program);
    }

    by_start.into_values().collect()
}

pub fn filter_window(programs: Vec<RawProgram>, window: Option<TimeWindow>) -> Vec<RawProgram> {
    match window {
        Some(window) => programs
            .into_iter()
            .filter(|program| window.contains(program.start_time))
            .collect(),
        None => Vec::new(),
    }
}

/// Rebuild the two calendar days from polled broadcast days.
///
/// A broadcast day starting at `day_start` runs past midnight, so its late-night
/// entries belong to the following calendar day.
pub fn stitch(
    days: RelativeDays<Vec<Vec<RawProgram>>>,
    day_start: WallTime,
) -> (Vec<RawProgram>, Vec<RawProgram>) {
    let late_night = TimeWindow::late_night(day_start);
    let day_proper = Some(TimeWindow::day_proper(day_start));

    let RelativeDays {
        yesterday,
        today,
        tomorrow,
    } = days.map(merge_polls);

    let full_today = filter_window(yesterday, late_night)
        .into_iter()
        .chain(filter_window(today.clone(), day_proper))
        .collect();
    let full_tomorrow = filter_window(today, late_night)
        .into_iter()
        .chain(filter_window(tomorrow, day_proper))
        .collect();

    (full_today, full_tomorrow)
}
