use chrono::NaiveDate;

use crate::assemble::{dedup_by_start, DayWindow};
use crate::program::{AbsoluteProgram, DatedProgram, WallTime};

/// Programs overlapping `date` in the window's timezone.
///
/// A program belongs to the day when it starts no later than the day's last
/// instant and ends no earlier than its first. Programs that started the day
/// before are shown from `00:00`. The feed's stop time is kept as the end.
pub fn programs_on(
    programs: &[AbsoluteProgram],
    window: &DayWindow,
    date: NaiveDate,
) -> Vec<DatedProgram> {
    let timezone = window.timezone;
    let day_start = window.start_of(date);
    let day_end = window.end_of(date);

    let mut sorted: Vec<&AbsoluteProgram> = programs
        .iter()
        .filter(|program| !program.show_name.trim().is_empty())
        .collect();
    sorted.sort_by_key(|program| program.start);

    let on_day = sorted.into_iter().filter_map(|program| {
        let start = program.start.with_timezone(&timezone);
        let stop = program.stop.with_timezone(&timezone);
        if start > day_end || stop < day_start {
            return None;
        }

        let display_start = if start < day_start { day_start } else { start };
        Some(DatedProgram {
            show_name: program.show_name.clone(),
            show_logo: program.show_logo.clone(),
            show_category: program.category.clone(),
            start_time: WallTime::from(display_start.time()),
            end_time: Some(WallTime::from(stop.time())),
            episode_description: program.description.clone(),
        })
    });

    dedup_by_start(on_day)
}
