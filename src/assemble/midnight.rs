use crate::assemble::RelativeDays;
use crate::program::RawProgram;

/// Split a page-ordered list at its first midnight crossing.
///
/// A crossing is declared at the first entry whose hour is lower than the hour
/// of the entry before it. Everything from there on belongs to the next
/// calendar day. Lists without a crossing come back whole as the first half.
pub fn split_at_midnight(mut programs: Vec<RawProgram>) -> (Vec<RawProgram>, Vec<RawProgram>) {
    let split_index = programs
        .windows(2)
        .position(|pair| pair[1].start_time.hour() < pair[0].start_time.hour())
        .map(|i| i + 1)
        .unwrap_or(programs.len());

    let post_midnight = programs.split_off(split_index);
    (programs, post_midnight)
}

/// Rebuild the two calendar days from relative-day fetches.
///
/// Today is yesterday's post-midnight tail followed by today's pre-midnight
/// part; tomorrow is built the same way one day later.
pub fn stitch(days: RelativeDays<Vec<RawProgram>>) -> (Vec<RawProgram>, Vec<RawProgram>) {
    let RelativeDays {
        yesterday,
        today,
        tomorrow,
    } = days.map(|programs| {
        programs
            .into_iter()
            .filter(RawProgram::is_valid)
            .collect::<Vec<_>>()
    });

    let (_, yesterday_late) = split_at_midnight(yesterday);
    let (today_day, today_late) = split_at_midnight(today);
    let (tomorrow_day, _) = split_at_midnight(tomorrow);

    let full_today = yesterday_late.into_iter().chain(today_day).collect();
    let full_tomorrow = today_late.into_iter().chain(tomorrow_day).collect();

    (full_today, full_tomorrow)
}
