use std::str::FromStr;

use crate::error::ConfigError;
use crate::program::{DatedProgram, WallTime};

/// What to write as the end of a day's last program when the next day's first
/// program is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndTimePolicy {
    /// Leave the end time blank.
    #[default]
    Empty,
    /// Close the day at a fixed time, usually `23:59`.
    Sentinel(WallTime),
}

impl EndTimePolicy {
    pub fn fallback(&self) -> Option<WallTime> {
        match self {
            EndTimePolicy::Empty => None,
            EndTimePolicy::Sentinel(time) => Some(*time),
        }
    }
}

impl FromStr for EndTimePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("empty") {
            return Ok(EndTimePolicy::Empty);
        }

        s.parse()
            .map(EndTimePolicy::Sentinel)
            .map_err(|_| ConfigError::FallbackEnd(s.to_string()))
    }
}

/// Chain end times through a sorted, deduplicated day.
///
/// Every program ends where the next one starts. The last one ends at
/// `next_day_first` when known, otherwise keeps an end time the source already
/// supplied, otherwise takes the policy fallback.
pub fn synthesize(
    programs: &mut [DatedProgram],
    next_day_first: Option<WallTime>,
    policy: EndTimePolicy,
) {
    for i in 1..programs.len() {
        let next_start = programs[i].start_time;
        programs[i - 1].end_time = Some(next_start);
    }

    if let Some(last) = programs.last_mut() {
        last.end_time = next_day_first
            .or(last.end_time)
            .or_else(|| policy.fallback());
    }
}

#[cfg(test)]
mod test {
    use crate::end_time::{synthesize, EndTimePolicy};
    use crate::program::{DatedProgram, RawProgram, WallTime};

    fn t(s: &str) -> WallTime {
        s.parse().unwrap()
    }

    fn day(entries: &[(&str, &str)]) -> Vec<DatedProgram> {
        entries
            .iter()
            .map(|(start, name)| RawProgram::new(t(start), *name).into())
            .collect()
    }

    fn ends(programs: &[DatedProgram]) -> Vec<Option<WallTime>> {
        programs.iter().map(|p| p.end_time).collect()
    }

    #[test]
    pub fn test_chains_to_next_start() {
        let mut programs = day(&[("00:15", "X"), ("06:00", "Y"), ("20:00", "Z")]);
        synthesize(&mut programs, Some(t("00:30")), EndTimePolicy::Empty);

        assert_eq!(
            ends(&programs),
            vec![Some(t("06:00")), Some(t("20:00")), Some(t("00:30"))]
        );
    }

    #[test]
    pub fn test_empty_fallback() {
        let mut programs = day(&[("06:00", "Y"), ("20:00", "Z")]);
        synthesize(&mut programs, None, EndTimePolicy::Empty);

        assert_eq!(ends(&programs), vec![Some(t("20:00")), None]);
    }

    #[test]
    pub fn test_sentinel_fallback() {
        let mut programs = day(&[("06:00", "Y"), ("20:00", "Z")]);
        synthesize(
            &mut programs,
            None,
            EndTimePolicy::Sentinel(WallTime::END_OF_DAY),
        );

        assert_eq!(ends(&programs), vec![Some(t("20:00")), Some(t("23:59"))]);
    }

    #[test]
    pub fn test_single_program_day() {
        let mut anchored = day(&[("12:00", "Solo")]);
        synthesize(&mut anchored, Some(t("00:00")), EndTimePolicy::Empty);
        assert_eq!(ends(&anchored), vec![Some(t("00:00"))]);

        let mut sentinel = day(&[("12:00", "Solo")]);
        synthesize(
            &mut sentinel,
            None,
            EndTimePolicy::Sentinel(WallTime::END_OF_DAY),
        );
        assert_eq!(ends(&sentinel), vec![Some(t("23:59"))]);

        let mut empty = day(&[("12:00", "Solo")]);
        synthesize(&mut empty, None, EndTimePolicy::Empty);
        assert_eq!(ends(&empty), vec![None]);
    }

    #[test]
    pub fn test_known_end_beats_fallback_but_not_anchor() {
        let mut programs = day(&[("22:00", "A"), ("23:00", "B")]);
        programs[0].end_time = Some(t("22:45"));
        programs[1].end_time = Some(t("00:30"));

        let mut anchored = programs.clone();
        synthesize(&mut anchored, Some(t("00:00")), EndTimePolicy::Empty);
        assert_eq!(ends(&anchored), vec![Some(t("23:00")), Some(t("00:00"))]);

        synthesize(
            &mut programs,
            None,
            EndTimePolicy::Sentinel(WallTime::END_OF_DAY),
        );
        assert_eq!(ends(&programs), vec![Some(t("23:00")), Some(t("00:30"))]);
    }

    #[test]
    pub fn test_empty_day_is_untouched() {
        let mut programs: Vec<DatedProgram> = Vec::new();
        synthesize(&mut programs, Some(t("00:00")), EndTimePolicy::Empty);
        assert!(programs.is_empty());
    }

    #[test]
    pub fn test_policy_parse() {
        assert_eq!("empty".parse::<EndTimePolicy>().unwrap(), EndTimePolicy::Empty);
        assert_eq!("".parse::<EndTimePolicy>().unwrap(), EndTimePolicy::Empty);
        assert_eq!(
            "23:59".parse::<EndTimePolicy>().unwrap(),
            EndTimePolicy::Sentinel(WallTime::END_OF_DAY)
        );
        assert!("midnight".parse::<EndTimePolicy>().is_err());
    }
}
