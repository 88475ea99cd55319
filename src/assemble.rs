use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::end_time::{synthesize, EndTimePolicy};
use crate::error::AssembleError;
use crate::program::{AbsoluteProgram, ChannelSchedule, DatedProgram, RawProgram, WallTime};

pub mod midnight;
pub mod overlap;
pub mod slots;

/// How a source's raw listings are turned into calendar days. Picked per source
/// according to what its upstream can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Relative-day pages that run past midnight: split each at its hour
    /// rollover and stitch neighbours together.
    MidnightSplit,
    /// Feeds with absolute start and stop instants: keep whatever overlaps
    /// each calendar day.
    IntervalOverlap,
    /// Point-in-time polls of broadcast days starting at `day_start`: merge by
    /// start time, then split by wall-clock window.
    SlotPolling { day_start: WallTime },
}

/// One value per relative fetch day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelativeDays<T> {
    pub yesterday: T,
    pub today: T,
    pub tomorrow: T,
}

impl<T> RelativeDays<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> RelativeDays<U> {
        RelativeDays {
            yesterday: f(self.yesterday),
            today: f(self.today),
            tomorrow: f(self.tomorrow),
        }
    }
}

/// Everything an extractor produced for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawListings {
    Relative(RelativeDays<Vec<RawProgram>>),
    Polled(RelativeDays<Vec<Vec<RawProgram>>>),
    Absolute(Vec<AbsoluteProgram>),
}

impl RawListings {
    fn kind(&self) -> &'static str {
        match self {
            RawListings::Relative(_) => "relative-day",
            RawListings::Polled(_) => "polled",
            RawListings::Absolute(_) => "absolute-time",
        }
    }
}

/// The two calendar days being produced, in the target timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub today: NaiveDate,
    pub timezone: Tz,
}

impl DayWindow {
    pub fn new(today: NaiveDate, timezone: Tz) -> Self {
        Self { today, timezone }
    }

    pub fn current(timezone: Tz) -> Self {
        Self::new(Utc::now().with_timezone(&timezone).date_naive(), timezone)
    }

    pub fn tomorrow(&self) -> NaiveDate {
        self.today.succ_opt().unwrap_or(self.today)
    }

    pub fn date(&self, day: Day) -> NaiveDate {
        match day {
            Day::Today => self.today,
            Day::Tomorrow => self.tomorrow(),
        }
    }

    /// First instant of `date`. When midnight falls into a DST gap the day
    /// starts at the first valid local time after it.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Tz> {
        let midnight = date.and_time(NaiveTime::MIN);
        self.timezone
            .from_local_datetime(&midnight)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(midnight + TimeDelta::hours(1)))
                    .earliest()
            })
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&midnight))
    }

    /// Last instant of `date`.
    pub fn end_of(&self, date: NaiveDate) -> DateTime<Tz> {
        let next = date.succ_opt().unwrap_or(date);
        self.start_of(next) - TimeDelta::nanoseconds(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Day {
    Today,
    Tomorrow,
}

impl Day {
    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Today => "today",
            Day::Tomorrow => "tomorrow",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assembly settings handed down from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyConfig {
    pub strategy: Strategy,
    pub end_policy: EndTimePolicy,
}

/// A calendar day's programs: sorted by start time, one entry per start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayListing {
    pub date: NaiveDate,
    pub programs: Vec<DatedProgram>,
}

impl DayListing {
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn first_start(&self) -> Option<WallTime> {
        self.programs.first().map(|program| program.start_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDays {
    pub today: DayListing,
    pub tomorrow: DayListing,
}

/// Reconcile one channel's raw listings into today and tomorrow.
///
/// End times are left as the source gave them; see [`build_schedules`] for
/// the full pipeline.
pub fn assemble(
    listings: RawListings,
    strategy: Strategy,
    window: &DayWindow,
) -> Result<AssembledDays, AssembleError> {
    let (today, tomorrow) = match (strategy, listings) {
        (Strategy::MidnightSplit, RawListings::Relative(days)) => {
            let (today, tomorrow) = midnight::stitch(days);
            (into_day(today), into_day(tomorrow))
        }
        (Strategy::SlotPolling { day_start }, RawListings::Polled(polls)) => {
            let (today, tomorrow) = slots::stitch(polls, day_start);
            (into_day(today), into_day(tomorrow))
        }
        (Strategy::IntervalOverlap, RawListings::Absolute(programs)) => (
            overlap::programs_on(&programs, window, window.today),
            overlap::programs_on(&programs, window, window.tomorrow()),
        ),
        (strategy, listings) => {
            return Err(AssembleError::StrategyMismatch {
                strategy,
                listings: listings.kind(),
            })
        }
    };

    debug!(
        today = today.len(),
        tomorrow = tomorrow.len(),
        "assembled calendar days"
    );

    Ok(AssembledDays {
        today: DayListing {
            date: window.today,
            programs: today,
        },
        tomorrow: DayListing {
            date: window.tomorrow(),
            programs: tomorrow,
        },
    })
}

/// Assemble, chain end times and wrap each non-empty day as a schedule.
///
/// Today's last program ends where tomorrow's first begins. Tomorrow has no
/// successor, so its last program falls back to `end_policy`. Days without
/// programs are left out.
pub fn build_schedules(
    channel: &str,
    listings: RawListings,
    config: &AssemblyConfig,
    window: &DayWindow,
) -> Result<Vec<(Day, ChannelSchedule)>, AssembleError> {
    let AssembledDays {
        mut today,
        mut tomorrow,
    } = assemble(listings, config.strategy, window)?;

    synthesize(&mut today.programs, tomorrow.first_start(), config.end_policy);
    synthesize(&mut tomorrow.programs, None, config.end_policy);

    let schedules = [(Day::Today, today), (Day::Tomorrow, tomorrow)]
        .into_iter()
        .filter(|(_, listing)| !listing.is_empty())
        .map(|(day, listing)| {
            (
                day,
                ChannelSchedule {
                    channel: channel.to_string(),
                    date: listing.date,
                    schedule: listing.programs,
                },
            )
        })
        .collect();

    Ok(schedules)
}

fn into_day(programs: Vec<RawProgram>) -> Vec<DatedProgram> {
    dedup_by_start(
        programs
            .into_iter()
            .filter(RawProgram::is_valid)
            .map(DatedProgram::from),
    )
}

/// Order by start time, keeping the last entry seen for each start time.
pub(crate) fn dedup_by_start(programs: impl IntoIterator<Item = DatedProgram>) -> Vec<DatedProgram> {
    let mut by_start = BTreeMap::new();
    for program in programs {
        by_start.insert(program.start_time, program);
    }

    by_start.into_values().collect()
}
