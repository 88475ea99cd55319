use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InvalidWallTime;

/// A wall-clock time of day with minute resolution, local to the target timezone.
///
/// Ordering is chronological within a single day, which is also the lexicographic
/// order of the zero-padded `HH:MM` rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime {
    hour: u8,
    minute: u8,
}

impl WallTime {
    pub const MIDNIGHT: WallTime = WallTime { hour: 0, minute: 0 };
    pub const END_OF_DAY: WallTime = WallTime {
        hour: 23,
        minute: 59,
    };

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }

        Some(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// The minute right before this one, or `None` at midnight.
    pub fn previous_minute(&self) -> Option<Self> {
        match (self.hour, self.minute) {
            (0, 0) => None,
            (hour, 0) => Some(Self {
                hour: hour - 1,
                minute: 59,
            }),
            (hour, minute) => Some(Self {
                hour,
                minute: minute - 1,
            }),
        }
    }
}

impl From<NaiveTime> for WallTime {
    fn from(value: NaiveTime) -> Self {
        Self {
            hour: value.hour() as u8,
            minute: value.minute() as u8,
        }
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallTime {
    type Err = InvalidWallTime;

    /// Accepts `H:MM` and `HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidWallTime(s.to_string());

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(hour) || hour.len() > 2 || !all_digits(minute) || minute.len() != 2 {
            return Err(invalid());
        }

        let hour = hour.parse().map_err(|_| invalid())?;
        let minute = minute.parse().map_err(|_| invalid())?;
        WallTime::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for WallTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WallTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One broadcast entry as extracted from a single page fetch, before any date is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProgram {
    pub start_time: WallTime,
    pub show_name: String,
    pub show_logo: String,
    pub category: String,
    pub description: String,
}

impl RawProgram {
    pub fn new(start_time: WallTime, show_name: impl Into<String>) -> Self {
        Self {
            start_time,
            show_name: show_name.into(),
            show_logo: String::new(),
            category: String::new(),
            description: String::new(),
        }
    }

    pub fn with_logo(mut self, show_logo: impl Into<String>) -> Self {
        self.show_logo = show_logo.into();

        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();

        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();

        self
    }

    /// Entries without a show name carry no usable information.
    pub fn is_valid(&self) -> bool {
        !self.show_name.trim().is_empty()
    }
}

/// An entry from a feed that already knows its absolute start and stop instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsoluteProgram {
    pub start: DateTime<FixedOffset>,
    pub stop: DateTime<FixedOffset>,
    pub show_name: String,
    pub show_logo: String,
    pub category: String,
    pub description: String,
}

/// A program placed on a calendar day. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedProgram {
    pub show_name: String,
    pub show_logo: String,
    pub show_category: String,
    pub start_time: WallTime,
    #[serde(with = "optional_wall_time")]
    pub end_time: Option<WallTime>,
    pub episode_description: String,
}

impl From<RawProgram> for DatedProgram {
    fn from(value: RawProgram) -> Self {
        Self {
            show_name: value.show_name,
            show_logo: value.show_logo,
            show_category: value.category,
            start_time: value.start_time,
            end_time: None,
            episode_description: value.description,
        }
    }
}

/// The output unit: one channel's schedule for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSchedule {
    pub channel: String,
    #[serde(with = "display_date")]
    pub date: NaiveDate,
    pub schedule: Vec<DatedProgram>,
}

impl ChannelSchedule {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

// Missing end times are written as an empty string.
mod optional_wall_time {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::WallTime;

    pub fn serialize<S: Serializer>(
        value: &Option<WallTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.collect_str(time),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<WallTime>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(None);
        }

        raw.parse().map(Some).map_err(de::Error::custom)
    }
}

mod display_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%d/%m/%Y";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use crate::program::{ChannelSchedule, DatedProgram, RawProgram, WallTime};

    #[test]
    pub fn test_wall_time_parse() {
        assert_eq!("05:30".parse::<WallTime>().unwrap(), WallTime::new(5, 30).unwrap());
        assert_eq!(" 9:05 ".parse::<WallTime>().unwrap(), WallTime::new(9, 5).unwrap());
        assert_eq!("23:59".parse::<WallTime>().unwrap(), WallTime::END_OF_DAY);

        for bad in ["", "24:00", "12:60", "12:5", "ab:cd", "1200", "123:00", "-1:00"] {
            assert!(bad.parse::<WallTime>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    pub fn test_wall_time_order_matches_text() {
        let mut times: Vec<WallTime> = ["23:00", "00:30", "09:05", "10:00", "00:15"]
            .iter()
            .map(|t| t.parse().unwrap())
            .collect();
        times.sort();

        let rendered: Vec<String> = times.iter().map(|t| t.to_string()).collect();
        let mut lexicographic = rendered.clone();
        lexicographic.sort();

        assert_eq!(rendered, lexicographic);
        assert_eq!(rendered[0], "00:15");
    }

    #[test]
    pub fn test_previous_minute() {
        assert_eq!(WallTime::MIDNIGHT.previous_minute(), None);
        assert_eq!(
            WallTime::new(5, 30).unwrap().previous_minute(),
            WallTime::new(5, 29)
        );
        assert_eq!(
            WallTime::new(6, 0).unwrap().previous_minute(),
            WallTime::new(5, 59)
        );
    }

    #[test]
    pub fn test_raw_program_validity() {
        let time = WallTime::new(6, 0).unwrap();
        assert!(RawProgram::new(time, "Noticias").is_valid());
        assert!(!RawProgram::new(time, "").is_valid());
        assert!(!RawProgram::new(time, "   ").is_valid());
    }

    #[test]
    pub fn test_schedule_wire_shape() {
        let schedule = ChannelSchedule {
            channel: "Canal Ñ".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 22).unwrap(),
            schedule: vec![
                DatedProgram {
                    end_time: WallTime::new(6, 0),
                    ..DatedProgram::from(
                        RawProgram::new(WallTime::new(0, 15).unwrap(), "X")
                            .with_logo("http://img/x.jpg")
                            .with_category("Serie")
                            .with_description("Episodio 1"),
                    )
                },
                RawProgram::new(WallTime::new(6, 0).unwrap(), "Y").into(),
            ],
        };

        let json = String::from_utf8(schedule.to_json().unwrap()).unwrap();
        let expected = r#"{
  "channel": "Canal Ñ",
  "date": "22/01/2024",
  "schedule": [
    {
      "show_name": "X",
      "show_logo": "http://img/x.jpg",
      "show_category": "Serie",
      "start_time": "00:15",
      "end_time": "06:00",
      "episode_description": "Episodio 1"
    },
    {
      "show_name": "Y",
      "show_logo": "",
      "show_category": "",
      "start_time": "06:00",
      "end_time": "",
      "episode_description": ""
    }
  ]
}"#;
        assert_eq!(json, expected);

        let decoded: ChannelSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, schedule);
    }
}
