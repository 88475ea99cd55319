use async_trait::async_trait;

use crate::assemble::Day;
use crate::error::StoreError;
use crate::program::ChannelSchedule;

pub mod object;

/// Destination for finished schedules.
///
/// Each (day, channel) pair has its own key, so concurrent saves for different
/// channels never touch the same object.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Write `schedule` under `day/file_stem.json`, replacing any previous
    /// version. Returns the location written.
    async fn save(
        &self,
        day: Day,
        file_stem: &str,
        schedule: &ChannelSchedule,
    ) -> Result<String, StoreError>;
}

/// Collapse every run of characters outside `[A-Za-z0-9]` into a single `-`.
/// Keys with nothing left to keep are used as they are.
pub fn slugify(key: &str) -> String {
    let mut slug = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    match slug.trim_matches('-') {
        "" => key.to_string(),
        slug => slug.to_string(),
    }
}
