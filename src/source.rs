use async_trait::async_trait;
use scraper::{ElementRef, Selector};

use crate::assemble::{DayWindow, RawListings, Strategy};
use crate::program::RawProgram;
use crate::store::slugify;

pub mod http;
pub mod mitv;
pub mod reportv;
pub mod xmltv;

/// A channel as named in the channel list or discovered in a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: String,
    pub name: Option<String>,
}

impl From<String> for ChannelRef {
    fn from(id: String) -> Self {
        Self { id, name: None }
    }
}

/// Everything one channel's fetches produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelListings {
    /// Display name reported by the upstream, if it reports one.
    pub name: Option<String>,
    pub listings: RawListings,
}

/// An upstream listing provider.
///
/// Fetch failures never surface here: an extractor logs them and hands back an
/// empty list for the affected request.
#[async_trait]
pub trait Source: Send + Sync {
    /// The assembly strategy matching what this source returns.
    fn strategy(&self) -> Strategy;

    /// Resolve the channels to process from the configured channel list.
    async fn channels(&self, requested: Vec<String>) -> Vec<ChannelRef> {
        requested.into_iter().map(ChannelRef::from).collect()
    }

    async fn fetch(&self, channel: &ChannelRef, window: &DayWindow) -> ChannelListings;

    /// File name (without extension) the channel's schedules are written under.
    fn file_stem(&self, channel: &ChannelRef) -> String {
        slugify(&channel.id)
    }
}

/// Result of extracting one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub channel_name: Option<String>,
    pub programs: Vec<RawProgram>,
}

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector should parse")
}

/// Whitespace-normalized text of the first match, or an empty string.
pub(crate) fn text_of(element: ElementRef<'_>, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|found| {
            found
                .text()
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

pub(crate) fn attr_of(element: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|found| found.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}
