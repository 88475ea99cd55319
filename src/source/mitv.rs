//! mi.tv channel pages.
//!
//! The site serves one page per channel and relative day ("ayer", today,
//! "manana"). A page covers the station's broadcast day, which usually runs past
//! midnight, so pages are assembled with [`Strategy::MidnightSplit`].

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use crate::assemble::{DayWindow, RawListings, RelativeDays, Strategy};
use crate::program::{RawProgram, WallTime};
use crate::source::http::HttpClient;
use crate::source::{attr_of, selector, text_of, ChannelListings, ChannelRef, ParsedPage, Source};

pub const DEFAULT_YESTERDAY_URL: &str = "https://mi.tv/mx/async/channel/{slug}/ayer/-360";
pub const DEFAULT_TODAY_URL: &str = "https://mi.tv/mx/async/channel/{slug}/-360";
pub const DEFAULT_TOMORROW_URL: &str = "https://mi.tv/mx/async/channel/{slug}/manana/-360";

static CHANNEL_LOGO: LazyLock<Selector> = LazyLock::new(|| selector("div.channel-info img"));
static BROADCASTS: LazyLock<Selector> = LazyLock::new(|| selector("ul.broadcasts"));
static ITEM: LazyLock<Selector> = LazyLock::new(|| selector("li"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h2"));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector("span.time"));
static SUB_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("span.sub-title"));
static SYNOPSIS: LazyLock<Selector> = LazyLock::new(|| selector("p.synopsis"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("div.image"));
static BACKGROUND_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?(.*?)['"]?\s*\)"#).expect("static regex should compile")
});

/// URL templates, each with a `{slug}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MitvUrls {
    pub yesterday: String,
    pub today: String,
    pub tomorrow: String,
}

impl Default for MitvUrls {
    fn default() -> Self {
        Self {
            yesterday: DEFAULT_YESTERDAY_URL.to_string(),
            today: DEFAULT_TODAY_URL.to_string(),
            tomorrow: DEFAULT_TOMORROW_URL.to_string(),
        }
    }
}

impl MitvUrls {
    pub fn for_channel(&self, slug: &str) -> RelativeDays<String> {
        RelativeDays {
            yesterday: self.yesterday.replace("{slug}", slug),
            today: self.today.replace("{slug}", slug),
            tomorrow: self.tomorrow.replace("{slug}", slug),
        }
    }
}

pub struct MitvSource {
    http: HttpClient,
    urls: MitvUrls,
}

impl MitvSource {
    pub fn new(http: HttpClient, urls: MitvUrls) -> Self {
        Self { http, urls }
    }

    async fn page(&self, url: &str) -> ParsedPage {
        match self.http.get_text(url).await {
            Ok(html) => parse_page(&html),
            Err(e) => {
                warn!(error = %e, "page fetch failed, treating it as empty");
                ParsedPage::default()
            }
        }
    }
}

#[async_trait]
impl Source for MitvSource {
    fn strategy(&self) -> Strategy {
        Strategy::MidnightSplit
    }

    #[instrument(skip_all, fields(channel = %channel.id))]
    async fn fetch(&self, channel: &ChannelRef, _window: &DayWindow) -> ChannelListings {
        let urls = self.urls.for_channel(&channel.id);
        let (yesterday, today, tomorrow) = tokio::join!(
            self.page(&urls.yesterday),
            self.page(&urls.today),
            self.page(&urls.tomorrow),
        );

        ChannelListings {
            // Only the "today" page is trusted for the display name.
            name: today.channel_name,
            listings: RawListings::Relative(RelativeDays {
                yesterday: yesterday.programs,
                today: today.programs,
                tomorrow: tomorrow.programs,
            }),
        }
    }
}

/// Extract the channel name and broadcasts, in page order.
pub fn parse_page(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let channel_name = attr_of(root, &CHANNEL_LOGO, "title");

    let Some(broadcasts) = document.select(&BROADCASTS).next() else {
        return ParsedPage {
            channel_name,
            programs: Vec::new(),
        };
    };

    let mut programs = Vec::new();
    for item in broadcasts.select(&ITEM) {
        let show_name = text_of(item, &TITLE);
        let raw_time = text_of(item, &TIME);
        if show_name.is_empty() || raw_time.is_empty() {
            continue;
        }

        let start_time: WallTime = match raw_time.parse() {
            Ok(time) => time,
            Err(e) => {
                debug!(error = %e, show = %show_name, "skipping broadcast");
                continue;
            }
        };

        let logo = item
            .select(&IMAGE)
            .find_map(|image| image.value().attr("style"))
            .and_then(background_url)
            .unwrap_or_default();

        programs.push(
            RawProgram::new(start_time, show_name)
                .with_logo(logo)
                .with_category(text_of(item, &SUB_TITLE))
                .with_description(text_of(item, &SYNOPSIS)),
        );
    }

    ParsedPage {
        channel_name,
        programs,
    }
}

fn background_url(style: &str) -> Option<String> {
    BACKGROUND_URL
        .captures(style)
        .and_then(|captures| captures.get(1))
        .map(|url| url.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
}
