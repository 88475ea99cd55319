//! reportv.com.ar channel finder.
//!
//! The finder answers a form POST for one channel, broadcast date and hour with
//! the programs airing from that hour on, never a full day. Each broadcast day
//! is therefore polled at fixed slots and merged with
//! [`Strategy::SlotPolling`].

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use futures::future::join_all;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use crate::assemble::{DayWindow, RawListings, RelativeDays, Strategy};
use crate::program::{RawProgram, WallTime};
use crate::source::http::HttpClient;
use crate::source::{attr_of, selector, text_of, ChannelListings, ChannelRef, ParsedPage, Source};

pub const DEFAULT_URL: &str = "https://www.reportv.com.ar/finder/channel";
pub const DEFAULT_LINEUP: &str = "3129";

const MINUTES_PER_DAY: u32 = 24 * 60;

static ITEM: LazyLock<Selector> = LazyLock::new(|| selector("div.item-program"));
static CHANNEL_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector("p.aContinuacionNombreSenial"));
static LOGO: LazyLock<Selector> = LazyLock::new(|| selector("img.evento_imagen"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("p.evento_titulo"));
static GENRE: LazyLock<Selector> = LazyLock::new(|| selector("p.evento_genero"));
static DATE_TIME: LazyLock<Selector> = LazyLock::new(|| selector("p.fechaHora"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportvEndpoint {
    pub url: String,
    pub lineup: String,
}

impl Default for ReportvEndpoint {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            lineup: DEFAULT_LINEUP.to_string(),
        }
    }
}

/// A poll time within a broadcast day. Slots past midnight fall on the
/// calendar day after the broadcast day and are requested under that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSlot {
    pub time: WallTime,
    pub days_after: u32,
}

impl PollSlot {
    /// The `fecha` to request this slot under for broadcast day `date`.
    pub fn request_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        date.checked_add_days(Days::new(u64::from(self.days_after)))
    }
}

pub struct ReportvSource {
    http: HttpClient,
    endpoint: ReportvEndpoint,
    day_start: WallTime,
    slots: Vec<PollSlot>,
}

impl ReportvSource {
    pub fn new(
        http: HttpClient,
        endpoint: ReportvEndpoint,
        day_start: WallTime,
        poll_interval_hours: u32,
    ) -> Self {
        Self {
            http,
            endpoint,
            day_start,
            slots: poll_slots(day_start, poll_interval_hours),
        }
    }

    /// All polls for one broadcast day, in slot order.
    async fn poll_day(&self, channel: &ChannelRef, date: Option<NaiveDate>) -> Vec<ParsedPage> {
        let Some(date) = date else {
            return Vec::new();
        };

        join_all(self.slots.iter().map(|slot| self.poll(channel, date, *slot))).await
    }

    async fn poll(&self, channel: &ChannelRef, date: NaiveDate, slot: PollSlot) -> ParsedPage {
        let Some(date) = slot.request_date(date) else {
            return ParsedPage::default();
        };
        let date = date.format("%Y-%m-%d").to_string();
        let hour = slot.time.to_string();
        let form = [
            ("idAlineacion", self.endpoint.lineup.as_str()),
            ("idSenial", channel.id.as_str()),
            ("fecha", date.as_str()),
            ("hora", hour.as_str()),
        ];

        match self.http.post_form_text(&self.endpoint.url, &form).await {
            Ok(html) => parse_page(&html),
            Err(e) => {
                warn!(error = %e, %date, %hour, "poll failed, treating it as empty");
                ParsedPage::default()
            }
        }
    }
}

#[async_trait]
impl Source for ReportvSource {
    fn strategy(&self) -> Strategy {
        Strategy::SlotPolling {
            day_start: self.day_start,
        }
    }

    #[instrument(skip_all, fields(channel = %channel.id))]
    async fn fetch(&self, channel: &ChannelRef, window: &DayWindow) -> ChannelListings {
        let (yesterday, today, tomorrow) = tokio::join!(
            self.poll_day(channel, window.today.pred_opt()),
            self.poll_day(channel, Some(window.today)),
            self.poll_day(channel, Some(window.tomorrow())),
        );

        let name = today
            .iter()
            .chain(&yesterday)
            .chain(&tomorrow)
            .find_map(|page| page.channel_name.clone());

        let programs = |pages: Vec<ParsedPage>| -> Vec<Vec<RawProgram>> {
            pages.into_iter().map(|page| page.programs).collect()
        };

        ChannelListings {
            name,
            listings: RawListings::Polled(RelativeDays {
                yesterday: programs(yesterday),
                today: programs(today),
                tomorrow: programs(tomorrow),
            }),
        }
    }
}

/// Poll times for one broadcast day: `day_start`, then every `interval_hours`
/// until the day wraps around.
pub fn poll_slots(day_start: WallTime, interval_hours: u32) -> Vec<PollSlot> {
    let step = interval_hours.clamp(1, 24) * 60;
    let start = u32::from(day_start.hour()) * 60 + u32::from(day_start.minute());

    (0..MINUTES_PER_DAY)
        .step_by(step as usize)
        .filter_map(|offset| {
            let minutes = start + offset;
            let time = minutes % MINUTES_PER_DAY;
            Some(PollSlot {
                time: WallTime::new(time / 60, time % 60)?,
                days_after: minutes / MINUTES_PER_DAY,
            })
        })
        .collect()
}

/// Extract the channel name and programs, in page order.
pub fn parse_page(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    let mut channel_name = None;
    let mut programs = Vec::new();
    for item in document.select(&ITEM) {
        if channel_name.is_none() {
            channel_name = attr_of(item, &CHANNEL_NAME, "title");
        }

        let show_name = text_of(item, &TITLE);
        if show_name.is_empty() {
            continue;
        }

        // "22/01 03:02hs." -> 03:02
        let date_time = text_of(item, &DATE_TIME);
        let raw_time = date_time
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .trim_end_matches("hs.")
            .trim();
        let start_time: WallTime = match raw_time.parse() {
            Ok(time) => time,
            Err(e) => {
                debug!(error = %e, show = %show_name, "skipping program");
                continue;
            }
        };

        programs.push(
            RawProgram::new(start_time, show_name)
                .with_logo(attr_of(item, &LOGO, "src").unwrap_or_default())
                .with_category(text_of(item, &GENRE)),
        );
    }

    ParsedPage {
        channel_name,
        programs,
    }
}
