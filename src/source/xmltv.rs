//! XMLTV guide feeds.
//!
//! A feed covers many channels with absolute start and stop instants. Each
//! configured feed is downloaded once per run and shared by all channels.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use flate2::read::GzDecoder;
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::assemble::{DayWindow, RawListings, Strategy};
use crate::error::FetchError;
use crate::program::AbsoluteProgram;
use crate::source::http::HttpClient;
use crate::source::{ChannelListings, ChannelRef, Source};
use crate::store::slugify;

pub const DEFAULT_FEED: &str = "https://epgshare01.online/epgshare01/epg_ripper_MX1.xml.gz";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

static CANAL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^canal\s+").expect("static regex should compile"));

/// Channels and their programmes, keyed by XMLTV channel id. Display names
/// are cleaned and may be shared by several ids, e.g. regional feeds of one
/// network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guide {
    pub channels: BTreeMap<String, String>,
    pub programs: HashMap<String, Vec<AbsoluteProgram>>,
}

impl Guide {
    pub fn merge(&mut self, other: Guide) {
        self.channels.extend(other.channels);
        for (channel, programs) in other.programs {
            self.programs.entry(channel).or_default().extend(programs);
        }
    }

    /// Ids with programmes, grouped under their display name.
    pub fn names(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut names: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (id, name) in &self.channels {
            if self.programs.contains_key(id) {
                names.entry(name.as_str()).or_default().push(id.as_str());
            }
        }

        names
    }

    /// Programmes of every id shown as `name`.
    pub fn programs_named(&self, name: &str) -> Vec<AbsoluteProgram> {
        self.channels
            .iter()
            .filter(|(_, shown)| shown.as_str() == name)
            .filter_map(|(id, _)| self.programs.get(id))
            .flatten()
            .cloned()
            .collect()
    }
}

pub struct XmltvSource {
    http: HttpClient,
    feeds: Vec<String>,
    guide: OnceCell<Guide>,
}

impl XmltvSource {
    pub fn new(http: HttpClient, feeds: Vec<String>) -> Self {
        Self {
            http,
            feeds,
            guide: OnceCell::new(),
        }
    }

    async fn guide(&self) -> &Guide {
        self.guide.get_or_init(|| self.load()).await
    }

    async fn load(&self) -> Guide {
        let mut guide = Guide::default();
        for url in &self.feeds {
            match self.load_feed(url).await {
                Ok(feed) => {
                    info!(%url, channels = feed.channels.len(), "parsed guide feed");
                    guide.merge(feed);
                }
                Err(e) => warn!(%url, error = %e, "skipping guide feed"),
            }
        }

        guide
    }

    #[instrument(skip(self))]
    async fn load_feed(&self, url: &str) -> Result<Guide, FetchError> {
        let body = self.http.get_bytes(url).await?;
        let xml = decode_feed(url, &body)?;

        parse_guide(&xml).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Source for XmltvSource {
    fn strategy(&self) -> Strategy {
        Strategy::IntervalOverlap
    }

    /// One channel per display name with programmes, narrowed to `requested`
    /// (ids or display names) when that is non-empty. The display name is the
    /// channel's id from here on.
    async fn channels(&self, requested: Vec<String>) -> Vec<ChannelRef> {
        let guide = self.guide().await;

        guide
            .names()
            .into_iter()
            .filter(|(name, ids)| {
                requested.is_empty()
                    || requested
                        .iter()
                        .any(|r| r.as_str() == *name || ids.contains(&r.as_str()))
            })
            .map(|(name, _)| ChannelRef {
                id: name.to_string(),
                name: Some(name.to_string()),
            })
            .collect()
    }

    async fn fetch(&self, channel: &ChannelRef, _window: &DayWindow) -> ChannelListings {
        let guide = self.guide().await;
        let programs = guide.programs_named(&channel.id);

        ChannelListings {
            name: (!programs.is_empty()).then(|| channel.id.clone()),
            listings: RawListings::Absolute(programs),
        }
    }

    fn file_stem(&self, channel: &ChannelRef) -> String {
        slugify(channel.name.as_deref().unwrap_or(&channel.id))
    }
}

/// Gunzip when the URL or the body says so, otherwise read as UTF-8 text.
pub fn decode_feed(url: &str, body: &[u8]) -> Result<String, FetchError> {
    if url.ends_with(".gz") || body.starts_with(&GZIP_MAGIC) {
        let mut xml = String::new();
        match GzDecoder::new(body).read_to_string(&mut xml) {
            Ok(_) => return Ok(xml),
            Err(e) => warn!(error = %e, "could not decompress feed, reading it as plain text"),
        }
    }

    String::from_utf8(body.to_vec()).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an XMLTV document. Programmes for unknown channels, without a title or
/// with unreadable timestamps are skipped.
pub fn parse_guide(xml: &str) -> Result<Guide, roxmltree::Error> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let document = Document::parse_with_options(xml, options)?;
    let root = document.root_element();

    let mut guide = Guide::default();
    for channel in root.children().filter(|node| node.has_tag_name("channel")) {
        let Some(id) = channel.attribute("id") else {
            continue;
        };

        let name = child_text(channel, "display-name")
            .map(|name| CANAL_PREFIX.replace(&name, "").trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| id.to_string());
        guide.channels.insert(id.to_string(), name);
    }

    let mut skipped = 0usize;
    for programme in root.children().filter(|node| node.has_tag_name("programme")) {
        let Some(channel) = programme
            .attribute("channel")
            .filter(|id| guide.channels.contains_key(*id))
        else {
            continue;
        };

        let start = programme.attribute("start").and_then(parse_xmltv_time);
        let stop = programme.attribute("stop").and_then(parse_xmltv_time);
        let show_name = child_text(programme, "title");
        let (Some(start), Some(stop), Some(show_name)) = (start, stop, show_name) else {
            skipped += 1;
            continue;
        };

        let show_logo = programme
            .children()
            .find(|node| node.has_tag_name("icon"))
            .and_then(|icon| icon.attribute("src"))
            .unwrap_or_default()
            .to_string();

        guide
            .programs
            .entry(channel.to_string())
            .or_default()
            .push(AbsoluteProgram {
                start,
                stop,
                show_name,
                show_logo,
                category: child_text(programme, "category").unwrap_or_default(),
                description: child_text(programme, "desc").unwrap_or_default(),
            });
    }

    if skipped > 0 {
        debug!(skipped, "skipped malformed programmes");
    }

    Ok(guide)
}

/// `YYYYMMDDHHMMSS +HHMM`, with or without the space before the offset.
pub fn parse_xmltv_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    DateTime::parse_from_str(&compact, "%Y%m%d%H%M%S%z").ok()
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(name))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}
