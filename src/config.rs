use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use clap::{Parser, ValueEnum};

use crate::end_time::EndTimePolicy;
use crate::error::ConfigError;
use crate::program::WallTime;
use crate::source::mitv::{self, MitvUrls};
use crate::source::reportv::{self, ReportvEndpoint};
use crate::source::xmltv;
use crate::store::object::S3StoreConfig;

pub const DEFAULT_TIMEZONE: &str = "America/Mexico_City";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// mi.tv relative-day channel pages
    Mitv,
    /// reportv.com.ar slot-polled channel finder
    Reportv,
    /// XMLTV guide feeds
    Xmltv,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Mitv => "mitv",
            SourceKind::Reportv => "reportv",
            SourceKind::Xmltv => "xmltv",
        }
    }
}

/// Build today's and tomorrow's schedule for every channel of a listing source.
#[derive(Debug, Parser)]
#[command(name = "epgrs", version)]
pub struct Cli {
    #[arg(long, env = "EPG_SOURCE", value_enum, default_value = "mitv")]
    pub source: SourceKind,

    /// Channel list, one identifier per line. Optional allowlist for xmltv.
    #[arg(long, env = "EPG_CHANNELS")]
    pub channels: Option<PathBuf>,

    /// Directory schedules are written to, as `today/` and `tomorrow/`.
    #[arg(long, env = "EPG_OUTPUT", default_value = "schedule")]
    pub output: PathBuf,

    #[arg(long, env = "EPG_TIMEZONE", default_value = DEFAULT_TIMEZONE)]
    pub timezone: String,

    #[arg(long, env = "EPG_WORKERS", default_value_t = 6)]
    pub workers: usize,

    #[arg(long, env = "EPG_TIMEOUT_SECS", default_value_t = 15)]
    pub timeout_secs: u64,

    /// End time of a day's last program when nothing follows it: "empty" or HH:MM.
    #[arg(long, env = "EPG_FALLBACK_END", default_value = "empty")]
    pub fallback_end: String,

    /// Wall-clock start of the broadcast day, for slot-polled sources.
    #[arg(long, env = "EPG_DAY_START", default_value = "05:30")]
    pub day_start: String,

    #[arg(long, env = "EPG_POLL_INTERVAL_HOURS", default_value_t = 3)]
    pub poll_interval_hours: u32,

    #[arg(long, env = "EPG_MITV_URL_YESTERDAY", default_value = mitv::DEFAULT_YESTERDAY_URL)]
    pub mitv_url_yesterday: String,

    #[arg(long, env = "EPG_MITV_URL_TODAY", default_value = mitv::DEFAULT_TODAY_URL)]
    pub mitv_url_today: String,

    #[arg(long, env = "EPG_MITV_URL_TOMORROW", default_value = mitv::DEFAULT_TOMORROW_URL)]
    pub mitv_url_tomorrow: String,

    #[arg(long, env = "EPG_REPORTV_URL", default_value = reportv::DEFAULT_URL)]
    pub reportv_url: String,

    #[arg(long, env = "EPG_REPORTV_LINEUP", default_value = reportv::DEFAULT_LINEUP)]
    pub reportv_lineup: String,

    #[arg(
        long = "xmltv-url",
        env = "EPG_XMLTV_URLS",
        value_delimiter = ',',
        default_value = xmltv::DEFAULT_FEED
    )]
    pub xmltv_urls: Vec<String>,

    #[arg(long, env = "EPG_LOG_FILE", default_value = "epg.log")]
    pub log_file: PathBuf,

    /// Write schedules to this S3 bucket instead of the output directory.
    #[arg(long, env = "EPG_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    #[arg(long, env = "EPG_S3_PREFIX", default_value = "schedule")]
    pub s3_prefix: String,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide = true, hide_env_values = true)]
    pub aws_access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide = true, hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,

    #[arg(long, env = "AWS_REGION", hide = true)]
    pub aws_region: Option<String>,

    #[arg(long, env = "EPG_STORE_ATTEMPTS", default_value_t = 3)]
    pub store_attempts: u32,
}

/// Where finished schedules go.
pub enum StoreTarget {
    Local(PathBuf),
    S3 {
        config: S3StoreConfig,
        prefix: String,
    },
}

/// Resolved configuration for one run.
pub struct Settings {
    pub source: SourceKind,
    pub channels: Vec<String>,
    pub store: StoreTarget,
    pub timezone: Tz,
    pub workers: usize,
    pub timeout: Duration,
    pub end_policy: EndTimePolicy,
    pub day_start: WallTime,
    pub poll_interval_hours: u32,
    pub mitv_urls: MitvUrls,
    pub reportv: ReportvEndpoint,
    pub xmltv_feeds: Vec<String>,
    pub log_file: PathBuf,
    pub store_attempts: u32,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let timezone = cli
            .timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Timezone(cli.timezone.clone()))?;
        let end_policy: EndTimePolicy = cli.fallback_end.parse()?;
        let day_start: WallTime = cli.day_start.parse()?;

        let channels = match (&cli.channels, cli.source) {
            (Some(path), _) => read_channel_list(path)?,
            (None, SourceKind::Xmltv) => Vec::new(),
            (None, source) => return Err(ConfigError::MissingChannelList(source.as_str())),
        };

        let store = match cli.s3_bucket {
            Some(bucket) => {
                let (Some(access_key_id), Some(secret_access_key)) =
                    (cli.aws_access_key_id, cli.aws_secret_access_key)
                else {
                    return Err(ConfigError::MissingS3Credentials);
                };

                StoreTarget::S3 {
                    config: S3StoreConfig {
                        bucket,
                        access_key_id,
                        secret_access_key,
                        region: cli.aws_region,
                    },
                    prefix: cli.s3_prefix,
                }
            }
            None => StoreTarget::Local(cli.output),
        };

        Ok(Self {
            source: cli.source,
            channels,
            store,
            timezone,
            workers: cli.workers.max(1),
            timeout: Duration::from_secs(cli.timeout_secs),
            end_policy,
            day_start,
            poll_interval_hours: cli.poll_interval_hours,
            mitv_urls: MitvUrls {
                yesterday: cli.mitv_url_yesterday,
                today: cli.mitv_url_today,
                tomorrow: cli.mitv_url_tomorrow,
            },
            reportv: ReportvEndpoint {
                url: cli.reportv_url,
                lineup: cli.reportv_lineup,
            },
            xmltv_feeds: cli.xmltv_urls,
            log_file: cli.log_file,
            store_attempts: cli.store_attempts.max(1),
        })
    }
}

/// One channel identifier per line. Blank lines are ignored.
pub fn read_channel_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ChannelList {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(parse_channel_list(&contents))
}

fn parse_channel_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use chrono_tz::America::Mexico_City;
    use clap::Parser;

    use crate::config::{parse_channel_list, read_channel_list, Cli, Settings, SourceKind, StoreTarget};
    use crate::end_time::EndTimePolicy;
    use crate::error::ConfigError;
    use crate::program::WallTime;

    fn channel_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("epgrs-{name}-{}.txt", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    pub fn test_defaults() {
        let path = channel_file("defaults", "food-network\n\n  once  \n");
        let cli = Cli::parse_from(["epgrs", "--channels", path.to_str().unwrap()]);
        let settings = Settings::from_cli(cli).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.source, SourceKind::Mitv);
        assert_eq!(settings.channels, vec!["food-network", "once"]);
        assert_eq!(settings.timezone, Mexico_City);
        assert_eq!(settings.workers, 6);
        assert_eq!(settings.timeout.as_secs(), 15);
        assert_eq!(settings.end_policy, EndTimePolicy::Empty);
        assert_eq!(settings.day_start, WallTime::new(5, 30).unwrap());
        assert_eq!(settings.reportv.lineup, "3129");
        assert_eq!(settings.xmltv_feeds.len(), 1);
        assert_eq!(settings.store_attempts, 3);
        assert!(matches!(settings.store, StoreTarget::Local(ref dir) if dir == Path::new("schedule")));
    }

    #[test]
    pub fn test_overrides() {
        let cli = Cli::parse_from([
            "epgrs",
            "--source",
            "xmltv",
            "--timezone",
            "America/Sao_Paulo",
            "--fallback-end",
            "23:59",
            "--workers",
            "0",
            "--xmltv-url",
            "https://a/feed.xml",
            "--xmltv-url",
            "https://b/feed.xml.gz",
        ]);
        let settings = Settings::from_cli(cli).unwrap();

        assert_eq!(settings.source, SourceKind::Xmltv);
        assert!(settings.channels.is_empty());
        assert_eq!(settings.timezone, chrono_tz::America::Sao_Paulo);
        assert_eq!(settings.end_policy, EndTimePolicy::Sentinel(WallTime::END_OF_DAY));
        assert_eq!(settings.workers, 1);
        assert_eq!(
            settings.xmltv_feeds,
            vec!["https://a/feed.xml", "https://b/feed.xml.gz"]
        );
    }

    #[test]
    pub fn test_configuration_errors() {
        let missing = Settings::from_cli(Cli::parse_from(["epgrs", "--source", "reportv"]));
        assert!(matches!(missing, Err(ConfigError::MissingChannelList("reportv"))));

        let unreadable = Settings::from_cli(Cli::parse_from([
            "epgrs",
            "--channels",
            "/nonexistent/epgrs/channels.txt",
        ]));
        assert!(matches!(unreadable, Err(ConfigError::ChannelList { .. })));

        let timezone = Settings::from_cli(Cli::parse_from([
            "epgrs",
            "--source",
            "xmltv",
            "--timezone",
            "Mars/Olympus",
        ]));
        assert!(matches!(timezone, Err(ConfigError::Timezone(_))));

        let day_start = Settings::from_cli(Cli::parse_from([
            "epgrs",
            "--source",
            "xmltv",
            "--day-start",
            "25:00",
        ]));
        assert!(matches!(day_start, Err(ConfigError::WallTime(_))));

        let fallback = Settings::from_cli(Cli::parse_from([
            "epgrs",
            "--source",
            "xmltv",
            "--fallback-end",
            "later",
        ]));
        assert!(matches!(fallback, Err(ConfigError::FallbackEnd(_))));
    }

    #[test]
    pub fn test_parse_channel_list() {
        assert_eq!(
            parse_channel_list("a\r\n\n b \n\t\nc"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_channel_list("").is_empty());
        assert!(read_channel_list(Path::new("/nonexistent/epgrs/channels.txt")).is_err());
    }
}
