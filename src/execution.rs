use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};

use crate::assemble::{build_schedules, AssemblyConfig, Day, DayWindow};
use crate::config::{Settings, SourceKind, StoreTarget};
use crate::error::{ChannelError, ConfigError, StoreError};
use crate::program::ChannelSchedule;
use crate::report::{ChannelOutcome, RunReport};
use crate::source::http::HttpClient;
use crate::source::mitv::MitvSource;
use crate::source::reportv::ReportvSource;
use crate::source::xmltv::XmltvSource;
use crate::source::{ChannelListings, ChannelRef, Source};
use crate::store::object::{new_local_store, new_s3_store};
use crate::store::ScheduleStore;

pub const DEFAULT_WORKERS: usize = 6;
pub const DEFAULT_STORE_ATTEMPTS: u32 = 3;

/// Drives channels through fetch, assembly and storage on a bounded pool.
///
/// Every channel runs in its own task, so an error or a panic while processing
/// one channel is logged and counted without affecting the others.
pub struct Runner<S: ?Sized, W: ?Sized> {
    source: Arc<S>,
    store: Arc<W>,
    config: AssemblyConfig,
    window: DayWindow,
    workers: usize,
    store_attempts: u32,
}

impl<S: ?Sized, W: ?Sized> Clone for Runner<S, W> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            config: self.config,
            window: self.window,
            workers: self.workers,
            store_attempts: self.store_attempts,
        }
    }
}

impl<S, W> Runner<S, W>
where
    S: Source + ?Sized + 'static,
    W: ScheduleStore + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, store: Arc<W>, config: AssemblyConfig, window: DayWindow) -> Self {
        Self {
            source,
            store,
            config,
            window,
            workers: DEFAULT_WORKERS,
            store_attempts: DEFAULT_STORE_ATTEMPTS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);

        self
    }

    pub fn with_store_attempts(mut self, store_attempts: u32) -> Self {
        self.store_attempts = store_attempts.max(1);

        self
    }

    /// Process every channel, at most `workers` at a time, recording each
    /// outcome as it completes.
    pub async fn run(&self, channels: Vec<ChannelRef>, report: &mut RunReport) {
        info!(
            channels = channels.len(),
            workers = self.workers,
            today = %self.window.today,
            "begin run"
        );

        let mut outcomes = stream::iter(channels)
            .map(|channel| {
                let runner = self.clone();
                let id = channel.id.clone();
                async move {
                    let joined =
                        tokio::spawn(async move { runner.process_channel(channel).await }).await;
                    (id, joined)
                }
            })
            .buffer_unordered(self.workers);

        while let Some((id, joined)) = outcomes.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(channel = %id, error = %e, "channel task aborted");
                    ChannelOutcome::Failed {
                        channel: id,
                        reason: e.to_string(),
                    }
                }
            };
            report.record(outcome);
        }

        info!(summary = %report.summary(), "run complete");
    }

    #[instrument(skip_all, fields(channel = %channel.id))]
    pub async fn process_channel(&self, channel: ChannelRef) -> ChannelOutcome {
        match self.try_process_channel(&channel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "channel failed");
                ChannelOutcome::Failed {
                    channel: channel.id,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_process_channel(
        &self,
        channel: &ChannelRef,
    ) -> Result<ChannelOutcome, ChannelError> {
        let ChannelListings { name, listings } = self.source.fetch(channel, &self.window).await;
        let name = name
            .or_else(|| channel.name.clone())
            .unwrap_or_else(|| channel.id.clone());
        let file_stem = self.source.file_stem(channel);

        let schedules = build_schedules(&name, listings, &self.config, &self.window)?;

        let mut saved = Vec::with_capacity(schedules.len());
        for (day, schedule) in &schedules {
            let location = self
                .save_with_retry(*day, &file_stem, schedule)
                .await
                .map_err(|source| ChannelError::Store {
                    day: day.as_str(),
                    source,
                })?;
            saved.push(location);
        }

        let empty_days: Vec<Day> = [Day::Today, Day::Tomorrow]
            .into_iter()
            .filter(|day| schedules.iter().all(|(saved_day, _)| saved_day != day))
            .collect();
        for day in &empty_days {
            warn!(%day, date = %self.window.date(*day), "no programs, nothing written");
        }

        Ok(ChannelOutcome::Processed {
            channel: channel.id.clone(),
            saved,
            empty_days,
        })
    }

    async fn save_with_retry(
        &self,
        day: Day,
        file_stem: &str,
        schedule: &ChannelSchedule,
    ) -> Result<String, StoreError> {
        let attempts = self.store_attempts;
        let mut attempt = 1;
        loop {
            match self.store.save(day, file_stem, schedule).await {
                Ok(location) => return Ok(location),
                Err(e) if attempt < attempts => {
                    warn!(error = %e, %day, "save attempt {attempt} of {attempts} failed");
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, %day, "{attempts} failed attempts saving {file_stem}, giving up");
                    return Err(e);
                }
            }
        }
    }
}

pub fn build_source(settings: &Settings, http: HttpClient) -> Arc<dyn Source> {
    match settings.source {
        SourceKind::Mitv => Arc::new(MitvSource::new(http, settings.mitv_urls.clone())),
        SourceKind::Reportv => Arc::new(ReportvSource::new(
            http,
            settings.reportv.clone(),
            settings.day_start,
            settings.poll_interval_hours,
        )),
        SourceKind::Xmltv => Arc::new(XmltvSource::new(http, settings.xmltv_feeds.clone())),
    }
}

pub fn build_store(settings: &Settings) -> Result<Arc<dyn ScheduleStore>, ConfigError> {
    let store = match &settings.store {
        StoreTarget::Local(dir) => new_local_store(dir)?,
        StoreTarget::S3 { config, prefix } => new_s3_store(config, prefix.as_str())?,
    };

    Ok(Arc::new(store))
}

/// One full run: resolve channels, then assemble and save today's and
/// tomorrow's schedule for each. Only configuration problems are returned;
/// channel failures end up in `report`.
pub async fn run(settings: &Settings, report: &mut RunReport) -> Result<(), ConfigError> {
    let http = HttpClient::new(settings.timeout).map_err(ConfigError::HttpClient)?;
    let source = build_source(settings, http);
    let store = build_store(settings)?;

    let channels = source.channels(settings.channels.clone()).await;
    if channels.is_empty() {
        warn!(source = settings.source.as_str(), "no channels to process");
    }

    let window = DayWindow::current(settings.timezone);
    let config = AssemblyConfig {
        strategy: source.strategy(),
        end_policy: settings.end_policy,
    };
    info!(
        source = settings.source.as_str(),
        strategy = ?config.strategy,
        timezone = %settings.timezone,
        "resolved configuration"
    );

    Runner::new(source, store, config, window)
        .with_workers(settings.workers)
        .with_store_attempts(settings.store_attempts)
        .run(channels, report)
        .await;

    Ok(())
}
