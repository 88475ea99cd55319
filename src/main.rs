use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use epgrs::config::{Cli, Settings};
use epgrs::execution;
use epgrs::report::{RunLog, RunReport};

pub fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from_cli(cli).context("invalid configuration")?;

    let run_log = RunLog::open(&settings.log_file, settings.timezone)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(run_log.writer()),
        )
        .init();
    info!(log_file = %run_log.path().display(), "run log opened");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;

    let mut report = RunReport::default();
    let result = runtime.block_on(execution::run(&settings, &mut report));
    if let Err(e) = &result {
        error!(error = %e, "run aborted");
    }

    run_log
        .close(&report)
        .context("could not finalize the run log")?;
    result.context("run aborted")
}
