use std::path::PathBuf;

use thiserror::Error;

use crate::assemble::Strategy;

#[derive(Debug, Error)]
#[error("invalid wall-clock time {0:?}, expected HH:MM")]
pub struct InvalidWallTime(pub String);

/// Transport-level failure for a single upstream request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("channel list {path:?} could not be read: {source}")]
    ChannelList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a channel list is required for the {0} source")]
    MissingChannelList(&'static str),

    #[error("unknown timezone {0:?}")]
    Timezone(String),

    #[error("invalid fallback end time {0:?}, expected \"empty\" or HH:MM")]
    FallbackEnd(String),

    #[error(transparent)]
    WallTime(#[from] InvalidWallTime),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("could not create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("an S3 bucket needs AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY")]
    MissingS3Credentials,

    #[error("could not open schedule store: {0}")]
    Store(#[source] object_store::Error),

    #[error("could not open run log {path:?}: {source}")]
    RunLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("{strategy:?} strategy cannot assemble {listings} listings")]
    StrategyMismatch {
        strategy: Strategy,
        listings: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not serialize schedule: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("object store write failed: {0}")]
    ObjectStore(#[from] object_store::Error),
}

/// Anything that aborts the processing of a single channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("could not save {day} schedule: {source}")]
    Store {
        day: &'static str,
        #[source]
        source: StoreError,
    },
}
