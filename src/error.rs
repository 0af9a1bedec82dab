use std::time::Duration;

use thiserror::Error;

/// Library error type for setup failures outside the poll loop.
#[derive(Debug, Error)]
pub enum Error {
    /// `start` was called outside of a tokio runtime.
    #[error("no tokio runtime is available to drive the poll loop")]
    NoRuntime,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A manifest could not be retrieved. Aborts only the tick that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid manifest url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported manifest url scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("failed to read manifest body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to read manifest file: {0}")]
    Io(String),
}

/// A single manifest entry could not be turned into a displayed image.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("empty image locator")]
    EmptyLocator,

    #[error("invalid image locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("failed to fetch {locator}: {reason}")]
    Fetch { locator: String, reason: String },

    #[error("failed to read {locator}: {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {locator}: {source}")]
    Decode {
        locator: String,
        #[source]
        source: image::ImageError,
    },

    #[error("decoder for {locator} did not finish: {reason}")]
    Worker { locator: String, reason: String },

    #[error("timed out opening {locator} after {}ms", .after.as_millis())]
    Timeout { locator: String, after: Duration },
}
