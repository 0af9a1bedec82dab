//! Retrieval and parsing of line-oriented image manifests.
//!
//! A manifest is plain text with one image locator per line. There is no
//! escaping and no comment syntax; a single trailing blank line is ignored.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::config::Configuration;
use crate::error::{Error, FetchError};

/// Ordered image locators from one fetch, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    lines: Vec<String>,
}

impl Manifest {
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines: Vec<String> = split_lines(text).into_iter().map(str::to_owned).collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn first(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Manifest {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// `\n`, `\r\n` and a lone `\r` all end a line. A terminator at the very end
// does not open another line.
fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                out.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                out.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        out.push(&text[start..]);
    }
    out
}

#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Retrieve and split the manifest at `url`. Never panics; every failure
    /// comes back as a [`FetchError`].
    async fn fetch(&self, url: &str) -> Result<Manifest, FetchError>;
}

// HTTP and file manifests share one policy: invalid UTF-8 is a body error.
fn decode_body(bytes: Vec<u8>) -> Result<String, FetchError> {
    String::from_utf8(bytes).map_err(|err| FetchError::Body(err.to_string()))
}

/// Fetches manifests over HTTP(S), or from disk for `file://` URLs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_owned())
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(cfg: &Configuration) -> Result<Self, Error> {
        Self::new(cfg.fetch_timeout(), &cfg.user_agent)
    }

    async fn fetch_http(&self, url: Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Body(err.to_string())
            }
        })?;
        decode_body(bytes.to_vec())
    }

    async fn read_file(&self, url: &Url) -> Result<String, FetchError> {
        let path = url.to_file_path().map_err(|()| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "not a local file path".to_string(),
        })?;
        let bytes = match tokio::time::timeout(self.timeout, tokio::fs::read(&path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => return Err(FetchError::Io(format!("{}: {err}", path.display()))),
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };
        decode_body(bytes)
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else if err.is_builder() {
            FetchError::InvalidUrl {
                url: err.url().map(ToString::to_string).unwrap_or_default(),
                reason: err.to_string(),
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ManifestFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Manifest, FetchError> {
        let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl {
            url: url.to_owned(),
            reason: err.to_string(),
        })?;
        let text = match parsed.scheme() {
            "http" | "https" => self.fetch_http(parsed).await?,
            "file" => self.read_file(&parsed).await?,
            other => return Err(FetchError::UnsupportedScheme(other.to_owned())),
        };
        let manifest = Manifest::parse(&text);
        debug!(%url, lines = manifest.len(), "fetched manifest");
        Ok(manifest)
    }
}
