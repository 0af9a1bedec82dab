use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Manifest to poll. Empty means polling idles until a URL is set.
    pub manifest_url: String,
    /// Period between ticks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound on a single manifest fetch; must be below the poll interval.
    pub fetch_timeout_ms: u64,
    /// Upper bound on opening one manifest entry.
    pub load_timeout_ms: u64,
    /// User agent sent with manifest and image requests.
    pub user_agent: String,
    /// Begin polling as soon as the process starts.
    pub autostart: bool,
    /// Close every displayed image when the process exits.
    pub close_on_exit: bool,
    /// Local HTTP surface used to edit the URL and start/stop polling.
    pub control: ControlOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_yaml::from_str(&s)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            self.poll_interval_ms > 0,
            "poll-interval-ms must be greater than zero"
        );
        ensure!(
            self.fetch_timeout_ms > 0,
            "fetch-timeout-ms must be greater than zero"
        );
        ensure!(
            self.fetch_timeout_ms < self.poll_interval_ms,
            "fetch-timeout-ms ({}) must be less than poll-interval-ms ({})",
            self.fetch_timeout_ms,
            self.poll_interval_ms
        );
        ensure!(
            self.load_timeout_ms > 0,
            "load-timeout-ms must be greater than zero"
        );
        ensure!(
            !self.user_agent.trim().is_empty(),
            "user-agent must not be empty"
        );
        self.manifest_url = self.manifest_url.trim().to_string();
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    const fn default_poll_interval_ms() -> u64 {
        2000
    }

    const fn default_fetch_timeout_ms() -> u64 {
        1500
    }

    const fn default_load_timeout_ms() -> u64 {
        10_000
    }

    fn default_user_agent() -> String {
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            fetch_timeout_ms: Self::default_fetch_timeout_ms(),
            load_timeout_ms: Self::default_load_timeout_ms(),
            user_agent: Self::default_user_agent(),
            autostart: true,
            close_on_exit: true,
            control: ControlOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControlOptions {
    pub enabled: bool,
    pub bind_address: IpAddr,
    pub port: u16,
}

impl ControlOptions {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8470,
        }
    }
}
