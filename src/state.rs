use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::fingerprint::Fingerprint;

/// Shared handle to the manifest URL and the accepted fingerprint.
///
/// Cloning is cheap and every clone sees the same values. The URL is written
/// by the configuration-edit path and the fingerprint by the poll loop; both
/// go through one lock so a reader only ever sees whole, assigned values.
#[derive(Debug, Clone, Default)]
pub struct ConfigState {
    inner: Arc<RwLock<Shared>>,
}

#[derive(Debug, Default)]
struct Shared {
    url: String,
    fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub url: String,
    pub fingerprint: Fingerprint,
}

impl ConfigState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        let state = Self::new();
        state.set_url(url);
        state
    }

    pub fn url(&self) -> String {
        self.inner.read().url.clone()
    }

    /// Replace the manifest URL. Surrounding whitespace from pasted text is dropped.
    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        let url = url.trim();
        let mut shared = self.inner.write();
        if shared.url != url {
            info!(url, "manifest url updated");
            shared.url = url.to_owned();
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.inner.read().fingerprint.clone()
    }

    pub fn set_fingerprint(&self, fingerprint: Fingerprint) {
        self.inner.write().fingerprint = fingerprint;
    }

    /// Forget the accepted manifest so the next fetch reloads it.
    pub fn reset_fingerprint(&self) {
        self.set_fingerprint(Fingerprint::default());
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let shared = self.inner.read();
        StateSnapshot {
            url: shared.url.clone(),
            fingerprint: shared.fingerprint.clone(),
        }
    }
}
