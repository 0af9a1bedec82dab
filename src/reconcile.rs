use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::display::{ImageDisplay, ImageLoader};
use crate::error::LoadError;
use crate::manifest::Manifest;

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReconcileReport {
    pub opened: usize,
    /// Locators that could not be opened, in manifest order.
    pub failed: Vec<String>,
}

/// Replaces the displayed set with the contents of a manifest.
#[derive(Clone)]
pub struct Reconciler {
    display: Arc<dyn ImageDisplay>,
    loader: Arc<dyn ImageLoader>,
    load_timeout: Duration,
}

impl Reconciler {
    pub fn new(display: Arc<dyn ImageDisplay>, loader: Arc<dyn ImageLoader>) -> Self {
        Self {
            display,
            loader,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }

    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// Close everything, then open every entry in file order. A failed entry
    /// is logged and skipped; the rest of the manifest still loads.
    #[instrument(skip_all, fields(entries = manifest.len()))]
    pub async fn reconcile(&self, manifest: &Manifest) -> ReconcileReport {
        self.display.close_all().await;

        let mut report = ReconcileReport::default();
        for locator in manifest.lines() {
            let result = match timeout(self.load_timeout, self.loader.open(locator)).await {
                Ok(res) => res,
                Err(_) => Err(LoadError::Timeout {
                    locator: locator.clone(),
                    after: self.load_timeout,
                }),
            };
            match result {
                Ok(()) => {
                    debug!(%locator, "opened image");
                    report.opened += 1;
                }
                Err(err) => {
                    warn!(%locator, error = %err, "failed to open image; continuing");
                    report.failed.push(locator.clone());
                }
            }
        }

        info!(
            opened = report.opened,
            failed = report.failed.len(),
            "reconciliation complete"
        );
        report
    }
}
