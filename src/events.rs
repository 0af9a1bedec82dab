use serde::Serialize;

use crate::error::FetchError;
use crate::fingerprint::Fingerprint;
use crate::reconcile::ReconcileReport;

/// Result of one fetch-compare-reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No manifest URL configured.
    Idle,
    FetchFailed(FetchError),
    Unchanged,
    Reconciled(ReconcileReport),
    /// A collaborator panicked mid-tick. The fingerprint was left as it was.
    Aborted(String),
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Idle => "idle",
            TickOutcome::FetchFailed(_) => "fetch-failed",
            TickOutcome::Unchanged => "unchanged",
            TickOutcome::Reconciled(_) => "reconciled",
            TickOutcome::Aborted(_) => "aborted",
        }
    }
}

/// Published by the poll loop after every tick and on start/stop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollStatus {
    pub running: bool,
    pub ticks: u64,
    pub reconciliations: u64,
    pub last_outcome: Option<&'static str>,
    pub last_error: Option<String>,
    pub last_report: Option<ReconcileReport>,
    pub fingerprint: Fingerprint,
}

impl PollStatus {
    pub(crate) fn record(&mut self, outcome: &TickOutcome, fingerprint: Fingerprint) {
        self.ticks += 1;
        self.last_outcome = Some(outcome.label());
        self.fingerprint = fingerprint;
        match outcome {
            TickOutcome::FetchFailed(err) => self.last_error = Some(err.to_string()),
            TickOutcome::Reconciled(report) => {
                self.reconciliations += 1;
                self.last_error = None;
                self.last_report = Some(report.clone());
            }
            TickOutcome::Aborted(reason) => {
                self.last_error = Some(format!("tick aborted: {reason}"));
            }
            TickOutcome::Idle | TickOutcome::Unchanged => self.last_error = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_counts_and_last_error() {
        let mut status = PollStatus::default();
        status.record(
            &TickOutcome::FetchFailed(FetchError::Status(503)),
            Fingerprint::default(),
        );
        assert_eq!(status.ticks, 1);
        assert_eq!(status.last_outcome, Some("fetch-failed"));
        assert_eq!(
            status.last_error.as_deref(),
            Some("server responded with status 503")
        );

        let report = ReconcileReport {
            opened: 2,
            failed: vec![],
        };
        status.record(
            &TickOutcome::Reconciled(report.clone()),
            Fingerprint::from("a.png"),
        );
        assert_eq!(status.ticks, 2);
        assert_eq!(status.reconciliations, 1);
        assert_eq!(status.last_error, None);
        assert_eq!(status.last_report, Some(report));
        assert_eq!(status.fingerprint.as_str(), "a.png");

        status.record(
            &TickOutcome::Aborted("loader crashed".into()),
            Fingerprint::from("a.png"),
        );
        assert_eq!(status.ticks, 3);
        assert_eq!(status.reconciliations, 1);
        assert_eq!(status.last_outcome, Some("aborted"));
        assert_eq!(
            status.last_error.as_deref(),
            Some("tick aborted: loader crashed")
        );
    }
}
