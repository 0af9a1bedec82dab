use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, trace, warn};

use crate::error::Error;
use crate::events::{PollStatus, TickOutcome};
use crate::fingerprint::{Change, has_changed};
use crate::manifest::ManifestFetcher;
use crate::reconcile::Reconciler;
use crate::state::ConfigState;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Drives fetch, compare and reconcile on a fixed period.
///
/// Rules:
/// - The first tick fires as soon as polling starts.
/// - Ticks never overlap. A tick that overruns the period pushes the next one
///   back instead of running beside it.
/// - The fingerprint is written only after a reconciliation was issued, so a
///   failed fetch or an interrupted tick retries the same change next time.
/// - `stop` returns only once no further tick can begin; a tick already past
///   its first step finishes normally.
/// - A panicking collaborator aborts only its own tick. The loop keeps
///   running and the change is retried on the next tick.
pub struct PollScheduler {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    state: ConfigState,
    fetcher: Arc<dyn ManifestFetcher>,
    reconciler: Reconciler,
    period: Duration,
    status: watch::Sender<PollStatus>,
    // Held while a tick reads its URL, and by `stop` while cancelling.
    gate: Mutex<()>,
    // Held for the whole of a tick; serializes the loop with manual ticks and
    // with a loop left over from a previous start.
    serial: tokio::sync::Mutex<()>,
}

impl PollScheduler {
    pub fn new(
        state: ConfigState,
        fetcher: Arc<dyn ManifestFetcher>,
        reconciler: Reconciler,
        period: Duration,
    ) -> Self {
        let (status, _) = watch::channel(PollStatus::default());
        Self {
            inner: Arc::new(Inner {
                state,
                fetcher,
                reconciler,
                period: period.max(MIN_INTERVAL),
                status,
                gate: Mutex::new(()),
                serial: tokio::sync::Mutex::new(()),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn state(&self) -> &ConfigState {
        &self.inner.state
    }

    /// Begin polling on the current tokio runtime. Starting while already
    /// running does nothing.
    pub fn start(&self) -> Result<(), Error> {
        let mut running = self.running.lock();
        if running.is_some() {
            debug!("poller already running");
            return Ok(());
        }
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run(self.inner.clone(), cancel.clone()));
        *running = Some(Running { cancel, handle });
        self.inner.status.send_modify(|s| s.running = true);
        info!(
            period = %humantime::format_duration(self.inner.period),
            "polling started"
        );
        Ok(())
    }

    /// Stop polling. Safe to call repeatedly.
    pub fn stop(&self) {
        drop(self.halt());
    }

    /// Stop polling and wait for an in-flight tick to finish.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.halt() {
            if let Err(err) = handle.await {
                warn!("poll loop ended abnormally: {err}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Run a single tick now, serialized with the loop.
    pub async fn tick(&self) -> TickOutcome {
        let _serial = self.inner.serial.lock().await;
        let url = self.inner.state.url();
        self.inner.process(url).await
    }

    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.inner.status.subscribe()
    }

    pub fn status(&self) -> PollStatus {
        self.inner.status.borrow().clone()
    }

    fn halt(&self) -> Option<JoinHandle<()>> {
        let running = self.running.lock().take()?;
        {
            let _gate = self.inner.gate.lock();
            running.cancel.cancel();
        }
        self.inner.status.send_modify(|s| s.running = false);
        info!("polling stopped");
        Some(running.handle)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

impl Inner {
    // Each tick runs on its own task so a panic in a collaborator unwinds
    // that task only.
    async fn process(self: &Arc<Self>, url: String) -> TickOutcome {
        let inner = Arc::clone(self);
        let task = async move { inner.evaluate(url).await }.in_current_span();
        let outcome = match tokio::spawn(task).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let reason = if err.is_panic() {
                    panic_message(err.into_panic())
                } else {
                    "tick task cancelled".to_string()
                };
                error!(%reason, "tick aborted; fingerprint left unchanged");
                TickOutcome::Aborted(reason)
            }
        };
        let fingerprint = self.state.fingerprint();
        self.status
            .send_modify(|status| status.record(&outcome, fingerprint));
        outcome
    }

    async fn evaluate(&self, url: String) -> TickOutcome {
        if url.is_empty() {
            trace!("no manifest url configured; skipping tick");
            return TickOutcome::Idle;
        }

        let manifest = match self.fetcher.fetch(&url).await {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(%url, error = %err, "manifest fetch failed; retrying next tick");
                return TickOutcome::FetchFailed(err);
            }
        };

        let stored = self.state.fingerprint();
        let Change {
            changed,
            fingerprint,
        } = has_changed(&manifest, &stored);
        if !changed {
            debug!(%fingerprint, "manifest unchanged");
            return TickOutcome::Unchanged;
        }

        info!(
            %url,
            previous = %stored,
            current = %fingerprint,
            entries = manifest.len(),
            "manifest changed; reloading images"
        );
        let report = self.reconciler.reconcile(&manifest).await;
        self.state.set_fingerprint(fingerprint);
        TickOutcome::Reconciled(report)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "collaborator panicked".to_string(),
        },
    }
}

#[instrument(skip_all, fields(period_ms = inner.period.as_millis() as u64))]
async fn run(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut ticker = interval(inner.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let _serial = select! {
            biased;
            _ = cancel.cancelled() => break,
            guard = inner.serial.lock() => guard,
        };

        let url = {
            let _gate = inner.gate.lock();
            if cancel.is_cancelled() {
                break;
            }
            inner.state.url()
        };
        inner.process(url).await;
    }

    debug!("poll loop exited");
}
