#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use manifest_listen::display::{ImageDisplay, ImageLoader};
use manifest_listen::error::{FetchError, LoadError};
use manifest_listen::manifest::{Manifest, ManifestFetcher};
use manifest_listen::reconcile::Reconciler;
use manifest_listen::state::ConfigState;
use manifest_listen::tasks::poller::PollScheduler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CloseAll,
    Open(String),
}

pub fn open(locator: &str) -> Call {
    Call::Open(locator.to_string())
}

/// Records every collaborator call in order; selected locators fail to open.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    failing: Arc<Mutex<Vec<String>>>,
    crash_next_open: Arc<AtomicBool>,
}

impl Recorder {
    pub fn fail_on(&self, locator: &str) {
        self.failing.lock().push(locator.to_string());
    }

    /// The next `open` records its call and then panics.
    pub fn crash_next_open(&self) {
        self.crash_next_open.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }
}

#[async_trait]
impl ImageDisplay for Recorder {
    async fn close_all(&self) {
        self.calls.lock().push(Call::CloseAll);
    }
}

#[async_trait]
impl ImageLoader for Recorder {
    async fn open(&self, locator: &str) -> Result<(), LoadError> {
        self.calls.lock().push(open(locator));
        if self.crash_next_open.swap(false, Ordering::SeqCst) {
            panic!("loader crashed opening {locator}");
        }
        if self.failing.lock().iter().any(|l| l == locator) {
            return Err(LoadError::InvalidLocator {
                locator: locator.to_string(),
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

/// Hands out queued responses in order, then repeats the last one.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    queue: Arc<Mutex<VecDeque<Result<Manifest, FetchError>>>>,
    last: Arc<Mutex<Option<Result<Manifest, FetchError>>>>,
    urls: Arc<Mutex<Vec<String>>>,
    delay: Arc<Mutex<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn push(&self, lines: &[&str]) -> &Self {
        self.queue
            .lock()
            .push_back(Ok(lines.iter().copied().collect()));
        self
    }

    pub fn push_err(&self, err: FetchError) -> &Self {
        self.queue.lock().push_back(Err(err));
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn fetch_count(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Manifest, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = self.queue.lock().pop_front();
        let result = match next {
            Some(res) => {
                *self.last.lock() = Some(res.clone());
                res
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| Ok(Manifest::default())),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub struct Harness {
    pub state: ConfigState,
    pub fetcher: ScriptedFetcher,
    pub recorder: Recorder,
    pub scheduler: PollScheduler,
}

pub fn harness(period: Duration) -> Harness {
    let state = ConfigState::with_url("http://frame.test/manifest.txt");
    let fetcher = ScriptedFetcher::default();
    let recorder = Recorder::default();
    let scheduler = PollScheduler::new(
        state.clone(),
        Arc::new(fetcher.clone()),
        recorder.reconciler(),
        period,
    );
    Harness {
        state,
        fetcher,
        recorder,
        scheduler,
    }
}
