//! Segment weather store
//!
//! The store owns the selected segment, the published [`WeatherSnapshot`],
//! the loading flag and the refresh timer. Every fetch is tagged when it is
//! issued and its result is applied only if the tag still matches the store
//! when the result arrives, so a slow response for a segment the user has
//! already left can never overwrite the newer selection.
//!
//! Consumers read the state through [`WeatherStore::state`] or subscribe to
//! changes with [`WeatherStore::subscribe`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::data::weather::{WeatherError, WeatherSource};
use crate::data::{
    all_segments, default_segment, resolve, resolve_or_default, Segment, WeatherClient,
    WeatherReport, WeatherSnapshot,
};

/// Default interval between background refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Shortest interval or timeout the store will run with
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the store's refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval for background weather refresh
    pub refresh_interval: Duration,
    /// Upper bound for a single fetch; defaults to the refresh interval
    pub fetch_timeout: Option<Duration>,
    /// Segment selected on start; unknown ids fall back to the default segment
    pub initial_segment: Option<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL, // 5 minutes
            fetch_timeout: None,
            initial_segment: None,
        }
    }
}

impl RefreshConfig {
    fn effective_interval(&self) -> Duration {
        self.refresh_interval.max(MIN_INTERVAL)
    }

    fn effective_timeout(&self) -> Duration {
        self.fetch_timeout
            .unwrap_or(self.refresh_interval)
            .max(MIN_INTERVAL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// Initial load or segment change: raises the loading flag
    Foreground,
    /// Timer tick or manual refresh: the loading flag is left alone
    Background,
}

/// Identity of an issued fetch, compared against the store on completion
#[derive(Debug, Clone, Copy)]
struct FetchTag {
    segment: &'static Segment,
    epoch: u64,
    seq: u64,
}

/// Published store state
#[derive(Debug, Clone)]
pub struct StoreState {
    selected: &'static Segment,
    snapshot: Option<Arc<WeatherSnapshot>>,
    loading: bool,
    disposed: bool,
    /// Bumped on every accepted segment change
    epoch: u64,
    /// Sequence number of the last issued fetch
    issued: u64,
    /// Sequence number of the last applied fetch
    applied: u64,
}

impl StoreState {
    fn new(selected: &'static Segment) -> Self {
        Self {
            selected,
            snapshot: None,
            loading: false,
            disposed: false,
            epoch: 0,
            issued: 0,
            applied: 0,
        }
    }

    pub fn selected_segment(&self) -> &'static Segment {
        self.selected
    }

    pub fn selected_segment_id(&self) -> &'static str {
        self.selected.id
    }

    /// The latest accepted snapshot; `None` until the first fetch completes.
    ///
    /// During a segment change this may still belong to the previous
    /// segment. Check [`WeatherSnapshot::segment_id`].
    pub fn snapshot(&self) -> Option<&Arc<WeatherSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn begin_fetch(&mut self, mode: FetchMode) -> Option<FetchTag> {
        if self.disposed {
            return None;
        }
        self.issued += 1;
        if mode == FetchMode::Foreground {
            self.loading = true;
        }
        Some(FetchTag {
            segment: self.selected,
            epoch: self.epoch,
            seq: self.issued,
        })
    }

    fn accepts(&self, tag: &FetchTag) -> bool {
        !self.disposed && tag.epoch == self.epoch && tag.seq > self.applied
    }
}

/// State and source shared between the store handle and its tasks
struct Shared<S> {
    source: S,
    state: watch::Sender<StoreState>,
    fetch_timeout: Duration,
}

impl<S: WeatherSource> Shared<S> {
    fn refresh(self: &Arc<Self>, mode: FetchMode) -> bool {
        let mut tag = None;
        self.state.send_if_modified(|state| {
            let was_loading = state.loading;
            tag = state.begin_fetch(mode);
            state.loading != was_loading
        });
        match tag {
            Some(tag) => {
                self.spawn_fetch(tag);
                true
            }
            None => false,
        }
    }

    fn spawn_fetch(self: &Arc<Self>, tag: FetchTag) {
        tracing::debug!(segment = tag.segment.id, seq = tag.seq, "issuing weather fetch");

        let fetch = self
            .source
            .fetch_weather(tag.segment.latitude, tag.segment.longitude);
        let timeout = self.fetch_timeout;
        let shared = Arc::clone(self);

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, fetch).await {
                Ok(result) => result,
                Err(_) => Err(WeatherError::TimedOut(timeout)),
            };
            shared.complete(tag, result);
        });
    }

    fn complete(&self, tag: FetchTag, result: Result<WeatherReport, WeatherError>) {
        let segment = tag.segment.id;
        let snapshot = match result {
            Ok(report) => WeatherSnapshot::available(segment, report),
            Err(err) => {
                tracing::warn!(segment, error = %err, kind = ?err.kind(), "weather fetch failed");
                WeatherSnapshot::unavailable(segment)
            }
        };
        let available = snapshot.is_available();

        let applied = self.state.send_if_modified(|state| {
            if !state.accepts(&tag) {
                return false;
            }
            state.applied = tag.seq;
            state.snapshot = Some(Arc::new(snapshot));
            state.loading = false;
            true
        });

        if applied {
            tracing::info!(segment, seq = tag.seq, available, "published weather snapshot");
        } else {
            tracing::debug!(segment, seq = tag.seq, "discarding stale weather result");
        }
    }

    fn dispose(&self) {
        self.state.send_if_modified(|state| {
            if state.disposed {
                return false;
            }
            state.disposed = true;
            state.loading = false;
            true
        });
    }
}

/// Handle owning the weather state for the selected segment
///
/// Created with [`WeatherStore::start`] inside a tokio runtime. Dropping the
/// handle or calling [`WeatherStore::shutdown`] stops the refresh timer;
/// fetches still in flight complete but their results are discarded.
pub struct WeatherStore<S: WeatherSource = WeatherClient> {
    shared: Arc<Shared<S>>,
    shutdown_tx: mpsc::Sender<()>,
    timer: Option<JoinHandle<()>>,
}

impl<S: WeatherSource> WeatherStore<S> {
    /// Selects the initial segment, issues the first fetch and spawns the
    /// refresh timer.
    ///
    /// # Arguments
    /// * `source` - Where weather reports come from
    /// * `config` - Refresh interval, fetch timeout and initial segment
    pub fn start(source: S, config: RefreshConfig) -> Self {
        let initial = config
            .initial_segment
            .as_deref()
            .map(resolve_or_default)
            .unwrap_or_else(default_segment);
        let (state, _) = watch::channel(StoreState::new(initial));
        let shared = Arc::new(Shared {
            source,
            state,
            fetch_timeout: config.effective_timeout(),
        });

        shared.refresh(FetchMode::Foreground);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = config.effective_interval();
        let first_tick = Instant::now() + period;
        let timer_shared = Arc::clone(&shared);

        // Spawn refresh timer
        let timer = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(period_secs = period.as_secs(), "refresh timer started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        timer_shared.refresh(FetchMode::Background);
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
            tracing::debug!("refresh timer stopped");
        });

        Self {
            shared,
            shutdown_tx,
            timer: Some(timer),
        }
    }

    /// Switch to another segment and fetch its weather right away.
    ///
    /// Unknown ids and the already selected id are ignored. The previous
    /// snapshot stays published until the new fetch completes.
    ///
    /// # Returns
    /// `true` if the selection changed and a fetch was issued
    pub fn set_segment(&self, id: &str) -> bool {
        let segment = match resolve(id) {
            Ok(segment) => segment,
            Err(err) => {
                tracing::warn!(%err, "ignoring segment change");
                return false;
            }
        };

        let mut tag = None;
        self.shared.state.send_if_modified(|state| {
            if state.disposed || state.selected.id == segment.id {
                return false;
            }
            state.selected = segment;
            state.epoch += 1;
            tag = state.begin_fetch(FetchMode::Foreground);
            true
        });

        match tag {
            Some(tag) => {
                tracing::info!(segment = segment.id, "segment selected");
                self.shared.spawn_fetch(tag);
                true
            }
            None => false,
        }
    }

    /// Requests an immediate background refresh of the selected segment
    pub fn request_refresh(&self) -> bool {
        self.shared.refresh(FetchMode::Background)
    }

    /// All segments the store can be switched to
    pub fn segments(&self) -> &'static [Segment] {
        all_segments()
    }

    pub fn selected_segment(&self) -> &'static Segment {
        self.shared.state.borrow().selected
    }

    pub fn snapshot(&self) -> Option<Arc<WeatherSnapshot>> {
        self.shared.state.borrow().snapshot.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    /// A copy of the current state
    pub fn state(&self) -> StoreState {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.shared.state.subscribe()
    }

    /// Stops the refresh timer and waits for it to exit
    pub async fn shutdown(mut self) {
        self.shared.dispose();
        let _ = self.shutdown_tx.send(()).await;
        if let Some(timer) = self.timer.take() {
            let _ = timer.await;
        }
    }
}

impl<S: WeatherSource> Drop for WeatherStore<S> {
    fn drop(&mut self) {
        self.shared.dispose();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
